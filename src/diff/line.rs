//! A single rendered line of one or both diff sides.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which half of a side-by-side view (or which file in unified mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Before-file
    Left,
    /// After-file
    Right,
}

impl Side {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Type of diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Add,
    Remove,
    /// Unchanged, present on both sides
    Both,
    /// Padding with no content and no line number
    Blank,
}

/// Intraline highlight, in char offsets into the line text.
///
/// `end == None` means the highlight runs to the end of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub start: usize,
    pub end: Option<usize>,
}

/// Per-side "no newline at end of file" markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewlineFlags {
    pub left: bool,
    pub right: bool,
}

impl NewlineFlags {
    #[must_use]
    pub const fn get(self, side: Side) -> bool {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub const fn set(&mut self, side: Side) {
        match side {
            Side::Left => self.left = true,
            Side::Right => self.right = true,
        }
    }

    #[must_use]
    pub const fn any(self) -> bool {
        self.left || self.right
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: LineType,
    /// Line number in the before-file (REMOVE and BOTH lines)
    pub before_number: Option<u32>,
    /// Line number in the after-file (ADD and BOTH lines)
    pub after_number: Option<u32>,
    /// The line content; an empty string is a real empty line, not padding
    pub text: String,
    pub highlights: Vec<Highlight>,
    /// False when the server sent no intraline edits for this line's chunk
    pub has_intraline_info: bool,
    pub missing_newline: NewlineFlags,
}

impl DiffLine {
    #[must_use]
    pub fn new(
        line_type: LineType,
        before_number: Option<u32>,
        after_number: Option<u32>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            line_type,
            before_number,
            after_number,
            text: text.into(),
            highlights: Vec::new(),
            has_intraline_info: false,
            missing_newline: NewlineFlags::default(),
        }
    }

    #[must_use]
    pub fn blank() -> Self {
        Self::new(LineType::Blank, None, None, "")
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.line_type == LineType::Blank
    }

    /// Line number shown for this line on `side`.
    #[must_use]
    pub const fn number_on(&self, side: Side) -> Option<u32> {
        match (self.line_type, side) {
            (LineType::Blank, _)
            | (LineType::Add, Side::Left)
            | (LineType::Remove, Side::Right) => None,
            (_, Side::Left) => self.before_number,
            (_, Side::Right) => self.after_number,
        }
    }

    /// The side a line belongs to when rendered in a single column: REMOVE
    /// lines are before-file lines, ADD and BOTH lines are after-file lines.
    #[must_use]
    pub const fn primary_side(&self) -> Option<Side> {
        match self.line_type {
            LineType::Remove => Some(Side::Left),
            LineType::Add | LineType::Both => Some(Side::Right),
            LineType::Blank => None,
        }
    }

    /// Whether this line exists on `side` at all.
    #[must_use]
    pub const fn is_on(&self, side: Side) -> bool {
        self.number_on(side).is_some()
    }

    #[must_use]
    pub const fn is_comment_anchor(&self) -> bool {
        !matches!(self.line_type, LineType::Blank)
    }

    #[must_use]
    pub const fn missing_newline_on(&self, side: Side) -> bool {
        self.is_on(side) && self.missing_newline.get(side)
    }
}
