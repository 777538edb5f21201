//! Server diff payload
//!
//! Mirrors the shape the review server returns for a file diff: an ordered
//! list of chunks, each holding common (`ab`), removed-only (`a`) or
//! added-only (`b`) lines, or a `skip` count for an elided common range.

use serde::{Deserialize, Serialize};

use super::line::{NewlineFlags, Side};
use super::processor::sanitize_chunks;

/// Meta information about one side of a file diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub lines: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRange {
    pub start: u32,
    pub end: u32,
}

/// Marks a chunk as moved from (or to) elsewhere in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDetails {
    /// True if the moved lines were also edited
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub range: Option<MoveRange>,
}

/// One chunk of the server diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ab: Option<Vec<String>>,
    /// Intraline edits on the `a` lines as `[skip, mark]` pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_a: Option<Vec<[u32; 2]>>,
    /// Intraline edits on the `b` lines as `[skip, mark]` pairs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_b: Option<Vec<[u32; 2]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
    /// `a`/`b` differ only in whitespace and may be collapsed like `ab`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub common: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub due_to_rebase: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_details: Option<MoveDetails>,
    /// Contains a line that must stay visible; set during processing only
    #[serde(skip)]
    pub key_location: bool,
}

impl DiffContent {
    #[must_use]
    pub fn common(lines: Vec<String>) -> Self {
        Self {
            ab: Some(lines),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn removed(lines: Vec<String>) -> Self {
        Self {
            a: Some(lines),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn added(lines: Vec<String>) -> Self {
        Self {
            b: Some(lines),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn skipped(count: u32) -> Self {
        Self {
            skip: Some(count),
            ..Self::default()
        }
    }

    /// Before-file lines this chunk carries.
    #[must_use]
    pub fn lines_left(&self) -> &[String] {
        self.ab.as_deref().or(self.a.as_deref()).unwrap_or_default()
    }

    /// After-file lines this chunk carries.
    #[must_use]
    pub fn lines_right(&self) -> &[String] {
        self.ab.as_deref().or(self.b.as_deref()).unwrap_or_default()
    }

    #[must_use]
    pub fn lines_on(&self, side: Side) -> &[String] {
        match side {
            Side::Left => self.lines_left(),
            Side::Right => self.lines_right(),
        }
    }

    /// Number of before-file lines covered, including skipped ones.
    #[must_use]
    pub fn left_len(&self) -> u32 {
        self.skip.unwrap_or_else(|| to_u32(self.lines_left().len()))
    }

    /// Number of after-file lines covered, including skipped ones.
    #[must_use]
    pub fn right_len(&self) -> u32 {
        self.skip.unwrap_or_else(|| to_u32(self.lines_right().len()))
    }

    /// Unchanged for diffing purposes, so a candidate for collapsing.
    #[must_use]
    pub const fn is_common(&self) -> bool {
        self.ab.is_some() || self.common || self.skip.is_some()
    }

    #[must_use]
    pub const fn is_collapsible(&self) -> bool {
        self.is_common() && !self.key_location
    }

    /// Length of a common chunk (same on both sides).
    #[must_use]
    pub fn common_len(&self) -> u32 {
        self.left_len()
    }
}

pub(crate) fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// The diff of a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_a: Option<FileMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_b: Option<FileMeta>,
    #[serde(default)]
    pub change_type: Option<String>,
    #[serde(default)]
    pub content: Vec<DiffContent>,
    #[serde(default)]
    pub binary: bool,
    /// Explicit trailing-newline state, overriding detection from `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_newline: Option<NewlineFlags>,
}

impl DiffInfo {
    #[must_use]
    pub const fn new(content: Vec<DiffContent>) -> Self {
        Self {
            meta_a: None,
            meta_b: None,
            change_type: None,
            content,
            binary: false,
            missing_newline: None,
        }
    }

    /// Total before-file lines, counting skipped ranges.
    #[must_use]
    pub fn left_line_count(&self) -> u32 {
        self.content
            .iter()
            .fold(0u32, |total, chunk| total.saturating_add(chunk.left_len()))
    }

    /// Total after-file lines, counting skipped ranges.
    #[must_use]
    pub fn right_line_count(&self) -> u32 {
        self.content
            .iter()
            .fold(0u32, |total, chunk| total.saturating_add(chunk.right_len()))
    }

    /// Whether `line` on `side` lies in a range the server skipped, so no
    /// row can ever show it.
    #[must_use]
    pub fn is_skipped(&self, side: Side, line: u32) -> bool {
        let mut next = 1u32;
        for chunk in &self.content {
            if next > line {
                break;
            }
            let len = match side {
                Side::Left => chunk.left_len(),
                Side::Right => chunk.right_len(),
            };
            let end = next.saturating_add(len);
            if chunk.skip.is_some() && line < end {
                return true;
            }
            next = end;
        }
        false
    }

    /// Copy of this diff with malformed chunks repaired or dropped.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        Self {
            content: sanitize_chunks(&self.content),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn line_count(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_line_count(),
            Side::Right => self.right_line_count(),
        }
    }

    /// Path of the file, preferring the after-file name.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.meta_b
            .as_ref()
            .or(self.meta_a.as_ref())
            .map(|meta| meta.name.as_str())
    }

    /// Which sides lack a trailing newline.
    ///
    /// The server ends a side with an empty line when the file ends with a
    /// newline, so a side whose last line is non-empty is missing one. A side
    /// with no lines never warns.
    #[must_use]
    pub fn newline_warnings(&self) -> NewlineFlags {
        if let Some(flags) = self.missing_newline {
            return flags;
        }
        let mut flags = NewlineFlags::default();
        for side in [Side::Left, Side::Right] {
            if self.has_trailing_newline(side) == Some(false) {
                flags.set(side);
            }
        }
        flags
    }

    fn has_trailing_newline(&self, side: Side) -> Option<bool> {
        let chunk = self
            .content
            .iter()
            .rev()
            .find(|chunk| chunk.skip.is_some() || !chunk.lines_on(side).is_empty())?;
        chunk.lines_on(side).last().map(String::is_empty)
    }
}
