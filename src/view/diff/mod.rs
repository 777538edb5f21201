//! Diff row building
//!
//! Sub-modules:
//! - `text_util`: tab expansion, line-length breaks
//! - `comments`: comment threads and the thread map
//! - `context`: context-control rows and expansion
//! - `side_by_side`: paired-row builder
//! - `unified`: single-column builder
//!
//! Builders turn groups into an abstract row sequence. Turning rows into
//! anything visible is left to a materializer such as [`crate::view::plain`].

mod comments;
mod context;
mod side_by_side;
mod text_util;
mod unified;

use serde::Serialize;

use crate::annotation::{Annotations, LayerRegistry};
use crate::config::DiffPreferences;
use crate::diff::{DiffGroup, DiffLine, GroupType, LineType, MoveDetails, Side};
use crate::model::DiffViewMode;

pub use comments::{Comment, CommentThread, ThreadMap};
pub use context::{
    context_control_row, expand_control, ContextButton, ContextControlRow, ControlPlacement,
    ExpandAction, ExpandError,
};
pub use text_util::{format_text, segments_to_lines, TextSegment};

pub(crate) use text_util::{split_at_char, truncate_chars};

// ---------------------------------------------------------------------------
// Row model
// ---------------------------------------------------------------------------

/// Formatted text of one side of a line, plus everything attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentCell {
    pub side: Side,
    pub text: String,
    pub segments: Vec<TextSegment>,
    #[serde(skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub missing_newline: bool,
    /// Threads rendered below the text
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub threads: Vec<CommentThread>,
}

/// One half of a side-by-side row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideCell {
    pub line_type: LineType,
    pub number: Option<u32>,
    /// `None` for blank padding
    pub content: Option<ContentCell>,
}

impl SideCell {
    #[must_use]
    pub const fn blank() -> Self {
        Self {
            line_type: LineType::Blank,
            number: None,
            content: None,
        }
    }

    #[must_use]
    pub const fn is_blank(&self) -> bool {
        matches!(self.line_type, LineType::Blank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideBySideRow {
    pub left: SideCell,
    pub right: SideCell,
    pub group_type: GroupType,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub due_to_rebase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedRow {
    pub line_type: LineType,
    pub before_number: Option<u32>,
    pub after_number: Option<u32>,
    pub content: ContentCell,
    /// Threads anchored on the before-file side of an unchanged line
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub left_threads: Vec<CommentThread>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub due_to_rebase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRow {
    pub path: String,
    pub threads: Vec<CommentThread>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveHeaderRow {
    pub label: String,
    pub details: MoveDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "row", rename_all = "snake_case")]
pub enum DiffRow {
    File(FileRow),
    SideBySide(SideBySideRow),
    Unified(UnifiedRow),
    ContextControl(ContextControlRow),
    MoveHeader(MoveHeaderRow),
}

impl DiffRow {
    /// `(text, line number, side)` for every code line in the row.
    #[must_use]
    pub fn code_triples(&self) -> Vec<(&str, u32, Side)> {
        match self {
            Self::SideBySide(row) => [(&row.left, Side::Left), (&row.right, Side::Right)]
                .into_iter()
                .filter_map(|(cell, side)| {
                    Some((cell.content.as_ref()?.text.as_str(), cell.number?, side))
                })
                .collect(),
            Self::Unified(row) => {
                let text = row.content.text.as_str();
                let mut triples = Vec::with_capacity(2);
                if let Some(n) = row.before_number {
                    triples.push((text, n, Side::Left));
                }
                if let Some(n) = row.after_number {
                    triples.push((text, n, Side::Right));
                }
                triples
            }
            Self::File(_) | Self::ContextControl(_) | Self::MoveHeader(_) => Vec::new(),
        }
    }

    /// Ids of all threads attached to this row.
    #[must_use]
    pub fn thread_ids(&self) -> Vec<&str> {
        let threads: Box<dyn Iterator<Item = &CommentThread>> = match self {
            Self::File(row) => Box::new(row.threads.iter()),
            Self::SideBySide(row) => Box::new(
                [&row.left, &row.right]
                    .into_iter()
                    .filter_map(|cell| cell.content.as_ref())
                    .flat_map(|content| content.threads.iter()),
            ),
            Self::Unified(row) => Box::new(row.left_threads.iter().chain(&row.content.threads)),
            Self::ContextControl(_) | Self::MoveHeader(_) => Box::new(std::iter::empty()),
        };
        threads.map(|t| t.id.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Everything a builder reads besides the groups.
pub struct RenderContext<'a> {
    pub path: &'a str,
    pub prefs: &'a DiffPreferences,
    pub threads: &'a ThreadMap,
    pub layers: &'a LayerRegistry,
    /// Total before-file lines, used to place context controls
    pub left_line_count: u32,
    pub show_file_row: bool,
}

impl RenderContext<'_> {
    /// Build the text cell for `line` as shown on `side`.
    pub(crate) fn content_cell(&self, line: &DiffLine, side: Side) -> ContentCell {
        let threads = line
            .number_on(side)
            .map(|n| self.threads.threads_at(self.path, side, n).to_vec())
            .unwrap_or_default();
        ContentCell {
            side,
            text: line.text.clone(),
            segments: format_text(
                &line.text,
                self.prefs.tab_size,
                self.prefs.line_length,
                self.prefs.line_wrapping,
            ),
            annotations: self.layers.annotate(line, side),
            missing_newline: line.missing_newline_on(side),
            threads,
        }
    }

    pub(crate) fn side_cell(&self, line: Option<&DiffLine>, side: Side) -> SideCell {
        match line {
            Some(line) if !line.is_blank() => SideCell {
                line_type: line.line_type,
                number: line.number_on(side),
                content: Some(self.content_cell(line, side)),
            },
            _ => SideCell::blank(),
        }
    }
}

/// Row builder for one view mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffBuilder {
    SideBySide,
    Unified,
}

impl DiffBuilder {
    #[must_use]
    pub const fn for_mode(mode: DiffViewMode) -> Self {
        match mode {
            DiffViewMode::SideBySide => Self::SideBySide,
            DiffViewMode::Unified => Self::Unified,
        }
    }

    /// Rows for one group. A context control becomes a single control row.
    #[must_use]
    pub fn emit_group(self, group: &DiffGroup, ctx: &RenderContext<'_>) -> Vec<DiffRow> {
        if group.group_type() == GroupType::ContextControl {
            return vec![DiffRow::ContextControl(context_control_row(
                group,
                ctx.left_line_count,
            ))];
        }
        let mut rows = Vec::new();
        if let Some(header) = move_header(group) {
            rows.push(DiffRow::MoveHeader(header));
        }
        match self {
            Self::SideBySide => rows.extend(side_by_side::emit_group(group, ctx)),
            Self::Unified => rows.extend(unified::emit_group(group, ctx)),
        }
        rows
    }

    /// Rows for a whole group sequence, preceded by the file-level row.
    #[must_use]
    pub fn build(self, groups: &[DiffGroup], ctx: &RenderContext<'_>) -> Vec<DiffRow> {
        let mut rows = Vec::new();
        if ctx.show_file_row {
            rows.push(file_row(ctx));
        }
        for group in groups {
            rows.extend(self.emit_group(group, ctx));
        }
        rows
    }
}

#[must_use]
pub fn file_row(ctx: &RenderContext<'_>) -> DiffRow {
    DiffRow::File(FileRow {
        path: ctx.path.to_string(),
        threads: ctx.threads.file_threads(ctx.path).into_iter().cloned().collect(),
    })
}

fn move_header(group: &DiffGroup) -> Option<MoveHeaderRow> {
    let details = group.options().move_details.clone()?;
    let direction = if group.adds().next().is_some() {
        "Moved in"
    } else {
        "Moved out"
    };
    let mut label = direction.to_string();
    if let Some(range) = details.range {
        let preposition = if direction == "Moved in" { "from" } else { "to" };
        label.push_str(&format!(" {preposition} lines {} - {}", range.start, range.end));
    }
    if details.changed {
        label.push_str(" (modified)");
    }
    Some(MoveHeaderRow { label, details })
}


#[cfg(test)]
mod tests {
    use super::test_support::{thread, Fixture};
    use super::*;
    use crate::diff::{DiffContent, DiffInfo, DiffProcessor, MoveRange};

    fn example_groups() -> Vec<DiffGroup> {
        let diff = DiffInfo::new(vec![
            DiffContent::common(vec!["x".to_string()]),
            DiffContent::removed(vec!["old".to_string()]),
            DiffContent::added(vec!["new1".to_string(), "new2".to_string()]),
            DiffContent::common(vec!["y".to_string()]),
        ]);
        DiffProcessor::new(10).process(&diff)
    }

    #[test]
    fn test_file_row_comes_first() {
        let fixture = Fixture::new(ThreadMap::from_threads([thread("f", Side::Right, None)]));
        let rows = DiffBuilder::SideBySide.build(&example_groups(), &fixture.ctx());
        assert!(matches!(&rows[0], DiffRow::File(row) if row.threads.len() == 1));
        assert_eq!(rows[0].thread_ids(), vec!["f"]);
    }

    #[test]
    fn test_modes_render_same_lines() {
        let fixture = Fixture::new(ThreadMap::new());
        let groups = example_groups();
        let collect = |builder: DiffBuilder| {
            let mut triples: Vec<(String, u32, Side)> = builder
                .build(&groups, &fixture.ctx())
                .iter()
                .flat_map(DiffRow::code_triples)
                .map(|(t, n, s)| (t.to_string(), n, s))
                .collect();
            triples.sort();
            triples
        };
        assert_eq!(collect(DiffBuilder::SideBySide), collect(DiffBuilder::Unified));
    }

    #[test]
    fn test_move_header() {
        let diff = DiffInfo::new(vec![DiffContent {
            b: Some(vec!["moved".to_string()]),
            move_details: Some(MoveDetails {
                changed: true,
                range: Some(MoveRange { start: 10, end: 12 }),
            }),
            ..DiffContent::default()
        }]);
        let groups = DiffProcessor::new(10).process(&diff);
        let fixture = Fixture::new(ThreadMap::new());
        let rows = DiffBuilder::Unified.emit_group(&groups[0], &fixture.ctx());
        match &rows[0] {
            DiffRow::MoveHeader(header) => {
                assert_eq!(header.label, "Moved in from lines 10 - 12 (modified)");
            }
            other => panic!("expected move header, got {other:?}"),
        }
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_content_cell_carries_annotations() {
        let fixture = Fixture::new(ThreadMap::new());
        let line = DiffLine::new(LineType::Add, None, Some(1), "x\t ");
        let cell = fixture.ctx().content_cell(&line, Side::Right);
        assert!(cell.annotations.ranges.iter().any(|r| r.class == "trailing"));
        assert!(cell.segments.iter().any(|s| matches!(s, TextSegment::Tab { .. })));
    }

    #[test]
    fn test_rows_serialize_with_tags() {
        let fixture = Fixture::new(ThreadMap::new());
        let rows = DiffBuilder::Unified.build(&example_groups(), &fixture.ctx());
        let json = serde_json::to_value(&rows).expect("serialize");
        assert_eq!(json[0]["row"], "file");
        assert_eq!(json[1]["row"], "unified");
    }
}
