//! Groups: contiguous runs of lines sharing a hunk type
//!
//! A group is built once per render from the processed server chunks and is
//! never mutated afterwards. Expanding collapsed context swaps a
//! context-control group for the groups it hides.

use serde::{Deserialize, Serialize};

use super::content::{to_u32, MoveDetails};
use super::line::{DiffLine, LineType, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    /// Unchanged lines, present on both sides
    Both,
    /// Removed and/or added lines
    Delta,
    /// Placeholder for collapsed unchanged lines
    ContextControl,
}

/// Shape of a delta group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    Added,
    Removed,
    Replaced,
}

/// Inclusive line range on one side; `start == 0` means the side is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideRange {
    pub start: u32,
    pub end: u32,
}

impl SideRange {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == 0 || self.end < self.start
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    #[must_use]
    pub const fn contains(self, line: u32) -> bool {
        !self.is_empty() && self.start <= line && line <= self.end
    }

    fn include(&mut self, line: u32) {
        if self.is_empty() {
            *self = Self::new(line, line);
        } else {
            self.start = self.start.min(line);
            self.end = self.end.max(line);
        }
    }
}

/// Line ranges a group covers on both sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub left: SideRange,
    pub right: SideRange,
}

impl LineRange {
    #[must_use]
    pub const fn side(&self, side: Side) -> SideRange {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Chunk-level flags carried onto the group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupOptions {
    pub due_to_rebase: bool,
    pub move_details: Option<MoveDetails>,
    pub ignored_whitespace_only: bool,
    pub key_location: bool,
}

/// One left/right pairing for side-by-side display; `None` is blank padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePair<'a> {
    pub left: Option<&'a DiffLine>,
    pub right: Option<&'a DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffGroup {
    group_type: GroupType,
    lines: Vec<DiffLine>,
    skip: Option<u32>,
    context_groups: Vec<DiffGroup>,
    options: GroupOptions,
    line_range: LineRange,
}

impl DiffGroup {
    #[must_use]
    pub fn new(group_type: GroupType, lines: Vec<DiffLine>) -> Self {
        Self::with_options(group_type, lines, GroupOptions::default())
    }

    #[must_use]
    pub fn with_options(
        group_type: GroupType,
        lines: Vec<DiffLine>,
        options: GroupOptions,
    ) -> Self {
        let mut line_range = LineRange::default();
        for line in &lines {
            if let Some(n) = line.number_on(Side::Left) {
                line_range.left.include(n);
            }
            if let Some(n) = line.number_on(Side::Right) {
                line_range.right.include(n);
            }
        }
        Self {
            group_type,
            lines,
            skip: None,
            context_groups: Vec::new(),
            options,
            line_range,
        }
    }

    /// Common lines the server elided; no line content is available.
    #[must_use]
    pub fn skipped(skip: u32, offset_left: u32, offset_right: u32, options: GroupOptions) -> Self {
        let line_range = if skip == 0 {
            LineRange::default()
        } else {
            LineRange {
                left: SideRange::new(offset_left, offset_left.saturating_add(skip - 1)),
                right: SideRange::new(offset_right, offset_right.saturating_add(skip - 1)),
            }
        };
        Self {
            group_type: GroupType::Both,
            lines: Vec::new(),
            skip: Some(skip),
            context_groups: Vec::new(),
            options,
            line_range,
        }
    }

    /// Collapse `groups` behind a single expandable placeholder.
    #[must_use]
    pub fn context_control(groups: Vec<Self>) -> Self {
        let mut line_range = LineRange::default();
        for side in [Side::Left, Side::Right] {
            let first = groups
                .iter()
                .map(|g| g.line_range.side(side))
                .find(|r| !r.is_empty());
            let last = groups
                .iter()
                .rev()
                .map(|g| g.line_range.side(side))
                .find(|r| !r.is_empty());
            if let (Some(first), Some(last)) = (first, last) {
                let range = SideRange::new(first.start, last.end);
                match side {
                    Side::Left => line_range.left = range,
                    Side::Right => line_range.right = range,
                }
            }
        }
        Self {
            group_type: GroupType::ContextControl,
            lines: Vec::new(),
            skip: None,
            context_groups: groups,
            options: GroupOptions::default(),
            line_range,
        }
    }

    #[must_use]
    pub const fn group_type(&self) -> GroupType {
        self.group_type
    }

    #[must_use]
    pub fn lines(&self) -> &[DiffLine] {
        &self.lines
    }

    #[must_use]
    pub const fn skip(&self) -> Option<u32> {
        self.skip
    }

    /// Groups hidden behind a context control.
    #[must_use]
    pub fn context_groups(&self) -> &[Self] {
        &self.context_groups
    }

    #[must_use]
    pub const fn options(&self) -> &GroupOptions {
        &self.options
    }

    #[must_use]
    pub const fn line_range(&self) -> LineRange {
        self.line_range
    }

    #[must_use]
    pub const fn due_to_rebase(&self) -> bool {
        self.options.due_to_rebase
    }

    #[must_use]
    pub const fn is_moved(&self) -> bool {
        self.options.move_details.is_some()
    }

    pub fn removes(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.line_type == LineType::Remove)
    }

    pub fn adds(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.line_type == LineType::Add)
    }

    #[must_use]
    pub fn delta_kind(&self) -> Option<DeltaKind> {
        if self.group_type != GroupType::Delta {
            return None;
        }
        match (self.removes().next().is_some(), self.adds().next().is_some()) {
            (true, true) => Some(DeltaKind::Replaced),
            (true, false) => Some(DeltaKind::Removed),
            (false, true) => Some(DeltaKind::Added),
            (false, false) => None,
        }
    }

    /// Whether the group is entirely an addition or entirely a removal.
    #[must_use]
    pub fn is_total(&self) -> bool {
        matches!(
            self.delta_kind(),
            Some(DeltaKind::Added | DeltaKind::Removed)
        )
    }

    /// Positional left/right pairing of this group's lines.
    ///
    /// Unchanged lines pair with themselves. In a delta group the i-th
    /// removed line pairs with the i-th added line, and the longer side is
    /// padded with blanks. Context controls have no pairs.
    #[must_use]
    pub fn side_by_side_pairs(&self) -> Vec<LinePair<'_>> {
        match self.group_type {
            GroupType::ContextControl => Vec::new(),
            GroupType::Both => self
                .lines
                .iter()
                .map(|line| LinePair {
                    left: Some(line),
                    right: Some(line),
                })
                .collect(),
            GroupType::Delta => {
                let removes: Vec<&DiffLine> = self.removes().collect();
                let adds: Vec<&DiffLine> = self.adds().collect();
                let count = removes.len().max(adds.len());
                (0..count)
                    .map(|i| LinePair {
                        left: removes.get(i).copied(),
                        right: adds.get(i).copied(),
                    })
                    .collect()
            }
        }
    }

    /// Number of lines this group spans as common (collapsible) content.
    #[must_use]
    pub fn common_len(&self) -> u32 {
        if let Some(skip) = self.skip {
            return skip;
        }
        match self.group_type {
            GroupType::Both => to_u32(self.lines.len()),
            GroupType::Delta => to_u32(self.removes().count()),
            GroupType::ContextControl => self.context_groups.iter().map(Self::common_len).sum(),
        }
    }

    /// Number of lines a context control hides.
    #[must_use]
    pub fn num_hidden_lines(&self) -> u32 {
        self.line_range.left.len()
    }

    #[must_use]
    pub fn has_skip_group(&self) -> bool {
        self.skip.is_some() || self.context_groups.iter().any(Self::has_skip_group)
    }

    /// Whether a context control hides whitespace-only delta groups.
    #[must_use]
    pub fn has_delta_group(&self) -> bool {
        self.context_groups
            .iter()
            .any(|g| g.is_whitespace_only_delta() || g.has_delta_group())
    }

    fn is_whitespace_only_delta(&self) -> bool {
        self.group_type == GroupType::Delta && self.options.ignored_whitespace_only
    }

    /// Split a common group after `at` lines.
    fn split_common(self, at: u32) -> (Option<Self>, Option<Self>) {
        let len = self.common_len();
        if at == 0 {
            return (None, Some(self));
        }
        if at >= len {
            return (Some(self), None);
        }
        if let Some(skip) = self.skip {
            let head = Self::skipped(
                at,
                self.line_range.left.start,
                self.line_range.right.start,
                self.options.clone(),
            );
            let tail = Self::skipped(
                skip - at,
                self.line_range.left.start + at,
                self.line_range.right.start + at,
                self.options,
            );
            return (Some(head), Some(tail));
        }
        let at = at as usize;
        let (head, tail): (Vec<DiffLine>, Vec<DiffLine>) = match self.group_type {
            GroupType::Delta => {
                let removes: Vec<DiffLine> = self.removes().cloned().collect();
                let adds: Vec<DiffLine> = self.adds().cloned().collect();
                let mut head = removes[..at].to_vec();
                head.extend_from_slice(&adds[..at.min(adds.len())]);
                let mut tail = removes[at..].to_vec();
                tail.extend_from_slice(&adds[at.min(adds.len())..]);
                (head, tail)
            }
            _ => {
                let mut head = self.lines;
                let tail = head.split_off(at);
                (head, tail)
            }
        };
        (
            Some(Self::with_options(self.group_type, head, self.options.clone())),
            Some(Self::with_options(self.group_type, tail, self.options)),
        )
    }
}

/// Partition common groups so the first `split` lines land in the first half.
fn split_common_groups(groups: Vec<DiffGroup>, split: u32) -> (Vec<DiffGroup>, Vec<DiffGroup>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut consumed = 0u32;
    for group in groups {
        let len = group.common_len();
        if consumed >= split {
            after.push(group);
        } else if consumed + len <= split {
            before.push(group);
        } else {
            let (head, tail) = group.split_common(split - consumed);
            before.extend(head);
            after.extend(tail);
        }
        consumed += len;
    }
    (before, after)
}

/// Hide lines `[hidden_start, hidden_end)` of a run of common groups behind
/// a context control.
///
/// Lines before and after the hidden range stay as regular groups. A single
/// hidden line is not worth a control and stays visible, unless the run
/// contains skipped content that has no lines to show anyway.
#[must_use]
pub fn hide_in_context_control(
    groups: Vec<DiffGroup>,
    hidden_start: u32,
    hidden_end: u32,
) -> Vec<DiffGroup> {
    if groups.is_empty() {
        return groups;
    }
    let hidden_end = hidden_end.max(hidden_start);
    let num_hidden = hidden_end - hidden_start;
    let has_skip = groups.iter().any(DiffGroup::has_skip_group);

    let (before, hidden, after) = if num_hidden > 1 || (num_hidden == 1 && has_skip) {
        let (before, rest) = split_common_groups(groups, hidden_start);
        let (hidden, after) = split_common_groups(rest, num_hidden);
        (before, hidden, after)
    } else {
        (Vec::new(), Vec::new(), groups)
    };

    let mut result = before;
    if !hidden.is_empty() {
        result.push(DiffGroup::context_control(hidden));
    }
    result.extend(after);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_lines(start: u32, count: u32) -> Vec<DiffLine> {
        (0..count)
            .map(|i| {
                DiffLine::new(
                    LineType::Both,
                    Some(start + i),
                    Some(start + i),
                    format!("line {}", start + i),
                )
            })
            .collect()
    }

    #[test]
    fn test_only_whitespace_deltas_count_as_unrelated() {
        let delta = |options| {
            DiffGroup::with_options(
                GroupType::Delta,
                vec![
                    DiffLine::new(LineType::Remove, Some(4), None, "a "),
                    DiffLine::new(LineType::Add, None, Some(4), "a"),
                ],
                options,
            )
        };
        let plain = DiffGroup::context_control(vec![
            DiffGroup::new(GroupType::Both, both_lines(1, 3)),
            delta(GroupOptions::default()),
        ]);
        assert!(!plain.has_delta_group());

        let whitespace = DiffGroup::context_control(vec![
            DiffGroup::new(GroupType::Both, both_lines(1, 3)),
            delta(GroupOptions {
                ignored_whitespace_only: true,
                ..GroupOptions::default()
            }),
        ]);
        assert!(whitespace.has_delta_group());
    }

    #[test]
    fn test_pairs_for_unchanged_group() {
        let group = DiffGroup::new(GroupType::Both, both_lines(1, 3));
        let pairs = group.side_by_side_pairs();
        assert_eq!(pairs.len(), 3);
        for pair in &pairs {
            assert_eq!(pair.left, pair.right);
        }
    }

    #[test]
    fn test_pairs_pad_shorter_side() {
        let lines = vec![
            DiffLine::new(LineType::Remove, Some(2), None, "old"),
            DiffLine::new(LineType::Add, None, Some(2), "new1"),
            DiffLine::new(LineType::Add, None, Some(3), "new2"),
        ];
        let group = DiffGroup::new(GroupType::Delta, lines);
        let pairs = group.side_by_side_pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].left.map(|l| l.text.as_str()), Some("old"));
        assert_eq!(pairs[0].right.map(|l| l.text.as_str()), Some("new1"));
        assert!(pairs[1].left.is_none());
        assert_eq!(pairs[1].right.map(|l| l.text.as_str()), Some("new2"));
        assert_eq!(group.delta_kind(), Some(DeltaKind::Replaced));
        assert!(!group.is_total());
    }

    #[test]
    fn test_line_range_tracks_both_sides() {
        let lines = vec![
            DiffLine::new(LineType::Remove, Some(4), None, "a"),
            DiffLine::new(LineType::Remove, Some(5), None, "b"),
            DiffLine::new(LineType::Add, None, Some(9), "c"),
        ];
        let group = DiffGroup::new(GroupType::Delta, lines);
        assert_eq!(group.line_range().left, SideRange::new(4, 5));
        assert_eq!(group.line_range().right, SideRange::new(9, 9));
    }

    #[test]
    fn test_hide_keeps_boundaries_visible() {
        let group = DiffGroup::new(GroupType::Both, both_lines(1, 30));
        let result = hide_in_context_control(vec![group], 3, 27);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].lines().len(), 3);
        assert_eq!(result[1].group_type(), GroupType::ContextControl);
        assert_eq!(result[1].num_hidden_lines(), 24);
        assert_eq!(result[1].line_range().left, SideRange::new(4, 27));
        assert_eq!(result[2].lines().len(), 3);
        assert_eq!(result[2].lines()[0].before_number, Some(28));
    }

    #[test]
    fn test_hide_single_line_is_noop() {
        let group = DiffGroup::new(GroupType::Both, both_lines(1, 5));
        let result = hide_in_context_control(vec![group], 2, 3);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].group_type(), GroupType::Both);
        assert_eq!(result[0].lines().len(), 5);
    }

    #[test]
    fn test_hide_splits_across_groups() {
        let groups = vec![
            DiffGroup::new(GroupType::Both, both_lines(1, 4)),
            DiffGroup::new(GroupType::Both, both_lines(5, 4)),
        ];
        let result = hide_in_context_control(groups, 2, 6);
        assert_eq!(result.len(), 3);
        let control = &result[1];
        assert_eq!(control.context_groups().len(), 2);
        assert_eq!(control.line_range().left, SideRange::new(3, 6));
        assert_eq!(result[2].lines()[0].before_number, Some(7));
    }

    #[test]
    fn test_skip_group_split_keeps_offsets() {
        let skip = DiffGroup::skipped(100, 11, 21, GroupOptions::default());
        let result = hide_in_context_control(vec![skip], 0, 100);
        assert_eq!(result.len(), 1);
        assert!(result[0].has_skip_group());
        assert_eq!(result[0].line_range().left, SideRange::new(11, 110));
        assert_eq!(result[0].line_range().right, SideRange::new(21, 120));
    }

    #[test]
    fn test_side_range_len() {
        assert_eq!(SideRange::default().len(), 0);
        assert_eq!(SideRange::new(3, 3).len(), 1);
        assert!(SideRange::new(3, 7).contains(7));
        assert!(!SideRange::new(3, 7).contains(8));
    }
}
