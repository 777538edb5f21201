//! Converts server chunks into render groups.
//!
//! Glossary:
//! - "chunk": one [`DiffContent`] as returned by the server.
//! - "group": one [`DiffGroup`] as used for rendering.
//! - "common": unchanged for diffing purposes (`ab`, whitespace-only
//!   `common` chunks, and `skip` ranges).
//! - "key location": a line that must not be collapsed, e.g. because a
//!   comment thread is anchored to it.
//!
//! Processing splits large chunks so rendering can proceed in small steps,
//! splits common chunks around key locations, and replaces common code
//! outside the context setting with context-control groups.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::error::DiffError;
use crate::layout::{
    max_group_size, DEFAULT_CONTEXT, DEFAULT_LINES_RENDERED_AT_ONCE, MAX_FILE_LINES,
    WHOLE_FILE_CONTEXT,
};

use super::content::{to_u32, DiffContent, DiffInfo};
use super::group::{hide_in_context_control, DiffGroup, GroupOptions, GroupType};
use super::line::{DiffLine, Highlight, LineType, NewlineFlags, Side};

/// Lines that must stay visible, per side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyLocations {
    pub left: BTreeSet<u32>,
    pub right: BTreeSet<u32>,
}

impl KeyLocations {
    pub fn insert(&mut self, side: Side, line: u32) {
        match side {
            Side::Left => self.left.insert(line),
            Side::Right => self.right.insert(line),
        };
    }

    #[must_use]
    pub fn contains(&self, side: Side, line: u32) -> bool {
        match side {
            Side::Left => self.left.contains(&line),
            Side::Right => self.right.contains(&line),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DiffProcessor {
    context: i32,
    lines_at_once: usize,
    key_locations: KeyLocations,
}

impl Default for DiffProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT)
    }
}

impl DiffProcessor {
    #[must_use]
    pub fn new(context: i32) -> Self {
        Self {
            context,
            lines_at_once: DEFAULT_LINES_RENDERED_AT_ONCE,
            key_locations: KeyLocations::default(),
        }
    }

    /// Batch size for incremental processing; zero keeps the default.
    #[must_use]
    pub const fn with_lines_at_once(mut self, lines: usize) -> Self {
        if lines > 0 {
            self.lines_at_once = lines;
        }
        self
    }

    #[must_use]
    pub fn with_key_locations(mut self, key_locations: KeyLocations) -> Self {
        self.key_locations = key_locations;
        self
    }

    #[must_use]
    pub const fn context(&self) -> i32 {
        self.context
    }

    /// Process the whole diff at once.
    #[must_use]
    pub fn process(&self, diff: &DiffInfo) -> Vec<DiffGroup> {
        self.start(diff).flatten().collect()
    }

    /// Start incremental processing. Each item of the returned iterator is
    /// one batch of groups in document order.
    #[must_use]
    pub fn start(&self, diff: &DiffInfo) -> ProcessTask {
        if diff.binary {
            return ProcessTask::finished(self.clone());
        }
        let chunks = merge_replace_chunks(sanitize_chunks(&diff.content));
        let chunks = self.split_large_chunks(chunks);
        let chunks = self.split_common_chunks_with_key_locations(chunks);

        let left_total = chunks
            .iter()
            .fold(0u32, |total, c| total.saturating_add(c.left_len()));
        let right_total = chunks
            .iter()
            .fold(0u32, |total, c| total.saturating_add(c.right_len()));
        ProcessTask {
            processor: self.clone(),
            chunks,
            state: State::default(),
            totals: (left_total, right_total),
            newline: diff.newline_warnings(),
        }
    }

    /// Split large added-only or removed-only chunks into smaller ones so
    /// that no single render step does too much work. With whole-file
    /// context, a large unchanged chunk is split once at the maximum size.
    #[must_use]
    pub fn split_large_chunks(&self, chunks: Vec<DiffContent>) -> Vec<DiffContent> {
        let max = max_group_size(self.lines_at_once);
        let mut result = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let Some(ab) = &chunk.ab else {
                result.extend(self.breakdown_chunk(chunk));
                continue;
            };
            if self.context == WHOLE_FILE_CONTEXT && ab.len() > max * 2 {
                let (head, tail) = ab.split_at(max);
                result.push(DiffContent {
                    ab: Some(head.to_vec()),
                    ..chunk.clone()
                });
                result.push(DiffContent {
                    ab: Some(tail.to_vec()),
                    ..chunk
                });
            } else {
                result.push(chunk);
            }
        }
        result
    }

    /// Break a one-sided chunk into pieces of at most the maximum group size.
    /// Moved chunks stay whole because their label sits on the first line.
    fn breakdown_chunk(&self, chunk: DiffContent) -> Vec<DiffContent> {
        if chunk.move_details.is_some() || chunk.common {
            return vec![chunk];
        }
        let a_len = chunk.a.as_ref().map_or(0, Vec::len);
        let b_len = chunk.b.as_ref().map_or(0, Vec::len);
        let side = match (a_len, b_len) {
            (n, 0) if n > 0 => Side::Left,
            (0, n) if n > 0 => Side::Right,
            _ => return vec![chunk],
        };
        let lines = chunk.lines_on(side);
        let max = max_group_size(self.lines_at_once);
        if lines.len() <= max {
            return vec![chunk];
        }
        breakdown(lines, max)
            .into_iter()
            .map(|piece| {
                let mut sub = DiffContent {
                    due_to_rebase: chunk.due_to_rebase,
                    ..DiffContent::default()
                };
                match side {
                    Side::Left => sub.a = Some(piece),
                    Side::Right => sub.b = Some(piece),
                }
                sub
            })
            .collect()
    }

    /// Split common chunks so that each key location becomes its own
    /// uncollapsible chunk, with collapsible chunks around it.
    #[must_use]
    pub fn split_common_chunks_with_key_locations(
        &self,
        chunks: Vec<DiffContent>,
    ) -> Vec<DiffContent> {
        if self.key_locations.is_empty() {
            return chunks;
        }
        let mut result = Vec::with_capacity(chunks.len());
        let mut left_line = 1u32;
        let mut right_line = 1u32;

        for chunk in chunks {
            if !chunk.is_common() {
                left_line += chunk.left_len();
                right_line += chunk.right_len();
                result.push(chunk);
                continue;
            }

            let num_lines = chunk.common_len();
            let ends = self.chunk_ends_at_key_locations(num_lines, left_line, right_line);
            left_line += num_lines;
            right_line += num_lines;

            if chunk.skip.is_some() {
                result.push(DiffContent {
                    key_location: false,
                    ..chunk
                });
                continue;
            }

            let pieces = ends.len();
            if let Some(ab) = &chunk.ab {
                for (lines, key_location) in split_at_chunk_ends(ab, &ends) {
                    result.push(DiffContent {
                        ab: Some(lines),
                        key_location,
                        ..chunk.clone()
                    });
                }
            } else {
                let a = split_at_chunk_ends(chunk.lines_left(), &ends);
                let b = split_at_chunk_ends(chunk.lines_right(), &ends);
                for ((a_lines, key_location), (b_lines, _)) in a.into_iter().zip(b) {
                    let mut piece = DiffContent {
                        a: Some(a_lines),
                        b: Some(b_lines),
                        key_location,
                        ..chunk.clone()
                    };
                    if pieces > 1 {
                        // edit offsets are relative to the unsplit chunk
                        piece.edit_a = None;
                        piece.edit_b = None;
                    }
                    result.push(piece);
                }
            }
        }
        result
    }

    fn chunk_ends_at_key_locations(
        &self,
        num_lines: u32,
        left_offset: u32,
        right_offset: u32,
    ) -> Vec<(u32, bool)> {
        let mut ends = Vec::new();
        let mut last_end = 0;
        for i in 0..num_lines {
            if self.key_locations.contains(Side::Left, left_offset + i)
                || self.key_locations.contains(Side::Right, right_offset + i)
            {
                if i > last_end {
                    ends.push((i, false));
                }
                ends.push((i + 1, true));
                last_end = i + 1;
            }
        }
        if num_lines > last_end {
            ends.push((num_lines, false));
        }
        ends
    }

    /// Offsets of a stretch of collapsible chunks are resolved here: up to
    /// three groups come out, visible context before, the hidden part behind
    /// a context control, and visible context after.
    fn process_collapsible_chunks(
        &self,
        state: &State,
        chunks: &[DiffContent],
        first_uncollapsible: usize,
        totals: LineTotals,
    ) -> Step {
        let collapsible = &chunks[state.chunk_index..first_uncollapsible];
        let line_count: u32 = collapsible.iter().map(DiffContent::common_len).sum();

        let mut offset_left = state.left + 1;
        let mut offset_right = state.right + 1;
        let mut groups = Vec::with_capacity(collapsible.len());
        for chunk in collapsible {
            groups.push(chunk_to_group(chunk, offset_left, offset_right, totals));
            offset_left = offset_left.saturating_add(chunk.common_len());
            offset_right = offset_right.saturating_add(chunk.common_len());
        }

        let has_skip = groups.iter().any(DiffGroup::has_skip_group);
        if self.context != WHOLE_FILE_CONTEXT || has_skip {
            let context = u32::try_from(self.context.max(0)).unwrap_or(0);
            let hidden_start = if state.chunk_index == 0 { 0 } else { context };
            let trailing = if first_uncollapsible == chunks.len() { 0 } else { context };
            let hidden_end = line_count.saturating_sub(trailing);
            groups = hide_in_context_control(groups, hidden_start, hidden_end);
        }

        // Skipped content has no lines to show, so it is never left bare.
        let groups = groups
            .into_iter()
            .map(|group| {
                if group.group_type() != GroupType::ContextControl && group.skip().is_some() {
                    DiffGroup::context_control(vec![group])
                } else {
                    group
                }
            })
            .collect();

        Step {
            left_delta: line_count,
            right_delta: line_count,
            groups,
            next_chunk_index: first_uncollapsible,
        }
    }
}

/// Repair chunks the server should never send, logging each repair.
pub(super) fn sanitize_chunks(chunks: &[DiffContent]) -> Vec<DiffContent> {
    let mut result = Vec::with_capacity(chunks.len());
    let mut left_total = 0u32;
    let mut right_total = 0u32;
    for (index, chunk) in chunks.iter().enumerate() {
        let mut chunk = chunk.clone();
        let malformed = |reason: &str| {
            let err = DiffError::MalformedChunk {
                index,
                reason: reason.to_string(),
            };
            warn!(error = %err, "repairing diff chunk");
        };

        if chunk.skip == Some(0) {
            malformed("empty skip");
            chunk.skip = None;
        }
        if chunk.skip.is_some() && (chunk.ab.is_some() || chunk.a.is_some() || chunk.b.is_some()) {
            malformed("skip chunk also carries lines");
            chunk.ab = None;
            chunk.a = None;
            chunk.b = None;
        }
        if chunk.ab.is_some() && (chunk.a.is_some() || chunk.b.is_some()) {
            malformed("common lines mixed with one-sided lines");
            chunk.a = None;
            chunk.b = None;
            chunk.common = false;
        }
        if chunk.common && chunk.ab.is_none() {
            let a_len = chunk.a.as_ref().map(Vec::len);
            let b_len = chunk.b.as_ref().map(Vec::len);
            if a_len.is_none() || a_len != b_len {
                malformed("whitespace-only chunk with unequal sides");
                chunk.common = false;
            }
        }

        let empty = chunk.skip.is_none()
            && chunk.ab.as_ref().is_none_or(Vec::is_empty)
            && chunk.a.as_ref().is_none_or(Vec::is_empty)
            && chunk.b.as_ref().is_none_or(Vec::is_empty);
        if empty {
            malformed("no lines");
            continue;
        }

        let room = MAX_FILE_LINES.saturating_sub(left_total.max(right_total));
        if let Some(skip) = chunk.skip.filter(|&skip| skip > room) {
            malformed(&format!("skip of {skip} lines runs past line {MAX_FILE_LINES}"));
            if room == 0 {
                continue;
            }
            chunk.skip = Some(room);
        }
        left_total = left_total.saturating_add(chunk.left_len());
        right_total = right_total.saturating_add(chunk.right_len());
        result.push(chunk);
    }
    result
}

/// Join a removed-only chunk and the added-only chunk right after it into a
/// single replace chunk, so both halves land in one group.
fn merge_replace_chunks(chunks: Vec<DiffContent>) -> Vec<DiffContent> {
    let one_sided = |chunk: &DiffContent| {
        chunk.ab.is_none() && chunk.skip.is_none() && !chunk.common && chunk.move_details.is_none()
    };
    let mut result: Vec<DiffContent> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Some(prev) = result.last_mut() {
            let mergeable = one_sided(prev)
                && one_sided(&chunk)
                && prev.b.is_none()
                && chunk.a.is_none()
                && prev.due_to_rebase == chunk.due_to_rebase;
            if mergeable {
                prev.b = chunk.b;
                prev.edit_b = chunk.edit_b;
                continue;
            }
        }
        result.push(chunk);
    }
    result
}

/// Split `items` into pieces of at most `size`, remainder first.
fn breakdown<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    if items.len() <= size {
        return vec![items.to_vec()];
    }
    let head = items.len() % size;
    let mut pieces = Vec::with_capacity(items.len() / size + 1);
    if head > 0 {
        pieces.push(items[..head].to_vec());
    }
    pieces.extend(items[head..].chunks(size).map(<[T]>::to_vec));
    pieces
}

fn split_at_chunk_ends(lines: &[String], ends: &[(u32, bool)]) -> Vec<(Vec<String>, bool)> {
    let mut result = Vec::with_capacity(ends.len());
    let mut last = 0usize;
    for &(offset, key_location) in ends {
        let offset = (offset as usize).min(lines.len());
        if offset == last {
            continue;
        }
        result.push((lines[last..offset].to_vec(), key_location));
        last = offset;
    }
    result
}

/// Convert `[skip, mark]` intraline edits into per-line highlights.
///
/// Offsets count chars over the chunk's text, where every line counts one
/// extra position for its newline. A mark crossing a line end is split into
/// a highlight running to the end of that line and one starting the next.
#[must_use]
pub fn convert_intraline_infos(rows: &[String], infos: &[[u32; 2]]) -> Vec<(usize, Highlight)> {
    let line_lengths: Vec<usize> = rows.iter().map(|r| r.chars().count() + 1).collect();
    let mut normalized = Vec::new();
    let mut row_index = 0usize;
    let mut idx = 0usize;

    for &[skip_len, mark_len] in infos {
        let Some(mut line_length) = line_lengths.get(row_index).copied() else {
            warn!(row = row_index, "intraline edit past end of chunk");
            break;
        };
        let mut j = 0;
        while j < skip_len {
            if idx == line_length {
                idx = 0;
                row_index += 1;
                let Some(next) = line_lengths.get(row_index).copied() else {
                    warn!(row = row_index, "intraline skip past end of chunk");
                    return normalized;
                };
                line_length = next;
                continue;
            }
            idx += 1;
            j += 1;
        }

        let mut start = (row_index, idx);
        j = 0;
        while j < mark_len {
            if idx == line_length {
                normalized.push((start.0, Highlight { start: start.1, end: None }));
                idx = 0;
                row_index += 1;
                let Some(next) = line_lengths.get(row_index).copied() else {
                    warn!(row = row_index, "intraline mark past end of chunk");
                    return normalized;
                };
                line_length = next;
                start = (row_index, idx);
                continue;
            }
            idx += 1;
            j += 1;
        }
        normalized.push((start.0, Highlight { start: start.1, end: Some(idx) }));
    }
    normalized
}

/// Progress through the chunk list; line numbers are the last ones emitted.
#[derive(Debug, Clone, Copy, Default)]
struct State {
    left: u32,
    right: u32,
    chunk_index: usize,
}

struct Step {
    left_delta: u32,
    right_delta: u32,
    groups: Vec<DiffGroup>,
    next_chunk_index: usize,
}

/// Final line numbers per side plus which of them lack a trailing newline.
#[derive(Debug, Clone, Copy)]
struct LineTotals {
    left: u32,
    right: u32,
    newline: NewlineFlags,
}

/// Incremental processing state; yields batches of groups.
#[derive(Debug)]
pub struct ProcessTask {
    processor: DiffProcessor,
    chunks: Vec<DiffContent>,
    state: State,
    totals: (u32, u32),
    newline: NewlineFlags,
}

impl ProcessTask {
    fn finished(processor: DiffProcessor) -> Self {
        Self {
            processor,
            chunks: Vec::new(),
            state: State::default(),
            totals: (0, 0),
            newline: NewlineFlags::default(),
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.chunk_index >= self.chunks.len()
    }

    const fn line_totals(&self) -> LineTotals {
        LineTotals {
            left: self.totals.0,
            right: self.totals.1,
            newline: self.newline,
        }
    }

    /// Process the next uncollapsible chunk, or the next run of collapsible
    /// chunks.
    fn process_next(&self) -> Step {
        let chunks = &self.chunks;
        let state = &self.state;
        let first_uncollapsible = chunks[state.chunk_index..]
            .iter()
            .position(|c| !c.is_collapsible())
            .map_or(chunks.len(), |p| state.chunk_index + p);

        if first_uncollapsible == state.chunk_index {
            let chunk = &chunks[state.chunk_index];
            return Step {
                left_delta: chunk.left_len(),
                right_delta: chunk.right_len(),
                groups: vec![chunk_to_group(
                    chunk,
                    state.left + 1,
                    state.right + 1,
                    self.line_totals(),
                )],
                next_chunk_index: state.chunk_index + 1,
            };
        }

        self.processor
            .process_collapsible_chunks(state, chunks, first_uncollapsible, self.line_totals())
    }
}

impl Iterator for ProcessTask {
    type Item = Vec<DiffGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_done() {
            return None;
        }
        let mut batch = Vec::new();
        let mut lines = 0usize;
        while !self.is_done() && lines < self.processor.lines_at_once {
            let step = self.process_next();
            lines += step
                .groups
                .iter()
                .map(|g| g.lines().len().max(1))
                .sum::<usize>();
            self.state.left = self.state.left.saturating_add(step.left_delta);
            self.state.right = self.state.right.saturating_add(step.right_delta);
            self.state.chunk_index = step.next_chunk_index;
            batch.extend(step.groups);
        }
        debug!(
            groups = batch.len(),
            lines,
            chunk = self.state.chunk_index,
            "processed diff batch"
        );
        Some(batch)
    }
}

fn chunk_to_group(
    chunk: &DiffContent,
    offset_left: u32,
    offset_right: u32,
    totals: LineTotals,
) -> DiffGroup {
    let group_type = if chunk.ab.is_some() || chunk.skip.is_some() {
        GroupType::Both
    } else {
        GroupType::Delta
    };
    let options = GroupOptions {
        due_to_rebase: chunk.due_to_rebase,
        move_details: chunk.move_details.clone(),
        ignored_whitespace_only: chunk.common,
        key_location: chunk.key_location,
    };
    if let Some(skip) = chunk.skip {
        return DiffGroup::skipped(skip, offset_left, offset_right, options);
    }
    let lines = lines_from_chunk(chunk, offset_left, offset_right, totals);
    DiffGroup::with_options(group_type, lines, options)
}

fn lines_from_chunk(
    chunk: &DiffContent,
    offset_left: u32,
    offset_right: u32,
    totals: LineTotals,
) -> Vec<DiffLine> {
    if let Some(ab) = &chunk.ab {
        return ab
            .iter()
            .enumerate()
            .map(|(i, row)| {
                line_from_row(LineType::Both, offset_left, offset_right, row, i, None, totals)
            })
            .collect();
    }
    let mut lines = Vec::new();
    if let Some(a) = &chunk.a {
        let edits = chunk.edit_a.as_deref();
        lines.extend(lines_from_rows(LineType::Remove, a, offset_left, edits, totals));
    }
    if let Some(b) = &chunk.b {
        let edits = chunk.edit_b.as_deref();
        lines.extend(lines_from_rows(LineType::Add, b, offset_right, edits, totals));
    }
    lines
}

fn lines_from_rows(
    line_type: LineType,
    rows: &[String],
    offset: u32,
    intraline: Option<&[[u32; 2]]>,
    totals: LineTotals,
) -> Vec<DiffLine> {
    let highlights = intraline.map(|infos| convert_intraline_infos(rows, infos));
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            line_from_row(line_type, offset, offset, row, i, highlights.as_deref(), totals)
        })
        .collect()
}

fn line_from_row(
    line_type: LineType,
    offset_left: u32,
    offset_right: u32,
    row: &str,
    i: usize,
    highlights: Option<&[(usize, Highlight)]>,
    totals: LineTotals,
) -> DiffLine {
    let i = to_u32(i);
    let before = (line_type != LineType::Add).then_some(offset_left + i);
    let after = (line_type != LineType::Remove).then_some(offset_right + i);
    let mut line = DiffLine::new(line_type, before, after, row);
    if let Some(highlights) = highlights {
        line.has_intraline_info = true;
        line.highlights = highlights
            .iter()
            .filter(|(index, _)| to_u32(*index) == i)
            .map(|(_, hl)| *hl)
            .collect();
    }
    if totals.newline.left && before == Some(totals.left) {
        line.missing_newline.set(Side::Left);
    }
    if totals.newline.right && after == Some(totals.right) {
        line.missing_newline.set(Side::Right);
    }
    line
}
