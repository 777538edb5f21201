//! Unified rows (single column, before/after numbers side by side).

use crate::diff::{DiffGroup, LineType, Side};

use super::{DiffRow, RenderContext, UnifiedRow};

/// One row per line, in group order.
///
/// Text and annotations come from the line's own side: REMOVE lines are
/// before-file lines, ADD and BOTH lines after-file lines. An unchanged line
/// also carries threads anchored to its before-file number.
pub(super) fn emit_group(group: &DiffGroup, ctx: &RenderContext<'_>) -> Vec<DiffRow> {
    group
        .lines()
        .iter()
        .filter_map(|line| {
            let side = line.primary_side()?;
            let left_threads = match (line.line_type, line.before_number) {
                (LineType::Both, Some(n)) => {
                    ctx.threads.threads_at(ctx.path, Side::Left, n).to_vec()
                }
                _ => Vec::new(),
            };
            Some(DiffRow::Unified(UnifiedRow {
                line_type: line.line_type,
                before_number: line.number_on(Side::Left),
                after_number: line.number_on(Side::Right),
                content: ctx.content_cell(line, side),
                left_threads,
                due_to_rebase: group.due_to_rebase(),
            }))
        })
        .collect()
}
