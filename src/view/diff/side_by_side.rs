//! Side-by-side rows (two panes with left=old, right=new).

use crate::diff::{DiffGroup, Side};

use super::{DiffRow, RenderContext, SideBySideRow};

/// One row per left/right pair; blank padding where a side has no line.
pub(super) fn emit_group(group: &DiffGroup, ctx: &RenderContext<'_>) -> Vec<DiffRow> {
    group
        .side_by_side_pairs()
        .into_iter()
        .filter(|pair| pair.left.is_some() || pair.right.is_some())
        .map(|pair| {
            DiffRow::SideBySide(SideBySideRow {
                left: ctx.side_cell(pair.left, Side::Left),
                right: ctx.side_cell(pair.right, Side::Right),
                group_type: group.group_type(),
                due_to_rebase: group.due_to_rebase(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{thread, Fixture};
    use super::super::ThreadMap;
    use super::*;
    use crate::diff::{DiffLine, GroupOptions, GroupType, LineType};

    fn replace_group() -> DiffGroup {
        DiffGroup::new(
            GroupType::Delta,
            vec![
                DiffLine::new(LineType::Remove, Some(2), None, "old"),
                DiffLine::new(LineType::Add, None, Some(2), "new1"),
                DiffLine::new(LineType::Add, None, Some(3), "new2"),
            ],
        )
    }

    fn sbs(row: &DiffRow) -> &SideBySideRow {
        match row {
            DiffRow::SideBySide(row) => row,
            other => panic!("expected side-by-side row, got {other:?}"),
        }
    }

    #[test]
    fn test_pads_shorter_side() {
        let fixture = Fixture::new(ThreadMap::new());
        let rows = emit_group(&replace_group(), &fixture.ctx());
        assert_eq!(rows.len(), 2);

        let first = sbs(&rows[0]);
        assert_eq!(first.left.number, Some(2));
        assert_eq!(first.left.content.as_ref().map(|c| c.text.as_str()), Some("old"));
        assert_eq!(first.right.number, Some(2));

        let second = sbs(&rows[1]);
        assert!(second.left.is_blank());
        assert!(second.left.content.is_none());
        assert_eq!(second.right.number, Some(3));
    }

    #[test]
    fn test_threads_attach_per_side() {
        let fixture = Fixture::new(ThreadMap::from_threads([
            thread("left", Side::Left, Some(2)),
            thread("right", Side::Right, Some(3)),
            thread("right-on-2", Side::Right, Some(2)),
        ]));
        let rows = emit_group(&replace_group(), &fixture.ctx());
        let first = sbs(&rows[0]);
        let left_ids: Vec<&str> = first
            .left
            .content
            .iter()
            .flat_map(|c| c.threads.iter().map(|t| t.id.as_str()))
            .collect();
        assert_eq!(left_ids, vec!["left"]);
        assert_eq!(rows[0].thread_ids(), vec!["left", "right-on-2"]);
        assert_eq!(rows[1].thread_ids(), vec!["right"]);
    }

    #[test]
    fn test_unchanged_lines_show_both_numbers() {
        let fixture = Fixture::new(ThreadMap::new());
        let group = DiffGroup::with_options(
            GroupType::Both,
            vec![DiffLine::new(LineType::Both, Some(3), Some(4), "y")],
            GroupOptions {
                due_to_rebase: true,
                ..GroupOptions::default()
            },
        );
        let rows = emit_group(&group, &fixture.ctx());
        let row = sbs(&rows[0]);
        assert_eq!((row.left.number, row.right.number), (Some(3), Some(4)));
        assert!(row.due_to_rebase);
    }
}
