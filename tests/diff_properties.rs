use crit_diff::annotation::LayerRegistry;
use crit_diff::config::DiffPreferences;
use crit_diff::diff::{DiffContent, DiffGroup, DiffInfo, DiffProcessor, GroupType, Side};
use crit_diff::layout::WHOLE_FILE_CONTEXT;
use crit_diff::view::diff::ThreadMap;
use crit_diff::view::{DiffBuilder, DiffRow, RenderContext};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Chunk {
    Common(usize),
    Removed(usize),
    Added(usize),
    Replace(usize, usize),
}

fn chunk() -> impl Strategy<Value = Chunk> {
    prop_oneof![
        (1usize..30).prop_map(Chunk::Common),
        (1usize..6).prop_map(Chunk::Removed),
        (1usize..6).prop_map(Chunk::Added),
        (1usize..6, 1usize..6).prop_map(|(a, b)| Chunk::Replace(a, b)),
    ]
}

/// Build a payload and the expected text of each side.
fn payload(chunks: &[Chunk]) -> (DiffInfo, Vec<String>, Vec<String>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut content = Vec::new();
    let mut next = 0usize;
    let mut fresh = |count: usize, prefix: &str| {
        let lines: Vec<String> = (0..count).map(|i| format!("{prefix}{}", next + i)).collect();
        next += count;
        lines
    };
    for chunk in chunks {
        match *chunk {
            Chunk::Common(n) => {
                let lines = fresh(n, "same");
                left.extend(lines.iter().cloned());
                right.extend(lines.iter().cloned());
                content.push(DiffContent::common(lines));
            }
            Chunk::Removed(n) => {
                let lines = fresh(n, "old");
                left.extend(lines.iter().cloned());
                content.push(DiffContent::removed(lines));
            }
            Chunk::Added(n) => {
                let lines = fresh(n, "new");
                right.extend(lines.iter().cloned());
                content.push(DiffContent::added(lines));
            }
            Chunk::Replace(a, b) => {
                let old = fresh(a, "old");
                let new = fresh(b, "new");
                left.extend(old.iter().cloned());
                right.extend(new.iter().cloned());
                content.push(DiffContent {
                    a: Some(old),
                    b: Some(new),
                    ..DiffContent::default()
                });
            }
        }
    }
    (DiffInfo::new(content), left, right)
}

/// Text of every line on `side`, looking inside context controls.
fn side_text(groups: &[DiffGroup], side: Side) -> Vec<String> {
    let mut out = Vec::new();
    for group in groups {
        if group.group_type() == GroupType::ContextControl {
            out.extend(side_text(group.context_groups(), side));
            continue;
        }
        out.extend(
            group
                .lines()
                .iter()
                .filter(|line| line.is_on(side))
                .map(|line| line.text.clone()),
        );
    }
    out
}

fn build(groups: &[DiffGroup], builder: DiffBuilder) -> Vec<DiffRow> {
    let prefs = DiffPreferences::default();
    let threads = ThreadMap::new();
    let layers = LayerRegistry::with_builtins(&prefs);
    let ctx = RenderContext {
        path: "src/lib.rs",
        prefs: &prefs,
        threads: &threads,
        layers: &layers,
        left_line_count: 0,
        show_file_row: false,
    };
    builder.build(groups, &ctx)
}

fn numbers(rows: &[DiffRow], side: Side) -> Vec<u32> {
    rows.iter()
        .flat_map(DiffRow::code_triples)
        .filter(|(_, _, s)| *s == side)
        .map(|(_, n, _)| n)
        .collect()
}

proptest! {
    #[test]
    fn groups_reconstruct_both_files(
        chunks in prop::collection::vec(chunk(), 1..12),
        context in prop_oneof![Just(WHOLE_FILE_CONTEXT), 0i32..5],
    ) {
        let (diff, left, right) = payload(&chunks);
        let groups = DiffProcessor::new(context).with_lines_at_once(4).process(&diff);
        prop_assert_eq!(side_text(&groups, Side::Left), left);
        prop_assert_eq!(side_text(&groups, Side::Right), right);
    }

    #[test]
    fn pairs_cover_each_group(chunks in prop::collection::vec(chunk(), 1..12)) {
        let (diff, _, _) = payload(&chunks);
        for group in DiffProcessor::new(WHOLE_FILE_CONTEXT).process(&diff) {
            let pairs = group.side_by_side_pairs();
            let expected = match group.group_type() {
                GroupType::Delta => group.removes().count().max(group.adds().count()),
                _ => group.lines().len(),
            };
            prop_assert_eq!(pairs.len(), expected);
        }
    }

    #[test]
    fn side_by_side_rows_show_every_line_once(chunks in prop::collection::vec(chunk(), 1..12)) {
        let (diff, left, right) = payload(&chunks);
        let groups = DiffProcessor::new(WHOLE_FILE_CONTEXT).process(&diff);
        let rows = build(&groups, DiffBuilder::SideBySide);

        let expected_left: Vec<u32> = (1..=left.len() as u32).collect();
        let expected_right: Vec<u32> = (1..=right.len() as u32).collect();
        prop_assert_eq!(numbers(&rows, Side::Left), expected_left);
        prop_assert_eq!(numbers(&rows, Side::Right), expected_right);
    }

    #[test]
    fn visible_numbers_increase(
        chunks in prop::collection::vec(chunk(), 1..12),
        context in 0i32..5,
    ) {
        let (diff, _, _) = payload(&chunks);
        let groups = DiffProcessor::new(context).process(&diff);
        for builder in [DiffBuilder::SideBySide, DiffBuilder::Unified] {
            let rows = build(&groups, builder);
            for side in [Side::Left, Side::Right] {
                let numbers = numbers(&rows, side);
                prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]), "{:?} {:?}", side, numbers);
            }
        }
    }

    #[test]
    fn both_modes_show_the_same_lines(
        chunks in prop::collection::vec(chunk(), 1..12),
        context in prop_oneof![Just(WHOLE_FILE_CONTEXT), 0i32..5],
    ) {
        let (diff, _, _) = payload(&chunks);
        let groups = DiffProcessor::new(context).process(&diff);
        let triples = |builder| {
            let mut triples: Vec<(String, u32, Side)> = build(&groups, builder)
                .iter()
                .flat_map(DiffRow::code_triples)
                .map(|(text, n, side)| (text.to_string(), n, side))
                .collect();
            triples.sort();
            triples
        };
        prop_assert_eq!(triples(DiffBuilder::SideBySide), triples(DiffBuilder::Unified));
    }
}
