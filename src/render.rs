//! Render driver
//!
//! Owns one file's diff and everything needed to turn it into rows. Rows
//! are produced by incremental passes: each `step` processes one batch of
//! groups and appends its rows, so a caller can yield between steps. A
//! pass carries the generation it was started in; starting a new pass
//! supersedes older ones, and their steps are cancelled without touching
//! state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::annotation::{CoverageLayer, CoverageRange, LayerRegistry, WhitespaceLayer};
use crate::config::{CritDiffConfig, DiffPreferences, RenderPreferences};
use crate::diff::{
    DiffGroup, DiffInfo, DiffProcessor, GroupType, KeyLocations, LineRange, ProcessTask, Side,
};
use crate::error::DiffError;
use crate::model::{DiffViewMode, ViewModeState};
use crate::syntax::{Highlighter, SyntaxLayer};
use crate::view::diff::{expand_control, file_row, ExpandAction, ExpandError, ThreadMap};
use crate::view::{DiffBuilder, DiffRow, RenderContext};

/// An in-flight incremental render.
#[derive(Debug)]
pub struct RenderPass {
    generation: u64,
    task: ProcessTask,
}

impl RenderPass {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A batch was committed
    Progress { groups: usize, rows: usize },
    Done,
    /// The pass was superseded by a newer one
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    Expanded { groups: usize },
    /// No control hides this range any more
    NotFound,
    /// The hidden lines were skipped by the server and must be fetched first
    ContentLoadNeeded,
}

pub struct DiffRenderer {
    path: String,
    diff: DiffInfo,
    prefs: DiffPreferences,
    render: RenderPreferences,
    threads: ThreadMap,
    layers: LayerRegistry,
    focus: KeyLocations,
    mode: ViewModeState,
    groups: Vec<DiffGroup>,
    rows: Vec<DiffRow>,
    generation: u64,
}

impl DiffRenderer {
    /// # Errors
    ///
    /// Returns an error if the preferences are invalid.
    pub fn new(diff: DiffInfo, config: &CritDiffConfig) -> Result<Self, DiffError> {
        config.preferences.validate()?;
        let path = diff.path().unwrap_or_default().to_string();
        Ok(Self {
            path,
            diff: diff.sanitized(),
            layers: LayerRegistry::with_builtins(&config.preferences),
            prefs: config.preferences.clone(),
            render: config.render.clone(),
            threads: ThreadMap::new(),
            focus: KeyLocations::default(),
            mode: ViewModeState::new(config.render.view_mode),
            groups: Vec::new(),
            rows: Vec::new(),
            generation: 0,
        })
    }

    /// Override the path used for thread lookup and syntax detection.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: ThreadMap) -> Self {
        self.threads = threads;
        self
    }

    /// Register the syntax layer for this file, enabled per preferences.
    /// Files with no known syntax get no layer.
    ///
    /// Call this even when highlighting starts disabled if a later
    /// `set_preferences` may turn it on; that call only toggles a layer
    /// registered here.
    #[must_use]
    pub fn with_highlighter(mut self, highlighter: &Highlighter) -> Self {
        if let Some(layer) = SyntaxLayer::for_diff(highlighter, &self.path, &self.diff) {
            self.layers.register(Arc::new(layer));
            self.layers
                .set_enabled(SyntaxLayer::NAME, self.prefs.syntax_highlighting);
        }
        self
    }

    #[must_use]
    pub fn with_coverage(mut self, ranges: Vec<CoverageRange>) -> Self {
        self.layers.register(Arc::new(CoverageLayer::new(ranges)));
        self
    }

    /// Keep a line visible regardless of context collapsing.
    pub fn add_focus_line(&mut self, side: Side, line: u32) {
        self.focus.insert(side, line);
    }

    pub const fn layers_mut(&mut self) -> &mut LayerRegistry {
        &mut self.layers
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn groups(&self) -> &[DiffGroup] {
        &self.groups
    }

    #[must_use]
    pub const fn layers(&self) -> &LayerRegistry {
        &self.layers
    }

    #[must_use]
    pub fn rows(&self) -> &[DiffRow] {
        &self.rows
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn mode(&self) -> DiffViewMode {
        self.mode.effective()
    }

    #[must_use]
    pub const fn preferences(&self) -> &DiffPreferences {
        &self.prefs
    }

    /// Begin a new render, superseding any pass in flight.
    pub fn start_pass(&mut self) -> RenderPass {
        self.generation = self.generation.saturating_add(1);
        self.groups.clear();
        self.rows.clear();

        let dropped = self.threads.drop_stale(&self.path, &self.diff);
        if dropped > 0 {
            info!(path = %self.path, dropped, "dropped stale comment threads");
        }

        let mut keys = self.threads.key_locations(&self.path);
        keys.left.extend(self.focus.left.iter().copied());
        keys.right.extend(self.focus.right.iter().copied());

        let processor = DiffProcessor::new(self.prefs.context)
            .with_lines_at_once(self.render.num_lines_rendered_at_once)
            .with_key_locations(keys);
        if self.render.show_file_comment_row {
            let row = file_row(&self.context());
            self.rows.push(row);
        }
        debug!(generation = self.generation, path = %self.path, "render pass started");
        RenderPass {
            generation: self.generation,
            task: processor.start(&self.diff),
        }
    }

    /// Process and commit one batch.
    pub fn step(&mut self, pass: &mut RenderPass) -> StepOutcome {
        if pass.generation != self.generation {
            debug!(
                pass = pass.generation,
                current = self.generation,
                "render pass superseded"
            );
            return StepOutcome::Cancelled;
        }
        let Some(batch) = pass.task.next() else {
            return StepOutcome::Done;
        };

        let builder = DiffBuilder::for_mode(self.mode.effective());
        let ctx = self.context();
        let rows: Vec<DiffRow> = batch
            .iter()
            .flat_map(|group| builder.emit_group(group, &ctx))
            .collect();
        let outcome = StepOutcome::Progress {
            groups: batch.len(),
            rows: rows.len(),
        };
        self.groups.extend(batch);
        self.rows.extend(rows);
        outcome
    }

    /// Commit batches until `budget` is spent or the pass ends.
    pub fn step_for(&mut self, pass: &mut RenderPass, budget: Duration) -> StepOutcome {
        let started = Instant::now();
        loop {
            let outcome = self.step(pass);
            if !matches!(outcome, StepOutcome::Progress { .. }) || started.elapsed() >= budget {
                return outcome;
            }
        }
    }

    /// One time slice as configured.
    pub fn step_slice(&mut self, pass: &mut RenderPass) -> StepOutcome {
        let budget = Duration::from_millis(self.render.time_slice_ms);
        self.step_for(pass, budget)
    }

    /// Run a fresh pass to completion.
    pub fn render_all(&mut self) -> &[DiffRow] {
        let mut pass = self.start_pass();
        while let StepOutcome::Progress { .. } = self.step(&mut pass) {}
        &self.rows
    }

    /// Expand the context control hiding `range`.
    pub fn expand_context(&mut self, range: LineRange, action: ExpandAction) -> ExpandOutcome {
        let Some(index) = self
            .groups
            .iter()
            .position(|g| g.group_type() == GroupType::ContextControl && g.line_range() == range)
        else {
            debug!(?range, "no context control for range");
            return ExpandOutcome::NotFound;
        };
        match expand_control(&self.groups[index], action) {
            Ok(expanded) => {
                let count = expanded.len();
                self.groups.splice(index..=index, expanded);
                self.rebuild_rows();
                ExpandOutcome::Expanded { groups: count }
            }
            Err(ExpandError::ContentLoadNeeded) => ExpandOutcome::ContentLoadNeeded,
            Err(ExpandError::NotAControl) => ExpandOutcome::NotFound,
        }
    }

    /// Expand every context control whose lines are loaded.
    pub fn expand_all(&mut self) -> usize {
        let mut expanded = 0;
        loop {
            let next = self.groups.iter().find_map(|g| {
                (g.group_type() == GroupType::ContextControl && !g.has_skip_group())
                    .then(|| g.line_range())
            });
            let Some(range) = next else {
                return expanded;
            };
            let outcome = self.expand_context(range, ExpandAction::All);
            if !matches!(outcome, ExpandOutcome::Expanded { .. }) {
                return expanded;
            }
            expanded += 1;
        }
    }

    /// Explicit mode toggle; rows are rebuilt from the same groups.
    pub fn toggle_mode(&mut self) -> DiffViewMode {
        if self.mode.toggle() {
            self.rebuild_rows();
        }
        self.mode.effective()
    }

    pub fn set_mode(&mut self, mode: DiffViewMode) {
        if self.mode.set_preferred(mode) {
            self.rebuild_rows();
        }
    }

    /// Viewport width changed; may force unified mode.
    pub fn resize(&mut self, width: u32) {
        if self.mode.resize(width) {
            debug!(width, mode = ?self.mode.effective(), "view mode changed on resize");
            self.rebuild_rows();
        }
    }

    /// Apply new preferences and start over.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the current state untouched, if the
    /// preferences are invalid.
    pub fn set_preferences(&mut self, prefs: DiffPreferences) -> Result<RenderPass, DiffError> {
        prefs.validate()?;
        let has_syntax = self
            .layers
            .set_enabled(SyntaxLayer::NAME, prefs.syntax_highlighting);
        if prefs.syntax_highlighting && !has_syntax {
            warn!(
                path = %self.path,
                "syntax highlighting requested but no syntax layer is registered"
            );
        }
        self.layers.register(Arc::new(WhitespaceLayer {
            show_tabs: prefs.show_tabs,
        }));
        self.layers
            .set_enabled(WhitespaceLayer::NAME, prefs.show_whitespace_errors);
        self.prefs = prefs;
        Ok(self.start_pass())
    }

    fn rebuild_rows(&mut self) {
        let builder = DiffBuilder::for_mode(self.mode.effective());
        let ctx = self.context();
        let rows = builder.build(&self.groups, &ctx);
        self.rows = rows;
    }

    fn context(&self) -> RenderContext<'_> {
        RenderContext {
            path: &self.path,
            prefs: &self.prefs,
            threads: &self.threads,
            layers: &self.layers,
            left_line_count: self.diff.left_line_count(),
            show_file_row: self.render.show_file_comment_row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffContent;
    use crate::view::diff::CommentThread;

    fn numbered(prefix: &str, count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("{prefix}{i}")).collect()
    }

    fn big_diff() -> DiffInfo {
        let mut content = Vec::new();
        for i in 0..10 {
            content.push(DiffContent::common(numbered(&format!("c{i}-"), 40)));
            content.push(DiffContent::added(numbered(&format!("n{i}-"), 5)));
        }
        content.push(DiffContent::common(vec![String::new()]));
        DiffInfo::new(content)
    }

    fn renderer(diff: DiffInfo) -> DiffRenderer {
        let mut config = CritDiffConfig::default();
        config.render.num_lines_rendered_at_once = 16;
        DiffRenderer::new(diff, &config)
            .expect("valid config")
            .with_path("src/lib.rs")
    }

    fn control_ranges(renderer: &DiffRenderer) -> Vec<LineRange> {
        renderer
            .groups()
            .iter()
            .filter(|g| g.group_type() == GroupType::ContextControl)
            .map(DiffGroup::line_range)
            .collect()
    }

    #[test]
    fn test_incremental_pass_matches_render_all() {
        let mut incremental = renderer(big_diff());
        let mut pass = incremental.start_pass();
        let mut steps = 0;
        while let StepOutcome::Progress { .. } = incremental.step(&mut pass) {
            steps += 1;
        }
        assert!(steps > 1);

        let mut whole = renderer(big_diff());
        whole.render_all();
        assert_eq!(incremental.rows(), whole.rows());
        assert_eq!(incremental.groups(), whole.groups());
    }

    #[test]
    fn test_superseded_pass_is_cancelled() {
        let mut r = renderer(big_diff());
        let mut old = r.start_pass();
        assert!(matches!(r.step(&mut old), StepOutcome::Progress { .. }));

        let mut new = r.start_pass();
        let rows_before = r.rows().len();
        assert_eq!(r.step(&mut old), StepOutcome::Cancelled);
        assert_eq!(r.rows().len(), rows_before);

        while let StepOutcome::Progress { .. } = r.step(&mut new) {}
        assert_eq!(r.step(&mut new), StepOutcome::Done);
        assert_eq!(new.generation(), r.generation());
    }

    #[test]
    fn test_step_for_spends_budget() {
        let mut r = renderer(big_diff());
        let mut pass = r.start_pass();
        let outcome = r.step_for(&mut pass, Duration::from_secs(10));
        assert_eq!(outcome, StepOutcome::Done);
        assert!(!r.groups().is_empty());
    }

    #[test]
    fn test_expand_context_is_idempotent() {
        let mut r = renderer(big_diff());
        r.render_all();
        let ranges = control_ranges(&r);
        let range = ranges[0];
        let rows_before = r.rows().len();

        assert!(matches!(
            r.expand_context(range, ExpandAction::All),
            ExpandOutcome::Expanded { .. }
        ));
        let rows_after = r.rows().len();
        assert!(rows_after > rows_before);

        assert_eq!(r.expand_context(range, ExpandAction::All), ExpandOutcome::NotFound);
        assert_eq!(r.rows().len(), rows_after);
    }

    #[test]
    fn test_partial_expand_shrinks_control() {
        let mut r = renderer(big_diff());
        r.render_all();
        let range = control_ranges(&r)[1];
        assert!(matches!(
            r.expand_context(range, ExpandAction::Below(10)),
            ExpandOutcome::Expanded { groups: 2 }
        ));
        let new_range = control_ranges(&r)[1];
        assert_eq!(new_range.left.start, range.left.start);
        assert_eq!(new_range.left.end, range.left.end - 10);
    }

    #[test]
    fn test_huge_skip_renders_without_overflow() {
        let diff = DiffInfo::new(vec![
            DiffContent::common(vec!["a".to_string()]),
            DiffContent::skipped(u32::MAX),
        ]);
        let mut r = renderer(diff);
        r.render_all();
        let range = *control_ranges(&r).last().expect("skip control");
        assert_eq!(range.left.end, crate::layout::MAX_FILE_LINES);
        assert_eq!(
            r.expand_context(range, ExpandAction::All),
            ExpandOutcome::ContentLoadNeeded
        );
    }

    #[test]
    fn test_skipped_content_needs_loading() {
        let diff = DiffInfo::new(vec![
            DiffContent::skipped(200),
            DiffContent::added(vec!["x".to_string()]),
        ]);
        let mut r = renderer(diff);
        r.render_all();
        let range = control_ranges(&r)[0];
        assert_eq!(
            r.expand_context(range, ExpandAction::All),
            ExpandOutcome::ContentLoadNeeded
        );
        assert_eq!(r.expand_all(), 0);
    }

    #[test]
    fn test_toggle_mode_rebuilds_from_same_groups() {
        let mut r = renderer(big_diff());
        r.render_all();
        let groups = r.groups().to_vec();
        assert_eq!(r.mode(), DiffViewMode::SideBySide);
        assert!(r.rows().iter().any(|row| matches!(row, DiffRow::SideBySide(_))));

        assert_eq!(r.toggle_mode(), DiffViewMode::Unified);
        assert_eq!(r.groups(), groups.as_slice());
        assert!(r.rows().iter().all(|row| !matches!(row, DiffRow::SideBySide(_))));

        r.set_mode(DiffViewMode::SideBySide);
        r.resize(60);
        assert_eq!(r.mode(), DiffViewMode::SideBySide);
        assert!(r.rows().iter().any(|row| matches!(row, DiffRow::SideBySide(_))));
    }

    #[test]
    fn test_narrow_resize_falls_back_until_toggled() {
        let mut r = renderer(big_diff());
        r.render_all();
        r.resize(60);
        assert_eq!(r.mode(), DiffViewMode::Unified);
        assert!(r.rows().iter().any(|row| matches!(row, DiffRow::Unified(_))));

        assert_eq!(r.toggle_mode(), DiffViewMode::SideBySide);
        assert!(r.rows().iter().any(|row| matches!(row, DiffRow::SideBySide(_))));
    }

    #[test]
    fn test_threads_keep_lines_visible_and_stale_are_dropped() {
        let threads = ThreadMap::from_threads([
            CommentThread {
                id: "deep".to_string(),
                path: "src/lib.rs".to_string(),
                side: Side::Right,
                line: Some(20),
                comments: Vec::new(),
            },
            CommentThread {
                id: "stale".to_string(),
                path: "src/lib.rs".to_string(),
                side: Side::Left,
                line: Some(10_000),
                comments: Vec::new(),
            },
        ]);
        let mut r = renderer(big_diff()).with_threads(threads);
        r.render_all();
        let ids: Vec<&str> = r.rows().iter().flat_map(DiffRow::thread_ids).collect();
        assert_eq!(ids, vec!["deep"]);
        assert!(control_ranges(&r)
            .iter()
            .all(|range| !range.right.contains(20)));
    }

    #[test]
    fn test_thread_in_skipped_range_is_dropped() {
        let diff = DiffInfo::new(vec![
            DiffContent::common(numbered("l", 5)),
            DiffContent::skipped(100),
            DiffContent::added(vec!["x".to_string()]),
        ]);
        let anchor = |id: &str, line| CommentThread {
            id: id.to_string(),
            path: "src/lib.rs".to_string(),
            side: Side::Right,
            line: Some(line),
            comments: Vec::new(),
        };
        let threads = ThreadMap::from_threads([anchor("hidden", 50), anchor("added", 106)]);
        let mut r = renderer(diff).with_threads(threads);
        r.render_all();
        let ids: Vec<&str> = r.rows().iter().flat_map(DiffRow::thread_ids).collect();
        assert_eq!(ids, vec!["added"]);
    }

    #[test]
    fn test_focus_line_is_visible() {
        let mut r = renderer(big_diff());
        r.add_focus_line(Side::Left, 5);
        r.render_all();
        assert!(control_ranges(&r).iter().all(|range| !range.left.contains(5)));
    }

    #[test]
    fn test_invalid_preferences_rejected() {
        let mut r = renderer(big_diff());
        r.render_all();
        let generation = r.generation();
        let bad = DiffPreferences {
            line_length: 0,
            ..DiffPreferences::default()
        };
        assert!(r.set_preferences(bad).is_err());
        assert_eq!(r.generation(), generation);

        let whole_file = DiffPreferences {
            context: crate::layout::WHOLE_FILE_CONTEXT,
            ..DiffPreferences::default()
        };
        let mut pass = r.set_preferences(whole_file).expect("valid");
        while let StepOutcome::Progress { .. } = r.step(&mut pass) {}
        assert!(control_ranges(&r).is_empty());
    }

    #[test]
    fn test_syntax_preference_needs_registered_layer() {
        let mut r = renderer(big_diff());
        let prefs = DiffPreferences {
            syntax_highlighting: true,
            ..DiffPreferences::default()
        };
        r.set_preferences(prefs.clone()).expect("valid");
        assert!(!r.layers().is_enabled(SyntaxLayer::NAME));

        let mut r = renderer(big_diff()).with_highlighter(&Highlighter::new());
        r.set_preferences(DiffPreferences {
            syntax_highlighting: false,
            ..prefs.clone()
        })
        .expect("valid");
        assert!(!r.layers().is_enabled(SyntaxLayer::NAME));
        r.set_preferences(prefs).expect("valid");
        assert!(r.layers().is_enabled(SyntaxLayer::NAME));
    }
}
