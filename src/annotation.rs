//! Annotation layers
//!
//! A layer decorates a rendered text cell with presentation metadata: CSS-like
//! classes for the whole cell and highlighted ranges within its text. Layers
//! see the line read-only and run in registration order. A layer that fails
//! or panics is logged and skipped for that cell; the others still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::DiffPreferences;
use crate::diff::{DiffLine, LineType, Side};

/// A highlighted range, in char offsets into the line text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationRange {
    pub start: usize,
    pub len: usize,
    pub class: String,
}

/// Metadata collected for one text cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Annotations {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<AnnotationRange>,
}

impl Annotations {
    pub fn add_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
    }

    /// Zero-length ranges are ignored.
    pub fn add_range(&mut self, start: usize, len: usize, class: impl Into<String>) {
        if len > 0 {
            self.ranges.push(AnnotationRange {
                start,
                len,
                class: class.into(),
            });
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.ranges.is_empty()
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn merge(&mut self, other: Self) {
        for class in other.classes {
            self.add_class(class);
        }
        self.ranges.extend(other.ranges);
    }
}

/// A pluggable cell decorator.
pub trait AnnotationLayer: Send + Sync {
    /// Stable name, used to enable, disable or replace the layer.
    fn name(&self) -> &str;

    /// Add metadata for `line` as rendered on `side`.
    ///
    /// # Errors
    ///
    /// Any error is logged by the registry and the layer's output for this
    /// cell is discarded.
    fn annotate(&self, out: &mut Annotations, line: &DiffLine, side: Side) -> anyhow::Result<()>;
}

struct LayerEntry {
    layer: Arc<dyn AnnotationLayer>,
    enabled: bool,
}

/// Ordered set of annotation layers.
#[derive(Default)]
pub struct LayerRegistry {
    entries: Vec<LayerEntry>,
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.layer.name(), e.enabled)))
            .finish()
    }
}

impl LayerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in layers, enabled according to `prefs`.
    #[must_use]
    pub fn with_builtins(prefs: &DiffPreferences) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(IntralineLayer));
        registry.register(Arc::new(WhitespaceLayer {
            show_tabs: prefs.show_tabs,
        }));
        registry.set_enabled(WhitespaceLayer::NAME, prefs.show_whitespace_errors);
        registry
    }

    /// Append a layer. A layer with the same name is replaced in place.
    pub fn register(&mut self, layer: Arc<dyn AnnotationLayer>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.layer.name() == layer.name()) {
            entry.layer = layer;
        } else {
            self.entries.push(LayerEntry {
                layer,
                enabled: true,
            });
        }
    }

    /// Returns false when no layer has this name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.layer.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.enabled && e.layer.name() == name)
    }

    /// Layer names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.layer.name()).collect()
    }

    /// Run every enabled layer over one cell.
    #[must_use]
    pub fn annotate(&self, line: &DiffLine, side: Side) -> Annotations {
        let mut merged = Annotations::default();
        for entry in self.entries.iter().filter(|e| e.enabled) {
            let layer = entry.layer.as_ref();
            let mut scratch = Annotations::default();
            let result =
                catch_unwind(AssertUnwindSafe(|| layer.annotate(&mut scratch, line, side)));
            match result {
                Ok(Ok(())) => merged.merge(scratch),
                Ok(Err(err)) => {
                    warn!(layer = layer.name(), error = %err, "annotation layer failed");
                }
                Err(_) => {
                    error!(layer = layer.name(), "annotation layer panicked");
                }
            }
        }
        merged
    }
}

/// Marks the intraline edits computed by the server.
pub struct IntralineLayer;

impl IntralineLayer {
    pub const NAME: &'static str = "intraline";
}

impl AnnotationLayer for IntralineLayer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn annotate(&self, out: &mut Annotations, line: &DiffLine, _side: Side) -> anyhow::Result<()> {
        if !matches!(line.line_type, LineType::Add | LineType::Remove) {
            return Ok(());
        }
        let text_len = line.text.chars().count();
        for hl in &line.highlights {
            let end = hl.end.unwrap_or(text_len).min(text_len);
            out.add_range(hl.start, end.saturating_sub(hl.start), Self::NAME);
        }
        Ok(())
    }
}

/// Marks trailing whitespace and, optionally, tabs.
pub struct WhitespaceLayer {
    pub show_tabs: bool,
}

impl WhitespaceLayer {
    pub const NAME: &'static str = "whitespace";
}

impl AnnotationLayer for WhitespaceLayer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn annotate(&self, out: &mut Annotations, line: &DiffLine, _side: Side) -> anyhow::Result<()> {
        let chars: Vec<char> = line.text.chars().collect();
        if self.show_tabs {
            for (i, _) in chars.iter().enumerate().filter(|(_, c)| **c == '\t') {
                out.add_range(i, 1, "tab-indicator");
            }
        }
        // Trailing whitespace only matters on lines the change introduces.
        if line.line_type == LineType::Add {
            let trimmed = chars.iter().rposition(|c| !c.is_whitespace()).map_or(0, |i| i + 1);
            out.add_range(trimmed, chars.len() - trimmed, "trailing");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageType {
    Covered,
    NotCovered,
    PartiallyCovered,
    NotInstrumented,
}

impl CoverageType {
    #[must_use]
    pub const fn class(self) -> &'static str {
        match self {
            Self::Covered => "covered",
            Self::NotCovered => "not-covered",
            Self::PartiallyCovered => "partially-covered",
            Self::NotInstrumented => "not-instrumented",
        }
    }
}

/// Inclusive line range with a coverage state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRange {
    pub side: Side,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(rename = "type")]
    pub kind: CoverageType,
}

/// Adds a line class from externally supplied coverage ranges.
#[derive(Debug, Clone, Default)]
pub struct CoverageLayer {
    ranges: Vec<CoverageRange>,
}

impl CoverageLayer {
    pub const NAME: &'static str = "coverage";

    #[must_use]
    pub fn new(mut ranges: Vec<CoverageRange>) -> Self {
        ranges.sort_by_key(|r| (r.side, r.start_line));
        Self { ranges }
    }
}

impl AnnotationLayer for CoverageLayer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn annotate(&self, out: &mut Annotations, line: &DiffLine, side: Side) -> anyhow::Result<()> {
        let Some(number) = line.number_on(side) else {
            return Ok(());
        };
        if let Some(range) = self
            .ranges
            .iter()
            .find(|r| r.side == side && r.start_line <= number && number <= r.end_line)
        {
            out.add_class(range.kind.class());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Highlight;

    struct FailingLayer;

    impl AnnotationLayer for FailingLayer {
        fn name(&self) -> &str {
            "failing"
        }

        fn annotate(
            &self,
            out: &mut Annotations,
            _line: &DiffLine,
            _side: Side,
        ) -> anyhow::Result<()> {
            out.add_class("should-not-leak");
            anyhow::bail!("layer exploded")
        }
    }

    struct PanickingLayer;

    impl AnnotationLayer for PanickingLayer {
        fn name(&self) -> &str {
            "panicking"
        }

        fn annotate(
            &self,
            _out: &mut Annotations,
            _line: &DiffLine,
            _side: Side,
        ) -> anyhow::Result<()> {
            panic!("layer panicked")
        }
    }

    struct ClassLayer(&'static str);

    impl AnnotationLayer for ClassLayer {
        fn name(&self) -> &str {
            self.0
        }

        fn annotate(
            &self,
            out: &mut Annotations,
            _line: &DiffLine,
            _side: Side,
        ) -> anyhow::Result<()> {
            out.add_class(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_failing_layer_does_not_block_others() {
        let mut registry = LayerRegistry::new();
        registry.register(Arc::new(FailingLayer));
        registry.register(Arc::new(PanickingLayer));
        registry.register(Arc::new(ClassLayer("good")));

        let line = DiffLine::new(LineType::Both, Some(1), Some(1), "x");
        let out = registry.annotate(&line, Side::Right);
        assert_eq!(out.classes, vec!["good".to_string()]);
    }

    #[test]
    fn test_registration_order_and_replace() {
        let mut registry = LayerRegistry::new();
        registry.register(Arc::new(ClassLayer("a")));
        registry.register(Arc::new(ClassLayer("b")));
        registry.register(Arc::new(ClassLayer("a")));
        assert_eq!(registry.names(), vec!["a", "b"]);

        assert!(registry.set_enabled("a", false));
        assert!(!registry.set_enabled("missing", false));
        let line = DiffLine::new(LineType::Both, Some(1), Some(1), "x");
        assert_eq!(registry.annotate(&line, Side::Left).classes, vec!["b".to_string()]);
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_intraline_ranges() {
        let mut line = DiffLine::new(LineType::Add, None, Some(1), "hello world");
        line.highlights = vec![
            Highlight { start: 0, end: Some(5) },
            Highlight { start: 6, end: None },
        ];
        let mut out = Annotations::default();
        IntralineLayer.annotate(&mut out, &line, Side::Right).expect("annotate");
        let spans: Vec<(usize, usize)> = out.ranges.iter().map(|r| (r.start, r.len)).collect();
        assert_eq!(spans, vec![(0, 5), (6, 5)]);
    }

    #[test]
    fn test_whitespace_layer() {
        let line = DiffLine::new(LineType::Add, None, Some(1), "\tlet x = 1;  ");
        let mut out = Annotations::default();
        WhitespaceLayer { show_tabs: true }
            .annotate(&mut out, &line, Side::Right)
            .expect("annotate");
        assert!(out.ranges.iter().any(|r| r.class == "tab-indicator" && r.start == 0));
        assert!(out.ranges.iter().any(|r| r.class == "trailing" && r.start == 11 && r.len == 2));

        let context = DiffLine::new(LineType::Both, Some(1), Some(1), "x  ");
        let mut out = Annotations::default();
        WhitespaceLayer { show_tabs: false }
            .annotate(&mut out, &context, Side::Right)
            .expect("annotate");
        assert!(out.is_empty());
    }

    #[test]
    fn test_coverage_layer_uses_side() {
        let layer = CoverageLayer::new(vec![
            CoverageRange {
                side: Side::Right,
                start_line: 1,
                end_line: 3,
                kind: CoverageType::NotCovered,
            },
            CoverageRange {
                side: Side::Left,
                start_line: 1,
                end_line: 1,
                kind: CoverageType::Covered,
            },
        ]);
        let line = DiffLine::new(LineType::Both, Some(1), Some(2), "x");

        let mut out = Annotations::default();
        layer.annotate(&mut out, &line, Side::Right).expect("annotate");
        assert!(out.has_class("not-covered"));

        let mut out = Annotations::default();
        layer.annotate(&mut out, &line, Side::Left).expect("annotate");
        assert!(out.has_class("covered"));
    }

    #[test]
    fn test_builtins_follow_preferences() {
        let prefs = DiffPreferences {
            show_whitespace_errors: false,
            ..DiffPreferences::default()
        };
        let registry = LayerRegistry::with_builtins(&prefs);
        assert_eq!(registry.names(), vec![IntralineLayer::NAME, WhitespaceLayer::NAME]);
        assert!(registry.is_enabled(IntralineLayer::NAME));
        assert!(!registry.is_enabled(WhitespaceLayer::NAME));
    }

    #[test]
    fn test_coverage_json() {
        let json =
            r#"[{"side": "right", "start_line": 4, "end_line": 9, "type": "PARTIALLY_COVERED"}]"#;
        let ranges: Vec<CoverageRange> = serde_json::from_str(json).expect("parse");
        assert_eq!(ranges[0].kind, CoverageType::PartiallyCovered);
        assert_eq!(ranges[0].kind.class(), "partially-covered");
    }
}
