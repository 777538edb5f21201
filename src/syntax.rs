//! Syntax highlighting using syntect
//!
//! Produces class spans rather than colors: each token gets the first atom
//! of its innermost scope (`keyword`, `string`, `comment`, ...), and the
//! syntax layer emits those as `gr-syntax-*` ranges.

use std::collections::HashMap;
use std::path::Path;

use syntect::parsing::{ParseState, ScopeStack, SyntaxReference, SyntaxSet};
use tracing::debug;

use crate::annotation::{AnnotationLayer, Annotations};
use crate::diff::{DiffInfo, DiffLine, Side};

/// A classified token, in char offsets into the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxSpan {
    pub start: usize,
    pub len: usize,
    pub class: String,
}

/// Syntax highlighter with loaded syntaxes
pub struct Highlighter {
    syntax_set: SyntaxSet,
}

impl Highlighter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    /// Get syntax reference for a file path (by extension)
    fn syntax_for_path(&self, path: &str) -> Option<&SyntaxReference> {
        let path = Path::new(path);

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if let Some(syntax) = self.syntax_set.find_syntax_by_extension(ext) {
                return Some(syntax);
            }
        }

        // Files known by name only
        match path.file_name().and_then(|n| n.to_str())? {
            "Makefile" | "makefile" | "GNUmakefile" => {
                self.syntax_set.find_syntax_by_extension("make")
            }
            "Dockerfile" => self.syntax_set.find_syntax_by_extension("dockerfile"),
            "Cargo.lock" => self.syntax_set.find_syntax_by_extension("toml"),
            "BUILD" | "WORKSPACE" => self.syntax_set.find_syntax_by_extension("py"),
            _ => None,
        }
    }

    /// Create a stateful highlighter for a file (maintains state across lines)
    #[must_use]
    pub fn for_file(&self, file_path: &str) -> Option<FileHighlighter<'_>> {
        let syntax = self.syntax_for_path(file_path)?;
        Some(FileHighlighter {
            parse_state: ParseState::new(syntax),
            stack: ScopeStack::new(),
            syntax_set: &self.syntax_set,
        })
    }

    /// Highlight a single line without any surrounding context.
    #[must_use]
    pub fn highlight_line(&self, line: &str, file_path: &str) -> Option<Vec<SyntaxSpan>> {
        Some(self.for_file(file_path)?.highlight_line(line))
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful highlighter for a single file
///
/// Keeps parser state across lines, which matters for multi-line
/// constructs like strings and block comments.
pub struct FileHighlighter<'a> {
    parse_state: ParseState,
    stack: ScopeStack,
    syntax_set: &'a SyntaxSet,
}

impl FileHighlighter<'_> {
    /// Highlight the next line, maintaining state from previous lines
    pub fn highlight_line(&mut self, line: &str) -> Vec<SyntaxSpan> {
        let with_newline = format!("{line}\n");
        let ops = match self.parse_state.parse_line(&with_newline, self.syntax_set) {
            Ok(ops) => ops,
            Err(err) => {
                debug!(error = %err, "syntax parse failed");
                return Vec::new();
            }
        };

        let mut spans = Vec::new();
        let mut last = 0;
        for (pos, op) in ops {
            let pos = pos.min(line.len());
            if pos > last {
                self.push_span(&mut spans, line, last, pos);
                last = pos;
            }
            if let Err(err) = self.stack.apply(&op) {
                debug!(error = ?err, "scope stack out of sync");
            }
        }
        if line.len() > last {
            self.push_span(&mut spans, line, last, line.len());
        }
        spans
    }

    fn push_span(&self, spans: &mut Vec<SyntaxSpan>, line: &str, from: usize, to: usize) {
        let scopes = self.stack.as_slice();
        // The outermost scope names the language; it is not a token class.
        if scopes.len() < 2 {
            return;
        }
        let Some(scope) = scopes.last() else {
            return;
        };
        let name = scope.build_string();
        let class = name.split('.').next().unwrap_or_default();
        if class.is_empty() {
            return;
        }
        let start = line[..from].chars().count();
        let len = line[from..to].chars().count();
        match spans.last_mut() {
            Some(prev) if prev.class == class && prev.start + prev.len == start => prev.len += len,
            _ => spans.push(SyntaxSpan {
                start,
                len,
                class: class.to_string(),
            }),
        }
    }
}

/// Annotation layer serving precomputed syntax spans by side and line.
#[derive(Debug, Default)]
pub struct SyntaxLayer {
    left: HashMap<u32, Vec<SyntaxSpan>>,
    right: HashMap<u32, Vec<SyntaxSpan>>,
}

impl SyntaxLayer {
    pub const NAME: &'static str = "syntax";

    /// Highlight both sides of `diff`. Returns `None` when no syntax is
    /// known for `path`.
    #[must_use]
    pub fn for_diff(highlighter: &Highlighter, path: &str, diff: &DiffInfo) -> Option<Self> {
        let mut layer = Self::default();
        for side in [Side::Left, Side::Right] {
            let mut file = highlighter.for_file(path)?;
            let spans = match side {
                Side::Left => &mut layer.left,
                Side::Right => &mut layer.right,
            };
            let mut number = 1u32;
            for chunk in &diff.content {
                if let Some(skip) = chunk.skip {
                    number = number.saturating_add(skip);
                    continue;
                }
                for text in chunk.lines_on(side) {
                    let line_spans = file.highlight_line(text);
                    if !line_spans.is_empty() {
                        spans.insert(number, line_spans);
                    }
                    number = number.saturating_add(1);
                }
            }
        }
        debug!(
            path,
            left = layer.left.len(),
            right = layer.right.len(),
            "precomputed syntax spans"
        );
        Some(layer)
    }
}

impl AnnotationLayer for SyntaxLayer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn annotate(&self, out: &mut Annotations, line: &DiffLine, side: Side) -> anyhow::Result<()> {
        let Some(number) = line.number_on(side) else {
            return Ok(());
        };
        let spans = match side {
            Side::Left => self.left.get(&number),
            Side::Right => self.right.get(&number),
        };
        for span in spans.into_iter().flatten() {
            out.add_range(span.start, span.len, format!("gr-syntax-{}", span.class));
        }
        Ok(())
    }
}
