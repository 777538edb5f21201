//! Unified patch parser
//!
//! Parses standard unified diff text and converts it into the chunk payload
//! the processor consumes. Ranges between hunks become `skip` chunks since
//! a patch does not carry their content.

use tracing::warn;

use super::content::{DiffContent, DiffInfo, FileMeta};
use super::line::{NewlineFlags, Side};

/// A parsed unified patch for a single file
#[derive(Debug, Clone, Default)]
pub struct ParsedPatch {
    pub file_a: Option<String>,
    pub file_b: Option<String>,
    pub hunks: Vec<PatchHunk>,
    /// Sides marked with "\ No newline at end of file"
    pub missing_newline: NewlineFlags,
}

/// A single hunk from a patch
#[derive(Debug, Clone)]
pub struct PatchHunk {
    /// The @@ header line
    pub header: String,
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<PatchLine>,
}

impl PatchHunk {
    /// First old-file line this hunk covers; a zero count points past the
    /// line named in the header.
    const fn first_old(&self) -> u32 {
        if self.old_count == 0 {
            self.old_start + 1
        } else {
            self.old_start
        }
    }

    const fn first_new(&self) -> u32 {
        if self.new_count == 0 {
            self.new_start + 1
        } else {
            self.new_start
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLine {
    pub kind: PatchLineKind,
    /// The line content without the +/-/space prefix
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchLineKind {
    Context,
    Added,
    Removed,
}

impl ParsedPatch {
    /// Parse a unified diff string
    #[must_use]
    pub fn parse(diff: &str) -> Self {
        let mut result = Self::default();
        let mut lines = diff.lines().peekable();

        // Header (--- and +++ lines)
        while let Some(line) = lines.peek() {
            if line.starts_with("---") {
                result.file_a = line
                    .strip_prefix("--- ")
                    .and_then(|s| strip_path(s, "a/"));
                lines.next();
            } else if line.starts_with("+++") {
                result.file_b = line
                    .strip_prefix("+++ ")
                    .and_then(|s| strip_path(s, "b/"));
                lines.next();
            } else if line.starts_with("@@") {
                break;
            } else {
                lines.next(); // diff --git, index, mode lines
            }
        }

        while let Some(line) = lines.next() {
            if line.starts_with("@@") {
                if let Some(hunk) = result.parse_hunk(line, &mut lines) {
                    result.hunks.push(hunk);
                } else {
                    warn!(header = line, "skipping unparseable hunk header");
                }
            }
        }

        result
    }

    fn parse_hunk(
        &mut self,
        header: &str,
        lines: &mut std::iter::Peekable<std::str::Lines<'_>>,
    ) -> Option<PatchHunk> {
        // @@ -start,count +start,count @@ optional context
        let parts: Vec<&str> = header.split_whitespace().collect();
        if parts.len() < 3 {
            return None;
        }

        let (old_start, old_count) = parse_range(parts[1].strip_prefix('-')?)?;
        let (new_start, new_count) = parse_range(parts[2].strip_prefix('+')?)?;

        let mut hunk = PatchHunk {
            header: header.to_string(),
            old_start,
            old_count,
            new_start,
            new_count,
            lines: Vec::new(),
        };

        while let Some(&line) = lines.peek() {
            if line.starts_with("@@") || line.starts_with("diff ") {
                break;
            }
            lines.next();

            let (kind, content) = if let Some(content) = line.strip_prefix('+') {
                (PatchLineKind::Added, content)
            } else if let Some(content) = line.strip_prefix('-') {
                (PatchLineKind::Removed, content)
            } else if let Some(content) = line.strip_prefix(' ') {
                (PatchLineKind::Context, content)
            } else if line.is_empty() {
                (PatchLineKind::Context, "")
            } else if line.starts_with('\\') {
                // "\ No newline at end of file" applies to the line before it
                match hunk.lines.last().map(|l| l.kind) {
                    Some(PatchLineKind::Removed) => self.missing_newline.set(Side::Left),
                    Some(PatchLineKind::Added) => self.missing_newline.set(Side::Right),
                    Some(PatchLineKind::Context) => {
                        self.missing_newline.set(Side::Left);
                        self.missing_newline.set(Side::Right);
                    }
                    None => {}
                }
                continue;
            } else {
                (PatchLineKind::Context, line)
            };

            hunk.lines.push(PatchLine {
                kind,
                content: content.to_string(),
            });
        }

        Some(hunk)
    }

    /// Total number of lines across all hunks
    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.hunks.iter().map(|h| h.lines.len()).sum()
    }

    /// Convert into the server chunk payload.
    ///
    /// Context lines become `ab` chunks, runs of removed and added lines
    /// become `a`/`b` chunks, and unchanged ranges not covered by any hunk
    /// become `skip` chunks. Content after the last hunk is unknown and is
    /// left out.
    #[must_use]
    pub fn to_diff_info(&self) -> DiffInfo {
        let mut content = Vec::new();
        let mut next_old = 1u32;
        let mut next_new = 1u32;

        for hunk in &self.hunks {
            let gap_old = hunk.first_old().saturating_sub(next_old);
            let gap_new = hunk.first_new().saturating_sub(next_new);
            if gap_old != gap_new {
                warn!(
                    header = %hunk.header,
                    gap_old,
                    gap_new,
                    "hunk gap differs between sides"
                );
            }
            let gap = gap_old.min(gap_new);
            if gap > 0 {
                content.push(DiffContent::skipped(gap));
            }
            next_old += gap;
            next_new += gap;

            let mut pending = ChunkBuilder::default();
            for line in &hunk.lines {
                match line.kind {
                    PatchLineKind::Context => {
                        pending.flush_delta(&mut content);
                        pending.common.push(line.content.clone());
                        next_old += 1;
                        next_new += 1;
                    }
                    PatchLineKind::Removed => {
                        pending.flush_common(&mut content);
                        pending.removed.push(line.content.clone());
                        next_old += 1;
                    }
                    PatchLineKind::Added => {
                        pending.flush_common(&mut content);
                        pending.added.push(line.content.clone());
                        next_new += 1;
                    }
                }
            }
            pending.flush_common(&mut content);
            pending.flush_delta(&mut content);
        }

        DiffInfo {
            meta_a: self.file_a.as_ref().map(|name| FileMeta {
                name: name.clone(),
                ..FileMeta::default()
            }),
            meta_b: self.file_b.as_ref().map(|name| FileMeta {
                name: name.clone(),
                ..FileMeta::default()
            }),
            change_type: Some(self.change_type().to_string()),
            content,
            binary: false,
            missing_newline: Some(self.missing_newline),
        }
    }

    fn change_type(&self) -> &'static str {
        match (&self.file_a, &self.file_b) {
            (None, Some(_)) => "ADDED",
            (Some(_), None) => "DELETED",
            (Some(a), Some(b)) if a != b => "RENAMED",
            _ => "MODIFIED",
        }
    }
}

#[derive(Default)]
struct ChunkBuilder {
    common: Vec<String>,
    removed: Vec<String>,
    added: Vec<String>,
}

impl ChunkBuilder {
    fn flush_common(&mut self, content: &mut Vec<DiffContent>) {
        if !self.common.is_empty() {
            content.push(DiffContent::common(std::mem::take(&mut self.common)));
        }
    }

    fn flush_delta(&mut self, content: &mut Vec<DiffContent>) {
        if self.removed.is_empty() && self.added.is_empty() {
            return;
        }
        let removed = std::mem::take(&mut self.removed);
        let added = std::mem::take(&mut self.added);
        content.push(DiffContent {
            a: (!removed.is_empty()).then_some(removed),
            b: (!added.is_empty()).then_some(added),
            ..DiffContent::default()
        });
    }
}

/// `/dev/null` means the side does not exist.
fn strip_path(path: &str, prefix: &str) -> Option<String> {
    let path = path.split('\t').next().unwrap_or(path);
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

fn parse_range(s: &str) -> Option<(u32, u32)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        // "5" means start=5, count=1
        Some((s.parse().ok()?, 1))
    }
}
