//! Comment threads and their anchors.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diff::{DiffInfo, KeyLocations, Side};
use crate::error::DiffError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// A thread anchored to `(path, side, line)`; `line == None` is a file-level
/// thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
    pub id: String,
    pub path: String,
    pub side: Side,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

type Anchor = (Side, Option<u32>);

/// Threads by path and anchor, in insertion order per anchor.
#[derive(Debug, Clone, Default)]
pub struct ThreadMap {
    by_path: BTreeMap<String, BTreeMap<Anchor, Vec<CommentThread>>>,
}

impl ThreadMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_threads(threads: impl IntoIterator<Item = CommentThread>) -> Self {
        let mut map = Self::new();
        for thread in threads {
            map.insert(thread);
        }
        map
    }

    /// Load a JSON array of threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read comments: {}", path.display()))?;
        let threads: Vec<CommentThread> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse comments: {}", path.display()))?;
        Ok(Self::from_threads(threads))
    }

    pub fn insert(&mut self, thread: CommentThread) {
        self.by_path
            .entry(thread.path.clone())
            .or_default()
            .entry((thread.side, thread.line))
            .or_default()
            .push(thread);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Threads anchored to a line.
    #[must_use]
    pub fn threads_at(&self, path: &str, side: Side, line: u32) -> &[CommentThread] {
        self.by_path
            .get(path)
            .and_then(|anchors| anchors.get(&(side, Some(line))))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// File-level threads, left side first.
    #[must_use]
    pub fn file_threads(&self, path: &str) -> Vec<&CommentThread> {
        [Side::Left, Side::Right]
            .into_iter()
            .filter_map(|side| self.by_path.get(path)?.get(&(side, None)))
            .flatten()
            .collect()
    }

    /// Lines with threads, which must not be hidden behind context controls.
    #[must_use]
    pub fn key_locations(&self, path: &str) -> KeyLocations {
        let mut keys = KeyLocations::default();
        if let Some(anchors) = self.by_path.get(path) {
            for &(side, line) in anchors.keys() {
                if let Some(line) = line {
                    keys.insert(side, line);
                }
            }
        }
        keys
    }

    /// Drop threads for `path` that no row of `diff` can show: anchored past
    /// the end of their side, or inside a skipped range. Returns the number
    /// dropped.
    pub fn drop_stale(&mut self, path: &str, diff: &DiffInfo) -> usize {
        let Some(anchors) = self.by_path.get_mut(path) else {
            return 0;
        };
        let left = diff.line_count(Side::Left);
        let right = diff.line_count(Side::Right);
        let mut dropped = 0;
        anchors.retain(|&(side, line), threads| {
            let Some(line) = line else {
                return true;
            };
            let count = match side {
                Side::Left => left,
                Side::Right => right,
            };
            let in_file = (1..=count).contains(&line);
            if in_file && !diff.is_skipped(side, line) {
                return true;
            }
            for thread in threads.iter() {
                let thread_id = thread.id.clone();
                let err = if in_file {
                    DiffError::SkippedThread {
                        thread_id,
                        side,
                        line,
                    }
                } else {
                    DiffError::StaleThread {
                        thread_id,
                        side,
                        line,
                    }
                };
                warn!(path, error = %err, "dropping comment thread");
            }
            dropped += threads.len();
            false
        });
        dropped
    }
}
