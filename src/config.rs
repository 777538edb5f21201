//! Preferences and configuration file handling

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::DiffError;
use crate::layout::{
    DEFAULT_CONTEXT, DEFAULT_LINES_RENDERED_AT_ONCE, DEFAULT_LINE_LENGTH, DEFAULT_TAB_SIZE,
    DEFAULT_TIME_SLICE_MS, WHOLE_FILE_CONTEXT,
};
use crate::model::DiffViewMode;

/// Diff preferences, keyed the way the review server sends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffPreferences {
    /// Unchanged lines kept around each change; -1 shows the whole file
    pub context: i32,
    pub tab_size: u32,
    pub line_length: u32,
    pub line_wrapping: bool,
    pub syntax_highlighting: bool,
    pub show_whitespace_errors: bool,
    pub show_tabs: bool,
}

impl Default for DiffPreferences {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT,
            tab_size: DEFAULT_TAB_SIZE,
            line_length: DEFAULT_LINE_LENGTH,
            line_wrapping: false,
            syntax_highlighting: true,
            show_whitespace_errors: true,
            show_tabs: true,
        }
    }
}

impl DiffPreferences {
    /// # Errors
    ///
    /// Returns an error for a context below -1 or a zero tab size or line
    /// length.
    pub const fn validate(&self) -> Result<(), DiffError> {
        if self.context < WHOLE_FILE_CONTEXT {
            return Err(DiffError::InvalidContext(self.context));
        }
        if self.tab_size == 0 {
            return Err(DiffError::InvalidTabSize);
        }
        if self.line_length == 0 {
            return Err(DiffError::InvalidLineLength);
        }
        Ok(())
    }
}

/// Settings for the render driver itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderPreferences {
    pub view_mode: DiffViewMode,
    /// Lines per incremental batch; large one-sided chunks split at twice this
    pub num_lines_rendered_at_once: usize,
    pub time_slice_ms: u64,
    pub show_file_comment_row: bool,
}

impl Default for RenderPreferences {
    fn default() -> Self {
        Self {
            view_mode: DiffViewMode::SideBySide,
            num_lines_rendered_at_once: DEFAULT_LINES_RENDERED_AT_ONCE,
            time_slice_ms: DEFAULT_TIME_SLICE_MS,
            show_file_comment_row: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CritDiffConfig {
    pub preferences: DiffPreferences,
    pub render: RenderPreferences,
}

/// Load configuration from `path`, or from the user's config directory.
///
/// A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read, parsed or
/// validated.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CritDiffConfig> {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_path) else {
        return Ok(CritDiffConfig::default());
    };
    if !path.exists() {
        return Ok(CritDiffConfig::default());
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| DiffError::Config {
        path: path.clone(),
        source,
    })?;
    let config: CritDiffConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    config
        .preferences
        .validate()
        .with_context(|| format!("Invalid preferences in {}", path.display()))?;
    Ok(config)
}

/// Save configuration to `path`, or to the user's config directory.
///
/// # Errors
///
/// Returns an error if the config directory cannot be created or the file cannot be written.
pub fn save_config(config: &CritDiffConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_path) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, contents).map_err(|source| DiffError::Config { path, source })?;
    Ok(())
}

fn config_path() -> Option<PathBuf> {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        Path::new(&home).join(".config")
    } else {
        return None;
    };

    Some(base.join("crit-diff").join("config.json"))
}
