//! View mode state

use serde::{Deserialize, Serialize};

use crate::layout::SIDE_BY_SIDE_MIN_WIDTH;

/// Diff view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffViewMode {
    /// Side-by-side diff (old left, new right)
    #[default]
    SideBySide,
    /// One column, before and after line numbers on the same row
    Unified,
}

impl DiffViewMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::SideBySide => Self::Unified,
            Self::Unified => Self::SideBySide,
        }
    }
}

/// The mode the user asked for and the mode actually in effect.
///
/// A narrow viewport forces unified mode unless the user has explicitly
/// chosen a mode; a configured default alone does not beat the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewModeState {
    preferred: DiffViewMode,
    width: Option<u32>,
    /// Set once the user toggles or picks a mode
    manual: bool,
}

impl ViewModeState {
    #[must_use]
    pub const fn new(preferred: DiffViewMode) -> Self {
        Self {
            preferred,
            width: None,
            manual: false,
        }
    }

    #[must_use]
    pub const fn preferred(&self) -> DiffViewMode {
        self.preferred
    }

    #[must_use]
    pub const fn is_narrow(&self) -> bool {
        matches!(self.width, Some(w) if w < SIDE_BY_SIDE_MIN_WIDTH)
    }

    #[must_use]
    pub const fn is_manual(&self) -> bool {
        self.manual
    }

    #[must_use]
    pub const fn effective(&self) -> DiffViewMode {
        if self.is_narrow() && !self.manual {
            DiffViewMode::Unified
        } else {
            self.preferred
        }
    }

    /// Explicit user toggle of the mode on screen. Returns true when the
    /// effective mode changed.
    pub fn toggle(&mut self) -> bool {
        self.set_preferred(self.effective().toggled())
    }

    /// Explicit user choice. Returns true when the effective mode changed.
    pub fn set_preferred(&mut self, mode: DiffViewMode) -> bool {
        let before = self.effective();
        self.preferred = mode;
        self.manual = true;
        before != self.effective()
    }

    /// Viewport width changed. Returns true when the effective mode changed.
    pub fn resize(&mut self, width: u32) -> bool {
        let before = self.effective();
        self.width = Some(width);
        before != self.effective()
    }
}

impl Default for ViewModeState {
    fn default() -> Self {
        Self::new(DiffViewMode::default())
    }
}
