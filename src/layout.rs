//! Centralized layout constants.
//!
//! Defaults for context collapsing, incremental batching, and the widths used
//! when rows are materialized as text all live here so the processor, the
//! builders and the plain-text view agree.

// --- Context ---

/// `context` preference value meaning "show the whole file".
pub const WHOLE_FILE_CONTEXT: i32 = -1;

/// Default number of unchanged lines kept visible around a change.
pub const DEFAULT_CONTEXT: i32 = 10;

/// Lines revealed by a single "+10" context button.
pub const PARTIAL_CONTEXT_AMOUNT: u32 = 10;

/// Largest line number either side of a diff may reach. Skip counts running
/// past it are clamped.
pub const MAX_FILE_LINES: u32 = 10_000_000;

// --- Incremental rendering ---

/// Lines processed per incremental step before yielding.
pub const DEFAULT_LINES_RENDERED_AT_ONCE: usize = 64;

/// Time budget for one incremental step, in milliseconds.
pub const DEFAULT_TIME_SLICE_MS: u64 = 16;

/// Maximum size of an added-only or removed-only group.
#[must_use]
pub const fn max_group_size(lines_at_once: usize) -> usize {
    if lines_at_once == 0 {
        120
    } else {
        lines_at_once * 2
    }
}

// --- Text ---

pub const DEFAULT_TAB_SIZE: u32 = 8;
pub const DEFAULT_LINE_LENGTH: u32 = 100;

// --- Plain-text view ---

/// Minimum viewport width before side-by-side falls back to unified.
pub const SIDE_BY_SIDE_MIN_WIDTH: u32 = 100;

pub const SBS_LINE_NUM_WIDTH: usize = 6;
pub const UNIFIED_LINE_NUM_WIDTH: usize = 12;
pub const THREAD_INDENT: usize = 4;

// --- Stream-layout inner-width helpers ---

/// Content width of one side-by-side half (excluding the line number gutter).
#[must_use]
pub const fn side_by_side_content_width(width: usize) -> usize {
    // one column for the divider, one per side for the +/- marker
    (width.saturating_sub(1) / 2).saturating_sub(SBS_LINE_NUM_WIDTH + 1)
}

/// Content width of a unified row (excluding both line number columns).
#[must_use]
pub const fn unified_content_width(width: usize) -> usize {
    width.saturating_sub(UNIFIED_LINE_NUM_WIDTH + 1)
}
