//! Context-control rows and expansion.
//!
//! A control stands in for collapsed unchanged lines. Its identity is the
//! line range it hides, so a stale control (already expanded, or replaced
//! by a new render pass) can be detected by range lookup.

use serde::Serialize;
use thiserror::Error;

use crate::diff::{hide_in_context_control, DiffGroup, GroupType, LineRange};
use crate::layout::PARTIAL_CONTEXT_AMOUNT;

/// Which neighbours of the control have visible code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPlacement {
    Above,
    Below,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "lines", rename_all = "snake_case")]
pub enum ExpandAction {
    All,
    /// Reveal lines at the top of the hidden range
    Above(u32),
    /// Reveal lines at the bottom of the hidden range
    Below(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextButton {
    pub action: ExpandAction,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextControlRow {
    pub range: LineRange,
    pub num_lines: u32,
    pub placement: ControlPlacement,
    pub buttons: Vec<ContextButton>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("group is not a context control")]
    NotAControl,
    /// The revealed lines were skipped by the server and must be fetched
    #[error("expanding requires loading skipped content")]
    ContentLoadNeeded,
}

/// Describe a context-control group as a row.
#[must_use]
pub fn context_control_row(group: &DiffGroup, left_line_count: u32) -> ContextControlRow {
    let range = group.line_range();
    let num_lines = group.num_hidden_lines();
    let hidden = group.context_groups();
    let first_skipped = hidden.first().is_some_and(|g| g.skip().is_some());
    let last_skipped = hidden.last().is_some_and(|g| g.skip().is_some());
    let whole_file = num_lines == left_line_count;

    let show_above = (range.left.start > 1 && !first_skipped) || whole_file;
    let show_below = range.left.end < left_line_count && !last_skipped;
    let placement = match (show_above, show_below) {
        (true, false) => ControlPlacement::Above,
        (false, true) => ControlPlacement::Below,
        _ => ControlPlacement::Both,
    };

    let has_delta = group.has_delta_group();
    let mut label = if has_delta {
        "+ Unrelated changes".to_string()
    } else {
        format!("+{num_lines} common line{}", if num_lines == 1 { "" } else { "s" })
    };
    if group.has_skip_group() {
        label.push_str(" (too large)");
    }
    let mut buttons = vec![ContextButton {
        action: ExpandAction::All,
        label,
    }];

    if num_lines > PARTIAL_CONTEXT_AMOUNT && !has_delta {
        if show_above {
            buttons.push(ContextButton {
                action: ExpandAction::Above(PARTIAL_CONTEXT_AMOUNT),
                label: format!("+{PARTIAL_CONTEXT_AMOUNT}"),
            });
        }
        if show_below {
            buttons.push(ContextButton {
                action: ExpandAction::Below(PARTIAL_CONTEXT_AMOUNT),
                label: format!("+{PARTIAL_CONTEXT_AMOUNT}"),
            });
        }
    }

    ContextControlRow {
        range,
        num_lines,
        placement,
        buttons,
    }
}

/// Groups replacing `control` after `action`.
///
/// Partial expansion keeps the rest collapsed in a new, smaller control.
///
/// # Errors
///
/// Fails when `control` is not a context control, or when the lines to
/// reveal were skipped by the server.
pub fn expand_control(
    control: &DiffGroup,
    action: ExpandAction,
) -> Result<Vec<DiffGroup>, ExpandError> {
    if control.group_type() != GroupType::ContextControl {
        return Err(ExpandError::NotAControl);
    }
    let hidden = control.context_groups().to_vec();
    let total: u32 = hidden.iter().map(DiffGroup::common_len).sum();
    let groups = match action {
        ExpandAction::All => hidden,
        ExpandAction::Above(n) => hide_in_context_control(hidden, n.min(total), total),
        ExpandAction::Below(n) => hide_in_context_control(hidden, 0, total.saturating_sub(n)),
    };
    let reveals_skip = groups
        .iter()
        .any(|g| g.group_type() != GroupType::ContextControl && g.skip().is_some());
    if reveals_skip {
        return Err(ExpandError::ContentLoadNeeded);
    }
    Ok(groups)
}
