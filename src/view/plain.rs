//! Plain-text materialization of diff rows.

use std::fmt::Write as _;

use crate::diff::LineType;
use crate::layout::{
    side_by_side_content_width, unified_content_width, SBS_LINE_NUM_WIDTH, THREAD_INDENT,
};
use crate::text::wrap_text;

use super::diff::{
    segments_to_lines, truncate_chars, CommentThread, ContentCell, DiffRow, SideCell,
};

const NO_NEWLINE: &str = "\\ No newline at end of file";

/// Render rows as text lines at most `width` columns wide.
#[must_use]
pub fn render_rows(rows: &[DiffRow], width: usize) -> String {
    let mut out = String::new();
    for row in rows {
        for line in render_row(row, width) {
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out
}

fn render_row(row: &DiffRow, width: usize) -> Vec<String> {
    match row {
        DiffRow::File(file) => {
            let mut lines = vec![format!("=== {} ===", file.path)];
            lines.extend(render_threads(&file.threads, width));
            lines
        }
        DiffRow::ContextControl(control) => {
            let labels: Vec<&str> = control.buttons.iter().map(|b| b.label.as_str()).collect();
            vec![format!("{:>w$} {} ···", "···", labels.join(" | "), w = SBS_LINE_NUM_WIDTH)]
        }
        DiffRow::MoveHeader(header) => {
            vec![format!("{:>w$} {}", ">>", header.label, w = SBS_LINE_NUM_WIDTH)]
        }
        DiffRow::SideBySide(row) => render_side_by_side(&row.left, &row.right, width),
        DiffRow::Unified(row) => {
            let content_width = unified_content_width(width).saturating_sub(1).max(1);
            let cell_lines = cell_lines(&row.content, content_width);
            let mut lines = Vec::with_capacity(cell_lines.len());
            for (i, text) in cell_lines.iter().enumerate() {
                let (before, after, marker) = if i == 0 {
                    (
                        number(row.before_number),
                        number(row.after_number),
                        marker(row.line_type),
                    )
                } else {
                    (String::new(), String::new(), ' ')
                };
                lines.push(format!("{before:>5} {after:>5} {marker}{text}"));
            }
            lines.extend(render_threads(&row.left_threads, width));
            lines.extend(render_threads(&row.content.threads, width));
            lines
        }
    }
}

fn render_side_by_side(left: &SideCell, right: &SideCell, width: usize) -> Vec<String> {
    let content_width = side_by_side_content_width(width).max(1);
    let left_lines = side_lines(left, content_width);
    let right_lines = side_lines(right, content_width);
    let count = left_lines.len().max(right_lines.len());

    let mut lines = Vec::with_capacity(count);
    for i in 0..count {
        let half = |cell: &SideCell, cell_lines: &[String]| {
            let text = cell_lines.get(i).map_or("", String::as_str);
            let (num, mark) = if i == 0 {
                (number(cell.number), marker(cell.line_type))
            } else {
                (String::new(), ' ')
            };
            format!("{num:>5} {mark}{text:<content_width$}")
        };
        lines.push(format!(
            "{}│{}",
            half(left, &left_lines),
            half(right, &right_lines)
        ));
    }

    for cell in [left, right] {
        if let Some(content) = &cell.content {
            lines.extend(render_threads(&content.threads, width));
        }
    }
    lines
}

fn side_lines(cell: &SideCell, width: usize) -> Vec<String> {
    cell.content
        .as_ref()
        .map_or_else(|| vec![String::new()], |content| cell_lines(content, width))
}

/// Display lines of a cell, clipped to `width`.
fn cell_lines(cell: &ContentCell, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = segments_to_lines(&cell.segments)
        .iter()
        .map(|line| truncate_chars(line, width).to_string())
        .collect();
    if cell.missing_newline {
        lines.push(truncate_chars(NO_NEWLINE, width).to_string());
    }
    lines
}

fn render_threads(threads: &[CommentThread], width: usize) -> Vec<String> {
    let indent = " ".repeat(THREAD_INDENT);
    let body_width = width.saturating_sub(THREAD_INDENT * 2).max(1);
    let mut lines = Vec::new();
    for thread in threads {
        let mut header = format!("{indent}┌ {}", thread.id);
        if let Some(line) = thread.line {
            let _ = write!(header, " ({} {line})", thread.side);
        }
        lines.push(header);
        for comment in &thread.comments {
            lines.push(format!("{indent}│ @{}", comment.author));
            for body in wrap_text(&comment.message, body_width) {
                lines.push(format!("{indent}│   {body}"));
            }
        }
        lines.push(format!("{indent}└"));
    }
    lines
}

fn number(n: Option<u32>) -> String {
    n.map(|n| n.to_string()).unwrap_or_default()
}

const fn marker(line_type: LineType) -> char {
    match line_type {
        LineType::Add => '+',
        LineType::Remove => '-',
        LineType::Both | LineType::Blank => ' ',
    }
}
