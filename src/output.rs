//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Detect
//!
//! ```text
//! Issues (4)
//!     Empty: 1
//!     Island: 2
//!     Resin trap: 1
//!
//! 0000 Empty
//! 0012 Island 9 px at 3x3+40+52
//! 0013 Island 120 px at 12x10+80+80
//! 0031 Resin trap 14 px at 20x20+60+60
//! ```
//!
//! ## Bounds
//!
//! ```text
//! 1440x2560, 120 layers
//! Bounds: 812x640+300+900
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::issues::{Issue, IssueType};
use crate::raster::geometry::Rect;
use crate::storage::StackMetadata;
use std::collections::BTreeMap;

/// Format a layer index as 4-digit zero-padded.
fn format_layer(index: u32) -> String {
    format!("{:0>4}", index)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Detect output
// ============================================================================

/// Per-type issue counts under a total header. Types with no issues are
/// left out.
pub fn format_issue_summary(issues: &[Issue]) -> Vec<String> {
    let mut counts: BTreeMap<IssueType, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.issue_type).or_default() += 1;
    }

    let mut lines = vec![format!("Issues ({})", issues.len())];
    for (issue_type, count) in counts {
        lines.push(format!("{}{}: {}", indent(1), issue_type, count));
    }
    lines
}

/// One line per issue, in list order.
///
/// ```text
/// 0000 Empty
/// 0012 Island 9 px at 3x3+40+52
/// ```
pub fn format_issue_lines(issues: &[Issue]) -> Vec<String> {
    issues
        .iter()
        .map(|issue| {
            let head = format!("{} {}", format_layer(issue.layer_index), issue.issue_type);
            if issue.pixels.is_empty() {
                head
            } else {
                format!(
                    "{} {} px at {}",
                    head,
                    issue.pixel_count(),
                    issue.bounding_rectangle
                )
            }
        })
        .collect()
}

/// Summary, a blank line, then every issue.
pub fn format_detect_output(issues: &[Issue]) -> Vec<String> {
    let mut lines = format_issue_summary(issues);
    if !issues.is_empty() {
        lines.push(String::new());
        lines.extend(format_issue_lines(issues));
    }
    lines
}

pub fn print_detect_output(issues: &[Issue]) {
    for line in format_detect_output(issues) {
        println!("{}", line);
    }
}

// ============================================================================
// Bounds output
// ============================================================================

pub fn format_bounds_output(metadata: &StackMetadata, bounds: Rect) -> Vec<String> {
    let mut lines = vec![format!(
        "{}x{}, {} layers",
        metadata.width, metadata.height, metadata.layer_count
    )];
    if bounds.is_empty() {
        lines.push("Bounds: none (every layer is blank)".to_string());
    } else {
        lines.push(format!("Bounds: {}", bounds));
    }
    lines
}

pub fn print_bounds_output(metadata: &StackMetadata, bounds: Rect) {
    for line in format_bounds_output(metadata, bounds) {
        println!("{}", line);
    }
}

// ============================================================================
// Draw output
// ============================================================================

/// Operation count and the layers that were written back.
pub fn format_draw_output(operation_count: usize, changed_layers: &[u32]) -> Vec<String> {
    let mut lines = vec![format!(
        "Applied {} operations, {} layers changed",
        operation_count,
        changed_layers.len()
    )];
    for &index in changed_layers {
        lines.push(format!("{}{}", indent(1), format_layer(index)));
    }
    lines
}

pub fn print_draw_output(operation_count: usize, changed_layers: &[u32]) {
    for line in format_draw_output(operation_count, changed_layers) {
        println!("{}", line);
    }
}
