//! Read-only paging over an [`OutputBuffer`]
//!
//! Two addressing modes, both addressed in absolute line numbers:
//! - page mode: `{ pagenumber, length }`, pages counted from the oldest
//!   retained line
//! - range mode: `{ startLine, count }`, clamped up to the retained window
//!
//! Queries never fail. Out-of-range input degrades to an empty result
//! anchored one line past the newest retained line.

use crate::buffer::OutputBuffer;
use serde::{Deserialize, Serialize};

/// How to address a slice of output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSelector {
    #[serde(rename_all = "camelCase")]
    Range { start_line: usize, count: usize },
    Page { pagenumber: usize, length: usize },
}

impl PageSelector {
    pub fn page(pagenumber: usize, length: usize) -> Self {
        Self::Page { pagenumber, length }
    }

    pub fn range(start_line: usize, count: usize) -> Self {
        Self::Range { start_line, count }
    }
}

/// One slice of a stream's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// First absolute line number in `logs`
    pub start: usize,
    /// Last absolute line number in `logs` (`start - 1` when empty)
    pub end: usize,
    /// Page number for page mode, `None` for range mode
    pub pagenumber: Option<usize>,
    pub last_page: bool,
    /// Lines joined with `\n`
    pub logs: String,
    /// Older content was evicted, or the request was clamped
    pub truncated: bool,
}

impl PageResult {
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn line_count(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }
}

/// Dispatch on the selector
pub fn query(buffer: &OutputBuffer, selector: PageSelector) -> PageResult {
    match selector {
        PageSelector::Page { pagenumber, length } => page(buffer, pagenumber, length),
        PageSelector::Range { start_line, count } => range(buffer, start_line, count),
    }
}

/// Page mode. Zero inputs are treated as 1.
pub fn page(buffer: &OutputBuffer, pagenumber: usize, length: usize) -> PageResult {
    let pagenumber = pagenumber.max(1);
    let length = length.max(1);
    let truncated =
        buffer.has_evicted() || (buffer.is_empty() && buffer.total_lines() > 0);

    let start = (pagenumber - 1)
        .checked_mul(length)
        .and_then(|offset| offset.checked_add(buffer.first_line()));

    let last = buffer.last_line();
    match start {
        Some(start) if start <= last => {
            let end = last.min(start.saturating_add(length - 1));
            PageResult {
                start,
                end,
                pagenumber: Some(pagenumber),
                last_page: end >= last,
                logs: collect(buffer, start, end),
                truncated,
            }
        }
        _ => PageResult {
            pagenumber: Some(pagenumber),
            truncated,
            ..empty_past_end(buffer)
        },
    }
}

/// Range mode. Zero inputs are treated as 1.
pub fn range(buffer: &OutputBuffer, start_line: usize, count: usize) -> PageResult {
    let requested = start_line.max(1);
    let count = count.max(1);

    let clamped = requested < buffer.first_line();
    let start = requested.max(buffer.first_line());

    let last = buffer.last_line();
    if start > last {
        return PageResult {
            truncated: true,
            ..empty_past_end(buffer)
        };
    }

    let end = last.min(start.saturating_add(count - 1));
    PageResult {
        start,
        end,
        pagenumber: None,
        last_page: end >= last,
        logs: collect(buffer, start, end),
        truncated: clamped || buffer.has_evicted(),
    }
}

fn empty_past_end(buffer: &OutputBuffer) -> PageResult {
    let last = buffer.last_line();
    PageResult {
        start: last + 1,
        end: last,
        pagenumber: None,
        last_page: true,
        logs: String::new(),
        truncated: false,
    }
}

/// Join absolute lines `start..=end`; both must lie in the retained window
fn collect(buffer: &OutputBuffer, start: usize, end: usize) -> String {
    let from = start - buffer.first_line();
    let to = end - buffer.first_line() + 1;
    buffer
        .lines()
        .range(from..to)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}
