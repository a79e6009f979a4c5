//! Card rendering
//!
//! Turns a catalog entry plus the current query into the display model shared
//! by the HTTP API, the terminal browser and the CLI.

use crate::catalog::{Category, HttpMethod, StatusCodeEntry};
use crate::search::{highlight, Segment};
use serde::Serialize;
use serde_json::Value;

/// One highlighted line of text
pub type Line = Vec<Segment>;

/// Display model of a single status code card
#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub code: u16,
    pub title: String,
    pub category: Category,
    pub color: String,
    pub emoji: String,
    /// `"{title} - {code}"`
    pub heading: Line,
    pub category_label: Line,
    pub description: Line,
    pub tip: Line,
    pub example: Line,
    /// `"{METHOD} {url}"` as shown next to the Try Now action
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    /// Pretty-printed mock body; only POST mocks show their body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_lines: Option<Vec<Line>>,
    pub mock_status: u16,
}

impl CardView {
    pub fn render(entry: &StatusCodeEntry, query: &str) -> Self {
        let body_lines = match (&entry.mock.method, &entry.mock.body) {
            (HttpMethod::Post, Some(body)) => Some(render_json_lines(body, query)),
            _ => None,
        };

        Self {
            code: entry.code,
            title: entry.title.clone(),
            category: entry.category,
            color: entry.color.clone(),
            emoji: entry.emoji.clone(),
            heading: highlight(&format!("{} - {}", entry.title, entry.code), query),
            category_label: highlight(entry.category.as_str(), query),
            description: highlight(&entry.description, query),
            tip: highlight(&entry.tip, query),
            example: highlight(&entry.example, query),
            request_line: format!("{} {}", entry.mock.method, entry.mock.url),
            headers: entry.mock.header_pairs(),
            body_lines,
            mock_status: entry.mock.status,
        }
    }
}

/// Pretty-print a JSON value and highlight it line by line
pub fn render_json_lines(value: &Value, query: &str) -> Vec<Line> {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    pretty.lines().map(|line| highlight(line, query)).collect()
}

/// Flatten segments to a string, wrapping emphasized runs in `open`/`close`
pub fn marked(segments: &[Segment], open: &str, close: &str) -> String {
    let mut out = String::new();
    for segment in segments {
        if segment.emphasized {
            out.push_str(open);
            out.push_str(&segment.text);
            out.push_str(close);
        } else {
            out.push_str(&segment.text);
        }
    }
    out
}
