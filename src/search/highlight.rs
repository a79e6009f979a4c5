use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// A run of display text, emphasized when it matched the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub emphasized: bool,
}

impl Segment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn emphasized(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: true,
        }
    }
}

/// Split `text` into plain and emphasized segments around every
/// case-insensitive occurrence of `query`.
///
/// The query is matched literally: regex metacharacters are escaped before the
/// pattern is built, so input such as `(` or `.` cannot fail or over-match.
/// Concatenating the segments always yields `text`.
pub fn highlight(text: &str, query: &str) -> Vec<Segment> {
    if query.is_empty() {
        return vec![Segment::plain(text)];
    }

    let pattern = match RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!(error = %e, query_len = query.len(), "Highlight pattern rejected");
            return vec![Segment::plain(text)];
        }
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if found.start() > last {
            segments.push(Segment::plain(&text[last..found.start()]));
        }
        segments.push(Segment::emphasized(found.as_str()));
        last = found.end();
    }

    if segments.is_empty() {
        return vec![Segment::plain(text)];
    }
    if last < text.len() {
        segments.push(Segment::plain(&text[last..]));
    }
    segments
}
