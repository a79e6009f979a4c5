//! Catalog search
//!
//! Case-insensitive substring filtering over the catalog's textual fields,
//! plus match highlighting for rendering the surviving entries.

mod highlight;

pub use highlight::{highlight, Segment};

use crate::catalog::{Catalog, StatusCodeEntry, StatusCodeGroup};
use serde::Serialize;

/// Result of a search as the browsing surfaces consume it
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SearchOutcome<'a> {
    /// Empty query: the whole catalog, grouped
    Grouped { groups: &'a [StatusCodeGroup] },
    /// Non-empty query: matching entries, flat, in catalog order
    Matches {
        query: String,
        entries: Vec<&'a StatusCodeEntry>,
    },
}

impl SearchOutcome<'_> {
    /// Number of entries shown
    pub fn len(&self) -> usize {
        match self {
            Self::Grouped { groups } => groups.iter().map(|g| g.codes.len()).sum(),
            Self::Matches { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run a query the way the browser does: empty shows everything grouped
pub fn search<'a>(catalog: &'a Catalog, query: &str) -> SearchOutcome<'a> {
    if query.is_empty() {
        SearchOutcome::Grouped {
            groups: catalog.groups(),
        }
    } else {
        SearchOutcome::Matches {
            query: query.to_string(),
            entries: filter(catalog.groups(), query),
        }
    }
}

/// Entries with any searchable field containing `query`, ignoring case
///
/// Order is group order, then in-group order. An empty query matches every
/// entry.
pub fn filter<'a>(groups: &'a [StatusCodeGroup], query: &str) -> Vec<&'a StatusCodeEntry> {
    let needle = query.to_lowercase();
    groups
        .iter()
        .flat_map(|group| group.codes.iter())
        .filter(|entry| matches_entry(entry, &needle))
        .collect()
}

/// Whether any searchable field of `entry` contains the lower-cased `needle`
pub fn matches_entry(entry: &StatusCodeEntry, needle: &str) -> bool {
    searchable_fields(entry)
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Every field the filter looks at, JSON values in compact form
fn searchable_fields(entry: &StatusCodeEntry) -> Vec<String> {
    let mut fields = vec![
        entry.code.to_string(),
        entry.title.clone(),
        entry.description.clone(),
        entry.category.as_str().to_string(),
        entry.example.clone(),
        entry.mock.method.as_str().to_string(),
        entry.mock.url.clone(),
    ];
    if let Some(body) = &entry.mock.body {
        fields.push(body.to_string());
    }
    fields.push(entry.mock.response.to_string());
    fields.push(entry.tip.clone());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(entries: &[&StatusCodeEntry]) -> Vec<u16> {
        entries.iter().map(|e| e.code).collect()
    }

    #[test]
    fn test_filter_by_code() {
        let catalog = Catalog::builtin().unwrap();
        let hits = filter(catalog.groups(), "404");
        assert_eq!(codes(&hits), vec![404]);
    }

    #[test]
    fn test_filter_webdav_ignores_case() {
        let catalog = Catalog::builtin().unwrap();
        let hits = filter(catalog.groups(), "webdav");
        assert_eq!(codes(&hits), vec![207, 208, 422, 423, 424, 507, 508]);

        let upper = filter(catalog.groups(), "WEBDAV");
        assert_eq!(codes(&upper), codes(&hits));
    }

    #[test]
    fn test_filter_no_match() {
        let catalog = Catalog::builtin().unwrap();
        assert!(filter(catalog.groups(), "zzz-no-match").is_empty());
    }

    #[test]
    fn test_filter_empty_query_is_total() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(filter(catalog.groups(), "").len(), catalog.len());
    }

    #[test]
    fn test_filter_matches_exactly_the_entries_with_a_matching_field() {
        let catalog = Catalog::builtin().unwrap();
        for query in ["not", "Error", "/api/", "retry", "\"id\"", "post", "é"] {
            let hits = codes(&filter(catalog.groups(), query));
            let needle = query.to_lowercase();
            let expected: Vec<u16> = catalog
                .entries()
                .filter(|e| searchable_fields(e).iter().any(|f| f.to_lowercase().contains(&needle)))
                .map(|e| e.code)
                .collect();
            assert_eq!(hits, expected, "query {:?}", query);
        }
    }

    #[test]
    fn test_filter_preserves_catalog_order() {
        let catalog = Catalog::builtin().unwrap();
        let hits = codes(&filter(catalog.groups(), "e"));
        let mut sorted = hits.clone();
        sorted.sort_unstable();
        assert_eq!(hits, sorted);
    }

    #[test]
    fn test_filter_searches_mock_fields() {
        let catalog = Catalog::builtin().unwrap();

        // Mock body only
        assert_eq!(codes(&filter(catalog.groups(), "holiday.mp4")), vec![100]);
        // Mock response only
        assert_eq!(codes(&filter(catalog.groups(), "ada lovelace")), vec![200]);
        // Mock URL
        assert_eq!(codes(&filter(catalog.groups(), "/wifi/portal")), vec![511]);
        // Method matches every DELETE mock
        let deletes = filter(catalog.groups(), "delete");
        assert!(deletes.iter().any(|e| e.code == 204));
    }

    #[test]
    fn test_filter_does_not_trim() {
        let catalog = Catalog::builtin().unwrap();
        assert!(filter(catalog.groups(), "teapot  ").is_empty());
        assert_eq!(codes(&filter(catalog.groups(), "teapot ")), vec![418]);
    }

    #[test]
    fn test_search_empty_query_is_grouped() {
        let catalog = Catalog::builtin().unwrap();
        match search(&catalog, "") {
            SearchOutcome::Grouped { groups } => assert_eq!(groups.len(), 5),
            other => panic!("expected grouped outcome, got {:?}", other),
        }
    }

    #[test]
    fn test_search_with_query_is_flat() {
        let catalog = Catalog::builtin().unwrap();
        let outcome = search(&catalog, "404");
        assert_eq!(outcome.len(), 1);

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["mode"], "matches");
        assert_eq!(json["entries"][0]["code"], 404);
    }

    #[test]
    fn test_search_is_deterministic() {
        let catalog = Catalog::builtin().unwrap();
        let first = codes(&filter(catalog.groups(), "re"));
        let second = codes(&filter(catalog.groups(), "re"));
        assert_eq!(first, second);
    }
}
