//! Status code catalog
//!
//! The catalog is an immutable list of status code entries grouped by series
//! (1xx..5xx). It is loaded and validated once at startup and then shared
//! read-only behind an `Arc`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Catalog document compiled into the binary
const BUILTIN_CATALOG: &str = include_str!("builtin.json");

/// Class of a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Informational,
    Success,
    Redirection,
    #[serde(rename = "Client Error")]
    ClientError,
    #[serde(rename = "Server Error")]
    ServerError,
}

impl Category {
    /// Display name, identical to the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Informational => "Informational",
            Self::Success => "Success",
            Self::Redirection => "Redirection",
            Self::ClientError => "Client Error",
            Self::ServerError => "Server Error",
        }
    }

    /// Leading digit of the codes in this category
    pub fn series_digit(&self) -> u16 {
        match self {
            Self::Informational => 1,
            Self::Success => 2,
            Self::Redirection => 3,
            Self::ClientError => 4,
            Self::ServerError => 5,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method of a mock interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Match an incoming request method, case-sensitively as HTTP does
    pub fn from_request_method(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synthetic request/response pair illustrating a status code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockInteraction {
    pub method: HttpMethod,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub response: Value,
    pub status: u16,
}

impl MockInteraction {
    /// Path component of the mock URL, without the query string
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    /// Headers flattened to strings, in authored order
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .flat_map(|headers| headers.iter())
            .map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

/// One status code's full descriptive record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCodeEntry {
    pub code: u16,
    pub title: String,
    pub description: String,
    pub tip: String,
    pub example: String,
    pub category: Category,
    pub color: String,
    pub emoji: String,
    pub mock: MockInteraction,
}

/// A series of codes sharing the same leading digit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCodeGroup {
    pub series: String,
    pub title: String,
    pub description: String,
    pub codes: Vec<StatusCodeEntry>,
}

impl StatusCodeGroup {
    /// Leading digit encoded in `series` ("4xx" -> 4)
    pub fn series_digit(&self) -> Option<u16> {
        let mut chars = self.series.chars();
        let digit = chars.next()?.to_digit(10)?;
        if chars.as_str() == "xx" && (1..=5).contains(&digit) {
            Some(digit as u16)
        } else {
            None
        }
    }
}

/// Errors raised while loading or validating a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid series {0:?}, expected one of 1xx..5xx")]
    InvalidSeries(String),

    #[error("group {series} is out of order, series must be ascending")]
    GroupsOutOfOrder { series: String },

    #[error("status code {0} appears more than once")]
    DuplicateCode(u16),

    #[error("status code {code} does not belong to series {series}")]
    SeriesMismatch { code: u16, series: String },

    #[error("status code {code} has category {category} which does not match series {series}")]
    CategoryMismatch {
        code: u16,
        category: Category,
        series: String,
    },

    #[error("status code {code} has a mock responding with status {status}")]
    MockStatusMismatch { code: u16, status: u16 },

    #[error("mock route {method} {url} is used by both {first} and {second}")]
    DuplicateMockRoute {
        method: HttpMethod,
        url: String,
        first: u16,
        second: u16,
    },
}

/// Outcome of a detail lookup that found nothing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("status code {0} not found")]
    NotFound(u16),

    #[error("{0:?} is not a status code")]
    InvalidCode(String),
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    groups: Vec<StatusCodeGroup>,
}

/// Validated, immutable catalog
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    groups: Vec<StatusCodeGroup>,
}

impl Catalog {
    /// Build a catalog from groups, enforcing every data invariant
    pub fn from_groups(groups: Vec<StatusCodeGroup>) -> Result<Self, CatalogError> {
        validate(&groups)?;
        Ok(Self { groups })
    }

    /// Parse and validate a JSON catalog document (`{"groups": [...]}`)
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Self::from_groups(document.groups)
    }

    /// Load and validate a catalog from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// The catalog shipped with the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// Groups in ascending series order
    pub fn groups(&self) -> &[StatusCodeGroup] {
        &self.groups
    }

    /// All entries, group order then in-group order
    pub fn entries(&self) -> impl Iterator<Item = &StatusCodeEntry> {
        self.groups.iter().flat_map(|group| group.codes.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.codes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact numeric lookup
    pub fn find(&self, code: u16) -> Option<&StatusCodeEntry> {
        self.entries().find(|entry| entry.code == code)
    }

    /// Detail lookup that signals a miss as an error
    pub fn lookup(&self, code: u16) -> Result<&StatusCodeEntry, LookupError> {
        self.find(code).ok_or(LookupError::NotFound(code))
    }

    /// Detail lookup from a raw path segment such as `"404"`
    pub fn lookup_segment(&self, segment: &str) -> Result<&StatusCodeEntry, LookupError> {
        let code: u16 = segment
            .parse()
            .map_err(|_| LookupError::InvalidCode(segment.to_string()))?;
        self.lookup(code)
    }

    /// Entry whose mock route matches a request, exact URL first then path only
    pub fn find_mock_route(&self, method: HttpMethod, path_and_query: &str) -> Option<&StatusCodeEntry> {
        let path = path_and_query.split('?').next().unwrap_or(path_and_query);
        self.entries()
            .find(|entry| entry.mock.method == method && entry.mock.url == path_and_query)
            .or_else(|| {
                self.entries()
                    .find(|entry| entry.mock.method == method && entry.mock.path() == path)
            })
    }
}

/// Enforce catalog invariants: unique codes and mock routes, ascending series,
/// and entries consistent with their series.
fn validate(groups: &[StatusCodeGroup]) -> Result<(), CatalogError> {
    let mut seen_codes = HashSet::new();
    let mut seen_routes: Vec<(HttpMethod, &str, u16)> = Vec::new();
    let mut previous_digit = 0;

    for group in groups {
        let digit = group
            .series_digit()
            .ok_or_else(|| CatalogError::InvalidSeries(group.series.clone()))?;
        if digit <= previous_digit {
            return Err(CatalogError::GroupsOutOfOrder {
                series: group.series.clone(),
            });
        }
        previous_digit = digit;

        for entry in &group.codes {
            if !seen_codes.insert(entry.code) {
                return Err(CatalogError::DuplicateCode(entry.code));
            }
            if entry.code / 100 != digit {
                return Err(CatalogError::SeriesMismatch {
                    code: entry.code,
                    series: group.series.clone(),
                });
            }
            if entry.category.series_digit() != digit {
                return Err(CatalogError::CategoryMismatch {
                    code: entry.code,
                    category: entry.category,
                    series: group.series.clone(),
                });
            }
            if entry.mock.status != entry.code {
                return Err(CatalogError::MockStatusMismatch {
                    code: entry.code,
                    status: entry.mock.status,
                });
            }
            if let Some((_, _, first)) = seen_routes
                .iter()
                .find(|(method, url, _)| *method == entry.mock.method && *url == entry.mock.url)
            {
                return Err(CatalogError::DuplicateMockRoute {
                    method: entry.mock.method,
                    url: entry.mock.url.clone(),
                    first: *first,
                    second: entry.code,
                });
            }
            seen_routes.push((entry.mock.method, &entry.mock.url, entry.code));
        }
    }

    Ok(())
}

/// Catalog shared across the server, the browser and background tasks
pub type SharedCatalog = Arc<Catalog>;

/// Load the catalog from `path` if given, otherwise the built-in one
pub fn load_shared_catalog(path: Option<&str>) -> Result<SharedCatalog, CatalogError> {
    let catalog = match path {
        Some(path) => Catalog::load_from_file(path)?,
        None => Catalog::builtin()?,
    };
    tracing::debug!(
        groups = catalog.groups().len(),
        entries = catalog.len(),
        source = path.unwrap_or("builtin"),
        "Catalog loaded"
    );
    Ok(Arc::new(catalog))
}
