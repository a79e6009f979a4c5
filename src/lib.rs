//! StatusQuest - an interactive HTTP status code reference
//!
//! A Rust application providing:
//! - A validated catalog of status codes grouped by class
//! - Case-insensitive search with match highlighting
//! - "Try Now" mock requests answered after an artificial delay
//! - An HTTP API, a replay endpoint and a terminal browser

pub mod activity;
pub mod api;
pub mod catalog;
pub mod config;
pub mod replay;
pub mod search;
pub mod server;
pub mod simulator;
pub mod tui;
pub mod verify;
pub mod view;

pub use catalog::{Catalog, CatalogError, LookupError, SharedCatalog, StatusCodeEntry};
pub use config::{AppConfig, SharedConfig};
pub use search::{filter, highlight, search, SearchOutcome, Segment};
pub use simulator::{MockSimulator, SimulationState};

/// Application result type
pub type Result<T> = anyhow::Result<T>;
