//! Activity log
//!
//! Records what visitors do with the catalog: searches, detail lookups,
//! Try Now simulations and replayed mock requests.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    Search { query: String, hits: usize },
    Lookup { code: u16, found: bool },
    Simulation { code: u16, delay_ms: u64 },
    Replay {
        method: String,
        path: String,
        status: Option<u16>,
    },
}

/// A single recorded event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Aggregated view of the log
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActivitySummary {
    pub total_events: u64,
    pub searches: u64,
    /// Searches that matched nothing
    pub empty_searches: u64,
    pub lookups: u64,
    pub lookup_misses: u64,
    pub simulations: u64,
    pub replays: u64,
    /// Try Now count per status code
    pub simulations_by_code: HashMap<u16, u64>,
    /// Most frequent queries, most frequent first
    pub top_queries: Vec<(String, u64)>,
}

const TOP_QUERIES: usize = 10;

/// Bounded in-memory event log
#[derive(Debug)]
pub struct ActivityLog {
    events: RwLock<Vec<ActivityEvent>>,
    max_entries: usize,
}

impl ActivityLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            events: RwLock::new(Vec::with_capacity(max_entries.min(1024))),
            max_entries: max_entries.max(1),
        }
    }

    /// Append an event, dropping the oldest tenth when full
    pub fn record(&self, kind: ActivityKind) {
        let mut events = self.events.write();
        if events.len() >= self.max_entries {
            let excess = (self.max_entries / 10).max(1);
            events.drain(0..excess);
        }
        events.push(ActivityEvent::new(kind));
    }

    pub fn get_all(&self) -> Vec<ActivityEvent> {
        self.events.read().clone()
    }

    /// Events from the last `seconds` seconds
    ///
    /// A window too large to represent covers the whole log; a negative one
    /// covers nothing.
    pub fn get_recent(&self, seconds: i64) -> Vec<ActivityEvent> {
        if seconds < 0 {
            return Vec::new();
        }
        let cutoff = chrono::Duration::try_seconds(seconds)
            .and_then(|window| Utc::now().checked_sub_signed(window));
        self.events
            .read()
            .iter()
            .filter(|e| cutoff.map_or(true, |cutoff| e.timestamp > cutoff))
            .cloned()
            .collect()
    }

    pub fn get_summary(&self) -> ActivitySummary {
        let events = self.events.read();
        let mut summary = ActivitySummary {
            total_events: events.len() as u64,
            ..Default::default()
        };
        let mut query_counts: HashMap<&str, u64> = HashMap::new();

        for event in events.iter() {
            match &event.kind {
                ActivityKind::Search { query, hits } => {
                    summary.searches += 1;
                    if *hits == 0 {
                        summary.empty_searches += 1;
                    }
                    *query_counts.entry(query.as_str()).or_insert(0) += 1;
                }
                ActivityKind::Lookup { found, .. } => {
                    summary.lookups += 1;
                    if !found {
                        summary.lookup_misses += 1;
                    }
                }
                ActivityKind::Simulation { code, .. } => {
                    summary.simulations += 1;
                    *summary.simulations_by_code.entry(*code).or_insert(0) += 1;
                }
                ActivityKind::Replay { .. } => summary.replays += 1,
            }
        }

        let mut top: Vec<(String, u64)> = query_counts
            .into_iter()
            .map(|(query, count)| (query.to_string(), count))
            .collect();
        // Ties broken alphabetically so the order is stable
        top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top.truncate(TOP_QUERIES);
        summary.top_queries = top;

        summary
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    pub fn count(&self) -> usize {
        self.events.read().len()
    }
}

/// Activity log shared across handlers and background tasks
pub type SharedActivity = Arc<ActivityLog>;

pub fn create_shared_activity(max_entries: usize) -> SharedActivity {
    Arc::new(ActivityLog::new(max_entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(query: &str, hits: usize) -> ActivityKind {
        ActivityKind::Search {
            query: query.to_string(),
            hits,
        }
    }

    #[test]
    fn test_record_event() {
        let log = ActivityLog::new(100);
        log.record(search("404", 1));
        assert_eq!(log.count(), 1);
        assert_eq!(log.get_recent(60).len(), 1);
    }

    #[test]
    fn test_recent_with_huge_window() {
        let log = ActivityLog::new(10);
        log.record(search("404", 1));
        log.record(search("500", 1));

        assert_eq!(log.get_recent(i64::MAX).len(), 2);
        assert_eq!(log.get_recent(i64::MAX / 1000).len(), 2);
        assert!(log.get_recent(i64::MIN).is_empty());
        assert!(log.get_recent(-60).is_empty());
    }

    #[test]
    fn test_summary() {
        let log = ActivityLog::new(100);
        log.record(search("webdav", 7));
        log.record(search("webdav", 7));
        log.record(search("zzz", 0));
        log.record(ActivityKind::Lookup {
            code: 404,
            found: true,
        });
        log.record(ActivityKind::Lookup {
            code: 999,
            found: false,
        });
        log.record(ActivityKind::Simulation {
            code: 200,
            delay_ms: 512,
        });
        log.record(ActivityKind::Replay {
            method: "GET".to_string(),
            path: "/api/users/1".to_string(),
            status: Some(200),
        });

        let summary = log.get_summary();
        assert_eq!(summary.total_events, 7);
        assert_eq!(summary.searches, 3);
        assert_eq!(summary.empty_searches, 1);
        assert_eq!(summary.lookups, 2);
        assert_eq!(summary.lookup_misses, 1);
        assert_eq!(summary.simulations_by_code.get(&200), Some(&1));
        assert_eq!(summary.replays, 1);
        assert_eq!(summary.top_queries[0], ("webdav".to_string(), 2));
    }

    #[test]
    fn test_max_entries() {
        let log = ActivityLog::new(20);
        for i in 0..30 {
            log.record(search(&format!("q{}", i), 0));
        }
        assert!(log.count() <= 20);

        // Oldest events go first
        let first = log.get_all().remove(0);
        assert_ne!(first.kind, search("q0", 0));
    }

    #[test]
    fn test_clear() {
        let log = create_shared_activity(10);
        log.record(search("a", 1));
        log.clear();
        assert_eq!(log.count(), 0);
        assert_eq!(log.get_summary().total_events, 0);
    }

    #[test]
    fn test_event_serialization() {
        let event = ActivityEvent::new(ActivityKind::Simulation {
            code: 200,
            delay_ms: 400,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "simulation");
        assert_eq!(json["code"], 200);
    }
}
