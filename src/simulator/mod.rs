//! Try Now simulation
//!
//! Each card owns a [`MockSimulator`]. Triggering it enters a loading state and
//! schedules a task that, after an artificial delay, exposes the entry's
//! static mock response. Nothing touches the network.

use crate::activity::{ActivityKind, SharedActivity};
use crate::catalog::{LookupError, SharedCatalog, StatusCodeEntry};
use crate::config::SharedConfig;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Where a card's simulation stands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SimulationState {
    Idle,
    Loading {
        run: u64,
        delay_ms: u64,
    },
    Loaded {
        run: u64,
        delay_ms: u64,
        response: Value,
    },
}

impl SimulationState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    pub fn response(&self) -> Option<&Value> {
        match self {
            Self::Loaded { response, .. } => Some(response),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimulatorError {
    #[error("no simulation in flight")]
    Idle,

    #[error("simulator closed")]
    Closed,
}

/// Per-card Try Now state machine
#[derive(Debug)]
pub struct MockSimulator {
    code: u16,
    response: Value,
    delay: Range<u64>,
    state: Arc<watch::Sender<SimulationState>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    runs: AtomicU64,
}

impl MockSimulator {
    /// Simulator for `entry` whose delays fall in `delay` milliseconds
    pub fn new(entry: &StatusCodeEntry, delay: Range<u64>) -> Self {
        let (state, _) = watch::channel(SimulationState::Idle);
        Self {
            code: entry.code,
            response: entry.mock.response.clone(),
            delay,
            state: Arc::new(state),
            pending: Mutex::new(None),
            runs: AtomicU64::new(0),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Start a simulated request, cancelling any one still pending.
    ///
    /// Must be called from within a Tokio runtime. Returns the chosen delay.
    pub fn trigger(&self) -> Duration {
        let mut pending = self.pending.lock();
        if let Some(task) = pending.take() {
            task.abort();
        }

        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let delay_ms = pick_delay_ms(&self.delay);
        self.state.send_replace(SimulationState::Loading { run, delay_ms });

        let state = Arc::clone(&self.state);
        let response = self.response.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            // A newer run may have replaced this one while it slept
            state.send_if_modified(|current| {
                let still_current =
                    matches!(current, SimulationState::Loading { run: r, .. } if *r == run);
                if still_current {
                    *current = SimulationState::Loaded {
                        run,
                        delay_ms,
                        response,
                    };
                }
                still_current
            });
        }));

        tracing::debug!(code = self.code, run, delay_ms, "Simulation started");
        Duration::from_millis(delay_ms)
    }

    /// Abort any pending simulation and return to idle
    pub fn cancel(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
        self.state.send_replace(SimulationState::Idle);
    }

    /// Current state
    pub fn snapshot(&self) -> SimulationState {
        self.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SimulationState> {
        self.state.subscribe()
    }

    /// Wait until the in-flight simulation loads and return its response
    pub async fn wait_for_response(&self) -> Result<Value, SimulatorError> {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(|state| !state.is_loading())
            .await
            .map_err(|_| SimulatorError::Closed)?;
        state.response().cloned().ok_or(SimulatorError::Idle)
    }
}

impl Drop for MockSimulator {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}

/// Artificial delay drawn uniformly from `range` milliseconds
pub fn random_delay(range: &Range<u64>) -> Duration {
    Duration::from_millis(pick_delay_ms(range))
}

/// Uniform draw from `range` (start inclusive, end exclusive)
fn pick_delay_ms(range: &Range<u64>) -> u64 {
    if range.is_empty() {
        return range.start;
    }
    rand::thread_rng().gen_range(range.clone())
}

/// Serializable view of one open card
#[derive(Debug, Clone, Serialize)]
pub struct CardSnapshot {
    pub id: Uuid,
    pub code: u16,
    #[serde(flatten)]
    pub state: SimulationState,
}

/// Open cards in opening order
#[derive(Debug, Default)]
struct OpenCards {
    by_id: HashMap<Uuid, Arc<MockSimulator>>,
    order: VecDeque<Uuid>,
}

impl OpenCards {
    fn remove(&mut self, id: &Uuid) -> Option<Arc<MockSimulator>> {
        let simulator = self.by_id.remove(id)?;
        self.order.retain(|open| open != id);
        Some(simulator)
    }
}

/// Cards opened through the HTTP API, each with its own simulator
///
/// At most `cards.max_open` cards stay open; opening one more closes the
/// oldest.
#[derive(Debug)]
pub struct CardRegistry {
    catalog: SharedCatalog,
    config: SharedConfig,
    activity: SharedActivity,
    cards: RwLock<OpenCards>,
}

impl CardRegistry {
    pub fn new(catalog: SharedCatalog, config: SharedConfig, activity: SharedActivity) -> Self {
        Self {
            catalog,
            config,
            activity,
            cards: RwLock::new(OpenCards::default()),
        }
    }

    /// Open a card for `code`
    pub fn open(&self, code: u16) -> Result<Uuid, LookupError> {
        let entry = self.catalog.lookup(code)?;
        let simulator = MockSimulator::new(entry, self.config.simulator().delay_range());
        let max_open = self.config.cards().max_open.max(1);
        let id = Uuid::new_v4();

        let mut cards = self.cards.write();
        while cards.order.len() >= max_open {
            let Some(oldest) = cards.order.pop_front() else {
                break;
            };
            if let Some(evicted) = cards.by_id.remove(&oldest) {
                evicted.cancel();
                tracing::debug!(id = %oldest, code = evicted.code(), "Card evicted");
            }
        }
        cards.by_id.insert(id, Arc::new(simulator));
        cards.order.push_back(id);

        tracing::debug!(%id, code, "Card opened");
        Ok(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<MockSimulator>> {
        self.cards.read().by_id.get(id).cloned()
    }

    /// Trigger Try Now on a card, returning the chosen delay
    pub fn trigger(&self, id: &Uuid) -> Option<Duration> {
        let simulator = self.get(id)?;
        let delay = simulator.trigger();
        self.activity.record(ActivityKind::Simulation {
            code: simulator.code(),
            delay_ms: delay.as_millis() as u64,
        });
        Some(delay)
    }

    pub fn snapshot(&self, id: &Uuid) -> Option<CardSnapshot> {
        self.get(id).map(|simulator| CardSnapshot {
            id: *id,
            code: simulator.code(),
            state: simulator.snapshot(),
        })
    }

    /// Cancel and forget a card
    pub fn close(&self, id: &Uuid) -> bool {
        match self.cards.write().remove(id) {
            Some(simulator) => {
                simulator.cancel();
                tracing::debug!(%id, "Card closed");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.cards.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Card registry shared across handlers
pub type SharedCards = Arc<CardRegistry>;

pub fn create_shared_cards(
    catalog: SharedCatalog,
    config: SharedConfig,
    activity: SharedActivity,
) -> SharedCards {
    Arc::new(CardRegistry::new(catalog, config, activity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::create_shared_activity;
    use crate::catalog::Catalog;
    use crate::config::{AppConfig, CardsConfig, SimulatorConfig};
    use std::time::Instant;

    fn simulator_for(code: u16, delay: Range<u64>) -> MockSimulator {
        let catalog = Catalog::builtin().unwrap();
        MockSimulator::new(catalog.lookup(code).unwrap(), delay)
    }

    #[test]
    fn test_pick_delay_in_range() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let delay = pick_delay_ms(&(400..1400));
            assert!((400..1400).contains(&delay));
            seen.insert(delay);
        }
        assert!(seen.len() > 100);
        assert_eq!(pick_delay_ms(&(7..7)), 7);
        assert_eq!(pick_delay_ms(&(8..3)), 8);
    }

    #[test]
    fn test_starts_idle() {
        let simulator = simulator_for(200, 400..1400);
        assert_eq!(simulator.snapshot(), SimulationState::Idle);
    }

    #[tokio::test]
    async fn test_try_now_exposes_mock_response() {
        let catalog = Catalog::builtin().unwrap();
        let entry = catalog.lookup(200).unwrap();
        let simulator = MockSimulator::new(entry, 400..1400);

        let started = Instant::now();
        let delay = simulator.trigger();
        assert!(simulator.snapshot().is_loading());
        assert!(delay >= Duration::from_millis(400) && delay < Duration::from_millis(1400));

        let response = simulator.wait_for_response().await.unwrap();
        assert_eq!(response, entry.mock.response);
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert!(started.elapsed() < Duration::from_millis(2400));
        assert!(!simulator.snapshot().is_loading());
    }

    #[tokio::test]
    async fn test_retrigger_discards_previous_run() {
        let simulator = simulator_for(404, 30..31);

        simulator.trigger();
        simulator.trigger();
        match simulator.snapshot() {
            SimulationState::Loading { run, .. } => assert_eq!(run, 2),
            other => panic!("expected loading, got {:?}", other),
        }

        simulator.wait_for_response().await.unwrap();
        match simulator.snapshot() {
            SimulationState::Loaded { run, .. } => assert_eq!(run, 2),
            other => panic!("expected loaded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_prevents_stale_response() {
        let simulator = simulator_for(500, 20..21);

        simulator.trigger();
        simulator.cancel();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(simulator.snapshot(), SimulationState::Idle);
        assert_eq!(
            simulator.wait_for_response().await,
            Err(SimulatorError::Idle)
        );
    }

    #[tokio::test]
    async fn test_cards_are_independent() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let config = SharedConfig::new(AppConfig::default());
        config.update_simulator(SimulatorConfig {
            min_delay_ms: 5,
            max_delay_ms: 10,
        });
        let activity = create_shared_activity(100);
        let cards = CardRegistry::new(catalog, config, activity.clone());

        let first = cards.open(200).unwrap();
        let second = cards.open(200).unwrap();
        assert_ne!(first, second);
        assert_eq!(cards.len(), 2);

        cards.trigger(&first).unwrap();
        assert!(cards.snapshot(&first).unwrap().state.is_loading());
        assert_eq!(cards.snapshot(&second).unwrap().state, SimulationState::Idle);

        let response = cards.get(&first).unwrap().wait_for_response().await.unwrap();
        assert_eq!(response["name"], "Ada Lovelace");
        assert_eq!(activity.get_summary().simulations, 1);

        assert!(cards.close(&first));
        assert!(!cards.close(&first));
        assert!(cards.trigger(&first).is_none());
    }

    #[tokio::test]
    async fn test_open_evicts_oldest_beyond_cap() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let config = SharedConfig::new(AppConfig::default());
        config.update_cards(CardsConfig { max_open: 3 });
        let cards = CardRegistry::new(catalog, config, create_shared_activity(100));

        let first = cards.open(200).unwrap();
        let first_simulator = cards.get(&first).unwrap();
        cards.trigger(&first).unwrap();
        let opened: Vec<Uuid> = (0..10).map(|_| cards.open(404).unwrap()).collect();

        assert_eq!(cards.len(), 3);
        assert!(cards.get(&first).is_none());
        assert_eq!(first_simulator.snapshot(), SimulationState::Idle);
        for id in &opened[..7] {
            assert!(cards.snapshot(id).is_none());
        }
        for id in &opened[7..] {
            assert!(cards.snapshot(id).is_some());
        }

        // Closing frees a slot without evicting anyone else
        assert!(cards.close(&opened[9]));
        let replacement = cards.open(500).unwrap();
        assert_eq!(cards.len(), 3);
        assert!(cards.get(&opened[7]).is_some());
        assert!(cards.get(&replacement).is_some());
    }

    #[test]
    fn test_open_unknown_code() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let cards = CardRegistry::new(
            catalog,
            SharedConfig::new(AppConfig::default()),
            create_shared_activity(10),
        );
        assert_eq!(cards.open(999), Err(LookupError::NotFound(999)));
        assert!(cards.is_empty());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(SimulationState::Loading {
            run: 1,
            delay_ms: 400,
        })
        .unwrap();
        assert_eq!(json["state"], "loading");
        assert_eq!(json["delay_ms"], 400);
    }
}
