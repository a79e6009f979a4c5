//! Configuration module for status-quest
//!
//! Supports configuration via file and environment variables.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind the server to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Catalog source
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    /// JSON catalog file; the built-in catalog is used when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Try Now simulation timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Shortest artificial delay, inclusive
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Longest artificial delay, exclusive
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_min_delay_ms() -> u64 {
    400
}

fn default_max_delay_ms() -> u64 {
    1400
}

impl SimulatorConfig {
    /// Delay range in milliseconds, with swapped bounds put right
    pub fn delay_range(&self) -> Range<u64> {
        if self.min_delay_ms <= self.max_delay_ms {
            self.min_delay_ms..self.max_delay_ms
        } else {
            self.max_delay_ms..self.min_delay_ms
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Replay endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Whether `/mock/*` answers with catalog mock responses
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether replayed responses wait the simulated delay
    #[serde(default = "default_true")]
    pub simulate_delay: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            simulate_delay: true,
        }
    }
}

/// Activity log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Maximum number of events kept in memory
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    10000
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// Try Now card registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsConfig {
    /// Open cards kept before the oldest is closed
    #[serde(default = "default_max_open")]
    pub max_open: usize,
}

fn default_max_open() -> usize {
    1000
}

impl Default for CardsConfig {
    fn default() -> Self {
        Self {
            max_open: default_max_open(),
        }
    }
}

/// Replay verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Server to verify (defaults to this server's address)
    #[serde(default)]
    pub target_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub cards: CardsConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> anyhow::Result<Self> {
        // Try to load .env file (ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            config = config.add_source(config::File::with_name("config").required(false));
        }

        // STATUS_QUEST_SIMULATOR__MIN_DELAY_MS style variables; the double
        // underscore separates sections because keys contain single ones
        config = config.add_source(
            config::Environment::with_prefix("STATUS_QUEST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Load configuration from a specific TOML or JSON file
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).or_else(|_| serde_json::from_str(&contents))?;
        Ok(config)
    }

    /// Base URL of this server as seen from the same host
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }
}

/// Runtime configuration shared between the server and the browser
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<AppConfig>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Get a copy of the configuration
    pub fn get(&self) -> AppConfig {
        self.inner.read().clone()
    }

    pub fn simulator(&self) -> SimulatorConfig {
        self.inner.read().simulator.clone()
    }

    pub fn replay(&self) -> ReplayConfig {
        self.inner.read().replay.clone()
    }

    pub fn update_simulator(&self, simulator: SimulatorConfig) {
        self.inner.write().simulator = simulator;
    }

    pub fn cards(&self) -> CardsConfig {
        self.inner.read().cards.clone()
    }

    pub fn update_cards(&self, cards: CardsConfig) {
        self.inner.write().cards = cards;
    }

    pub fn update_replay(&self, replay: ReplayConfig) {
        self.inner.write().replay = replay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.catalog.path.is_none());
        assert_eq!(config.simulator.delay_range(), 400..1400);
        assert!(config.replay.enabled);
        assert_eq!(config.activity.max_entries, 10000);
        assert_eq!(config.cards.max_open, 1000);
        assert_eq!(config.server_url(), "http://127.0.0.1:3000");
    }

    #[test]
    fn test_swapped_delay_bounds() {
        let simulator = SimulatorConfig {
            min_delay_ms: 900,
            max_delay_ms: 100,
        };
        assert_eq!(simulator.delay_range(), 100..900);
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 8080

            [simulator]
            max_delay_ms = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.simulator.delay_range(), 50..400);
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(AppConfig::default());

        shared.update_simulator(SimulatorConfig {
            min_delay_ms: 1,
            max_delay_ms: 2,
        });
        shared.update_replay(ReplayConfig {
            enabled: false,
            simulate_delay: false,
        });

        let updated = shared.get();
        assert_eq!(updated.simulator.delay_range(), 1..2);
        assert!(!updated.replay.enabled);
    }
}
