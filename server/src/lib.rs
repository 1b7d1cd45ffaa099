//! HTTP backend for the tapcoin mini-app: identity verification, the game
//! engine behind a small JSON API, SQLite persistence, and operational
//! metrics.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tapcoin_engine::{Engine, EngineConfig, PlayerStore};

pub mod api;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod store_sqlite;

pub use api::Api;
pub use auth::AuthVerifier;
pub use config::ServerConfig;
pub use store_sqlite::SqliteStore;

use metrics::ApiMetrics;

/// Shared server state: one engine over the chosen store, the identity
/// verifier, and the metrics sink.
pub struct App {
    config: ServerConfig,
    engine: Engine<Arc<dyn PlayerStore>>,
    verifier: AuthVerifier,
    metrics: ApiMetrics,
}

impl App {
    pub fn new(store: Arc<dyn PlayerStore>, verifier: AuthVerifier, config: ServerConfig) -> Self {
        let engine_config = EngineConfig {
            combo_chance: config.combo_chance,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            ..EngineConfig::default()
        };
        Self {
            engine: Engine::with_config(store, engine_config),
            verifier,
            metrics: ApiMetrics::default(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine<Arc<dyn PlayerStore>> {
        &self.engine
    }

    pub fn verifier(&self) -> &AuthVerifier {
        &self.verifier
    }

    pub fn metrics(&self) -> &ApiMetrics {
        &self.metrics
    }
}

/// Current wall clock in Unix milliseconds. The clock can regress across
/// restarts or NTP steps; the engine treats a past timestamp as "no time
/// elapsed" rather than failing.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) fn now_unix() -> u64 {
    now_ms() / 1_000
}
