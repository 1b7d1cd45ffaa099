use serde::Serialize;

use tapcoin_types::{COMBO_CHANCE, LEADERBOARD_LIMIT};

const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_HTTP_RATE_LIMIT_PER_SECOND: u64 = 50;
const DEFAULT_HTTP_RATE_LIMIT_BURST: u32 = 100;
const DEFAULT_HTTP_BODY_LIMIT_BYTES: usize = 16 * 1024;

/// Server tuning knobs. `None` for a rate-limit or body-limit field disables
/// that protection (tests run without them).
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub leaderboard_limit: usize,
    pub store_timeout_ms: u64,
    pub combo_chance: f64,
    pub http_rate_limit_per_second: Option<u64>,
    pub http_rate_limit_burst: Option<u32>,
    pub http_body_limit_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            leaderboard_limit: LEADERBOARD_LIMIT,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            combo_chance: COMBO_CHANCE,
            http_rate_limit_per_second: Some(DEFAULT_HTTP_RATE_LIMIT_PER_SECOND),
            http_rate_limit_burst: Some(DEFAULT_HTTP_RATE_LIMIT_BURST),
            http_body_limit_bytes: Some(DEFAULT_HTTP_BODY_LIMIT_BYTES),
        }
    }
}
