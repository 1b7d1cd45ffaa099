//! Fixed economy and anti-abuse constants. Every tunable of the game lives
//! here; the engine and server never hard-code these values inline.

/// Energy pool granted to a brand-new player (also their starting max).
pub const STARTING_MAX_ENERGY: u32 = 1_000;

/// Energy regenerated per elapsed wall-clock second.
pub const ENERGY_REGEN_PER_SEC: f64 = 1.0;

/// Energy consumed by one accepted tap.
pub const TAP_ENERGY_COST: f64 = 1.0;

/// Price of the multi-tap upgrade at level 1.
pub const MULTITAP_BASE_PRICE: u64 = 100;

/// Price of the energy-capacity upgrade at level 1.
pub const ENERGY_BASE_PRICE: u64 = 200;

/// Multiplicative growth applied to upgrade prices per owned level.
pub const PRICE_GROWTH: f64 = 1.2;

/// Increase to `max_energy` granted by each energy upgrade.
pub const ENERGY_UPGRADE_STEP: u32 = 500;

/// One-time price of the golden skin.
pub const SKIN_PRICE: u64 = 1_000;

/// Probability that an accepted tap rolls a combo.
pub const COMBO_CHANCE: f64 = 0.05;

/// Reward multiplier applied to a combo tap.
pub const COMBO_MULTIPLIER: u64 = 4;

/// Maximum taps admitted within any rolling one-second window.
pub const MAX_CLICKS_PER_SECOND: usize = 20;

/// Width of the tap-rate window in milliseconds.
pub const CLICK_WINDOW_MS: u64 = 1_000;

/// Duration of an autoclicker ban in milliseconds.
pub const AUTOCLICK_BAN_MS: u64 = 2 * 60 * 1_000;

/// Maximum accepted age of signed init data, in seconds.
pub const AUTH_MAX_AGE_SECONDS: u64 = 24 * 60 * 60;

/// Default number of rows returned by the leaderboard.
pub const LEADERBOARD_LIMIT: usize = 100;
