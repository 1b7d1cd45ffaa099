use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::STARTING_MAX_ENERGY;

/// Display fields refreshed from the verified caller on every load. They are
/// cosmetic: no game rule reads them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub username: String,
    pub first_name: String,
}

impl PlayerProfile {
    pub const DEFAULT_USERNAME: &'static str = "anonymous";
    pub const DEFAULT_FIRST_NAME: &'static str = "Player";
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            username: Self::DEFAULT_USERNAME.to_string(),
            first_name: Self::DEFAULT_FIRST_NAME.to_string(),
        }
    }
}

/// Violation of a player-record invariant. These indicate a bug in the
/// engine, not bad user input.
#[derive(Debug, Error, PartialEq)]
pub enum PlayerInvariantError {
    #[error("energy {energy} outside [0, {max_energy}]")]
    EnergyOutOfRange { energy: f64, max_energy: u32 },
    #[error("coin balance {coins} is negative")]
    NegativeCoins { coins: f64 },
    #[error("{field} is {value}, must be >= 1")]
    LevelBelowOne { field: &'static str, value: u32 },
}

/// The durable, server-authoritative record for one player. Everything the
/// client renders is derived from this; the client is never trusted with
/// balances or timers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Stable caller identity (the Telegram user id, as a string).
    pub identity: String,
    #[serde(flatten)]
    pub profile: PlayerProfile,
    pub coins: f64,
    pub energy: f64,
    pub max_energy: u32,
    pub multi_tap_level: u32,
    pub energy_level: u32,
    pub skin_bought: bool,
    /// Unix milliseconds of the last regeneration evaluation.
    pub last_update: u64,
    /// Unix milliseconds when an active ban expires, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban_end_time: Option<u64>,
}

impl PlayerState {
    /// A brand-new player: full energy, level 1 everywhere, no coins.
    pub fn new(identity: impl Into<String>, profile: PlayerProfile, now_ms: u64) -> Self {
        Self {
            identity: identity.into(),
            profile,
            coins: 0.0,
            energy: f64::from(STARTING_MAX_ENERGY),
            max_energy: STARTING_MAX_ENERGY,
            multi_tap_level: 1,
            energy_level: 1,
            skin_bought: false,
            last_update: now_ms,
            ban_end_time: None,
        }
    }

    /// Whether a ban is in force at `now_ms`. An expired `ban_end_time` is
    /// kept on the record but no longer binds.
    pub fn is_banned(&self, now_ms: u64) -> bool {
        self.ban_end_time.is_some_and(|end| end > now_ms)
    }

    /// Records a ban ending at `end_ms`. An active ban is never shortened or
    /// re-extended by a later call with an earlier end.
    pub fn apply_ban(&mut self, end_ms: u64) {
        if self.ban_end_time.is_none_or(|current| end_ms > current) {
            self.ban_end_time = Some(end_ms);
        }
    }

    pub fn validate_invariants(&self) -> Result<(), PlayerInvariantError> {
        if self.energy < 0.0 || self.energy > f64::from(self.max_energy) {
            return Err(PlayerInvariantError::EnergyOutOfRange {
                energy: self.energy,
                max_energy: self.max_energy,
            });
        }
        if self.coins < 0.0 {
            return Err(PlayerInvariantError::NegativeCoins { coins: self.coins });
        }
        if self.multi_tap_level < 1 {
            return Err(PlayerInvariantError::LevelBelowOne {
                field: "multi_tap_level",
                value: self.multi_tap_level,
            });
        }
        if self.energy_level < 1 {
            return Err(PlayerInvariantError::LevelBelowOne {
                field: "energy_level",
                value: self.energy_level,
            });
        }
        Ok(())
    }
}
