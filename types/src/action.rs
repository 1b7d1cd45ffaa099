use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::PlayerState;

/// The client-submitted action verbs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Tap,
    BuyMultitap,
    BuyEnergy,
    BuySkin,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("unknown action")]
pub struct UnknownAction;

impl std::str::FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tap" => Ok(Self::Tap),
            "buy_multitap" => Ok(Self::BuyMultitap),
            "buy_energy" => Ok(Self::BuyEnergy),
            "buy_skin" => Ok(Self::BuySkin),
            _ => Err(UnknownAction),
        }
    }
}

/// Body of `POST /api/action/{identity}`. The action is kept as a raw string
/// so unrecognized verbs map to a 400 instead of a deserialization failure.
#[derive(Clone, Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

/// Why a well-formed action was not applied. Rejections leave the economic
/// state untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoEnergy,
    NotEnoughCoins,
    AlreadyOwned,
}

/// Outcome of one processed action, tagged by status on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionEvent {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coins_earned: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_combo: Option<bool>,
    },
    Banned {
        ban_end_time: u64,
    },
    Rejected {
        reason: RejectReason,
        /// Price of the attempted purchase, present for `not_enough_coins`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        required: Option<u64>,
    },
}

impl ActionEvent {
    pub fn tap_ok(coins_earned: u64, is_combo: bool) -> Self {
        Self::Ok {
            coins_earned: Some(coins_earned),
            is_combo: Some(is_combo),
        }
    }

    pub fn purchase_ok() -> Self {
        Self::Ok {
            coins_earned: None,
            is_combo: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self::Rejected {
            reason,
            required: None,
        }
    }

    pub fn not_enough_coins(required: u64) -> Self {
        Self::Rejected {
            reason: RejectReason::NotEnoughCoins,
            required: Some(required),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Response of `POST /api/action/{identity}`: the full post-action state plus
/// what happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub data: PlayerState,
    pub event: ActionEvent,
}

/// One leaderboard row. Deliberately excludes energy and timers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub identity: String,
    pub username: String,
    pub first_name: String,
    pub coins: f64,
    pub multi_tap_level: u32,
}

impl From<&PlayerState> for LeaderboardEntry {
    fn from(state: &PlayerState) -> Self {
        Self {
            identity: state.identity.clone(),
            username: state.profile.username.clone(),
            first_name: state.profile.first_name.clone(),
            coins: state.coins,
            multi_tap_level: state.multi_tap_level,
        }
    }
}
