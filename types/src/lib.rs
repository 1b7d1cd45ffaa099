//! Common types shared between the tapcoin engine and server: the durable
//! player record, action wire types, game constants, and the pricing curve.

mod action;
pub mod constants;
mod pricing;
mod state;

pub use action::{
    ActionEvent, ActionKind, ActionRequest, ActionResponse, LeaderboardEntry, RejectReason,
    UnknownAction,
};
pub use constants::*;
pub use pricing::{upgrade_price, UpgradeKind};
pub use state::{PlayerInvariantError, PlayerProfile, PlayerState};
