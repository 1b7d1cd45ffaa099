//! The action engine: one entry point per verb, applied atomically per
//! player. Validation happens against fully regenerated state, mutations
//! are persisted before the response is produced, and a rejected action
//! leaves the economic state exactly as it found it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::warn;

use tapcoin_types::{
    upgrade_price, ActionEvent, ActionKind, ActionResponse, PlayerProfile, PlayerState,
    RejectReason, UpgradeKind, COMBO_CHANCE, COMBO_MULTIPLIER, ENERGY_UPGRADE_STEP, SKIN_PRICE,
    TAP_ENERGY_COST,
};

use crate::abuse::{AbuseDetector, Admission};
use crate::clock;
use crate::store::{PlayerStore, StoreError};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum EngineError {
    /// Another action for the same identity is already in flight.
    #[error("another action for this player is in flight")]
    Busy,
    /// The player store failed or exceeded its budget; the action was not
    /// applied.
    #[error("player store unavailable: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Probability that an accepted tap rolls a combo.
    pub combo_chance: f64,
    /// Budget for a single store load or save.
    pub store_timeout: Duration,
    /// Seed for the combo RNG (entropy-seeded when unset).
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            combo_chance: COMBO_CHANCE,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            rng_seed: None,
        }
    }
}

pub struct Engine<S> {
    store: S,
    abuse: AbuseDetector,
    config: EngineConfig,
    rng: StdMutex<StdRng>,
    guards: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: PlayerStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            abuse: AbuseDetector::new(),
            config,
            rng: StdMutex::new(rng),
            guards: StdMutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read path: settles regeneration and returns the canonical record.
    pub async fn snapshot(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        now_ms: u64,
    ) -> Result<PlayerState, EngineError> {
        let _held = self.acquire(identity)?;
        let mut state = self.load(identity, profile, now_ms).await?;
        clock::advance(&mut state, now_ms);
        self.save(&state).await?;
        Ok(state)
    }

    /// Applies one action for `identity` at `now_ms`. The returned response
    /// carries the post-action record regardless of the verdict.
    pub async fn act(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        kind: ActionKind,
        now_ms: u64,
    ) -> Result<ActionResponse, EngineError> {
        let _held = self.acquire(identity)?;
        let mut state = self.load(identity, profile, now_ms).await?;
        clock::advance(&mut state, now_ms);

        let event = match kind {
            ActionKind::Tap => self.apply_tap(&mut state, now_ms),
            ActionKind::BuyMultitap => apply_upgrade(&mut state, UpgradeKind::MultiTap),
            ActionKind::BuyEnergy => apply_upgrade(&mut state, UpgradeKind::Energy),
            ActionKind::BuySkin => apply_skin(&mut state),
        };

        debug_assert!(state.validate_invariants().is_ok());
        self.save(&state).await?;
        Ok(ActionResponse { data: state, event })
    }

    /// Takes the per-identity exclusive section, or fails with `Busy` if a
    /// request for the same player is already being processed. Requests for
    /// different identities never contend.
    fn acquire(&self, identity: &str) -> Result<tokio::sync::OwnedMutexGuard<()>, EngineError> {
        let guard = {
            let mut guards = self.guards.lock().unwrap_or_else(|err| err.into_inner());
            guards.entry(identity.to_string()).or_default().clone()
        };
        guard.try_lock_owned().map_err(|_| EngineError::Busy)
    }

    fn apply_tap(&self, state: &mut PlayerState, now_ms: u64) -> ActionEvent {
        if state.energy < TAP_ENERGY_COST {
            return ActionEvent::rejected(RejectReason::NoEnergy);
        }
        match self.abuse.check(&state.identity, now_ms, state.ban_end_time) {
            Admission::Deny {
                ban_end_time,
                newly_banned,
            } => {
                if newly_banned {
                    state.apply_ban(ban_end_time);
                    warn!(
                        identity = %state.identity,
                        ban_end_time,
                        "tap rate exceeded; autoclicker ban applied"
                    );
                }
                ActionEvent::Banned { ban_end_time }
            }
            Admission::Admit => {
                state.energy -= TAP_ENERGY_COST;
                let is_combo = self.roll_combo();
                let multiplier = if is_combo { COMBO_MULTIPLIER } else { 1 };
                let coins_earned = u64::from(state.multi_tap_level) * multiplier;
                state.coins += coins_earned as f64;
                ActionEvent::tap_ok(coins_earned, is_combo)
            }
        }
    }

    fn roll_combo(&self) -> bool {
        if self.config.combo_chance <= 0.0 {
            return false;
        }
        if self.config.combo_chance >= 1.0 {
            return true;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|err| err.into_inner());
        rng.gen_bool(self.config.combo_chance)
    }

    async fn load(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        now_ms: u64,
    ) -> Result<PlayerState, EngineError> {
        match timeout(
            self.config.store_timeout,
            self.store.load(identity, profile, now_ms),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::Storage(StoreError::Timeout)),
        }
    }

    async fn save(&self, state: &PlayerState) -> Result<(), EngineError> {
        match timeout(self.config.store_timeout, self.store.save(state)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::Storage(StoreError::Timeout)),
        }
    }
}

fn apply_upgrade(state: &mut PlayerState, kind: UpgradeKind) -> ActionEvent {
    let owned_level = match kind {
        UpgradeKind::MultiTap => state.multi_tap_level,
        UpgradeKind::Energy => state.energy_level,
    };
    let price = upgrade_price(kind, owned_level);
    if state.coins < price as f64 {
        return ActionEvent::not_enough_coins(price);
    }
    state.coins -= price as f64;
    match kind {
        UpgradeKind::MultiTap => state.multi_tap_level += 1,
        UpgradeKind::Energy => {
            state.energy_level += 1;
            state.max_energy += ENERGY_UPGRADE_STEP;
            // The upgrade refills the enlarged pool as part of the reward.
            state.energy = f64::from(state.max_energy);
        }
    }
    ActionEvent::purchase_ok()
}

fn apply_skin(state: &mut PlayerState) -> ActionEvent {
    if state.skin_bought {
        return ActionEvent::rejected(RejectReason::AlreadyOwned);
    }
    if state.coins < SKIN_PRICE as f64 {
        return ActionEvent::not_enough_coins(SKIN_PRICE);
    }
    state.coins -= SKIN_PRICE as f64;
    state.skin_bought = true;
    ActionEvent::purchase_ok()
}
