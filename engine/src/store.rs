//! Persistence seam. The engine drives any backend through [`PlayerStore`];
//! [`MemoryStore`] backs tests and the dev server.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use tapcoin_types::{LeaderboardEntry, PlayerProfile, PlayerState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("storage request timed out")]
    Timeout,
}

/// Backend contract for the durable player records.
#[async_trait]
pub trait PlayerStore: Send + Sync + 'static {
    /// Loads a player, creating the default record on first contact.
    /// Profile fields are refreshed from the verified caller on every load.
    async fn load(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        now_ms: u64,
    ) -> Result<PlayerState, StoreError>;

    /// Persists the full record, replacing any previous version.
    async fn save(&self, state: &PlayerState) -> Result<(), StoreError>;

    /// Top `limit` players by coin balance, ties broken by identity so the
    /// ordering is stable across calls.
    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

#[async_trait]
impl<S: PlayerStore + ?Sized> PlayerStore for Arc<S> {
    async fn load(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        now_ms: u64,
    ) -> Result<PlayerState, StoreError> {
        (**self).load(identity, profile, now_ms).await
    }

    async fn save(&self, state: &PlayerState) -> Result<(), StoreError> {
        (**self).save(state).await
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        (**self).top(limit).await
    }
}

/// In-memory store. Loses everything on restart; fine for tests and local
/// development.
#[derive(Default)]
pub struct MemoryStore {
    players: RwLock<HashMap<String, PlayerState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn load(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        now_ms: u64,
    ) -> Result<PlayerState, StoreError> {
        let mut players = self.players.write().await;
        let state = players
            .entry(identity.to_string())
            .or_insert_with(|| PlayerState::new(identity, profile.clone(), now_ms));
        state.profile = profile.clone();
        Ok(state.clone())
    }

    async fn save(&self, state: &PlayerState) -> Result<(), StoreError> {
        self.players
            .write()
            .await
            .insert(state.identity.clone(), state.clone());
        Ok(())
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let players = self.players.read().await;
        let mut rows: Vec<LeaderboardEntry> =
            players.values().map(LeaderboardEntry::from).collect();
        rows.sort_by(|a, b| {
            b.coins
                .total_cmp(&a.coins)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_load_creates_a_default_player() {
        let store = MemoryStore::new();
        let state = store
            .load("42", &PlayerProfile::default(), 1_000)
            .await
            .unwrap();
        assert_eq!(state.identity, "42");
        assert_eq!(state.coins, 0.0);
        assert_eq!(state.last_update, 1_000);
    }

    #[tokio::test]
    async fn load_refreshes_the_profile() {
        let store = MemoryStore::new();
        store
            .load("42", &PlayerProfile::default(), 0)
            .await
            .unwrap();
        let renamed = PlayerProfile {
            username: "tapper".to_string(),
            first_name: "Tap".to_string(),
        };
        let state = store.load("42", &renamed, 0).await.unwrap();
        assert_eq!(state.profile, renamed);
    }

    #[tokio::test]
    async fn top_orders_by_coins_with_stable_ties() {
        let store = MemoryStore::new();
        for (identity, coins) in [("3", 50.0), ("1", 100.0), ("2", 50.0), ("4", 200.0)] {
            let mut state = store
                .load(identity, &PlayerProfile::default(), 0)
                .await
                .unwrap();
            state.coins = coins;
            store.save(&state).await.unwrap();
        }
        let rows = store.top(3).await.unwrap();
        let order: Vec<&str> = rows.iter().map(|row| row.identity.as_str()).collect();
        assert_eq!(order, ["4", "1", "2"]);
    }
}
