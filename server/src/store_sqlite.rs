//! SQLite-backed player store. A dedicated worker thread owns the
//! connection; the async side talks to it over an mpsc channel with oneshot
//! replies, so handler tasks never block on disk I/O.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use tapcoin_engine::{PlayerStore, StoreError};
use tapcoin_types::{LeaderboardEntry, PlayerProfile, PlayerState};

const REQUEST_BUFFER: usize = 1_024;

enum StoreRequest {
    Load {
        identity: String,
        profile: PlayerProfile,
        now_ms: u64,
        reply: oneshot::Sender<Result<PlayerState, StoreError>>,
    },
    Save {
        state: PlayerState,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    Top {
        limit: usize,
        reply: oneshot::Sender<Result<Vec<LeaderboardEntry>, StoreError>>,
    },
}

pub struct SqliteStore {
    sender: mpsc::Sender<StoreRequest>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open player db at {}", path.display()))?;
        info!(path = %path.display(), "player store opened");
        Self::start(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory player db")?;
        Self::start(conn)
    }

    fn start(conn: Connection) -> anyhow::Result<Self> {
        init_schema(&conn).context("failed to initialize player schema")?;
        let (sender, receiver) = mpsc::channel(REQUEST_BUFFER);
        std::thread::Builder::new()
            .name("player-store".to_string())
            .spawn(move || run_worker(conn, receiver))
            .context("failed to spawn player store worker")?;
        Ok(Self { sender })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, StoreError>>) -> StoreRequest,
    ) -> Result<T, StoreError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| StoreError::Backend("player store worker stopped".to_string()))?;
        response
            .await
            .map_err(|_| StoreError::Backend("player store worker dropped reply".to_string()))?
    }
}

#[async_trait]
impl PlayerStore for SqliteStore {
    async fn load(
        &self,
        identity: &str,
        profile: &PlayerProfile,
        now_ms: u64,
    ) -> Result<PlayerState, StoreError> {
        let identity = identity.to_string();
        let profile = profile.clone();
        self.request(|reply| StoreRequest::Load {
            identity,
            profile,
            now_ms,
            reply,
        })
        .await
    }

    async fn save(&self, state: &PlayerState) -> Result<(), StoreError> {
        let state = state.clone();
        self.request(|reply| StoreRequest::Save { state, reply }).await
    }

    async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.request(|reply| StoreRequest::Top { limit, reply }).await
    }
}

fn run_worker(conn: Connection, mut receiver: mpsc::Receiver<StoreRequest>) {
    while let Some(request) = receiver.blocking_recv() {
        match request {
            StoreRequest::Load {
                identity,
                profile,
                now_ms,
                reply,
            } => {
                let _ = reply.send(load_or_create(&conn, &identity, &profile, now_ms));
            }
            StoreRequest::Save { state, reply } => {
                let _ = reply.send(save_player(&conn, &state));
            }
            StoreRequest::Top { limit, reply } => {
                let _ = reply.send(top_players(&conn, limit));
            }
        }
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS players (
            identity TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            first_name TEXT NOT NULL,
            coins REAL NOT NULL,
            energy REAL NOT NULL,
            max_energy INTEGER NOT NULL,
            multi_tap_level INTEGER NOT NULL,
            energy_level INTEGER NOT NULL,
            skin_bought INTEGER NOT NULL,
            last_update INTEGER NOT NULL,
            ban_end_time INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_players_coins_desc ON players (coins DESC);",
    )
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn load_or_create(
    conn: &Connection,
    identity: &str,
    profile: &PlayerProfile,
    now_ms: u64,
) -> Result<PlayerState, StoreError> {
    let existing = conn
        .query_row(
            "SELECT identity, username, first_name, coins, energy, max_energy,
                    multi_tap_level, energy_level, skin_bought, last_update, ban_end_time
             FROM players WHERE identity = ?1",
            params![identity],
            row_to_state,
        )
        .optional()
        .map_err(backend)?;

    match existing {
        Some(mut state) => {
            if state.profile != *profile {
                conn.execute(
                    "UPDATE players SET username = ?2, first_name = ?3 WHERE identity = ?1",
                    params![identity, profile.username, profile.first_name],
                )
                .map_err(backend)?;
                state.profile = profile.clone();
            }
            Ok(state)
        }
        None => {
            let state = PlayerState::new(identity, profile.clone(), now_ms);
            save_player(conn, &state)?;
            Ok(state)
        }
    }
}

fn save_player(conn: &Connection, state: &PlayerState) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO players (identity, username, first_name, coins, energy, max_energy,
                              multi_tap_level, energy_level, skin_bought, last_update, ban_end_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(identity) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name,
            coins = excluded.coins,
            energy = excluded.energy,
            max_energy = excluded.max_energy,
            multi_tap_level = excluded.multi_tap_level,
            energy_level = excluded.energy_level,
            skin_bought = excluded.skin_bought,
            last_update = excluded.last_update,
            ban_end_time = excluded.ban_end_time",
        params![
            state.identity,
            state.profile.username,
            state.profile.first_name,
            state.coins,
            state.energy,
            state.max_energy,
            state.multi_tap_level,
            state.energy_level,
            state.skin_bought,
            state.last_update as i64,
            state.ban_end_time.map(|value| value as i64),
        ],
    )
    .map_err(backend)?;
    Ok(())
}

fn top_players(conn: &Connection, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
    let mut statement = conn
        .prepare(
            "SELECT identity, username, first_name, coins, multi_tap_level
             FROM players
             ORDER BY coins DESC, identity ASC
             LIMIT ?1",
        )
        .map_err(backend)?;
    let rows = statement
        .query_map(params![limit as i64], |row| {
            Ok(LeaderboardEntry {
                identity: row.get(0)?,
                username: row.get(1)?,
                first_name: row.get(2)?,
                coins: row.get(3)?,
                multi_tap_level: row.get(4)?,
            })
        })
        .map_err(backend)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(backend)
}

fn row_to_state(row: &Row<'_>) -> rusqlite::Result<PlayerState> {
    Ok(PlayerState {
        identity: row.get(0)?,
        profile: PlayerProfile {
            username: row.get(1)?,
            first_name: row.get(2)?,
        },
        coins: row.get(3)?,
        energy: row.get(4)?,
        max_energy: row.get(5)?,
        multi_tap_level: row.get(6)?,
        energy_level: row.get(7)?,
        skin_bought: row.get(8)?,
        last_update: row.get::<_, i64>(9)? as u64,
        ban_end_time: row.get::<_, Option<i64>>(10)?.map(|value| value as u64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_load_creates_and_persists_a_default_player() {
        let store = SqliteStore::open_in_memory().unwrap();
        let state = store
            .load("42", &PlayerProfile::default(), 5_000)
            .await
            .unwrap();
        assert_eq!(state, PlayerState::new("42", PlayerProfile::default(), 5_000));

        // A later load at a different time returns the stored record, not a
        // fresh one.
        let again = store
            .load("42", &PlayerProfile::default(), 9_000)
            .await
            .unwrap();
        assert_eq!(again.last_update, 5_000);
    }

    #[tokio::test]
    async fn save_round_trips_every_field() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut state = store
            .load("42", &PlayerProfile::default(), 0)
            .await
            .unwrap();
        state.coins = 1234.5;
        state.energy = 12.25;
        state.max_energy = 1_500;
        state.multi_tap_level = 3;
        state.energy_level = 2;
        state.skin_bought = true;
        state.last_update = 777;
        state.ban_end_time = Some(99_000);
        store.save(&state).await.unwrap();

        let loaded = store
            .load("42", &PlayerProfile::default(), 0)
            .await
            .unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn load_refreshes_profile_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
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
    async fn top_orders_by_coins_then_identity() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (identity, coins) in [("3", 50.0), ("1", 100.0), ("2", 50.0), ("4", 200.0)] {
            let mut state = store
                .load(identity, &PlayerProfile::default(), 0)
                .await
                .unwrap();
            state.coins = coins;
            store.save(&state).await.unwrap();
        }
        let rows = store.top(10).await.unwrap();
        let order: Vec<&str> = rows.iter().map(|row| row.identity.as_str()).collect();
        assert_eq!(order, ["4", "1", "2", "3"]);
    }

    #[tokio::test]
    async fn players_survive_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("players.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            let mut state = store
                .load("42", &PlayerProfile::default(), 0)
                .await
                .unwrap();
            state.coins = 500.0;
            store.save(&state).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let state = store
            .load("42", &PlayerProfile::default(), 0)
            .await
            .unwrap();
        assert_eq!(state.coins, 500.0);
    }
}
