//! The server-authoritative game engine: lazy energy regeneration, tap and
//! purchase processing, autoclicker detection, and the player-store seam the
//! transport layer plugs persistence into. No HTTP types appear here.

pub mod abuse;
pub mod clock;
mod engine;
pub mod store;

pub use abuse::{AbuseDetector, Admission};
pub use engine::{Engine, EngineConfig, EngineError};
pub use store::{MemoryStore, PlayerStore, StoreError};
