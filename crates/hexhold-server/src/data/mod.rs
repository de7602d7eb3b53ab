//! Persistent domain operations: players, lobbies, games, hexes, points,
//! events, terrain.
//!
//! Pure functions of the KV facade. Hex and points state for a game is
//! shared only through these operations; rooms never cache ownership between
//! actions, so any process reading the same keys sees the same game.

mod games;
mod hexes;
mod players;

pub use hexes::UpgradeCounts;

use chrono::Utc;
use serde::de::DeserializeOwned;

use hexhold_core::GameConfig;

use crate::kv::{Kv, KvError};

/// Errors from the data layer. Absent records are modeled as `Option::None`
/// by read operations; `NotFound` is reserved for mutations that require an
/// existing record.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("corrupt record at {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
}

/// Handle to every persistent domain operation.
#[derive(Clone)]
pub struct GameData {
    kv: Kv,
    cfg: GameConfig,
}

impl GameData {
    pub fn new(kv: Kv, cfg: GameConfig) -> Self {
        Self { kv, cfg }
    }

    pub fn kv(&self) -> &Kv {
        &self.kv
    }

    pub fn cfg(&self) -> &GameConfig {
        &self.cfg
    }
}

/// Current wall-clock time in milliseconds, the timestamp unit of every
/// stored record.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn parse_json<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, DataError> {
    serde_json::from_str(raw).map_err(|source| DataError::Corrupt {
        key: key.to_string(),
        source,
    })
}

/// Shared KV key layout. Must stay exact: sibling processes address the same
/// keys.
pub(crate) mod keys {
    use hexhold_protocol::{PlayerId, RoomId};

    pub const PLAYERS_ACTIVE: &str = "players:active";
    pub const PLAYERS_BY_USERNAME: &str = "players:by-username";
    pub const LOBBIES_ACTIVE: &str = "lobbies:active";
    pub const GAMES_ACTIVE: &str = "games:active";

    pub fn player_data(id: &PlayerId) -> String {
        format!("players:{id}:data")
    }

    pub fn player_session(id: &PlayerId) -> String {
        format!("players:{id}:session")
    }

    pub fn lobby_data(id: &RoomId) -> String {
        format!("lobbies:{id}:data")
    }

    pub fn lobby_players(id: &RoomId) -> String {
        format!("lobbies:{id}:players")
    }

    pub fn game_data(id: &RoomId) -> String {
        format!("games:{id}:data")
    }

    pub fn game_players(id: &RoomId) -> String {
        format!("games:{id}:players")
    }

    pub fn game_hexes(id: &RoomId) -> String {
        format!("games:{id}:hexes")
    }

    pub fn game_points(id: &RoomId) -> String {
        format!("games:{id}:points")
    }

    pub fn game_events(id: &RoomId) -> String {
        format!("games:{id}:events")
    }
}
