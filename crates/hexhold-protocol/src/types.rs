//! Domain records as they live in the shared KV and on the wire.
//!
//! All JSON field names are camelCase so that every process sharing the KV
//! reads and writes identical payloads.

use serde::{Deserialize, Serialize};

use crate::{PlayerId, RoomId};

/// Tile upgrade purchased by the owning player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Upgrade {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "bank")]
    Bank,
    #[serde(rename = "fort")]
    Fort,
    #[serde(rename = "city")]
    City,
}

impl Upgrade {
    pub fn is_none(self) -> bool {
        matches!(self, Upgrade::None)
    }

    /// Lowercase plural key used in upgrade-count maps (`banks`, `forts`,
    /// `cities`).
    pub fn plural_key(self) -> Option<&'static str> {
        match self {
            Upgrade::None => None,
            Upgrade::Bank => Some("banks"),
            Upgrade::Fort => Some("forts"),
            Upgrade::City => Some("cities"),
        }
    }
}

/// Fixed terrain of a cell. Mountains are impassable and unclaimable; rivers
/// are passable but unclaimable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "mountain")]
    Mountain,
    #[serde(rename = "river")]
    River,
}

impl Terrain {
    pub fn is_passable(self) -> bool {
        !matches!(self, Terrain::Mountain)
    }

    /// Terrain that can never carry an owner.
    pub fn is_claimable(self) -> bool {
        matches!(self, Terrain::None)
    }
}

/// One stored cell, keyed by [`crate::Hex::key`] in the game's hex hash.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HexTile {
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub upgrade: Upgrade,
    #[serde(default)]
    pub terrain: Terrain,
    #[serde(default)]
    pub capture_time: i64,
    #[serde(default)]
    pub is_start: bool,
}

impl HexTile {
    pub fn is_owned_by(&self, player: &PlayerId) -> bool {
        self.player_id.as_ref() == Some(player)
    }
}

/// Wire view of one cell, as carried by `history` and `update` frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HexView {
    pub q: i32,
    pub r: i32,
    pub color: String,
    pub crown: bool,
    pub upgrade: Upgrade,
    pub terrain: Terrain,
}

/// Kinds of entries in a game's append-only event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Start,
    Capture,
    #[serde(rename = "auto-capture")]
    AutoCapture,
    Upgrade,
}

/// One entry of a game's event log. Insertion order is preserved and must
/// never be reordered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub game_id: RoomId,
    pub player_id: PlayerId,
    pub color: String,
    pub q: i32,
    pub r: i32,
    pub event_type: EventType,
    pub timestamp: i64,
}

/// Per-player economy record for one game.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPoints {
    pub points: i64,
    pub max_points: i64,
    #[serde(default)]
    pub start_q: Option<i32>,
    #[serde(default)]
    pub start_r: Option<i32>,
    #[serde(default)]
    pub last_update: i64,
}

/// Registered player record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub username: String,
    pub color: String,
    pub created_at: i64,
    pub last_seen: i64,
}

/// Lifecycle status shared by lobbies and games.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Closed,
}

/// Stored lobby record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyRecord {
    pub id: RoomId,
    pub created_at: i64,
    pub status: RoomStatus,
    #[serde(default)]
    pub lobby_start_time: Option<i64>,
}

/// Snapshot of one admitted player, taken at game kickoff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPlayer {
    pub id: PlayerId,
    pub color: String,
}

/// Stored game record. The game id doubles as its room id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: RoomId,
    pub created_at: i64,
    pub status: RoomStatus,
    pub start_players: Vec<StartPlayer>,
    pub lobby_start_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_serializes_as_storage_strings() {
        assert_eq!(serde_json::to_string(&Upgrade::None).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&Upgrade::Bank).unwrap(), "\"bank\"");
        let parsed: Upgrade = serde_json::from_str("\"fort\"").unwrap();
        assert_eq!(parsed, Upgrade::Fort);
    }

    #[test]
    fn upgrade_plural_keys_are_lowercase() {
        assert_eq!(Upgrade::Bank.plural_key(), Some("banks"));
        assert_eq!(Upgrade::Fort.plural_key(), Some("forts"));
        assert_eq!(Upgrade::City.plural_key(), Some("cities"));
        assert_eq!(Upgrade::None.plural_key(), None);
    }

    #[test]
    fn mountain_is_impassable_and_unclaimable() {
        assert!(!Terrain::Mountain.is_passable());
        assert!(!Terrain::Mountain.is_claimable());
        assert!(Terrain::River.is_passable());
        assert!(!Terrain::River.is_claimable());
        assert!(Terrain::None.is_passable());
        assert!(Terrain::None.is_claimable());
    }

    #[test]
    fn hex_tile_json_uses_camel_case() {
        let tile = HexTile {
            player_id: Some(PlayerId::new("p1")),
            color: "#e74c3c".into(),
            upgrade: Upgrade::Bank,
            terrain: Terrain::None,
            capture_time: 1234,
            is_start: true,
        };
        let json = serde_json::to_value(&tile).unwrap();
        assert_eq!(json["playerId"], "p1");
        assert_eq!(json["captureTime"], 1234);
        assert_eq!(json["isStart"], true);
        assert_eq!(json["upgrade"], "bank");

        let back: HexTile = serde_json::from_value(json).unwrap();
        assert_eq!(back, tile);
    }

    #[test]
    fn event_type_auto_capture_spelling() {
        let json = serde_json::to_string(&EventType::AutoCapture).unwrap();
        assert_eq!(json, "\"auto-capture\"");
    }

    #[test]
    fn sparse_tile_json_fills_defaults() {
        let tile: HexTile = serde_json::from_str("{\"terrain\":\"mountain\"}").unwrap();
        assert_eq!(tile.player_id, None);
        assert_eq!(tile.terrain, Terrain::Mountain);
        assert_eq!(tile.upgrade, Upgrade::None);
        assert!(!tile.is_start);
    }
}
