//! Room transport messages.
//!
//! Every in-room frame is a JSON object tagged with a `type` field. The same
//! enums cover lobby, game, and replay rooms; rooms ignore frames that do not
//! apply to them.

use serde::{Deserialize, Serialize};

use crate::{GameEvent, HexView, PlayerId, RoomId, Terrain, Upgrade};

/// Target cell reference in batch fill frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexRef {
    pub q: i32,
    pub r: i32,
}

/// One entry of a batch upgrade frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRef {
    pub q: i32,
    pub r: i32,
    pub upgrade: Upgrade,
}

/// Per-hex rejection reasons, reported to the initiating client only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillReject {
    Insufficient,
    NotAdjacent,
    NotOwner,
    Impassable,
    NotStarted,
    Occupied,
    WindowClosed,
    AlreadyStarted,
    InvalidUpgrade,
    Unavailable,
}

/// Result of one capture attempt inside a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillOutcome {
    pub q: i32,
    pub r: i32,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FillReject>,
}

/// Result of one upgrade attempt inside a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeOutcome {
    pub q: i32,
    pub r: i32,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<Upgrade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FillReject>,
}

/// Lobby roster entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub username: String,
    pub color: String,
    pub started: bool,
}

/// Client-to-server frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Room admission. Must be the first frame on a connection; replay rooms
    /// accept it with both fields absent.
    Join {
        #[serde(default)]
        player_id: Option<PlayerId>,
        #[serde(default)]
        token: Option<String>,
    },
    /// Start pick during the start window.
    ChooseStart { q: i32, r: i32 },
    /// Single-hex capture on the drag path (no adjacency rule).
    FillHex { q: i32, r: i32 },
    /// Capture-attempt each cell in order; per-hex results.
    BatchFillHex { hexes: Vec<HexRef> },
    /// Deliberate click: owned-tile menu or capture with the adjacency rule.
    ClickHex { q: i32, r: i32 },
    /// Buy an upgrade on an owned hex.
    UpgradeHex { q: i32, r: i32, upgrade: Upgrade },
    BatchUpgradeHex { hexes: Vec<UpgradeRef> },
    /// Ask for the exact cost a capture of `(q, r)` would be charged.
    RequestHoverCost { q: i32, r: i32 },
    RequestPointsUpdate,
    /// Lobby: mark this session ready for matchmaking.
    JoinGame,
    /// Lobby: ask the matchmaker for a replay room of a finished game.
    CreateReplay { game_id: RoomId },
    /// Latency probe.
    Ping { timestamp: i64 },
}

/// Server-to-client frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    AssignedColor {
        color: String,
    },
    /// Full board snapshot sent on join.
    History {
        hexes: Vec<HexView>,
    },
    LobbyStartTime {
        ts: i64,
        start_delay: i64,
    },
    /// Authoritative per-cell state after any mutation.
    Update {
        q: i32,
        r: i32,
        color: String,
        crown: bool,
        upgrade: Upgrade,
        terrain: Terrain,
    },
    FillResult {
        q: i32,
        r: i32,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<FillReject>,
    },
    BatchFillResult {
        results: Vec<FillOutcome>,
    },
    BatchUpgradeResult {
        results: Vec<UpgradeOutcome>,
    },
    OpenOwnedTileMenu {
        q: i32,
        r: i32,
        upgrade: Upgrade,
    },
    HoverCost {
        q: i32,
        r: i32,
        cost: Option<i64>,
    },
    PointsUpdate {
        player_id: PlayerId,
        points: i64,
        tiles: i64,
        max_points: i64,
    },
    UpgradeResult {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        upgrade: Option<Upgrade>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<FillReject>,
    },
    /// Lobby roster after any change.
    LobbyRoster {
        players: Vec<RosterEntry>,
    },
    Countdown {
        seconds: u32,
    },
    /// The lobby matched this session into a game room.
    StartGame {
        room_id: RoomId,
    },
    ReplayCreated {
        room_id: RoomId,
    },
    ReplayInfo {
        game_id: RoomId,
        total_events: usize,
    },
    /// One stored event, re-broadcast at its original relative offset.
    ReplayEvent {
        event: GameEvent,
    },
    ReplayEnd,
    Pong {
        timestamp: i64,
        server_timestamp: i64,
    },
    /// Generic failure for interactive operations; never closes the room.
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_are_type_tagged() {
        let msg = ClientMessage::ClickHex { q: 1, r: -2 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "clickHex");
        assert_eq!(json["q"], 1);
        assert_eq!(json["r"], -2);
    }

    #[test]
    fn join_frame_accepts_missing_credentials() {
        let msg: ClientMessage = serde_json::from_str("{\"type\":\"join\"}").unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                player_id: None,
                token: None
            }
        );
    }

    #[test]
    fn upgrade_frame_field_does_not_collide_with_tag() {
        let msg: ClientMessage =
            serde_json::from_str("{\"type\":\"upgradeHex\",\"q\":0,\"r\":0,\"upgrade\":\"bank\"}")
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::UpgradeHex {
                q: 0,
                r: 0,
                upgrade: Upgrade::Bank
            }
        );
    }

    #[test]
    fn fill_result_omits_reason_on_success() {
        let msg = ServerMessage::FillResult {
            q: 0,
            r: 0,
            ok: true,
            reason: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("reason"));

        let msg = ServerMessage::FillResult {
            q: 0,
            r: 0,
            ok: false,
            reason: Some(FillReject::NotAdjacent),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["reason"], "not_adjacent");
    }

    #[test]
    fn server_frames_roundtrip() {
        let frames = vec![
            ServerMessage::AssignedColor {
                color: "#3498db".into(),
            },
            ServerMessage::LobbyStartTime {
                ts: 1_700_000_000_000,
                start_delay: 5000,
            },
            ServerMessage::Update {
                q: 2,
                r: 3,
                color: "#e74c3c".into(),
                crown: false,
                upgrade: Upgrade::None,
                terrain: Terrain::None,
            },
            ServerMessage::HoverCost {
                q: 1,
                r: 1,
                cost: Some(17),
            },
            ServerMessage::PointsUpdate {
                player_id: PlayerId::new("p1"),
                points: 183,
                tiles: 2,
                max_points: 210,
            },
            ServerMessage::Countdown { seconds: 5 },
            ServerMessage::ReplayEnd,
        ];
        for frame in frames {
            let json = serde_json::to_string(&frame).unwrap();
            let back: ServerMessage = serde_json::from_str(&json).unwrap();
            assert_eq!(back, frame);
        }
    }
}
