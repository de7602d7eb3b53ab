//! Wire-visible types for the hexhold game server.
//!
//! Everything a client or a sibling server process can observe lives here:
//! hex coordinates, tile and event records as stored in the shared KV, and
//! the tagged JSON message enums spoken over the room transport.

pub mod hex;
pub mod ids;
pub mod messages;
pub mod types;

pub use hex::Hex;
pub use ids::{PlayerId, RoomId};
pub use messages::{
    ClientMessage, FillOutcome, FillReject, HexRef, RosterEntry, ServerMessage, UpgradeOutcome,
    UpgradeRef,
};
pub use types::{
    EventType, GameEvent, GameRecord, HexTile, HexView, LobbyRecord, PlayerPoints, PlayerProfile,
    RoomStatus, StartPlayer, Terrain, Upgrade,
};
