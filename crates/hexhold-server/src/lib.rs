//! hexhold multiplayer server.
//!
//! Authoritative server core: rooms own all game state, validate every
//! action, broadcast diffs, and run the periodic simulation ticks. State is
//! shared across processes through the KV facade.

pub mod auth;
pub mod config;
pub mod data;
pub mod http;
pub mod kv;
pub mod rooms;
pub mod telemetry;
pub mod ws;

pub use auth::{Auth, AuthError, RegisteredPlayer};
pub use config::ServerConfig;
pub use data::{DataError, GameData};
pub use kv::{Kv, KvConnection, KvError, KvPool, MemoryKv};
pub use rooms::{RoomHandle, RoomKind, RoomRegistry};
