//! Room runtime.
//!
//! Every room is a single-writer actor: one spawned task owns the room state
//! and consumes an mpsc inbox, so all inbound messages and timer firings for
//! a room execute in order while separate rooms progress in parallel.
//! Sessions carry bounded outbound channels; a full buffer drops the frame so
//! a slow client can never stall its room.

pub mod game;
pub mod lobby;
pub mod replay;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

use hexhold_core::generate_terrain;
use hexhold_protocol::{ClientMessage, PlayerId, RoomId, RoomStatus, ServerMessage, StartPlayer};

use crate::auth::Auth;
use crate::config::ServerConfig;
use crate::data::{now_ms, DataError, GameData};
use game::{AllowedPlayer, GameRoom};
use lobby::LobbyRoom;
use replay::ReplayRoom;

/// Close code for invalid or missing identity and duplicate sessions.
pub const CLOSE_INVALID: u16 = 1000;
/// Close code for an authenticated player not admitted to this room.
pub const CLOSE_NOT_ALLOWED: u16 = 1003;

/// Outbound frames buffered per session before drops kick in.
pub const OUTBOUND_BUFFER: usize = 256;

/// Frames delivered to one connection's writer task.
#[derive(Clone, Debug)]
pub enum SessionFrame {
    Message(Box<ServerMessage>),
    Close(u16, &'static str),
}

/// One connected client session inside a room.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub player_id: Option<PlayerId>,
    tx: mpsc::Sender<SessionFrame>,
}

impl Session {
    pub fn new(id: String, player_id: Option<PlayerId>, tx: mpsc::Sender<SessionFrame>) -> Self {
        Self { id, player_id, tx }
    }

    /// Best-effort delivery. A full buffer means a slow client; the frame is
    /// dropped rather than blocking the room.
    pub fn send(&self, msg: ServerMessage) {
        if self.tx.try_send(SessionFrame::Message(Box::new(msg))).is_err() {
            tracing::debug!(session = %self.id, "dropping frame for slow or gone client");
        }
    }

    pub fn close(&self, code: u16, reason: &'static str) {
        let _ = self.tx.try_send(SessionFrame::Close(code, reason));
    }
}

/// Result of a join request, reported back to the transport layer.
#[derive(Debug)]
pub enum JoinOutcome {
    Accepted,
    Rejected { code: u16, reason: &'static str },
}

/// Commands delivered to a room's inbox.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        session: Session,
        token: Option<String>,
        reply: oneshot::Sender<JoinOutcome>,
    },
    Leave {
        session_id: String,
    },
    Inbound {
        session_id: String,
        message: ClientMessage,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoomKind {
    Lobby,
    Game,
    Replay,
}

/// Handle to a running room task.
#[derive(Clone, Debug)]
pub struct RoomHandle {
    pub id: RoomId,
    pub kind: RoomKind,
    tx: mpsc::Sender<RoomCommand>,
    occupancy: Arc<AtomicUsize>,
}

impl RoomHandle {
    fn new(id: RoomId, kind: RoomKind, tx: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            id,
            kind,
            tx,
            occupancy: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Deliver a command; false when the room task is gone.
    pub async fn send(&self, cmd: RoomCommand) -> bool {
        self.tx.send(cmd).await.is_ok()
    }

    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Relaxed)
    }

    pub(crate) fn set_occupancy(&self, count: usize) {
        self.occupancy.store(count, Ordering::Relaxed);
    }
}

/// Per-session inbound rate limiter (fixed window).
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(1),
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Count one message; false when the session is over its window limit.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.limit
    }
}

/// Registry of live rooms and the matchmaker. Cheap to clone; clones share
/// the same room table.
///
/// One room per game id: a game's room id is its game id, and the map admits
/// a single entry per id. Survives process restarts by restoring game rooms
/// from the shared KV on demand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    rooms: DashMap<String, RoomHandle>,
    data: GameData,
    auth: Arc<Auth>,
    cfg: ServerConfig,
}

impl RoomRegistry {
    pub fn new(data: GameData, auth: Arc<Auth>, cfg: ServerConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                rooms: DashMap::new(),
                data,
                auth,
                cfg,
            }),
        }
    }

    pub fn get(&self, id: &str) -> Option<RoomHandle> {
        self.inner.rooms.get(id).map(|h| h.clone())
    }

    pub(crate) fn remove(&self, id: &RoomId) {
        self.inner.rooms.remove(id.as_str());
    }

    /// Resolve a room id for a joining connection. Unknown ids are checked
    /// against the shared KV: an active game whose room died with a previous
    /// process is respawned here.
    pub async fn get_or_restore(&self, id: &str) -> Option<RoomHandle> {
        if let Some(handle) = self.get(id) {
            return Some(handle);
        }
        let room_id = RoomId::new(id);
        let record = match self.inner.data.get_game(&room_id).await {
            Ok(Some(record)) if record.status == RoomStatus::Active => record,
            Ok(_) => return None,
            Err(err) => {
                tracing::warn!(room = id, error = %err, "room restore lookup failed");
                return None;
            }
        };
        let allowed = record
            .start_players
            .iter()
            .map(|p| AllowedPlayer {
                id: p.id.clone(),
                color: p.color.clone(),
            })
            .collect();
        tracing::info!(game = id, "restoring game room from kv");
        Some(self.spawn_game_room(room_id, allowed, record.lobby_start_time))
    }

    /// Find an active lobby with spare capacity or open a new one.
    pub async fn find_or_create_lobby(&self) -> Result<RoomHandle, DataError> {
        for entry in self.inner.rooms.iter() {
            if entry.kind == RoomKind::Lobby && entry.occupancy() < self.inner.cfg.lobby_capacity {
                return Ok(entry.clone());
            }
        }

        let id = RoomId(Ulid::new().to_string());
        self.inner.data.create_lobby(&id).await?;
        let (tx, rx) = mpsc::channel(128);
        let handle = RoomHandle::new(id.clone(), RoomKind::Lobby, tx);
        let room = LobbyRoom::new(
            id.clone(),
            self.inner.data.clone(),
            Arc::clone(&self.inner.auth),
            self.clone(),
            self.inner.cfg.clone(),
            handle.clone(),
            rx,
        );
        tokio::spawn(room.run());
        self.inner.rooms.insert(id.0.clone(), handle.clone());
        tracing::info!(lobby = %id, "lobby room created");
        Ok(handle)
    }

    /// Create a game for the given players: persist the record, generate and
    /// store terrain, and spawn the room actor.
    pub async fn create_game_room(
        &self,
        allowed: Vec<AllowedPlayer>,
    ) -> Result<RoomHandle, DataError> {
        let id = RoomId(Ulid::new().to_string());
        let lobby_start_time = now_ms();
        let start_players: Vec<StartPlayer> = allowed
            .iter()
            .map(|p| StartPlayer {
                id: p.id.clone(),
                color: p.color.clone(),
            })
            .collect();
        self.inner
            .data
            .create_game(&id, start_players, lobby_start_time)
            .await?;

        let seed: u64 = rand::thread_rng().gen();
        let terrain = generate_terrain(&self.inner.cfg.terrain, seed);
        self.inner.data.store_terrain(&id, &terrain).await?;
        tracing::info!(game = %id, seed, players = allowed.len(), "game room created");

        Ok(self.spawn_game_room(id, allowed, lobby_start_time))
    }

    fn spawn_game_room(
        &self,
        id: RoomId,
        allowed: Vec<AllowedPlayer>,
        lobby_start_time: i64,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::channel(256);
        let handle = RoomHandle::new(id.clone(), RoomKind::Game, tx);
        let room = GameRoom::new(
            id.clone(),
            allowed,
            lobby_start_time,
            self.inner.data.clone(),
            Arc::clone(&self.inner.auth),
            self.clone(),
            self.inner.cfg.clone(),
            handle.clone(),
            rx,
        );
        tokio::spawn(room.run());
        self.inner.rooms.insert(id.0.clone(), handle.clone());
        handle
    }

    /// Allocate a replay room streaming a finished game's event log.
    pub async fn create_replay_room(&self, game_id: &RoomId) -> Result<RoomHandle, DataError> {
        let events = self.inner.data.get_game_events(game_id).await?;
        let id = RoomId(format!("replay-{}", Ulid::new()));
        let (tx, rx) = mpsc::channel(64);
        let handle = RoomHandle::new(id.clone(), RoomKind::Replay, tx);
        let room = ReplayRoom::new(
            id.clone(),
            game_id.clone(),
            events,
            self.clone(),
            self.inner.cfg.clone(),
            handle.clone(),
            rx,
        );
        tokio::spawn(room.run());
        self.inner.rooms.insert(id.0.clone(), handle.clone());
        tracing::info!(replay = %id, game = %game_id, "replay room created");
        Ok(handle)
    }

    pub fn data(&self) -> &GameData {
        &self.inner.data
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.cfg
    }
}
