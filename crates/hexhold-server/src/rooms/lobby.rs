//! The lobby room: pre-game staging, countdown, and handoff to a game room.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use hexhold_protocol::{
    ClientMessage, PlayerId, PlayerProfile, RoomId, RosterEntry, ServerMessage,
};

use crate::auth::Auth;
use crate::config::ServerConfig;
use crate::data::GameData;

use super::{
    game::AllowedPlayer, JoinOutcome, RateLimiter, RoomCommand, RoomHandle, RoomRegistry, Session,
    CLOSE_INVALID, CLOSE_NOT_ALLOWED,
};

/// Seconds counted down once enough sessions are ready.
const COUNTDOWN_SECONDS: u32 = 5;

struct LobbySession {
    session: Session,
    profile: PlayerProfile,
    started: bool,
    limiter: RateLimiter,
}

pub struct LobbyRoom {
    id: RoomId,
    data: GameData,
    auth: Arc<Auth>,
    registry: RoomRegistry,
    cfg: ServerConfig,
    handle: RoomHandle,
    inbox: mpsc::Receiver<RoomCommand>,
    sessions: HashMap<String, LobbySession>,
    player_sessions: HashMap<PlayerId, String>,
    countdown: Option<u32>,
    cleanup_deadline: Option<Instant>,
}

impl LobbyRoom {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: RoomId,
        data: GameData,
        auth: Arc<Auth>,
        registry: RoomRegistry,
        cfg: ServerConfig,
        handle: RoomHandle,
        inbox: mpsc::Receiver<RoomCommand>,
    ) -> Self {
        let cleanup_deadline =
            Some(Instant::now() + Duration::from_millis(cfg.game.cleanup_delay_ms));
        Self {
            id,
            data,
            auth,
            registry,
            cfg,
            handle,
            inbox,
            sessions: HashMap::new(),
            player_sessions: HashMap::new(),
            countdown: None,
            cleanup_deadline,
        }
    }

    pub(super) async fn run(mut self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            let cleanup = self.cleanup_deadline;
            tokio::select! {
                cmd = self.inbox.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = ticker.tick() => self.tick().await,
                _ = tokio::time::sleep_until(cleanup.unwrap_or_else(Instant::now)),
                    if cleanup.is_some() =>
                {
                    self.dispose().await;
                    break;
                }
            }
        }
        self.registry.remove(&self.id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                session,
                token,
                reply,
            } => self.handle_join(session, token, reply).await,
            RoomCommand::Leave { session_id } => self.handle_leave(&session_id).await,
            RoomCommand::Inbound {
                session_id,
                message,
            } => self.handle_message(&session_id, message).await,
        }
    }

    async fn handle_join(
        &mut self,
        session: Session,
        token: Option<String>,
        reply: oneshot::Sender<JoinOutcome>,
    ) {
        let Some(player_id) = session.player_id.clone() else {
            let _ = reply.send(JoinOutcome::Rejected {
                code: CLOSE_INVALID,
                reason: "missing player",
            });
            return;
        };
        let verified = token
            .as_deref()
            .is_some_and(|t| self.auth.verify(&player_id, t));
        if !verified {
            let _ = reply.send(JoinOutcome::Rejected {
                code: CLOSE_INVALID,
                reason: "invalid token",
            });
            return;
        }
        if self.sessions.len() >= self.cfg.lobby_capacity
            && !self.player_sessions.contains_key(&player_id)
        {
            let _ = reply.send(JoinOutcome::Rejected {
                code: CLOSE_NOT_ALLOWED,
                reason: "lobby full",
            });
            return;
        }
        let profile = match self.data.get_player(&player_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                let _ = reply.send(JoinOutcome::Rejected {
                    code: CLOSE_INVALID,
                    reason: "unknown player",
                });
                return;
            }
            Err(err) => {
                tracing::warn!(lobby = %self.id, error = %err, "player lookup failed");
                let _ = reply.send(JoinOutcome::Rejected {
                    code: CLOSE_INVALID,
                    reason: "backend unavailable",
                });
                return;
            }
        };

        // A reconnecting player replaces their stale session.
        if let Some(stale) = self.player_sessions.remove(&player_id) {
            if let Some(old) = self.sessions.remove(&stale) {
                old.session.close(CLOSE_INVALID, "duplicate session");
            }
        }

        if let Err(err) = self.data.lobby_add_player(&self.id, &player_id).await {
            tracing::warn!(lobby = %self.id, error = %err, "lobby membership write failed");
        }

        self.cleanup_deadline = None;
        self.player_sessions
            .insert(player_id.clone(), session.id.clone());
        self.sessions.insert(
            session.id.clone(),
            LobbySession {
                session,
                profile,
                started: false,
                limiter: RateLimiter::new(self.cfg.rate_limit_messages),
            },
        );
        self.handle.set_occupancy(self.sessions.len());
        let _ = reply.send(JoinOutcome::Accepted);

        tracing::info!(lobby = %self.id, player = %player_id, "player joined lobby");
        self.broadcast_roster();
    }

    async fn handle_leave(&mut self, session_id: &str) {
        let Some(gone) = self.sessions.remove(session_id) else {
            return;
        };
        self.handle.set_occupancy(self.sessions.len());
        if self.player_sessions.get(&gone.profile.id).map(String::as_str) == Some(session_id) {
            self.player_sessions.remove(&gone.profile.id);
            if let Err(err) = self
                .data
                .lobby_remove_player(&self.id, &gone.profile.id)
                .await
            {
                tracing::warn!(lobby = %self.id, error = %err, "lobby membership write failed");
            }
        }
        self.broadcast_roster();

        // A leaver can break the countdown threshold.
        if self.countdown.is_some() && self.ready_count() < self.cfg.game.min_ready {
            tracing::info!(lobby = %self.id, "countdown aborted, not enough ready players");
            self.countdown = None;
        }
        if self.sessions.is_empty() && self.cleanup_deadline.is_none() {
            self.cleanup_deadline =
                Some(Instant::now() + Duration::from_millis(self.cfg.game.cleanup_delay_ms));
        }
    }

    async fn handle_message(&mut self, session_id: &str, message: ClientMessage) {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            return;
        };
        if !entry.limiter.allow() {
            tracing::warn!(lobby = %self.id, session = session_id, "rate limit exceeded, dropping frame");
            return;
        }
        let session = entry.session.clone();

        match message {
            ClientMessage::JoinGame => {
                entry.started = true;
                self.broadcast_roster();
            }
            ClientMessage::CreateReplay { game_id } => {
                match self.registry.create_replay_room(&game_id).await {
                    Ok(handle) => session.send(ServerMessage::ReplayCreated { room_id: handle.id }),
                    Err(err) => {
                        tracing::warn!(lobby = %self.id, error = %err, "replay creation failed");
                        session.send(ServerMessage::Error {
                            message: "replay unavailable".to_string(),
                        });
                    }
                }
            }
            ClientMessage::Ping { timestamp } => {
                session.send(ServerMessage::Pong {
                    timestamp,
                    server_timestamp: crate::data::now_ms(),
                });
            }
            other => {
                tracing::debug!(lobby = %self.id, ?other, "frame not applicable to lobby");
            }
        }
    }

    async fn tick(&mut self) {
        match self.countdown {
            None => {
                if self.ready_count() >= self.cfg.game.min_ready {
                    self.countdown = Some(COUNTDOWN_SECONDS);
                    self.broadcast(ServerMessage::Countdown {
                        seconds: COUNTDOWN_SECONDS,
                    });
                }
            }
            Some(seconds) => {
                let seconds = seconds.saturating_sub(1);
                self.broadcast(ServerMessage::Countdown { seconds });
                if seconds == 0 {
                    self.countdown = None;
                    self.launch_game().await;
                } else {
                    self.countdown = Some(seconds);
                }
            }
        }
    }

    /// Countdown hit zero: create the game room for the ready players, hand
    /// each of them the room id, and drop them from the lobby.
    async fn launch_game(&mut self) {
        let ready: Vec<(String, PlayerId, String)> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.started)
            .map(|(sid, s)| (sid.clone(), s.profile.id.clone(), s.profile.color.clone()))
            .collect();
        if ready.len() < self.cfg.game.min_ready {
            return;
        }

        let allowed: Vec<AllowedPlayer> = ready
            .iter()
            .map(|(_, id, color)| AllowedPlayer {
                id: id.clone(),
                color: color.clone(),
            })
            .collect();

        let handle = match self.registry.create_game_room(allowed).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(lobby = %self.id, error = %err, "game creation failed");
                self.broadcast(ServerMessage::Error {
                    message: "could not start game".to_string(),
                });
                return;
            }
        };

        tracing::info!(lobby = %self.id, game = %handle.id, players = ready.len(), "game launched");

        if let Err(err) = self
            .data
            .set_lobby_start_time(&self.id, crate::data::now_ms())
            .await
        {
            tracing::warn!(lobby = %self.id, error = %err, "failed to stamp start time");
        }

        for (session_id, player_id, _) in ready {
            if let Some(entry) = self.sessions.remove(&session_id) {
                entry.session.send(ServerMessage::StartGame {
                    room_id: handle.id.clone(),
                });
            }
            self.player_sessions.remove(&player_id);
            if let Err(err) = self.data.lobby_remove_player(&self.id, &player_id).await {
                tracing::warn!(lobby = %self.id, error = %err, "lobby membership write failed");
            }
        }
        self.handle.set_occupancy(self.sessions.len());
        self.broadcast_roster();

        if self.sessions.is_empty() && self.cleanup_deadline.is_none() {
            self.cleanup_deadline =
                Some(Instant::now() + Duration::from_millis(self.cfg.game.cleanup_delay_ms));
        }
    }

    async fn dispose(&mut self) {
        tracing::info!(lobby = %self.id, "closing idle lobby");
        if let Err(err) = self.data.close_lobby(&self.id).await {
            tracing::warn!(lobby = %self.id, error = %err, "failed to close lobby record");
        }
        for entry in self.sessions.values() {
            entry.session.close(CLOSE_INVALID, "lobby closed");
        }
        self.sessions.clear();
        self.handle.set_occupancy(0);
    }

    fn ready_count(&self) -> usize {
        self.sessions.values().filter(|s| s.started).count()
    }

    fn broadcast_roster(&self) {
        let players = self
            .sessions
            .values()
            .map(|s| RosterEntry {
                player_id: s.profile.id.clone(),
                username: s.profile.username.clone(),
                color: s.profile.color.clone(),
                started: s.started,
            })
            .collect();
        self.broadcast(ServerMessage::LobbyRoster { players });
    }

    fn broadcast(&self, msg: ServerMessage) {
        for entry in self.sessions.values() {
            entry.session.send(msg.clone());
        }
    }
}
