//! The replay room: streams a finished game's event log with its original
//! relative timing.
//!
//! Playback is anonymous; viewers join without a token.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use hexhold_protocol::{ClientMessage, GameEvent, RoomId, ServerMessage};

use crate::config::ServerConfig;

use super::{JoinOutcome, RoomCommand, RoomHandle, RoomRegistry, Session, CLOSE_INVALID};

pub struct ReplayRoom {
    id: RoomId,
    game_id: RoomId,
    registry: RoomRegistry,
    cfg: ServerConfig,
    handle: RoomHandle,
    inbox: mpsc::Receiver<RoomCommand>,
    sessions: HashMap<String, Session>,
    /// Stored events with timestamps normalized to offsets from the first.
    events: Vec<GameEvent>,
    offsets: Vec<u64>,
    playing: bool,
    next_event: usize,
    playback_start: Option<Instant>,
    cleanup_deadline: Option<Instant>,
}

impl ReplayRoom {
    pub(super) fn new(
        id: RoomId,
        game_id: RoomId,
        events: Vec<GameEvent>,
        registry: RoomRegistry,
        cfg: ServerConfig,
        handle: RoomHandle,
        inbox: mpsc::Receiver<RoomCommand>,
    ) -> Self {
        let first_ts = events.first().map(|e| e.timestamp).unwrap_or_default();
        let offsets = events
            .iter()
            .map(|e| (e.timestamp - first_ts).max(0) as u64)
            .collect();
        let cleanup_deadline =
            Some(Instant::now() + Duration::from_millis(cfg.game.cleanup_delay_ms));
        Self {
            id,
            game_id,
            registry,
            cfg,
            handle,
            inbox,
            sessions: HashMap::new(),
            events,
            offsets,
            playing: false,
            next_event: 0,
            playback_start: None,
            cleanup_deadline,
        }
    }

    pub(super) async fn run(mut self) {
        loop {
            let cleanup = self.cleanup_deadline;
            let next_deadline = self.next_event_deadline();
            tokio::select! {
                cmd = self.inbox.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = tokio::time::sleep_until(next_deadline.unwrap_or_else(Instant::now)),
                    if next_deadline.is_some() =>
                {
                    self.emit_next_event();
                }
                _ = tokio::time::sleep_until(cleanup.unwrap_or_else(Instant::now)),
                    if cleanup.is_some() =>
                {
                    self.dispose();
                    break;
                }
            }
        }
        self.registry.remove(&self.id);
    }

    fn next_event_deadline(&self) -> Option<Instant> {
        if !self.playing || self.next_event >= self.events.len() {
            return None;
        }
        let start = self.playback_start?;
        Some(start + Duration::from_millis(self.offsets[self.next_event]))
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { session, reply, .. } => {
                // Anonymous viewers are welcome.
                self.sessions.insert(session.id.clone(), session.clone());
                self.handle.set_occupancy(self.sessions.len());
                self.cleanup_deadline = None;
                let _ = reply.send(JoinOutcome::Accepted);

                session.send(ServerMessage::ReplayInfo {
                    game_id: self.game_id.clone(),
                    total_events: self.events.len(),
                });

                if !self.events.is_empty() && !self.playing {
                    tracing::info!(replay = %self.id, events = self.events.len(), "playback started");
                    self.playing = true;
                    self.next_event = 0;
                    self.playback_start = Some(Instant::now());
                }
            }
            RoomCommand::Leave { session_id } => {
                self.sessions.remove(&session_id);
                self.handle.set_occupancy(self.sessions.len());
                if self.sessions.is_empty() && self.cleanup_deadline.is_none() {
                    self.cleanup_deadline = Some(
                        Instant::now() + Duration::from_millis(self.cfg.game.cleanup_delay_ms),
                    );
                }
            }
            RoomCommand::Inbound {
                session_id,
                message,
            } => match message {
                // Replay rooms answer pings and nothing else.
                ClientMessage::Ping { timestamp } => {
                    if let Some(session) = self.sessions.get(&session_id) {
                        session.send(ServerMessage::Pong {
                            timestamp,
                            server_timestamp: crate::data::now_ms(),
                        });
                    }
                }
                other => {
                    tracing::debug!(replay = %self.id, ?other, "frame not applicable to replay");
                }
            },
        }
    }

    fn emit_next_event(&mut self) {
        let Some(event) = self.events.get(self.next_event).cloned() else {
            return;
        };
        self.next_event += 1;
        for session in self.sessions.values() {
            session.send(ServerMessage::ReplayEvent {
                event: event.clone(),
            });
        }
        if self.next_event == self.events.len() {
            for session in self.sessions.values() {
                session.send(ServerMessage::ReplayEnd);
            }
            self.playing = false;
        }
    }

    fn dispose(&mut self) {
        tracing::info!(replay = %self.id, "disposing idle replay room");
        for session in self.sessions.values() {
            session.close(CLOSE_INVALID, "replay closed");
        }
        self.sessions.clear();
        self.handle.set_occupancy(0);
    }
}
