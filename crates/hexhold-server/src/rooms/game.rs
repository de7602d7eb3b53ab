//! The game room: hex state machine, economy, ticks, and reconnection.
//!
//! All mutations run through the data layer against the shared KV; the room
//! itself keeps only membership and timing state, so a restored room on
//! another process picks up the same board.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use hexhold_core::{capture_cost, is_adjacent_to_river, players_with_river_access, DefenderStats};
use hexhold_protocol::{
    ClientMessage, EventType, FillOutcome, FillReject, GameEvent, Hex, HexView, PlayerId, RoomId,
    ServerMessage, Terrain, Upgrade, UpgradeOutcome,
};

use crate::auth::Auth;
use crate::config::ServerConfig;
use crate::data::{now_ms, GameData};

use super::{
    JoinOutcome, RateLimiter, RoomCommand, RoomHandle, RoomRegistry, Session, CLOSE_INVALID,
    CLOSE_NOT_ALLOWED,
};

/// One admitted player, fixed at room creation.
#[derive(Clone, Debug)]
pub struct AllowedPlayer {
    pub id: PlayerId,
    pub color: String,
}

struct GameSession {
    session: Session,
    player_id: PlayerId,
    limiter: RateLimiter,
}

struct Member {
    color: String,
    disconnected: bool,
}

enum CaptureOutcome {
    Captured,
    OwnedTile(Upgrade),
}

pub struct GameRoom {
    id: RoomId,
    data: GameData,
    auth: Arc<Auth>,
    registry: RoomRegistry,
    cfg: ServerConfig,
    handle: RoomHandle,
    inbox: mpsc::Receiver<RoomCommand>,
    /// Wire value of the start window origin (epoch milliseconds).
    lobby_start_time: i64,
    /// Monotonic end of the start window; a pick exactly at the deadline is
    /// still accepted.
    window_deadline: Instant,
    first_join: Option<Instant>,
    sessions: HashMap<String, GameSession>,
    player_sessions: HashMap<PlayerId, String>,
    members: HashMap<PlayerId, Member>,
    cleanup_deadline: Option<Instant>,
    kv_down: bool,
}

impl GameRoom {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: RoomId,
        allowed: Vec<AllowedPlayer>,
        lobby_start_time: i64,
        data: GameData,
        auth: Arc<Auth>,
        registry: RoomRegistry,
        cfg: ServerConfig,
        handle: RoomHandle,
        inbox: mpsc::Receiver<RoomCommand>,
    ) -> Self {
        let members = allowed
            .into_iter()
            .map(|p| {
                (
                    p.id,
                    Member {
                        color: p.color,
                        disconnected: true,
                    },
                )
            })
            .collect();

        // A restored room may be created mid-window or past it.
        let remaining = (lobby_start_time + cfg.game.start_delay_ms - now_ms()).max(0);
        let window_deadline = Instant::now() + Duration::from_millis(remaining as u64);
        // Nobody is connected yet; if nobody ever joins, drain normally.
        let cleanup_deadline = Some(Instant::now() + Duration::from_millis(cfg.game.cleanup_delay_ms));

        Self {
            id,
            data,
            auth,
            registry,
            cfg,
            handle,
            inbox,
            lobby_start_time,
            window_deadline,
            first_join: None,
            sessions: HashMap::new(),
            player_sessions: HashMap::new(),
            members,
            cleanup_deadline,
            kv_down: false,
        }
    }

    pub(super) async fn run(mut self) {
        let mut econ = tokio::time::interval(Duration::from_millis(self.cfg.game.tick_interval_ms));
        econ.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut expand =
            tokio::time::interval(Duration::from_millis(self.cfg.game.auto_expand_interval_ms));
        expand.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let cleanup = self.cleanup_deadline;
            tokio::select! {
                cmd = self.inbox.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = econ.tick() => self.economy_tick().await,
                _ = expand.tick() => self.auto_expansion_tick().await,
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
        if !self.members.contains_key(&player_id) {
            let _ = reply.send(JoinOutcome::Rejected {
                code: CLOSE_NOT_ALLOWED,
                reason: "not allowed in this game",
            });
            return;
        }

        // Idempotent reconnect: a newer session for the same player evicts
        // the stale one.
        if let Some(stale) = self.player_sessions.remove(&player_id) {
            if let Some(old) = self.sessions.remove(&stale) {
                old.session.close(CLOSE_INVALID, "duplicate session");
            }
        }

        if let Some(member) = self.members.get_mut(&player_id) {
            member.disconnected = false;
        }
        // Any reconnect cancels the drain timer.
        self.cleanup_deadline = None;
        if self.first_join.is_none() {
            self.first_join = Some(Instant::now());
        }
        if self.kv_down && self.data.kv().is_available().await {
            tracing::info!(game = %self.id, "kv reachable again");
            self.kv_down = false;
        }

        let color = self
            .members
            .get(&player_id)
            .map(|m| m.color.clone())
            .unwrap_or_default();

        if let Err(err) = self
            .data
            .set_session(&player_id, &session.id, self.cfg.session_ttl)
            .await
        {
            tracing::warn!(game = %self.id, error = %err, "failed to record session");
        }
        if let Err(err) = self.data.touch_game(&self.id, now_ms()).await {
            tracing::warn!(game = %self.id, error = %err, "failed to refresh activity score");
        }

        self.player_sessions
            .insert(player_id.clone(), session.id.clone());
        self.sessions.insert(
            session.id.clone(),
            GameSession {
                session: session.clone(),
                player_id: player_id.clone(),
                limiter: RateLimiter::new(self.cfg.rate_limit_messages),
            },
        );
        self.handle.set_occupancy(self.sessions.len());
        let _ = reply.send(JoinOutcome::Accepted);

        tracing::info!(game = %self.id, player = %player_id, session = %session.id, "player joined");

        session.send(ServerMessage::AssignedColor { color });
        match self.data.get_all_hexes(&self.id).await {
            Ok(hexes) => {
                let mut entries: Vec<(Hex, _)> = hexes.into_iter().collect();
                entries.sort_by_key(|(hex, _)| (hex.q, hex.r));
                let hexes = entries
                    .into_iter()
                    .map(|(hex, tile)| HexView {
                        q: hex.q,
                        r: hex.r,
                        color: tile.color.clone(),
                        crown: tile.is_start,
                        upgrade: tile.upgrade,
                        terrain: tile.terrain,
                    })
                    .collect();
                session.send(ServerMessage::History { hexes });
            }
            Err(err) => {
                tracing::warn!(game = %self.id, error = %err, "history load failed");
                session.send(ServerMessage::Error {
                    message: "state unavailable".to_string(),
                });
            }
        }
        session.send(ServerMessage::LobbyStartTime {
            ts: self.lobby_start_time,
            start_delay: self.cfg.game.start_delay_ms,
        });
    }

    async fn handle_leave(&mut self, session_id: &str) {
        let Some(gone) = self.sessions.remove(session_id) else {
            return;
        };
        self.handle.set_occupancy(self.sessions.len());
        // Only the active session for a player flips the disconnect flag; an
        // evicted stale session must not mark its reconnected player absent.
        if self.player_sessions.get(&gone.player_id).map(String::as_str) == Some(session_id) {
            self.player_sessions.remove(&gone.player_id);
            if let Some(member) = self.members.get_mut(&gone.player_id) {
                member.disconnected = true;
            }
        }
        tracing::info!(game = %self.id, player = %gone.player_id, "player left");

        let connected = self.members.values().filter(|m| !m.disconnected).count();
        if connected == 0 && self.cleanup_deadline.is_none() {
            self.cleanup_deadline =
                Some(Instant::now() + Duration::from_millis(self.cfg.game.cleanup_delay_ms));
            tracing::info!(game = %self.id, "room empty, drain timer started");
        }
    }

    async fn handle_message(&mut self, session_id: &str, message: ClientMessage) {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            return;
        };
        if !entry.limiter.allow() {
            tracing::warn!(game = %self.id, session = session_id, "rate limit exceeded, dropping frame");
            return;
        }
        let session = entry.session.clone();
        let player = entry.player_id.clone();

        match message {
            ClientMessage::ChooseStart { q, r } => {
                self.choose_start(&session, &player, Hex::new(q, r)).await;
            }
            ClientMessage::ClickHex { q, r } => {
                self.click_hex(&session, &player, Hex::new(q, r)).await;
            }
            ClientMessage::FillHex { q, r } => {
                let hex = Hex::new(q, r);
                let result = self.attempt_capture(&player, hex, false, false).await;
                session.send(ServerMessage::FillResult {
                    q,
                    r,
                    ok: result.is_ok(),
                    reason: result.err(),
                });
            }
            ClientMessage::BatchFillHex { hexes } => {
                let mut results = Vec::with_capacity(hexes.len());
                for target in hexes {
                    let hex = Hex::new(target.q, target.r);
                    let result = self.attempt_capture(&player, hex, false, false).await;
                    results.push(FillOutcome {
                        q: target.q,
                        r: target.r,
                        ok: result.is_ok(),
                        reason: result.err(),
                    });
                }
                session.send(ServerMessage::BatchFillResult { results });
            }
            ClientMessage::UpgradeHex { q, r, upgrade } => {
                let result = self.attempt_upgrade(&player, Hex::new(q, r), upgrade).await;
                session.send(ServerMessage::UpgradeResult {
                    ok: result.is_ok(),
                    upgrade: result.as_ref().ok().copied(),
                    error: result.err(),
                });
            }
            ClientMessage::BatchUpgradeHex { hexes } => {
                let mut results = Vec::with_capacity(hexes.len());
                for target in hexes {
                    let hex = Hex::new(target.q, target.r);
                    let result = self.attempt_upgrade(&player, hex, target.upgrade).await;
                    results.push(UpgradeOutcome {
                        q: target.q,
                        r: target.r,
                        ok: result.is_ok(),
                        upgrade: result.as_ref().ok().copied(),
                        error: result.err(),
                    });
                }
                session.send(ServerMessage::BatchUpgradeResult { results });
            }
            ClientMessage::RequestHoverCost { q, r } => {
                let cost = self.hover_cost(&player, Hex::new(q, r)).await;
                session.send(ServerMessage::HoverCost { q, r, cost });
            }
            ClientMessage::RequestPointsUpdate => {
                if let Some(update) = self.points_update(&player).await {
                    session.send(update);
                }
            }
            ClientMessage::Ping { timestamp } => {
                session.send(ServerMessage::Pong {
                    timestamp,
                    server_timestamp: now_ms(),
                });
            }
            other => {
                tracing::debug!(game = %self.id, ?other, "frame not applicable to game room");
            }
        }
    }

    /// Start pick. Valid during the start window only; the hex must be
    /// passable, unclaimable terrain free, and unoccupied.
    async fn choose_start(&mut self, session: &Session, player: &PlayerId, hex: Hex) {
        let reject = |session: &Session, reason: FillReject| {
            session.send(ServerMessage::FillResult {
                q: hex.q,
                r: hex.r,
                ok: false,
                reason: Some(reason),
            });
        };

        if Instant::now() > self.window_deadline {
            reject(session, FillReject::WindowClosed);
            return;
        }
        match self.data.get_player_points(&self.id, player).await {
            Ok(points) if points.start_q.is_some() => {
                reject(session, FillReject::AlreadyStarted);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(game = %self.id, error = %err, "start pick read failed");
                reject(session, FillReject::Unavailable);
                return;
            }
        }
        match self.data.get_hex(&self.id, hex).await {
            Ok(Some(tile)) if !tile.terrain.is_claimable() => {
                reject(session, FillReject::Impassable);
                return;
            }
            Ok(Some(tile)) if tile.player_id.is_some() => {
                reject(session, FillReject::Occupied);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(game = %self.id, error = %err, "start pick read failed");
                reject(session, FillReject::Unavailable);
                return;
            }
        }

        let color = self.member_color(player);
        let write = async {
            self.data
                .set_hex(
                    &self.id,
                    hex,
                    Some(player),
                    &color,
                    Upgrade::None,
                    Terrain::None,
                    true,
                    now_ms(),
                )
                .await?;
            self.data.set_player_start(&self.id, player, hex).await
        };
        if let Err(err) = write.await {
            tracing::warn!(game = %self.id, error = %err, "start pick write failed");
            reject(session, FillReject::Unavailable);
            return;
        }

        self.save_event(player, &color, hex, EventType::Start).await;
        self.broadcast(ServerMessage::Update {
            q: hex.q,
            r: hex.r,
            color,
            crown: true,
            upgrade: Upgrade::None,
            terrain: Terrain::None,
        });
        session.send(ServerMessage::FillResult {
            q: hex.q,
            r: hex.r,
            ok: true,
            reason: None,
        });
    }

    /// Deliberate click: owned-tile menu or a capture with the adjacency
    /// rule.
    async fn click_hex(&mut self, session: &Session, player: &PlayerId, hex: Hex) {
        match self.attempt_capture(player, hex, true, true).await {
            Ok(CaptureOutcome::OwnedTile(upgrade)) => {
                session.send(ServerMessage::OpenOwnedTileMenu {
                    q: hex.q,
                    r: hex.r,
                    upgrade,
                });
            }
            Ok(CaptureOutcome::Captured) => {
                session.send(ServerMessage::FillResult {
                    q: hex.q,
                    r: hex.r,
                    ok: true,
                    reason: None,
                });
            }
            Err(reason) => {
                session.send(ServerMessage::FillResult {
                    q: hex.q,
                    r: hex.r,
                    ok: false,
                    reason: Some(reason),
                });
            }
        }
    }

    /// The capture engine shared by the click, drag, and batch paths.
    ///
    /// Ordering: started check, impassable terrain, own tile, cost and
    /// balance, adjacency (click path only), then the mutation with terrain
    /// preserved.
    async fn attempt_capture(
        &mut self,
        player: &PlayerId,
        hex: Hex,
        adjacency: bool,
        owned_menu: bool,
    ) -> Result<CaptureOutcome, FillReject> {
        let hexes = self
            .data
            .get_all_hexes(&self.id)
            .await
            .map_err(|_| FillReject::Unavailable)?;
        let points = self
            .data
            .get_player_points(&self.id, player)
            .await
            .map_err(|_| FillReject::Unavailable)?;

        if points.start_q.is_none() {
            return Err(FillReject::NotStarted);
        }

        let tile = hexes.get(&hex).cloned();
        if let Some(t) = &tile {
            if !t.terrain.is_claimable() {
                return Err(FillReject::Impassable);
            }
            if t.is_owned_by(player) {
                if owned_menu {
                    return Ok(CaptureOutcome::OwnedTile(t.upgrade));
                }
                // An owned tile has no capture cost.
                return Err(FillReject::Insufficient);
            }
        }

        let attacker_tiles = hexes.values().filter(|t| t.is_owned_by(player)).count() as i64;
        let river_adjacent = is_adjacent_to_river(&hexes, hex);
        let river_access = players_with_river_access(&hexes).contains(player);
        let river_discount = river_adjacent && river_access;

        let defender = tile.as_ref().and_then(|t| t.player_id.clone());
        let defender_stats = match &defender {
            Some(d) => {
                let d_points = self
                    .data
                    .get_player_points(&self.id, d)
                    .await
                    .map_err(|_| FillReject::Unavailable)?;
                let d_tiles = hexes.values().filter(|t| t.is_owned_by(d)).count() as i64;
                let target_fort = tile.as_ref().is_some_and(|t| t.upgrade == Upgrade::Fort);
                let neighbor_fort = hex.neighbors().any(|n| {
                    hexes
                        .get(&n)
                        .is_some_and(|t| t.upgrade == Upgrade::Fort && t.is_owned_by(d))
                });
                Some(DefenderStats {
                    tiles: d_tiles,
                    points: d_points.points,
                    fortified: target_fort || neighbor_fort,
                })
            }
            None => None,
        };

        let cost = capture_cost(&self.cfg.game, attacker_tiles, river_discount, defender_stats);
        if points.points < cost {
            return Err(FillReject::Insufficient);
        }

        if adjacency {
            let adjacent = hex
                .neighbors()
                .any(|n| hexes.get(&n).is_some_and(|t| t.is_owned_by(player)));
            let exempt = attacker_tiles == 0 || (river_adjacent && river_access);
            if !adjacent && !exempt {
                return Err(FillReject::NotAdjacent);
            }
        }

        let color = self.member_color(player);
        self.data
            .update_player_points(&self.id, player, points.points - cost)
            .await
            .map_err(|_| FillReject::Unavailable)?;
        let written = self
            .data
            .set_hex_owner(&self.id, hex, player, &color)
            .await
            .map_err(|_| FillReject::Unavailable)?;

        self.save_event(player, &color, hex, EventType::Capture).await;
        self.broadcast(ServerMessage::Update {
            q: hex.q,
            r: hex.r,
            color,
            crown: false,
            upgrade: Upgrade::None,
            terrain: written.terrain,
        });
        self.broadcast_points(player).await;
        if let Some(previous) = &defender {
            self.broadcast_points(previous).await;
        }

        Ok(CaptureOutcome::Captured)
    }

    async fn attempt_upgrade(
        &mut self,
        player: &PlayerId,
        hex: Hex,
        upgrade: Upgrade,
    ) -> Result<Upgrade, FillReject> {
        let Some(cost) = self.cfg.game.upgrade_cost(upgrade) else {
            return Err(FillReject::InvalidUpgrade);
        };
        let tile = self
            .data
            .get_hex(&self.id, hex)
            .await
            .map_err(|_| FillReject::Unavailable)?;
        if !tile.as_ref().is_some_and(|t| t.is_owned_by(player)) {
            return Err(FillReject::NotOwner);
        }
        let points = self
            .data
            .get_player_points(&self.id, player)
            .await
            .map_err(|_| FillReject::Unavailable)?;
        if points.points < cost {
            return Err(FillReject::Insufficient);
        }

        self.data
            .update_player_points(&self.id, player, points.points - cost)
            .await
            .map_err(|_| FillReject::Unavailable)?;
        let written = self
            .data
            .set_hex_upgrade(&self.id, hex, upgrade)
            .await
            .map_err(|_| FillReject::Unavailable)?;

        let color = written.color.clone();
        self.save_event(player, &color, hex, EventType::Upgrade).await;
        self.broadcast(ServerMessage::Update {
            q: hex.q,
            r: hex.r,
            color,
            crown: written.is_start,
            upgrade,
            terrain: written.terrain,
        });
        // A bank raises the cap immediately.
        self.broadcast_points(player).await;

        Ok(upgrade)
    }

    /// The exact number a capture of `hex` would be charged; `None` when no
    /// capture applies (own tile, impassable or unclaimable terrain).
    async fn hover_cost(&self, player: &PlayerId, hex: Hex) -> Option<i64> {
        let hexes = self.data.get_all_hexes(&self.id).await.ok()?;
        let tile = hexes.get(&hex);
        if let Some(t) = tile {
            if !t.terrain.is_claimable() || t.is_owned_by(player) {
                return None;
            }
        }

        let attacker_tiles = hexes.values().filter(|t| t.is_owned_by(player)).count() as i64;
        let river_discount = is_adjacent_to_river(&hexes, hex)
            && players_with_river_access(&hexes).contains(player);
        let defender_stats = match tile.and_then(|t| t.player_id.as_ref()) {
            Some(d) => {
                let d_points = self.data.get_player_points(&self.id, d).await.ok()?;
                let d_tiles = hexes.values().filter(|t| t.is_owned_by(d)).count() as i64;
                let target_fort = tile.is_some_and(|t| t.upgrade == Upgrade::Fort);
                let neighbor_fort = hex.neighbors().any(|n| {
                    hexes
                        .get(&n)
                        .is_some_and(|t| t.upgrade == Upgrade::Fort && t.is_owned_by(d))
                });
                Some(DefenderStats {
                    tiles: d_tiles,
                    points: d_points.points,
                    fortified: target_fort || neighbor_fort,
                })
            }
            None => None,
        };

        Some(capture_cost(
            &self.cfg.game,
            attacker_tiles,
            river_discount,
            defender_stats,
        ))
    }

    async fn points_update(&self, player: &PlayerId) -> Option<ServerMessage> {
        let points = self.data.get_player_points(&self.id, player).await.ok()?;
        let tiles = self.data.count_player_tiles(&self.id, player).await.ok()?;
        Some(ServerMessage::PointsUpdate {
            player_id: player.clone(),
            points: points.points,
            tiles,
            max_points: points.max_points,
        })
    }

    async fn broadcast_points(&mut self, player: &PlayerId) {
        if let Some(update) = self.points_update(player).await {
            self.broadcast(update);
        }
    }

    /// Economy tick: income up to the cap for every connected player. No
    /// broadcast; clients poll.
    async fn economy_tick(&mut self) {
        let live = self.first_join.is_some_and(|at| {
            Instant::now()
                >= at + Duration::from_millis(self.cfg.game.start_delay_ms as u64 + 100)
        });
        if !live {
            return;
        }
        if !self.check_kv().await {
            return;
        }

        let connected: Vec<PlayerId> = self
            .members
            .iter()
            .filter(|(_, m)| !m.disconnected)
            .map(|(id, _)| id.clone())
            .collect();
        for player in connected {
            if let Err(err) = self.apply_income(&player).await {
                tracing::warn!(game = %self.id, error = %err, "economy tick aborted");
                self.kv_down = true;
                return;
            }
        }
    }

    async fn apply_income(&self, player: &PlayerId) -> Result<(), crate::data::DataError> {
        let points = self.data.get_player_points(&self.id, player).await?;
        let target = (points.points + self.cfg.game.base_income).min(points.max_points);
        if target != points.points {
            self.data
                .update_player_points(&self.id, player, target)
                .await?;
        }
        Ok(())
    }

    /// Auto-expansion: plan against a snapshot, then apply.
    async fn auto_expansion_tick(&mut self) {
        if !self.check_kv().await {
            return;
        }
        let hexes = match self.data.get_all_hexes(&self.id).await {
            Ok(hexes) => hexes,
            Err(err) => {
                tracing::warn!(game = %self.id, error = %err, "auto-expansion scan failed");
                self.kv_down = true;
                return;
            }
        };

        let plan = hexhold_core::plan_auto_captures(&self.cfg.game, &hexes);
        for capture in plan {
            let written = match self
                .data
                .set_hex_owner(&self.id, capture.hex, &capture.new_owner, &capture.color)
                .await
            {
                Ok(tile) => tile,
                Err(err) => {
                    tracing::warn!(game = %self.id, error = %err, "auto-capture write failed");
                    self.kv_down = true;
                    return;
                }
            };
            self.save_event(
                &capture.new_owner,
                &capture.color,
                capture.hex,
                EventType::AutoCapture,
            )
            .await;
            self.broadcast(ServerMessage::Update {
                q: capture.hex.q,
                r: capture.hex.r,
                color: capture.color.clone(),
                crown: false,
                upgrade: Upgrade::None,
                terrain: written.terrain,
            });
            self.broadcast_points(&capture.new_owner).await;
            if let Some(previous) = &capture.previous_owner {
                self.broadcast_points(previous).await;
            }
        }
    }

    /// Probe KV liveness for background loops; a down backend suspends them
    /// until it answers again.
    async fn check_kv(&mut self) -> bool {
        if self.data.kv().is_available().await {
            if self.kv_down {
                tracing::info!(game = %self.id, "kv reachable again, resuming loops");
                self.kv_down = false;
            }
            true
        } else {
            if !self.kv_down {
                tracing::warn!(game = %self.id, "kv unavailable, suspending loops");
                self.kv_down = true;
            }
            false
        }
    }

    async fn dispose(&mut self) {
        tracing::info!(game = %self.id, "drain expired, disposing room");
        if let Err(err) = self.data.close_game(&self.id).await {
            tracing::warn!(game = %self.id, error = %err, "failed to close game record");
        }
        for entry in self.sessions.values() {
            entry.session.close(CLOSE_INVALID, "room closed");
        }
        self.sessions.clear();
        self.handle.set_occupancy(0);
    }

    async fn save_event(&self, player: &PlayerId, color: &str, hex: Hex, kind: EventType) {
        let event = GameEvent {
            game_id: self.id.clone(),
            player_id: player.clone(),
            color: color.to_string(),
            q: hex.q,
            r: hex.r,
            event_type: kind,
            timestamp: now_ms(),
        };
        if let Err(err) = self.data.save_game_event(&event).await {
            tracing::warn!(game = %self.id, error = %err, "failed to append event");
        }
    }

    fn member_color(&self, player: &PlayerId) -> String {
        self.members
            .get(player)
            .map(|m| m.color.clone())
            .unwrap_or_default()
    }

    fn broadcast(&self, msg: ServerMessage) {
        for entry in self.sessions.values() {
            entry.session.send(msg.clone());
        }
    }
}
