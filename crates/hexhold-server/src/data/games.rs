//! Lobby and game records and their membership sets.

use hexhold_protocol::{
    GameRecord, LobbyRecord, PlayerId, RoomId, RoomStatus, StartPlayer,
};

use super::{keys, now_ms, parse_json, DataError, GameData};

impl GameData {
    pub async fn create_lobby(&self, id: &RoomId) -> Result<LobbyRecord, DataError> {
        let record = LobbyRecord {
            id: id.clone(),
            created_at: now_ms(),
            status: RoomStatus::Active,
            lobby_start_time: None,
        };
        let entries = vec![
            ("createdAt".to_string(), record.created_at.to_string()),
            ("status".to_string(), "active".to_string()),
        ];
        self.kv()
            .hash_set_many(&keys::lobby_data(id), &entries)
            .await?;
        self.kv()
            .zset_add(keys::LOBBIES_ACTIVE, id.as_str(), record.created_at as f64)
            .await?;
        Ok(record)
    }

    pub async fn get_lobby(&self, id: &RoomId) -> Result<Option<LobbyRecord>, DataError> {
        let fields = self.kv().hash_get_all(&keys::lobby_data(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let status = match fields.get("status").map(String::as_str) {
            Some("closed") => RoomStatus::Closed,
            _ => RoomStatus::Active,
        };
        Ok(Some(LobbyRecord {
            id: id.clone(),
            created_at: fields
                .get("createdAt")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            status,
            lobby_start_time: fields.get("lobbyStartTime").and_then(|v| v.parse().ok()),
        }))
    }

    /// Stamp the moment a lobby handed its players to a game.
    pub async fn set_lobby_start_time(&self, id: &RoomId, at: i64) -> Result<(), DataError> {
        self.kv()
            .hash_set(&keys::lobby_data(id), "lobbyStartTime", &at.to_string())
            .await?;
        Ok(())
    }

    pub async fn active_lobbies(&self) -> Result<Vec<RoomId>, DataError> {
        Ok(self
            .kv()
            .zset_range(keys::LOBBIES_ACTIVE, 0, -1)
            .await?
            .into_iter()
            .map(RoomId)
            .collect())
    }

    pub async fn close_lobby(&self, id: &RoomId) -> Result<(), DataError> {
        self.kv()
            .hash_set(&keys::lobby_data(id), "status", "closed")
            .await?;
        self.kv().zset_rem(keys::LOBBIES_ACTIVE, id.as_str()).await?;
        Ok(())
    }

    pub async fn lobby_add_player(&self, id: &RoomId, player: &PlayerId) -> Result<(), DataError> {
        self.kv()
            .set_add(&keys::lobby_players(id), player.as_str())
            .await?;
        Ok(())
    }

    pub async fn lobby_remove_player(
        &self,
        id: &RoomId,
        player: &PlayerId,
    ) -> Result<(), DataError> {
        self.kv()
            .set_rem(&keys::lobby_players(id), player.as_str())
            .await?;
        Ok(())
    }

    pub async fn lobby_players(&self, id: &RoomId) -> Result<Vec<PlayerId>, DataError> {
        Ok(self
            .kv()
            .set_members(&keys::lobby_players(id))
            .await?
            .into_iter()
            .map(PlayerId)
            .collect())
    }

    pub async fn create_game(
        &self,
        id: &RoomId,
        start_players: Vec<StartPlayer>,
        lobby_start_time: i64,
    ) -> Result<GameRecord, DataError> {
        let record = GameRecord {
            id: id.clone(),
            created_at: now_ms(),
            status: RoomStatus::Active,
            start_players,
            lobby_start_time,
        };
        let snapshot = serde_json::to_string(&record.start_players).map_err(|source| {
            DataError::Corrupt {
                key: keys::game_data(id),
                source,
            }
        })?;
        let entries = vec![
            ("createdAt".to_string(), record.created_at.to_string()),
            ("status".to_string(), "active".to_string()),
            ("startPlayers".to_string(), snapshot),
            (
                "lobbyStartTime".to_string(),
                record.lobby_start_time.to_string(),
            ),
        ];
        self.kv()
            .hash_set_many(&keys::game_data(id), &entries)
            .await?;
        self.kv()
            .zset_add(keys::GAMES_ACTIVE, id.as_str(), record.created_at as f64)
            .await?;
        for player in &record.start_players {
            self.kv()
                .set_add(&keys::game_players(id), player.id.as_str())
                .await?;
        }
        Ok(record)
    }

    pub async fn get_game(&self, id: &RoomId) -> Result<Option<GameRecord>, DataError> {
        let key = keys::game_data(id);
        let fields = self.kv().hash_get_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let start_players = match fields.get("startPlayers") {
            Some(raw) => parse_json(&key, raw)?,
            None => Vec::new(),
        };
        let status = match fields.get("status").map(String::as_str) {
            Some("closed") => RoomStatus::Closed,
            _ => RoomStatus::Active,
        };
        Ok(Some(GameRecord {
            id: id.clone(),
            created_at: fields
                .get("createdAt")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            status,
            start_players,
            lobby_start_time: fields
                .get("lobbyStartTime")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }))
    }

    /// Refresh a game's last-active score.
    pub async fn touch_game(&self, id: &RoomId, at: i64) -> Result<(), DataError> {
        self.kv()
            .zset_add(keys::GAMES_ACTIVE, id.as_str(), at as f64)
            .await?;
        Ok(())
    }

    pub async fn active_games(&self) -> Result<Vec<RoomId>, DataError> {
        Ok(self
            .kv()
            .zset_range(keys::GAMES_ACTIVE, 0, -1)
            .await?
            .into_iter()
            .map(RoomId)
            .collect())
    }

    pub async fn close_game(&self, id: &RoomId) -> Result<(), DataError> {
        self.kv()
            .hash_set(&keys::game_data(id), "status", "closed")
            .await?;
        self.kv().zset_rem(keys::GAMES_ACTIVE, id.as_str()).await?;
        Ok(())
    }

    pub async fn game_players(&self, id: &RoomId) -> Result<Vec<PlayerId>, DataError> {
        Ok(self
            .kv()
            .set_members(&keys::game_players(id))
            .await?
            .into_iter()
            .map(PlayerId)
            .collect())
    }
}
