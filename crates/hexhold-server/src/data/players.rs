//! Player records and sessions.

use std::time::Duration;

use hexhold_protocol::{PlayerId, PlayerProfile};

use super::{keys, DataError, GameData};

impl GameData {
    pub async fn create_player(&self, profile: &PlayerProfile) -> Result<(), DataError> {
        let entries = vec![
            ("username".to_string(), profile.username.clone()),
            ("color".to_string(), profile.color.clone()),
            ("createdAt".to_string(), profile.created_at.to_string()),
            ("lastSeen".to_string(), profile.last_seen.to_string()),
        ];
        self.kv()
            .hash_set_many(&keys::player_data(&profile.id), &entries)
            .await?;
        self.kv()
            .hash_set(
                keys::PLAYERS_BY_USERNAME,
                &profile.username.to_lowercase(),
                profile.id.as_str(),
            )
            .await?;
        self.kv()
            .zset_add(
                keys::PLAYERS_ACTIVE,
                profile.id.as_str(),
                profile.last_seen as f64,
            )
            .await?;
        Ok(())
    }

    pub async fn get_player(&self, id: &PlayerId) -> Result<Option<PlayerProfile>, DataError> {
        let fields = self.kv().hash_get_all(&keys::player_data(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
        Ok(Some(PlayerProfile {
            id: id.clone(),
            username: get("username"),
            color: get("color"),
            created_at: get("createdAt").parse().unwrap_or_default(),
            last_seen: get("lastSeen").parse().unwrap_or_default(),
        }))
    }

    /// Case-insensitive username lookup.
    pub async fn find_player_by_username(
        &self,
        username: &str,
    ) -> Result<Option<PlayerId>, DataError> {
        Ok(self
            .kv()
            .hash_get(keys::PLAYERS_BY_USERNAME, &username.to_lowercase())
            .await?
            .map(PlayerId))
    }

    /// Update a player's color; the record must exist.
    pub async fn set_player_color(&self, id: &PlayerId, color: &str) -> Result<(), DataError> {
        let key = keys::player_data(id);
        if !self.kv().exists(&key).await? {
            return Err(DataError::NotFound("player"));
        }
        self.kv().hash_set(&key, "color", color).await?;
        Ok(())
    }

    /// Refresh `lastSeen` and the active-players score.
    pub async fn touch_player(&self, id: &PlayerId, at: i64) -> Result<(), DataError> {
        self.kv()
            .hash_set(&keys::player_data(id), "lastSeen", &at.to_string())
            .await?;
        self.kv()
            .zset_add(keys::PLAYERS_ACTIVE, id.as_str(), at as f64)
            .await?;
        Ok(())
    }

    /// Record the player's current session id; the TTL bounds stale
    /// sessions after a silent disconnect.
    pub async fn set_session(
        &self,
        id: &PlayerId,
        session_id: &str,
        ttl: Duration,
    ) -> Result<(), DataError> {
        self.kv()
            .string_set(&keys::player_session(id), session_id, Some(ttl))
            .await?;
        Ok(())
    }

    pub async fn get_session(&self, id: &PlayerId) -> Result<Option<String>, DataError> {
        Ok(self.kv().string_get(&keys::player_session(id)).await?)
    }
}
