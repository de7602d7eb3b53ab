//! Hex, points, event, and terrain operations for one game.

use std::collections::HashMap;

use hexhold_protocol::{GameEvent, Hex, HexTile, PlayerId, PlayerPoints, RoomId, Terrain, Upgrade};

use hexhold_core::{BANK_CAP_BONUS, TILE_CAP_BONUS};

use super::{keys, now_ms, parse_json, DataError, GameData};

/// The event log keeps this many entries; older ones are trimmed away.
pub const EVENT_LOG_CAP: i64 = 10_000;

/// Per-player upgrade tallies with normalized lowercase keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpgradeCounts {
    pub banks: i64,
    pub forts: i64,
    pub cities: i64,
}

impl GameData {
    pub async fn get_hex(&self, game: &RoomId, hex: Hex) -> Result<Option<HexTile>, DataError> {
        let key = keys::game_hexes(game);
        match self.kv().hash_get(&key, &hex.key()).await? {
            Some(raw) => Ok(Some(parse_json(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// Upsert one cell. Fields not passed are written as their empty values;
    /// callers that must preserve the standing upgrade go through
    /// [`GameData::set_hex_upgrade`] or read-modify-write themselves.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_hex(
        &self,
        game: &RoomId,
        hex: Hex,
        player_id: Option<&PlayerId>,
        color: &str,
        upgrade: Upgrade,
        terrain: Terrain,
        is_start: bool,
        capture_time: i64,
    ) -> Result<HexTile, DataError> {
        let tile = HexTile {
            player_id: player_id.cloned(),
            color: color.to_string(),
            upgrade,
            terrain,
            capture_time,
            is_start,
        };
        self.write_hex(game, hex, &tile).await?;
        Ok(tile)
    }

    /// Transfer ownership of a cell, preserving its terrain. The standing
    /// upgrade and crown do not survive a transfer.
    pub async fn set_hex_owner(
        &self,
        game: &RoomId,
        hex: Hex,
        player_id: &PlayerId,
        color: &str,
    ) -> Result<HexTile, DataError> {
        let terrain = self
            .get_hex(game, hex)
            .await?
            .map(|t| t.terrain)
            .unwrap_or_default();
        let tile = HexTile {
            player_id: Some(player_id.clone()),
            color: color.to_string(),
            upgrade: Upgrade::None,
            terrain,
            capture_time: now_ms(),
            is_start: false,
        };
        self.write_hex(game, hex, &tile).await?;
        Ok(tile)
    }

    /// Read-modify-write of a single cell's upgrade; owner, color, terrain,
    /// and crown are untouched.
    pub async fn set_hex_upgrade(
        &self,
        game: &RoomId,
        hex: Hex,
        upgrade: Upgrade,
    ) -> Result<HexTile, DataError> {
        let mut tile = self
            .get_hex(game, hex)
            .await?
            .ok_or(DataError::NotFound("hex"))?;
        tile.upgrade = upgrade;
        self.write_hex(game, hex, &tile).await?;
        Ok(tile)
    }

    async fn write_hex(&self, game: &RoomId, hex: Hex, tile: &HexTile) -> Result<(), DataError> {
        let key = keys::game_hexes(game);
        let raw = serde_json::to_string(tile).map_err(|source| DataError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.kv().hash_set(&key, &hex.key(), &raw).await?;
        Ok(())
    }

    pub async fn get_all_hexes(&self, game: &RoomId) -> Result<HashMap<Hex, HexTile>, DataError> {
        let key = keys::game_hexes(game);
        let raw = self.kv().hash_get_all(&key).await?;
        let mut out = HashMap::with_capacity(raw.len());
        for (field, value) in raw {
            let Some(hex) = Hex::from_key(&field) else {
                tracing::warn!(key, field, "skipping malformed hex field");
                continue;
            };
            out.insert(hex, parse_json::<HexTile>(&key, &value)?);
        }
        Ok(out)
    }

    /// Write the generated terrain layer as unowned cells.
    pub async fn store_terrain(
        &self,
        game: &RoomId,
        cells: &HashMap<Hex, Terrain>,
    ) -> Result<(), DataError> {
        let key = keys::game_hexes(game);
        let mut entries = Vec::with_capacity(cells.len());
        for (hex, terrain) in cells {
            let tile = HexTile {
                terrain: *terrain,
                ..Default::default()
            };
            let raw = serde_json::to_string(&tile).map_err(|source| DataError::Corrupt {
                key: key.clone(),
                source,
            })?;
            entries.push((hex.key(), raw));
        }
        self.kv().hash_set_many(&key, &entries).await?;
        Ok(())
    }

    pub async fn count_player_tiles(
        &self,
        game: &RoomId,
        player: &PlayerId,
    ) -> Result<i64, DataError> {
        let hexes = self.get_all_hexes(game).await?;
        Ok(hexes.values().filter(|t| t.is_owned_by(player)).count() as i64)
    }

    pub async fn get_player_upgrade_counts(
        &self,
        game: &RoomId,
        player: &PlayerId,
    ) -> Result<UpgradeCounts, DataError> {
        let hexes = self.get_all_hexes(game).await?;
        let mut counts = UpgradeCounts::default();
        for tile in hexes.values().filter(|t| t.is_owned_by(player)) {
            match tile.upgrade {
                Upgrade::Bank => counts.banks += 1,
                Upgrade::Fort => counts.forts += 1,
                Upgrade::City => counts.cities += 1,
                Upgrade::None => {}
            }
        }
        Ok(counts)
    }

    /// The single source of truth for a player's point cap:
    /// `startingMaxPoints + 50 * banks + 5 * tiles`.
    pub async fn calculate_max_points(
        &self,
        game: &RoomId,
        player: &PlayerId,
    ) -> Result<i64, DataError> {
        let hexes = self.get_all_hexes(game).await?;
        let mut banks = 0i64;
        let mut tiles = 0i64;
        for tile in hexes.values().filter(|t| t.is_owned_by(player)) {
            tiles += 1;
            if tile.upgrade == Upgrade::Bank {
                banks += 1;
            }
        }
        Ok(self.cfg().starting_max_points + BANK_CAP_BONUS * banks + TILE_CAP_BONUS * tiles)
    }

    /// Read a player's points record. A miss initializes to the starting
    /// values; a hit is overlaid with a freshly computed cap so the returned
    /// `maxPoints` is never stale, clamping points when the cap has dropped.
    pub async fn get_player_points(
        &self,
        game: &RoomId,
        player: &PlayerId,
    ) -> Result<PlayerPoints, DataError> {
        let key = keys::game_points(game);
        let stored = match self.kv().hash_get(&key, player.as_str()).await? {
            Some(raw) => Some(parse_json::<PlayerPoints>(&key, &raw)?),
            None => None,
        };
        let max_points = self.calculate_max_points(game, player).await?;
        Ok(match stored {
            Some(mut points) => {
                points.max_points = max_points;
                points.points = points.points.clamp(0, max_points);
                points
            }
            None => PlayerPoints {
                points: self.cfg().starting_points,
                max_points,
                start_q: None,
                start_r: None,
                last_update: now_ms(),
            },
        })
    }

    /// Write a player's points, clamped to `[0, calculate_max_points]`.
    /// `startQ`/`startR` are preserved.
    pub async fn update_player_points(
        &self,
        game: &RoomId,
        player: &PlayerId,
        new_points: i64,
    ) -> Result<PlayerPoints, DataError> {
        let mut record = self.get_player_points(game, player).await?;
        record.points = new_points.clamp(0, record.max_points);
        record.last_update = now_ms();
        self.write_points(game, player, &record).await?;
        Ok(record)
    }

    /// Record the start pick coordinates on the points record.
    pub async fn set_player_start(
        &self,
        game: &RoomId,
        player: &PlayerId,
        hex: Hex,
    ) -> Result<PlayerPoints, DataError> {
        let mut record = self.get_player_points(game, player).await?;
        record.start_q = Some(hex.q);
        record.start_r = Some(hex.r);
        record.last_update = now_ms();
        self.write_points(game, player, &record).await?;
        Ok(record)
    }

    async fn write_points(
        &self,
        game: &RoomId,
        player: &PlayerId,
        record: &PlayerPoints,
    ) -> Result<(), DataError> {
        let key = keys::game_points(game);
        let raw = serde_json::to_string(record).map_err(|source| DataError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.kv().hash_set(&key, player.as_str(), &raw).await?;
        Ok(())
    }

    /// Append to the game's event log, trimming to the newest
    /// [`EVENT_LOG_CAP`] entries.
    pub async fn save_game_event(&self, event: &GameEvent) -> Result<(), DataError> {
        let key = keys::game_events(&event.game_id);
        let raw = serde_json::to_string(event).map_err(|source| DataError::Corrupt {
            key: key.clone(),
            source,
        })?;
        self.kv().list_lpush(&key, &raw).await?;
        self.kv().list_ltrim(&key, 0, EVENT_LOG_CAP - 1).await?;
        Ok(())
    }

    /// The stored event log in insertion order.
    pub async fn get_game_events(&self, game: &RoomId) -> Result<Vec<GameEvent>, DataError> {
        let key = keys::game_events(game);
        let raw = self.kv().list_lrange(&key, 0, -1).await?;
        let mut events = Vec::with_capacity(raw.len());
        // LPUSH stores newest first; reading back reversed restores
        // insertion order.
        for entry in raw.iter().rev() {
            events.push(parse_json::<GameEvent>(&key, entry)?);
        }
        Ok(events)
    }

    /// A cell is passable unless it holds a mountain; absent cells are open
    /// ground.
    pub async fn is_hex_passable(&self, game: &RoomId, hex: Hex) -> Result<bool, DataError> {
        Ok(self
            .get_hex(game, hex)
            .await?
            .map(|t| t.terrain.is_passable())
            .unwrap_or(true))
    }

    pub async fn is_adjacent_to_river(&self, game: &RoomId, hex: Hex) -> Result<bool, DataError> {
        for neighbor in hex.neighbors() {
            if let Some(tile) = self.get_hex(game, neighbor).await? {
                if tile.terrain == Terrain::River {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// True when the player owns at least one hex adjacent to a river cell.
    pub async fn player_has_river_access(
        &self,
        game: &RoomId,
        player: &PlayerId,
    ) -> Result<bool, DataError> {
        let hexes = self.get_all_hexes(game).await?;
        Ok(hexes
            .iter()
            .filter(|(_, tile)| tile.is_owned_by(player))
            .any(|(hex, _)| hexhold_core::is_adjacent_to_river(&hexes, *hex)))
    }
}
