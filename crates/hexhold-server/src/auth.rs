//! Player identity: registration and stateless HMAC tokens.
//!
//! A token is `hex(HMAC-SHA256(secret, playerId))`; nothing is stored, so
//! rotating the secret invalidates every outstanding token.

use hmac::{Hmac, Mac};
use rand::Rng;
use serde::Serialize;
use sha2::Sha256;
use ulid::Ulid;

use hexhold_core::PLAYER_COLORS;
use hexhold_protocol::{PlayerId, PlayerProfile};

use crate::data::{now_ms, DataError, GameData};

type HmacSha256 = Hmac<Sha256>;

/// Registration response, also the shape of `POST /api/register`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPlayer {
    pub player_id: PlayerId,
    pub token: String,
    pub username: String,
    pub color: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("username must be 2-24 characters")]
    BadUsername,
    #[error(transparent)]
    Unavailable(#[from] DataError),
}

/// Token issuer and verifier. The secret is process-wide configuration.
pub struct Auth {
    secret: Vec<u8>,
}

impl Auth {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The token bound to a player id.
    pub fn token_for(&self, player_id: &PlayerId) -> String {
        let mut mac = self.mac();
        mac.update(player_id.as_str().as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    /// Constant-time token verification (`Mac::verify_slice`).
    pub fn verify(&self, player_id: &PlayerId, token: &str) -> bool {
        let Some(raw) = hex_decode(token) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(player_id.as_str().as_bytes());
        mac.verify_slice(&raw).is_ok()
    }

    /// Register a username. An existing name (case-insensitive) returns its
    /// stored record with a freshly computed token; a new name creates a
    /// player with a random palette color.
    pub async fn register(
        &self,
        data: &GameData,
        username: &str,
    ) -> Result<RegisteredPlayer, AuthError> {
        let name = username.trim();
        let len = name.chars().count();
        if !(2..=24).contains(&len) {
            return Err(AuthError::BadUsername);
        }

        if let Some(id) = data.find_player_by_username(name).await? {
            if let Some(profile) = data.get_player(&id).await? {
                data.touch_player(&id, now_ms()).await?;
                return Ok(RegisteredPlayer {
                    token: self.token_for(&id),
                    player_id: id,
                    username: profile.username,
                    color: profile.color,
                });
            }
        }

        let id = PlayerId(Ulid::new().to_string());
        let color = PLAYER_COLORS[rand::thread_rng().gen_range(0..PLAYER_COLORS.len())];
        let now = now_ms();
        let profile = PlayerProfile {
            id: id.clone(),
            username: name.to_string(),
            color: color.to_string(),
            created_at: now,
            last_seen: now,
        };
        data.create_player(&profile).await?;

        Ok(RegisteredPlayer {
            token: self.token_for(&id),
            player_id: id,
            username: profile.username,
            color: profile.color,
        })
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length.
        HmacSha256::new_from_slice(&self.secret).expect("hmac key")
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if !s.is_ascii() || s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
