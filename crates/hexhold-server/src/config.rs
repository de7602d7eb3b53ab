//! Server configuration (ports, paths, secrets, game rules).

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hexhold_core::{GameConfig, TerrainConfig};

/// Process-wide configuration. Game rule constants ride along so every room
/// spawned by this process shares them.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the HTTP/WS listener.
    pub bind_address: SocketAddr,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    /// HMAC secret for player tokens. Rotating it invalidates every
    /// outstanding token.
    pub secret: String,
    /// KV connection pool size.
    pub pool_size: usize,
    /// Per-command KV timeout.
    pub command_timeout: Duration,
    /// KV connect timeout.
    pub connect_timeout: Duration,
    /// TTL of the per-player session key.
    pub session_ttl: Duration,
    /// Players admitted to one lobby before the matchmaker opens another.
    pub lobby_capacity: usize,
    /// How long a fresh connection may take to send its join frame.
    pub join_timeout: Duration,
    /// Inbound frames allowed per session per second.
    pub rate_limit_messages: u32,
    pub game: GameConfig,
    pub terrain: TerrainConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            static_dir: PathBuf::from("./static"),
            secret: "hexhold-dev-secret".to_string(),
            pool_size: 10,
            command_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(3600),
            lobby_capacity: 16,
            join_timeout: Duration::from_secs(10),
            rate_limit_messages: 60,
            game: GameConfig::default(),
            terrain: TerrainConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build the config from the environment.
    ///
    /// `PORT` selects the listen port (container platforms), `STATIC_DIR`
    /// overrides the asset directory, `HEXHOLD_SECRET` sets the token secret.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(port) = env::var("PORT").ok().and_then(|v| v.parse::<u16>().ok()) {
            cfg.bind_address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        }

        cfg.static_dir = static_dir();

        match env::var("HEXHOLD_SECRET") {
            Ok(secret) if !secret.is_empty() => cfg.secret = secret,
            _ => tracing::warn!("HEXHOLD_SECRET not set, using development secret"),
        }

        cfg
    }
}

/// Resolve the static directory path used by the server.
/// Order:
/// 1) STATIC_DIR env var
/// 2) ./static (container runtime layout)
/// 3) ../client/static (local dev from the server dir)
fn static_dir() -> PathBuf {
    if let Ok(p) = env::var("STATIC_DIR") {
        return PathBuf::from(p);
    }
    let p = Path::new("./static");
    if p.exists() {
        return p.to_path_buf();
    }
    PathBuf::from("../client/static")
}
