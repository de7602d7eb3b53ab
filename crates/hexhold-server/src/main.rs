//! hexhold server binary.

use std::sync::Arc;

use hexhold_server::http::{self, AppState};
use hexhold_server::{Auth, GameData, Kv, KvPool, MemoryKv, RoomRegistry, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hexhold_server::telemetry::init();

    let cfg = ServerConfig::from_env();

    let store = MemoryKv::new();
    let pool = KvPool::new(store.connections(cfg.pool_size));
    let kv = Kv::new(pool, cfg.command_timeout);
    let data = GameData::new(kv, cfg.game.clone());
    let auth = Arc::new(Auth::new(cfg.secret.as_bytes().to_vec()));
    let registry = RoomRegistry::new(data.clone(), Arc::clone(&auth), cfg.clone());

    let state = AppState {
        data,
        auth,
        registry,
    };
    let app = http::router(state, cfg.static_dir.clone());

    let listener = tokio::net::TcpListener::bind(cfg.bind_address).await?;
    tracing::info!(addr = %cfg.bind_address, "hexhold server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
