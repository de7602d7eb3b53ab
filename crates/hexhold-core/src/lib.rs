//! Deterministic simulation core.
//!
//! Pure logic only: the capture cost model, the auto-expansion scan, and
//! seeded terrain generation. Nothing in this crate performs IO or touches a
//! clock; the server crate feeds it snapshots and applies its plans.

pub mod config;
pub mod cost;
pub mod expansion;
pub mod rng;
pub mod terrain;

pub use config::{GameConfig, TerrainConfig, BANK_CAP_BONUS, PLAYER_COLORS, TILE_CAP_BONUS};
pub use cost::{capture_cost, expansion_cost, DefenderStats};
pub use expansion::{
    is_adjacent_to_river, plan_auto_captures, players_with_river_access, PlannedCapture,
};
pub use rng::GameRng;
pub use terrain::generate_terrain;
