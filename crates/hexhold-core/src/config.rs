//! Game rule constants.

use serde::{Deserialize, Serialize};

use hexhold_protocol::Upgrade;

/// Per-bank bonus applied to a player's point cap.
pub const BANK_CAP_BONUS: i64 = 50;
/// Per-owned-tile bonus applied to a player's point cap.
pub const TILE_CAP_BONUS: i64 = 5;

/// Starting colors handed out at registration.
pub const PLAYER_COLORS: [&str; 8] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f1c40f", "#9b59b6", "#e67e22", "#1abc9c", "#34495e",
];

/// Tunable rule constants for one game room.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Start-pick window after `lobbyStartTime`, in milliseconds.
    pub start_delay_ms: i64,
    /// Economy tick period.
    pub tick_interval_ms: u64,
    /// Auto-expansion scan period.
    pub auto_expand_interval_ms: u64,
    /// Minimum strict-majority neighbor count for an auto-capture.
    pub auto_capture_threshold: usize,
    /// Base cost term.
    pub hex_value: i64,
    /// Logarithmic growth of expansion cost with owned tiles.
    pub exp_growth: i64,
    /// Floor added when attacking any foreign tile.
    pub occupied_base: i64,
    /// Scales sqrt(strength) into attack cost.
    pub attack_mult: f64,
    /// Points per economy tick per connected player.
    pub base_income: i64,
    pub starting_points: i64,
    pub starting_max_points: i64,
    pub upgrade_bank_cost: i64,
    pub upgrade_fort_cost: i64,
    pub upgrade_city_cost: i64,
    /// Ready sessions required before the lobby countdown starts.
    pub min_ready: usize,
    /// Post-empty reconnection grace before a room is disposed.
    pub cleanup_delay_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 5000,
            tick_interval_ms: 1000,
            auto_expand_interval_ms: 10_000,
            auto_capture_threshold: 3,
            hex_value: 10,
            exp_growth: 5,
            occupied_base: 5,
            attack_mult: 2.5,
            base_income: 2,
            starting_points: 200,
            starting_max_points: 200,
            upgrade_bank_cost: 100,
            upgrade_fort_cost: 300,
            upgrade_city_cost: 200,
            min_ready: 2,
            cleanup_delay_ms: 60_000,
        }
    }
}

impl GameConfig {
    /// Cost of buying `upgrade`; `None` for the empty upgrade.
    pub fn upgrade_cost(&self, upgrade: Upgrade) -> Option<i64> {
        match upgrade {
            Upgrade::None => None,
            Upgrade::Bank => Some(self.upgrade_bank_cost),
            Upgrade::Fort => Some(self.upgrade_fort_cost),
            Upgrade::City => Some(self.upgrade_city_cost),
        }
    }
}

/// Terrain generation constants. Generation is a pure function of these plus
/// a seed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainConfig {
    pub mountain_chains_min: u32,
    pub mountain_chains_max: u32,
    pub mountain_chain_length_min: u32,
    pub mountain_chain_length_max: u32,
    /// Probability of writing a side branch at each chain step.
    pub mountain_density: f32,
    /// Probability of deviating to a non-reverse direction at each step.
    pub mountain_zigzag_chance: f32,
    /// Minimum pairwise distance between chain seeds.
    pub mountain_chain_spacing: i32,
    /// Side of the square in which seeds are scattered.
    pub mountain_area_size: i32,
    pub river_count_min: u32,
    pub river_count_max: u32,
    pub river_length_min: u32,
    pub river_length_max: u32,
    /// Chance of spawning one fork after the first third of the main branch.
    pub river_fork_chance: f32,
    pub river_fork_length: u32,
    /// Minimum pairwise distance between river seeds.
    pub river_spacing: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            mountain_chains_min: 3,
            mountain_chains_max: 10,
            mountain_chain_length_min: 8,
            mountain_chain_length_max: 10,
            mountain_density: 0.15,
            mountain_zigzag_chance: 0.2,
            mountain_chain_spacing: 12,
            mountain_area_size: 60,
            river_count_min: 2,
            river_count_max: 4,
            river_length_min: 12,
            river_length_max: 18,
            river_fork_chance: 0.3,
            river_fork_length: 6,
            river_spacing: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_costs_match_rules() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.upgrade_cost(Upgrade::Bank), Some(100));
        assert_eq!(cfg.upgrade_cost(Upgrade::City), Some(200));
        assert_eq!(cfg.upgrade_cost(Upgrade::Fort), Some(300));
        assert_eq!(cfg.upgrade_cost(Upgrade::None), None);
    }
}
