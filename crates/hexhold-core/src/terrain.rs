//! Seeded terrain generation: mountain chains and rivers.
//!
//! The output is data, not code: the same config and seed always produce the
//! same geography, so replaying a game's event log on a fresh instance with
//! the stored seed reproduces the board.

use std::collections::HashMap;

use hexhold_protocol::{Hex, Terrain};

use crate::config::TerrainConfig;
use crate::rng::GameRng;

/// Generate the terrain layer for a new game.
pub fn generate_terrain(cfg: &TerrainConfig, seed: u64) -> HashMap<Hex, Terrain> {
    let mut rng = GameRng::seed_from_u64(seed);
    let mut cells: HashMap<Hex, Terrain> = HashMap::new();

    let chains = rng.gen_range_u32(cfg.mountain_chains_min..cfg.mountain_chains_max + 1);
    for seed_hex in scatter_seeds(
        &mut rng,
        chains,
        cfg.mountain_chain_spacing,
        cfg.mountain_area_size,
    ) {
        walk_mountain_chain(cfg, &mut rng, &mut cells, seed_hex);
    }

    let rivers = rng.gen_range_u32(cfg.river_count_min..cfg.river_count_max + 1);
    for seed_hex in scatter_seeds(&mut rng, rivers, cfg.river_spacing, cfg.mountain_area_size) {
        walk_river(cfg, &mut rng, &mut cells, seed_hex);
    }

    cells
}

/// Scatter `count` seeds in the generation square, pairwise at least
/// `spacing` apart. Bounded attempts: a crowded square yields fewer seeds
/// rather than looping forever.
fn scatter_seeds(rng: &mut GameRng, count: u32, spacing: i32, area: i32) -> Vec<Hex> {
    let half = area / 2;
    let mut seeds: Vec<Hex> = Vec::new();
    let mut attempts = 0;
    while (seeds.len() as u32) < count && attempts < 200 {
        attempts += 1;
        let candidate = Hex::new(
            rng.gen_range_i32(-half..half + 1),
            rng.gen_range_i32(-half..half + 1),
        );
        if seeds.iter().all(|s| s.distance(candidate) >= spacing) {
            seeds.push(candidate);
        }
    }
    seeds
}

fn walk_mountain_chain(
    cfg: &TerrainConfig,
    rng: &mut GameRng,
    cells: &mut HashMap<Hex, Terrain>,
    start: Hex,
) {
    let length =
        rng.gen_range_u32(cfg.mountain_chain_length_min..cfg.mountain_chain_length_max + 1);
    let mut dir = rng.gen_range_usize(0..6);
    let mut current = start;

    for _ in 0..length {
        cells.insert(current, Terrain::Mountain);

        if rng.next_f32() < cfg.mountain_density {
            // Side branch one cell off the spine.
            let offset = Hex::DIRECTIONS[rng.gen_range_usize(0..6)];
            cells.insert(current + offset, Terrain::Mountain);
        }

        if rng.next_f32() < cfg.mountain_zigzag_chance {
            dir = deviate(rng, dir);
        }
        current = current + Hex::DIRECTIONS[dir];
    }
}

fn walk_river(
    cfg: &TerrainConfig,
    rng: &mut GameRng,
    cells: &mut HashMap<Hex, Terrain>,
    start: Hex,
) {
    let length = rng.gen_range_u32(cfg.river_length_min..cfg.river_length_max + 1);
    let mut dir = rng.gen_range_usize(0..6);
    let mut current = start;
    let mut forked = false;

    for step in 0..length {
        place_river(cells, current);

        // A single fork may spawn after the first third of the main branch.
        if !forked && step * 3 >= length && rng.next_f32() < cfg.river_fork_chance {
            forked = true;
            let fork_dir = deviate(rng, dir);
            let mut fork = current;
            for _ in 0..cfg.river_fork_length {
                fork = fork + Hex::DIRECTIONS[fork_dir];
                place_river(cells, fork);
            }
        }

        if rng.next_f32() < cfg.mountain_zigzag_chance {
            dir = deviate(rng, dir);
        }
        current = current + Hex::DIRECTIONS[dir];
    }
}

/// Rivers flow around mountains, never through them.
fn place_river(cells: &mut HashMap<Hex, Terrain>, hex: Hex) {
    if cells.get(&hex) != Some(&Terrain::Mountain) {
        cells.insert(hex, Terrain::River);
    }
}

/// One of the five directions that is not the reverse of `dir`.
fn deviate(rng: &mut GameRng, dir: usize) -> usize {
    let reverse = (dir + 3) % 6;
    loop {
        let candidate = rng.gen_range_usize(0..6);
        if candidate != reverse {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let cfg = TerrainConfig::default();
        let a = generate_terrain(&cfg, 42);
        let b = generate_terrain(&cfg, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let cfg = TerrainConfig::default();
        let a = generate_terrain(&cfg, 1);
        let b = generate_terrain(&cfg, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn produces_both_terrain_kinds() {
        let cfg = TerrainConfig::default();
        let cells = generate_terrain(&cfg, 12345);
        assert!(cells.values().any(|t| *t == Terrain::Mountain));
        assert!(cells.values().any(|t| *t == Terrain::River));
        assert!(cells.values().all(|t| *t != Terrain::None));
    }

    #[test]
    fn cells_stay_near_the_generation_square() {
        let cfg = TerrainConfig::default();
        let cells = generate_terrain(&cfg, 7);
        // Seeds land inside the square; walks can only stray by chain length
        // plus fork length.
        let reach = cfg.mountain_area_size / 2
            + cfg.mountain_chain_length_max as i32
            + cfg.river_length_max as i32
            + cfg.river_fork_length as i32
            + 2;
        for hex in cells.keys() {
            assert!(hex.q.abs() <= reach && hex.r.abs() <= reach, "stray cell {hex:?}");
        }
    }

    #[test]
    fn seed_scatter_respects_spacing() {
        let mut rng = GameRng::seed_from_u64(3);
        let seeds = scatter_seeds(&mut rng, 5, 12, 60);
        for i in 0..seeds.len() {
            for j in (i + 1)..seeds.len() {
                assert!(seeds[i].distance(seeds[j]) >= 12);
            }
        }
    }
}
