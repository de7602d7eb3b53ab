//! The auto-expansion scan.
//!
//! Runs against an immutable snapshot of a game's hex map and returns the
//! captures that one scan performs (snapshot-then-mutate: the caller applies
//! the plan afterwards, so captures decided in one scan never feed back into
//! the same scan's decisions).

use std::collections::{HashMap, HashSet};

use hexhold_protocol::{Hex, HexTile, PlayerId, Terrain, Upgrade};

use crate::config::GameConfig;

/// A capture decided by one auto-expansion scan.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedCapture {
    pub hex: Hex,
    pub new_owner: PlayerId,
    pub color: String,
    pub previous_owner: Option<PlayerId>,
}

/// True when any of the six neighbors is a river cell.
pub fn is_adjacent_to_river(hexes: &HashMap<Hex, HexTile>, hex: Hex) -> bool {
    hex.neighbors()
        .any(|n| hexes.get(&n).is_some_and(|t| t.terrain == Terrain::River))
}

/// Players owning at least one hex adjacent to a river cell.
pub fn players_with_river_access(hexes: &HashMap<Hex, HexTile>) -> HashSet<PlayerId> {
    let mut out = HashSet::new();
    for (hex, tile) in hexes {
        if let Some(owner) = &tile.player_id {
            if !out.contains(owner) && is_adjacent_to_river(hexes, *hex) {
                out.insert(owner.clone());
            }
        }
    }
    out
}

/// Compute the captures for one auto-expansion tick.
///
/// A cell falls to the player owning a strict majority of at least
/// `auto_capture_threshold` of its six neighbors. Occupied cells additionally
/// require full enclosure or the river-access exception, and standing forts
/// veto the transfer.
pub fn plan_auto_captures(cfg: &GameConfig, hexes: &HashMap<Hex, HexTile>) -> Vec<PlannedCapture> {
    let river_access = players_with_river_access(hexes);

    // Candidates: every stored cell plus each of its six neighbors.
    let mut candidates: HashSet<Hex> = HashSet::new();
    for hex in hexes.keys() {
        candidates.insert(*hex);
        for n in hex.neighbors() {
            candidates.insert(n);
        }
    }

    let mut plan = Vec::new();
    for target in candidates {
        let tile = hexes.get(&target);

        // Mountains are impassable; rivers can never carry an owner.
        if tile.is_some_and(|t| !t.terrain.is_claimable()) {
            continue;
        }

        // Histogram of neighbor owners.
        let mut counts: HashMap<&PlayerId, (usize, &str)> = HashMap::new();
        for n in target.neighbors() {
            if let Some(nt) = hexes.get(&n) {
                if let Some(owner) = &nt.player_id {
                    let entry = counts.entry(owner).or_insert((0, nt.color.as_str()));
                    entry.0 += 1;
                }
            }
        }

        // Strict maximum only: any tie means no capture.
        let mut max_count = 0usize;
        let mut winner: Option<(&PlayerId, &str)> = None;
        let mut tied = false;
        for (player, (count, color)) in &counts {
            if *count > max_count {
                max_count = *count;
                winner = Some((player, color));
                tied = false;
            } else if *count == max_count && max_count > 0 {
                tied = true;
            }
        }
        if tied || max_count < cfg.auto_capture_threshold {
            continue;
        }
        let Some((winner, color)) = winner else {
            continue;
        };

        let current = tile.and_then(|t| t.player_id.as_ref());
        if current == Some(winner) {
            continue;
        }

        // Overriding an owner needs full enclosure or the river exception.
        if current.is_some() {
            let enclosed = target
                .neighbors()
                .all(|n| hexes.get(&n).is_some_and(|t| t.player_id.as_ref() == Some(winner)));
            let river_ok =
                is_adjacent_to_river(hexes, target) && river_access.contains(winner);
            if !enclosed && !river_ok {
                continue;
            }
        }

        // Fort protection, applied after the allow-capture check.
        let target_fort = tile.is_some_and(|t| {
            t.upgrade == Upgrade::Fort && t.player_id.as_ref() != Some(winner)
        });
        let neighbor_fort = target.neighbors().any(|n| {
            hexes.get(&n).is_some_and(|t| {
                t.upgrade == Upgrade::Fort
                    && t.player_id.is_some()
                    && t.player_id.as_ref() != Some(winner)
            })
        });
        if target_fort || neighbor_fort {
            continue;
        }

        plan.push(PlannedCapture {
            hex: target,
            new_owner: winner.clone(),
            color: color.to_string(),
            previous_owner: current.cloned(),
        });
    }

    // Stable application and broadcast order.
    plan.sort_by_key(|c| (c.hex.q, c.hex.r));
    plan
}
