//! The authoritative capture cost model.
//!
//! Integer in, integer out: intermediates use f64 where the formulas demand
//! it (log, sqrt) and are floored at the end, so every process computes the
//! same number for the same inputs.

use crate::config::GameConfig;

/// Defender-side inputs to the attack cost formula.
#[derive(Clone, Copy, Debug)]
pub struct DefenderStats {
    /// Tiles owned by the defender.
    pub tiles: i64,
    /// Defender's current points.
    pub points: i64,
    /// Fort on the target, or on a neighbor owned by the defender.
    pub fortified: bool,
}

/// Base cost of expanding onto a tile, growing logarithmically with the
/// attacker's owned tile count.
pub fn expansion_cost(cfg: &GameConfig, attacker_tiles: i64) -> i64 {
    let growth = (cfg.exp_growth as f64 * ((attacker_tiles + 2) as f64).log2()).floor() as i64;
    cfg.hex_value + growth
}

/// Full cost of capturing a tile the attacker does not own.
///
/// `river_discount` applies when the target is adjacent to a river and the
/// attacker has river access. A defended tile costs at least the attack
/// formula; the discounted base never lowers an attack below it.
pub fn capture_cost(
    cfg: &GameConfig,
    attacker_tiles: i64,
    river_discount: bool,
    defender: Option<DefenderStats>,
) -> i64 {
    let expansion = expansion_cost(cfg, attacker_tiles);

    let mut cost = expansion;
    if river_discount {
        cost = ((cost as f64) * 0.7).floor() as i64;
        cost = cost.max(1);
    }

    if let Some(d) = defender {
        let held = d.tiles.max(1) as f64;
        let mut strength = (1.0 + d.points as f64 / held) * held * (cfg.hex_value as f64 + 0.5);
        if d.fortified {
            strength *= 2.0;
        }
        let attack =
            expansion + cfg.occupied_base + (cfg.attack_mult * strength.sqrt()).floor() as i64;
        cost = cost.max(attack);
    }

    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GameConfig {
        GameConfig::default()
    }

    #[test]
    fn first_expansion_costs_seventeen() {
        // One owned tile: 10 + floor(5 * log2(3)) = 10 + 7.
        assert_eq!(expansion_cost(&cfg(), 1), 17);
        assert_eq!(capture_cost(&cfg(), 1, false, None), 17);
    }

    #[test]
    fn expansion_grows_with_territory() {
        // Four owned tiles: 10 + floor(5 * log2(6)) = 10 + 12.
        assert_eq!(expansion_cost(&cfg(), 4), 22);
        assert!(expansion_cost(&cfg(), 100) > expansion_cost(&cfg(), 10));
    }

    #[test]
    fn attack_cost_against_defender() {
        // Defender with 3 tiles and 200 points:
        // strength = (1 + 200/3) * 3 * 10.5 = 2131.5
        // attack   = 17 + 5 + floor(2.5 * sqrt(2131.5)) = 17 + 5 + 115.
        let defender = DefenderStats {
            tiles: 3,
            points: 200,
            fortified: false,
        };
        assert_eq!(capture_cost(&cfg(), 1, false, Some(defender)), 137);
    }

    #[test]
    fn fort_doubles_strength() {
        // Same defender behind a fort: strength 4263, attack 17 + 5 + 163.
        let defender = DefenderStats {
            tiles: 3,
            points: 200,
            fortified: true,
        };
        assert_eq!(capture_cost(&cfg(), 1, false, Some(defender)), 185);
    }

    #[test]
    fn river_discount_floors_at_one() {
        // 30% off the base expansion cost.
        assert_eq!(capture_cost(&cfg(), 1, true, None), 11);

        let mut tiny = cfg();
        tiny.hex_value = 1;
        tiny.exp_growth = 0;
        assert_eq!(capture_cost(&tiny, 1, true, None), 1);
    }

    #[test]
    fn discount_never_undercuts_attack_formula() {
        let defender = DefenderStats {
            tiles: 1,
            points: 50,
            fortified: false,
        };
        let plain = capture_cost(&cfg(), 1, false, Some(defender));
        let discounted = capture_cost(&cfg(), 1, true, Some(defender));
        assert_eq!(plain, discounted);
    }

    #[test]
    fn zero_tile_defender_counts_as_one() {
        let defender = DefenderStats {
            tiles: 0,
            points: 100,
            fortified: false,
        };
        // strength = (1 + 100/1) * 1 * 10.5 = 1060.5; no division by zero.
        let cost = capture_cost(&cfg(), 1, false, Some(defender));
        assert_eq!(cost, 17 + 5 + (2.5f64 * 1060.5f64.sqrt()).floor() as i64);
    }
}
