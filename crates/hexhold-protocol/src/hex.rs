use serde::{Deserialize, Serialize};

/// Axial coordinates for a hex grid (q, r). The implicit cube coordinate is `s = -q - r`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

impl Hex {
    pub const DIRECTIONS: [Hex; 6] = [
        Hex { q: 1, r: 0 },  // East
        Hex { q: 1, r: -1 }, // Northeast
        Hex { q: 0, r: -1 }, // Northwest
        Hex { q: -1, r: 0 }, // West
        Hex { q: -1, r: 1 }, // Southwest
        Hex { q: 0, r: 1 },  // Southeast
    ];

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    #[inline]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    pub fn neighbors(self) -> impl Iterator<Item = Hex> {
        Self::DIRECTIONS.into_iter().map(move |d| self + d)
    }

    #[inline]
    pub fn distance(self, other: Hex) -> i32 {
        ((self.q - other.q).abs() + (self.r - other.r).abs() + (self.s() - other.s()).abs()) / 2
    }

    /// Hash-field key under which this cell is stored (`"q:r"`).
    pub fn key(self) -> String {
        format!("{}:{}", self.q, self.r)
    }

    /// Parse a `"q:r"` hash-field key back into a coordinate.
    pub fn from_key(key: &str) -> Option<Hex> {
        let (q, r) = key.split_once(':')?;
        Some(Hex {
            q: q.parse().ok()?,
            r: r.parse().ok()?,
        })
    }
}

impl std::ops::Add for Hex {
    type Output = Hex;

    fn add(self, other: Hex) -> Hex {
        Hex {
            q: self.q + other.q,
            r: self.r + other.r,
        }
    }
}

impl std::ops::Mul<i32> for Hex {
    type Output = Hex;

    fn mul(self, rhs: i32) -> Self::Output {
        Hex {
            q: self.q * rhs,
            r: self.r * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_distance_matches_expected() {
        let a = Hex { q: 0, r: 0 };
        let b = Hex { q: 3, r: -1 };
        assert_eq!(a.distance(b), 3);
    }

    #[test]
    fn hex_neighbors_has_six_adjacent() {
        let center = Hex { q: 0, r: 0 };
        let neighbors: Vec<_> = center.neighbors().collect();
        assert_eq!(neighbors.len(), 6);
        assert!(neighbors.iter().all(|n| center.distance(*n) == 1));
    }

    #[test]
    fn key_roundtrip() {
        let hex = Hex { q: -7, r: 12 };
        assert_eq!(hex.key(), "-7:12");
        assert_eq!(Hex::from_key(&hex.key()), Some(hex));
        assert_eq!(Hex::from_key("nonsense"), None);
        assert_eq!(Hex::from_key("1:x"), None);
    }
}
