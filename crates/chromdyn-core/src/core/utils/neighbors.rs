use nalgebra::Point3;
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

type CellKey = (i64, i64, i64);

/// A bead pair `(i, j)` with `i < j` and its distance.
pub type NeighborPair = (usize, usize, f64);

/// Spatial hashing of bead positions into cubic cells of side `cutoff`.
pub struct CellList<'a> {
    positions: &'a [Point3<f64>],
    cutoff: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl<'a> CellList<'a> {
    pub fn new(positions: &'a [Point3<f64>], cutoff: f64) -> Self {
        let cutoff = cutoff.max(1e-6);
        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (i, p) in positions.iter().enumerate() {
            cells.entry(Self::key(p, cutoff)).or_default().push(i);
        }
        Self {
            positions,
            cutoff,
            cells,
        }
    }

    #[inline]
    fn key(p: &Point3<f64>, cutoff: f64) -> CellKey {
        (
            (p.x / cutoff).floor() as i64,
            (p.y / cutoff).floor() as i64,
            (p.z / cutoff).floor() as i64,
        )
    }

    /// Beads `j > i` within the cutoff of bead `i`, sorted by `j`.
    fn neighbors_of(&self, i: usize) -> Vec<NeighborPair> {
        let p = &self.positions[i];
        let (cx, cy, cz) = Self::key(p, self.cutoff);
        let cutoff_sq = self.cutoff * self.cutoff;
        let mut found = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(members) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &j in members {
                        if j <= i {
                            continue;
                        }
                        let d_sq = (self.positions[j] - p).norm_squared();
                        if d_sq < cutoff_sq {
                            found.push((i, j, d_sq.sqrt()));
                        }
                    }
                }
            }
        }
        found.sort_unstable_by_key(|&(_, j, _)| j);
        found
    }

    /// All pairs closer than the cutoff, ordered by `(i, j)`.
    pub fn pairs(&self, parallel: bool) -> Vec<NeighborPair> {
        let n = self.positions.len();

        #[cfg(feature = "parallel")]
        if parallel {
            return (0..n)
                .into_par_iter()
                .flat_map_iter(|i| self.neighbors_of(i))
                .collect();
        }
        #[cfg(not(feature = "parallel"))]
        let _ = parallel;

        (0..n).flat_map(|i| self.neighbors_of(i)).collect()
    }
}

/// Convenience wrapper around [`CellList::pairs`].
pub fn pairs_within(positions: &[Point3<f64>], cutoff: f64, parallel: bool) -> Vec<NeighborPair> {
    CellList::new(positions, cutoff).pairs(parallel)
}
