use crate::core::models::system::Chain;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use rand_distr::{Distribution, UnitSphere};
use std::collections::HashMap;
use std::f64::consts::PI;

use super::config::InitMode;

pub const SPRING_RADIUS: f64 = 0.8;
pub const SPRING_TURN: f64 = PI / 3.0;
pub const SPRING_RISE: f64 = 0.6;
/// Spacing between successive chains.
pub const CHAIN_SPACING: f64 = 3.0;

const WALK_MIN_DISTANCE: f64 = 0.9;
const WALK_MAX_TRIES: usize = 100;

/// Generates coordinates for `chains` (which must partition their bead range in order).
///
/// Ring chains are always laid out on a circle of circumference equal to their bead
/// count so that the closing bond starts at unit length.
pub fn init_structure<R: Rng + ?Sized>(
    mode: InitMode,
    chains: &[Chain],
    rng: &mut R,
) -> Vec<Point3<f64>> {
    let n_beads = chains.last().map_or(0, |c| c.end);
    let mut positions = Vec::with_capacity(n_beads);
    let mut walk = SelfAvoidingWalk::default();

    for (idx, chain) in chains.iter().enumerate() {
        let offset = Vector3::new(idx as f64 * CHAIN_SPACING, 0.0, 0.0);
        if chain.is_ring && chain.len() > 2 {
            positions.extend(ring(chain.len()).into_iter().map(|p| p + offset));
            continue;
        }
        match mode {
            InitMode::Spring => {
                positions.extend(spring(chain.len()).into_iter().map(|p| p + offset));
            }
            InitMode::Line => {
                let shift = Vector3::new(0.0, idx as f64 * CHAIN_SPACING, 0.0);
                positions.extend(line(chain.len()).into_iter().map(|p| p + shift));
            }
            InitMode::Random => {
                let start = positions.last().map_or(Point3::origin(), |p| {
                    p + Vector3::new(CHAIN_SPACING, 0.0, 0.0)
                });
                walk.insert(start);
                positions.push(start);
                for _ in 1..chain.len() {
                    let p = walk.step(positions[positions.len() - 1], rng);
                    walk.insert(p);
                    positions.push(p);
                }
            }
        }
    }
    positions
}

/// Helix of radius 0.8 turning 60° and rising 0.6 per bead, which gives unit bonds.
pub fn spring(n: usize) -> Vec<Point3<f64>> {
    (0..n)
        .map(|i| {
            let t = i as f64 * SPRING_TURN;
            Point3::new(
                SPRING_RADIUS * t.cos(),
                SPRING_RADIUS * t.sin(),
                i as f64 * SPRING_RISE,
            )
        })
        .collect()
}

pub fn line(n: usize) -> Vec<Point3<f64>> {
    (0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect()
}

/// Circle with unit arc length between neighbors.
pub fn ring(n: usize) -> Vec<Point3<f64>> {
    let radius = n as f64 / (2.0 * PI);
    (0..n)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / n as f64;
            Point3::new(radius * t.cos(), radius * t.sin(), 0.0)
        })
        .collect()
}

/// Spatial hash of placed beads for the random walk overlap test.
#[derive(Default)]
struct SelfAvoidingWalk {
    cells: HashMap<(i64, i64, i64), Vec<Point3<f64>>>,
}

impl SelfAvoidingWalk {
    fn key(p: &Point3<f64>) -> (i64, i64, i64) {
        (p.x.floor() as i64, p.y.floor() as i64, p.z.floor() as i64)
    }

    fn insert(&mut self, p: Point3<f64>) {
        self.cells.entry(Self::key(&p)).or_default().push(p);
    }

    fn is_free(&self, p: &Point3<f64>) -> bool {
        let (cx, cy, cz) = Self::key(p);
        let min_sq = WALK_MIN_DISTANCE * WALK_MIN_DISTANCE;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(members) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    if members.iter().any(|q| (q - p).norm_squared() < min_sq) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Unit step from `from`; after the retry budget the last candidate is accepted.
    fn step<R: Rng + ?Sized>(&self, from: Point3<f64>, rng: &mut R) -> Point3<f64> {
        let mut candidate = from;
        for _ in 0..WALK_MAX_TRIES {
            let dir: [f64; 3] = UnitSphere.sample(rng);
            candidate = from + Vector3::new(dir[0], dir[1], dir[2]);
            if self.is_free(&candidate) {
                break;
            }
        }
        candidate
    }
}
