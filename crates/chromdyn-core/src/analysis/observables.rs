use super::error::AnalysisError;
use crate::core::utils::geometry;
use crate::optimization::contact::ContactAccumulator;
use nalgebra::{DMatrix, DVector, Point3};
use std::f64::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const DEFAULT_RDP_RADIUS: f64 = 20.0;
pub const DEFAULT_RDP_BINS: usize = 200;

type Frames = [Vec<Point3<f64>>];

fn per_frame<T, F>(xyz: &Frames, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&[Point3<f64>]) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        xyz.par_iter().map(|frame| f(frame.as_slice())).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        xyz.iter().map(|frame| f(frame.as_slice())).collect()
    }
}

fn non_empty(xyz: &Frames) -> Result<usize, AnalysisError> {
    let n = xyz.first().map(Vec::len).ok_or(AnalysisError::EmptySelection)?;
    if xyz.iter().any(|frame| frame.len() != n) {
        return Err(AnalysisError::RaggedFrames);
    }
    Ok(n)
}

/// Radius of gyration of every frame.
pub fn radius_of_gyration(xyz: &Frames) -> Result<Vec<f64>, AnalysisError> {
    non_empty(xyz)?;
    Ok(per_frame(xyz, geometry::radius_of_gyration))
}

/// Eigenvalues of the gyration tensor of every frame, ascending.
pub fn gyration_tensor_eigenvalues(xyz: &Frames) -> Result<Vec<[f64; 3]>, AnalysisError> {
    non_empty(xyz)?;
    Ok(per_frame(xyz, |frame| {
        let eigen = geometry::gyration_tensor(frame).symmetric_eigenvalues();
        let mut values = [eigen[0], eigen[1], eigen[2]];
        values.sort_by(f64::total_cmp);
        values
    }))
}

/// Radial bead density around the centroid, averaged over frames.
///
/// Distances fall into `bins` shells of width `radius / bins`; each count is divided by
/// its shell volume. Returns the shell centres and the densities.
pub fn radial_distribution(
    xyz: &Frames,
    radius: f64,
    bins: usize,
) -> Result<(Vec<f64>, Vec<f64>), AnalysisError> {
    non_empty(xyz)?;
    if bins == 0 || radius <= 0.0 {
        return Err(AnalysisError::InvalidRange(format!(
            "radial distribution needs a positive radius and bin count, got {} and {}",
            radius, bins
        )));
    }
    let dr = radius / bins as f64;
    let shell_volumes: Vec<f64> = (0..bins)
        .map(|k| {
            let (inner, outer) = (k as f64 * dr, (k + 1) as f64 * dr);
            4.0 / 3.0 * PI * (outer.powi(3) - inner.powi(3))
        })
        .collect();

    let histograms = per_frame(xyz, |frame| {
        let center = geometry::centroid(frame);
        let mut counts = vec![0.0; bins];
        for p in frame {
            let r = (p - center).norm();
            if r < radius {
                let k = ((r / dr) as usize).min(bins - 1);
                counts[k] += 1.0;
            }
        }
        counts
    });

    let n_frames = histograms.len() as f64;
    let density = (0..bins)
        .map(|k| histograms.iter().map(|h| h[k]).sum::<f64>() / n_frames / shell_volumes[k])
        .collect();
    let centers = (0..bins).map(|k| (k as f64 + 0.5) * dr).collect();
    Ok((centers, density))
}

/// Local chirality `ψ_i = v1·(v2×v3) / (|v1||v2||v3|)` along the chain of every frame.
///
/// The segment vectors join beads `neighbors` apart: `v_k = x(i+k·n) - x(i+(k-1)·n)`.
/// Each frame yields `N - 3n` values.
pub fn chirality(xyz: &Frames, neighbors: usize) -> Result<Vec<Vec<f64>>, AnalysisError> {
    let n_beads = non_empty(xyz)?;
    let span = 3 * neighbors;
    if neighbors == 0 || n_beads <= span {
        return Err(AnalysisError::TooFewBeads {
            needed: span + 1,
            found: n_beads,
        });
    }
    Ok(per_frame(xyz, |frame| {
        (0..n_beads - span)
            .map(|i| {
                let v1 = frame[i + neighbors] - frame[i];
                let v2 = frame[i + 2 * neighbors] - frame[i + neighbors];
                let v3 = frame[i + span] - frame[i + 2 * neighbors];
                let norm = v1.norm() * v2.norm() * v3.norm();
                if norm > 0.0 {
                    v1.dot(&v2.cross(&v3)) / norm
                } else {
                    0.0
                }
            })
            .collect()
    }))
}

/// Mean contact probability matrix over frames.
pub fn traj_to_hic(xyz: &Frames, mu: f64, rc: f64) -> Result<DMatrix<f64>, AnalysisError> {
    let n = non_empty(xyz)?;
    let mut accumulator = ContactAccumulator::new(n);
    for frame in xyz {
        accumulator
            .add_state(frame, mu, rc)
            .map_err(|_| AnalysisError::RaggedFrames)?;
    }
    accumulator.mean().map_err(|_| AnalysisError::EmptySelection)
}

/// Mean and standard deviation of a per-frame series.
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let v = DVector::from_column_slice(values);
    let mean = v.mean();
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some((mean, var.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn helix(n: usize, handedness: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 0.5;
                Point3::new(t.cos(), handedness * t.sin(), 0.3 * i as f64)
            })
            .collect()
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert!(matches!(
            radius_of_gyration(&[]),
            Err(AnalysisError::EmptySelection)
        ));
        assert!(matches!(
            traj_to_hic(&[], 3.22, 1.78),
            Err(AnalysisError::EmptySelection)
        ));
    }

    #[test]
    fn radius_of_gyration_per_frame() {
        let frames = vec![
            vec![Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
            vec![Point3::new(-2.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
        ];
        let rg = radius_of_gyration(&frames).unwrap();
        assert!(f64_approx_equal(rg[0], 1.0));
        assert!(f64_approx_equal(rg[1], 2.0));
    }

    #[test]
    fn radial_density_integrates_to_bead_count() {
        let frames = vec![helix(40, 1.0), helix(40, -1.0)];
        let (centers, density) = radial_distribution(&frames, 20.0, 200).unwrap();
        assert_eq!(centers.len(), 200);
        assert!(f64_approx_equal(centers[0], 0.05));
        let dr = 0.1;
        let total: f64 = density
            .iter()
            .zip(&centers)
            .map(|(rho, r)| {
                let (inner, outer) = (r - dr / 2.0, r + dr / 2.0);
                rho * 4.0 / 3.0 * PI * (outer.powi(3) - inner.powi(3))
            })
            .sum();
        assert!((total - 40.0).abs() < 1e-6);
    }

    #[test]
    fn chirality_sign_follows_handedness() {
        let frames = vec![helix(30, 1.0), helix(30, -1.0)];
        let psi = chirality(&frames, 4).unwrap();
        assert_eq!(psi[0].len(), 30 - 12);
        assert!(psi[0].iter().all(|&v| v != 0.0));
        for (right, left) in psi[0].iter().zip(&psi[1]) {
            assert!(f64_approx_equal(*right, -*left));
        }
    }

    #[test]
    fn chirality_needs_enough_beads() {
        let frames = vec![helix(12, 1.0)];
        assert!(matches!(
            chirality(&frames, 4),
            Err(AnalysisError::TooFewBeads { needed: 13, found: 12 })
        ));
    }

    #[test]
    fn gyration_eigenvalues_of_a_rod() {
        let rod: Vec<_> = (0..5).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect();
        let values = gyration_tensor_eigenvalues(&[rod]).unwrap();
        assert!(values[0][0].abs() < TOLERANCE);
        assert!(values[0][1].abs() < TOLERANCE);
        assert!(f64_approx_equal(values[0][2], 2.0));
    }

    #[test]
    fn contact_map_is_frame_average() {
        let near = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        let far = vec![Point3::origin(), Point3::new(10.0, 0.0, 0.0)];
        let hic = traj_to_hic(&[near.clone(), far], 3.22, 1.78).unwrap();
        let single = traj_to_hic(&[near], 3.22, 1.78).unwrap();
        assert!((hic[(0, 1)] - single[(0, 1)] / 2.0).abs() < 1e-6);
        assert_eq!(hic[(0, 0)], 1.0);
    }

    #[test]
    fn series_statistics() {
        let (mean, std) = mean_and_std(&[1.0, 3.0]).unwrap();
        assert!(f64_approx_equal(mean, 2.0));
        assert!(f64_approx_equal(std, 1.0));
        assert!(mean_and_std(&[]).is_none());
    }
}
