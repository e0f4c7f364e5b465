//! Scalar pair potentials of the MiChroM model.
//!
//! Every function returns `(energy, dE/dr)` in reduced units so that force terms can
//! project the radial derivative onto bead coordinates.

use std::f64::consts::PI;

const MIN_DISTANCE: f64 = 1e-6;

/// `2^(1/6)`, the WCA cutoff in units of σ.
pub const WCA_CUTOFF: f64 = 1.122_462_048_309_373;

pub const IC_GAMMA_1: f64 = -0.030;
pub const IC_GAMMA_2: f64 = -0.351;
pub const IC_GAMMA_3: f64 = -3.727;

#[inline]
pub fn fene(r: f64, k: f64, r0: f64) -> (f64, f64) {
    let x = (r / r0).powi(2);
    if x >= 1.0 {
        return (f64::INFINITY, f64::INFINITY);
    }
    let energy = -0.5 * k * r0 * r0 * (1.0 - x).ln();
    let derivative = k * r / (1.0 - x);
    (energy, derivative)
}

#[inline]
pub fn wca(r: f64, sigma: f64, epsilon: f64) -> (f64, f64) {
    if r >= WCA_CUTOFF * sigma {
        return (0.0, 0.0);
    }
    if r < MIN_DISTANCE {
        return (1e10, 0.0);
    }
    let s6 = (sigma / r).powi(6);
    let s12 = s6 * s6;
    let energy = 4.0 * epsilon * (s12 - s6) + epsilon;
    let derivative = -24.0 * epsilon * (2.0 * s12 - s6) / r;
    (energy, derivative)
}

#[inline]
pub fn harmonic(r: f64, k: f64, r_eq: f64) -> (f64, f64) {
    let dr = r - r_eq;
    (k * dr * dr, 2.0 * k * dr)
}

/// Distance at which the shifted Lennard-Jones core reaches `e_cut / 2`.
#[inline]
pub fn soft_core_switch_distance(e_cut: f64) -> f64 {
    WCA_CUTOFF / (1.0 + (0.5 * e_cut).sqrt()).powf(1.0 / 6.0)
}

/// Lennard-Jones core capped smoothly at `e_cut`.
///
/// Beyond the switch distance this is the WCA potential (σ = ε = 1); below it the energy
/// saturates through a `tanh` so overlapping beads stay finite and chains may cross.
#[inline]
pub fn soft_core(r: f64, e_cut: f64) -> (f64, f64) {
    if r >= WCA_CUTOFF {
        return (0.0, 0.0);
    }
    if r < MIN_DISTANCE {
        return (e_cut, 0.0);
    }
    let (lj, d_lj) = wca(r, 1.0, 1.0);
    if r >= soft_core_switch_distance(e_cut) {
        return (lj, d_lj);
    }
    let u = 2.0 * lj / e_cut - 1.0;
    let t = u.tanh();
    let energy = 0.5 * e_cut * (1.0 + t);
    let derivative = (1.0 - t * t) * d_lj;
    (energy, derivative)
}

/// Contact probability `f(r) = ½ (1 + tanh(μ (r_c - r)))`.
#[inline]
pub fn contact_probability(r: f64, mu: f64, rc: f64) -> (f64, f64) {
    let t = (mu * (rc - r)).tanh();
    (0.5 * (1.0 + t), -0.5 * mu * (1.0 - t * t))
}

/// Analytic ideal-chromosome energy scale for genomic separation `d` (in beads, `d >= 2`).
#[inline]
pub fn ideal_chromosome_gamma(d: usize) -> f64 {
    let d = d as f64;
    IC_GAMMA_1 / d.ln() + IC_GAMMA_2 / d + IC_GAMMA_3 / (d * d)
}

#[inline]
pub fn flat_bottom_harmonic(r: f64, k: f64, r_flat: f64) -> (f64, f64) {
    if r <= r_flat {
        return (0.0, 0.0);
    }
    harmonic(r, k, r_flat)
}

/// WCA repulsion from a wall at distance `gap` from the bead.
#[inline]
pub fn lj_wall(gap: f64, sigma: f64, epsilon: f64) -> (f64, f64) {
    wca(gap, sigma, epsilon)
}

/// Bending energy `ka (1 - cos(θ - π))` and its derivative with respect to `θ`.
#[inline]
pub fn angle(theta: f64, ka: f64) -> (f64, f64) {
    let phi = theta - PI;
    (ka * (1.0 - phi.cos()), ka * phi.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn numeric_derivative(f: impl Fn(f64) -> f64, r: f64) -> f64 {
        let h = 1e-6;
        (f(r + h) - f(r - h)) / (2.0 * h)
    }

    #[test]
    fn fene_is_zero_at_origin_distance_and_diverges_at_r0() {
        assert!(f64_approx_equal(fene(0.0, 30.0, 1.5).0, 0.0));
        assert!(fene(1.5, 30.0, 1.5).0.is_infinite());
    }

    #[test]
    fn fene_derivative_matches_numeric() {
        let analytic = fene(1.0, 30.0, 1.5).1;
        let numeric = numeric_derivative(|r| fene(r, 30.0, 1.5).0, 1.0);
        assert!((analytic - numeric).abs() < 1e-5);
    }

    #[test]
    fn wca_vanishes_at_cutoff_and_equals_epsilon_at_sigma() {
        assert!(f64_approx_equal(wca(WCA_CUTOFF, 1.0, 1.0).0, 0.0));
        assert!(f64_approx_equal(wca(1.0, 1.0, 1.0).0, 1.0));
    }

    #[test]
    fn wca_derivative_matches_numeric() {
        let analytic = wca(0.95, 1.0, 1.0).1;
        let numeric = numeric_derivative(|r| wca(r, 1.0, 1.0).0, 0.95);
        assert!((analytic - numeric).abs() < 1e-4);
    }

    #[test]
    fn soft_core_is_continuous_at_switch_distance() {
        let e_cut = 4.0;
        let r0 = soft_core_switch_distance(e_cut);
        let below = soft_core(r0 - 1e-9, e_cut).0;
        let above = soft_core(r0 + 1e-9, e_cut).0;
        assert!((below - 2.0).abs() < 1e-6);
        assert!((above - 2.0).abs() < 1e-6);
    }

    #[test]
    fn soft_core_is_bounded_by_e_cut() {
        let (energy, _) = soft_core(0.1, 4.0);
        assert!(energy <= 4.0 + TOLERANCE);
        assert!(energy > 3.9);
        assert!(f64_approx_equal(soft_core(0.0, 4.0).0, 4.0));
    }

    #[test]
    fn soft_core_derivative_matches_numeric_in_capped_region() {
        let r = 0.8;
        let analytic = soft_core(r, 4.0).1;
        let numeric = numeric_derivative(|x| soft_core(x, 4.0).0, r);
        assert!((analytic - numeric).abs() < 1e-4);
    }

    #[test]
    fn contact_probability_is_half_at_rc() {
        let (p, _) = contact_probability(1.78, 3.22, 1.78);
        assert!(f64_approx_equal(p, 0.5));
    }

    #[test]
    fn contact_probability_derivative_matches_numeric() {
        let analytic = contact_probability(2.0, 3.22, 1.78).1;
        let numeric = numeric_derivative(|r| contact_probability(r, 3.22, 1.78).0, 2.0);
        assert!((analytic - numeric).abs() < 1e-6);
    }

    #[test]
    fn ideal_chromosome_gamma_follows_published_law() {
        let expected = -0.030 / 3f64.ln() - 0.351 / 3.0 - 3.727 / 9.0;
        assert!(f64_approx_equal(ideal_chromosome_gamma(3), expected));
    }

    #[test]
    fn flat_bottom_harmonic_is_zero_inside_radius() {
        assert!(f64_approx_equal(flat_bottom_harmonic(5.0, 1.0, 10.0).0, 0.0));
        assert!(f64_approx_equal(flat_bottom_harmonic(12.0, 1.0, 10.0).0, 4.0));
    }

    #[test]
    fn straight_angle_has_zero_bending_energy() {
        let (energy, derivative) = angle(PI, 2.0);
        assert!(f64_approx_equal(energy, 0.0));
        assert!(f64_approx_equal(derivative, 0.0));
    }

    #[test]
    fn right_angle_bending_energy_equals_ka() {
        assert!(f64_approx_equal(angle(PI / 2.0, 2.0).0, 2.0));
    }
}
