use nalgebra::{Matrix3, Point3, Vector3};

/// Unweighted centroid of a set of points. Returns the origin for an empty slice.
pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len() as f64)
}

pub fn radius_of_gyration(points: &[Point3<f64>]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let center = centroid(points);
    let sum_sq: f64 = points.iter().map(|p| (p - center).norm_squared()).sum();
    (sum_sq / points.len() as f64).sqrt()
}

/// Gyration tensor `S = 1/N Σ (r_i - r_c)(r_i - r_c)ᵀ`.
pub fn gyration_tensor(points: &[Point3<f64>]) -> Matrix3<f64> {
    if points.is_empty() {
        return Matrix3::zeros();
    }
    let center = centroid(points);
    let sum = points.iter().fold(Matrix3::zeros(), |acc, p| {
        let d = p - center;
        acc + d * d.transpose()
    });
    sum / points.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn centroid_of_symmetric_points_is_origin() {
        let points = vec![Point3::new(1.0, 0.0, 0.0), Point3::new(-1.0, 0.0, 0.0)];
        assert!(centroid(&points).coords.norm() < TOLERANCE);
    }

    #[test]
    fn radius_of_gyration_of_two_points_is_half_distance() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        assert!(f64_approx_equal(radius_of_gyration(&points), 1.0));
    }

    #[test]
    fn gyration_tensor_trace_equals_rg_squared() {
        let points = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 1.0),
            Point3::new(-1.0, 3.0, 0.5),
        ];
        let rg = radius_of_gyration(&points);
        assert!(f64_approx_equal(gyration_tensor(&points).trace(), rg * rg));
    }
}
