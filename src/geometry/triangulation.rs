//! Linear (DLT) two-view triangulation.

use nalgebra::{Matrix3x4, Matrix4, Point2, Vector3};

use super::solver::PointTriangulator;

/// Homogeneous weights below this are treated as points at infinity.
const MIN_HOMOGENEOUS_W: f64 = 1e-12;

/// Triangulates with the direct linear transform on `P = K [R | t]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTriangulator;

impl PointTriangulator for LinearTriangulator {
    fn triangulate(
        &self,
        proj_a: &Matrix3x4<f64>,
        proj_b: &Matrix3x4<f64>,
        point_a: &Point2<f64>,
        point_b: &Point2<f64>,
    ) -> Option<Vector3<f64>> {
        triangulate_dlt(proj_a, proj_b, point_a, point_b)
    }
}

/// Solve `A X = 0` for the homogeneous point seen at `xa` through `pa` and
/// at `xb` through `pb`.
///
/// Each view contributes the rows `x * P[2] - P[0]` and `y * P[2] - P[1]`.
pub fn triangulate_dlt(
    pa: &Matrix3x4<f64>,
    pb: &Matrix3x4<f64>,
    xa: &Point2<f64>,
    xb: &Point2<f64>,
) -> Option<Vector3<f64>> {
    let mut a = Matrix4::<f64>::zeros();
    for j in 0..4 {
        a[(0, j)] = xa.x * pa[(2, j)] - pa[(0, j)];
        a[(1, j)] = xa.y * pa[(2, j)] - pa[(1, j)];
        a[(2, j)] = xb.x * pb[(2, j)] - pb[(0, j)];
        a[(3, j)] = xb.y * pb[(2, j)] - pb[(1, j)];
    }

    // Row scaling keeps pixel-sized and unit-sized rows comparable.
    for i in 0..4 {
        let n = a.row(i).norm();
        if n > 0.0 {
            a.row_mut(i).scale_mut(1.0 / n);
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let smallest = svd.singular_values.imin();
    let x = v_t.row(smallest);

    if x[3].abs() < MIN_HOMOGENEOUS_W {
        return None;
    }
    Some(Vector3::new(x[0] / x[3], x[1] / x[3], x[2] / x[3]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Intrinsics, SE3};
    use approx::assert_relative_eq;

    fn project(p: &Matrix3x4<f64>, x: &Vector3<f64>) -> Point2<f64> {
        let h = p * x.push(1.0);
        Point2::new(h.x / h.z, h.y / h.z)
    }

    #[test]
    fn test_triangulate_dlt() {
        // Point at (0, 0, 5) viewed from two cameras one unit apart.
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0).matrix();
        let pose_a = SE3::identity();
        let pose_b = SE3::from_rt(
            nalgebra::Matrix3::identity(),
            Vector3::new(-1.0, 0.0, 0.0),
        );
        let pa = k * pose_a.to_matrix3x4();
        let pb = k * pose_b.to_matrix3x4();

        let p_world = Vector3::new(0.0, 0.0, 5.0);
        let xa = project(&pa, &p_world);
        let xb = project(&pb, &p_world);

        let triangulated = LinearTriangulator
            .triangulate(&pa, &pb, &xa, &xb)
            .expect("well-conditioned pair");
        assert_relative_eq!(triangulated, p_world, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_baseline_ray_is_degenerate_or_far() {
        // Same camera twice: rays coincide, the solution is not unique.
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0).matrix();
        let p = k * SE3::identity().to_matrix3x4();
        let x = Point2::new(320.0, 240.0);
        if let Some(point) = triangulate_dlt(&p, &p, &x, &x) {
            // Any point on the optical axis satisfies both views.
            assert_relative_eq!(point.x, 0.0, epsilon = 1e-6);
            assert_relative_eq!(point.y, 0.0, epsilon = 1e-6);
        }
    }
}
