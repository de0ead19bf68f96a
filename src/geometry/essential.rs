//! Two-view relative pose from the essential matrix.
//!
//! Normalised eight-point algorithm inside RANSAC, followed by the four-way
//! decomposition of E and a cheirality vote over the inliers.

use nalgebra::{DMatrix, Matrix3, Matrix3x4, Point2, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::ransac::{draw_sample, RansacConfig};
use super::solver::{SolverError, TwoViewEstimator};
use super::triangulation::triangulate_dlt;
use super::{Intrinsics, SE3};

/// Points needed for one essential-matrix hypothesis.
const MINIMAL_SAMPLE: usize = 8;

/// Essential-matrix based [`TwoViewEstimator`].
#[derive(Debug, Clone, Default)]
pub struct EssentialTwoViewEstimator {
    pub ransac: RansacConfig,
}

impl EssentialTwoViewEstimator {
    pub fn new(ransac: RansacConfig) -> Self {
        Self { ransac }
    }
}

impl TwoViewEstimator for EssentialTwoViewEstimator {
    fn estimate(
        &self,
        points_a: &[Point2<f64>],
        points_b: &[Point2<f64>],
        intrinsics_a: &Intrinsics,
        intrinsics_b: &Intrinsics,
    ) -> Result<SE3, SolverError> {
        if points_a.len() != points_b.len() {
            return Err(SolverError::LengthMismatch {
                left: points_a.len(),
                right: points_b.len(),
            });
        }
        let n = points_a.len();
        if n < MINIMAL_SAMPLE {
            return Err(SolverError::NotEnoughPoints {
                got: n,
                need: MINIMAL_SAMPLE,
            });
        }

        let xa: Vec<Vector2<f64>> = points_a.iter().map(|p| intrinsics_a.normalize(p)).collect();
        let xb: Vec<Vector2<f64>> = points_b.iter().map(|p| intrinsics_b.normalize(p)).collect();

        // Pixel threshold expressed in normalised image units, squared for Sampson.
        let focal = 0.5 * (intrinsics_a.mean_focal() + intrinsics_b.mean_focal());
        let threshold = self.ransac.threshold_px / focal;
        let threshold_sq = threshold * threshold;

        let mut rng = StdRng::seed_from_u64(self.ransac.seed);
        let mut best_inliers: Vec<usize> = Vec::new();

        for _ in 0..self.ransac.max_iterations {
            let sample = draw_sample(&mut rng, n, MINIMAL_SAMPLE);
            let Some(e) = eight_point(&xa, &xb, &sample) else {
                continue;
            };
            let inliers: Vec<usize> = (0..n)
                .filter(|&i| sampson_error(&e, &xa[i], &xb[i]) < threshold_sq)
                .collect();
            if inliers.len() > best_inliers.len() {
                best_inliers = inliers;
                if best_inliers.len() == n {
                    break;
                }
            }
        }

        let need = self.ransac.required_inliers(n, MINIMAL_SAMPLE);
        if best_inliers.len() < need {
            return Err(SolverError::NoConsensus {
                inliers: best_inliers.len(),
                need,
            });
        }

        let e = eight_point(&xa, &xb, &best_inliers)
            .ok_or(SolverError::Degenerate("essential refit on inliers failed"))?;

        let (pose, in_front) = recover_pose(&e, &xa, &xb, &best_inliers);
        debug!(
            inliers = best_inliers.len(),
            in_front, "two-view pose recovered"
        );
        if in_front == 0 {
            return Err(SolverError::Degenerate("no pose candidate passes cheirality"));
        }
        Ok(pose)
    }
}

/// Isotropic normalisation: centroid to the origin, mean distance sqrt(2).
fn normalizing_transform(points: &[Vector2<f64>], subset: &[usize]) -> Matrix3<f64> {
    let m = subset.len() as f64;
    let centroid = subset.iter().map(|&i| points[i]).sum::<Vector2<f64>>() / m;
    let mean_dist = subset
        .iter()
        .map(|&i| (points[i] - centroid).norm())
        .sum::<f64>()
        / m;
    let s = if mean_dist > f64::EPSILON {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * centroid.x, 0.0, s, -s * centroid.y, 0.0, 0.0, 1.0)
}

/// Linear essential matrix from normalised correspondences, projected onto
/// the essential manifold (singular values `1, 1, 0`).
fn eight_point(xa: &[Vector2<f64>], xb: &[Vector2<f64>], subset: &[usize]) -> Option<Matrix3<f64>> {
    if subset.len() < MINIMAL_SAMPLE {
        return None;
    }
    let ta = normalizing_transform(xa, subset);
    let tb = normalizing_transform(xb, subset);

    // Pad to at least 9 rows so the SVD yields the full right singular basis.
    let rows = subset.len().max(9);
    let mut a = DMatrix::<f64>::zeros(rows, 9);
    for (r, &i) in subset.iter().enumerate() {
        let pa = ta * xa[i].push(1.0);
        let pb = tb * xb[i].push(1.0);
        let (u1, v1) = (pa.x / pa.z, pa.y / pa.z);
        let (u2, v2) = (pb.x / pb.z, pb.y / pb.z);
        let row = [u2 * u1, u2 * v1, u2, v2 * u1, v2 * v1, v2, u1, v1, 1.0];
        for (c, value) in row.iter().enumerate() {
            a[(r, c)] = *value;
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let k = svd.singular_values.imin();
    let e = v_t.row(k);
    let e_norm = Matrix3::new(e[0], e[1], e[2], e[3], e[4], e[5], e[6], e[7], e[8]);

    let e_raw = tb.transpose() * e_norm * ta;
    let (u, _, v_t) = svd3_sorted(&e_raw)?;
    let e = u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.0)) * v_t;
    if e.norm() < f64::EPSILON {
        return None;
    }
    Some(e)
}

/// First-order geometric error of `xb^T E xa = 0`.
fn sampson_error(e: &Matrix3<f64>, xa: &Vector2<f64>, xb: &Vector2<f64>) -> f64 {
    let a = xa.push(1.0);
    let b = xb.push(1.0);
    let ea = e * a;
    let etb = e.transpose() * b;
    let num = b.dot(&ea);
    let den = ea.x * ea.x + ea.y * ea.y + etb.x * etb.x + etb.y * etb.y;
    if den < f64::EPSILON {
        return f64::INFINITY;
    }
    num * num / den
}

/// SVD of a 3x3 matrix with singular values in descending order.
pub(crate) fn svd3_sorted(m: &Matrix3<f64>) -> Option<(Matrix3<f64>, Vector3<f64>, Matrix3<f64>)> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let s = svd.singular_values;

    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));

    let mut u_sorted = Matrix3::zeros();
    let mut v_t_sorted = Matrix3::zeros();
    let mut s_sorted = Vector3::zeros();
    for (dst, &src) in order.iter().enumerate() {
        u_sorted.set_column(dst, &u.column(src));
        v_t_sorted.set_row(dst, &v_t.row(src));
        s_sorted[dst] = s[src];
    }
    Some((u_sorted, s_sorted, v_t_sorted))
}

/// Pick the (R, t) of the four decompositions of E that places the most
/// inliers in front of both cameras. Returns the pose and that count.
fn recover_pose(
    e: &Matrix3<f64>,
    xa: &[Vector2<f64>],
    xb: &[Vector2<f64>],
    inliers: &[usize],
) -> (SE3, usize) {
    let Some((mut u, _, mut v_t)) = svd3_sorted(e) else {
        return (SE3::identity(), 0);
    };
    if u.determinant() < 0.0 {
        u = -u;
    }
    if v_t.determinant() < 0.0 {
        v_t = -v_t;
    }

    #[rustfmt::skip]
    let w = Matrix3::new(
        0.0, -1.0, 0.0,
        1.0,  0.0, 0.0,
        0.0,  0.0, 1.0,
    );
    let r1 = u * w * v_t;
    let r2 = u * w.transpose() * v_t;
    let t: Vector3<f64> = u.column(2).into_owned();

    let candidates = [(r1, t), (r1, -t), (r2, t), (r2, -t)];
    let first = SE3::identity().to_matrix3x4();

    let mut best = (SE3::identity(), 0usize);
    for (r, t) in candidates {
        let pose = SE3::from_rt(r, t);
        let second: Matrix3x4<f64> = pose.to_matrix3x4();
        let in_front = inliers
            .iter()
            .filter(|&&i| {
                let pa = Point2::new(xa[i].x, xa[i].y);
                let pb = Point2::new(xb[i].x, xb[i].y);
                match triangulate_dlt(&first, &second, &pa, &pb) {
                    Some(x) => x.z > 0.0 && pose.transform_point(&x).z > 0.0,
                    None => false,
                }
            })
            .count();
        if in_front > best.1 {
            best = (pose, in_front);
        }
    }
    best
}
