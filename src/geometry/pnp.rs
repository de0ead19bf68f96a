//! PnP (Perspective-n-Point) solver: linear DLT inside RANSAC.

use nalgebra::{DMatrix, Matrix3, Matrix3x4, Matrix4, Point2, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use super::ransac::{draw_sample, RansacConfig};
use super::solver::{PoseEstimator, SolverError};
use super::{Intrinsics, SE3};

/// Correspondences needed for one DLT hypothesis.
const MINIMAL_SAMPLE: usize = 6;

/// DLT-based [`PoseEstimator`]. Returns the world-to-camera pose.
#[derive(Debug, Clone, Default)]
pub struct DltPoseEstimator {
    pub ransac: RansacConfig,
}

impl DltPoseEstimator {
    pub fn new(ransac: RansacConfig) -> Self {
        Self { ransac }
    }
}

/// Result of a PnP solve with its inlier set.
#[derive(Debug, Clone)]
pub struct PnPResult {
    /// Estimated world-to-camera pose.
    pub pose: SE3,
    /// Inlier mask per correspondence.
    pub inlier_mask: Vec<bool>,
    /// Reprojection error per correspondence (in pixels).
    pub reproj_errors: Vec<f64>,
}

impl PnPResult {
    pub fn num_inliers(&self) -> usize {
        self.inlier_mask.iter().filter(|&&m| m).count()
    }
}

impl PoseEstimator for DltPoseEstimator {
    fn estimate(
        &self,
        points_3d: &[Vector3<f64>],
        points_2d: &[Point2<f64>],
        intrinsics: &Intrinsics,
    ) -> Result<SE3, SolverError> {
        self.solve_detailed(points_3d, points_2d, intrinsics)
            .map(|r| r.pose)
    }
}

impl DltPoseEstimator {
    /// Solve PnP with RANSAC and report the per-correspondence inlier mask.
    pub fn solve_detailed(
        &self,
        points_3d: &[Vector3<f64>],
        points_2d: &[Point2<f64>],
        intrinsics: &Intrinsics,
    ) -> Result<PnPResult, SolverError> {
        if points_3d.len() != points_2d.len() {
            return Err(SolverError::LengthMismatch {
                left: points_3d.len(),
                right: points_2d.len(),
            });
        }
        let n = points_3d.len();
        if n < MINIMAL_SAMPLE {
            return Err(SolverError::NotEnoughPoints {
                got: n,
                need: MINIMAL_SAMPLE,
            });
        }

        // DLT on normalised image coordinates, so K drops out of P.
        let image: Vec<Point2<f64>> = points_2d
            .iter()
            .map(|p| {
                let v = intrinsics.normalize(p);
                Point2::new(v.x, v.y)
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.ransac.seed);
        let mut best: Option<(SE3, Vec<bool>)> = None;
        let mut best_count = 0usize;

        for _ in 0..self.ransac.max_iterations {
            let sample = draw_sample(&mut rng, n, MINIMAL_SAMPLE);
            let Some(pose) = dlt_pose(points_3d, &image, &sample) else {
                continue;
            };
            let (mask, _) = score(&pose, points_3d, points_2d, intrinsics, self.ransac.threshold_px);
            let count = mask.iter().filter(|&&m| m).count();
            if count > best_count {
                best_count = count;
                best = Some((pose, mask));
                if count == n {
                    break;
                }
            }
        }

        let need = self.ransac.required_inliers(n, MINIMAL_SAMPLE);
        let Some((_, mask)) = best.filter(|_| best_count >= need) else {
            return Err(SolverError::NoConsensus {
                inliers: best_count,
                need,
            });
        };

        let inliers: Vec<usize> = (0..n).filter(|&i| mask[i]).collect();
        let pose = dlt_pose(points_3d, &image, &inliers)
            .ok_or(SolverError::Degenerate("DLT refit on inliers failed"))?;
        let (inlier_mask, reproj_errors) =
            score(&pose, points_3d, points_2d, intrinsics, self.ransac.threshold_px);

        let result = PnPResult {
            pose,
            inlier_mask,
            reproj_errors,
        };
        debug!(
            correspondences = n,
            inliers = result.num_inliers(),
            "PnP solved"
        );
        Ok(result)
    }
}

/// Inlier mask and pixel reprojection error of every correspondence.
/// Points behind the camera are outliers with infinite error.
fn score(
    pose: &SE3,
    points_3d: &[Vector3<f64>],
    points_2d: &[Point2<f64>],
    intrinsics: &Intrinsics,
    threshold_px: f64,
) -> (Vec<bool>, Vec<f64>) {
    points_3d
        .iter()
        .zip(points_2d)
        .map(|(x, obs)| {
            let p_cam = pose.transform_point(x);
            if p_cam.z <= 0.0 {
                return (false, f64::INFINITY);
            }
            match intrinsics.project(&p_cam) {
                Some(px) => {
                    let err = (px - obs).norm();
                    (err < threshold_px, err)
                }
                None => (false, f64::INFINITY),
            }
        })
        .unzip()
}

/// Similarity normalisation of 3D points: centroid to the origin,
/// mean distance sqrt(3).
fn normalizing_transform_3d(points: &[Vector3<f64>], subset: &[usize]) -> Matrix4<f64> {
    let m = subset.len() as f64;
    let centroid = subset.iter().map(|&i| points[i]).sum::<Vector3<f64>>() / m;
    let mean_dist = subset
        .iter()
        .map(|&i| (points[i] - centroid).norm())
        .sum::<f64>()
        / m;
    let s = if mean_dist > f64::EPSILON {
        3f64.sqrt() / mean_dist
    } else {
        1.0
    };
    let mut t = Matrix4::identity() * s;
    t[(3, 3)] = 1.0;
    t.fixed_view_mut::<3, 1>(0, 3).copy_from(&(-s * centroid));
    t
}

/// Direct linear transform for `P = [R | t]` from normalised image points.
fn dlt_pose(points_3d: &[Vector3<f64>], image: &[Point2<f64>], subset: &[usize]) -> Option<SE3> {
    if subset.len() < MINIMAL_SAMPLE {
        return None;
    }
    let t3 = normalizing_transform_3d(points_3d, subset);

    // Pad to at least 12 rows so the SVD yields the full right singular basis.
    let rows = (2 * subset.len()).max(12);
    let mut a = DMatrix::<f64>::zeros(rows, 12);
    for (r, &i) in subset.iter().enumerate() {
        let xh = t3 * points_3d[i].push(1.0);
        let (x, y, z, w) = (xh.x, xh.y, xh.z, xh.w);
        let (u, v) = (image[i].x, image[i].y);
        let row_u = [x, y, z, w, 0.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u * z, -u * w];
        let row_v = [0.0, 0.0, 0.0, 0.0, x, y, z, w, -v * x, -v * y, -v * z, -v * w];
        for c in 0..12 {
            a[(2 * r, c)] = row_u[c];
            a[(2 * r + 1, c)] = row_v[c];
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let k = svd.singular_values.imin();
    let p = v_t.row(k);
    let p_norm = Matrix3x4::from_row_slice(&[
        p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10], p[11],
    ]);

    let mut proj = p_norm * t3;
    let m: Matrix3<f64> = proj.fixed_view::<3, 3>(0, 0).into_owned();
    if m.determinant() < 0.0 {
        proj = -proj;
    }
    let m: Matrix3<f64> = proj.fixed_view::<3, 3>(0, 0).into_owned();

    let svd_m = m.svd(true, true);
    let u = svd_m.u?;
    let vt = svd_m.v_t?;
    let scale = svd_m.singular_values.mean();
    if scale < f64::EPSILON {
        return None;
    }
    let rotation = u * vt;
    let translation: Vector3<f64> = proj.column(3).into_owned() / scale;
    Some(SE3::from_rt(rotation, translation))
}
