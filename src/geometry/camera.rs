//! Pinhole intrinsics, per-view keypoints and the registered/unregistered
//! camera record owned by the reconstruction.

use nalgebra::{Matrix3, Matrix3x4, Point2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use super::SE3;
use crate::map::ViewId;

/// Pinhole camera intrinsics (no distortion).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// The 3x3 calibration matrix K.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Pixel → normalised image coordinates (`K^-1 [u v 1]^T`, dropping the 1).
    pub fn normalize(&self, pixel: &Point2<f64>) -> Vector2<f64> {
        Vector2::new(
            (pixel.x - self.cx) / self.fx,
            (pixel.y - self.cy) / self.fy,
        )
    }

    /// Camera-frame point → pixel. Returns `None` for points on the camera plane.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z.abs() < f64::EPSILON {
            return None;
        }
        Some(Point2::new(
            self.fx * p_cam.x / p_cam.z + self.cx,
            self.fy * p_cam.y / p_cam.z + self.cy,
        ))
    }

    /// Mean focal length, used to convert pixel thresholds into normalised units.
    pub fn mean_focal(&self) -> f64 {
        0.5 * (self.fx + self.fy)
    }
}

/// A detected feature in one view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    /// Pixel position.
    pub pt: Point2<f64>,
    /// Optional RGB color sampled at the keypoint, in `[0, 1]`.
    pub color: Option<Vector3<f32>>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            pt: Point2::new(x, y),
            color: None,
        }
    }

    pub fn with_color(mut self, color: Vector3<f32>) -> Self {
        self.color = Some(color);
        self
    }
}

/// Input description of one view, handed over by the feature service.
#[derive(Debug, Clone)]
pub struct View {
    pub intrinsics: Intrinsics,
    pub keypoints: Vec<Keypoint>,
}

impl View {
    pub fn new(intrinsics: Intrinsics, keypoints: Vec<Keypoint>) -> Self {
        Self {
            intrinsics,
            keypoints,
        }
    }
}

/// One camera of the reconstruction.
///
/// Created unregistered for every input view; the pose is written exactly
/// once, at bootstrap or at successful registration.
#[derive(Debug, Clone)]
pub struct Camera {
    pub id: ViewId,
    pub intrinsics: Intrinsics,
    /// World-to-camera pose. Meaningless while `registered` is false.
    pub pose: SE3,
    pub registered: bool,
    pub keypoints: Vec<Keypoint>,
}

impl Camera {
    pub fn new(id: ViewId, view: View) -> Self {
        Self {
            id,
            intrinsics: view.intrinsics,
            pose: SE3::identity(),
            registered: false,
            keypoints: view.keypoints,
        }
    }

    /// Set the pose and mark the camera registered.
    pub fn register(&mut self, pose: SE3) {
        self.pose = pose;
        self.registered = true;
    }

    /// Pixel position of a feature, if the index is valid.
    pub fn keypoint(&self, feature: usize) -> Option<&Point2<f64>> {
        self.keypoints.get(feature).map(|kp| &kp.pt)
    }

    /// Projection matrix `P = K [R | t]` in pixel units.
    pub fn projection_matrix(&self) -> Matrix3x4<f64> {
        self.intrinsics.matrix() * self.pose.to_matrix3x4()
    }

    /// Camera centre in world coordinates.
    pub fn center(&self) -> Vector3<f64> {
        self.pose.center()
    }

    /// Signed depth of a world point along the principal axis.
    pub fn depth_of(&self, p_world: &Vector3<f64>) -> f64 {
        self.pose.transform_point(p_world).z
    }

    /// Project a world point to pixels.
    pub fn project(&self, p_world: &Vector3<f64>) -> Option<Point2<f64>> {
        self.intrinsics.project(&self.pose.transform_point(p_world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn intrinsics() -> Intrinsics {
        Intrinsics::new(800.0, 780.0, 320.0, 240.0)
    }

    #[test]
    fn test_normalize_inverts_projection() {
        let k = intrinsics();
        let p_cam = Vector3::new(0.3, -0.2, 4.0);
        let px = k.project(&p_cam).unwrap();
        let n = k.normalize(&px);
        assert_relative_eq!(n.x, 0.3 / 4.0, epsilon = 1e-12);
        assert_relative_eq!(n.y, -0.2 / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projection_matrix_matches_project() {
        let mut cam = Camera::new(ViewId::new(0), View::new(intrinsics(), Vec::new()));
        cam.register(SE3::from_rt(
            nalgebra::Matrix3::identity(),
            Vector3::new(-1.0, 0.0, 0.0),
        ));

        let p = Vector3::new(0.5, 0.5, 6.0);
        let h = cam.projection_matrix() * p.push(1.0);
        let direct = cam.project(&p).unwrap();
        assert_relative_eq!(h.x / h.z, direct.x, epsilon = 1e-9);
        assert_relative_eq!(h.y / h.z, direct.y, epsilon = 1e-9);
        assert_relative_eq!(cam.depth_of(&p), 6.0, epsilon = 1e-12);
        assert_relative_eq!(cam.center(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_point_on_camera_plane_does_not_project() {
        assert!(intrinsics().project(&Vector3::new(1.0, 1.0, 0.0)).is_none());
    }
}
