//! SE3: 6-DOF rigid transformation (rotation + translation).
//!
//! Camera poses in this crate are stored as world-to-camera transforms
//! (`T_cw`), so `p_cam = R * p_world + t`. This is the form returned by the
//! two-view and PnP estimators and the one that plugs directly into a
//! projection matrix `K [R | t]`.

use nalgebra::{Matrix3, Matrix3x4, Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Rigid transformation: `p' = R * p + t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from a rotation matrix and translation.
    ///
    /// The matrix is re-orthonormalised through the quaternion conversion.
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rot3 = Rotation3::from_matrix(&rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot3),
            translation,
        }
    }

    /// Inverse transformation: `[R^T | -R^T t]`.
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Compose two transforms: `self ∘ other`.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a single point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Rotation as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// The `[R | t]` block used to build projection matrices.
    pub fn to_matrix3x4(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        rt.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        rt
    }

    /// Position of the origin of this frame expressed in the target frame
    /// of the inverse, i.e. the camera centre for a `T_cw` pose.
    pub fn center(&self) -> Vector3<f64> {
        -(self.rotation.inverse() * self.translation)
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quarter_turn_z() -> SE3 {
        SE3 {
            rotation: UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                std::f64::consts::FRAC_PI_2,
            ),
            translation: Vector3::new(1.0, 2.0, 3.0),
        }
    }

    #[test]
    fn test_inverse_roundtrip() {
        let pose = quarter_turn_z();
        let p = Vector3::new(0.5, -1.0, 4.0);
        let back = pose.inverse().transform_point(&pose.transform_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-12);
    }

    #[test]
    fn test_compose_with_inverse_is_identity() {
        let pose = quarter_turn_z();
        let composed = pose.compose(&pose.inverse());
        assert_relative_eq!(composed.translation.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(composed.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_center_maps_to_camera_origin() {
        let pose = quarter_turn_z();
        let c = pose.center();
        assert_relative_eq!(pose.transform_point(&c), Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn test_matrix3x4_layout() {
        let pose = quarter_turn_z();
        let rt = pose.to_matrix3x4();
        let p = Vector3::new(1.0, 1.0, 1.0);
        let via_matrix = rt * p.push(1.0);
        assert_relative_eq!(via_matrix, pose.transform_point(&p), epsilon = 1e-12);
    }
}
