//! Transform math shared by the engine and its callers.
//!
//! Conventions:
//! - column vectors, so `parent_world * local == world`
//! - rotations are Euler angles in degrees, XYZ order (`Rz * Ry * Rx`)
//! - only translation and rotation are modelled; there is no scale or shear

use nalgebra::{Isometry3, Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

pub type Vec3 = [f64; 3];

/// Local translation + rotation channels of a transform node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseVector {
    #[serde(rename = "t")]
    pub translation: Vec3,
    #[serde(rename = "r")]
    pub rotation: Vec3,
}

impl PoseVector {
    pub const IDENTITY: PoseVector = PoseVector {
        translation: [0.0; 3],
        rotation: [0.0; 3],
    };

    pub fn new(translation: Vec3, rotation: Vec3) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn to_matrix(&self) -> Matrix4<f64> {
        compose(self.translation, self.rotation)
    }

    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let (translation, rotation) = decompose(m);
        Self {
            translation,
            rotation,
        }
    }

    /// Flattened `[tx, ty, tz, rx, ry, rz]`, the layout used by pose tables.
    pub fn as_array(&self) -> [f64; 6] {
        let t = self.translation;
        let r = self.rotation;
        [t[0], t[1], t[2], r[0], r[1], r[2]]
    }

    /// Solver-space sample: translation as-is, rotation in radians.
    pub fn sample(&self) -> [f64; 6] {
        let t = self.translation;
        let r = self.rotation;
        [
            t[0],
            t[1],
            t[2],
            r[0].to_radians(),
            r[1].to_radians(),
            r[2].to_radians(),
        ]
    }
}

pub fn identity() -> Matrix4<f64> {
    Matrix4::identity()
}

pub fn rotation_from_degrees(rotation: Vec3) -> Rotation3<f64> {
    Rotation3::from_euler_angles(
        rotation[0].to_radians(),
        rotation[1].to_radians(),
        rotation[2].to_radians(),
    )
}

/// Build a rigid 4x4 matrix from translation and XYZ Euler degrees.
pub fn compose(translation: Vec3, rotation: Vec3) -> Matrix4<f64> {
    let iso = Isometry3::from_parts(
        Translation3::new(translation[0], translation[1], translation[2]),
        UnitQuaternion::from_rotation_matrix(&rotation_from_degrees(rotation)),
    );
    iso.to_homogeneous()
}

/// Split a rigid 4x4 matrix into translation and XYZ Euler degrees.
pub fn decompose(m: &Matrix4<f64>) -> (Vec3, Vec3) {
    let translation = [m[(0, 3)], m[(1, 3)], m[(2, 3)]];
    let (rx, ry, rz) = rotation_part(m).euler_angles();
    let rotation = [
        clean(rx.to_degrees()),
        clean(ry.to_degrees()),
        clean(rz.to_degrees()),
    ];
    (
        [clean(translation[0]), clean(translation[1]), clean(translation[2])],
        rotation,
    )
}

pub fn inverse(m: &Matrix4<f64>) -> Option<Matrix4<f64>> {
    m.try_inverse()
}

pub fn to_isometry(m: &Matrix4<f64>) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]),
        UnitQuaternion::from_rotation_matrix(&rotation_part(m)),
    )
}

fn rotation_part(m: &Matrix4<f64>) -> Rotation3<f64> {
    let basis: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
    Rotation3::from_matrix_unchecked(basis)
}

/// Flush values within rounding noise of zero, and turn `-0.0` into `0.0`.
fn clean(v: f64) -> f64 {
    if v.abs() < 1e-12 {
        0.0
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compose_decompose_recovers_channels() {
        let m = compose([1.0, -2.0, 3.5], [10.0, 20.0, -30.0]);
        let (t, r) = decompose(&m);
        assert_relative_eq!(t[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(t[1], -2.0, epsilon = 1e-9);
        assert_relative_eq!(t[2], 3.5, epsilon = 1e-9);
        assert_relative_eq!(r[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(r[1], 20.0, epsilon = 1e-9);
        assert_relative_eq!(r[2], -30.0, epsilon = 1e-9);
    }

    #[test]
    fn rotation_order_is_x_then_y_then_z() {
        // rotate +X by 90 about Z: lands on +Y regardless of X/Y channels being zero
        let m = compose([0.0; 3], [0.0, 0.0, 90.0]);
        let p = m * nalgebra::Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);

        let xyz = compose([0.0; 3], [90.0, 0.0, 90.0]);
        let expected = compose([0.0; 3], [0.0, 0.0, 90.0]) * compose([0.0; 3], [90.0, 0.0, 0.0]);
        assert_relative_eq!(xyz, expected, epsilon = 1e-12);
    }

    #[test]
    fn identity_decomposes_to_zero() {
        let (t, r) = decompose(&identity());
        assert_eq!(t, [0.0; 3]);
        assert_eq!(r, [0.0; 3]);
    }

    #[test]
    fn sample_converts_rotation_to_radians() {
        let p = PoseVector::new([1.0, 2.0, 3.0], [180.0, 0.0, 90.0]);
        let s = p.sample();
        assert_relative_eq!(s[3], std::f64::consts::PI);
        assert_relative_eq!(s[5], std::f64::consts::FRAC_PI_2);
        assert_eq!(p.as_array(), [1.0, 2.0, 3.0, 180.0, 0.0, 90.0]);
    }
}
