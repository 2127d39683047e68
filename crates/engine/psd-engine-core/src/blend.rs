//! Blending utilities for weighted-blend nodes.
//! - rigid blend: translation lerp, rotation slerp (shortest arc)
//! - sequential target blending: `out = lerp(out, target_i, weight_i)` in slot order

use nalgebra::Isometry3;

/// Blend two rigid transforms: translation lerp, rotation slerp.
#[inline]
pub fn blend_isometry(a: &Isometry3<f64>, b: &Isometry3<f64>, t: f64) -> Isometry3<f64> {
    a.lerp_slerp(b, t)
}

/// Compose weighted targets starting from `input`. Weights are clamped to [0, 1];
/// a zero weight leaves the running result untouched.
pub fn blend_targets<'a>(
    input: Isometry3<f64>,
    targets: impl IntoIterator<Item = (&'a Isometry3<f64>, f64)>,
) -> Isometry3<f64> {
    let mut out = input;
    for (target, weight) in targets {
        let w = weight.clamp(0.0, 1.0);
        if w == 0.0 {
            continue;
        }
        out = blend_isometry(&out, target, w);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{compose, to_isometry};
    use approx::assert_relative_eq;

    #[test]
    fn blend_half_translation() {
        let a = Isometry3::identity();
        let b = to_isometry(&compose([2.0, 0.0, -4.0], [0.0; 3]));
        let r = blend_isometry(&a, &b, 0.5);
        assert_relative_eq!(r.translation.vector.x, 1.0);
        assert_relative_eq!(r.translation.vector.z, -2.0);
    }

    #[test]
    fn blend_half_rotation_is_slerp() {
        let a = Isometry3::identity();
        let b = to_isometry(&compose([0.0; 3], [0.0, 0.0, 90.0]));
        let r = blend_isometry(&a, &b, 0.5);
        assert_relative_eq!(r.rotation.angle(), std::f64::consts::FRAC_PI_4, epsilon = 1e-9);
    }

    #[test]
    fn blend_takes_the_short_arc() {
        let a = to_isometry(&compose([0.0; 3], [0.0, 0.0, 170.0]));
        let b = to_isometry(&compose([0.0; 3], [0.0, 0.0, -170.0]));
        let r = blend_isometry(&a, &b, 0.5);
        assert_relative_eq!(r.rotation.angle(), std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn full_weight_selects_target() {
        let slot0 = to_isometry(&compose([1.0, 0.0, 0.0], [0.0; 3]));
        let slot1 = to_isometry(&compose([0.0, 3.0, 0.0], [0.0, 45.0, 0.0]));
        let out = blend_targets(Isometry3::identity(), [(&slot0, 0.0), (&slot1, 1.0)]);
        assert_relative_eq!(out.translation.vector.y, 3.0, epsilon = 1e-12);
        assert_relative_eq!(out.translation.vector.x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn weights_are_clamped() {
        let slot = to_isometry(&compose([4.0, 0.0, 0.0], [0.0; 3]));
        let over = blend_targets(Isometry3::identity(), [(&slot, 1.5)]);
        let under = blend_targets(Isometry3::identity(), [(&slot, -0.5)]);
        assert_relative_eq!(over.translation.vector.x, 4.0, epsilon = 1e-12);
        assert_relative_eq!(under.translation.vector.x, 0.0);
    }
}
