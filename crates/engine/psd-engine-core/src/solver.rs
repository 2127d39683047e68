//! Interpolation solver: per-pose activation weights from a live pose sample.
//!
//! Gaussian radial basis functions with a per-pose falloff. The kernel matrix is
//! inverted so that a sample sitting exactly on pose `i` yields weight 1 for `i`
//! and 0 for every other pose.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Interpolation kernels a solver can run. Only one is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Gaussian,
}

/// Pose classification. `Swing` is the only one rigs register with; new
/// solver entries start as `SwingAndTwist` until the caller sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseType {
    #[default]
    SwingAndTwist,
    Swing,
}

pub const DEFAULT_FALLOFF: f64 = 1.0;
const MIN_FALLOFF: f64 = 1e-6;

/// A pose registered on a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverPose {
    pub name: String,
    pub sample: [f64; 6],
    pub falloff: f64,
    pub pose_type: PoseType,
}

fn distance_sq(a: &[f64; 6], b: &[f64; 6]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn gaussian(d2: f64, falloff: f64) -> f64 {
    (-d2 / (2.0 * falloff * falloff)).exp()
}

/// Kernel width for `poses[index]`: distance to its nearest neighbour, or
/// [`DEFAULT_FALLOFF`] when it stands alone.
pub fn compute_falloff(poses: &[SolverPose], index: usize) -> f64 {
    let Some(me) = poses.get(index) else {
        return DEFAULT_FALLOFF;
    };
    let nearest = poses
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, p)| distance_sq(&me.sample, &p.sample).sqrt())
        .filter(|d| *d > MIN_FALLOFF)
        .fold(f64::INFINITY, f64::min);
    if nearest.is_finite() {
        nearest
    } else {
        DEFAULT_FALLOFF
    }
}

/// Activation weights for every pose (index-aligned with `poses`), each in [0, 1].
pub fn evaluate(poses: &[SolverPose], sample: &[f64; 6]) -> Vec<f64> {
    let n = poses.len();
    if n == 0 {
        return Vec::new();
    }
    let phi = DVector::from_fn(n, |j, _| {
        gaussian(distance_sq(sample, &poses[j].sample), poses[j].falloff)
    });
    let kernel = DMatrix::from_fn(n, n, |i, j| {
        gaussian(
            distance_sq(&poses[i].sample, &poses[j].sample),
            poses[j].falloff,
        )
    });
    let raw = match kernel.try_inverse() {
        // w^T = phi^T * K^-1
        Some(inv) => inv.transpose() * phi,
        None => phi,
    };
    raw.iter().map(|w| w.clamp(0.0, 1.0)).collect()
}
