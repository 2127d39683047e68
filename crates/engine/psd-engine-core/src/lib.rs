//! psd-engine-core: the geometric engine a pose-space deformation rig runs on.
//!
//! [`GeometricEngine`] is the seam the authoring core talks to; [`SceneGraph`]
//! is a complete in-memory implementation (transforms, interpolation solvers,
//! weighted-blend nodes, undo chunks).

pub mod blend;
pub mod engine;
pub mod error;
pub mod math;
pub mod node;
pub mod scene;
pub mod solver;

pub use engine::GeometricEngine;
pub use error::{EngineError, EngineResult};
pub use math::{PoseVector, Vec3};
pub use node::{NodeId, NodeKind, SceneSpec, TransformSpec};
pub use scene::{SceneGraph, SceneState};
pub use solver::{Interpolation, PoseType};
