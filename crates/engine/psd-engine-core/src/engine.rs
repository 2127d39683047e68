//! The capabilities a pose-space rig needs from its host scene.
//!
//! Node identifiers are plain names. Mutating calls are expected to be
//! recorded into the innermost open undo chunk so a caller can revert a whole
//! operation with [`GeometricEngine::undo_chunk`].

use nalgebra::Matrix4;

use crate::error::EngineResult;
use crate::math::PoseVector;
use crate::node::NodeId;
use crate::solver::{Interpolation, PoseType};

pub trait GeometricEngine {
    // --- undo ---------------------------------------------------------------

    /// Start recording edits. Chunks nest.
    fn open_undo_chunk(&mut self);
    /// Keep every edit made since the matching `open_undo_chunk`.
    fn close_undo_chunk(&mut self);
    /// Revert every edit made since the matching `open_undo_chunk` and close it.
    fn undo_chunk(&mut self);

    // --- nodes --------------------------------------------------------------

    fn exists(&self, node: &str) -> bool;
    fn create_transform(&mut self, name: &str, parent: Option<&str>) -> EngineResult<NodeId>;
    /// Delete a node and everything parented beneath it; connections touching
    /// deleted nodes are broken.
    fn delete_node(&mut self, node: &str) -> EngineResult<()>;
    fn parent_of(&self, node: &str) -> EngineResult<Option<NodeId>>;
    /// Re-parent keeping the world placement (`None` = top-level scope).
    fn reparent(&mut self, node: &str, parent: Option<&str>) -> EngineResult<()>;

    // --- transforms ---------------------------------------------------------

    fn local_pose(&self, node: &str) -> EngineResult<PoseVector>;
    fn set_local_pose(&mut self, node: &str, pose: PoseVector) -> EngineResult<()>;
    /// Evaluated world matrix, including any blend output feeding the chain.
    fn world_matrix(&self, node: &str) -> EngineResult<Matrix4<f64>>;
    fn set_world_matrix(&mut self, node: &str, matrix: &Matrix4<f64>) -> EngineResult<()>;
    /// World matrix of the node's own rest channels, ignoring a blend feeding it.
    fn rest_world_matrix(&self, node: &str) -> EngineResult<Matrix4<f64>>;
    fn flag(&self, node: &str, attr: &str) -> EngineResult<bool>;

    // --- interpolation solver -----------------------------------------------

    fn create_solver(
        &mut self,
        name: &str,
        driver: &str,
        parent: Option<&str>,
    ) -> EngineResult<NodeId>;
    fn set_interpolation(&mut self, solver: &str, mode: Interpolation) -> EngineResult<()>;
    /// Register a pose sampled from the driver's current local channels.
    /// Returns its index; indices are dense and follow insertion order.
    fn add_pose(&mut self, solver: &str, pose: &str) -> EngineResult<usize>;
    fn set_pose_type(&mut self, solver: &str, index: usize, kind: PoseType) -> EngineResult<()>;
    /// Re-sample the driver into an existing pose and recompute its falloff.
    fn update_pose(&mut self, solver: &str, pose: &str) -> EngineResult<usize>;
    fn recompute_falloff(&mut self, solver: &str, pose: &str) -> EngineResult<()>;
    /// Remove a pose. Later poses shift down one index and weight links that
    /// read them are renumbered.
    fn delete_pose(&mut self, solver: &str, pose: &str) -> EngineResult<usize>;
    fn pose_names(&self, solver: &str) -> EngineResult<Vec<String>>;
    fn solver_weights(&self, solver: &str) -> EngineResult<Vec<f64>>;

    fn pose_index(&self, solver: &str, pose: &str) -> EngineResult<Option<usize>> {
        Ok(self
            .pose_names(solver)?
            .iter()
            .position(|name| name == pose))
    }

    // --- weighted blend -----------------------------------------------------

    fn create_blend(&mut self, name: &str) -> EngineResult<NodeId>;
    fn blend_target_count(&self, blend: &str) -> EngineResult<usize>;
    /// Write slot `index`. `index == count` appends a slot.
    fn set_blend_target_matrix(
        &mut self,
        blend: &str,
        index: usize,
        matrix: &Matrix4<f64>,
    ) -> EngineResult<()>;
    fn blend_target_matrix(&self, blend: &str, index: usize) -> EngineResult<Matrix4<f64>>;
    /// Drive slot `index`'s weight from `solver` output `output`.
    /// `index == count` appends an identity slot.
    fn connect_weight(
        &mut self,
        solver: &str,
        output: usize,
        blend: &str,
        index: usize,
    ) -> EngineResult<()>;
    /// Remove slot `index`; later slots shift down one.
    fn remove_blend_target(&mut self, blend: &str, index: usize) -> EngineResult<()>;
    /// Feed the blend output (decomposed) into the transform's channels.
    fn connect_blend_output(&mut self, blend: &str, transform: &str) -> EngineResult<()>;
    fn blend_driving(&self, transform: &str) -> EngineResult<Option<NodeId>>;
    /// Blend nodes with at least one slot weighted by `solver`.
    fn blends_weighted_by(&self, solver: &str) -> Vec<NodeId>;
}
