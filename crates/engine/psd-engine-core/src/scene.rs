//! In-memory [`GeometricEngine`]: a named node graph with transform
//! evaluation, interpolation solvers and weighted-blend nodes.
//!
//! Undo chunks are whole-state snapshots; a fault can be armed to make the
//! n-th call of a named operation fail, which is how rollback is exercised.

use hashbrown::HashMap;
use log::{debug, warn};
use nalgebra::{Isometry3, Matrix4};

use crate::blend::blend_targets;
use crate::engine::GeometricEngine;
use crate::error::{EngineError, EngineResult};
use crate::math::{self, PoseVector};
use crate::node::{
    BlendNode, BlendTarget, Node, NodeData, NodeId, NodeKind, SceneSpec, SolverNode,
    TransformNode, WeightLink,
};
use crate::solver::{self, Interpolation, PoseType, SolverPose, DEFAULT_FALLOFF};

/// Everything an undo chunk restores.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneState {
    nodes: HashMap<NodeId, Node>,
}

impl SceneState {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn names(&self) -> Vec<NodeId> {
        let mut names: Vec<NodeId> = self.nodes.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone)]
struct FaultPlan {
    op: String,
    remaining: usize,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    state: SceneState,
    undo: Vec<SceneState>,
    fault: Option<FaultPlan>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from transform descriptions. Parents must be listed
    /// before their children.
    pub fn from_spec(spec: &SceneSpec) -> EngineResult<Self> {
        let mut scene = Self::new();
        for node in &spec.nodes {
            scene.create_transform(&node.name, node.parent.as_deref())?;
            scene.set_local_pose(&node.name, PoseVector::new(node.translation, node.rotation))?;
            for (attr, value) in &node.attributes {
                scene.set_attribute(&node.name, attr, *value)?;
            }
        }
        Ok(scene)
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn kind_of(&self, name: &str) -> Option<NodeKind> {
        self.state.nodes.get(name).map(Node::kind)
    }

    pub fn children(&self, name: &str) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .state
            .nodes
            .iter()
            .filter(|(_, n)| n.parent.as_deref() == Some(name))
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        out
    }

    pub fn set_attribute(&mut self, node: &str, attr: &str, value: bool) -> EngineResult<()> {
        self.check_fault("set_attribute")?;
        self.transform_mut("set_attribute", node)?
            .attributes
            .insert(attr.to_string(), value);
        Ok(())
    }

    /// Make the `nth` (1-based) upcoming call of `op` fail with
    /// [`EngineError::Injected`]. Replaces any fault already armed.
    pub fn inject_fault(&mut self, op: &str, nth: usize) {
        self.fault = Some(FaultPlan {
            op: op.to_string(),
            remaining: nth.max(1),
        });
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    fn check_fault(&mut self, op: &'static str) -> EngineResult<()> {
        if let Some(plan) = self.fault.as_mut() {
            if plan.op == op {
                plan.remaining -= 1;
                if plan.remaining == 0 {
                    self.fault = None;
                    warn!("scene: injected failure in '{op}'");
                    return Err(EngineError::Injected { op: op.to_string() });
                }
            }
        }
        Ok(())
    }

    // --- typed lookups --------------------------------------------------------

    fn node(&self, op: &'static str, name: &str) -> EngineResult<&Node> {
        self.state
            .nodes
            .get(name)
            .ok_or_else(|| EngineError::NodeNotFound {
                op,
                node: name.to_string(),
            })
    }

    fn node_mut(&mut self, op: &'static str, name: &str) -> EngineResult<&mut Node> {
        self.state
            .nodes
            .get_mut(name)
            .ok_or_else(|| EngineError::NodeNotFound {
                op,
                node: name.to_string(),
            })
    }

    fn wrong_kind(op: &'static str, name: &str, expected: NodeKind) -> EngineError {
        EngineError::WrongKind {
            op,
            node: name.to_string(),
            expected,
        }
    }

    fn transform(&self, op: &'static str, name: &str) -> EngineResult<&TransformNode> {
        match &self.node(op, name)?.data {
            NodeData::Transform(t) => Ok(t),
            _ => Err(Self::wrong_kind(op, name, NodeKind::Transform)),
        }
    }

    fn transform_mut(&mut self, op: &'static str, name: &str) -> EngineResult<&mut TransformNode> {
        match &mut self.node_mut(op, name)?.data {
            NodeData::Transform(t) => Ok(t),
            _ => Err(Self::wrong_kind(op, name, NodeKind::Transform)),
        }
    }

    fn solver(&self, op: &'static str, name: &str) -> EngineResult<&SolverNode> {
        match &self.node(op, name)?.data {
            NodeData::Solver(s) => Ok(s),
            _ => Err(Self::wrong_kind(op, name, NodeKind::Solver)),
        }
    }

    fn solver_mut(&mut self, op: &'static str, name: &str) -> EngineResult<&mut SolverNode> {
        match &mut self.node_mut(op, name)?.data {
            NodeData::Solver(s) => Ok(s),
            _ => Err(Self::wrong_kind(op, name, NodeKind::Solver)),
        }
    }

    fn blend(&self, op: &'static str, name: &str) -> EngineResult<&BlendNode> {
        match &self.node(op, name)?.data {
            NodeData::Blend(b) => Ok(b),
            _ => Err(Self::wrong_kind(op, name, NodeKind::Blend)),
        }
    }

    fn blend_mut(&mut self, op: &'static str, name: &str) -> EngineResult<&mut BlendNode> {
        match &mut self.node_mut(op, name)?.data {
            NodeData::Blend(b) => Ok(b),
            _ => Err(Self::wrong_kind(op, name, NodeKind::Blend)),
        }
    }

    fn ensure_absent(&self, op: &'static str, name: &str) -> EngineResult<()> {
        if self.state.nodes.contains_key(name) {
            return Err(EngineError::NodeExists {
                op,
                node: name.to_string(),
            });
        }
        Ok(())
    }

    fn pose_position(&self, op: &'static str, solver: &str, pose: &str) -> EngineResult<usize> {
        self.solver(op, solver)?
            .poses
            .iter()
            .position(|p| p.name == pose)
            .ok_or_else(|| EngineError::PoseNotFound {
                op,
                solver: solver.to_string(),
                pose: pose.to_string(),
            })
    }

    // --- evaluation -----------------------------------------------------------

    fn is_descendant(&self, node: &str, ancestor: &str) -> bool {
        let mut cursor = self.state.nodes.get(node).and_then(|n| n.parent.clone());
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.state.nodes.get(&current).and_then(|n| n.parent.clone());
        }
        false
    }

    fn driver_sample(&self, op: &'static str, driver: &str) -> EngineResult<[f64; 6]> {
        Ok(self.transform(op, driver)?.local.sample())
    }

    fn weights_of(&self, solver: &SolverNode) -> Vec<f64> {
        match self.transform("solver_weights", &solver.driver) {
            Ok(driver) => solver::evaluate(&solver.poses, &driver.local.sample()),
            Err(_) => vec![0.0; solver.poses.len()],
        }
    }

    fn blend_output(&self, op: &'static str, blend: &str) -> EngineResult<Isometry3<f64>> {
        let node = self.blend(op, blend)?;
        let mut weights: HashMap<&str, Vec<f64>> = HashMap::new();
        let mut slots = Vec::with_capacity(node.targets.len());
        for target in &node.targets {
            let w = match &target.weight {
                Some(link) => {
                    if !weights.contains_key(link.solver.as_str()) {
                        let solved = match self.solver(op, &link.solver) {
                            Ok(s) => self.weights_of(s),
                            Err(_) => Vec::new(),
                        };
                        weights.insert(link.solver.as_str(), solved);
                    }
                    weights
                        .get(link.solver.as_str())
                        .and_then(|ws| ws.get(link.output))
                        .copied()
                        .unwrap_or(0.0)
                }
                None => 0.0,
            };
            slots.push((math::to_isometry(&target.matrix), w));
        }
        Ok(blend_targets(
            Isometry3::identity(),
            slots.iter().map(|(iso, w)| (iso, *w)),
        ))
    }

    fn evaluated_local(&self, op: &'static str, name: &str) -> EngineResult<Matrix4<f64>> {
        let t = self.transform(op, name)?;
        let rest = t.local.to_matrix();
        match &t.driven_by {
            Some(blend) => Ok(rest * self.blend_output(op, blend)?.to_homogeneous()),
            None => Ok(rest),
        }
    }

    fn parent_world(&self, op: &'static str, name: &str) -> EngineResult<Matrix4<f64>> {
        match &self.node(op, name)?.parent {
            Some(parent) => match self.kind_of(parent) {
                Some(NodeKind::Transform) => self.world_matrix(parent),
                _ => Ok(Matrix4::identity()),
            },
            None => Ok(Matrix4::identity()),
        }
    }

    fn local_from_world(
        &self,
        op: &'static str,
        name: &str,
        parent_world: &Matrix4<f64>,
        world: &Matrix4<f64>,
    ) -> EngineResult<PoseVector> {
        let inv = math::inverse(parent_world).ok_or_else(|| EngineError::Singular {
            op,
            node: name.to_string(),
        })?;
        Ok(PoseVector::from_matrix(&(inv * world)))
    }

    fn ensure_unconnected(&self, op: &'static str, name: &str) -> EngineResult<()> {
        if let Some(blend) = &self.transform(op, name)?.driven_by {
            return Err(EngineError::Connected {
                op,
                node: name.to_string(),
                driver: blend.clone(),
            });
        }
        Ok(())
    }

    fn subtree(&self, root: &str) -> Vec<NodeId> {
        let mut out = vec![root.to_string()];
        let mut i = 0;
        while i < out.len() {
            let children = self.children(&out[i]);
            out.extend(children);
            i += 1;
        }
        out
    }
}

impl GeometricEngine for SceneGraph {
    fn open_undo_chunk(&mut self) {
        self.undo.push(self.state.clone());
    }

    fn close_undo_chunk(&mut self) {
        self.undo.pop();
    }

    fn undo_chunk(&mut self) {
        if let Some(snapshot) = self.undo.pop() {
            self.state = snapshot;
            debug!("scene: reverted undo chunk (depth {})", self.undo.len());
        }
    }

    fn exists(&self, node: &str) -> bool {
        self.state.nodes.contains_key(node)
    }

    fn create_transform(&mut self, name: &str, parent: Option<&str>) -> EngineResult<NodeId> {
        const OP: &str = "create_transform";
        self.check_fault(OP)?;
        self.ensure_absent(OP, name)?;
        if let Some(p) = parent {
            self.node(OP, p)?;
        }
        self.state.nodes.insert(
            name.to_string(),
            Node {
                parent: parent.map(str::to_string),
                data: NodeData::Transform(TransformNode::default()),
            },
        );
        Ok(name.to_string())
    }

    fn delete_node(&mut self, node: &str) -> EngineResult<()> {
        const OP: &str = "delete_node";
        self.check_fault(OP)?;
        self.node(OP, node)?;
        let doomed = self.subtree(node);
        for name in &doomed {
            self.state.nodes.remove(name);
        }
        for entry in self.state.nodes.values_mut() {
            match &mut entry.data {
                NodeData::Transform(t) => {
                    if t.driven_by.as_ref().is_some_and(|b| doomed.contains(b)) {
                        t.driven_by = None;
                    }
                }
                NodeData::Blend(b) => {
                    for target in &mut b.targets {
                        if target
                            .weight
                            .as_ref()
                            .is_some_and(|l| doomed.contains(&l.solver))
                        {
                            target.weight = None;
                        }
                    }
                }
                NodeData::Solver(_) => {}
            }
        }
        Ok(())
    }

    fn parent_of(&self, node: &str) -> EngineResult<Option<NodeId>> {
        Ok(self.node("parent_of", node)?.parent.clone())
    }

    fn reparent(&mut self, node: &str, parent: Option<&str>) -> EngineResult<()> {
        const OP: &str = "reparent";
        self.check_fault(OP)?;
        let kind = self.node(OP, node)?.kind();
        if let Some(p) = parent {
            self.node(OP, p)?;
            if p == node || self.is_descendant(p, node) {
                return Err(EngineError::Cycle {
                    op: OP,
                    node: node.to_string(),
                    parent: p.to_string(),
                });
            }
        }
        let keep_world = kind == NodeKind::Transform && self.transform(OP, node)?.driven_by.is_none();
        let world = if keep_world {
            Some(self.world_matrix(node)?)
        } else {
            None
        };
        self.node_mut(OP, node)?.parent = parent.map(str::to_string);
        if let Some(world) = world {
            let parent_world = self.parent_world(OP, node)?;
            let local = self.local_from_world(OP, node, &parent_world, &world)?;
            self.transform_mut(OP, node)?.local = local;
        }
        Ok(())
    }

    fn local_pose(&self, node: &str) -> EngineResult<PoseVector> {
        Ok(self.transform("local_pose", node)?.local)
    }

    fn set_local_pose(&mut self, node: &str, pose: PoseVector) -> EngineResult<()> {
        const OP: &str = "set_local_pose";
        self.check_fault(OP)?;
        self.ensure_unconnected(OP, node)?;
        self.transform_mut(OP, node)?.local = pose;
        Ok(())
    }

    fn world_matrix(&self, node: &str) -> EngineResult<Matrix4<f64>> {
        const OP: &str = "world_matrix";
        Ok(self.parent_world(OP, node)? * self.evaluated_local(OP, node)?)
    }

    fn set_world_matrix(&mut self, node: &str, matrix: &Matrix4<f64>) -> EngineResult<()> {
        const OP: &str = "set_world_matrix";
        self.check_fault(OP)?;
        self.ensure_unconnected(OP, node)?;
        let parent_world = self.parent_world(OP, node)?;
        let local = self.local_from_world(OP, node, &parent_world, matrix)?;
        self.transform_mut(OP, node)?.local = local;
        Ok(())
    }

    fn rest_world_matrix(&self, node: &str) -> EngineResult<Matrix4<f64>> {
        const OP: &str = "rest_world_matrix";
        let rest = self.transform(OP, node)?.local.to_matrix();
        Ok(self.parent_world(OP, node)? * rest)
    }

    fn flag(&self, node: &str, attr: &str) -> EngineResult<bool> {
        const OP: &str = "flag";
        self.transform(OP, node)?
            .attributes
            .get(attr)
            .copied()
            .ok_or_else(|| EngineError::AttributeNotFound {
                op: OP,
                node: node.to_string(),
                attr: attr.to_string(),
            })
    }

    fn create_solver(
        &mut self,
        name: &str,
        driver: &str,
        parent: Option<&str>,
    ) -> EngineResult<NodeId> {
        const OP: &str = "create_solver";
        self.check_fault(OP)?;
        self.ensure_absent(OP, name)?;
        self.transform(OP, driver)?;
        if let Some(p) = parent {
            self.node(OP, p)?;
        }
        self.state.nodes.insert(
            name.to_string(),
            Node {
                parent: parent.map(str::to_string),
                data: NodeData::Solver(SolverNode {
                    driver: driver.to_string(),
                    interpolation: Interpolation::default(),
                    poses: Vec::new(),
                }),
            },
        );
        Ok(name.to_string())
    }

    fn set_interpolation(&mut self, solver: &str, mode: Interpolation) -> EngineResult<()> {
        const OP: &str = "set_interpolation";
        self.check_fault(OP)?;
        self.solver_mut(OP, solver)?.interpolation = mode;
        Ok(())
    }

    fn add_pose(&mut self, solver: &str, pose: &str) -> EngineResult<usize> {
        const OP: &str = "add_pose";
        self.check_fault(OP)?;
        let node = self.solver(OP, solver)?;
        if node.poses.iter().any(|p| p.name == pose) {
            return Err(EngineError::PoseExists {
                op: OP,
                solver: solver.to_string(),
                pose: pose.to_string(),
            });
        }
        let sample = self.driver_sample(OP, &node.driver.clone())?;
        let s = self.solver_mut(OP, solver)?;
        s.poses.push(SolverPose {
            name: pose.to_string(),
            sample,
            falloff: DEFAULT_FALLOFF,
            pose_type: PoseType::default(),
        });
        let index = s.poses.len() - 1;
        s.poses[index].falloff = solver::compute_falloff(&s.poses, index);
        Ok(index)
    }

    fn set_pose_type(&mut self, solver: &str, index: usize, kind: PoseType) -> EngineResult<()> {
        const OP: &str = "set_pose_type";
        self.check_fault(OP)?;
        let s = self.solver_mut(OP, solver)?;
        let len = s.poses.len();
        let pose = s.poses.get_mut(index).ok_or_else(|| EngineError::SlotOutOfRange {
            op: OP,
            node: solver.to_string(),
            index,
            len,
        })?;
        pose.pose_type = kind;
        Ok(())
    }

    fn update_pose(&mut self, solver: &str, pose: &str) -> EngineResult<usize> {
        const OP: &str = "update_pose";
        self.check_fault(OP)?;
        let index = self.pose_position(OP, solver, pose)?;
        let driver = self.solver(OP, solver)?.driver.clone();
        let sample = self.driver_sample(OP, &driver)?;
        let s = self.solver_mut(OP, solver)?;
        s.poses[index].sample = sample;
        s.poses[index].falloff = solver::compute_falloff(&s.poses, index);
        Ok(index)
    }

    fn recompute_falloff(&mut self, solver: &str, pose: &str) -> EngineResult<()> {
        const OP: &str = "recompute_falloff";
        self.check_fault(OP)?;
        let index = self.pose_position(OP, solver, pose)?;
        let s = self.solver_mut(OP, solver)?;
        s.poses[index].falloff = solver::compute_falloff(&s.poses, index);
        Ok(())
    }

    fn delete_pose(&mut self, solver: &str, pose: &str) -> EngineResult<usize> {
        const OP: &str = "delete_pose";
        self.check_fault(OP)?;
        let index = self.pose_position(OP, solver, pose)?;
        self.solver_mut(OP, solver)?.poses.remove(index);
        for entry in self.state.nodes.values_mut() {
            let NodeData::Blend(b) = &mut entry.data else {
                continue;
            };
            for target in &mut b.targets {
                let Some(link) = target.weight.as_mut() else {
                    continue;
                };
                if link.solver != solver {
                    continue;
                }
                if link.output == index {
                    target.weight = None;
                } else if link.output > index {
                    link.output -= 1;
                }
            }
        }
        Ok(index)
    }

    fn pose_names(&self, solver: &str) -> EngineResult<Vec<String>> {
        Ok(self
            .solver("pose_names", solver)?
            .poses
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    fn solver_weights(&self, solver: &str) -> EngineResult<Vec<f64>> {
        let s = self.solver("solver_weights", solver)?;
        Ok(self.weights_of(s))
    }

    fn create_blend(&mut self, name: &str) -> EngineResult<NodeId> {
        const OP: &str = "create_blend";
        self.check_fault(OP)?;
        self.ensure_absent(OP, name)?;
        self.state.nodes.insert(
            name.to_string(),
            Node {
                parent: None,
                data: NodeData::Blend(BlendNode::default()),
            },
        );
        Ok(name.to_string())
    }

    fn blend_target_count(&self, blend: &str) -> EngineResult<usize> {
        Ok(self.blend("blend_target_count", blend)?.targets.len())
    }

    fn set_blend_target_matrix(
        &mut self,
        blend: &str,
        index: usize,
        matrix: &Matrix4<f64>,
    ) -> EngineResult<()> {
        const OP: &str = "set_blend_target_matrix";
        self.check_fault(OP)?;
        let b = self.blend_mut(OP, blend)?;
        let len = b.targets.len();
        match index.cmp(&len) {
            std::cmp::Ordering::Less => b.targets[index].matrix = *matrix,
            std::cmp::Ordering::Equal => b.targets.push(BlendTarget {
                matrix: *matrix,
                weight: None,
            }),
            std::cmp::Ordering::Greater => {
                return Err(EngineError::SlotOutOfRange {
                    op: OP,
                    node: blend.to_string(),
                    index,
                    len,
                })
            }
        }
        Ok(())
    }

    fn blend_target_matrix(&self, blend: &str, index: usize) -> EngineResult<Matrix4<f64>> {
        const OP: &str = "blend_target_matrix";
        let b = self.blend(OP, blend)?;
        b.targets
            .get(index)
            .map(|t| t.matrix)
            .ok_or_else(|| EngineError::SlotOutOfRange {
                op: OP,
                node: blend.to_string(),
                index,
                len: b.targets.len(),
            })
    }

    fn connect_weight(
        &mut self,
        solver: &str,
        output: usize,
        blend: &str,
        index: usize,
    ) -> EngineResult<()> {
        const OP: &str = "connect_weight";
        self.check_fault(OP)?;
        let outputs = self.solver(OP, solver)?.poses.len();
        if output >= outputs {
            return Err(EngineError::SlotOutOfRange {
                op: OP,
                node: solver.to_string(),
                index: output,
                len: outputs,
            });
        }
        let link = WeightLink {
            solver: solver.to_string(),
            output,
        };
        let b = self.blend_mut(OP, blend)?;
        let len = b.targets.len();
        match index.cmp(&len) {
            std::cmp::Ordering::Less => b.targets[index].weight = Some(link),
            std::cmp::Ordering::Equal => b.targets.push(BlendTarget {
                matrix: Matrix4::identity(),
                weight: Some(link),
            }),
            std::cmp::Ordering::Greater => {
                return Err(EngineError::SlotOutOfRange {
                    op: OP,
                    node: blend.to_string(),
                    index,
                    len,
                })
            }
        }
        Ok(())
    }

    fn remove_blend_target(&mut self, blend: &str, index: usize) -> EngineResult<()> {
        const OP: &str = "remove_blend_target";
        self.check_fault(OP)?;
        let b = self.blend_mut(OP, blend)?;
        if index >= b.targets.len() {
            return Err(EngineError::SlotOutOfRange {
                op: OP,
                node: blend.to_string(),
                index,
                len: b.targets.len(),
            });
        }
        b.targets.remove(index);
        Ok(())
    }

    fn connect_blend_output(&mut self, blend: &str, transform: &str) -> EngineResult<()> {
        const OP: &str = "connect_blend_output";
        self.check_fault(OP)?;
        self.blend(OP, blend)?;
        self.transform_mut(OP, transform)?.driven_by = Some(blend.to_string());
        Ok(())
    }

    fn blend_driving(&self, transform: &str) -> EngineResult<Option<NodeId>> {
        Ok(self.transform("blend_driving", transform)?.driven_by.clone())
    }

    fn blends_weighted_by(&self, solver: &str) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .state
            .nodes
            .iter()
            .filter_map(|(name, node)| match &node.data {
                NodeData::Blend(b)
                    if b.targets
                        .iter()
                        .any(|t| t.weight.as_ref().is_some_and(|l| l.solver == solver)) =>
                {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect();
        out.sort();
        out
    }
}
