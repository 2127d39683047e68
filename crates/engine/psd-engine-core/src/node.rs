use std::fmt;

use hashbrown::HashMap;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::math::{PoseVector, Vec3};
use crate::solver::{Interpolation, SolverPose};

pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Transform,
    Solver,
    Blend,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Transform => "transform",
            NodeKind::Solver => "solver",
            NodeKind::Blend => "blend",
        };
        f.write_str(s)
    }
}

/// A transform with local channels and boolean attributes (mirror flags).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformNode {
    pub local: PoseVector,
    pub attributes: HashMap<String, bool>,
    /// Blend node whose output composes on top of `local` (the rest channels).
    pub driven_by: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverNode {
    pub driver: NodeId,
    pub interpolation: Interpolation,
    pub poses: Vec<SolverPose>,
}

/// Source of a blend slot's weight: output `output` of `solver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightLink {
    pub solver: NodeId,
    pub output: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendTarget {
    pub matrix: Matrix4<f64>,
    pub weight: Option<WeightLink>,
}

impl Default for BlendTarget {
    fn default() -> Self {
        Self {
            matrix: Matrix4::identity(),
            weight: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendNode {
    pub targets: Vec<BlendTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Transform(TransformNode),
    Solver(SolverNode),
    Blend(BlendNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Transform(_) => NodeKind::Transform,
            NodeData::Solver(_) => NodeKind::Solver,
            NodeData::Blend(_) => NodeKind::Blend,
        }
    }
}

/// Declarative node description used to seed a scene (fixtures, host imports).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSpec {
    pub name: NodeId,
    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default)]
    pub attributes: HashMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SceneSpec {
    pub nodes: Vec<TransformSpec>,
}
