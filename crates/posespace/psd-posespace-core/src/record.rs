//! Pose-space records: the metadata kept for one driver.
//!
//! The serde layout is the rig file format:
//! `{ driver, controller, driven: [..], pose: { name: { t, r, driven: { id: { t, r } } } } }`.
//! Mutation is crate-private; hosts read records and go through the manager to
//! change them.

use indexmap::IndexMap;
use psd_engine_core::PoseVector;
use serde::{Deserialize, Serialize};

/// A driven target's corrective offset relative to its rest pivot.
pub type DrivenOffset = PoseVector;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseRecord {
    #[serde(flatten)]
    vector: PoseVector,
    #[serde(rename = "driven", default)]
    offsets: IndexMap<String, DrivenOffset>,
}

impl PoseRecord {
    pub fn vector(&self) -> PoseVector {
        self.vector
    }

    pub fn translation(&self) -> [f64; 3] {
        self.vector.translation
    }

    pub fn rotation(&self) -> [f64; 3] {
        self.vector.rotation
    }

    pub fn offset(&self, driven: &str) -> Option<&DrivenOffset> {
        self.offsets.get(driven)
    }

    pub fn offsets(&self) -> impl Iterator<Item = (&str, &DrivenOffset)> {
        self.offsets.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Insertion-ordered poses. A pose's position here is its solver index and
/// its target slot on every blend node of the record's driven targets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseTable(IndexMap<String, PoseRecord>);

impl PoseTable {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PoseRecord> {
        self.0.get(name)
    }

    /// Solver index / blend slot of `name`.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.0.get_index_of(name)
    }

    pub fn name_at(&self, slot: usize) -> Option<&str> {
        self.0.get_index(slot).map(|(k, _)| k.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PoseRecord)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn push(&mut self, name: &str, record: PoseRecord) -> usize {
        self.0.insert_full(name.to_string(), record).0
    }

    fn remove(&mut self, name: &str) -> Option<(usize, PoseRecord)> {
        self.0.shift_remove_full(name).map(|(i, _, v)| (i, v))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut PoseRecord> {
        self.0.get_mut(name)
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut PoseRecord> {
        self.0.values_mut()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSpaceRecord {
    driver: String,
    controller: String,
    #[serde(default)]
    driven: Vec<String>,
    #[serde(rename = "pose", default)]
    poses: PoseTable,
}

impl PoseSpaceRecord {
    pub(crate) fn new(driver: &str, controller: &str) -> Self {
        Self {
            driver: driver.to_string(),
            controller: controller.to_string(),
            driven: Vec::new(),
            poses: PoseTable::default(),
        }
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Driven targets in registration order.
    pub fn driven(&self) -> &[String] {
        &self.driven
    }

    pub fn has_driven(&self, driven: &str) -> bool {
        self.driven.iter().any(|d| d == driven)
    }

    pub fn poses(&self) -> &PoseTable {
        &self.poses
    }

    pub fn pose(&self, name: &str) -> Option<&PoseRecord> {
        self.poses.get(name)
    }

    /// Append a pose captured at `vector`, with a zero offset for every driven
    /// target. Returns its slot.
    pub(crate) fn insert_pose(&mut self, name: &str, vector: PoseVector) -> usize {
        let offsets = self
            .driven
            .iter()
            .map(|d| (d.clone(), DrivenOffset::IDENTITY))
            .collect();
        self.poses.push(name, PoseRecord { vector, offsets })
    }

    pub(crate) fn remove_pose(&mut self, name: &str) -> Option<usize> {
        self.poses.remove(name).map(|(slot, _)| slot)
    }

    pub(crate) fn set_pose_vector(&mut self, name: &str, vector: PoseVector) -> bool {
        match self.poses.get_mut(name) {
            Some(pose) => {
                pose.vector = vector;
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_offset(&mut self, pose: &str, driven: &str, offset: DrivenOffset) -> bool {
        match self.poses.get_mut(pose) {
            Some(p) if p.offsets.contains_key(driven) => {
                p.offsets.insert(driven.to_string(), offset);
                true
            }
            _ => false,
        }
    }

    /// Register a driven target and back-fill a zero offset into every pose.
    pub(crate) fn add_driven(&mut self, driven: &str) {
        self.driven.push(driven.to_string());
        for pose in self.poses.values_mut() {
            pose.offsets
                .insert(driven.to_string(), DrivenOffset::IDENTITY);
        }
    }

    pub(crate) fn remove_driven(&mut self, driven: &str) {
        self.driven.retain(|d| d != driven);
        for pose in self.poses.values_mut() {
            pose.offsets.shift_remove(driven);
        }
    }
}
