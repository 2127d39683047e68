//! Metadata store: every registered driver's record plus the container scope
//! that owns the solver nodes.
//!
//! The store is plain data so a transaction can snapshot it by value and put
//! it back on rollback.

use indexmap::IndexMap;
use log::debug;
use psd_engine_core::{EngineResult, GeometricEngine, NodeId};

use crate::record::PoseSpaceRecord;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataStore {
    container: Option<NodeId>,
    records: IndexMap<String, PoseSpaceRecord>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the container scope, once one has been created.
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn get(&self, driver: &str) -> Option<&PoseSpaceRecord> {
        self.records.get(driver)
    }

    pub fn contains(&self, driver: &str) -> bool {
        self.records.contains_key(driver)
    }

    /// Driver ids in registration order.
    pub fn drivers(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> &IndexMap<String, PoseSpaceRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn get_mut(&mut self, driver: &str) -> Option<&mut PoseSpaceRecord> {
        self.records.get_mut(driver)
    }

    pub(crate) fn insert(&mut self, record: PoseSpaceRecord) {
        self.records.insert(record.driver().to_string(), record);
    }

    pub(crate) fn remove(&mut self, driver: &str) -> Option<PoseSpaceRecord> {
        self.records.shift_remove(driver)
    }

    /// Make sure the container scope exists in the engine, creating it on
    /// first use. A leftover node with the same name is adopted.
    pub(crate) fn initialize<E: GeometricEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        name: &str,
    ) -> EngineResult<NodeId> {
        if let Some(existing) = self.container.as_ref().filter(|c| engine.exists(c)) {
            return Ok(existing.clone());
        }
        let id = if engine.exists(name) {
            name.to_string()
        } else {
            debug!("store: creating container '{name}'");
            engine.create_transform(name, None)?
        };
        self.container = Some(id.clone());
        Ok(id)
    }

    /// Delete the container scope. Called once the last driver is gone.
    pub(crate) fn teardown<E: GeometricEngine + ?Sized>(
        &mut self,
        engine: &mut E,
    ) -> EngineResult<()> {
        if let Some(container) = self.container.take() {
            if engine.exists(&container) {
                debug!("store: removing container '{container}'");
                engine.delete_node(&container)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psd_engine_core::SceneGraph;

    #[test]
    fn initialize_creates_container_once() {
        let mut scene = SceneGraph::new();
        let mut store = MetadataStore::new();
        assert_eq!(store.initialize(&mut scene, "pose_manager").unwrap(), "pose_manager");
        assert_eq!(store.initialize(&mut scene, "pose_manager").unwrap(), "pose_manager");
        assert!(scene.exists("pose_manager"));
        assert_eq!(store.container(), Some("pose_manager"));

        store.teardown(&mut scene).unwrap();
        assert!(!scene.exists("pose_manager"));
        assert_eq!(store.container(), None);
    }

    #[test]
    fn initialize_adopts_existing_node() {
        let mut scene = SceneGraph::new();
        scene.create_transform("pose_manager", None).unwrap();
        let mut store = MetadataStore::new();
        store.initialize(&mut scene, "pose_manager").unwrap();
        assert_eq!(store.container(), Some("pose_manager"));
    }

    #[test]
    fn records_keep_registration_order() {
        let mut store = MetadataStore::new();
        store.insert(PoseSpaceRecord::new("b", "b"));
        store.insert(PoseSpaceRecord::new("a", "a"));
        assert_eq!(store.drivers().collect::<Vec<_>>(), ["b", "a"]);
        assert!(store.remove("b").is_some());
        assert_eq!(store.len(), 1);
    }
}
