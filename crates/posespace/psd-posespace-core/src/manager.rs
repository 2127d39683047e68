//! Pose-space authoring on top of a [`GeometricEngine`].
//!
//! Every public mutating operation runs in two phases. Validation reads the
//! store and the engine and rejects bad input without touching anything.
//! Execution then runs inside one engine undo chunk with a snapshot of the
//! metadata store; if any engine call fails the chunk is undone, the snapshot
//! restored, and the failure is returned as [`PoseSpaceError::EngineFailure`].

use log::{debug, error, warn};
use psd_engine_core::{math, EngineError, GeometricEngine, PoseVector};

use crate::config::ManagerConfig;
use crate::error::{PoseSpaceError, Result};
use crate::naming::NodeNaming;
use crate::record::{DrivenOffset, PoseSpaceRecord};
use crate::store::MetadataStore;

pub struct PoseSpaceManager<E: GeometricEngine> {
    pub(crate) engine: E,
    pub(crate) store: MetadataStore,
    pub(crate) config: ManagerConfig,
}

impl<E: GeometricEngine> PoseSpaceManager<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ManagerConfig::default())
    }

    pub fn with_config(engine: E, config: ManagerConfig) -> Self {
        Self {
            engine,
            store: MetadataStore::new(),
            config,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Direct engine access for host-side edits such as posing controllers.
    /// Rig nodes created by the manager should only be changed through it.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn naming(&self) -> NodeNaming<'_> {
        self.config.naming()
    }

    pub fn into_parts(self) -> (E, MetadataStore) {
        (self.engine, self.store)
    }

    pub fn record(&self, driver: &str) -> Result<&PoseSpaceRecord> {
        self.store
            .get(driver)
            .ok_or_else(|| PoseSpaceError::not_found("driver", driver))
    }

    /// Run `f` as one atomic unit. Nested manager operations each open their
    /// own chunk inside this one; a failure anywhere reverts everything `f`
    /// did.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.store.clone();
        self.engine.open_undo_chunk();
        match f(self) {
            Ok(value) => {
                self.engine.close_undo_chunk();
                Ok(value)
            }
            Err(err) => {
                self.engine.undo_chunk();
                self.store = snapshot;
                if err.is_engine_failure() {
                    error!("pose space: rolled back: {err}");
                } else {
                    warn!("pose space: rolled back: {err}");
                }
                Err(err)
            }
        }
    }

    pub(crate) fn transact<T>(
        &mut self,
        operation: &'static str,
        args: &[&str],
        body: impl FnOnce(&mut Tx<'_, E>) -> TxResult<T>,
    ) -> Result<T> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.batch(|mgr| {
            let mut tx = Tx {
                engine: &mut mgr.engine,
                store: &mut mgr.store,
                config: &mgr.config,
            };
            body(&mut tx).map_err(|err| match err {
                TxError::Engine(source) => PoseSpaceError::EngineFailure {
                    operation,
                    args,
                    source,
                },
                TxError::Store(err) => err,
            })
        })
    }

    // --- validation ------------------------------------------------------------

    pub(crate) fn require_node(&self, node: &str) -> Result<()> {
        if self.engine.exists(node) {
            Ok(())
        } else {
            Err(PoseSpaceError::not_found("node", node))
        }
    }

    pub(crate) fn solver_poses(&self, driver: &str) -> Result<Vec<String>> {
        let solver = self.naming().solver(driver);
        self.engine
            .pose_names(&solver)
            .map_err(|_| PoseSpaceError::not_found("solver", solver))
    }

    fn require_pose(&self, driver: &str, pose: &str) -> Result<&PoseSpaceRecord> {
        let record = self.record(driver)?;
        if !record.poses().contains(pose) {
            return Err(PoseSpaceError::not_found("pose", pose));
        }
        Ok(record)
    }

    fn require_rig_nodes(&self, driven: &str) -> Result<()> {
        let naming = self.naming();
        self.require_node(&naming.blend(driven))?;
        self.require_node(&naming.proxy(driven))
    }

    fn require_driven(&self, driver: &str, driven: &str) -> Result<()> {
        if !self.record(driver)?.has_driven(driven) {
            return Err(PoseSpaceError::not_found("driven", driven));
        }
        self.require_rig_nodes(driven)
    }

    /// A driven target may only be bound to one driver: no record may list it,
    /// and a blend node already under its name must still be empty.
    pub(crate) fn require_unbound(&self, driven: &str) -> Result<()> {
        if let Some(owner) = self
            .store
            .records()
            .values()
            .find(|record| record.has_driven(driven))
        {
            debug!("'{driven}' is already driven by '{}'", owner.driver());
            return Err(PoseSpaceError::already_exists("driven", driven));
        }
        let blend = self.naming().blend(driven);
        if self.engine.exists(&blend) && self.engine.blend_target_count(&blend).unwrap_or(0) > 0 {
            return Err(PoseSpaceError::already_exists("blend", blend));
        }
        Ok(())
    }

    fn validate_register(&self, driver: &str, controller: &str) -> Result<()> {
        self.require_node(driver)?;
        self.require_node(controller)?;
        if self.store.contains(driver) {
            return Err(PoseSpaceError::already_exists("driver", driver));
        }
        let solver = self.naming().solver(driver);
        if self.engine.exists(&solver) {
            return Err(PoseSpaceError::already_exists("solver", solver));
        }
        Ok(())
    }

    fn validate_add_pose(&self, driver: &str, pose: &str) -> Result<()> {
        let record = self.record(driver)?;
        self.require_node(record.controller())?;
        if record.poses().contains(pose) || self.solver_poses(driver)?.iter().any(|p| p == pose) {
            return Err(PoseSpaceError::already_exists("pose", pose));
        }
        for driven in record.driven() {
            self.require_rig_nodes(driven)?;
        }
        Ok(())
    }

    fn validate_solver_pose(&self, driver: &str, pose: &str) -> Result<()> {
        self.require_pose(driver, pose)?;
        if !self.solver_poses(driver)?.iter().any(|p| p == pose) {
            return Err(PoseSpaceError::not_found("solver pose", pose));
        }
        Ok(())
    }

    fn validate_add_driven(&self, driver: &str, driven: &str) -> Result<()> {
        let record = self.record(driver)?;
        self.require_node(driven)?;
        if record.has_driven(driven) {
            return Err(PoseSpaceError::already_exists("driven", driven));
        }
        self.solver_poses(driver)?;
        self.require_unbound(driven)
    }

    // --- operations ------------------------------------------------------------

    /// Register `driver` with the solver that samples it and the `controller`
    /// poses are authored on.
    pub fn register_driver(&mut self, driver: &str, controller: &str) -> Result<()> {
        self.validate_register(driver, controller)
            .inspect_err(|e| warn!("register_driver rejected: {e}"))?;
        self.transact("register_driver", &[driver, controller], |tx| {
            tx.register_driver(driver, controller)
        })?;
        debug!("register_driver: '{driver}' (controller '{controller}')");
        Ok(())
    }

    /// Remove a driver, its solver and every driven target's rig nodes. The
    /// container scope goes with the last driver.
    pub fn unregister_driver(&mut self, driver: &str) -> Result<()> {
        self.record(driver)
            .inspect_err(|e| warn!("unregister_driver rejected: {e}"))?;
        self.transact("unregister_driver", &[driver], |tx| {
            tx.unregister_driver(driver)
        })?;
        debug!("unregister_driver: '{driver}'");
        Ok(())
    }

    /// Capture the controller's current pose as a new pose. Returns its index.
    pub fn add_pose(&mut self, driver: &str, pose: &str) -> Result<usize> {
        self.validate_add_pose(driver, pose)
            .inspect_err(|e| warn!("add_pose rejected: {e}"))?;
        let index = self.transact("add_pose", &[driver, pose], |tx| tx.add_pose(driver, pose))?;
        debug!("add_pose: '{driver}'.'{pose}' at {index}");
        Ok(index)
    }

    /// Re-capture the controller into an existing pose.
    pub fn update_pose(&mut self, driver: &str, pose: &str) -> Result<()> {
        self.validate_solver_pose(driver, pose)
            .inspect_err(|e| warn!("update_pose rejected: {e}"))?;
        self.transact("update_pose", &[driver, pose], |tx| tx.update_pose(driver, pose))?;
        debug!("update_pose: '{driver}'.'{pose}'");
        Ok(())
    }

    pub fn delete_pose(&mut self, driver: &str, pose: &str) -> Result<()> {
        self.validate_solver_pose(driver, pose)
            .and_then(|_| {
                self.record(driver)?
                    .driven()
                    .iter()
                    .try_for_each(|d| self.require_rig_nodes(d))
            })
            .inspect_err(|e| warn!("delete_pose rejected: {e}"))?;
        self.transact("delete_pose", &[driver, pose], |tx| tx.delete_pose(driver, pose))?;
        debug!("delete_pose: '{driver}'.'{pose}'");
        Ok(())
    }

    /// Bind `driven` to `driver`: a proxy parent and a blend node are created
    /// and every existing pose gets a zero offset.
    pub fn add_driven(&mut self, driver: &str, driven: &str) -> Result<()> {
        self.validate_add_driven(driver, driven)
            .inspect_err(|e| warn!("add_driven rejected: {e}"))?;
        self.transact("add_driven", &[driver, driven], |tx| tx.add_driven(driver, driven))?;
        debug!("add_driven: '{driven}' on '{driver}'");
        Ok(())
    }

    /// Bake the driven target's current placement into `pose`'s slot and reset
    /// its local transform. Returns the stored offset.
    pub fn update_driven(&mut self, driver: &str, pose: &str, driven: &str) -> Result<DrivenOffset> {
        self.validate_solver_pose(driver, pose)
            .and_then(|_| self.require_driven(driver, driven))
            .inspect_err(|e| warn!("update_driven rejected: {e}"))?;
        let offset = self.transact("update_driven", &[driver, pose, driven], |tx| {
            tx.update_driven(driver, pose, driven)
        })?;
        debug!("update_driven: '{driven}' in '{driver}'.'{pose}'");
        Ok(offset)
    }

    /// Unbind `driven`, handing it back to the proxy's parent at its current
    /// world placement.
    pub fn delete_driven(&mut self, driver: &str, driven: &str) -> Result<()> {
        self.require_driven(driver, driven)
            .inspect_err(|e| warn!("delete_driven rejected: {e}"))?;
        self.transact("delete_driven", &[driver, driven], |tx| {
            tx.delete_driven(driver, driven)
        })?;
        debug!("delete_driven: '{driven}' from '{driver}'");
        Ok(())
    }

    /// Write a stored pose back onto the controller.
    pub fn go_to_pose(&mut self, driver: &str, pose: &str) -> Result<()> {
        let (controller, vector) = self
            .require_pose(driver, pose)
            .and_then(|record| {
                self.require_node(record.controller())?;
                let vector = record
                    .pose(pose)
                    .map(|p| p.vector())
                    .ok_or_else(|| PoseSpaceError::not_found("pose", pose))?;
                Ok((record.controller().to_string(), vector))
            })
            .inspect_err(|e| warn!("go_to_pose rejected: {e}"))?;
        self.transact("go_to_pose", &[driver, pose], |tx| {
            tx.engine.set_local_pose(&controller, vector)?;
            Ok(())
        })?;
        debug!("go_to_pose: '{driver}'.'{pose}'");
        Ok(())
    }

    /// Set any scene transform's local channels as an undoable step.
    pub fn set_node_pose(&mut self, node: &str, pose: PoseVector) -> Result<()> {
        self.require_node(node)
            .inspect_err(|e| warn!("set_node_pose rejected: {e}"))?;
        self.transact("set_node_pose", &[node], |tx| {
            tx.engine.set_local_pose(node, pose)?;
            Ok(())
        })
    }

    /// Recompute every pose's falloff on every solver, e.g. after poses were
    /// moved with `update_pose`.
    pub fn recompute_falloffs(&mut self) -> Result<()> {
        for driver in self.store.drivers() {
            self.solver_poses(driver)
                .inspect_err(|e| warn!("recompute_falloffs rejected: {e}"))?;
        }
        self.transact("recompute_falloffs", &[], |tx| tx.recompute_falloffs())?;
        debug!("recompute_falloffs: {} driver(s)", self.store.len());
        Ok(())
    }
}

// --- transaction steps ---------------------------------------------------------

pub(crate) enum TxError {
    Engine(EngineError),
    Store(PoseSpaceError),
}

impl From<EngineError> for TxError {
    fn from(err: EngineError) -> Self {
        TxError::Engine(err)
    }
}

impl From<PoseSpaceError> for TxError {
    fn from(err: PoseSpaceError) -> Self {
        TxError::Store(err)
    }
}

pub(crate) type TxResult<T> = std::result::Result<T, TxError>;

/// Mutable view handed to a transaction body. Steps assume validation has
/// already passed; anything still missing surfaces as an error and rolls the
/// whole transaction back.
pub(crate) struct Tx<'a, E: GeometricEngine> {
    pub(crate) engine: &'a mut E,
    pub(crate) store: &'a mut MetadataStore,
    pub(crate) config: &'a ManagerConfig,
}

impl<'a, E: GeometricEngine> Tx<'a, E> {
    fn naming(&self) -> NodeNaming<'a> {
        self.config.naming()
    }

    pub(crate) fn record(&self, driver: &str) -> TxResult<&PoseSpaceRecord> {
        Ok(self
            .store
            .get(driver)
            .ok_or_else(|| PoseSpaceError::not_found("driver", driver))?)
    }

    fn record_mut(&mut self, driver: &str) -> TxResult<&mut PoseSpaceRecord> {
        Ok(self
            .store
            .get_mut(driver)
            .ok_or_else(|| PoseSpaceError::not_found("driver", driver))?)
    }

    /// Slot of `pose`, checked against the solver's own index.
    fn aligned_slot(&self, op: &'static str, driver: &str, pose: &str) -> TxResult<usize> {
        let slot = self
            .record(driver)?
            .poses()
            .slot(pose)
            .ok_or_else(|| PoseSpaceError::not_found("pose", pose))?;
        let solver = self.naming().solver(driver);
        match self.engine.pose_index(&solver, pose)? {
            Some(index) if index == slot => Ok(slot),
            Some(index) => Err(EngineError::IndexMismatch {
                op,
                expected: slot,
                actual: index,
            }
            .into()),
            None => Err(EngineError::PoseNotFound {
                op,
                solver,
                pose: pose.to_string(),
            }
            .into()),
        }
    }

    pub(crate) fn register_driver(&mut self, driver: &str, controller: &str) -> TxResult<()> {
        let container = self
            .store
            .initialize(&mut *self.engine, &self.config.container)?;
        let solver = self.naming().solver(driver);
        self.engine.create_solver(&solver, driver, Some(&container))?;
        self.engine
            .set_interpolation(&solver, self.config.interpolation)?;
        self.store.insert(PoseSpaceRecord::new(driver, controller));
        Ok(())
    }

    pub(crate) fn unregister_driver(&mut self, driver: &str) -> TxResult<()> {
        let naming = self.naming();
        let driven = self.record(driver)?.driven().to_vec();
        for target in &driven {
            let proxy = naming.proxy(target);
            let parent = self.engine.parent_of(&proxy)?;
            self.engine.reparent(target, parent.as_deref())?;
            self.engine.set_local_pose(target, PoseVector::IDENTITY)?;
            self.engine.delete_node(&naming.blend(target))?;
            self.engine.delete_node(&proxy)?;
        }
        self.engine.delete_node(&naming.solver(driver))?;
        self.store.remove(driver);
        if self.store.is_empty() {
            self.store.teardown(&mut *self.engine)?;
        }
        Ok(())
    }

    pub(crate) fn add_pose(&mut self, driver: &str, pose: &str) -> TxResult<usize> {
        let naming = self.naming();
        let solver = naming.solver(driver);
        let record = self.record(driver)?;
        let controller = record.controller().to_string();
        let driven = record.driven().to_vec();
        let expected = record.poses().len();

        let index = self.engine.add_pose(&solver, pose)?;
        if index != expected {
            return Err(EngineError::IndexMismatch {
                op: "add_pose",
                expected,
                actual: index,
            }
            .into());
        }
        self.engine
            .set_pose_type(&solver, index, self.config.pose_type)?;
        for target in &driven {
            self.engine
                .connect_weight(&solver, index, &naming.blend(target), index)?;
        }
        let vector = self.engine.local_pose(&controller)?;
        self.record_mut(driver)?.insert_pose(pose, vector);
        Ok(index)
    }

    pub(crate) fn update_pose(&mut self, driver: &str, pose: &str) -> TxResult<()> {
        let slot = self.aligned_slot("update_pose", driver, pose)?;
        let controller = self.record(driver)?.controller().to_string();
        let solver = self.naming().solver(driver);
        let vector = self.engine.local_pose(&controller)?;
        let index = self.engine.update_pose(&solver, pose)?;
        if index != slot {
            return Err(EngineError::IndexMismatch {
                op: "update_pose",
                expected: slot,
                actual: index,
            }
            .into());
        }
        self.record_mut(driver)?.set_pose_vector(pose, vector);
        Ok(())
    }

    pub(crate) fn delete_pose(&mut self, driver: &str, pose: &str) -> TxResult<()> {
        let naming = self.naming();
        let slot = self.aligned_slot("delete_pose", driver, pose)?;
        let driven = self.record(driver)?.driven().to_vec();
        for target in &driven {
            self.engine.remove_blend_target(&naming.blend(target), slot)?;
        }
        self.engine.delete_pose(&naming.solver(driver), pose)?;
        self.record_mut(driver)?.remove_pose(pose);
        Ok(())
    }

    pub(crate) fn add_driven(&mut self, driver: &str, driven: &str) -> TxResult<()> {
        let naming = self.naming();
        let solver = naming.solver(driver);
        let blend = naming.blend(driven);
        let proxy = naming.proxy(driven);

        if !self.engine.exists(&blend) {
            self.engine.create_blend(&blend)?;
        }
        if !self.engine.exists(&proxy) {
            let parent = self.engine.parent_of(driven)?;
            let world = self.engine.world_matrix(driven)?;
            self.engine.create_transform(&proxy, parent.as_deref())?;
            self.engine.set_world_matrix(&proxy, &world)?;
            self.engine.reparent(driven, Some(&proxy))?;
            self.engine.set_local_pose(driven, PoseVector::IDENTITY)?;
        }
        if self.engine.blend_driving(&proxy)?.as_deref() != Some(blend.as_str()) {
            self.engine.connect_blend_output(&blend, &proxy)?;
        }

        let existing = self.engine.blend_target_count(&blend)?;
        if existing != 0 {
            return Err(EngineError::IndexMismatch {
                op: "add_driven",
                expected: 0,
                actual: existing,
            }
            .into());
        }
        let identity = math::identity();
        for index in 0..self.record(driver)?.poses().len() {
            self.engine.connect_weight(&solver, index, &blend, index)?;
            self.engine.set_blend_target_matrix(&blend, index, &identity)?;
        }
        self.record_mut(driver)?.add_driven(driven);
        Ok(())
    }

    pub(crate) fn update_driven(
        &mut self,
        driver: &str,
        pose: &str,
        driven: &str,
    ) -> TxResult<DrivenOffset> {
        let naming = self.naming();
        let slot = self.aligned_slot("update_driven", driver, pose)?;
        let proxy = naming.proxy(driven);

        let world = self.engine.world_matrix(driven)?;
        let pivot = self.engine.rest_world_matrix(&proxy)?;
        let pivot_inv = math::inverse(&pivot).ok_or(EngineError::Singular {
            op: "update_driven",
            node: proxy,
        })?;
        let offset = pivot_inv * world;

        self.engine
            .set_blend_target_matrix(&naming.blend(driven), slot, &offset)?;
        self.engine.set_local_pose(driven, PoseVector::IDENTITY)?;
        let captured = DrivenOffset::from_matrix(&offset);
        self.record_mut(driver)?.set_offset(pose, driven, captured);
        Ok(captured)
    }

    /// Store an already-computed offset into `pose`'s slot.
    pub(crate) fn write_offset(
        &mut self,
        driver: &str,
        pose: &str,
        driven: &str,
        offset: DrivenOffset,
    ) -> TxResult<()> {
        let slot = self.aligned_slot("write_offset", driver, pose)?;
        let blend = self.naming().blend(driven);
        self.engine
            .set_blend_target_matrix(&blend, slot, &offset.to_matrix())?;
        self.record_mut(driver)?.set_offset(pose, driven, offset);
        Ok(())
    }

    pub(crate) fn delete_driven(&mut self, driver: &str, driven: &str) -> TxResult<()> {
        let naming = self.naming();
        let proxy = naming.proxy(driven);
        let parent = self.engine.parent_of(&proxy)?;
        self.engine.reparent(driven, parent.as_deref())?;
        self.engine.delete_node(&naming.blend(driven))?;
        self.engine.delete_node(&proxy)?;
        self.record_mut(driver)?.remove_driven(driven);
        Ok(())
    }

    pub(crate) fn recompute_falloffs(&mut self) -> TxResult<()> {
        let naming = self.naming();
        let work: Vec<(String, Vec<String>)> = self
            .store
            .records()
            .values()
            .map(|r| {
                (
                    naming.solver(r.driver()),
                    r.poses().names().map(str::to_string).collect(),
                )
            })
            .collect();
        for (solver, poses) in work {
            for pose in poses {
                self.engine.recompute_falloff(&solver, &pose)?;
            }
        }
        Ok(())
    }
}
