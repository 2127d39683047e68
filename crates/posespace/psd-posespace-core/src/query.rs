//! Read-only views for host tooling: tables of drivers, poses and offsets, and
//! a consistency audit of the store against the engine.

use psd_engine_core::GeometricEngine;
use serde::Serialize;

use crate::error::{PoseSpaceError, Result};
use crate::manager::PoseSpaceManager;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverRow {
    pub driver: String,
    pub controller: String,
}

/// One pose as `[tx, ty, tz, rx, ry, rz]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseRow {
    pub name: String,
    pub values: [f64; 6],
}

impl<E: GeometricEngine> PoseSpaceManager<E> {
    pub fn drivers(&self) -> Vec<DriverRow> {
        self.store
            .records()
            .values()
            .map(|r| DriverRow {
                driver: r.driver().to_string(),
                controller: r.controller().to_string(),
            })
            .collect()
    }

    /// Controller vectors per pose, in slot order.
    pub fn pose_table(&self, driver: &str) -> Result<Vec<PoseRow>> {
        Ok(self
            .record(driver)?
            .poses()
            .iter()
            .map(|(name, pose)| PoseRow {
                name: name.to_string(),
                values: pose.vector().as_array(),
            })
            .collect())
    }

    pub fn driven_list(&self, driver: &str) -> Result<Vec<String>> {
        Ok(self.record(driver)?.driven().to_vec())
    }

    /// Offsets of one driven target per pose, in slot order.
    pub fn driven_table(&self, driver: &str, driven: &str) -> Result<Vec<PoseRow>> {
        let record = self.record(driver)?;
        if !record.has_driven(driven) {
            return Err(PoseSpaceError::not_found("driven", driven));
        }
        Ok(record
            .poses()
            .iter()
            .map(|(name, pose)| PoseRow {
                name: name.to_string(),
                values: pose
                    .offset(driven)
                    .map(|o| o.as_array())
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Live activation of each pose of `driver`, in slot order.
    pub fn pose_weights(&self, driver: &str) -> Result<Vec<f64>> {
        self.record(driver)?;
        let solver = self.naming().solver(driver);
        self.engine
            .solver_weights(&solver)
            .map_err(|_| PoseSpaceError::not_found("solver", solver))
    }

    /// Every place the store and the engine disagree: pose order versus
    /// solver order, driven lists versus blend membership, missing rig nodes
    /// or slot counts. Empty when the rig is consistent.
    pub fn audit(&self) -> Vec<String> {
        let naming = self.naming();
        let mut problems = Vec::new();
        for record in self.store.records().values() {
            let driver = record.driver();
            let solver = naming.solver(driver);
            let names: Vec<String> = record.poses().names().map(str::to_string).collect();
            match self.engine.pose_names(&solver) {
                Ok(solver_names) if solver_names == names => {}
                Ok(solver_names) => problems.push(format!(
                    "{driver}: poses {names:?} but solver has {solver_names:?}"
                )),
                Err(err) => problems.push(format!("{driver}: {err}")),
            }

            let mut expected: Vec<String> = record.driven().iter().map(|d| naming.blend(d)).collect();
            expected.sort();
            let weighted = self.engine.blends_weighted_by(&solver);
            if !record.poses().is_empty() && weighted != expected {
                problems.push(format!(
                    "{driver}: driven blends {expected:?} but solver weights {weighted:?}"
                ));
            }

            for driven in record.driven() {
                let blend = naming.blend(driven);
                match self.engine.blend_target_count(&blend) {
                    Ok(count) if count == names.len() => {}
                    Ok(count) => problems.push(format!(
                        "{driver}: blend '{blend}' has {count} slot(s) for {} pose(s)",
                        names.len()
                    )),
                    Err(err) => problems.push(format!("{driver}: {err}")),
                }
                let proxy = naming.proxy(driven);
                match self.engine.blend_driving(&proxy) {
                    Ok(Some(b)) if b == blend => {}
                    Ok(_) => problems.push(format!("{driver}: '{proxy}' is not driven by '{blend}'")),
                    Err(err) => problems.push(format!("{driver}: {err}")),
                }
            }
        }
        problems
    }
}
