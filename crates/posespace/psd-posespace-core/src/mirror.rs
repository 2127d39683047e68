//! Left/right mirroring of a whole driver.
//!
//! A mirror is fully planned before anything is touched: target names, the
//! absence of a target record, and every inversion flag are checked up front.
//! Applying the plan then runs as a single transaction.

use log::{debug, warn};
use psd_engine_core::{GeometricEngine, PoseVector};

use crate::error::{PoseSpaceError, Result};
use crate::manager::{PoseSpaceManager, Tx, TxResult};
use crate::naming::MirrorMapping;
use crate::record::DrivenOffset;

pub const TRANSLATE_FLAGS: [&str; 3] = ["invTx", "invTy", "invTz"];
pub const ROTATE_FLAGS: [&str; 3] = ["invRx", "invRy", "invRz"];

/// Per-channel sign flips read from a node's `inv*` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InversionFlags {
    pub translate: [bool; 3],
    pub rotate: [bool; 3],
}

impl InversionFlags {
    /// Read all six flags. A node lacking any of them is reported as
    /// `NotFound` naming the attribute.
    pub fn read<E: GeometricEngine + ?Sized>(engine: &E, node: &str) -> Result<Self> {
        let read = |attr: &str| {
            engine
                .flag(node, attr)
                .map_err(|_| PoseSpaceError::not_found("attribute", format!("{node}.{attr}")))
        };
        let mut flags = Self::default();
        for axis in 0..3 {
            flags.translate[axis] = read(TRANSLATE_FLAGS[axis])?;
            flags.rotate[axis] = read(ROTATE_FLAGS[axis])?;
        }
        Ok(flags)
    }

    pub fn apply(&self, pose: &PoseVector) -> PoseVector {
        let flip = |v: f64, on: bool| if on { -v } else { v };
        let mut out = *pose;
        for axis in 0..3 {
            out.translation[axis] = flip(pose.translation[axis], self.translate[axis]);
            out.rotation[axis] = flip(pose.rotation[axis], self.rotate[axis]);
        }
        out
    }
}

#[derive(Debug, Clone)]
struct MirroredPose {
    name: String,
    vector: PoseVector,
    offsets: Vec<(String, DrivenOffset)>,
}

#[derive(Debug, Clone)]
struct MirrorPlan {
    driver: String,
    controller: String,
    driven: Vec<String>,
    poses: Vec<MirroredPose>,
}

impl<E: GeometricEngine> PoseSpaceManager<E> {
    /// Build the counterpart of `driver` on the other side. Returns the new
    /// driver id.
    pub fn mirror_driver(&mut self, driver: &str) -> Result<String> {
        let plan = self
            .plan_mirror(driver)
            .inspect_err(|e| warn!("mirror_driver rejected: {e}"))?;
        self.transact("mirror_driver", &[driver], |tx| tx.apply_mirror(&plan))?;
        debug!(
            "mirror_driver: '{driver}' -> '{}' ({} pose(s), {} driven)",
            plan.driver,
            plan.poses.len(),
            plan.driven.len()
        );
        Ok(plan.driver)
    }

    fn plan_mirror(&self, driver: &str) -> Result<MirrorPlan> {
        let record = self.record(driver)?;
        let mapping: MirrorMapping<'_> = self
            .config
            .mirror
            .mapping_for(driver)
            .ok_or_else(|| PoseSpaceError::Naming {
                name: driver.to_string(),
            })?;

        let target_driver = mapping.apply(driver);
        let target_controller = mapping.apply(record.controller());
        self.require_node(&target_driver)?;
        self.require_node(&target_controller)?;
        if self.store.contains(&target_driver) {
            return Err(PoseSpaceError::already_exists("driver", target_driver));
        }
        let solver = self.naming().solver(&target_driver);
        if self.engine.exists(&solver) {
            return Err(PoseSpaceError::already_exists("solver", solver));
        }

        let controller_flags = InversionFlags::read(&self.engine, record.controller())?;
        let mut driven = Vec::with_capacity(record.driven().len());
        let mut driven_flags = Vec::with_capacity(record.driven().len());
        for source in record.driven() {
            let target = mapping.apply(source);
            self.require_node(&target)?;
            self.require_unbound(&target)?;
            if driven.contains(&target) {
                return Err(PoseSpaceError::already_exists("driven", target));
            }
            driven_flags.push(InversionFlags::read(&self.engine, source)?);
            driven.push(target);
        }

        let poses = record
            .poses()
            .iter()
            .map(|(name, pose)| MirroredPose {
                name: name.to_string(),
                vector: controller_flags.apply(&pose.vector()),
                offsets: record
                    .driven()
                    .iter()
                    .zip(driven.iter().zip(&driven_flags))
                    .filter_map(|(source, (target, flags))| {
                        pose.offset(source)
                            .map(|offset| (target.clone(), flags.apply(offset)))
                    })
                    .collect(),
            })
            .collect();

        Ok(MirrorPlan {
            driver: target_driver,
            controller: target_controller,
            driven,
            poses,
        })
    }
}

impl<E: GeometricEngine> Tx<'_, E> {
    fn apply_mirror(&mut self, plan: &MirrorPlan) -> TxResult<()> {
        self.engine
            .set_local_pose(&plan.controller, PoseVector::IDENTITY)?;
        self.register_driver(&plan.driver, &plan.controller)?;
        for target in &plan.driven {
            self.add_driven(&plan.driver, target)?;
        }
        for pose in &plan.poses {
            // the pose is captured from the controller, so write it there first
            self.engine.set_local_pose(&plan.controller, pose.vector)?;
            self.add_pose(&plan.driver, &pose.name)?;
            for (target, offset) in &pose.offsets {
                self.write_offset(&plan.driver, &pose.name, target, *offset)?;
            }
        }
        Ok(())
    }
}
