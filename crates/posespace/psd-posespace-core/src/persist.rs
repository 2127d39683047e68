//! Rig files: the metadata store as JSON, and rebuilding a rig from one.
//!
//! A document maps driver id to its [`PoseSpaceRecord`]. Loading does not
//! deserialize engine state; it replays the authoring operations, so the
//! rebuilt solver and blend nodes come from the same code paths as hand
//! authoring.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};
use psd_engine_core::{GeometricEngine, PoseVector};

use crate::error::Result;
use crate::manager::PoseSpaceManager;
use crate::record::PoseSpaceRecord;
use crate::store::MetadataStore;

pub type RigDocument = IndexMap<String, PoseSpaceRecord>;

pub fn to_json(store: &MetadataStore) -> Result<String> {
    Ok(serde_json::to_string_pretty(store.records())?)
}

pub fn from_json(text: &str) -> Result<RigDocument> {
    Ok(serde_json::from_str(text)?)
}

/// Write the store to `path`. Returns the path written.
pub fn dump(path: impl AsRef<Path>, store: &MetadataStore) -> Result<PathBuf> {
    let path = path.as_ref().to_path_buf();
    fs::write(&path, to_json(store)?)?;
    info!("rig: wrote {} driver(s) to {}", store.len(), path.display());
    Ok(path)
}

/// Read a rig file and rebuild it onto `manager`'s engine.
pub fn load<E: GeometricEngine>(
    path: impl AsRef<Path>,
    manager: &mut PoseSpaceManager<E>,
) -> Result<RigDocument> {
    let path = path.as_ref();
    let doc = from_json(&fs::read_to_string(path)?)?;
    replay(&doc, manager)?;
    info!("rig: loaded {} driver(s) from {}", doc.len(), path.display());
    Ok(doc)
}

/// Re-author every record in `doc` as one atomic batch.
///
/// Per driver: register, bind each driven target, then per pose pose the
/// controller, add the pose, place each driven target at its stored offset and
/// bake it. Controllers are left at identity afterwards.
pub fn replay<E: GeometricEngine>(doc: &RigDocument, manager: &mut PoseSpaceManager<E>) -> Result<()> {
    manager.batch(|mgr| {
        for record in doc.values() {
            let driver = record.driver();
            let controller = record.controller();
            mgr.register_driver(driver, controller)?;
            for driven in record.driven() {
                mgr.add_driven(driver, driven)?;
            }
            for (name, pose) in record.poses().iter() {
                mgr.set_node_pose(controller, pose.vector())?;
                mgr.add_pose(driver, name)?;
                for (driven, offset) in pose.offsets() {
                    mgr.set_node_pose(driven, *offset)?;
                    mgr.update_driven(driver, name, driven)?;
                }
            }
            mgr.set_node_pose(controller, PoseVector::IDENTITY)?;
            debug!(
                "rig: replayed '{driver}' ({} pose(s), {} driven)",
                record.poses().len(),
                record.driven().len()
            );
        }
        Ok(())
    })
}
