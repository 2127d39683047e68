//! psd-posespace: pose-space deformation rig authoring.
//!
//! A [`PoseSpaceManager`] keeps one [`PoseSpaceRecord`] per driver and mirrors
//! every change into a [`GeometricEngine`](psd_engine_core::GeometricEngine):
//! an interpolation solver per driver, and a blend node plus proxy parent per
//! driven target. Each pose occupies the same index on the solver and the same
//! slot on every blend node of its driver; the manager keeps that alignment
//! through additions, deletions and mirroring.

pub mod config;
pub mod error;
pub mod manager;
pub mod mirror;
pub mod naming;
pub mod persist;
pub mod query;
pub mod record;
pub mod store;

pub use config::ManagerConfig;
pub use error::{PoseSpaceError, Result};
pub use manager::PoseSpaceManager;
pub use mirror::InversionFlags;
pub use naming::{MirrorConvention, MirrorMapping, NodeNaming};
pub use persist::RigDocument;
pub use query::{DriverRow, PoseRow};
pub use record::{DrivenOffset, PoseRecord, PoseSpaceRecord, PoseTable};
pub use store::MetadataStore;
