//! Error types for pose-space authoring operations.

use psd_engine_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoseSpaceError {
    /// A referenced driver, pose, driven target or scene node is absent.
    #[error("{what} '{name}' does not exist")]
    NotFound { what: &'static str, name: String },

    /// Duplicate registration.
    #[error("{what} '{name}' already exists")]
    AlreadyExists { what: &'static str, name: String },

    /// Mirroring was asked for a name carrying neither side token.
    #[error("'{name}' contains neither mirror side token")]
    Naming { name: String },

    /// An engine call failed after mutation began; both the engine and the
    /// metadata store were rolled back before this was returned.
    #[error("{operation}({joined}) failed and was rolled back: {source}", joined = .args.join(", "))]
    EngineFailure {
        operation: &'static str,
        args: Vec<String>,
        #[source]
        source: EngineError,
    },

    #[error("rig file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("rig file json: {0}")]
    Json(#[from] serde_json::Error),
}

impl PoseSpaceError {
    pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    pub(crate) fn already_exists(what: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            what,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::EngineFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, PoseSpaceError>;
