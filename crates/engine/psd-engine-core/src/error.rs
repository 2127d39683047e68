//! Errors raised by geometric engine calls. Every variant carries the name of
//! the engine operation that failed.

use thiserror::Error;

use crate::node::NodeKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("{op}: node '{node}' does not exist")]
    NodeNotFound { op: &'static str, node: String },

    #[error("{op}: node '{node}' already exists")]
    NodeExists { op: &'static str, node: String },

    #[error("{op}: node '{node}' is not a {expected} node")]
    WrongKind {
        op: &'static str,
        node: String,
        expected: NodeKind,
    },

    #[error("{op}: pose '{pose}' is not registered on solver '{solver}'")]
    PoseNotFound {
        op: &'static str,
        solver: String,
        pose: String,
    },

    #[error("{op}: pose '{pose}' is already registered on solver '{solver}'")]
    PoseExists {
        op: &'static str,
        solver: String,
        pose: String,
    },

    #[error("{op}: slot {index} out of range on '{node}' ({len} slots)")]
    SlotOutOfRange {
        op: &'static str,
        node: String,
        index: usize,
        len: usize,
    },

    #[error("{op}: '{node}' channels are driven by '{driver}'")]
    Connected {
        op: &'static str,
        node: String,
        driver: String,
    },

    #[error("{op}: attribute '{node}.{attr}' does not exist")]
    AttributeNotFound {
        op: &'static str,
        node: String,
        attr: String,
    },

    #[error("{op}: parenting '{node}' under '{parent}' would create a cycle")]
    Cycle {
        op: &'static str,
        node: String,
        parent: String,
    },

    #[error("{op}: matrix of '{node}' is not invertible")]
    Singular { op: &'static str, node: String },

    #[error("{op}: expected index {expected}, engine reported {actual}")]
    IndexMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{op}: injected failure")]
    Injected { op: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
