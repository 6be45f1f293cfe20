use crate::id::NodeId;
use thiserror::Error;

/// Rejected graph mutations. The live state is untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("id `{0}` is already in use")]
    DuplicateId(NodeId),

    #[error("no node or edge with id `{0}`")]
    NotFound(NodeId),

    #[error("edge `{edge}` references unknown node `{node}`")]
    DanglingEndpoint { edge: NodeId, node: NodeId },
}

/// Failures decoding a persisted flow document.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document is missing the `{0}` array")]
    MissingField(&'static str),

    #[error("`{field}` must be an array")]
    NotAnArray { field: &'static str },

    #[error("{field}[{index}] is malformed: {source}")]
    InvalidRecord {
        field: &'static str,
        index: usize,
        source: serde_json::Error,
    },
}
