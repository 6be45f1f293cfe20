use fp_core::{CodecError, NodeId, StoreError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("select at least one ungrouped, non-group node to create a group")]
    EmptySelection,

    #[error("`{0}` is not a group")]
    NotAGroup(NodeId),

    #[error("no node with id `{0}`")]
    NotFound(NodeId),

    #[error("id `{0}` is already in use")]
    IdInUse(NodeId),

    #[error("moving `{node}` into `{group}` would nest a group inside itself")]
    Cycle { node: NodeId, group: NodeId },
}

/// Failures writing or reading persisted documents. The live graph is
/// never modified when one of these is returned.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("no directory selected")]
    NoDirectorySelected,

    #[error("directory {} is no longer writable", .0.display())]
    DirectoryUnavailable(PathBuf),

    #[error("version store encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("version store decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("no saved version with id {0}")]
    VersionNotFound(u64),
}

/// Anything an editor action can fail with.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("invalid connection: {0}")]
    InvalidConnection(&'static str),

    #[error("unknown alignment `{0}`")]
    UnknownAlignment(String),
}
