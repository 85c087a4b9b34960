use thiserror::Error;

use crate::record::NodeId;

pub use anyhow::Error as RuntimeError;

/// Structural problems with a snapshot. An update that fails with one of
/// these leaves the displayed tree and all running effects untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Duplicate node id '{0}' in snapshot")]
    DuplicateId(NodeId),

    #[error("Root node '{0}' not found in snapshot")]
    RootNotFound(NodeId),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't parse configuration.\n{0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Couldn't parse snapshot.\n{0}")]
    Parse(#[from] serde_json::Error),

    #[error("Graph view is no longer accepting snapshots")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("Effect timers need a running tokio runtime.\n{0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
