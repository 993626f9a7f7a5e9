use thiserror::Error;

use super::NodeId;
use crate::design::DesignError;

/// The result of a graph operation.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error returned when a graph operation failed.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The node is already driven by a different gate (or the same gate over other fanins).
    #[error("node {0} already has a different driver")]
    DuplicateDriver(NodeId),

    /// The node with given id does not exist.
    #[error("node with id={0} does not exist")]
    NodeDoesNotExist(NodeId),

    /// More fanins than the gate kind reads.
    #[error("gate of node {0} reads {1} fanins, got {2}")]
    FaninCount(NodeId, usize, usize),

    /// The graph has reached an invalid state. This should never happen.
    #[error("the graph has reached an invalid state - this should not happen - error: {0}")]
    InvalidState(String),

    /// Just forwarding a [`DesignError`].
    #[error("{0}")]
    DesignError(#[from] DesignError),
}
