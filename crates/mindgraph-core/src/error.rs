use crate::NodeId;
use thiserror::Error;

/// Rejections raised by the named tree mutations. A failed mutation leaves the tree
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("No tree loaded")]
    Empty,
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
    #[error("The root node cannot be deleted")]
    RootDeletion,
    #[error("Label must not be empty")]
    EmptyLabel,
    #[error("Invalid tree snapshot: {0}")]
    InvalidSnapshot(String),
}
