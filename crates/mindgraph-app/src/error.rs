use crate::export::ExportError;
use crate::parse::ParseError;
use crate::share::ShareError;
use mindgraph_core::TreeError;
use mindgraph_storage::StorageError;
use thiserror::Error;

/// Failures surfaced by [`crate::MindMapController`]. Each one is also published on
/// the event bus, and none leaves the tree or layout partially changed.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Rejected: {0}")]
    Structural(#[from] TreeError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("No storage attached")]
    NoStorage,
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
    #[error("Share error: {0}")]
    Share(#[from] ShareError),
    #[error("Nothing to {0}")]
    NothingToRestore(&'static str),
}
