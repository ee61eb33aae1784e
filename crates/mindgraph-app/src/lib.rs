//! Application layer of the mind map: owns the document tree, routes every
//! interaction through named operations, and keeps history, search, sessions
//! and the force layout in step with it.

pub mod config;
pub mod controller;
pub mod demo;
pub mod error;
pub mod export;
pub mod history;
pub mod parse;
pub mod share;
pub mod worker;

pub use config::{ConfigError, MindMapConfig};
pub use controller::{AppState, ContextAction, EditSession, MindMapController};
pub use error::ControllerError;
pub use export::{ExportDocument, ExportError, ExportMetadata};
pub use history::{DEFAULT_MAX_HISTORY, HistoryEntry, HistoryManager};
pub use parse::{InputFormat, ParseError, ParsedInput, format_input, parse_input};
pub use share::ShareError;
pub use worker::{ParseOutcome, ParseWorker, Ticket};
