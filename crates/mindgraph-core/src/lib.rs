use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod error;
pub mod settings;
pub mod tree;

pub use error::TreeError;
pub use settings::{ThemeMode, UiSettings};
pub use tree::{FlatNode, Tree, TreeNode, TreeStats};

/// Identity of a tree node. Assigned once by the owning [`Tree`] and never reused
/// while that tree lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t_{}", self.0)
    }
}

/// Shape of the source value a node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum NodeKind {
    ARRAY,
    OBJECT,
    PRIMITIVE,
}

/// Error type for enum conversion failures
#[derive(Error, Debug, Clone)]
pub enum EnumConversionError {
    #[error("Invalid NodeKind value: {0}")]
    InvalidNodeKind(i32),
    #[error("Invalid NodeKind name: {0}")]
    InvalidNodeKindName(String),
}

impl NodeKind {
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(_) => NodeKind::ARRAY,
            serde_json::Value::Object(_) => NodeKind::OBJECT,
            _ => NodeKind::PRIMITIVE,
        }
    }

    pub fn is_container(self) -> bool {
        !matches!(self, NodeKind::PRIMITIVE)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::ARRAY => "array",
            NodeKind::OBJECT => "object",
            NodeKind::PRIMITIVE => "primitive",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for NodeKind {
    type Error = EnumConversionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeKind::ARRAY),
            1 => Ok(NodeKind::OBJECT),
            2 => Ok(NodeKind::PRIMITIVE),
            _ => Err(EnumConversionError::InvalidNodeKind(value)),
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = EnumConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array" => Ok(NodeKind::ARRAY),
            "object" => Ok(NodeKind::OBJECT),
            "primitive" => Ok(NodeKind::PRIMITIVE),
            other => Err(EnumConversionError::InvalidNodeKindName(other.to_string())),
        }
    }
}

/// Render a scalar the way it appears in a leaf label: strings verbatim, everything
/// else in its JSON form.
pub fn scalar_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
