use chrono::{DateTime, Utc};
use mindgraph_core::TreeNode;
use mindgraph_graph::GraphState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const EXPORT_VERSION: &str = "2.0";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Nothing to export")]
    NothingToExport,
    #[error("Failed to encode export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub created: DateTime<Utc>,
    pub nodes: usize,
    pub links: usize,
    pub version: String,
}

/// The JSON export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub tree: TreeNode,
    pub original_data: String,
}

impl ExportDocument {
    /// Counts are those of the visible graph at export time.
    pub fn build(
        tree: Option<&TreeNode>,
        graph: &GraphState,
        input: &str,
    ) -> Result<Self, ExportError> {
        let tree = tree.ok_or(ExportError::NothingToExport)?;
        Ok(Self {
            metadata: ExportMetadata {
                created: Utc::now(),
                nodes: graph.node_count(),
                links: graph.link_count(),
                version: EXPORT_VERSION.to_string(),
            },
            tree: tree.clone(),
            original_data: input.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), ExportError> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Exported {} nodes to {:?}", self.metadata.nodes, path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindgraph_core::Tree;
    use mindgraph_graph::{Reconciler, Vec2, project};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_export_document_shape() {
        let input = r#"{"a": 1, "b": {"c": 2}}"#;
        let tree = Tree::from_value(&serde_json::from_str(input).unwrap());
        let graph = Reconciler::with_seed(100.0, Duration::ZERO, 1)
            .reconcile(GraphState::new(), project(tree.root()), Vec2::ZERO)
            .state;

        let doc = ExportDocument::build(tree.root(), &graph, input).unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert_eq!(value["metadata"]["nodes"], json!(4));
        assert_eq!(value["metadata"]["links"], json!(3));
        assert_eq!(value["metadata"]["version"], json!("2.0"));
        assert_eq!(value["originalData"], json!(input));
        assert_eq!(value["tree"]["children"][1]["label"], json!("b"));

        let created = value["metadata"]["created"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
    }

    #[test]
    fn test_empty_tree_has_nothing_to_export() {
        assert!(matches!(
            ExportDocument::build(None, &GraphState::new(), ""),
            Err(ExportError::NothingToExport)
        ));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let tree = Tree::from_value(&json!([true]));
        let doc = ExportDocument::build(tree.root(), &GraphState::new(), "[true]").unwrap();
        doc.write_to(&path).unwrap();

        let read: ExportDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, doc);
    }
}
