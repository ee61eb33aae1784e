use mindgraph_graph::{ForceConfig, NodeSizing, SimulationConfig, ZoomConfig};
use mindgraph_search::SearchConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Every tunable of the engine. Each section is optional in the JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindMapConfig {
    pub visualization: VisualizationConfig,
    pub ui: UiConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    pub forces: ForceConfig,
    pub nodes: NodeSizing,
    pub simulation: SimulationConfig,
    pub animations: AnimationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub enter_ms: u64,
    pub exit_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            enter_ms: 400,
            exit_ms: 300,
        }
    }
}

impl AnimationConfig {
    /// How long exited nodes linger. Zero when animations are switched off.
    pub fn exit_duration(&self, animations: bool) -> Duration {
        if animations {
            Duration::from_millis(self.exit_ms)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub width: f32,
    pub height: f32,
    pub zoom: ZoomConfig,
    pub search: SearchConfig,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            zoom: ZoomConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub session_key: String,
    pub settings_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_key: "jsonMindMapSession".to_string(),
            settings_key: "jsonMindMapSettings".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_size: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Node count above which a load logs a warning and notifies the user.
    pub large_data_threshold: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            large_data_threshold: 1000,
        }
    }
}

impl MindMapConfig {
    /// `<config dir>/mindgraph/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mindgraph").join("config.json"))
    }

    /// Load from `path`. A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: MindMapConfig = serde_json::from_str(
            r#"{"visualization": {"forces": {"charge_strength": -120.0}}, "history": {"max_size": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.visualization.forces.charge_strength, -120.0);
        assert_eq!(config.visualization.forces.link_distance, 80.0);
        assert_eq!(config.visualization.nodes, NodeSizing::default());
        assert_eq!(config.history.max_size, 5);
        assert_eq!(config.storage.session_key, "jsonMindMapSession");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MindMapConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, MindMapConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            MindMapConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = MindMapConfig::default();
        config.ui.search.debounce_ms = 10;
        config.save(&path).unwrap();
        assert_eq!(MindMapConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_exit_duration_respects_animations() {
        let animations = AnimationConfig::default();
        assert_eq!(animations.exit_duration(true), Duration::from_millis(300));
        assert_eq!(animations.exit_duration(false), Duration::ZERO);
    }
}
