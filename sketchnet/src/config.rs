//! Sketch configuration
//!
//! Tunables shared by the editor-facing queries. Every field has a default,
//! so a config file (or the `config` block of a sketch document) only needs
//! to name what it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::geometry::DEFAULT_GRID;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    /// Grid unit in canvas pixels
    pub grid: i64,
    pub snap: SnapConfig,
    pub drag: DragConfig,
    pub netlist: NetlistConfig,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            grid: DEFAULT_GRID,
            snap: SnapConfig::default(),
            drag: DragConfig::default(),
            netlist: NetlistConfig::default(),
        }
    }
}

impl SketchConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: SketchConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        tracing::debug!("Loaded sketch config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid <= 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be positive, got {}",
                self.grid
            )));
        }
        if self.snap.radius < 0.0 {
            return Err(ConfigError::Invalid("snap.radius must not be negative".into()));
        }
        if self.drag.lock_threshold < self.drag.reset_radius {
            return Err(ConfigError::Invalid(
                "drag.lock_threshold must be at least drag.reset_radius".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Pick radius for snap candidates, in canvas pixels
    pub radius: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_GRID as f64 / 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Pointer distance from the anchor under which the axis is undetermined
    pub reset_radius: f64,
    /// Pointer distance at which the dominant axis gets locked
    pub lock_threshold: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            reset_radius: DEFAULT_GRID as f64 / 2.0,
            lock_threshold: DEFAULT_GRID as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetlistConfig {
    /// Title written as the leading `*` comment of the netlist
    pub title: String,
}

impl Default for NetlistConfig {
    fn default() -> Self {
        Self {
            title: "sketchnet circuit".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = SketchConfig::from_json(r#"{"grid": 10, "drag": {"lock_threshold": 30}}"#)
            .unwrap();
        assert_eq!(config.grid, 10);
        assert_eq!(config.drag.lock_threshold, 30.0);
        assert_eq!(config.drag.reset_radius, 10.0);
        assert_eq!(config.snap, SnapConfig::default());
    }

    #[test]
    fn test_rejects_non_positive_grid() {
        let err = SketchConfig::from_json(r#"{"grid": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.json");
        std::fs::write(&path, r#"{"netlist": {"title": "bench"}}"#).unwrap();
        let config = SketchConfig::from_file(&path).unwrap();
        assert_eq!(config.netlist.title, "bench");
    }
}
