//! Sketch Document Format
//!
//! JSON persistence for a drawing: metadata, optional config overrides,
//! placed components and wire polylines. Loading replays the document
//! through the model's mutation API, so a malformed wire is rejected the
//! same way an interactive edit would be.
//!
//! ```json
//! {
//!   "metadata": { "title": "divider" },
//!   "components": [
//!     { "id": "R1", "type": "resistor", "position": { "x": 100, "y": 0 }, "value": "1k" }
//!   ],
//!   "wires": [ { "points": [ { "x": 60, "y": 0 }, { "x": 0, "y": 0 } ] } ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::config::{ConfigError, SketchConfig};
use crate::geometry::Point;
use crate::topology::{Component, ComponentId, ComponentKind, Rotation, TopologyError, TopologyModel};

/// Current document schema version
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sketch JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Wire {index}: {source}")]
    Wire {
        index: usize,
        #[source]
        source: TopologyError,
    },

    #[error("Component {id}: {source}")]
    Component {
        id: ComponentId,
        #[source]
        source: TopologyError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchMetadata {
    #[serde(default = "default_title")]
    pub title: String,

    /// When the document was first written
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,

    #[serde(default = "default_schema_version")]
    pub schema_version: String,
}

fn default_title() -> String {
    "untitled".to_string()
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Default for SketchMetadata {
    fn default() -> Self {
        Self {
            title: default_title(),
            created: Utc::now(),
            schema_version: default_schema_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentDoc {
    pub id: ComponentId,
    #[serde(flatten)]
    pub kind: ComponentKind,
    pub position: Point,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Local terminal offsets overriding the kind's default layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminals: Option<Vec<Point>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDoc {
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SketchDocument {
    #[serde(default)]
    pub metadata: SketchMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SketchConfig>,
    #[serde(default)]
    pub components: Vec<ComponentDoc>,
    #[serde(default)]
    pub wires: Vec<WireDoc>,
}

impl SketchDocument {
    pub fn from_json(content: &str) -> Result<Self, DocumentError> {
        let document: SketchDocument = serde_json::from_str(content)?;
        if let Some(config) = &document.config {
            config.validate()?;
        }
        Ok(document)
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_json(&content)?;
        tracing::info!(
            "Loaded sketch '{}' from {} ({} components, {} wires)",
            document.metadata.title,
            path.display(),
            document.components.len(),
            document.wires.len()
        );
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Effective config: the embedded block or the defaults.
    pub fn config(&self) -> SketchConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Build a model by replaying components, then wires.
    pub fn into_model(&self) -> Result<TopologyModel, DocumentError> {
        let mut model = TopologyModel::with_grid(self.config().grid);

        for doc in &self.components {
            let mut component = Component::new(doc.id.clone(), doc.kind.clone(), doc.position)
                .with_rotation(doc.rotation);
            if let Some(value) = &doc.value {
                component = component.with_value(value.clone());
            }
            if let Some(offsets) = &doc.terminals {
                component = component
                    .with_offsets(offsets)
                    .map_err(|source| DocumentError::Component {
                        id: doc.id.clone(),
                        source,
                    })?;
            }
            model
                .add_component(component)
                .map_err(|source| DocumentError::Component {
                    id: doc.id.clone(),
                    source,
                })?;
        }

        for (index, wire) in self.wires.iter().enumerate() {
            model
                .add_wire(&wire.points)
                .map_err(|source| DocumentError::Wire { index, source })?;
        }

        Ok(model)
    }

    /// Snapshot a model. Terminal offsets are written only when they
    /// differ from the kind's default layout.
    pub fn from_model(model: &TopologyModel, title: &str) -> Self {
        let components = model
            .components()
            .map(|c| {
                let defaults: Vec<Point> = c.kind.default_terminals().into_iter().map(|(_, o)| o).collect();
                let offsets: Vec<Point> = c.terminals().iter().map(|t| t.offset).collect();
                ComponentDoc {
                    id: c.id.clone(),
                    kind: c.kind.clone(),
                    position: c.position(),
                    rotation: c.rotation(),
                    value: Some(c.value.clone()).filter(|v| !v.is_empty()),
                    terminals: (offsets != defaults).then_some(offsets),
                }
            })
            .collect();

        let wires = model
            .wires()
            .filter_map(|w| model.wire_positions(w.id))
            .map(|points| WireDoc { points })
            .collect();

        let config = (model.grid() != SketchConfig::default().grid).then(|| SketchConfig {
            grid: model.grid(),
            ..SketchConfig::default()
        });

        Self {
            metadata: SketchMetadata {
                title: title.to_string(),
                ..SketchMetadata::default()
            },
            config,
            components,
            wires,
        }
    }
}
