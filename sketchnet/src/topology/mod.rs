//! Topology Model
//!
//! Owns the components, terminals and wires of a sketch and exposes the
//! mutation operations the editor calls. Every mutation keeps wires
//! orthogonal and pinned points glued to their terminals.

pub mod model;
pub mod schema;

use thiserror::Error;

pub use model::{TopologyModel, WireHit};
pub use schema::*;

/// Errors raised at the mutation boundary
///
/// Every failing operation leaves the model untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("Invalid wire: {0}")]
    InvalidWire(String),

    #[error("Unknown component: {0}")]
    MissingComponent(ComponentId),

    #[error("Unknown wire: {0}")]
    MissingWire(WireId),

    #[error("Component already exists: {0}")]
    DuplicateComponent(ComponentId),

    #[error("Invalid component: {0}")]
    InvalidComponent(String),

    #[error("Cannot split wire: {0}")]
    InvalidSplit(String),

    #[error("Rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),
}
