//! Unified error type for model construction.
//!
//! Every failure that aborts a build carries the entity it concerns (a node,
//! a technology at a node, a constraint) and the offending field, so that a
//! broken case file can be fixed without a debugger.
//!
//! # Example
//!
//! ```
//! use ehub_core::{EhubError, EhubResult};
//!
//! fn lookup(found: bool) -> EhubResult<f64> {
//!     if !found {
//!         return Err(EhubError::missing("node 'onshore'", "demand[electricity]"));
//!     }
//!     Ok(1.0)
//! }
//!
//! assert!(lookup(false).is_err());
//! ```

use crate::units::Unit;
use thiserror::Error;

/// Error type for all energy-hub operations.
#[derive(Error, Debug)]
pub enum EhubError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// A referenced key is absent from the data surface.
    #[error("missing data for {entity}: {field}")]
    MissingData { entity: String, field: String },

    /// A value is present but unusable (wrong type, out of range, unknown option).
    #[error("invalid value for {entity}: {field} ({reason})")]
    InvalidValue {
        entity: String,
        field: String,
        reason: String,
    },

    /// The archetype has no constraint generator.
    #[error("technology '{technology}' at node '{node}': archetype {archetype} has no constraint generator")]
    UnsupportedArchetype {
        node: String,
        technology: String,
        archetype: String,
    },

    /// A technology is re-added with an archetype that differs from the active one.
    #[error("technology '{technology}' at node '{node}' is active as {existing} and cannot be redefined as {requested}")]
    TechnologyRedefinition {
        node: String,
        technology: String,
        existing: String,
        requested: String,
    },

    /// Dimensional inconsistency between the two sides of a constraint or a sum.
    #[error("unit mismatch in {entity}, constraint {constraint}: expected {expected}, found {found}")]
    UnitMismatch {
        entity: String,
        constraint: String,
        expected: Unit,
        found: Unit,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Solver/lowering errors
    #[error("Solver error: {0}")]
    Solver(String),
}

/// Convenience type alias for Results using EhubError.
pub type EhubResult<T> = Result<T, EhubError>;

impl EhubError {
    pub fn missing(entity: impl Into<String>, field: impl Into<String>) -> Self {
        EhubError::MissingData {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn invalid(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EhubError::InvalidValue {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EhubError {
    fn from(err: serde_json::Error) -> Self {
        EhubError::Parse(err.to_string())
    }
}

/// Human-readable label for a node, used as the `entity` of errors.
pub fn node_entity(node: &str) -> String {
    format!("node '{node}'")
}

/// Human-readable label for a technology at a node.
pub fn technology_entity(node: &str, technology: &str) -> String {
    format!("technology '{technology}' at node '{node}'")
}
