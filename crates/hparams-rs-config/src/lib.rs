//! Hierarchical hyperparameter schemas, merging, and validation.
//!
//! Each component type declares a default [`SchemaNode`] tree. User-supplied,
//! possibly partial configs are merged against it, validated, and frozen into
//! a [`ConfigAccessor`] that the component reads its parameters from.

mod accessor;
mod error;
mod merge;
pub mod raw;
mod schema;
mod utils;
mod validate;

/// Read-only view handed to components.
pub use accessor::ConfigAccessor;
/// Public error type returned by schema, merge, and access APIs.
pub use error::ConfigError;
/// Merge helpers for raw configs.
pub use merge::{fetch_subset, merge, overlay};
/// Schema model and registry.
pub use schema::{
    Component, KWARGS_KEY, LeafSchema, NO_TYPECHECK_KEY, RegistryBuilder, SchemaNode,
    SchemaRegistry, TYPE_KEY, TreeSchema, TypeTag,
};
/// Validation results.
pub use validate::{Violation, ViolationKind, ViolationReport, coerce, validate};
