//! Module validation framework
//!
//! Structural checks applied to manifests before they enter the registry.

pub mod manifest_validator;

pub use manifest_validator::{ManifestValidator, ValidationResult};
