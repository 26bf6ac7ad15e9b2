//! Manifest validation
//!
//! Validates module manifests for structure before they enter the registry.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::module::registry::manifest::ModuleManifest;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with specific errors
    Invalid(Vec<String>),
}

/// Manifest validator
pub struct ManifestValidator {
    /// Longest accepted module id
    max_id_len: usize,
}

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self { max_id_len: 64 }
    }

    /// Validate a module manifest
    pub fn validate(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut errors = Vec::new();
        let module = &manifest.module;

        if !self.is_valid_id(&module.id) {
            errors.push(format!(
                "Invalid module id: {} (must be alphanumeric with dashes/underscores)",
                module.id
            ));
        }

        if !is_valid_dotted_name(&module.namespace) {
            errors.push(format!("Invalid namespace: {}", module.namespace));
        }

        if module.version.is_empty() {
            errors.push("Module version cannot be empty".to_string());
        } else if !is_valid_version(&module.version) {
            errors.push(format!(
                "Invalid version format: {} (expected semantic versioning)",
                module.version
            ));
        }

        if let Some(ref entry_point) = module.entry_point {
            if !is_valid_dotted_name(entry_point) {
                errors.push(format!("Invalid entry point type name: {}", entry_point));
            }
        }

        errors.extend(self.validate_dependencies(manifest));

        if errors.is_empty() {
            debug!("Manifest validation passed for module: {}", module.id);
            ValidationResult::Valid
        } else {
            warn!("Manifest validation failed for module {}: {:?}", module.id, errors);
            ValidationResult::Invalid(errors)
        }
    }

    #[inline]
    fn is_valid_id(&self, id: &str) -> bool {
        if id.is_empty() || id.len() > self.max_id_len {
            return false;
        }
        if !id.chars().next().map_or(false, |c| c.is_ascii_alphanumeric()) {
            return false;
        }
        id.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn validate_dependencies(&self, manifest: &ModuleManifest) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for dep in &manifest.dependencies {
            if !self.is_valid_id(&dep.id) {
                errors.push(format!("Invalid dependency id: {}", dep.id));
            }
            if !is_valid_dotted_name(&dep.namespace) {
                errors.push(format!(
                    "Invalid namespace {} for dependency {}",
                    dep.namespace, dep.id
                ));
            }
            if let Some(ref version) = dep.version {
                if !is_valid_version_or_range(version) {
                    errors.push(format!(
                        "Invalid dependency version format: {} (for dependency: {})",
                        version, dep.id
                    ));
                }
            }
            if dep.id == manifest.module.id && dep.namespace == manifest.module.namespace {
                errors.push(format!("Module {} depends on itself", dep.id));
            }
            if !seen.insert((dep.namespace.as_str(), dep.id.as_str())) {
                errors.push(format!("Duplicate dependency: {}:{}", dep.namespace, dep.id));
            }
        }

        errors
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// `org.homehub.ext` style names: non-empty segments of identifier characters
fn is_valid_dotted_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '$')
        })
}

/// Semantic version: major.minor[.patch][-prerelease][+build]
fn is_valid_version(version: &str) -> bool {
    let base = version.split('+').next().unwrap_or_default();
    let core = base.split('-').next().unwrap_or_default();
    let nums: Vec<&str> = core.split('.').collect();

    if nums.len() < 2 || nums.len() > 3 {
        return false;
    }
    nums.iter()
        .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && n.parse::<u32>().is_ok())
}

/// Version or simple range (`>=1.0`, `^1.2`, `~1.2.3`)
fn is_valid_version_or_range(version: &str) -> bool {
    let trimmed = version.trim_start_matches(|c: char| matches!(c, '>' | '<' | '=' | '^' | '~'));
    is_valid_version(trimmed)
}
