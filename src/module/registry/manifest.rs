//! Module manifest parsing
//!
//! Every module archive carries a `module.toml` describing its identity and
//! the modules it depends on:
//!
//! ```toml
//! [module]
//! id = "ext"
//! namespace = "org.homehub"
//! version = "1.2.0"
//! entry_point = "org.homehub.ext.ExtConfiguration"   # optional
//!
//! [[dependencies]]
//! namespace = "org.homehub"
//! id = "base"
//! ```

use crate::module::traits::ModuleError;
use serde::{Deserialize, Serialize};

/// File name of the manifest inside a module archive
pub const MANIFEST_FILE: &str = "module.toml";

/// Module manifest (module.toml structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module: ManifestModule,
    /// Declared dependencies, host and foreign namespaces alike
    #[serde(default)]
    pub dependencies: Vec<ManifestDependency>,
}

/// `[module]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestModule {
    /// Module id (unique key in the registry)
    pub id: String,
    /// Namespace (group) the module is published under
    pub namespace: String,
    /// Module version (semantic versioning)
    pub version: String,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Entry-point type; when absent the loader scans the module's own types
    #[serde(default)]
    pub entry_point: Option<String>,
}

/// One `[[dependencies]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDependency {
    pub namespace: String,
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl ModuleManifest {
    /// Parse manifest text
    pub fn parse(contents: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest = toml::from_str(contents).map_err(|e| {
            ModuleError::InvalidDescriptor(format!("Failed to parse manifest TOML: {}", e))
        })?;

        if manifest.module.id.trim().is_empty() {
            return Err(ModuleError::InvalidDescriptor(
                "Module id cannot be empty".to_string(),
            ));
        }
        if manifest.module.namespace.trim().is_empty() {
            return Err(ModuleError::InvalidDescriptor(format!(
                "Module {} has an empty namespace",
                manifest.module.id
            )));
        }

        Ok(manifest)
    }

    /// Parse manifest bytes read from an archive entry
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModuleError> {
        let contents = std::str::from_utf8(bytes).map_err(|e| {
            ModuleError::InvalidDescriptor(format!("Manifest is not valid UTF-8: {}", e))
        })?;
        Self::parse(contents)
    }

    /// Ids of dependencies inside `host_namespace`
    ///
    /// Third-party dependencies play no part in load ordering and are dropped.
    pub fn host_dependencies<'a>(
        &'a self,
        host_namespace: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.dependencies
            .iter()
            .filter(move |dep| in_namespace(&dep.namespace, host_namespace))
            .map(|dep| dep.id.as_str())
    }
}

/// `namespace` equals `root` or is a dotted sub-namespace of it
pub fn in_namespace(namespace: &str, root: &str) -> bool {
    namespace == root
        || namespace
            .strip_prefix(root)
            .map_or(false, |rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXT: &str = r#"
        [module]
        id = "ext"
        namespace = "org.homehub"
        version = "1.0.0"

        [[dependencies]]
        namespace = "org.homehub"
        id = "base"

        [[dependencies]]
        namespace = "org.homehub.drivers"
        id = "ble"

        [[dependencies]]
        namespace = "com.fasterxml"
        id = "jackson"
        version = "2.15"
    "#;

    #[test]
    fn test_parse_and_filter_dependencies() {
        let manifest = ModuleManifest::parse(EXT).unwrap();
        assert_eq!(manifest.module.id, "ext");
        assert_eq!(manifest.dependencies.len(), 3);

        let deps: Vec<&str> = manifest.host_dependencies("org.homehub").collect();
        assert_eq!(deps, vec!["base", "ble"]);
    }

    #[test]
    fn test_namespace_prefix_needs_dot_boundary() {
        assert!(in_namespace("org.homehub", "org.homehub"));
        assert!(in_namespace("org.homehub.x", "org.homehub"));
        assert!(!in_namespace("org.homehubby", "org.homehub"));
        assert!(!in_namespace("org", "org.homehub"));
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = ModuleManifest::parse(
            "[module]\nid = \"\"\nnamespace = \"org.homehub\"\nversion = \"1.0.0\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ModuleError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(ModuleManifest::parse("<project/>").is_err());
        assert!(ModuleManifest::from_bytes(&[0xff, 0xfe]).is_err());
    }
}
