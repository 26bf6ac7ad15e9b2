//! Type descriptors (`.type` entries)

use serde::{Deserialize, Serialize};

use crate::module::loader::CodeUnit;
use crate::module::traits::ModuleError;

/// Parsed `.type` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,

    /// Module configuration marker
    #[serde(default)]
    pub configuration: bool,

    /// Module entry marker
    #[serde(default)]
    pub entry: Option<EntryMarker>,
}

/// `[entry]` table of a type descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMarker {
    /// Module API version the type was built against
    #[serde(default)]
    pub api: Option<u32>,

    /// Environment overrides, in declaration order
    #[serde(default)]
    pub env: Vec<EnvOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOverride {
    pub key: String,
    pub value: String,
}

impl TypeDescriptor {
    pub fn parse(contents: &str) -> Result<Self, ModuleError> {
        toml::from_str(contents).map_err(|e| ModuleError::InvalidDescriptor(e.to_string()))
    }

    /// Parse a type unit, naming the unit in the error
    pub fn from_unit(unit: &CodeUnit) -> Result<Self, ModuleError> {
        let text = unit.text().ok_or_else(|| {
            ModuleError::InvalidDescriptor(format!("{} is not valid UTF-8", unit.name))
        })?;
        Self::parse(text)
            .map_err(|e| ModuleError::InvalidDescriptor(format!("{}: {}", unit.name, e)))
    }

    pub fn is_entry(&self) -> bool {
        self.entry.is_some()
    }

    /// Declared `[entry].api`, if any
    pub fn api_version(&self) -> Option<u32> {
        self.entry.as_ref().and_then(|e| e.api)
    }

    pub fn env_overrides(&self) -> &[EnvOverride] {
        self.entry.as_ref().map(|e| e.env.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_entry() {
        let descriptor = TypeDescriptor::parse(
            r#"
name = "org.homehub.ext.ExtConfiguration"
configuration = true

[entry]
api = 1

[[entry.env]]
key = "X_HOST"
value = "${server.host}"

[[entry.env]]
key = "X_PORT"
value = "${server.port:8080}"
"#,
        )
        .unwrap();

        assert!(descriptor.configuration);
        assert!(descriptor.is_entry());
        assert_eq!(descriptor.api_version(), Some(1));
        let keys: Vec<&str> = descriptor.env_overrides().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["X_HOST", "X_PORT"]);
    }

    #[test]
    fn test_plain_component_type() {
        let descriptor = TypeDescriptor::parse(r#"name = "org.homehub.ext.Service""#).unwrap();
        assert!(!descriptor.configuration);
        assert!(!descriptor.is_entry());
        assert_eq!(descriptor.api_version(), None);
        assert!(descriptor.env_overrides().is_empty());
    }

    #[test]
    fn test_entry_without_api() {
        let descriptor = TypeDescriptor::parse("name = \"a.B\"\nconfiguration = true\n[entry]\n").unwrap();
        assert!(descriptor.is_entry());
        assert_eq!(descriptor.api_version(), None);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            TypeDescriptor::parse("configuration = ["),
            Err(ModuleError::InvalidDescriptor(_))
        ));
    }
}
