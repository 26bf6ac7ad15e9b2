//! Configuration management for the module loader
//!
//! Handles loading `hub.toml`, defaults, and validation.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Module system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Enable module system
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory watched for module archives
    #[serde(default = "default_modules_dir")]
    pub modules_dir: String,

    /// Shared root under which every module gets its private working directory
    #[serde(default = "default_extraction_root")]
    pub extraction_root: String,

    /// Host namespace; only dependencies inside it take part in load ordering
    #[serde(default = "default_host_namespace")]
    pub host_namespace: String,

    /// File extensions recognised as module archives
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// Built-in modules that are always satisfied
    #[serde(default)]
    pub internal_modules: Vec<String>,

    /// Archive entries up to this size are held in memory by the code loader
    #[serde(default = "default_inline_limit")]
    pub inline_limit: u64,
}

fn default_true() -> bool {
    true
}

fn default_modules_dir() -> String {
    "modules".to_string()
}

fn default_extraction_root() -> String {
    std::env::temp_dir()
        .join("homehub-modules")
        .to_string_lossy()
        .to_string()
}

fn default_host_namespace() -> String {
    "org.homehub".to_string()
}

fn default_archive_extensions() -> Vec<String> {
    vec!["zip".to_string(), "mod".to_string(), "jar".to_string()]
}

fn default_inline_limit() -> u64 {
    1024 * 1024 // 1 MiB
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            modules_dir: default_modules_dir(),
            extraction_root: default_extraction_root(),
            host_namespace: default_host_namespace(),
            archive_extensions: default_archive_extensions(),
            internal_modules: Vec::new(),
            inline_limit: default_inline_limit(),
        }
    }
}

impl ModuleConfig {
    pub fn modules_dir(&self) -> PathBuf {
        PathBuf::from(&self.modules_dir)
    }

    pub fn extraction_root(&self) -> PathBuf {
        PathBuf::from(&self.extraction_root)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "homehub_modules::module=debug")
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Hub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    /// Module system configuration
    #[serde(default)]
    pub modules: Option<ModuleConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: Option<LoggingConfig>,

    /// Host environment properties, the lowest-priority property source
    /// modules can reference through `${...}` placeholders
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl HubConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: HubConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Module configuration, or defaults when the section is absent
    pub fn module_config(&self) -> ModuleConfig {
        self.modules.clone().unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref modules) = self.modules {
            modules.validate()?;
        }
        Ok(())
    }
}

impl ModuleConfig {
    /// Validate module configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.modules_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("modules_dir must not be empty"));
        }
        if self.extraction_root.trim().is_empty() {
            return Err(anyhow::anyhow!("extraction_root must not be empty"));
        }
        if self.host_namespace.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "host_namespace must not be empty (dependency filtering needs it)"
            ));
        }
        if self.archive_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "archive_extensions must list at least one extension"
            ));
        }
        if self.inline_limit == 0 {
            return Err(anyhow::anyhow!("inline_limit must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config: HubConfig = toml::from_str(
            r#"
            [modules]
            modules_dir = "/srv/hub/modules"
            extraction_root = "/tmp/hub"
            internal_modules = ["core", "ui"]

            [logging]
            filter = "debug"

            [environment]
            "server.host" = "10.0.0.5"
            "#,
        )
        .unwrap();

        let modules = config.module_config();
        assert_eq!(modules.modules_dir, "/srv/hub/modules");
        assert_eq!(modules.internal_modules, vec!["core", "ui"]);
        assert_eq!(modules.host_namespace, "org.homehub");
        assert_eq!(config.environment["server.host"], "10.0.0.5");
        assert_eq!(config.logging.unwrap().filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_validate_rejects_empty_namespace() {
        let config = HubConfig {
            modules: Some(ModuleConfig {
                host_namespace: " ".to_string(),
                ..ModuleConfig::default()
            }),
            ..HubConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(HubConfig::default().validate().is_ok());
        assert!(ModuleConfig::default().validate().is_ok());
    }
}
