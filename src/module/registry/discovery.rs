//! Archive store
//!
//! Lists candidate module archives in the watched modules directory.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::config::ModuleConfig;
use crate::module::context::EnvironmentProvider;
use crate::module::traits::ModuleError;
use crate::utils::result_to_option;

/// Environment key overriding the watched modules directory
pub const MODULES_DIR_PROPERTY: &str = "homehub.modules.dir";

/// Watched directory of module archives
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    /// Directory scanned for archives
    modules_dir: PathBuf,
    /// Lower-case extensions without the dot
    extensions: Vec<String>,
}

impl ArchiveStore {
    /// Create a store with the default archive extensions
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self::with_extensions(modules_dir, &ModuleConfig::default().archive_extensions)
    }

    pub fn with_extensions<P: AsRef<Path>>(modules_dir: P, extensions: &[String]) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &ModuleConfig) -> Self {
        Self::with_extensions(config.modules_dir(), &config.archive_extensions)
    }

    /// Store whose directory comes from `homehub.modules.dir`, else the config
    pub fn from_environment(env: &dyn EnvironmentProvider, config: &ModuleConfig) -> Self {
        let dir = env
            .get_property(MODULES_DIR_PROPERTY)
            .map(PathBuf::from)
            .unwrap_or_else(|| config.modules_dir());
        Self::with_extensions(dir, &config.archive_extensions)
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Whether a path looks like a module archive
    pub fn is_archive(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map_or(false, |ext| self.extensions.contains(&ext))
    }

    /// All archives in the modules directory, sorted by path
    ///
    /// A missing directory is created and yields an empty list.
    pub fn discover_archives(&self) -> Result<Vec<PathBuf>, ModuleError> {
        info!("Discovering module archives in {:?}", self.modules_dir);

        if !self.modules_dir.exists() {
            debug!("Modules directory does not exist, creating: {:?}", self.modules_dir);
            fs::create_dir_all(&self.modules_dir)
                .map_err(|e| ModuleError::extraction(&self.modules_dir, e))?;
            return Ok(Vec::new());
        }

        let entries =
            fs::read_dir(&self.modules_dir).map_err(|e| ModuleError::extraction(&self.modules_dir, e))?;

        let mut archives = Vec::new();
        for entry in entries {
            let Some(entry) = result_to_option(entry, "Skipping unreadable modules directory entry")
            else {
                continue;
            };
            let path = entry.path();
            if path.is_file() && self.is_archive(&path) {
                archives.push(path);
            } else {
                debug!("Skipping {:?}: not a module archive", path);
            }
        }
        archives.sort();

        info!("Discovered {} module archives", archives.len());
        Ok(archives)
    }

    /// Locate one archive by file name (admin-triggered install)
    ///
    /// Only plain file names are accepted; paths never leave the directory.
    pub fn find_archive(&self, file_name: &str) -> Result<PathBuf, ModuleError> {
        let mut components = Path::new(file_name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        let path = self.modules_dir.join(file_name);
        if plain && path.is_file() && self.is_archive(&path) {
            Ok(path)
        } else {
            Err(ModuleError::ModuleNotFound(format!(
                "No module archive {} in {:?}",
                file_name, self.modules_dir
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::context::Environment;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_discovers_only_archives_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["ext.mod", "base.ZIP", "readme.txt", "app.jar"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.zip")).unwrap();

        let store = ArchiveStore::new(dir.path());
        let names: Vec<String> = store
            .discover_archives()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["app.jar", "base.ZIP", "ext.mod"]);
    }

    #[test]
    fn test_missing_directory_is_created() {
        let dir = TempDir::new().unwrap();
        let store = ArchiveStore::new(dir.path().join("modules"));
        assert!(store.discover_archives().unwrap().is_empty());
        assert!(store.modules_dir().is_dir());
    }

    #[test]
    fn test_environment_overrides_directory() {
        let mut props = BTreeMap::new();
        props.insert(MODULES_DIR_PROPERTY.to_string(), "/srv/hub/modules".to_string());
        let env = Environment::from_map("host", props);

        let store = ArchiveStore::from_environment(&env, &ModuleConfig::default());
        assert_eq!(store.modules_dir(), Path::new("/srv/hub/modules"));
    }

    #[test]
    fn test_find_archive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ext.mod"), b"").unwrap();
        let store = ArchiveStore::new(dir.path());
        assert!(store.find_archive("ext.mod").is_ok());
        assert!(matches!(
            store.find_archive("ghost.mod"),
            Err(ModuleError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn test_find_archive_stays_in_directory() {
        let root = TempDir::new().unwrap();
        let modules = root.path().join("modules");
        fs::create_dir_all(modules.join("nested")).unwrap();
        fs::write(root.path().join("outside.mod"), b"").unwrap();
        fs::write(modules.join("nested/inner.mod"), b"").unwrap();
        let store = ArchiveStore::new(&modules);

        for name in [
            "../outside.mod",
            "nested/inner.mod",
            "./inner.mod",
            "",
            root.path().join("outside.mod").to_str().unwrap(),
        ] {
            assert!(
                matches!(store.find_archive(name), Err(ModuleError::ModuleNotFound(_))),
                "{} resolved",
                name
            );
        }
    }
}
