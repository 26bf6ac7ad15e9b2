//! Module records and the registry
//!
//! The registry maps module ids to [`ModuleRecord`]s for the whole process
//! lifetime. Records are added or replaced, never removed.

use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::module::context::Container;
use crate::module::loader::{create_working_dir, ModuleCodeLoader};
use crate::module::registry::descriptor::ModuleDescriptor;
use crate::module::traits::{ModuleError, ModuleState};
use crate::utils::current_timestamp;

/// Runtime state of one module
#[derive(Debug)]
pub struct ModuleRecord {
    id: String,
    /// `None` for internal modules, which have no archive
    descriptor: Option<Arc<ModuleDescriptor>>,
    state: ModuleState,
    error: Option<ModuleError>,
    working_dir: OnceCell<PathBuf>,
    code_loader: Option<Arc<ModuleCodeLoader>>,
    container: Option<Arc<Container>>,
    load_sequence: Option<usize>,
    /// Unix time the module became `Loaded`
    loaded_at: Option<u64>,
}

impl ModuleRecord {
    /// Fresh record for a discovered archive
    pub fn discovered(descriptor: ModuleDescriptor) -> Self {
        Self {
            id: descriptor.module_id.clone(),
            descriptor: Some(Arc::new(descriptor)),
            state: ModuleState::Discovered,
            error: None,
            working_dir: OnceCell::new(),
            code_loader: None,
            container: None,
            load_sequence: None,
            loaded_at: None,
        }
    }

    /// Built-in module, satisfied from the start
    pub fn internal(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            descriptor: None,
            state: ModuleState::Internal,
            error: None,
            working_dir: OnceCell::new(),
            code_loader: None,
            container: None,
            load_sequence: None,
            loaded_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub fn descriptor(&self) -> Option<&Arc<ModuleDescriptor>> {
        self.descriptor.as_ref()
    }

    pub fn error(&self) -> Option<&ModuleError> {
        self.error.as_ref()
    }

    pub fn code_loader(&self) -> Option<&Arc<ModuleCodeLoader>> {
        self.code_loader.as_ref()
    }

    pub fn container(&self) -> Option<&Arc<Container>> {
        self.container.as_ref()
    }

    pub fn load_sequence(&self) -> Option<usize> {
        self.load_sequence
    }

    pub fn loaded_at(&self) -> Option<u64> {
        self.loaded_at
    }

    /// Declared dependencies (empty for internal modules)
    pub fn dependencies(&self) -> Vec<String> {
        self.descriptor
            .as_ref()
            .map(|d| d.dependencies.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn archive_path(&self) -> Option<&Path> {
        self.descriptor.as_ref().map(|d| d.archive_path.as_path())
    }

    /// The module's working directory, created on first access
    ///
    /// Concurrent first calls race on the cell, not on the filesystem: exactly
    /// one directory is created and every caller gets its path.
    pub fn working_dir(&self, extraction_root: &Path) -> Result<&Path, ModuleError> {
        let archive = self
            .archive_path()
            .ok_or_else(|| ModuleError::ModuleNotFound(format!("{} has no archive", self.id)))?;
        self.working_dir
            .get_or_try_init(|| create_working_dir(extraction_root, archive))
            .map(PathBuf::as_path)
    }

    /// Working directory if it was already created
    pub fn existing_working_dir(&self) -> Option<&Path> {
        self.working_dir.get().map(PathBuf::as_path)
    }

    pub(crate) fn begin_loading(&mut self) {
        debug_assert!(self.state != ModuleState::Internal);
        self.state = ModuleState::Loading;
        self.error = None;
    }

    pub(crate) fn attach_loader(&mut self, loader: Arc<ModuleCodeLoader>) {
        self.code_loader = Some(loader);
    }

    pub(crate) fn mark_loaded(&mut self, container: Arc<Container>, sequence: usize) {
        self.state = ModuleState::Loaded;
        self.container = Some(container);
        self.load_sequence = Some(sequence);
        self.loaded_at = Some(current_timestamp());
        self.error = None;
    }

    pub(crate) fn mark_failed(&mut self, error: ModuleError) {
        if self.state == ModuleState::Internal {
            return;
        }
        self.state = ModuleState::Failed;
        self.container = None;
        self.error = Some(error);
    }

    /// Read-only view handed to the host
    pub fn view(&self) -> ModuleView {
        ModuleView {
            id: self.id.clone(),
            state: self.state,
            error: self.error.clone(),
            descriptor: self.descriptor.clone(),
            container: self.container.clone(),
            working_dir: self.existing_working_dir().map(Path::to_path_buf),
            loaded_at: self.loaded_at,
        }
    }
}

/// Host-facing view of one module after a load pass
#[derive(Debug, Clone)]
pub struct ModuleView {
    pub id: String,
    pub state: ModuleState,
    pub error: Option<ModuleError>,
    pub descriptor: Option<Arc<ModuleDescriptor>>,
    /// Present iff `state == Loaded`
    pub container: Option<Arc<Container>>,
    pub working_dir: Option<PathBuf>,
    pub loaded_at: Option<u64>,
}

/// Module map published to the host after every pass
pub type RegistrySnapshot = BTreeMap<String, ModuleView>;

/// Every module known to this process
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, ModuleRecord>,
    /// Containers of `Loaded` records replaced by a re-deploy; kept running
    retired: Vec<Arc<Container>>,
}

impl Registry {
    /// Registry seeded with the fixed set of internal modules
    pub fn with_internal<I, S>(internal: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = internal
            .into_iter()
            .map(|id| {
                let record = ModuleRecord::internal(id);
                (record.id.clone(), record)
            })
            .collect();
        Self {
            records,
            retired: Vec::new(),
        }
    }

    /// Insert or replace a discovered module (last write wins)
    ///
    /// Internal ids are never replaced. Returns `false` if the descriptor was
    /// ignored.
    pub fn upsert(&mut self, descriptor: ModuleDescriptor) -> bool {
        let id = descriptor.module_id.clone();
        if let Some(existing) = self.records.get(&id) {
            if existing.state == ModuleState::Internal {
                warn!(
                    "Ignoring archive {:?}: module {} is built in",
                    descriptor.archive_path, id
                );
                return false;
            }
            if let Some(old) = existing.descriptor() {
                if old.digest == descriptor.digest {
                    info!("Module {} re-deployed with identical archive", id);
                } else {
                    info!(
                        "Module {} replaced: {} -> {}",
                        id, old.version, descriptor.version
                    );
                }
            }
            if let Some(container) = existing.container.clone() {
                self.retired.push(container);
            }
        }
        self.records.insert(id, ModuleRecord::discovered(descriptor));
        true
    }

    pub fn get(&self, id: &str) -> Option<&ModuleRecord> {
        self.records.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut ModuleRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn state(&self, id: &str) -> Option<ModuleState> {
        self.records.get(id).map(|r| r.state)
    }

    /// Ids in a given state, sorted
    pub fn ids_in_state(&self, state: ModuleState) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .values()
            .filter(|r| r.state == state)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Containers superseded by re-deploys (not stopped)
    pub fn retired_containers(&self) -> &[Arc<Container>] {
        &self.retired
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.records
            .iter()
            .map(|(id, record)| (id.clone(), record.view()))
            .collect()
    }

    /// Reset a failed record so the next pass attempts it again
    pub(crate) fn reset_failed(&mut self, id: &str) -> Result<(), ModuleError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
        if record.state == ModuleState::Failed {
            record.state = ModuleState::Discovered;
            record.error = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn descriptor(id: &str, version: &str, archive: &Path) -> ModuleDescriptor {
        ModuleDescriptor {
            module_id: id.to_string(),
            namespace: "org.homehub".to_string(),
            version: version.to_string(),
            name: None,
            entry_point: None,
            dependencies: BTreeSet::new(),
            archive_path: archive.to_path_buf(),
            digest: version.to_string(),
        }
    }

    #[test]
    fn test_internal_modules_are_never_replaced() {
        let mut registry = Registry::with_internal(["core"]);
        assert!(!registry.upsert(descriptor("core", "1.0.0", Path::new("core.mod"))));
        assert_eq!(registry.state("core"), Some(ModuleState::Internal));
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let mut registry = Registry::default();
        assert!(registry.upsert(descriptor("ext", "1.0.0", Path::new("a/ext.mod"))));
        assert!(registry.upsert(descriptor("ext", "1.1.0", Path::new("b/ext.mod"))));

        let record = registry.get("ext").unwrap();
        assert_eq!(record.descriptor().unwrap().version, "1.1.0");
        assert_eq!(record.state(), ModuleState::Discovered);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mark_failed_never_touches_internal() {
        let mut record = ModuleRecord::internal("core");
        record.mark_failed(ModuleError::ModuleNotFound("x".to_string()));
        assert_eq!(record.state(), ModuleState::Internal);
        assert!(record.error().is_none());
    }

    #[test]
    fn test_working_dir_is_memoized() {
        let root = TempDir::new().unwrap();
        let record = ModuleRecord::discovered(descriptor("ext", "1.0.0", Path::new("ext.mod")));

        let first = record.working_dir(root.path()).unwrap().to_path_buf();
        let second = record.working_dir(root.path()).unwrap().to_path_buf();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_working_dir_creates_one_directory() {
        let root = TempDir::new().unwrap();
        let record = ModuleRecord::discovered(descriptor("ext", "1.0.0", Path::new("ext.mod")));

        let paths: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| record.working_dir(root.path()).unwrap().to_path_buf()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_internal_record_has_no_working_dir() {
        let root = TempDir::new().unwrap();
        let record = ModuleRecord::internal("core");
        assert!(record.working_dir(root.path()).is_err());
    }
}
