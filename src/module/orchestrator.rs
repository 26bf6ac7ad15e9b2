//! Dependency-ordered module loading
//!
//! One load pass parses a batch of archives into the registry, then walks
//! every pending module depth-first, dependencies before dependents. A
//! module's failure is recorded on that module only; the pass always runs
//! to completion.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::ModuleConfig;
use crate::module::context::{HostContext, ModuleContextBuilder};
use crate::module::loader::{stage_archive, CodeResolver, ModuleCodeLoader};
use crate::module::registry::{ModuleDescriptor, Registry, RegistrySnapshot};
use crate::module::traits::{ModuleError, ModuleState};

/// Outcome of one load pass
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Modules that became `Loaded` during the pass, in load order
    pub loaded: Vec<String>,
    /// Modules that became `Failed` during the pass
    pub failed: BTreeMap<String, ModuleError>,
    /// Archives whose descriptor could not be read
    pub rejected: Vec<(PathBuf, ModuleError)>,
    /// Archives ignored because they reuse a built-in module id
    pub shadowed: Vec<PathBuf>,
    /// Registry state after the pass
    pub snapshot: RegistrySnapshot,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.rejected.is_empty()
    }
}

/// Bookkeeping for one pass
#[derive(Default)]
struct Pass {
    /// Modules whose ensure-loaded call is in progress, outermost first
    in_progress: Vec<String>,
    loaded: Vec<String>,
    failed: BTreeMap<String, ModuleError>,
}

/// Owns the registry and drives records through their lifecycle
///
/// Single-writer: callers serialize passes (see [`ModuleManager`]).
///
/// [`ModuleManager`]: crate::module::manager::ModuleManager
pub struct ModuleOrchestrator {
    registry: Registry,
    host: Arc<HostContext>,
    extraction_root: PathBuf,
    inline_limit: u64,
    host_namespace: String,
    next_sequence: usize,
}

impl ModuleOrchestrator {
    pub fn new(config: &ModuleConfig, host: Arc<HostContext>) -> Self {
        Self {
            registry: Registry::with_internal(config.internal_modules.iter().cloned()),
            host,
            extraction_root: config.extraction_root(),
            inline_limit: config.inline_limit,
            host_namespace: config.host_namespace.clone(),
            next_sequence: 0,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn host(&self) -> &Arc<HostContext> {
        &self.host
    }

    pub fn extraction_root(&self) -> &Path {
        &self.extraction_root
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Run one load pass over a batch of archives
    pub fn load_pass(&mut self, archives: &[PathBuf]) -> LoadReport {
        info!("Starting module load pass over {} archives", archives.len());
        let mut report = LoadReport::default();

        for archive in archives {
            match ModuleDescriptor::read(archive, &self.host_namespace) {
                Ok(descriptor) => {
                    debug!(
                        "Discovered module {} {} in {:?}",
                        descriptor.module_id, descriptor.version, archive
                    );
                    if !self.registry.upsert(descriptor) {
                        report.shadowed.push(archive.clone());
                    }
                }
                Err(e) => {
                    warn!("Skipping archive {:?}: {}", archive, e);
                    report.rejected.push((archive.clone(), e));
                }
            }
        }

        let mut pass = Pass::default();
        for id in self.registry.ids_in_state(ModuleState::Discovered) {
            // Failures are already recorded on the module
            let _ = self.ensure_loaded(&id, &mut pass);
        }

        self.finish(pass, report)
    }

    /// Load a single archive
    pub fn install(&mut self, archive: &Path) -> LoadReport {
        self.load_pass(&[archive.to_path_buf()])
    }

    /// Reset a failed module and attempt it again
    ///
    /// Failed dependencies of the module are reset too; modules that are
    /// already `Loaded` are left alone.
    pub fn retry(&mut self, id: &str) -> Result<LoadReport, ModuleError> {
        if !self.registry.contains(id) {
            return Err(ModuleError::ModuleNotFound(id.to_string()));
        }
        self.reset_failed_subtree(id, &mut Vec::new())?;
        info!("Retrying module {}", id);

        let mut pass = Pass::default();
        let _ = self.ensure_loaded(id, &mut pass);
        Ok(self.finish(pass, LoadReport::default()))
    }

    fn reset_failed_subtree(&mut self, id: &str, seen: &mut Vec<String>) -> Result<(), ModuleError> {
        if seen.iter().any(|s| s == id) {
            return Ok(());
        }
        seen.push(id.to_string());
        let Some(record) = self.registry.get(id) else {
            return Ok(());
        };
        if record.state() != ModuleState::Failed {
            return Ok(());
        }
        let dependencies = record.dependencies();
        self.registry.reset_failed(id)?;
        for dependency in dependencies {
            self.reset_failed_subtree(&dependency, seen)?;
        }
        Ok(())
    }

    fn finish(&self, pass: Pass, mut report: LoadReport) -> LoadReport {
        report.loaded = pass.loaded;
        report.failed = pass.failed;
        report.snapshot = self.registry.snapshot();
        info!(
            "Module load pass complete: {} loaded, {} failed, {} rejected",
            report.loaded.len(),
            report.failed.len(),
            report.rejected.len()
        );
        report
    }

    /// Make `id` satisfied, loading its dependencies first
    fn ensure_loaded(&mut self, id: &str, pass: &mut Pass) -> Result<(), ModuleError> {
        if let Some(pos) = pass.in_progress.iter().position(|p| p == id) {
            let mut cycle = pass.in_progress[pos..].to_vec();
            cycle.push(id.to_string());
            return Err(ModuleError::CyclicDependency { cycle });
        }

        let record = self
            .registry
            .get(id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
        match record.state() {
            ModuleState::Internal | ModuleState::Loaded => return Ok(()),
            ModuleState::Failed => {
                return Err(record
                    .error()
                    .cloned()
                    .unwrap_or_else(|| ModuleError::ModuleNotFound(id.to_string())))
            }
            ModuleState::Discovered | ModuleState::Loading => {}
        }
        let dependencies = record.dependencies();

        pass.in_progress.push(id.to_string());
        let result = self
            .load_dependencies(id, &dependencies, pass)
            .and_then(|()| self.bootstrap(id));
        pass.in_progress.pop();

        match result {
            Ok(()) => {
                pass.loaded.push(id.to_string());
                Ok(())
            }
            Err(e) => {
                let archive = self
                    .registry
                    .get(id)
                    .and_then(|r| r.archive_path().map(Path::to_path_buf));
                error!("Module {} ({:?}) failed to load: {}", id, archive, e);
                if let Some(record) = self.registry.get_mut(id) {
                    record.mark_failed(e.clone());
                }
                pass.failed.insert(id.to_string(), e.clone());
                Err(e)
            }
        }
    }

    fn load_dependencies(
        &mut self,
        id: &str,
        dependencies: &[String],
        pass: &mut Pass,
    ) -> Result<(), ModuleError> {
        for dependency in dependencies {
            if !self.registry.contains(dependency) {
                return Err(ModuleError::MissingDependency {
                    module: id.to_string(),
                    dependency: dependency.clone(),
                });
            }
            match self.ensure_loaded(dependency, pass) {
                Ok(()) => {}
                Err(ModuleError::CyclicDependency { cycle }) if cycle.iter().any(|c| c == id) => {
                    return Err(ModuleError::CyclicDependency { cycle });
                }
                Err(e) => {
                    return Err(ModuleError::DependencyFailed {
                        module: id.to_string(),
                        dependency: dependency.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Stage, index and start one module whose dependencies are satisfied
    fn bootstrap(&mut self, id: &str) -> Result<(), ModuleError> {
        if let Some(record) = self.registry.get_mut(id) {
            record.begin_loading();
        }
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;
        let descriptor = record
            .descriptor()
            .cloned()
            .ok_or_else(|| ModuleError::ModuleNotFound(id.to_string()))?;

        let working_dir = record.working_dir(&self.extraction_root)?.to_path_buf();
        let staged = stage_archive(&working_dir, &descriptor.archive_path)?;

        let mut delegates: Vec<Arc<dyn CodeResolver>> = descriptor
            .dependencies
            .iter()
            .filter_map(|dependency| self.registry.get(dependency))
            .filter(|dependency| dependency.state() == ModuleState::Loaded)
            .filter_map(|dependency| dependency.code_loader().cloned())
            .map(|loader| loader as Arc<dyn CodeResolver>)
            .collect();
        delegates.push(self.host.base_resolver());

        let loader = Arc::new(ModuleCodeLoader::open(
            id,
            &staged,
            self.inline_limit,
            delegates,
        )?);
        if let Some(record) = self.registry.get_mut(id) {
            record.attach_loader(Arc::clone(&loader));
        }

        let container = ModuleContextBuilder::new(&self.host).build(&descriptor, loader)?;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(record) = self.registry.get_mut(id) {
            record.mark_loaded(Arc::new(container), sequence);
        }
        info!(
            "Loaded module {} {} from {:?} in {:?}",
            id, descriptor.version, descriptor.archive_path, working_dir
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::context::{bean, component_fn, ComponentCatalog, Environment};
    use crate::module::traits::MODULE_API_VERSION;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn write_module(dir: &Path, id: &str, dependencies: &[&str]) -> PathBuf {
        let path = dir.join(format!("{}.mod", id));
        let mut manifest = format!(
            "[module]\nid = \"{}\"\nnamespace = \"org.homehub\"\nversion = \"1.0.0\"\n",
            id
        );
        for dependency in dependencies {
            manifest.push_str(&format!(
                "\n[[dependencies]]\nnamespace = \"org.homehub\"\nid = \"{}\"\n",
                dependency
            ));
        }
        let entry = format!(
            "name = \"org.homehub.{}.Cfg\"\nconfiguration = true\n\n[entry]\napi = {}\n",
            id, MODULE_API_VERSION
        );
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("META-INF/module.toml", FileOptions::default()).unwrap();
        zip.write_all(manifest.as_bytes()).unwrap();
        zip.start_file(format!("org/homehub/{}/Cfg.type", id), FileOptions::default())
            .unwrap();
        zip.write_all(entry.as_bytes()).unwrap();
        zip.finish().unwrap();
        path
    }

    fn orchestrator(root: &Path, ids: &[&str]) -> ModuleOrchestrator {
        let mut catalog = ComponentCatalog::new();
        for id in ids {
            catalog.register(
                format!("org.homehub.{}.Cfg", id),
                component_fn(|_ctx| Ok(bean(()))),
            );
        }
        let host = HostContext::from_environment(
            Environment::from_map("host", BTreeMap::new()),
            catalog,
        )
        .unwrap();
        let config = ModuleConfig {
            extraction_root: root.join("work").to_string_lossy().to_string(),
            internal_modules: Vec::new(),
            ..ModuleConfig::default()
        };
        ModuleOrchestrator::new(&config, Arc::new(host))
    }

    #[test]
    fn test_dependent_enters_loading_after_its_dependencies() {
        let dir = TempDir::new().unwrap();
        let mut orchestrator = orchestrator(dir.path(), &["base", "ext"]);
        for (id, dependencies) in [("base", &[][..]), ("ext", &["base"][..])] {
            let archive = write_module(dir.path(), id, dependencies);
            let descriptor = ModuleDescriptor::read(&archive, "org.homehub").unwrap();
            assert!(orchestrator.registry.upsert(descriptor));
        }

        let mut pass = Pass::default();
        pass.in_progress.push("ext".to_string());
        orchestrator
            .load_dependencies("ext", &["base".to_string()], &mut pass)
            .unwrap();

        assert_eq!(orchestrator.registry.state("base"), Some(ModuleState::Loaded));
        assert_eq!(orchestrator.registry.state("ext"), Some(ModuleState::Discovered));

        pass.in_progress.clear();
        orchestrator.ensure_loaded("ext", &mut pass).unwrap();
        assert_eq!(orchestrator.registry.state("ext"), Some(ModuleState::Loaded));
        assert_eq!(pass.loaded, vec!["base", "ext"]);
    }
}
