//! Per-module isolated code loader
//!
//! Each loaded module owns one [`ModuleCodeLoader`]. Lookups consult the
//! module's own archive content first and only then walk an explicit,
//! ordered list of delegate resolvers (declared dependencies, then the host).

use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::module::loader::resolver::{
    type_name_of, CodeResolver, CodeUnit, Package, ResourceLocator,
};
use crate::module::traits::ModuleError;

/// What the construction-time index knows about one archive entry
#[derive(Debug)]
enum IndexedEntry {
    /// Small entry, bytes held in memory
    Inline(Arc<[u8]>),
    /// Large entry, fetched from the archive on demand
    External { size: u64 },
}

/// Isolated code loader for one module
pub struct ModuleCodeLoader {
    module_id: String,
    /// Staged archive inside the module's working directory
    archive: PathBuf,
    /// Built once in `open`, read-only afterwards
    index: HashMap<String, IndexedEntry>,
    /// Define-once cache of units served from the own index
    defined: DashMap<String, Arc<CodeUnit>>,
    /// One synthesized package record per namespace
    packages: DashMap<String, Arc<Package>>,
    /// Dependency loaders first, host resolver last
    delegates: Vec<Arc<dyn CodeResolver>>,
    started: AtomicBool,
}

impl std::fmt::Debug for ModuleCodeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCodeLoader")
            .field("module_id", &self.module_id)
            .field("archive", &self.archive)
            .field("entries", &self.index.len())
            .field("delegates", &self.delegates.len())
            .finish()
    }
}

impl ModuleCodeLoader {
    /// Open a staged archive and index every entry
    ///
    /// Entries larger than `inline_limit` bytes are indexed by name only.
    pub fn open<P: AsRef<Path>>(
        module_id: &str,
        archive: P,
        inline_limit: u64,
        delegates: Vec<Arc<dyn CodeResolver>>,
    ) -> Result<Self, ModuleError> {
        let archive = archive.as_ref().to_path_buf();
        let file = std::fs::File::open(&archive).map_err(|e| ModuleError::extraction(&archive, e))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| ModuleError::extraction(&archive, e))?;

        let mut index = HashMap::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| ModuleError::extraction(&archive, e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let size = entry.size();
            let indexed = if size <= inline_limit {
                let mut bytes = Vec::with_capacity(size as usize);
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| ModuleError::extraction(&archive, format!("{}: {}", name, e)))?;
                IndexedEntry::Inline(bytes.into())
            } else {
                IndexedEntry::External { size }
            };
            index.insert(name, indexed);
        }

        debug!(
            "Indexed {} entries for module {} from {:?}",
            index.len(),
            module_id,
            archive
        );

        Ok(Self {
            module_id: module_id.to_string(),
            archive,
            index,
            defined: DashMap::new(),
            packages: DashMap::new(),
            delegates,
            started: AtomicBool::new(false),
        })
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Whether the entry exists in this module's own archive
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Dotted names of every type descriptor in the module's own archive
    ///
    /// This is the search boundary for entry-point discovery: delegates are
    /// never consulted.
    pub fn types(&self) -> BTreeSet<String> {
        self.index.keys().filter_map(|name| type_name_of(name)).collect()
    }

    /// Resource-first lookup: own index, then delegates in order
    ///
    /// Names the module owns never reach the delegates. Entries too large to
    /// inline yield `None` here and are served through [`Self::locate`].
    pub fn load(&self, name: &str) -> Option<Arc<CodeUnit>> {
        if self.contains(name) {
            return self.find_own(name);
        }
        self.delegates.iter().find_map(|delegate| {
            let unit = delegate.resolve(name);
            if unit.is_some() {
                trace!(
                    "Module {} resolved {} through {}",
                    self.module_id,
                    name,
                    delegate.resolver_name()
                );
            }
            unit
        })
    }

    /// Define a unit from the own index
    ///
    /// Defining an already-defined name returns the existing unit.
    pub fn find_own(&self, name: &str) -> Option<Arc<CodeUnit>> {
        if let Some(unit) = self.defined.get(name) {
            return Some(Arc::clone(unit.value()));
        }
        match self.index.get(name)? {
            IndexedEntry::Inline(bytes) => Some(self.define(name, Arc::clone(bytes))),
            IndexedEntry::External { .. } => None,
        }
    }

    /// Define `bytes` under `name`, once
    pub fn define(&self, name: &str, bytes: Arc<[u8]>) -> Arc<CodeUnit> {
        let unit = self
            .defined
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CodeUnit::new(name, self.module_id.as_str(), bytes)))
            .value()
            .clone();
        self.ensure_package(&unit);
        unit
    }

    fn ensure_package(&self, unit: &CodeUnit) {
        let Some(namespace) = unit.namespace() else {
            return;
        };
        if self.packages.contains_key(&namespace) {
            return;
        }
        self.packages.entry(namespace.clone()).or_insert_with(|| {
            trace!("Module {} defined package {}", self.module_id, namespace);
            Arc::new(Package {
                name: namespace.clone(),
                origin: self.module_id.clone(),
            })
        });
    }

    /// Package record for a namespace, if one was synthesized
    pub fn package(&self, namespace: &str) -> Option<Arc<Package>> {
        self.packages.get(namespace).map(|p| Arc::clone(p.value()))
    }

    /// Number of distinct package records synthesized so far
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Resolve a resource to a locator
    ///
    /// In-memory index first, then a direct entry lookup for entries too
    /// large to index, then delegates.
    pub fn locate(&self, name: &str) -> Option<ResourceLocator> {
        if let Some(unit) = self.find_own(name) {
            return Some(ResourceLocator::Indexed { unit });
        }
        if let Some(IndexedEntry::External { size }) = self.index.get(name) {
            debug!(
                "Module {} serving {} ({} bytes) directly from archive",
                self.module_id, name, size
            );
            return Some(ResourceLocator::ArchiveEntry {
                archive: self.archive.clone(),
                entry: name.to_string(),
            });
        }
        self.delegates.iter().find_map(|delegate| delegate.locate(name))
    }

    /// Pre-start hook run by the context builder before the container starts
    ///
    /// Defines every own type so its package record exists before any
    /// component runs.
    pub fn before_start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        for name in self.index.keys() {
            if type_name_of(name).is_some() {
                let _ = self.find_own(name);
            }
        }
        debug!(
            "Module {} loader ready ({} packages)",
            self.module_id,
            self.packages.len()
        );
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl CodeResolver for ModuleCodeLoader {
    fn resolver_name(&self) -> &str {
        &self.module_id
    }

    /// Dependents only see this module's own content, never its delegates
    fn resolve(&self, name: &str) -> Option<Arc<CodeUnit>> {
        self.find_own(name)
    }

    fn locate(&self, name: &str) -> Option<ResourceLocator> {
        if let Some(unit) = self.find_own(name) {
            return Some(ResourceLocator::Indexed { unit });
        }
        match self.index.get(name) {
            Some(IndexedEntry::External { .. }) => Some(ResourceLocator::ArchiveEntry {
                archive: self.archive.clone(),
                entry: name.to_string(),
            }),
            _ => None,
        }
    }
}
