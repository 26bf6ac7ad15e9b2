//! Module manager
//!
//! Async facade over the orchestrator. Every load, install or retry request
//! goes through one gate and runs on the blocking pool. The gate is released
//! before listeners are notified, so a listener may query the manager.
//! Publications still arrive in pass order.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::ModuleConfig;
use crate::module::context::HostContext;
use crate::module::orchestrator::{LoadReport, ModuleOrchestrator};
use crate::module::registry::{ArchiveStore, RegistrySnapshot};
use crate::module::traits::{ModuleError, ModuleLifecycle, ModuleState};

/// Host-facing module manager
pub struct ModuleManager {
    /// Serializes passes; the orchestrator assumes a single writer
    orchestrator: Arc<Mutex<ModuleOrchestrator>>,
    store: ArchiveStore,
    listeners: RwLock<Vec<Arc<dyn ModuleLifecycle>>>,
    /// Orders publications; taken before the gate is released
    publishing: Arc<Mutex<()>>,
    enabled: bool,
}

impl ModuleManager {
    /// Create a manager; the archive directory may be overridden by the host
    /// environment (`homehub.modules.dir`)
    pub fn new(config: &ModuleConfig, host: HostContext) -> Self {
        let store = ArchiveStore::from_environment(host.environment(), config);
        let orchestrator = ModuleOrchestrator::new(config, Arc::new(host));
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            store,
            listeners: RwLock::new(Vec::new()),
            publishing: Arc::new(Mutex::new(())),
            enabled: config.enabled,
        }
    }

    /// Replace the archive store
    pub fn with_store(mut self, store: ArchiveStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    /// Register a listener notified after every pass
    ///
    /// Listeners may read the manager from their callback. A listener that
    /// wants another pass must spawn it rather than await it, since the next
    /// publication waits for the current one.
    pub async fn add_listener(&self, listener: Arc<dyn ModuleLifecycle>) {
        self.listeners.write().await.push(listener);
    }

    /// Discover every archive in the store and run a load pass
    pub async fn load_all(&self) -> Result<LoadReport, ModuleError> {
        if !self.enabled {
            info!("Module system disabled, skipping load pass");
            return Ok(LoadReport {
                snapshot: self.snapshot().await,
                ..LoadReport::default()
            });
        }
        let store = self.store.clone();
        self.run_pass(move |orchestrator| {
            let archives = store.discover_archives()?;
            Ok(orchestrator.load_pass(&archives))
        })
        .await
    }

    /// Install (or re-deploy) one archive
    pub async fn install(&self, archive: PathBuf) -> Result<LoadReport, ModuleError> {
        self.run_pass(move |orchestrator| Ok(orchestrator.install(&archive)))
            .await
    }

    /// Install an archive from the store by file name
    pub async fn install_from_store(&self, file_name: &str) -> Result<LoadReport, ModuleError> {
        let archive = self.store.find_archive(file_name)?;
        self.install(archive).await
    }

    /// Retry a failed module
    pub async fn retry(&self, id: &str) -> Result<LoadReport, ModuleError> {
        let id = id.to_string();
        self.run_pass(move |orchestrator| orchestrator.retry(&id))
            .await
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        self.orchestrator.lock().await.snapshot()
    }

    pub async fn state(&self, id: &str) -> Option<ModuleState> {
        self.orchestrator.lock().await.registry().state(id)
    }

    async fn run_pass<F>(&self, pass: F) -> Result<LoadReport, ModuleError>
    where
        F: FnOnce(&mut ModuleOrchestrator) -> Result<LoadReport, ModuleError> + Send + 'static,
    {
        let mut gate = Arc::clone(&self.orchestrator).lock_owned().await;
        let (gate, result) = tokio::task::spawn_blocking(move || {
            let result = pass(&mut *gate);
            (gate, result)
        })
        .await
        .map_err(|e| ModuleError::PassAborted(e.to_string()))?;

        let report = result?;
        let publishing = Arc::clone(&self.publishing).lock_owned().await;
        drop(gate);
        self.publish(&report.snapshot).await;
        drop(publishing);
        Ok(report)
    }

    async fn publish(&self, snapshot: &RegistrySnapshot) {
        let listeners = self.listeners.read().await.clone();
        debug!(
            "Publishing {} modules to {} listeners",
            snapshot.len(),
            listeners.len()
        );
        for listener in listeners.iter() {
            listener.modules_published(snapshot).await;
        }
    }
}
