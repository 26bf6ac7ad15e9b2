//! Test utilities for module loader tests
//!
//! Builds module archives in temporary directories and a host whose
//! component catalog records the order in which module containers start.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::FileOptions;

use homehub_modules::module::context::{
    bean, component_fn, ComponentCatalog, Environment, HostContext,
};
use homehub_modules::ModuleConfig;

pub const HOST_NAMESPACE: &str = "org.homehub";

/// Entry-point type name used by fixture module `id`
pub fn entry_type(id: &str) -> String {
    format!("{}.{}.ModuleConfiguration", HOST_NAMESPACE, id)
}

/// Isolated modules and extraction directories
pub struct ModuleFixture {
    pub temp_dir: TempDir,
    pub modules_dir: PathBuf,
    pub extraction_root: PathBuf,
}

impl ModuleFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules");
        let extraction_root = temp_dir.path().join("work");
        std::fs::create_dir_all(&modules_dir).unwrap();
        Self {
            temp_dir,
            modules_dir,
            extraction_root,
        }
    }

    /// Loader configuration pointing at the fixture directories, `core` built in
    pub fn config(&self) -> ModuleConfig {
        ModuleConfig {
            modules_dir: self.modules_dir.to_string_lossy().to_string(),
            extraction_root: self.extraction_root.to_string_lossy().to_string(),
            internal_modules: vec!["core".to_string()],
            ..ModuleConfig::default()
        }
    }

    /// Start an archive in the modules directory
    pub fn archive(&self, file_name: &str) -> ArchiveBuilder {
        ArchiveBuilder::new(self.modules_dir.join(file_name))
    }

    /// Standard module: manifest plus one entry-point type
    pub fn module(&self, file_name: &str, id: &str, dependencies: &[&str]) -> PathBuf {
        self.archive(file_name)
            .manifest(id, "1.0.0", dependencies)
            .entry_type(&entry_type(id), &[])
            .write()
    }

    /// Working directories created so far
    pub fn working_dirs(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.extraction_root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Zip archive under construction
pub struct ArchiveBuilder {
    path: PathBuf,
    entries: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: Vec::new(),
        }
    }

    pub fn file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.entries.push((name.to_string(), contents.as_ref().to_vec()));
        self
    }

    /// `META-INF/module.toml` declaring host-namespace dependencies
    pub fn manifest(self, id: &str, version: &str, dependencies: &[&str]) -> Self {
        let mut toml = format!(
            "[module]\nid = \"{}\"\nnamespace = \"{}\"\nversion = \"{}\"\n",
            id, HOST_NAMESPACE, version
        );
        for dependency in dependencies {
            toml.push_str(&format!(
                "\n[[dependencies]]\nnamespace = \"{}\"\nid = \"{}\"\n",
                HOST_NAMESPACE, dependency
            ));
        }
        self.file("META-INF/module.toml", toml)
    }

    /// Type descriptor marked as module configuration and module entry
    pub fn entry_type(self, type_name: &str, env: &[(&str, &str)]) -> Self {
        let mut toml = format!(
            "name = \"{}\"\nconfiguration = true\n\n[entry]\napi = 1\n",
            type_name
        );
        for (key, value) in env {
            toml.push_str(&format!(
                "\n[[entry.env]]\nkey = \"{}\"\nvalue = \"{}\"\n",
                key, value
            ));
        }
        self.type_file(type_name, toml)
    }

    /// Plain component type
    pub fn component_type(self, type_name: &str) -> Self {
        let toml = format!("name = \"{}\"\n", type_name);
        self.type_file(type_name, toml)
    }

    pub fn type_file(self, type_name: &str, contents: impl AsRef<[u8]>) -> Self {
        let entry = format!("{}.type", type_name.replace('.', "/"));
        self.file(&entry, contents)
    }

    pub fn write(self) -> PathBuf {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&self.path).unwrap());
        for (name, contents) in &self.entries {
            zip.start_file(name.as_str(), FileOptions::default()).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
        self.path
    }
}

/// Order in which components were created, as `container:type`
#[derive(Clone, Default)]
pub struct StartLog(Arc<Mutex<Vec<String>>>);

impl StartLog {
    pub fn record(&self, container: &str, type_name: &str) {
        self.0
            .lock()
            .unwrap()
            .push(format!("{}:{}", container, type_name));
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Containers in the order their entry points were created
    pub fn modules(&self) -> Vec<String> {
        self.entries()
            .iter()
            .filter(|e| e.ends_with(".ModuleConfiguration"))
            .map(|e| e.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn count(&self, container: &str) -> usize {
        self.modules().iter().filter(|m| m.as_str() == container).count()
    }
}

/// Catalog with a recording entry-point component for every id in `ids`
///
/// The component exposes the container's `X_HOST` property (or `unset`) as
/// a `String` bean.
pub fn catalog(ids: &[&str], log: &StartLog) -> ComponentCatalog {
    let mut catalog = ComponentCatalog::new();
    for id in ids {
        let log = log.clone();
        catalog.register(
            entry_type(id),
            component_fn(move |ctx| {
                log.record(ctx.container_name(), ctx.type_name());
                Ok(bean(ctx.property("X_HOST").unwrap_or("unset").to_string()))
            }),
        );
    }
    catalog
}

/// Host whose configured environment resolves `server.host = 10.0.0.5`
pub fn host(catalog: ComponentCatalog) -> HostContext {
    let mut props = BTreeMap::new();
    props.insert("server.host".to_string(), "10.0.0.5".to_string());
    HostContext::from_environment(Environment::from_map("hub-config", props), catalog).unwrap()
}

pub fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}
