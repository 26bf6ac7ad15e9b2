//! Module context builder
//!
//! Turns a staged module (descriptor plus code loader) into a started
//! sub-container of the host root container.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::module::context::container::{Container, ContainerBuilder};
use crate::module::context::entry::TypeDescriptor;
use crate::module::context::host::HostContext;
use crate::module::context::environment::PropertySource;
use crate::module::loader::resolver::type_entry_name;
use crate::module::loader::ModuleCodeLoader;
use crate::module::registry::ModuleDescriptor;
use crate::module::traits::{ModuleError, MODULE_API_VERSION};

/// Name of the property source holding a module's environment overrides
pub const ENV_OVERRIDES_SOURCE: &str = "module-env-overrides";

/// The module's entry-point type
#[derive(Debug, Clone)]
pub struct EntryPoint {
    pub type_name: String,
    pub descriptor: TypeDescriptor,
}

impl EntryPoint {
    /// Namespace scanned for the module's components
    pub fn namespace(&self) -> &str {
        self.type_name
            .rsplit_once('.')
            .map(|(namespace, _)| namespace)
            .unwrap_or("")
    }
}

pub struct ModuleContextBuilder<'h> {
    host: &'h HostContext,
}

impl<'h> ModuleContextBuilder<'h> {
    pub fn new(host: &'h HostContext) -> Self {
        Self { host }
    }

    /// Find and check the module's entry point
    ///
    /// A manifest `entry_point` must name one of the module's own types marked
    /// `configuration = true`. Otherwise every such own type is a candidate.
    pub fn find_entry_point(
        &self,
        descriptor: &ModuleDescriptor,
        loader: &ModuleCodeLoader,
    ) -> Result<EntryPoint, ModuleError> {
        let entry = match &descriptor.entry_point {
            Some(type_name) => {
                let no_entry = || ModuleError::NoEntryPoint {
                    module: descriptor.module_id.clone(),
                };
                let unit = loader
                    .find_own(&type_entry_name(type_name))
                    .ok_or_else(no_entry)?;
                let parsed = TypeDescriptor::from_unit(&unit)?;
                if !parsed.configuration {
                    return Err(no_entry());
                }
                EntryPoint {
                    type_name: type_name.clone(),
                    descriptor: parsed,
                }
            }
            None => self.scan_entry_point(descriptor, loader)?,
        };

        if !entry.descriptor.is_entry() {
            return Err(ModuleError::NotAConfigurationClass {
                type_name: entry.type_name,
            });
        }
        match entry.descriptor.api_version() {
            Some(MODULE_API_VERSION) => Ok(entry),
            found => Err(ModuleError::IncompatibleModuleApi {
                type_name: entry.type_name,
                found,
                expected: MODULE_API_VERSION,
            }),
        }
    }

    fn scan_entry_point(
        &self,
        descriptor: &ModuleDescriptor,
        loader: &ModuleCodeLoader,
    ) -> Result<EntryPoint, ModuleError> {
        let mut candidates = Vec::new();
        for type_name in loader.types() {
            // Oversized type entries are never inlined, so they cannot be entry points
            let Some(unit) = loader.find_own(&type_entry_name(&type_name)) else {
                continue;
            };
            let parsed = TypeDescriptor::from_unit(&unit)?;
            if parsed.configuration {
                candidates.push(EntryPoint {
                    type_name,
                    descriptor: parsed,
                });
            }
        }

        match candidates.len() {
            0 => Err(ModuleError::NoEntryPoint {
                module: descriptor.module_id.clone(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ModuleError::AmbiguousEntryPoint {
                module: descriptor.module_id.clone(),
                candidates: candidates.into_iter().map(|c| c.type_name).collect(),
            }),
        }
    }

    /// Resolve `[[entry.env]]` against the host environment
    pub fn env_overrides(&self, entry: &EntryPoint) -> BTreeMap<String, String> {
        let environment = self.host.environment();
        entry
            .descriptor
            .env_overrides()
            .iter()
            .map(|o| {
                (
                    environment.resolve_placeholders(&o.key),
                    environment.resolve_placeholders(&o.value),
                )
            })
            .collect()
    }

    /// Bootstrap and start the module's sub-container
    pub fn build(
        &self,
        descriptor: &ModuleDescriptor,
        loader: Arc<ModuleCodeLoader>,
    ) -> Result<Container, ModuleError> {
        let entry = self.find_entry_point(descriptor, &loader)?;
        debug!(
            "Module {} entry point is {}",
            descriptor.module_id, entry.type_name
        );

        let mut builder = ContainerBuilder::new(descriptor.module_id.clone())
            .parent(Arc::clone(self.host.root()))
            .code_scope(Arc::clone(&loader));

        let overrides = self.env_overrides(&entry);
        if !overrides.is_empty() {
            debug!(
                "Module {} overrides {} properties",
                descriptor.module_id,
                overrides.len()
            );
            builder = builder.property_source_first(PropertySource::new(ENV_OVERRIDES_SOURCE, overrides));
        }

        builder = builder
            .scan(entry.namespace())
            .register(entry.type_name.clone());

        loader.before_start();

        let container = builder
            .start(self.host.catalog())
            .map_err(|e| ModuleError::ModuleStartFailed {
                module: descriptor.module_id.clone(),
                reason: format!("{:#}", e),
            })?;

        info!(
            "Started module {} with {} components",
            descriptor.module_id,
            container.bean_names().len()
        );
        Ok(container)
    }
}
