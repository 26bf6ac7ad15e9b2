//! Module descriptor reader
//!
//! Turns a module archive into an immutable [`ModuleDescriptor`] by reading
//! the `module.toml` embedded in it.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::module::registry::manifest::{ModuleManifest, MANIFEST_FILE};
use crate::module::traits::ModuleError;
use crate::module::validation::{ManifestValidator, ValidationResult};

/// Identity metadata of one module archive
///
/// Never mutated after construction; re-reading an archive produces a new
/// descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub module_id: String,
    pub namespace: String,
    pub version: String,
    pub name: Option<String>,
    /// Entry-point type declared by the manifest, if any
    pub entry_point: Option<String>,
    /// Host-namespace dependencies required before this module may start
    pub dependencies: BTreeSet<String>,
    pub archive_path: PathBuf,
    /// Hex SHA-256 of the archive bytes
    pub digest: String,
}

impl ModuleDescriptor {
    /// Read the descriptor of a module archive
    ///
    /// The first entry named `module.toml` wins, at any depth.
    pub fn read<P: AsRef<Path>>(archive: P, host_namespace: &str) -> Result<Self, ModuleError> {
        let archive = archive.as_ref();
        let bytes = std::fs::read(archive).map_err(|e| ModuleError::extraction(archive, e))?;
        let digest = hex::encode(Sha256::digest(&bytes));

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|e| ModuleError::extraction(archive, e))?;

        // Archive order, not name order: the first manifest entry wins
        let mut found = None;
        for i in 0..zip.len() {
            let entry = zip
                .by_index(i)
                .map_err(|e| ModuleError::extraction(archive, e))?;
            if !entry.is_dir() && is_manifest_entry(entry.name()) {
                found = Some((i, entry.name().to_string()));
                break;
            }
        }
        let (index, manifest_entry) = found.ok_or_else(|| ModuleError::DescriptorNotFound {
            archive: archive.display().to_string(),
        })?;

        let mut contents = Vec::new();
        zip.by_index(index)
            .map_err(|e| ModuleError::extraction(archive, e))?
            .read_to_end(&mut contents)
            .map_err(|e| ModuleError::extraction(archive, e))?;

        let manifest = ModuleManifest::from_bytes(&contents)?;
        if let ValidationResult::Invalid(errors) = ManifestValidator::new().validate(&manifest) {
            return Err(ModuleError::InvalidDescriptor(format!(
                "{} ({}): {}",
                manifest.module.id,
                archive.display(),
                errors.join("; ")
            )));
        }

        let descriptor = Self::from_manifest(&manifest, archive, host_namespace, digest);
        debug!(
            "Read descriptor {} from {:?} (manifest entry {}, dependencies {:?})",
            descriptor.module_id, archive, manifest_entry, descriptor.dependencies
        );
        Ok(descriptor)
    }

    /// Build a descriptor from an already parsed manifest
    pub fn from_manifest(
        manifest: &ModuleManifest,
        archive: &Path,
        host_namespace: &str,
        digest: String,
    ) -> Self {
        Self {
            module_id: manifest.module.id.clone(),
            namespace: manifest.module.namespace.clone(),
            version: manifest.module.version.clone(),
            name: manifest.module.name.clone(),
            entry_point: manifest.module.entry_point.clone(),
            dependencies: manifest
                .host_dependencies(host_namespace)
                .map(str::to_string)
                .collect(),
            archive_path: archive.to_path_buf(),
            digest,
        }
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.module_id)
    }
}

fn is_manifest_entry(name: &str) -> bool {
    name == MANIFEST_FILE || name.ends_with(&format!("/{}", MANIFEST_FILE))
}
