//! Code resolution primitives
//!
//! A [`CodeResolver`] answers "give me the code unit or resource named X".
//! Module loaders and the host's base resolver both implement it, so a
//! module's fallback chain is just an ordered list of resolvers.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use crate::module::traits::ModuleError;

/// Extension of type descriptor entries inside a module archive
pub const TYPE_EXTENSION: &str = ".type";

/// Origin tag for units owned by the host
pub const HOST_ORIGIN: &str = "host";

/// A resolved code unit or resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// Archive-relative entry name (`org/homehub/ext/Cfg.type`, `static/app.js`)
    pub name: String,
    /// Id of the module that owns the unit, or [`HOST_ORIGIN`]
    pub origin: String,
    pub bytes: Arc<[u8]>,
}

impl CodeUnit {
    pub fn new(name: impl Into<String>, origin: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
            bytes: bytes.into(),
        }
    }

    /// Content as UTF-8 text
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Namespace the unit belongs to, used for package records
    ///
    /// `org/homehub/ext/Cfg.type` → `org.homehub.ext`, `static/app.js` → `static`.
    pub fn namespace(&self) -> Option<String> {
        namespace_of(&self.name)
    }
}

/// Package record synthesized when the first unit of a namespace is defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub origin: String,
}

/// Where a resource can be fetched from later
///
/// Locators are plain data: dereferencing reopens the archive, so nothing
/// keeps archive handles open between lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    /// Held in memory by a loader's index
    Indexed { unit: Arc<CodeUnit> },
    /// Entry not pre-indexed, read straight from the archive on fetch
    ArchiveEntry { archive: PathBuf, entry: String },
}

impl ResourceLocator {
    /// Read the resource bytes
    pub fn fetch(&self) -> Result<Arc<[u8]>, ModuleError> {
        match self {
            ResourceLocator::Indexed { unit } => Ok(Arc::clone(&unit.bytes)),
            ResourceLocator::ArchiveEntry { archive, entry } => {
                let file = std::fs::File::open(archive)
                    .map_err(|e| ModuleError::extraction(archive, e))?;
                let mut zip =
                    zip::ZipArchive::new(file).map_err(|e| ModuleError::extraction(archive, e))?;
                let mut zip_entry = zip
                    .by_name(entry)
                    .map_err(|e| ModuleError::extraction(archive, format!("{}: {}", entry, e)))?;
                let mut bytes = Vec::with_capacity(zip_entry.size() as usize);
                zip_entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| ModuleError::extraction(archive, e))?;
                Ok(bytes.into())
            }
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLocator::Indexed { unit } => write!(f, "module:{}/{}", unit.origin, unit.name),
            ResourceLocator::ArchiveEntry { archive, entry } => {
                write!(f, "archive:{}!/{}", archive.display(), entry)
            }
        }
    }
}

/// One tier of code resolution
pub trait CodeResolver: Send + Sync {
    /// Human-readable name for logs
    fn resolver_name(&self) -> &str;

    /// Resolve a code unit or resource by entry name
    fn resolve(&self, name: &str) -> Option<Arc<CodeUnit>>;

    /// Resolve a resource to a locator that can be fetched later
    fn locate(&self, name: &str) -> Option<ResourceLocator> {
        self.resolve(name).map(|unit| ResourceLocator::Indexed { unit })
    }
}

/// The host's base resolver: units the host itself ships
///
/// Modules reach it last, after their own content and their explicitly
/// wired dependencies.
#[derive(Debug, Default)]
pub struct HostResolver {
    units: HashMap<String, Arc<CodeUnit>>,
}

impl HostResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host-provided unit (builder style)
    pub fn with_unit(mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let unit = Arc::new(CodeUnit::new(name.clone(), HOST_ORIGIN, bytes));
        self.units.insert(name, unit);
        self
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl CodeResolver for HostResolver {
    fn resolver_name(&self) -> &str {
        HOST_ORIGIN
    }

    fn resolve(&self, name: &str) -> Option<Arc<CodeUnit>> {
        self.units.get(name).cloned()
    }
}

/// Entry name of a dotted type name: `org.homehub.Cfg` → `org/homehub/Cfg.type`
pub fn type_entry_name(type_name: &str) -> String {
    format!("{}{}", type_name.replace('.', "/"), TYPE_EXTENSION)
}

/// Dotted type name of a type entry, `None` for plain resources
pub fn type_name_of(entry: &str) -> Option<String> {
    entry
        .strip_suffix(TYPE_EXTENSION)
        .filter(|stem| !stem.is_empty() && !stem.ends_with('/'))
        .map(|stem| stem.replace('/', "."))
}

/// Namespace of an entry name, `None` for top-level entries
pub fn namespace_of(entry: &str) -> Option<String> {
    let (parent, _) = entry.rsplit_once('/')?;
    if parent.is_empty() {
        return None;
    }
    Some(parent.replace('/', "."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_entry_names() {
        assert_eq!(type_entry_name("org.homehub.ext.Cfg"), "org/homehub/ext/Cfg.type");
        assert_eq!(
            type_name_of("org/homehub/ext/Cfg.type").as_deref(),
            Some("org.homehub.ext.Cfg")
        );
        assert_eq!(type_name_of("static/app.js"), None);
        assert_eq!(type_name_of("dir/.type"), None);
    }

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("org/homehub/ext/Cfg.type").as_deref(), Some("org.homehub.ext"));
        assert_eq!(namespace_of("static/app.js").as_deref(), Some("static"));
        assert_eq!(namespace_of("module.toml"), None);
    }

    #[test]
    fn test_host_resolver() {
        let host = HostResolver::new().with_unit("shared/logo.svg", b"<svg/>".to_vec());
        let unit = host.resolve("shared/logo.svg").unwrap();
        assert_eq!(unit.origin, HOST_ORIGIN);
        assert_eq!(unit.text(), Some("<svg/>"));
        assert!(host.resolve("missing").is_none());
        assert_eq!(
            host.locate("shared/logo.svg").unwrap().fetch().unwrap().as_ref(),
            b"<svg/>"
        );
    }
}
