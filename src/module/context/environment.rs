//! Host and module environments
//!
//! An [`Environment`] is an ordered list of property sources; the first
//! source that defines a key wins. Module sub-containers inherit the host's
//! sources and may put an override source in front of them.

use std::collections::BTreeMap;

use crate::utils::env_opt;

/// Key/value provider the loader resolves placeholders against
pub trait EnvironmentProvider: Send + Sync {
    fn get_property(&self, key: &str) -> Option<String>;

    /// Substitute `${key}` and `${key:default}` placeholders
    ///
    /// Placeholders that resolve to nothing are left untouched.
    fn resolve_placeholders(&self, template: &str) -> String {
        resolve_placeholders(template, |key| self.get_property(key))
    }
}

/// Named set of properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySource {
    name: String,
    properties: BTreeMap<String, String>,
}

impl PropertySource {
    pub fn new(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// Ordered property sources, highest priority first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    sources: Vec<PropertySource>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment with a single source
    pub fn from_map(name: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        let mut env = Self::new();
        env.add_last(PropertySource::new(name, properties));
        env
    }

    /// Insert a source with highest priority
    ///
    /// A source with the same name is replaced.
    pub fn add_first(&mut self, source: PropertySource) {
        self.remove(source.name());
        self.sources.insert(0, source);
    }

    /// Append a source with lowest priority
    pub fn add_last(&mut self, source: PropertySource) {
        self.remove(source.name());
        self.sources.push(source);
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertySource> {
        let pos = self.sources.iter().position(|s| s.name() == name)?;
        Some(self.sources.remove(pos))
    }

    pub fn sources(&self) -> &[PropertySource] {
        &self.sources
    }

    pub fn source(&self, name: &str) -> Option<&PropertySource> {
        self.sources.iter().find(|s| s.name() == name)
    }

    /// First value for `key` across sources
    pub fn property(&self, key: &str) -> Option<&str> {
        self.sources.iter().find_map(|s| s.get(key))
    }

    /// Name of the source that currently supplies `key`
    pub fn property_origin(&self, key: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.get(key).is_some())
            .map(PropertySource::name)
    }
}

impl EnvironmentProvider for Environment {
    fn get_property(&self, key: &str) -> Option<String> {
        self.property(key).map(str::to_string)
    }
}

/// Process environment variables
///
/// `server.host` is looked up as-is, then as `SERVER_HOST`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_property(&self, key: &str) -> Option<String> {
        env_opt(key).or_else(|| {
            let relaxed: String = key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            env_opt(&relaxed)
        })
    }
}

/// Host environment: configured properties first, process environment after
pub struct LayeredEnvironment {
    configured: Environment,
    system: SystemEnvironment,
}

impl LayeredEnvironment {
    pub fn new(configured: Environment) -> Self {
        Self {
            configured,
            system: SystemEnvironment,
        }
    }

    pub fn configured(&self) -> &Environment {
        &self.configured
    }
}

impl EnvironmentProvider for LayeredEnvironment {
    fn get_property(&self, key: &str) -> Option<String> {
        self.configured
            .get_property(key)
            .or_else(|| self.system.get_property(key))
    }
}

/// Substitute `${key}` / `${key:default}` placeholders using `lookup`
pub fn resolve_placeholders<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: keep the remainder verbatim
            out.push_str(&rest[start..]);
            return out;
        };

        let body = &after[..end];
        let (key, default) = match body.split_once(':') {
            Some((key, default)) => (key, Some(default)),
            None => (body, None),
        };
        match lookup(key.trim()).or_else(|| default.map(str::to_string)) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn host() -> Environment {
        let mut props = BTreeMap::new();
        props.insert("server.host".to_string(), "10.0.0.5".to_string());
        props.insert("server.port".to_string(), "8080".to_string());
        Environment::from_map("host", props)
    }

    #[test]
    fn test_resolves_placeholders() {
        let env = host();
        assert_eq!(env.resolve_placeholders("${server.host}"), "10.0.0.5");
        assert_eq!(
            env.resolve_placeholders("http://${server.host}:${server.port}/api"),
            "http://10.0.0.5:8080/api"
        );
        assert_eq!(env.resolve_placeholders("${missing:fallback}"), "fallback");
        assert_eq!(env.resolve_placeholders("${missing:}"), "");
    }

    #[test]
    fn test_unresolved_placeholders_are_kept() {
        let env = host();
        assert_eq!(env.resolve_placeholders("${missing}/x"), "${missing}/x");
        assert_eq!(env.resolve_placeholders("tail ${open"), "tail ${open");
    }

    #[test]
    fn test_add_first_takes_priority() {
        let mut env = host();
        let mut overrides = BTreeMap::new();
        overrides.insert("server.host".to_string(), "127.0.0.1".to_string());
        env.add_first(PropertySource::new("overrides", overrides));

        assert_eq!(env.property("server.host"), Some("127.0.0.1"));
        assert_eq!(env.property_origin("server.host"), Some("overrides"));
        assert_eq!(env.property("server.port"), Some("8080"));
        assert_eq!(env.sources()[0].name(), "overrides");
    }

    #[test]
    fn test_same_name_source_is_replaced() {
        let mut env = host();
        env.add_first(PropertySource::new("host", BTreeMap::new()));
        assert_eq!(env.sources().len(), 1);
        assert_eq!(env.property("server.host"), None);
    }

    proptest! {
        #[test]
        fn prop_text_without_placeholders_is_unchanged(s in "[^$]*") {
            let env = host();
            prop_assert_eq!(env.resolve_placeholders(&s), s);
        }

        #[test]
        fn prop_known_key_is_substituted(prefix in "[a-z ]{0,8}", suffix in "[a-z ]{0,8}") {
            let env = host();
            let template = format!("{}${{server.port}}{}", prefix, suffix);
            prop_assert_eq!(env.resolve_placeholders(&template), format!("{}8080{}", prefix, suffix));
        }
    }
}
