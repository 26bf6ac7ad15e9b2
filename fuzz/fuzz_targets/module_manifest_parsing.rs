#![no_main]
use libfuzzer_sys::fuzz_target;
use homehub_modules::module::context::TypeDescriptor;
use homehub_modules::module::registry::manifest::in_namespace;
use homehub_modules::module::registry::ModuleManifest;
use homehub_modules::module::validation::ManifestValidator;

fuzz_target!(|data: &[u8]| {
    // Manifest and type descriptor parsing must reject garbage, never panic
    if let Ok(manifest) = ModuleManifest::from_bytes(data) {
        let _ = ManifestValidator::new().validate(&manifest);

        let host_deps: Vec<&str> = manifest.host_dependencies("org.homehub").collect();
        for dep in &manifest.dependencies {
            if host_deps.contains(&dep.id.as_str()) {
                continue;
            }
            assert!(!in_namespace(&dep.namespace, "org.homehub"));
        }
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(descriptor) = TypeDescriptor::parse(text) {
            let _ = descriptor.api_version();
            let _ = descriptor.env_overrides().len();
        }
    }
});
