#![no_main]
use libfuzzer_sys::fuzz_target;
use homehub_modules::module::context::environment::resolve_placeholders;

fuzz_target!(|data: &[u8]| {
    let Ok(template) = std::str::from_utf8(data) else {
        return;
    };

    // Nothing resolves: the template must come back untouched unless a
    // placeholder carries a default
    let resolved = resolve_placeholders(template, |_| None);
    if !template.contains(':') {
        assert_eq!(resolved, template);
    }

    // Everything resolves to the empty string: no complete placeholder survives
    let emptied = resolve_placeholders(template, |_| Some(String::new()));
    assert!(emptied.len() <= template.len());
});
