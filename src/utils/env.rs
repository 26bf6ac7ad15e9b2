//! Environment variable utilities

/// Get environment variable as Option
///
/// Returns `Some(value)` if set and valid unicode, `None` otherwise.
///
/// # Example
/// ```rust
/// use homehub_modules::utils::env_opt;
///
/// let modules_dir = env_opt("HOMEHUB_MODULES_DIR").unwrap_or_else(|| "modules".to_string());
/// ```
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_opt() {
        std::env::set_var("HOMEHUB_TEST_VALUE", "lights");
        assert_eq!(env_opt("HOMEHUB_TEST_VALUE").as_deref(), Some("lights"));
        std::env::remove_var("HOMEHUB_TEST_VALUE");
        assert_eq!(env_opt("HOMEHUB_TEST_VALUE"), None);
    }
}
