//! Error handling utilities for graceful degradation
//!
//! A failing module must never take the host down, so most non-critical
//! paths in the loader log and continue instead of propagating.

use tracing::warn;

/// Convert a Result to an Option, logging the error
///
/// # Example
/// ```rust
/// use homehub_modules::utils::result_to_option;
///
/// let parsed = result_to_option("42".parse::<u32>(), "Failed to parse port");
/// assert_eq!(parsed, Some(42));
/// ```
pub fn result_to_option<T, E>(result: Result<T, E>, context: &str) -> Option<T>
where
    E: std::fmt::Display,
{
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_to_option() {
        assert_eq!(result_to_option("42".parse::<u32>(), "parse"), Some(42));
        assert_eq!(result_to_option("nope".parse::<u32>(), "parse"), None);
    }
}
