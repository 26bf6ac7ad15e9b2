//! Shared helpers for the module loader and the host binary

pub mod env;
pub mod error;
pub mod logging;
pub mod time;

pub use env::env_opt;
pub use error::result_to_option;
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config};
pub use time::current_timestamp;
