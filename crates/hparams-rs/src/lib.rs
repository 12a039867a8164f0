//! Public surface for hierarchical hyperparameters.
//!
//! This crate re-exports the config engine and the built-in component
//! schemas, and provides a small initialization helper to keep consumer
//! setup consistent.

/// Re-export for convenience.
pub use hparams_rs_config as config;
/// Re-export for convenience.
pub use hparams_rs_modules as modules;

pub use hparams_rs_config::{ConfigAccessor, ConfigError, SchemaRegistry};
pub use hparams_rs_modules::builtin_registry;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
