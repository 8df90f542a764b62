//! Startup configuration assembly.
//!
//! # Order
//! defaults or config file → CLI overrides → environment overrides → validation
//!
//! Fail fast: any problem here is fatal and nothing binds.

use std::path::Path;

use crate::config::{load_config, validate_config, ConfigError, RelayConfig};

/// Build the configuration the process will run with.
pub fn resolve_config(
    path: Option<&Path>,
    bind_override: Option<&str>,
) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    if let Some(bind) = bind_override {
        config.listener.bind_address = bind.to_string();
    }
    config.apply_env_overrides();

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
