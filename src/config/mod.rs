//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig::apply_env_overrides (NO_ANIMATE, read once)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to the request handlers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    IdentityConfig, IdentityPolicy, ListenerConfig, ObservabilityConfig, OriginConfig,
    RelayConfig, TranscodeConfig,
};
pub use validation::{validate_config, ValidationError};
