//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the transcoding relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Outbound origin fetch settings.
    pub origin: OriginConfig,

    /// Identity masking applied to outbound requests and the decoy reply.
    pub identity: IdentityConfig,

    /// Transcoding behaviour.
    pub transcode: TranscodeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Fold process environment into the config.
    ///
    /// Called once at startup. Requests only ever see the resulting value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("NO_ANIMATE") {
            if !value.is_empty() {
                self.transcode.animate = false;
            }
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Origin fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Seconds allowed for connecting and receiving response headers,
    /// and the longest gap between two body reads.
    pub timeout_secs: u64,

    /// Redirects followed transparently by the client.
    pub max_redirects: usize,

    /// Refuse targets that point back at a loopback address.
    pub block_loopback: bool,

    /// Upper bound on bytes fed to the transcoder.
    pub max_source_bytes: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_redirects: 4,
            block_loopback: false,
            max_source_bytes: 32 * 1024 * 1024, // 32MB
        }
    }
}

/// Which `via` value outbound requests carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityPolicy {
    /// Pick a `via` value from a small pool on every request.
    #[default]
    Rotating,
    /// Always send `IdentityConfig::fixed_via`.
    Fixed,
}

/// Identity masking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub policy: IdentityPolicy,

    /// Sentinel `via` value for the fixed policy.
    pub fixed_via: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            policy: IdentityPolicy::Rotating,
            fixed_via: "1.1 bandwidth-relay".to_string(),
        }
    }
}

/// Transcoding configuration.
///
/// # Grayscale polarity
///
/// Grayscale output is the DEFAULT. A request only gets colour output when
/// it passes `bw=0`; any other value, or no `bw` parameter at all, produces
/// grayscale. Clients written against a "bw=1 means grayscale" assumption
/// will silently receive grayscale images either way.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Preserve animation for multi-frame sources. When false only the
    /// first frame is encoded. Overridden to false by `NO_ANIMATE`.
    pub animate: bool,

    /// Quality used when `l` is absent or not a number.
    pub default_quality: u8,

    /// Below this size WebP output is not worth producing.
    pub min_compress_length: u64,

    /// Below this size PNG/GIF sources are passed through when the
    /// output is JPEG (transparency would be lost for little gain).
    pub min_transparent_compress_length: u64,

    /// Largest source, in pixels, that will be decoded. Larger sources,
    /// and animations whose frames together exceed it, are redirected.
    pub max_pixels: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            animate: true,
            default_quality: 40,
            min_compress_length: 1024,
            min_transparent_compress_length: 1024 * 100,
            max_pixels: 50_000_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
