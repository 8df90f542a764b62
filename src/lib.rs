//! Transcoding image relay.
//!
//! Fetches a remote resource for a client, re-encodes images to cut the
//! bytes on the wire, and falls back to redirecting the client to the
//! original URL whenever fetching or transcoding cannot succeed.
//!
//! # Query parameters
//! - `url`: target resource; without it the relay answers with a decoy
//! - `jpeg`: present means JPEG output, otherwise WebP
//! - `bw`: grayscale is ON unless `bw=0` (note the polarity)
//! - `l`: quality, default 40
//! - `bypass`: present means the body is passed through untouched

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod origin;
pub mod security;
pub mod transcode;

pub use config::RelayConfig;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
