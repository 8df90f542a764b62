//! Origin fetch subsystem.
//!
//! # Data Flow
//! ```text
//! target URL + inbound headers
//!     → fetcher.rs (validate, mask identity, GET with redirect limit + timeout)
//!     → Outcome::Success(OriginResponse)   status < 400, no redirect pending
//!     → Outcome::RedirectNeeded            status >= 400, or 3xx with Location
//!     → Outcome::UpstreamError(FetchError) bad URL, transport failure, timeout
//! ```
//!
//! # Design Decisions
//! - No retries: one failed attempt goes straight to the fallback
//! - The body is owned by exactly one consumer; dropping it aborts the
//!   upstream connection

pub mod fetcher;

use std::time::Duration;

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;

pub use fetcher::OriginFetcher;

/// Closed set of failure kinds the assembler branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Client error, answered with 400.
    InvalidUrl,
    /// Transport failure, answered with a redirect.
    Network,
}

/// Errors from the origin fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid target url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("target '{0}' points at a loopback address")]
    LoopbackTarget(String),

    #[error("origin request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("origin did not answer within {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::InvalidUrl { .. } | FetchError::LoopbackTarget(_) => {
                FetchErrorKind::InvalidUrl
            }
            FetchError::Network(_) | FetchError::Timeout(_) => FetchErrorKind::Network,
        }
    }
}

/// A successful origin answer whose body has not been read yet.
#[derive(Debug)]
pub struct OriginResponse {
    response: reqwest::Response,
}

impl OriginResponse {
    fn new(response: reqwest::Response) -> Self {
        Self { response }
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Declared `content-type`, empty when absent.
    pub fn content_type(&self) -> String {
        self.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Declared `content-length`, 0 when absent or not a number.
    pub fn declared_size(&self) -> u64 {
        self.headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Hand the body to its single consumer.
    pub fn into_body(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static {
        self.response.bytes_stream()
    }
}

/// Result of one origin fetch.
#[derive(Debug)]
pub enum Outcome {
    Success(OriginResponse),
    UpstreamError(FetchError),
    RedirectNeeded,
}
