//! Transcoding subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest + origin headers
//!     → classifier.rs (worth transcoding?)
//!     → engine.rs (pump origin chunks into a bounded channel)
//!     → codec.rs on a blocking thread (sniff, decode, grayscale, encode)
//!     → Encoded { bytes, content type }
//! ```
//!
//! # Design Decisions
//! - Codec work never runs on the async executor
//! - The channel between pump and codec is the backpressure point
//! - Output is fully buffered: its length goes into headers before the body

pub mod classifier;
pub mod codec;
pub mod engine;

use thiserror::Error;

pub use classifier::should_transcode;
pub use engine::{Encoded, SourceLimits, TranscodeEngine};

/// Encoder used for the transcoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Lossy JPEG, selected by the `jpeg` query flag.
    Jpeg,
    /// Lossy WebP, the default.
    Webp,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Webp => "image/webp",
        }
    }
}

/// Per-request encoder parameters plus the process-wide animation toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub format: OutputFormat,
    /// 1..=100.
    pub quality: u8,
    pub grayscale: bool,
    pub animate: bool,
    /// Largest source, in pixels, the decoder will expand.
    pub max_pixels: u64,
}

/// Errors that end a transcode attempt.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Reading the origin body failed or was cut short.
    #[error("source read failed: {0}")]
    Source(#[from] std::io::Error),

    #[error("source exceeds {0} bytes")]
    SourceTooLarge(u64),

    /// The origin stopped sending before the body was complete.
    #[error("origin stalled for {0:?}")]
    Stalled(std::time::Duration),

    /// First bytes do not look like any supported image.
    #[error("unsupported source format")]
    Unsupported,

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("codec worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
