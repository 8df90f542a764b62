//! Streaming transcoder front-end.
//!
//! # Responsibilities
//! - Pump origin chunks into the codec thread as they arrive
//! - Propagate origin errors and early codec failure in both directions
//! - Hand back the encoded buffer with its content type
//!
//! # Cancellation
//! ```text
//! client gone    → handler future dropped → pump + origin stream dropped
//!                → channel closed → codec sees EOF → worker exits
//! codec fails    → reader dropped → pump's send fails → origin stream dropped
//! origin fails   → pump forwards the io::Error → codec read fails
//! origin stalls  → idle deadline → pump returns Stalled → channel closed
//! ```
//!
//! The pump paces the download; the codec still buffers the whole source
//! before decoding (see `codec`).

use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::transcode::codec;
use crate::transcode::{EncodeSettings, OutputFormat, TranscodeError};

/// Chunks buffered between the origin and the codec thread.
const SOURCE_CHANNEL_DEPTH: usize = 8;

/// A finished transcode.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Bytes,
    pub format: OutputFormat,
}

impl Encoded {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Bounds on what one origin body may cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLimits {
    /// Compressed bytes read from the origin.
    pub max_bytes: u64,
    /// Decoded pixels, see [`EncodeSettings::max_pixels`].
    pub max_pixels: u64,
    /// Longest wait for the next origin chunk.
    pub idle_timeout: Duration,
}

/// Transcoder bound to the process-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct TranscodeEngine {
    animate: bool,
    limits: SourceLimits,
}

impl TranscodeEngine {
    pub fn new(animate: bool, limits: SourceLimits) -> Self {
        Self { animate, limits }
    }

    /// Consume `source` and encode it.
    pub async fn transcode<S, E>(
        &self,
        source: S,
        format: OutputFormat,
        quality: u8,
        grayscale: bool,
    ) -> Result<Encoded, TranscodeError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let settings = EncodeSettings {
            format,
            quality: quality.clamp(1, 100),
            grayscale,
            animate: self.animate,
            max_pixels: self.limits.max_pixels,
        };
        let limit = self.limits.max_bytes;

        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(SOURCE_CHANNEL_DEPTH);
        let reader = SyncIoBridge::new(StreamReader::new(ReceiverStream::new(rx)));
        let mut worker =
            tokio::task::spawn_blocking(move || codec::transcode_reader(reader, limit, settings));

        // A finished worker drops the pump, and with it the origin body.
        // A stalled pump abandons the worker; the closed channel ends it.
        let pumping = pump(source, tx, self.limits.idle_timeout);
        tokio::pin!(pumping);
        let result = tokio::select! {
            result = &mut worker => result,
            pumped = &mut pumping => {
                pumped?;
                worker.await
            }
        };
        let bytes = result??;

        Ok(Encoded {
            bytes: Bytes::from(bytes),
            format,
        })
    }
}

/// Forward chunks until the source ends, errors, stalls, or the codec
/// hangs up.
async fn pump<S, E>(
    source: S,
    tx: mpsc::Sender<std::io::Result<Bytes>>,
    idle_timeout: Duration,
) -> Result<(), TranscodeError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut source = std::pin::pin!(source);
    loop {
        let chunk = match tokio::time::timeout(idle_timeout, source.next()).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Ok(()),
            Err(_) => {
                tracing::debug!(?idle_timeout, "Origin stalled, abandoning body");
                return Err(TranscodeError::Stalled(idle_timeout));
            }
        };
        match chunk {
            Ok(bytes) => {
                if tx.send(Ok(bytes)).await.is_err() {
                    tracing::debug!("Codec stopped reading, abandoning origin body");
                    return Ok(());
                }
            }
            Err(e) => {
                let _ = tx.send(Err(std::io::Error::other(e))).await;
                return Ok(());
            }
        }
    }
}
