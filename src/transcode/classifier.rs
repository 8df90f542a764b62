//! Compress-vs-bypass decision.

use crate::config::TranscodeConfig;
use crate::http::request::ProxyRequest;
use crate::transcode::OutputFormat;

/// Whether the origin body should go through the encoder.
///
/// Must only be called once the origin headers are recorded on `request`.
pub fn should_transcode(request: &ProxyRequest, config: &TranscodeConfig) -> bool {
    if request.bypass {
        return false;
    }

    let content_type = request.origin_type().to_ascii_lowercase();
    let size = request.origin_size();

    if !content_type.starts_with("image") || size == 0 {
        return false;
    }

    match request.format {
        OutputFormat::Webp => size >= config.min_compress_length,
        OutputFormat::Jpeg => {
            let transparent = content_type.ends_with("png") || content_type.ends_with("gif");
            !(transparent && size < config.min_transparent_compress_length)
        }
    }
}
