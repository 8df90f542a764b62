//! Synchronous image codec work.
//!
//! Everything here blocks; callers run it on a blocking thread.
//!
//! The source is read into memory in full before decoding starts. The
//! decoders need `Seek`, so the upstream channel only paces the download;
//! it does not make decoding incremental. `max_source_bytes` caps the
//! compressed input and the pixel budget caps what decoding may allocate.

use std::io::{Cursor, Read};

use image::codecs::gif::GifDecoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPDecoder;
use image::error::{LimitError, LimitErrorKind};
use image::{
    AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageError, ImageFormat, ImageReader,
    Limits, RgbaImage,
};

use crate::transcode::{EncodeSettings, OutputFormat, TranscodeError};

/// Bytes inspected before committing to read the whole source.
const SNIFF_LEN: u64 = 32;

/// Largest edge libwebp can encode.
const MAX_DIMENSION: u32 = 16383;

/// Worst-case decoded size per pixel (16-bit RGBA).
const MAX_BYTES_PER_PIXEL: u64 = 8;

/// Read a source body, failing as soon as its first bytes rule out an image.
pub fn read_source<R: Read>(mut reader: R, limit: u64) -> Result<Vec<u8>, TranscodeError> {
    let mut data = Vec::new();
    (&mut reader).take(SNIFF_LEN).read_to_end(&mut data)?;
    if image::guess_format(&data).is_err() {
        return Err(TranscodeError::Unsupported);
    }

    let remaining = limit.saturating_add(1).saturating_sub(data.len() as u64);
    reader.take(remaining).read_to_end(&mut data)?;
    if data.len() as u64 > limit {
        return Err(TranscodeError::SourceTooLarge(limit));
    }
    Ok(data)
}

/// Read and transcode in one go.
pub fn transcode_reader<R: Read>(
    reader: R,
    limit: u64,
    settings: EncodeSettings,
) -> Result<Vec<u8>, TranscodeError> {
    let data = read_source(reader, limit)?;
    transcode_bytes(&data, settings)
}

/// Decode `data` and re-encode it according to `settings`.
///
/// Output is a pure function of the input bytes and settings.
pub fn transcode_bytes(data: &[u8], settings: EncodeSettings) -> Result<Vec<u8>, TranscodeError> {
    let format = image::guess_format(data).map_err(|_| TranscodeError::Unsupported)?;

    if settings.animate && settings.format == OutputFormat::Webp {
        if let Some(frames) = decode_frames(data, format, settings.max_pixels)? {
            tracing::debug!(frames = frames.len(), "Encoding animated source");
            return encode_animated_webp(frames, settings);
        }
    }

    let mut reader = ImageReader::with_format(Cursor::new(data), format);
    reader.limits(decoder_limits(settings.max_pixels));
    let decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();
    check_pixels(width, height, settings.max_pixels)?;
    let image = DynamicImage::from_decoder(decoder)?;
    encode_still(image, settings)
}

fn decoder_limits(max_pixels: u64) -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    limits.max_alloc = Some(max_pixels.saturating_mul(MAX_BYTES_PER_PIXEL));
    limits
}

fn limit_exceeded(kind: LimitErrorKind) -> TranscodeError {
    TranscodeError::Decode(ImageError::Limits(LimitError::from_kind(kind)))
}

fn check_pixels(width: u32, height: u32, max_pixels: u64) -> Result<(), TranscodeError> {
    if u64::from(width) * u64::from(height) > max_pixels {
        return Err(limit_exceeded(LimitErrorKind::DimensionError));
    }
    Ok(())
}

/// Frames of a multi-frame source, `None` for still images.
///
/// Decoded canvases together may not exceed the RGBA size of
/// `max_pixels`.
fn decode_frames(
    data: &[u8],
    format: ImageFormat,
    max_pixels: u64,
) -> Result<Option<Vec<Frame>>, TranscodeError> {
    let limits = decoder_limits(max_pixels);
    let budget = max_pixels.saturating_mul(4);

    let frames = match format {
        ImageFormat::Gif => {
            let mut decoder = GifDecoder::new(Cursor::new(data))?;
            decoder.set_limits(limits)?;
            let (width, height) = decoder.dimensions();
            check_pixels(width, height, max_pixels)?;
            collect_bounded(decoder.into_frames(), budget)?
        }
        ImageFormat::WebP => {
            let mut decoder = WebPDecoder::new(Cursor::new(data))?;
            if !decoder.has_animation() {
                return Ok(None);
            }
            decoder.set_limits(limits)?;
            let (width, height) = decoder.dimensions();
            check_pixels(width, height, max_pixels)?;
            collect_bounded(decoder.into_frames(), budget)?
        }
        _ => return Ok(None),
    };

    if frames.len() < 2 {
        Ok(None)
    } else {
        Ok(Some(frames))
    }
}

fn collect_bounded(frames: image::Frames<'_>, budget: u64) -> Result<Vec<Frame>, TranscodeError> {
    let mut collected = Vec::new();
    let mut total: u64 = 0;
    for frame in frames {
        let frame = frame?;
        total = total.saturating_add(frame.buffer().as_raw().len() as u64);
        if total > budget {
            return Err(limit_exceeded(LimitErrorKind::InsufficientMemory));
        }
        collected.push(frame);
    }
    Ok(collected)
}

fn encode_still(image: DynamicImage, settings: EncodeSettings) -> Result<Vec<u8>, TranscodeError> {
    let image = if settings.grayscale {
        image.grayscale()
    } else {
        image
    };
    let (width, height) = (image.width(), image.height());

    match settings.format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel; luma stays single-channel.
            let flat = if settings.grayscale {
                DynamicImage::ImageLuma8(image.to_luma8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            let mut out = Vec::new();
            flat.write_with_encoder(JpegEncoder::new_with_quality(&mut out, settings.quality))?;
            Ok(out)
        }
        OutputFormat::Webp => {
            let memory = if image.color().has_alpha() {
                let rgba = image.to_rgba8();
                webp::Encoder::from_rgba(rgba.as_raw(), width, height)
                    .encode_simple(false, f32::from(settings.quality))
            } else {
                let rgb = image.to_rgb8();
                webp::Encoder::from_rgb(rgb.as_raw(), width, height)
                    .encode_simple(false, f32::from(settings.quality))
            }
            .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))?;
            Ok(memory.to_vec())
        }
    }
}

fn encode_animated_webp(frames: Vec<Frame>, settings: EncodeSettings) -> Result<Vec<u8>, TranscodeError> {
    let mut timestamp_ms: i32 = 0;
    let mut canvases: Vec<(RgbaImage, i32)> = Vec::with_capacity(frames.len());
    for frame in frames {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let delay = if denom == 0 { 0 } else { numer / denom };
        let buffer = frame.into_buffer();
        let buffer = if settings.grayscale {
            DynamicImage::ImageRgba8(buffer).grayscale().to_rgba8()
        } else {
            buffer
        };
        canvases.push((buffer, timestamp_ms));
        timestamp_ms = timestamp_ms.saturating_add(i32::try_from(delay).unwrap_or(i32::MAX));
    }

    // The encoder closes the stream with an end timestamp of 0, which libwebp
    // discards; the last frame then gets the mean of the earlier durations
    // instead of its own delay.
    let (width, height) = canvases[0].0.dimensions();
    let mut config = libwebp_sys::WebPConfig::new()
        .map_err(|_| TranscodeError::Encode("webp config init failed".into()))?;
    config.lossless = 0;
    config.quality = f32::from(settings.quality);

    let mut encoder = webp::AnimEncoder::new(width, height, &config);
    for (canvas, timestamp) in &canvases {
        encoder.add_frame(webp::AnimFrame::from_rgba(canvas.as_raw(), width, height, *timestamp));
    }
    let memory = encoder
        .try_encode()
        .map_err(|e| TranscodeError::Encode(format!("{:?}", e)))?;
    Ok(memory.to_vec())
}
