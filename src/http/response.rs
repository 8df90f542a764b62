//! Terminal responses.
//!
//! # Responsibilities
//! - Redirect the client to the original resource (the fallback for
//!   almost every failure)
//! - Build the transcoded reply with its size accounting headers
//! - Build the bypass reply that streams the origin body untouched
//! - The decoy echo and the 400 for malformed targets
//!
//! # Design Decisions
//! - Each builder starts from a fresh header map; a redirect can never
//!   inherit headers prepared for a success path
//! - The bypass body errors out instead of ending cleanly, which makes
//!   hyper drop the client connection rather than finish a short response

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::security::headers::copy_bypass_headers;
use crate::transcode::Encoded;

pub const X_ORIGINAL_SIZE: HeaderName = HeaderName::from_static("x-original-size");
pub const X_BYTES_SAVED: HeaderName = HeaderName::from_static("x-bytes-saved");

/// Body of the decoy reply.
pub const DECOY_BODY: &str = "1we23";

/// 302 to `target`, with nothing that could let a cache keep it.
pub fn redirect_to(target: &str) -> Response {
    // Raw target when it is already plain ASCII, percent-encoded otherwise.
    let location = if target.bytes().all(|b| b.is_ascii_graphic()) {
        HeaderValue::from_str(target).ok()
    } else {
        url::Url::parse(target)
            .ok()
            .and_then(|url| HeaderValue::from_str(url.as_str()).ok())
    };

    let Some(location) = location else {
        tracing::warn!(url = %target, "Target cannot be used as a redirect location");
        return (StatusCode::BAD_REQUEST, "Invalid URL").into_response();
    };

    let mut response = StatusCode::FOUND.into_response();
    let headers = response.headers_mut();
    headers.insert(header::LOCATION, location);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

/// 400 for a target the fetcher refused to parse.
pub fn invalid_url() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid URL").into_response()
}

/// 200 echoing the masked identity headers.
pub fn decoy(identity: HeaderMap) -> Response {
    (StatusCode::OK, identity, DECOY_BODY).into_response()
}

/// Difference between the declared origin size and what was sent.
/// Negative when the encoder inflated the payload.
pub fn bytes_saved(original_size: u64, encoded_size: u64) -> i64 {
    i64::try_from(original_size)
        .unwrap_or(i64::MAX)
        .saturating_sub(i64::try_from(encoded_size).unwrap_or(i64::MAX))
}

/// 200 with the encoded body and size accounting.
pub fn transcoded(mut headers: HeaderMap, encoded: Encoded, original_size: u64) -> Response {
    let saved = bytes_saved(original_size, encoded.len());

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(encoded.content_type()));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
    headers.insert(X_ORIGINAL_SIZE, HeaderValue::from(original_size));
    headers.insert(X_BYTES_SAVED, HeaderValue::from(saved));

    (StatusCode::OK, headers, encoded.bytes).into_response()
}

/// 200 streaming `body` as received from the origin.
pub fn bypass<S, E>(mut headers: HeaderMap, origin_headers: &HeaderMap, body: S) -> Response
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    copy_bypass_headers(origin_headers, &mut headers);

    let body = body.map(|chunk| {
        chunk.inspect_err(|e| {
            tracing::warn!(error = %e, "Origin stream failed mid-transfer, dropping client connection");
        })
    });

    (StatusCode::OK, headers, Body::from_stream(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::OutputFormat;

    #[test]
    fn redirect_sets_location() {
        let response = redirect_to("http://example.com/a.png?x=1");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://example.com/a.png?x=1"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
    }

    #[test]
    fn redirect_percent_encodes_non_ascii() {
        let response = redirect_to("http://example.com/bild ä.png");
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "http://example.com/bild%20%C3%A4.png"
        );
    }

    #[test]
    fn savings_can_be_negative() {
        assert_eq!(bytes_saved(100_000, 30_000), 70_000);
        assert_eq!(bytes_saved(500, 800), -300);
        assert_eq!(bytes_saved(0, 10), -10);
    }

    #[test]
    fn transcoded_headers() {
        let encoded = Encoded {
            bytes: Bytes::from_static(&[0u8; 250]),
            format: OutputFormat::Webp,
        };
        let response = transcoded(HeaderMap::new(), encoded, 1000);
        let headers = response.headers();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "image/webp");
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "250");
        assert_eq!(headers.get(X_ORIGINAL_SIZE).unwrap(), "1000");
        assert_eq!(headers.get(X_BYTES_SAVED).unwrap(), "750");
    }

    #[test]
    fn decoy_echoes_headers() {
        let mut identity = HeaderMap::new();
        identity.insert(header::VIA, HeaderValue::from_static("1.1 test"));
        let response = decoy(identity);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(header::VIA).unwrap(), "1.1 test");
    }
}
