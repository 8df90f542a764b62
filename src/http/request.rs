//! Inbound request parsing.
//!
//! # Responsibilities
//! - Turn the query string into a [`ProxyRequest`]
//! - Normalize the target URL (joined `url` params, legacy gateway prefix)
//! - Apply the defaults and polarity of `jpeg`, `bw` and `l`
//!
//! # Design Decisions
//! - A missing or empty `url` is not an error: the caller takes the decoy path
//! - URL validity is NOT checked here; the origin fetcher owns that verdict

use std::sync::LazyLock;

use axum::http::HeaderName;
use regex::Regex;

use crate::transcode::OutputFormat;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

static GATEWAY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)http://1\.1\.\d\.\d/bmi/(https?://)?").expect("static regex")
});

/// One relay request, derived from the inbound query.
///
/// Everything except the origin fields is fixed at construction. The origin
/// fields are filled exactly once, after the origin answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    /// Target URL as the client asked for it (after normalization).
    pub url: String,
    pub format: OutputFormat,
    pub grayscale: bool,
    /// Encoder quality, always within 1..=100.
    pub quality: u8,
    /// Client asked for the body untouched.
    pub bypass: bool,
    origin_type: String,
    origin_size: u64,
}

impl ProxyRequest {
    /// Parse a raw query string. `None` means no target was given.
    pub fn from_query(query: Option<&str>, default_quality: u8) -> Option<Self> {
        let query = query.unwrap_or_default();

        let mut urls: Vec<String> = Vec::new();
        let mut jpeg = false;
        let mut bw: Option<String> = None;
        let mut level: Option<String> = None;
        let mut bypass = false;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "url" => urls.push(value.into_owned()),
                "jpeg" => jpeg = true,
                "bw" => bw = Some(value.into_owned()),
                "l" => level = Some(value.into_owned()),
                "bypass" => bypass = true,
                _ => {}
            }
        }

        let joined = urls.join("&url=");
        if joined.is_empty() {
            return None;
        }

        Some(Self {
            url: normalize_target(&joined),
            format: if jpeg { OutputFormat::Jpeg } else { OutputFormat::Webp },
            grayscale: bw.as_deref() != Some("0"),
            quality: parse_quality(level.as_deref(), default_quality),
            bypass,
            origin_type: String::new(),
            origin_size: 0,
        })
    }

    /// Record what the origin declared about its body.
    pub fn set_origin(&mut self, content_type: impl Into<String>, size: u64) {
        self.origin_type = content_type.into();
        self.origin_size = size;
    }

    /// Origin `content-type`, empty when absent.
    pub fn origin_type(&self) -> &str {
        &self.origin_type
    }

    /// Origin `content-length`, 0 when absent or not a number.
    pub fn origin_size(&self) -> u64 {
        self.origin_size
    }
}

/// Strip the legacy `http://1.1.x.x/bmi/` gateway prefix.
fn normalize_target(raw: &str) -> String {
    GATEWAY_PREFIX.replace(raw, "http://").into_owned()
}

/// Leading-integer parse: `"55abc"` is 55, `"abc"` is nothing.
fn leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn parse_quality(raw: Option<&str>, default_quality: u8) -> u8 {
    match raw.and_then(leading_int) {
        None | Some(0) => default_quality,
        Some(n) => n.clamp(1, 100) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> ProxyRequest {
        ProxyRequest::from_query(Some(query), 40).unwrap()
    }

    #[test]
    fn missing_url_is_decoy() {
        assert!(ProxyRequest::from_query(None, 40).is_none());
        assert!(ProxyRequest::from_query(Some("jpeg=1&l=20"), 40).is_none());
        assert!(ProxyRequest::from_query(Some("url="), 40).is_none());
    }

    #[test]
    fn defaults_are_webp_grayscale_quality_40() {
        let request = parse("url=http://example.com/a.png");
        assert_eq!(request.url, "http://example.com/a.png");
        assert_eq!(request.format, OutputFormat::Webp);
        assert!(request.grayscale);
        assert_eq!(request.quality, 40);
        assert!(!request.bypass);
        assert_eq!(request.origin_size(), 0);
    }

    #[test]
    fn bw_only_zero_disables_grayscale() {
        assert!(!parse("url=http://a/b&bw=0").grayscale);
        assert!(parse("url=http://a/b&bw=1").grayscale);
        assert!(parse("url=http://a/b&bw=").grayscale);
        assert!(parse("url=http://a/b&bw=false").grayscale);
    }

    #[test]
    fn jpeg_presence_selects_jpeg() {
        assert_eq!(parse("url=http://a/b&jpeg").format, OutputFormat::Jpeg);
        assert_eq!(parse("url=http://a/b&jpeg=0").format, OutputFormat::Jpeg);
    }

    #[test]
    fn quality_parsing() {
        assert_eq!(parse("url=http://a/b&l=75").quality, 75);
        assert_eq!(parse("url=http://a/b&l=60px").quality, 60);
        assert_eq!(parse("url=http://a/b&l=abc").quality, 40);
        assert_eq!(parse("url=http://a/b&l=0").quality, 40);
        assert_eq!(parse("url=http://a/b&l=500").quality, 100);
        assert_eq!(parse("url=http://a/b&l=-5").quality, 1);
    }

    #[test]
    fn repeated_url_params_are_rejoined() {
        let request = parse("url=http://a/img?x=1&url=y=2");
        assert_eq!(request.url, "http://a/img?x=1&url=y=2");
    }

    #[test]
    fn gateway_prefix_is_stripped() {
        let request = parse("url=http://1.1.3.4/bmi/https://cdn.example.com/p.jpg");
        assert_eq!(request.url, "http://cdn.example.com/p.jpg");

        let request = parse("url=HTTP://1.1.0.9/BMI/cdn.example.com/p.jpg");
        assert_eq!(request.url, "http://cdn.example.com/p.jpg");
    }

    #[test]
    fn origin_fields_are_recorded() {
        let mut request = parse("url=http://a/b");
        request.set_origin("image/png", 1234);
        assert_eq!(request.origin_type(), "image/png");
        assert_eq!(request.origin_size(), 1234);
    }
}
