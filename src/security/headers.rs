//! Response header projection.
//!
//! # Responsibilities
//! - Copy a fixed allow-list of origin headers onto the client response
//! - Copy the byte-range allow-list on the bypass path
//! - Add the cross-origin headers every successful response carries
//!
//! # Design Decisions
//! - Allow-list, never deny-list: hop-by-hop and framing headers are
//!   simply never on the list
//! - Length and encoding are decided by the relay, not the origin

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Origin headers copied onto every successful response.
pub const PROJECTED_HEADERS: [HeaderName; 8] = [
    header::CACHE_CONTROL,
    header::CONTENT_DISPOSITION,
    header::CONTENT_LANGUAGE,
    header::CONTENT_TYPE,
    header::ETAG,
    header::EXPIRES,
    header::LAST_MODIFIED,
    header::VARY,
];

/// Origin headers copied when the body is piped through untouched.
pub const BYPASS_HEADERS: [HeaderName; 4] = [
    header::ACCEPT_RANGES,
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
];

/// Marker set on responses whose body was not transcoded.
pub const X_PROXY_BYPASS: HeaderName = HeaderName::from_static("x-proxy-bypass");

fn copy_listed(names: &[HeaderName], origin: &HeaderMap, out: &mut HeaderMap) {
    for name in names {
        let mut values = origin.get_all(name).iter();
        if let Some(first) = values.next() {
            out.insert(name.clone(), first.clone());
            for value in values {
                out.append(name.clone(), value.clone());
            }
        }
    }
}

/// Copy the general allow-list from origin to client.
pub fn project_response_headers(origin: &HeaderMap, out: &mut HeaderMap) {
    copy_listed(&PROJECTED_HEADERS, origin, out);
}

/// Mark the response as bypassed and copy the range/length headers.
pub fn copy_bypass_headers(origin: &HeaderMap, out: &mut HeaderMap) {
    out.insert(X_PROXY_BYPASS, HeaderValue::from_static("1"));
    copy_listed(&BYPASS_HEADERS, origin, out);
}

/// Force identity encoding and open the response to cross-origin use.
pub fn apply_cross_origin_headers(out: &mut HeaderMap) {
    out.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
    out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    out.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("cross-origin"),
    );
    out.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("unsafe-none"),
    );
}
