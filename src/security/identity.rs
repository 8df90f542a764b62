//! Client identity masking.
//!
//! Outbound requests never carry the real client's address or agent string.
//! A small set of request headers is passed through; the rest of the
//! identity is synthesized per call.

use std::net::Ipv4Addr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::{IdentityConfig, IdentityPolicy};

/// Request headers forwarded to the origin as-is.
pub const PASSTHROUGH_HEADERS: [HeaderName; 4] =
    [header::COOKIE, header::DNT, header::REFERER, header::RANGE];

const VIA_POOL: [&str; 4] = [
    "1.1 example-proxy-service.com (ExampleProxy/1.0)",
    "1.0 another-proxy.net (Proxy/2.0)",
    "1.1 different-proxy-system.org (DifferentProxy/3.1)",
    "1.1 some-proxy.com (GenericProxy/4.0)",
];

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

/// Random routable-looking IPv4 address.
///
/// First octet stays in 1..=223 and skips 10 and 127, so the result is never
/// loopback, multicast or the most common private block.
pub fn random_ipv4() -> Ipv4Addr {
    let first = loop {
        let candidate = fastrand::u8(1..=223);
        if candidate != 10 && candidate != 127 {
            break candidate;
        }
    };
    Ipv4Addr::new(first, fastrand::u8(..), fastrand::u8(..), fastrand::u8(1..=254))
}

/// A user agent picked from a fixed pool.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// Builds the spoofed identity header set for one request.
#[derive(Debug, Clone)]
pub struct IdentityMasker {
    policy: IdentityPolicy,
    fixed_via: HeaderValue,
}

impl IdentityMasker {
    pub fn new(config: &IdentityConfig) -> Self {
        let fixed_via = HeaderValue::from_str(&config.fixed_via)
            .unwrap_or_else(|_| HeaderValue::from_static("1.1 bandwidth-relay"));
        Self {
            policy: config.policy,
            fixed_via,
        }
    }

    fn via(&self) -> HeaderValue {
        match self.policy {
            IdentityPolicy::Rotating => {
                HeaderValue::from_static(VIA_POOL[fastrand::usize(..VIA_POOL.len())])
            }
            IdentityPolicy::Fixed => self.fixed_via.clone(),
        }
    }

    /// Headers for the outbound origin request.
    pub fn masked_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        self.build(inbound, &PASSTHROUGH_HEADERS)
    }

    /// Headers echoed by the decoy reply. `range` is not echoed.
    pub fn decoy_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        self.build(inbound, &PASSTHROUGH_HEADERS[..3])
    }

    fn build(&self, inbound: &HeaderMap, passthrough: &[HeaderName]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for name in passthrough {
            if let Some(value) = inbound.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        let ip = random_ipv4().to_string();
        if let Ok(value) = HeaderValue::from_str(&ip) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
        headers.insert(header::USER_AGENT, HeaderValue::from_static(random_user_agent()));
        headers.insert(header::VIA, self.via());
        headers
    }
}
