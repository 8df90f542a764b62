//! Outbound origin requests.
//!
//! # Responsibilities
//! - Validate the target before any network activity
//! - Send a GET carrying only the masked identity
//! - Follow a bounded number of redirects inside the client; the redirect
//!   past the limit is handed back and classified like any other answer
//! - Bound the wait for headers and for every body read
//! - Classify the answer into an [`Outcome`]

use std::net::IpAddr;
use std::time::Duration;

use axum::http::{header, HeaderMap};
use reqwest::redirect::Policy;
use url::{Host, Url};

use crate::config::{IdentityConfig, OriginConfig};
use crate::origin::{FetchError, OriginResponse, Outcome};
use crate::security::IdentityMasker;

/// Issues origin requests on behalf of clients.
#[derive(Debug, Clone)]
pub struct OriginFetcher {
    client: reqwest::Client,
    masker: IdentityMasker,
    timeout: Duration,
    block_loopback: bool,
}

impl OriginFetcher {
    pub fn new(origin: &OriginConfig, identity: &IdentityConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(origin.timeout_secs);
        let max_redirects = origin.max_redirects;
        let client = reqwest::Client::builder()
            .redirect(Policy::custom(move |attempt| {
                // `previous` holds every URL already requested, the first included.
                if attempt.previous().len() > max_redirects {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            masker: IdentityMasker::new(identity),
            timeout,
            block_loopback: origin.block_loopback,
        })
    }

    /// Identity masker shared with the decoy path.
    pub fn masker(&self) -> &IdentityMasker {
        &self.masker
    }

    /// Check that `target` is an absolute http(s) URL the relay may fetch.
    pub fn validate_target(&self, target: &str) -> Result<Url, FetchError> {
        let url = Url::parse(target).map_err(|e| FetchError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: target.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let loopback = match url.host() {
            None => {
                return Err(FetchError::InvalidUrl {
                    url: target.to_string(),
                    reason: "missing host".to_string(),
                })
            }
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => is_local(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => is_local(IpAddr::V6(ip)),
        };
        if self.block_loopback && loopback {
            return Err(FetchError::LoopbackTarget(target.to_string()));
        }

        Ok(url)
    }

    /// Fetch `target` with the masked identity derived from `inbound`.
    ///
    /// The headers are the only thing read; nothing client-facing is touched.
    pub async fn fetch(&self, target: &str, inbound: &HeaderMap) -> Outcome {
        let url = match self.validate_target(target) {
            Ok(url) => url,
            Err(e) => return Outcome::UpstreamError(e),
        };

        let request = self
            .client
            .get(url)
            .headers(self.masker.masked_headers(inbound))
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Outcome::UpstreamError(FetchError::Network(e)),
            Err(_) => return Outcome::UpstreamError(FetchError::Timeout(self.timeout)),
        };

        classify(response)
    }
}

fn is_local(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

/// Turn an origin answer into the assembler's next move.
fn classify(response: reqwest::Response) -> Outcome {
    let status = response.status();
    let has_location = response.headers().contains_key(header::LOCATION);

    if status.as_u16() >= 400 || (status.is_redirection() && has_location) {
        tracing::debug!(status = %status, "Origin rejected, client will be redirected");
        return Outcome::RedirectNeeded;
    }

    Outcome::Success(OriginResponse::new(response))
}
