//! Request orchestration.
//!
//! # States
//! ```text
//! Start ──no url──────────────────────────────▶ decoy echo (200)
//!   │
//!   ▼
//! Fetching ──InvalidUrl──────────────────────▶ 400
//!   │      ──Network (logged)────────────────▶ redirect
//!   │      ──RedirectNeeded──────────────────▶ redirect
//!   ▼
//! Streaming ──classifier: bypass─────────────▶ 200, origin body piped
//!           ──classifier: transcode ──ok─────▶ 200, encoded body
//!                                   ──failed─▶ redirect
//! ```
//! Every state is terminal once its response is built; nothing is retried.

use std::time::Instant;

use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;

use crate::http::request::ProxyRequest;
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics::{self, RequestOutcome};
use crate::origin::{FetchErrorKind, Outcome};
use crate::security::headers::{apply_cross_origin_headers, project_response_headers};
use crate::transcode::should_transcode;

/// Entry point for every relay request.
pub async fn relay_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();
    let (outcome, response) = assemble(&state, query.as_deref(), &headers).await;
    metrics::record_request(outcome, start);
    response
}

async fn assemble(
    state: &AppState,
    query: Option<&str>,
    inbound: &HeaderMap,
) -> (RequestOutcome, Response) {
    let Some(mut request) = ProxyRequest::from_query(query, state.transcode.default_quality) else {
        tracing::debug!("No target given, answering with decoy");
        let identity = state.fetcher.masker().decoy_headers(inbound);
        return (RequestOutcome::Decoy, response::decoy(identity));
    };

    let origin = match state.fetcher.fetch(&request.url, inbound).await {
        Outcome::Success(origin) => origin,
        Outcome::RedirectNeeded => {
            return (RequestOutcome::Redirect, response::redirect_to(&request.url));
        }
        Outcome::UpstreamError(e) => match e.kind() {
            FetchErrorKind::InvalidUrl => {
                tracing::debug!(error = %e, "Rejected target");
                return (RequestOutcome::InvalidUrl, response::invalid_url());
            }
            FetchErrorKind::Network => {
                tracing::error!(url = %request.url, error = %e, "Origin fetch failed");
                return (RequestOutcome::Redirect, response::redirect_to(&request.url));
            }
        },
    };

    request.set_origin(origin.content_type(), origin.declared_size());

    let mut headers = HeaderMap::new();
    project_response_headers(origin.headers(), &mut headers);
    apply_cross_origin_headers(&mut headers);

    if !should_transcode(&request, &state.transcode) {
        tracing::debug!(
            content_type = %request.origin_type(),
            size = request.origin_size(),
            "Passing origin body through"
        );
        let origin_headers = origin.headers().clone();
        return (
            RequestOutcome::Bypass,
            response::bypass(headers, &origin_headers, origin.into_body()),
        );
    }

    let transcoded = state
        .engine
        .transcode(origin.into_body(), request.format, request.quality, request.grayscale)
        .await;

    match transcoded {
        Ok(encoded) => {
            let saved = response::bytes_saved(request.origin_size(), encoded.len());
            tracing::debug!(
                original = request.origin_size(),
                encoded = encoded.len(),
                saved,
                "Transcoded"
            );
            metrics::record_bytes_saved(saved);
            (
                RequestOutcome::Transcoded,
                response::transcoded(headers, encoded, request.origin_size()),
            )
        }
        Err(e) => {
            tracing::debug!(error = %e, "Transcode failed, redirecting");
            metrics::record_transcode_failure();
            (RequestOutcome::Redirect, response::redirect_to(&request.url))
        }
    }
}
