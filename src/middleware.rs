//! Quota enforcement stage for the axum pipeline.
//!
//! Attach with `axum::middleware::from_fn_with_state(tracker, enforce_quota)`.
//! Every response that leaves this stage carries `X-Remaining-Requests`,
//! whether it was rejected here or produced downstream.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::AppError;
use crate::metrics::{QUOTA_REJECTIONS, REQUEST_TOTAL};
use crate::rate_limit::{QuotaDecision, QuotaTracker};

pub const REMAINING_HEADER: &str = "x-remaining-requests";

/// Key used when the connection origin is not available.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub fn client_identifier(req: &Request) -> String {
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => {
            tracing::debug!(path = %req.uri().path(), "no connection info, using sentinel client");
            UNKNOWN_CLIENT.to_string()
        }
    }
}

pub async fn enforce_quota(
    State(tracker): State<Arc<QuotaTracker>>,
    req: Request,
    next: Next,
) -> Response {
    REQUEST_TOTAL.inc();

    let client = client_identifier(&req);

    if !tracker.is_guarded(req.uri().path()) {
        // registers the client before delegating, re-read afterwards for the header
        tracker.remaining(&client);
        let mut response = next.run(req).await;
        let remaining = tracker.remaining(&client);
        set_remaining(&mut response, remaining);
        return response;
    }

    match tracker.check_and_consume(&client) {
        QuotaDecision::Allowed { remaining } => {
            tracing::debug!(client = %client, remaining, "quota slot consumed");
            let mut response = next.run(req).await;
            set_remaining(&mut response, remaining);
            response
        }
        QuotaDecision::Rejected => {
            QUOTA_REJECTIONS.inc();
            tracing::info!(
                client = %client,
                limit = tracker.daily_limit(),
                "daily quota exhausted, rejecting"
            );
            let mut response = AppError::QuotaExceeded.into_response();
            set_remaining(&mut response, 0);
            response
        }
    }
}

fn set_remaining(response: &mut Response, remaining: u32) {
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(remaining));
}
