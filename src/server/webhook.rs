//! Webhook endpoint handler.
//!
//! Verifies the signature, extracts the pull requests an event refers to and
//! queues each of them on the engine. Evaluation happens asynchronously, so
//! the response only acknowledges the delivery.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::webhooks::{ParseError, parse_webhook};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-GitHub-Event`: Event type (e.g., "pull_request", "check_run")
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload
/// - Optional `X-GitHub-Delivery`, used for logging
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 202 Accepted: pull requests were queued
/// - 200 OK: the event does not concern any pull request, or reports on the
///   bot's own status check
/// - 400 Bad Request: missing header or malformed payload
/// - 401 Unauthorized: invalid signature
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or_default();

    // Reject forged deliveries before touching the payload.
    if !app_state.webhook_secret().verify(&body, &signature_header) {
        warn!(%delivery_id, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let Some(trigger) = parse_webhook(&event_type, &body, app_state.own_checks())? else {
        debug!(%delivery_id, %event_type, "Ignoring webhook");
        return Ok((StatusCode::OK, "Ignored"));
    };

    info!(
        %delivery_id,
        event = %trigger.event,
        repo = %trigger.repo,
        pull_requests = ?trigger.pull_requests,
        "Webhook triggered evaluation"
    );
    for pr in trigger.refs() {
        app_state.engine().queue(pr);
    }
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
