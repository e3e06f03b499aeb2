use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::post,
};
use services::services::github::{
    inbound::WebhookOutcome,
    signature::{SignatureError, verify_signature},
};

use crate::{Deployment, error::ApiError};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";

/// POST /api/webhooks/github - Receive a GitHub webhook delivery
///
/// The signature is verified over the raw body before anything is parsed.
/// A mismatch is a 401 and nothing is processed; unknown event types are
/// acknowledged with 200 so the sender's retry logic stays quiet.
pub async fn receive_github_webhook(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<WebhookOutcome>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Signature(SignatureError::MissingHeader))?;

    verify_signature(&body, signature, &deployment.config().webhook_secret)?;

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let outcome = deployment.webhook_sync().process(event, &body).await?;
    Ok(ResponseJson(outcome))
}

pub fn router() -> Router<Deployment> {
    Router::new().route("/webhooks/github", post(receive_github_webhook))
}
