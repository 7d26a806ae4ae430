//! Card-provider webhook handler.
//!
//! ```text
//! POST /api/v1/webhooks/checkout  Provider-signed settlement events
//! ```
//!
//! The body is taken as raw bytes because the signature covers the exact
//! payload the provider sent; parsing happens only after verification.

use actix_web::{HttpRequest, HttpResponse, post, web};
use chrono::Utc;
use serde::Serialize;

use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::state::HttpState;
use crate::outbound::providers::CardWebhookError;

/// Signature header set by the card provider on every delivery.
pub const SIGNATURE_HEADER: &str = "Checkout-Signature";

/// Acknowledgement body; identical for fresh and replayed deliveries.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct WebhookAck {
    /// Always true once the delivery has been handled.
    pub received: bool,
}

/// Handle a provider-signed settlement event.
///
/// Verification fails closed: a missing webhook secret is a server-side
/// configuration error, never a reason to accept the delivery. Event types
/// other than completed checkouts are acknowledged and ignored, and replays
/// of settled payments are acknowledged without crediting again so the
/// provider stops retrying.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/checkout",
    request_body(
        content = String,
        content_type = "application/json",
        description = "Raw event payload exactly as signed by the provider"
    ),
    responses(
        (status = 200, description = "Delivery handled", body = WebhookAck),
        (status = 400, description = "Bad signature or payload", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 500, description = "Webhook secret not configured or ledger failure", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["webhooks"],
    operation_id = "checkoutWebhook"
)]
#[post("/webhooks/checkout")]
pub async fn checkout_webhook(
    state: web::Data<HttpState>,
    request: HttpRequest,
    payload: web::Bytes,
) -> ApiResult<HttpResponse> {
    let verifier = state.webhook_verifier()?;

    let header = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let notice = verifier
        .verify_and_parse(&payload, header, Utc::now())
        .map_err(|err| {
            match &err {
                CardWebhookError::Payload { message } => {
                    tracing::warn!(message, "rejected webhook payload");
                }
                other => {
                    tracing::warn!(error = %other, "rejected webhook signature");
                }
            }
            Error::from(err)
        })?;

    if let Some(notice) = notice {
        state.settlement.settle(notice).await.map_err(Error::from)?;
    }

    Ok(HttpResponse::Ok().json(WebhookAck { received: true }))
}
