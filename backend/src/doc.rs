//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every HTTP path and the shared schemas, plus the
//! session cookie security scheme. Swagger UI serves the document in debug
//! builds.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::inbound::http::coins::{BalanceResponse, DebitBody, DebitResponse, TransactionSchema};
use crate::inbound::http::payments::{
    CheckoutBody, CheckoutResponse, OrderBody, OrderResponse, VerifyBody, VerifyResponse,
};
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::webhooks::WebhookAck;

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie carrying the authenticated user id.",
            ))),
        );
    }
}

/// OpenAPI document for the coin ledger API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Coin ledger API",
        description = "Coin balances, payment settlement, and debits for generation actions."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::coins::debit_coins,
        crate::inbound::http::coins::get_balance,
        crate::inbound::http::coins::list_transactions,
        crate::inbound::http::payments::create_checkout,
        crate::inbound::http::payments::create_order,
        crate::inbound::http::payments::verify_payment,
        crate::inbound::http::webhooks::checkout_webhook,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        DebitBody,
        DebitResponse,
        BalanceResponse,
        TransactionSchema,
        CheckoutBody,
        CheckoutResponse,
        OrderBody,
        OrderResponse,
        VerifyBody,
        VerifyResponse,
        WebhookAck,
    )),
    tags(
        (name = "coins", description = "Balance reads and debits"),
        (name = "payments", description = "Checkout sessions, orders, and verification"),
        (name = "webhooks", description = "Provider-signed settlement events"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
