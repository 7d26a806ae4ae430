//! Payment handlers for both providers.
//!
//! ```text
//! POST /api/v1/payments/checkout  Create a card checkout session
//! POST /api/v1/payments/order     Create a regional-gateway order
//! POST /api/v1/payments/verify    Verify a relayed gateway payment and credit
//! ```
//!
//! Packages always resolve from the server-side catalogue; clients name a
//! package id and never an amount. The verify path trusts nothing from the
//! body until the HMAC check passes, and takes the user from the session.

use actix_web::{HttpResponse, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domain::coins::{CoinAmount, ProviderReference};
use crate::domain::packages::{card_package, gateway_package};
use crate::domain::settlement::SettlementNotice;
use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Checkout request body (camelCase, matching the card provider's client).
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutBody {
    /// Card catalogue package id.
    pub package_id: String,
}

/// Checkout response body.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Provider session id the client redirects with.
    pub session_id: String,
}

/// Order request body.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct OrderBody {
    /// Gateway catalogue package id.
    pub package_id: String,
}

/// Order response body.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct OrderResponse {
    /// Gateway order id the client completes payment against.
    pub order_id: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Publishable key id for the client-side checkout widget.
    pub provider_public_key: String,
    /// Package display name.
    pub package_name: String,
    /// Package description shown in the checkout widget.
    pub package_description: String,
}

/// Verify request body.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct VerifyBody {
    /// Gateway order id.
    pub order_id: String,
    /// Gateway payment id; becomes the settlement reference.
    pub payment_id: String,
    /// Hex HMAC signature relayed by the client.
    pub signature: String,
    /// Gateway catalogue package id.
    pub package_id: String,
}

/// Verify response body.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct VerifyResponse {
    /// Always true on 200.
    pub success: bool,
    /// Balance after the credit settled.
    pub new_balance: i64,
}

/// Create a hosted card-checkout session.
///
/// # Errors
///
/// - `400 Bad Request`: unknown package id.
/// - `401 Unauthorized`: no valid session.
/// - `500 Internal Server Error`: provider not configured.
/// - `503 Service Unavailable`: provider unreachable.
#[utoipa::path(
    post,
    path = "/api/v1/payments/checkout",
    request_body = CheckoutBody,
    responses(
        (status = 200, description = "Session created", body = CheckoutResponse),
        (status = 400, description = "Unknown package", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 401, description = "Unauthorised", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 500, description = "Provider not configured", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "createCheckout"
)]
#[post("/payments/checkout")]
pub async fn create_checkout(
    state: web::Data<HttpState>,
    session: SessionContext,
    body: web::Json<CheckoutBody>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let package = card_package(&body.package_id)
        .ok_or_else(|| Error::invalid_request(format!("unknown package: {}", body.package_id)))?;

    let checkout = state.checkout()?;
    let created = checkout
        .create_session(&user_id, package)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, package = package.id, "checkout session creation failed");
            Error::service_unavailable("could not create a checkout session")
        })?;

    Ok(HttpResponse::Ok().json(CheckoutResponse {
        session_id: created.session_id,
    }))
}

/// Create a regional-gateway order.
#[utoipa::path(
    post,
    path = "/api/v1/payments/order",
    request_body = OrderBody,
    responses(
        (status = 200, description = "Order created", body = OrderResponse),
        (status = 400, description = "Unknown package", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 401, description = "Unauthorised", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 500, description = "Provider not configured", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "createOrder"
)]
#[post("/payments/order")]
pub async fn create_order(
    state: web::Data<HttpState>,
    session: SessionContext,
    body: web::Json<OrderBody>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let package = gateway_package(&body.package_id)
        .ok_or_else(|| Error::invalid_request(format!("unknown package: {}", body.package_id)))?;

    let gateway = state.gateway()?;
    let order = gateway
        .orders
        .create_order(&user_id, package)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, package = package.id, "gateway order creation failed");
            Error::service_unavailable("could not create a payment order")
        })?;

    Ok(HttpResponse::Ok().json(OrderResponse {
        order_id: order.order_id,
        amount: order.amount,
        currency: order.currency,
        provider_public_key: gateway.public_key_id.clone(),
        package_name: package.name.to_owned(),
        package_description: format!("{} coins", package.coins),
    }))
}

/// Verify a relayed gateway payment and credit the package's coins.
///
/// The HMAC check runs before anything else is trusted; the user comes from
/// the session and the coin amount from the server-side catalogue. Replays
/// of an already-settled payment succeed without crediting again.
#[utoipa::path(
    post,
    path = "/api/v1/payments/verify",
    request_body = VerifyBody,
    responses(
        (status = 200, description = "Payment verified and credited", body = VerifyResponse),
        (status = 400, description = "Invalid signature or unknown package", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 401, description = "Unauthorised", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 500, description = "Provider not configured or ledger failure", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["payments"],
    operation_id = "verifyPayment"
)]
#[post("/payments/verify")]
pub async fn verify_payment(
    state: web::Data<HttpState>,
    session: SessionContext,
    body: web::Json<VerifyBody>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let gateway = state.gateway()?;

    if let Err(err) = gateway
        .signature
        .verify(&body.order_id, &body.payment_id, &body.signature)
    {
        tracing::warn!(
            order_id = %body.order_id,
            payment_id = %body.payment_id,
            "rejected gateway payment signature"
        );
        return Err(err.into());
    }

    let package = gateway_package(&body.package_id)
        .ok_or_else(|| Error::invalid_request(format!("unknown package: {}", body.package_id)))?;
    let coins = CoinAmount::new(package.coins)
        .map_err(|err| Error::internal(format!("catalogue holds invalid amount: {err}")))?;
    let reference = ProviderReference::new(body.payment_id.clone())
        .map_err(|err| Error::invalid_request(err.to_string()))?;

    let receipt = state
        .settlement
        .settle(SettlementNotice {
            user_id,
            coins,
            reference,
            description: format!("{} purchase: {} coins", package.name, package.coins),
            metadata: json!({
                "provider": "regional_gateway",
                "order_id": body.order_id,
                "package_id": package.id,
            }),
        })
        .await
        .map_err(Error::from)?;

    // A retried verify call lands here with credited=false; the response is
    // identical because the coins are already on the balance.
    Ok(HttpResponse::Ok().json(VerifyResponse {
        success: true,
        new_balance: receipt.balance_after,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::UserId;
    use crate::domain::ledger::LedgerService;
    use crate::domain::ports::{
        FixtureGatewayOrderProvider, InMemoryBalanceStore, MockCheckoutSessionProvider,
        ProviderError,
    };
    use crate::outbound::providers::GatewaySignature;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;
    use std::sync::Arc;

    const GATEWAY_SECRET: &[u8] = b"gw_secret";

    fn is_error_code(value: &Value, code: ErrorCode) -> bool {
        let expected = serde_json::to_value(code).ok();
        value.get("code").cloned() == expected
    }

    fn base_state() -> HttpState {
        HttpState::new(Arc::new(LedgerService::new(Arc::new(
            InMemoryBalanceStore::new(),
        ))))
    }

    fn gateway_state() -> HttpState {
        base_state().with_gateway(crate::inbound::http::state::GatewayPorts {
            orders: Arc::new(FixtureGatewayOrderProvider),
            signature: Arc::new(GatewaySignature::new(GATEWAY_SECRET)),
            public_key_id: "key_test".to_owned(),
        })
    }

    async fn call_as(
        state: HttpState,
        user_id: &UserId,
        build: impl Fn() -> test::TestRequest,
    ) -> actix_web::dev::ServiceResponse {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .wrap(crate::inbound::http::test_utils::test_session_middleware())
                .route(
                    "/test-login/{id}",
                    web::get().to(
                        |session: SessionContext, path: web::Path<String>| async move {
                            let id = UserId::new(path.into_inner()).expect("valid test id");
                            session.persist_user(&id)?;
                            Ok::<_, Error>(HttpResponse::Ok())
                        },
                    ),
                )
                .configure(crate::inbound::http::configure_api),
        )
        .await;

        let login = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/test-login/{user_id}"))
                .to_request(),
        )
        .await;
        let cookie = login
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie set")
            .into_owned();

        test::call_service(&app, build().cookie(cookie).to_request()).await
    }

    #[actix_web::test]
    async fn checkout_returns_session_id() {
        let mut provider = MockCheckoutSessionProvider::new();
        provider
            .expect_create_session()
            .withf(|_, package| package.id == "500")
            .once()
            .returning(|_, _| {
                Ok(crate::domain::ports::CheckoutSession {
                    session_id: "cs_42".to_owned(),
                })
            });
        let state = base_state().with_checkout(Arc::new(provider));

        let user_id = UserId::random();
        let res = call_as(state, &user_id, || {
            test::TestRequest::post()
                .uri("/payments/checkout")
                .set_json(serde_json::json!({ "packageId": "500" }))
        })
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(
            body.get("sessionId").and_then(Value::as_str),
            Some("cs_42")
        );
    }

    #[actix_web::test]
    async fn checkout_without_configuration_is_a_server_error() {
        let user_id = UserId::random();
        let res = call_as(base_state(), &user_id, || {
            test::TestRequest::post()
                .uri("/payments/checkout")
                .set_json(serde_json::json!({ "packageId": "100" }))
        })
        .await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(res).await;
        assert!(is_error_code(&body, ErrorCode::ConfigurationError));
    }

    #[actix_web::test]
    async fn checkout_rejects_unknown_packages() {
        let user_id = UserId::random();
        let res = call_as(base_state(), &user_id, || {
            test::TestRequest::post()
                .uri("/payments/checkout")
                .set_json(serde_json::json!({ "packageId": "starter" }))
        })
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn provider_failures_are_service_unavailable() {
        let mut provider = MockCheckoutSessionProvider::new();
        provider
            .expect_create_session()
            .once()
            .returning(|_, _| Err(ProviderError::http("timed out")));
        let state = base_state().with_checkout(Arc::new(provider));

        let user_id = UserId::random();
        let res = call_as(state, &user_id, || {
            test::TestRequest::post()
                .uri("/payments/checkout")
                .set_json(serde_json::json!({ "packageId": "100" }))
        })
        .await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn order_echoes_catalogue_pricing() {
        let user_id = UserId::random();
        let res = call_as(gateway_state(), &user_id, || {
            test::TestRequest::post()
                .uri("/payments/order")
                .set_json(serde_json::json!({ "package_id": "starter" }))
        })
        .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("amount").and_then(Value::as_i64), Some(19_900));
        assert_eq!(body.get("currency").and_then(Value::as_str), Some("INR"));
        assert_eq!(
            body.get("provider_public_key").and_then(Value::as_str),
            Some("key_test")
        );
    }

    #[actix_web::test]
    async fn verify_credits_the_package_once() {
        let user_id = UserId::random();
        let signer = GatewaySignature::new(GATEWAY_SECRET);
        let signature = signer.sign("order_1", "pay_1");
        let payload = serde_json::json!({
            "order_id": "order_1",
            "payment_id": "pay_1",
            "signature": signature,
            "package_id": "pro",
        });

        let store = Arc::new(InMemoryBalanceStore::new());
        let ledger = Arc::new(LedgerService::new(store));
        let state = HttpState::new(ledger).with_gateway(crate::inbound::http::state::GatewayPorts {
            orders: Arc::new(FixtureGatewayOrderProvider),
            signature: Arc::new(GatewaySignature::new(GATEWAY_SECRET)),
            public_key_id: "key_test".to_owned(),
        });

        let res = call_as(state.clone(), &user_id, || {
            test::TestRequest::post()
                .uri("/payments/verify")
                .set_json(payload.clone())
        })
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("success").and_then(Value::as_bool), Some(true));
        assert_eq!(body.get("new_balance").and_then(Value::as_i64), Some(150));

        // Retrying the same payment does not double credit.
        let replay = call_as(state, &user_id, || {
            test::TestRequest::post()
                .uri("/payments/verify")
                .set_json(payload.clone())
        })
        .await;
        assert_eq!(replay.status(), StatusCode::OK);
        let body: Value = test::read_body_json(replay).await;
        assert_eq!(body.get("new_balance").and_then(Value::as_i64), Some(150));
    }

    #[actix_web::test]
    async fn verify_rejects_tampered_signatures() {
        let user_id = UserId::random();
        let signer = GatewaySignature::new(GATEWAY_SECRET);
        let signature = signer.sign("order_1", "pay_1");

        let res = call_as(gateway_state(), &user_id, || {
            test::TestRequest::post()
                .uri("/payments/verify")
                .set_json(serde_json::json!({
                    "order_id": "order_1",
                    "payment_id": "pay_2",
                    "signature": signature,
                    "package_id": "pro",
                }))
        })
        .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert!(is_error_code(&body, ErrorCode::InvalidSignature));
    }

    #[actix_web::test]
    async fn verify_without_configuration_fails_closed() {
        let user_id = UserId::random();
        let res = call_as(base_state(), &user_id, || {
            test::TestRequest::post()
                .uri("/payments/verify")
                .set_json(serde_json::json!({
                    "order_id": "order_1",
                    "payment_id": "pay_1",
                    "signature": "0000",
                    "package_id": "pro",
                }))
        })
        .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
