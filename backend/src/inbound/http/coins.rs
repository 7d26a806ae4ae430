//! Coin balance and debit handlers.
//!
//! ```text
//! POST /api/v1/coins/debit         Spend coins on a generation action
//! GET  /api/v1/coins               Authoritative balance read
//! GET  /api/v1/coins/transactions  Recent ledger records
//! ```
//!
//! The debit endpoint is the only non-administrative exit path for coins.

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::coins::{CoinAmount, TransactionType};
use crate::domain::ports::DebitRequest;
use crate::domain::{Error, TransactionRecord};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Debit request body.
#[derive(Debug, Clone, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DebitBody {
    /// Coins to spend; must be positive.
    pub amount: i64,
    /// Action paying for the debit: `post_generation` or `image_generation`.
    pub transaction_type: String,
    /// Optional audit-trail description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Debit response body.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebitResponse {
    /// Always true on 200; errors use the error envelope.
    pub success: bool,
    /// Balance after the debit.
    pub new_balance: i64,
}

/// Balance response body.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BalanceResponse {
    /// Current coin balance.
    pub coins: i64,
}

/// One ledger record in the history response.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct TransactionSchema {
    /// Transaction identifier.
    pub id: Uuid,
    /// Signed coin delta.
    pub amount: i64,
    /// Transaction category.
    pub transaction_type: String,
    /// Balance immediately after this record.
    pub balance_after: i64,
    /// Audit-trail description.
    pub description: String,
    /// Commit timestamp (RFC 3339).
    pub created_at: String,
}

impl From<TransactionRecord> for TransactionSchema {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            amount: record.amount,
            transaction_type: record.transaction_type.as_str().to_owned(),
            balance_after: record.balance_after,
            description: record.description,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// History query parameters.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum records to return (default 20, capped at 100).
    #[serde(default)]
    pub limit: Option<i64>,
}

fn parse_debit(body: &DebitBody) -> Result<(CoinAmount, TransactionType), Error> {
    let amount = CoinAmount::new(body.amount)
        .map_err(|_| Error::invalid_request("amount must be a positive integer"))?;
    let transaction_type: TransactionType = body
        .transaction_type
        .parse()
        .map_err(|_| Error::invalid_request("unrecognised transaction type"))?;
    if transaction_type == TransactionType::Purchase {
        return Err(Error::invalid_request(
            "purchase is not a debitable transaction type",
        ));
    }
    Ok((amount, transaction_type))
}

/// Spend coins on a generation action.
///
/// # Errors
///
/// - `400 Bad Request`: non-positive amount, unknown transaction type, or
///   insufficient funds (code `insufficient_funds` with `{have, need}`).
/// - `401 Unauthorized`: no valid session.
/// - `404 Not Found`: the user has no coin account row.
#[utoipa::path(
    post,
    path = "/api/v1/coins/debit",
    request_body = DebitBody,
    responses(
        (status = 200, description = "Coins debited", body = DebitResponse),
        (status = 400, description = "Invalid request or insufficient funds", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 401, description = "Unauthorised", body = crate::inbound::http::schemas::ErrorSchema),
        (status = 404, description = "No coin account", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["coins"],
    operation_id = "debitCoins"
)]
#[post("/coins/debit")]
pub async fn debit_coins(
    state: web::Data<HttpState>,
    session: SessionContext,
    body: web::Json<DebitBody>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let (amount, transaction_type) = parse_debit(&body)?;

    let receipt = state
        .ledger
        .debit(DebitRequest {
            user_id,
            amount,
            transaction_type,
            description: body.into_inner().description,
        })
        .await?;

    Ok(HttpResponse::Ok().json(DebitResponse {
        success: true,
        new_balance: receipt.balance_after,
    }))
}

/// Authoritative balance read.
#[utoipa::path(
    get,
    path = "/api/v1/coins",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorised", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    tags = ["coins"],
    operation_id = "getBalance"
)]
#[get("/coins")]
pub async fn get_balance(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let coins = state.ledger.balance(&user_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse { coins }))
}

/// Recent ledger records for the authenticated user, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/coins/transactions",
    responses(
        (status = 200, description = "Recent transactions", body = [TransactionSchema]),
        (status = 401, description = "Unauthorised", body = crate::inbound::http::schemas::ErrorSchema)
    ),
    params(
        ("limit" = Option<i64>, Query, description = "Maximum records to return (default 20, capped at 100)")
    ),
    tags = ["coins"],
    operation_id = "listTransactions"
)]
#[get("/coins/transactions")]
pub async fn list_transactions(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<HistoryQuery>,
) -> ApiResult<HttpResponse> {
    let user_id = session.require_user_id()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let records = state.ledger.transactions(&user_id, limit).await?;
    let body: Vec<TransactionSchema> = records.into_iter().map(TransactionSchema::from).collect();
    Ok(HttpResponse::Ok().json(body))
}
