//! Port abstraction for the coin ledger.
//!
//! Inbound adapters talk to [`CoinLedger`] only; the concrete service and
//! its credit strategies live in [`crate::domain::ledger`].

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::coins::{
    CoinAmount, ProviderReference, TransactionRecord, TransactionType, UserId,
};
use crate::domain::error::Error;
use crate::domain::ports::balance_store::BalanceStoreError;

/// A validated request to credit coins from a settled payment.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditRequest {
    /// Account to credit.
    pub user_id: UserId,
    /// Coins promised by the provider metadata.
    pub amount: CoinAmount,
    /// Provider payment identifier; the settlement idempotency key.
    pub reference: ProviderReference,
    /// Audit-trail description.
    pub description: String,
    /// Provider payload snippets worth keeping alongside the record.
    pub metadata: Value,
}

/// A validated request to debit coins for a generation action.
#[derive(Debug, Clone, PartialEq)]
pub struct DebitRequest {
    /// Account to debit.
    pub user_id: UserId,
    /// Coins consumed by the action.
    pub amount: CoinAmount,
    /// Which action is paying.
    pub transaction_type: TransactionType,
    /// Optional caller-supplied description.
    pub description: Option<String>,
}

/// Outcome of an idempotent credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The credit was applied by this call.
    Applied {
        /// Balance immediately after the credit.
        balance_after: i64,
    },
    /// The reference had already been settled; no coins moved.
    AlreadySettled {
        /// Balance recorded when the reference first settled.
        balance_after: i64,
    },
}

impl CreditOutcome {
    /// Whether this call moved coins.
    #[must_use]
    pub const fn was_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The balance snapshot carried by either variant.
    #[must_use]
    pub const fn balance_after(self) -> i64 {
        match self {
            Self::Applied { balance_after } | Self::AlreadySettled { balance_after } => {
                balance_after
            }
        }
    }
}

/// Receipt for a completed debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerReceipt {
    /// Identifier of the logged transaction.
    pub transaction_id: uuid::Uuid,
    /// Balance immediately after the debit.
    pub balance_after: i64,
}

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The balance does not cover the requested debit.
    #[error("insufficient coins: have {have}, need {need}")]
    InsufficientFunds {
        /// Current balance.
        have: i64,
        /// Requested debit amount.
        need: i64,
    },
    /// No account row exists for the user.
    #[error("no coin account for user")]
    AccountMissing,
    /// The balance store failed.
    #[error(transparent)]
    Store(#[from] BalanceStoreError),
}

impl From<LedgerError> for Error {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::InsufficientFunds { have, need } => Self::insufficient_funds(have, need),
            LedgerError::AccountMissing => Self::not_found("No coin account exists for this user"),
            LedgerError::Store(err) => Self::internal(err.to_string()),
        }
    }
}

/// Port for coin movements.
///
/// Credits are idempotent per provider reference; debits never drive a
/// balance negative.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CoinLedger: Send + Sync {
    /// Credit coins from a settled payment, at most once per reference.
    async fn credit(&self, request: CreditRequest) -> Result<CreditOutcome, LedgerError>;

    /// Debit coins for a generation action.
    async fn debit(&self, request: DebitRequest) -> Result<LedgerReceipt, LedgerError>;

    /// Authoritative balance read; users without an account row hold zero.
    async fn balance(&self, user_id: &UserId) -> Result<i64, LedgerError>;

    /// Recent transactions for the user, newest first.
    async fn transactions(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;
}
