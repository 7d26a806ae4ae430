//! Value objects for the coin ledger.
//!
//! Purpose: keep user identifiers, coin amounts, transaction kinds, and
//! provider references strongly typed so invalid states (zero debits, blank
//! idempotency keys, malformed user ids) are rejected at construction rather
//! than deep inside the ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Stable user identifier stored as a UUID.
///
/// Serialises as the canonical hyphenated string and validates on
/// deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid);

/// Validation errors returned when constructing a [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserIdValidationError {
    /// Input was empty after trimming whitespace.
    #[error("user id must not be empty")]
    Empty,
    /// Input was not a valid UUID.
    #[error("user id must be a valid UUID")]
    InvalidUuid,
}

impl UserId {
    /// Validate and construct a [`UserId`] from string input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, UserIdValidationError> {
        let raw = raw.as_ref();
        if raw.trim().is_empty() {
            return Err(UserIdValidationError::Empty);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserIdValidationError::InvalidUuid)
    }

    /// Construct directly from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random identifier (fixtures and tests).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = UserIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly positive number of coins moved by a single ledger operation.
///
/// Both credits and debits are expressed with a positive [`CoinAmount`]; the
/// sign lives on the recorded transaction, not on the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct CoinAmount(i64);

/// Validation errors returned when constructing a [`CoinAmount`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoinAmountValidationError {
    /// Amount was zero or negative.
    #[error("coin amount must be a positive integer")]
    NotPositive,
}

impl CoinAmount {
    /// Validate and construct an amount; rejects zero and negatives.
    pub const fn new(value: i64) -> Result<Self, CoinAmountValidationError> {
        if value <= 0 {
            return Err(CoinAmountValidationError::NotPositive);
        }
        Ok(Self(value))
    }

    /// The underlying positive integer.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for CoinAmount {
    type Error = CoinAmountValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CoinAmount> for i64 {
    fn from(value: CoinAmount) -> Self {
        value.0
    }
}

impl fmt::Display for CoinAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Category of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Coins credited from a settled payment.
    Purchase,
    /// Coins debited for generating a post.
    PostGeneration,
    /// Coins debited for generating an image.
    ImageGeneration,
}

impl TransactionType {
    /// Stable snake_case name used in the database and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::PostGeneration => "post_generation",
            Self::ImageGeneration => "image_generation",
        }
    }
}

/// Error returned when parsing an unknown transaction type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction type: {0}")]
pub struct TransactionTypeParseError(String);

impl FromStr for TransactionType {
    type Err = TransactionTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "post_generation" => Ok(Self::PostGeneration),
            "image_generation" => Ok(Self::ImageGeneration),
            other => Err(TransactionTypeParseError(other.to_owned())),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-issued payment identifier used as the settlement idempotency key.
///
/// One credit transaction may carry at most one reference, and the ledger
/// guarantees at most one credit per reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderReference(String);

/// Validation errors returned when constructing a [`ProviderReference`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderReferenceValidationError {
    /// Reference was empty after trimming whitespace.
    #[error("provider reference must not be empty")]
    Empty,
    /// Reference contained leading or trailing whitespace.
    #[error("provider reference must not contain surrounding whitespace")]
    ContainsWhitespace,
}

impl ProviderReference {
    /// Validate and construct a reference.
    pub fn new(value: impl Into<String>) -> Result<Self, ProviderReferenceValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(ProviderReferenceValidationError::Empty);
        }
        if raw.trim() != raw {
            return Err(ProviderReferenceValidationError::ContainsWhitespace);
        }
        Ok(Self(raw))
    }

    /// Borrow the underlying reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for ProviderReference {
    type Error = ProviderReferenceValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderReference> for String {
    fn from(value: ProviderReference) -> Self {
        value.0
    }
}

impl fmt::Display for ProviderReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction ready to be appended, before the balance snapshot is known.
///
/// The store fills in `balance_after` at commit time; see
/// [`TransactionDraft::into_record`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    /// Pre-generated transaction identifier.
    pub id: Uuid,
    /// Account the transaction belongs to.
    pub user_id: UserId,
    /// Signed coin delta: positive = credit, negative = debit.
    pub amount: i64,
    /// Category of the operation.
    pub transaction_type: TransactionType,
    /// Human-readable description for the audit trail.
    pub description: String,
    /// Provider payment identifier for settlement idempotency, if any.
    pub provider_reference: Option<ProviderReference>,
    /// Open key-value bag for provider payload snippets.
    pub metadata: Value,
}

impl TransactionDraft {
    /// Promote the draft into an immutable record with its balance snapshot.
    #[must_use]
    pub fn into_record(self, balance_after: i64) -> TransactionRecord {
        TransactionRecord {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            transaction_type: self.transaction_type,
            balance_after,
            description: self.description,
            provider_reference: self.provider_reference,
            metadata: self.metadata,
            created_at: Utc::now(),
        }
    }
}

/// Immutable entry in the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction identifier.
    pub id: Uuid,
    /// Account the transaction belongs to.
    pub user_id: UserId,
    /// Signed coin delta: positive = credit, negative = debit.
    pub amount: i64,
    /// Category of the operation.
    pub transaction_type: TransactionType,
    /// Account balance immediately after this record was appended.
    pub balance_after: i64,
    /// Human-readable description for the audit trail.
    pub description: String,
    /// Provider payment identifier for settlement idempotency, if any.
    pub provider_reference: Option<ProviderReference>,
    /// Open key-value bag for provider payload snippets.
    pub metadata: Value,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}
