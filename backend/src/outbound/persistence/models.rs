//! Row types bridging Diesel and the domain's ledger records.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::coins::{ProviderReference, TransactionRecord, TransactionType, UserId};
use crate::domain::ports::BalanceStoreError;

use super::schema::coin_transactions;

/// A row read from `coin_transactions`.
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = coin_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CoinTransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub transaction_type: String,
    pub balance_after: i64,
    pub description: String,
    pub provider_reference: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Values inserted into `coin_transactions`.
#[derive(Debug, Insertable)]
#[diesel(table_name = coin_transactions)]
pub struct NewCoinTransactionRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub transaction_type: &'a str,
    pub balance_after: i64,
    pub description: &'a str,
    pub provider_reference: Option<&'a str>,
    pub metadata: &'a Value,
}

impl<'a> NewCoinTransactionRow<'a> {
    /// Borrow insertable values from a domain record.
    pub fn from_record(record: &'a TransactionRecord) -> Self {
        Self {
            id: record.id,
            user_id: *record.user_id.as_uuid(),
            amount: record.amount,
            transaction_type: record.transaction_type.as_str(),
            balance_after: record.balance_after,
            description: record.description.as_str(),
            provider_reference: record
                .provider_reference
                .as_ref()
                .map(ProviderReference::as_str),
            metadata: &record.metadata,
        }
    }
}

/// Convert a stored row back into a domain record.
///
/// Corrupted rows (unknown transaction type, blank reference) map to a
/// serialization error rather than panicking.
pub fn row_to_record(row: CoinTransactionRow) -> Result<TransactionRecord, BalanceStoreError> {
    let transaction_type: TransactionType = row
        .transaction_type
        .parse()
        .map_err(|err: crate::domain::coins::TransactionTypeParseError| {
            BalanceStoreError::serialization(err.to_string())
        })?;
    let provider_reference = row
        .provider_reference
        .map(ProviderReference::new)
        .transpose()
        .map_err(|err| BalanceStoreError::serialization(err.to_string()))?;

    Ok(TransactionRecord {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        amount: row.amount,
        transaction_type,
        balance_after: row.balance_after,
        description: row.description,
        provider_reference,
        metadata: row.metadata,
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn sample_row(transaction_type: &str, reference: Option<&str>) -> CoinTransactionRow {
        CoinTransactionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: 100,
            transaction_type: transaction_type.to_owned(),
            balance_after: 100,
            description: "Purchase: 100 coins".to_owned(),
            provider_reference: reference.map(str::to_owned),
            metadata: json!({}),
            created_at: Utc::now(),
        }
    }

    #[rstest]
    fn rows_round_trip_into_records() {
        let row = sample_row("purchase", Some("pi_1"));
        let record = row_to_record(row).expect("valid row converts");
        assert_eq!(record.transaction_type, TransactionType::Purchase);
        assert_eq!(
            record.provider_reference.as_ref().map(|r| r.as_str()),
            Some("pi_1")
        );
    }

    #[rstest]
    #[case("refund", Some("pi_1"))]
    #[case("purchase", Some("  "))]
    fn corrupted_rows_map_to_serialization_errors(
        #[case] transaction_type: &str,
        #[case] reference: Option<&str>,
    ) {
        let row = sample_row(transaction_type, reference);
        assert!(matches!(
            row_to_record(row),
            Err(BalanceStoreError::Serialization { .. })
        ));
    }
}
