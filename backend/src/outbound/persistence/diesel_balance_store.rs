//! PostgreSQL-backed [`BalanceStore`] implementation using Diesel.
//!
//! Atomicity rests on the database: credits are upsert-increments, debits are
//! guarded decrements, and `settle_credit` wraps increment plus journal
//! append in one transaction so the unique `provider_reference` constraint
//! rolls a replayed settlement back with no balance change.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::coins::{
    CoinAmount, ProviderReference, TransactionDraft, TransactionRecord, UserId,
};
use crate::domain::ports::{BalanceStore, BalanceStoreError, CreditOutcome};

use super::models::{CoinTransactionRow, NewCoinTransactionRow, row_to_record};
use super::pool::{DbPool, PoolError};
use super::schema::{coin_balances, coin_transactions};

/// Diesel adapter for the [`BalanceStore`] port.
#[derive(Clone)]
pub struct DieselBalanceStore {
    pool: DbPool,
}

impl DieselBalanceStore {
    /// Create a store over the given connection pool.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> BalanceStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            BalanceStoreError::connection(message)
        }
    }
}

fn is_unique_violation(error: &diesel::result::Error) -> bool {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    matches!(
        error,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

fn map_diesel_error(error: diesel::result::Error) -> BalanceStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => BalanceStoreError::query("record not found"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            BalanceStoreError::connection("database connection error")
        }
        DieselError::SerializationError(_) | DieselError::DeserializationError(_) => {
            BalanceStoreError::serialization("row conversion failed")
        }
        _ => BalanceStoreError::query("database error"),
    }
}

#[async_trait]
impl BalanceStore for DieselBalanceStore {
    async fn fetch_balance(&self, user_id: &UserId) -> Result<Option<i64>, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        coin_balances::table
            .find(user_id.as_uuid())
            .select(coin_balances::coins)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn credit_balance(
        &self,
        user_id: &UserId,
        amount: CoinAmount,
    ) -> Result<i64, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::insert_into(coin_balances::table)
            .values((
                coin_balances::user_id.eq(user_id.as_uuid()),
                coin_balances::coins.eq(amount.get()),
            ))
            .on_conflict(coin_balances::user_id)
            .do_update()
            .set((
                coin_balances::coins.eq(coin_balances::coins + amount.get()),
                coin_balances::updated_at.eq(diesel::dsl::now),
            ))
            .returning(coin_balances::coins)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn debit_balance(
        &self,
        user_id: &UserId,
        amount: CoinAmount,
    ) -> Result<Option<i64>, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // The balance guard lives in the WHERE clause; an uncovered debit
        // matches no row instead of failing the CHECK constraint.
        diesel::update(
            coin_balances::table.filter(
                coin_balances::user_id
                    .eq(user_id.as_uuid())
                    .and(coin_balances::coins.ge(amount.get())),
            ),
        )
        .set((
            coin_balances::coins.eq(coin_balances::coins - amount.get()),
            coin_balances::updated_at.eq(diesel::dsl::now),
        ))
        .returning(coin_balances::coins)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)
    }

    async fn append_transaction(
        &self,
        record: &TransactionRecord,
    ) -> Result<(), BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        diesel::insert_into(coin_transactions::table)
            .values(NewCoinTransactionRow::from_record(record))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                if is_unique_violation(&err)
                    && let Some(reference) = record.provider_reference.as_ref()
                {
                    BalanceStoreError::duplicate_reference(reference.as_str())
                } else {
                    map_diesel_error(err)
                }
            })
    }

    async fn find_by_provider_reference(
        &self,
        reference: &ProviderReference,
    ) -> Result<Option<TransactionRecord>, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<CoinTransactionRow> = coin_transactions::table
            .filter(coin_transactions::provider_reference.eq(reference.as_str()))
            .select(CoinTransactionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_record).transpose()
    }

    async fn settle_credit(
        &self,
        draft: TransactionDraft,
    ) -> Result<CreditOutcome, BalanceStoreError> {
        let reference = draft.provider_reference.clone();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let result = conn
            .transaction::<i64, diesel::result::Error, _>(|conn| {
                async move {
                    let balance_after: i64 = diesel::insert_into(coin_balances::table)
                        .values((
                            coin_balances::user_id.eq(*draft.user_id.as_uuid()),
                            coin_balances::coins.eq(draft.amount),
                        ))
                        .on_conflict(coin_balances::user_id)
                        .do_update()
                        .set((
                            coin_balances::coins.eq(coin_balances::coins + draft.amount),
                            coin_balances::updated_at.eq(diesel::dsl::now),
                        ))
                        .returning(coin_balances::coins)
                        .get_result(conn)
                        .await?;

                    let record = draft.into_record(balance_after);
                    diesel::insert_into(coin_transactions::table)
                        .values(NewCoinTransactionRow::from_record(&record))
                        .execute(conn)
                        .await?;

                    Ok(balance_after)
                }
                .scope_boxed()
            })
            .await;
        drop(conn);

        match result {
            Ok(balance_after) => Ok(CreditOutcome::Applied { balance_after }),
            Err(err) if is_unique_violation(&err) => {
                let Some(reference) = reference else {
                    return Err(BalanceStoreError::query(
                        "unique violation on a credit without a provider reference",
                    ));
                };
                match self.find_by_provider_reference(&reference).await? {
                    Some(existing) => Ok(CreditOutcome::AlreadySettled {
                        balance_after: existing.balance_after,
                    }),
                    None => Err(BalanceStoreError::query(
                        "settlement rolled back but no prior record found",
                    )),
                }
            }
            Err(err) => Err(map_diesel_error(err)),
        }
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, BalanceStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<CoinTransactionRow> = coin_transactions::table
            .filter(coin_transactions::user_id.eq(user_id.as_uuid()))
            .order(coin_transactions::created_at.desc())
            .limit(limit.max(0))
            .select(CoinTransactionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows.into_iter().map(row_to_record).collect()
    }
}
