//! Diesel table definitions for the coin ledger.
//!
//! Kept by hand rather than generated; must stay in step with the SQL in
//! `migrations/`.

diesel::table! {
    /// One balance row per user; mutated only through ledger operations.
    coin_balances (user_id) {
        user_id -> Uuid,
        coins -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only transaction log; rows are never updated or deleted.
    coin_transactions (id) {
        id -> Uuid,
        user_id -> Uuid,
        amount -> Int8,
        transaction_type -> Varchar,
        balance_after -> Int8,
        description -> Text,
        provider_reference -> Nullable<Varchar>,
        metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(coin_balances, coin_transactions);
