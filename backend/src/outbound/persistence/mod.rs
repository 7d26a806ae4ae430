//! Diesel/PostgreSQL persistence adapters for the coin ledger.

mod diesel_balance_store;
mod models;
mod pool;
pub mod schema;

pub use diesel_balance_store::DieselBalanceStore;
pub use pool::{DbPool, PoolConfig, PoolError};
