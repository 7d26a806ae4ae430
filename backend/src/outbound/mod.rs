//! Outbound adapters: PostgreSQL persistence and payment-provider clients.

pub mod persistence;
pub mod providers;
