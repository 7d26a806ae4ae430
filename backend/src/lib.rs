//! Coin ledger and payment-settlement service.
//!
//! Hexagonal layout: `domain` holds the transport-agnostic ledger and
//! settlement logic behind ports, `inbound::http` maps Actix Web requests
//! onto those ports, and `outbound` implements them against PostgreSQL and
//! the two payment providers.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;

pub use doc::ApiDoc;
