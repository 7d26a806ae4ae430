//! Inbound adapters mapping transport requests onto domain calls.

pub mod http;
