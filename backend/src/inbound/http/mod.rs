//! Actix Web adapter: handlers, session plumbing, error mapping, and shared
//! state for the coin ledger API.

pub mod coins;
pub mod error;
pub mod health;
pub mod payments;
pub mod schemas;
pub mod session;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod webhooks;

pub use error::ApiResult;
pub use session::SessionContext;
pub use state::HttpState;

use actix_web::web;

/// Register every `/api/v1` handler on the given service config.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(coins::debit_coins)
        .service(coins::get_balance)
        .service(coins::list_transactions)
        .service(payments::create_checkout)
        .service(payments::create_order)
        .service(payments::verify_payment)
        .service(webhooks::checkout_webhook);
}
