//! HTTP mapping for domain errors.
//!
//! Keeps the domain error type transport-agnostic while giving every handler
//! a consistent JSON envelope and status code. Internal and configuration
//! failures are redacted before they leave the process.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::InsufficientFunds | ErrorCode::InvalidSignature => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::ConfigurationError | ErrorCode::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn redacted(error: &Error) -> Error {
    match error.code() {
        ErrorCode::InternalError => Error::internal("Internal server error"),
        ErrorCode::ConfigurationError => {
            Error::configuration("Payment processing is not configured")
        }
        _ => error.clone(),
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(redacted(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Never leak framework internals to clients.
        error!(error = %err, "actix error promoted to domain error");
        Self::internal("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::Value;

    #[rstest]
    #[case(Error::invalid_request("bad body"), StatusCode::BAD_REQUEST)]
    #[case(Error::insufficient_funds(2, 5), StatusCode::BAD_REQUEST)]
    #[case(Error::invalid_signature("mismatch"), StatusCode::BAD_REQUEST)]
    #[case(Error::unauthorized("login required"), StatusCode::UNAUTHORIZED)]
    #[case(Error::not_found("no account"), StatusCode::NOT_FOUND)]
    #[case(Error::service_unavailable("store down"), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::configuration("missing secret"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn codes_map_to_expected_statuses(#[case] error: Error, #[case] status: StatusCode) {
        assert_eq!(error.status_code(), status);
    }

    #[rstest]
    fn internal_messages_are_redacted() {
        let response = Error::internal("connection string leaked").error_response();
        let body = actix_web::body::to_bytes(response.into_body());
        let bytes = futures::executor::block_on(body).expect("body renders");
        let value: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(
            value.get("message").and_then(Value::as_str),
            Some("Internal server error")
        );
    }

    #[rstest]
    fn configuration_details_are_redacted() {
        let response = Error::configuration("GATEWAY_KEY_SECRET unset").error_response();
        let bytes = futures::executor::block_on(actix_web::body::to_bytes(response.into_body()))
            .expect("body renders");
        let value: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(
            value.get("message").and_then(Value::as_str),
            Some("Payment processing is not configured")
        );
        assert_eq!(
            value.get("code").and_then(Value::as_str),
            Some("configuration_error")
        );
    }

    #[rstest]
    fn insufficient_funds_keeps_its_details() {
        let response = Error::insufficient_funds(2, 5).error_response();
        let bytes = futures::executor::block_on(actix_web::body::to_bytes(response.into_body()))
            .expect("body renders");
        let value: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(
            value
                .get("details")
                .and_then(|details| details.get("need"))
                .and_then(Value::as_i64),
            Some(5)
        );
    }
}
