//! OpenAPI schema types shared across handlers.

use serde::Serialize;
use utoipa::ToSchema;

/// JSON error envelope returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "insufficient_funds")]
    pub code: String,
    /// Human-readable message.
    #[schema(example = "Insufficient coins. You have 2 coins but need 5.")]
    pub message: String,
    /// Structured details, present for some codes.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}
