use axum::http::StatusCode;

use dentflow_core::AggregateId;

use crate::app::errors;

/// Parse a path-segment id, turning a bad uuid into a 400 response.
pub fn parse_id(raw: &str, what: &str) -> Result<AggregateId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
