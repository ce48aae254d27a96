//! Mapping from domain errors to HTTP responses.
//!
//! Every error body carries a `message`; some add an `error` detail or the
//! list of `required` fields.

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use pulse_registry::RegistryError;
use pulse_scheduler::PulseError;
use serde_json::{json, Value};
use tracing::error;

pub type ApiError = (StatusCode, Json<Value>);
pub type ApiResult<T = Value> = Result<Json<T>, ApiError>;

pub fn message(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "message": message.into() })))
}

pub fn detailed(status: StatusCode, message: &str, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({ "message": message, "error": detail.into() })),
    )
}

pub fn missing_fields(required: &[&str]) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "message": "Missing required fields",
            "required": required,
        })),
    )
}

/// Malformed or mistyped JSON bodies answer 400 like any other validation
/// failure, instead of the extractor's own 415/422 text.
pub fn bad_body(rejection: JsonRejection) -> ApiError {
    detailed(
        StatusCode::BAD_REQUEST,
        "Invalid request body",
        rejection.body_text(),
    )
}

pub fn registry_error(e: RegistryError) -> ApiError {
    let status = match &e {
        RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
        RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
        RegistryError::Conflict { .. } => StatusCode::CONFLICT,
        RegistryError::Serialization(_) => {
            error!(error = %e, "registry serialization failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    message(status, e.to_string())
}

pub fn pulse_error(e: PulseError) -> ApiError {
    let status = match &e {
        PulseError::Validation(_) => StatusCode::BAD_REQUEST,
        PulseError::NotFound { .. } => StatusCode::NOT_FOUND,
        PulseError::Conflict { .. } => StatusCode::CONFLICT,
        PulseError::TransientAnalysis(_) | PulseError::History(_) => {
            error!(error = %e, "pulse operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    message(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            registry_error(RegistryError::Validation("bad".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            registry_error(RegistryError::NotFound { key_name: "k".into() }).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            pulse_error(PulseError::Conflict { id: "p".into() }).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            pulse_error(PulseError::TransientAnalysis("x".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn body_carries_message() {
        let (_, Json(body)) = pulse_error(PulseError::NotFound { id: "p9".into() });
        assert_eq!(body["message"], "Pulse not found or not active: p9");

        let (_, Json(body)) = missing_fields(&["pulseId"]);
        assert_eq!(body["required"][0], "pulseId");
    }
}
