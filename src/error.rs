use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Faults talking to the geocoder or the population service.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service answered {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid service url: {0}")]
    InvalidUrl(String),
}

/// Request-level failures. Everything else degrades to a fallback value.
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("Address or bounds required")]
    MissingLocation,

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("invalid bounds '{0}': expected south,west,north,east")]
    InvalidBounds(String),

    #[error("unreadable query string: {0}")]
    BadQuery(String),
}

impl EstimateError {
    pub fn status(&self) -> StatusCode {
        match self {
            EstimateError::MissingLocation => StatusCode::BAD_REQUEST,
            EstimateError::AddressNotFound(_) => StatusCode::NOT_FOUND,
            EstimateError::InvalidBounds(_) | EstimateError::BadQuery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the client. Details of 500s stay in the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            EstimateError::MissingLocation => "Address or bounds required",
            EstimateError::AddressNotFound(_) => "Address not found",
            EstimateError::InvalidBounds(_) | EstimateError::BadQuery(_) => "Server error",
        }
    }
}

impl IntoResponse for EstimateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("estimate failed: {}", self);
        } else {
            tracing::info!("estimate rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_by_variant() {
        assert_eq!(EstimateError::MissingLocation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(EstimateError::AddressNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            EstimateError::InvalidBounds("a,b".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_error_hides_detail() {
        let err = EstimateError::InvalidBounds("1,2,three".into());
        assert!(err.to_string().contains("1,2,three"));
        assert_eq!(err.public_message(), "Server error");
    }

    #[test]
    fn test_bad_query_is_500() {
        let err = EstimateError::BadQuery("duplicate field `bounds`".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Server error");
    }

    #[test]
    fn test_upstream_status_display() {
        let err = UpstreamError::Status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "service answered 404 Not Found");
    }
}
