//! Structured error handling for form binding.
//!
//! Every failure on the way from raw request to typed form ends up as a
//! [`BindError`]. Errors convert into JSON responses; validation failures
//! carry per-field violations (`google.rpc.BadRequest` model).

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// Reasons a request could not be bound into a form.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Invalid query string: {0}")]
    Query(#[source] serde_urlencoded::de::Error),

    #[error("Invalid form body: {0}")]
    Form(#[source] serde_urlencoded::de::Error),

    #[error("Invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),
}

/// A single invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub description: String,
}

/// JSON body sent for rejected requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl BindError {
    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Body(_) | Self::Query(_) | Self::Form(_) | Self::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Whether binding succeeded and only validation failed.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Per-field violations, sorted by field name.
    ///
    /// Empty for every error except [`BindError::Validation`].
    #[must_use]
    pub fn violations(&self) -> Vec<FieldViolation> {
        let Self::Validation(errors) = self else {
            return Vec::new();
        };

        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldViolation {
                    field: field.to_string(),
                    description: e
                        .message
                        .as_ref()
                        .map_or_else(|| e.code.to_string(), ToString::to_string),
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field).then(a.description.cmp(&b.description)));
        violations
    }

    /// Build the default JSON response without consuming the error.
    ///
    /// Body read failures are logged; clients only see a generic message.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let message = match self {
            Self::Body(detail) => {
                error!(error = %detail, "Failed to read request body");
                "Failed to read request body".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: message,
            violations: self.violations(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl IntoResponse for BindError {
    fn into_response(self) -> Response {
        self.to_response()
    }
}
