use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use validator::ValidationErrors;

use crate::store::StoreError;

/// AppError
///
/// The single error type every handler, extractor and repository returns. Each
/// variant maps to one HTTP status and a stable machine-readable `code`; the
/// `detail` string is meant for humans.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidId(String),

    #[error("Request validation failed")]
    Validation(#[from] ValidationErrors),

    /// Malformed JSON, wrong field types, missing required fields, bad query strings.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Dependent or referenced records make the operation impossible.
    #[error("{0}")]
    Relationship(String),

    #[error("Database error")]
    Database(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

/// One failing field in a validation response.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidId(_) | AppError::Validation(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Relationship(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidId(_) => "INVALID_ID",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthenticated(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Relationship(_) => "RELATIONSHIP_VIOLATION",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Flattens `ValidationErrors` into a field-sorted list so responses are stable.
    pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
        let by_field: BTreeMap<String, _> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| (field.to_string(), errs))
            .collect();

        by_field
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |error| FieldError {
                    field: field.clone(),
                    code: error.code.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("{field} failed the '{}' rule", error.code)),
                })
            })
            .collect()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "detail": self.to_string(),
                "code": self.code(),
                "errors": Self::field_errors(errors),
            }),
            AppError::Database(source) => {
                // The driver message stays in the logs; clients get the generic detail.
                tracing::error!(error = %source, "store operation failed");
                json!({ "detail": self.to_string(), "code": self.code() })
            }
            AppError::Internal(reason) => {
                tracing::error!(%reason, "internal error");
                json!({ "detail": "Internal server error", "code": self.code() })
            }
            _ => json!({ "detail": self.to_string(), "code": self.code() }),
        };

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
