//! Maps library failures onto HTTP responses.
//!
//! - client mistakes (missing file, wrong extension, missing columns) → 400
//! - bodies over the configured limit → 413
//! - store unreachable → 500 naming the store failure
//! - anything else → 500 with the error's cause chain as `traceback`

use std::error::Error as StdError;

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rulelib_core::{DbError, ImportError, RuleError, SchemaError, TemplateError};
use serde_json::json;
use tokio::task::JoinError;

#[derive(Debug)]
pub enum ApiError {
    BadInput(String),
    PayloadTooLarge(String),
    Connection(String),
    Unexpected { message: String, traceback: String },
}

impl ApiError {
    pub fn unexpected(err: &(dyn StdError + 'static)) -> Self {
        ApiError::Unexpected {
            message: err.to_string(),
            traceback: source_chain(err),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadInput(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Connection(_) | ApiError::Unexpected { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// One line per error in the chain, outermost first.
fn source_chain(err: &(dyn StdError + 'static)) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    lines.join("\n")
}

fn is_connection_failure(err: &DbError) -> bool {
    matches!(
        err,
        DbError::Build(_) | DbError::Connect(_) | DbError::MissingAuthToken
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadInput(message) | ApiError::PayloadTooLarge(message) => {
                tracing::warn!(status = status.as_u16(), "rejected request: {}", message);
                json!({ "error": message })
            }
            ApiError::Connection(message) => {
                tracing::error!("database unavailable: {}", message);
                json!({ "error": message })
            }
            ApiError::Unexpected { message, traceback } => {
                tracing::error!(traceback = %traceback, "request failed: {}", message);
                json!({ "error": message, "traceback": traceback })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match &err {
            _ if err.is_bad_input() => ApiError::BadInput(err.to_string()),
            ImportError::Connection(_) => ApiError::Connection(err.to_string()),
            _ => ApiError::unexpected(&err),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        if is_connection_failure(&err) {
            ApiError::Connection(format!("unable to connect to database: {err}"))
        } else {
            ApiError::unexpected(&err)
        }
    }
}

impl From<SchemaError> for ApiError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Database(db) if is_connection_failure(&db) => ApiError::from(db),
            other => ApiError::unexpected(&other),
        }
    }
}

impl From<RuleError> for ApiError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Database(db) if is_connection_failure(&db) => ApiError::from(db),
            other => ApiError::unexpected(&other),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        ApiError::unexpected(&err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        ApiError::unexpected(&err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else if status.is_client_error() {
            ApiError::BadInput(err.body_text())
        } else {
            ApiError::unexpected(&err)
        }
    }
}
