use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    integrations::{
        certificate::CertificateError, crawler::CrawlError, mailer::MailError, payos::PayosError,
        storage::StorageError, watermark::WatermarkError,
    },
    response::{ApiResponse, Meta},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request {0}")]
    BadRequest(String),

    #[error("Unauthorized {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Conflict {0}")]
    Conflict(String),

    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),

    #[error("Service Unavailable {0}")]
    ServiceUnavailable(String),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Storage error")]
    Storage(#[from] StorageError),

    #[error("Payment provider error")]
    Payment(#[from] PayosError),

    #[error("Mail delivery error")]
    Mail(#[from] MailError),

    #[error("Image processing error")]
    Image(#[from] WatermarkError),

    #[error("Certificate rendering error")]
    Certificate(#[from] CertificateError),

    #[error("Exhibition crawl error")]
    Crawl(#[from] CrawlError),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<String, Vec<String>>>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Image(WatermarkError::Decode(_)) => StatusCode::BAD_REQUEST,
            AppError::Payment(_) | AppError::Mail(_) | AppError::Crawl(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::DbError(_)
            | AppError::OrmError(_)
            | AppError::Storage(_)
            | AppError::Image(_)
            | AppError::Certificate(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Field name to messages, falling back to the validator code when no message is set.
pub fn validation_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Maps a unique-constraint violation to `Conflict`, passing every other error through.
pub fn conflict_on_unique(message: &'static str) -> impl FnOnce(sea_orm::DbErr) -> AppError {
    move |err| match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::OrmError(err),
    }
}

/// `sqlx` counterpart of [`conflict_on_unique`].
pub fn conflict_on_unique_sqlx(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |err| {
        let unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if unique {
            AppError::Conflict(message.to_string())
        } else {
            AppError::DbError(err)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let fields = match &self {
            AppError::Validation(errors) => Some(validation_messages(errors)),
            _ => None,
        };

        let body = ApiResponse {
            message: self.to_string(),
            data: Some(ErrorData {
                error: self.to_string(),
                fields,
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
        #[validate(range(min = 1))]
        price: i64,
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Unauthorized("token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Storage(StorageError::NotFound("k".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_messages_use_message_or_code() {
        let sample = Sample {
            name: String::new(),
            price: 0,
        };
        let errors = sample.validate().unwrap_err();
        let messages = validation_messages(&errors);

        assert_eq!(messages["name"], vec!["name is required".to_string()]);
        assert_eq!(messages["price"], vec!["range".to_string()]);
        assert_eq!(
            AppError::from(errors).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
