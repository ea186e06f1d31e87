use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy for the catalog and donation services. Every external
/// call is caught at the component boundary and turned into one of these;
/// none of them is fatal to the process.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("Stripe not configured. Please add STRIPE_SECRET_KEY in admin settings.")]
    AdapterNotConfigured,

    #[error("payment adapter error: {0}")]
    Adapter(String),

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            // Actionable by an administrator, not a server fault.
            ServiceError::AdapterNotConfigured => StatusCode::BAD_REQUEST,
            ServiceError::Adapter(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Storage(_)
            | ServiceError::Persistence(_)
            | ServiceError::Pool(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
