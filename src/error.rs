use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors raised by the recommendation engine
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Failed to load dataset: {0}")]
    DataLoad(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

impl EngineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Engine(EngineError::Validation { field, message }) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "field": field }),
            ),
            AppError::Engine(
                e @ (EngineError::InsufficientData(_) | EngineError::DegenerateInput(_)),
            ) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": e.to_string() }),
            ),
            e @ (AppError::Engine(EngineError::DataLoad(_)) | AppError::Internal(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string() }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
