use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::model::InferenceError;
use crate::storage::StorageError;

/// Failures surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image")]
    MissingImage,
    #[error("Empty filename")]
    EmptyFilename,
    #[error("Invalid upload: {0}")]
    Multipart(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        ApiError::Multipart(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::EmptyFilename | ApiError::Multipart(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Storage(StorageError::InvalidFilename) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::FileTooLarge(_, _)) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(StorageError::Io(_))
            | ApiError::Inference(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("Rejected request: {}", self);
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
