use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{DbErr, models::pod::PodError};
use services::services::image::ImageError;
use thiserror::Error;
use utils_core::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pod(#[from] PodError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Pod(err) => match err {
                PodError::PodNotFound => (StatusCode::NOT_FOUND, "PodError"),
                PodError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "PodError"),
                PodError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PodError"),
            },
            ApiError::Image(err) => match err {
                ImageError::NotFound => (StatusCode::NOT_FOUND, "ImageNotFound"),
                ImageError::Stream(_) => (StatusCode::BAD_REQUEST, "ImageUploadError"),
                ImageError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ImageError"),
            },
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Multipart(err) => (err.status(), "MultipartError"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ValidationError"),
        };

        let error_message = match &self {
            ApiError::Pod(PodError::PodNotFound) => "Pod not found".to_string(),
            ApiError::Pod(PodError::Validation(msg)) => msg.clone(),
            ApiError::Image(ImageError::NotFound) => "Image not found".to_string(),
            ApiError::Image(ImageError::Stream(_)) | ApiError::Multipart(_) => {
                "Failed to read the upload. Please ensure the form is valid and try again."
                    .to_string()
            }
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Validation(msg) => msg.clone(),
            _ => format!("{}: {}", error_type, self),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
