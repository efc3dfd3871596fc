use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use tracing::error;

use crate::{gemini::GeminiError, models::{AspectRatioError, FileRole, UploadResponse}, relay::{RelayError, NO_IMAGE_MESSAGE}};

pub const GENERIC_ERROR_MESSAGE: &str = "Failed to generate image. Please try again.";
pub const PARSE_ERROR_MESSAGE: &str = "Error parsing the uploaded form.";

/// Failures of `POST /api/upload`. Every variant renders as `{ "error": ... }` with a
/// message that is safe to show to users; details only go to the log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("a product image is required")]
    MissingProduct,

    #[error("{role} file has unsupported type '{mime_type}'")]
    UnsupportedMediaType { role: FileRole, mime_type: String },

    #[error("{role} file exceeds {limit} bytes")]
    FileTooLarge { role: FileRole, limit: usize },

    #[error("request body too large")]
    BodyTooLarge,

    #[error(transparent)]
    AspectRatio(#[from] AspectRatioError),

    #[error("multipart parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Upstream(#[from] GeminiError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingProduct | AppError::AspectRatio(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::FileTooLarge { .. } | AppError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Parse(_) | AppError::Upstream(_) | AppError::Relay(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AppError::MissingProduct => "Please upload a product image.".to_string(),
            AppError::UnsupportedMediaType { role, .. } => {
                format!("The {role} file must be a PNG, JPEG, WebP or HEIC image.")
            }
            AppError::FileTooLarge { role, limit } => {
                format!("The {role} file is larger than {}.", human_size(*limit))
            }
            AppError::BodyTooLarge => "The upload is too large.".to_string(),
            AppError::AspectRatio(e) => format!("Invalid aspect ratio: {}.", e.0),
            AppError::Parse(_) => PARSE_ERROR_MESSAGE.to_string(),
            AppError::Upstream(_) => GENERIC_ERROR_MESSAGE.to_string(),
            AppError::Relay(_) => NO_IMAGE_MESSAGE.to_string(),
        }
    }
}

fn human_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{} KB", bytes / KB)
    } else {
        format!("{bytes} bytes")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("❌ Upload failed: {}", self);
        } else {
            tracing::warn!("Rejected upload: {}", self);
        }
        let body = UploadResponse { error: Some(self.user_message()), ..UploadResponse::default() };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(AppError::MissingProduct.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Parse("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(AppError::Upstream(GeminiError::Timeout).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::FileTooLarge { role: FileRole::Pose, limit: 1 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn internal_details_stay_out_of_user_message() {
        let err = AppError::Upstream(GeminiError::Status { status: 403, body: "API key leaked".into() });
        assert_eq!(err.user_message(), GENERIC_ERROR_MESSAGE);
        let err = AppError::Parse("boundary mismatch at byte 17".into());
        assert_eq!(err.user_message(), PARSE_ERROR_MESSAGE);
    }

    #[test]
    fn file_limit_is_readable_below_one_megabyte() {
        let message = |limit| AppError::FileTooLarge { role: FileRole::Product, limit }.user_message();
        assert_eq!(message(10 * 1024 * 1024), "The product file is larger than 10 MB.");
        assert_eq!(message(1024), "The product file is larger than 1 KB.");
        assert_eq!(message(500), "The product file is larger than 500 bytes.");
    }

    #[test]
    fn missing_image_has_its_own_message() {
        let err = AppError::Relay(RelayError::NoImage { text: Some("no".into()) });
        assert_eq!(err.user_message(), NO_IMAGE_MESSAGE);
    }
}
