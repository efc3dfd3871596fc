use reqwest::{multipart::{Form, Part}, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::models::{DataUri, DataUriError, FileRole, UploadResponse, UploadedFile};
use crate::relay::NO_IMAGE_MESSAGE;
use super::{draft::Submission, ui::Generated};

pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while generating the image. Please try again.";
pub const UPLOAD_PATH: &str = "/api/upload";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("response contained no image")]
    NoImage,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Network(e.to_string())
    }
}

impl TransportError {
    /// Message for the result area. Server-provided messages are already user-safe;
    /// anything else collapses to the generic one.
    pub fn user_message(&self) -> String {
        match self {
            TransportError::Status { message: Some(message), .. } => message.clone(),
            TransportError::NoImage => NO_IMAGE_MESSAGE.to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

pub struct UploadClient {
    http: Client,
    endpoint: String,
}

fn file_part(file: &UploadedFile) -> Result<Part, TransportError> {
    Part::bytes(file.bytes.to_vec())
        .file_name(file.file_name.clone())
        .mime_str(&file.mime_type)
        .map_err(|e| TransportError::InvalidRequest(format!("bad mime type: {e}")))
}

impl UploadClient {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint: format!("{}{}", server_url.trim_end_matches('/'), UPLOAD_PATH) })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form(submission: &Submission<'_>) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .part(FileRole::Product.field_name(), file_part(submission.product)?)
            .text("userPrompt", submission.prompt.to_string())
            .text("selectedAspectRatio", submission.aspect_ratio.to_string());
        if let Some(pose) = submission.pose {
            form = form.part(FileRole::Pose.field_name(), file_part(pose)?);
        }
        Ok(form)
    }

    pub async fn submit(&self, submission: &Submission<'_>) -> Result<Generated, TransportError> {
        info!("📤 Uploading to {} (pose: {})", self.endpoint(), submission.pose.is_some());
        let response = self.http.post(&self.endpoint).multipart(Self::form(submission)?).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!("❌ Upload failed with status {}: {}", status, body);
            let message = serde_json::from_str::<UploadResponse>(&body).ok().and_then(|r| r.error);
            return Err(TransportError::Status { status: status.as_u16(), message });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let image = parsed.image.ok_or(TransportError::NoImage)?;
        let image: DataUri = image
            .parse()
            .map_err(|e: DataUriError| TransportError::InvalidResponse(e.to_string()))?;
        info!("📥 Received {} image ({} bytes)", image.mime_type, image.bytes.len());
        Ok(Generated { image, text: parsed.text })
    }
}
