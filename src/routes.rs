use axum::{
    extract::{multipart::{Field, MultipartError, MultipartRejection}, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    error::AppError,
    gemini::ImageModel,
    models::{AspectRatio, FileRole, UploadResponse, UploadedFile},
    prompt::build_generation_request,
    relay::relay,
};

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn ImageModel>,
    pub max_file_bytes: usize,
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload).fallback(method_not_allowed))
        .route("/health", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "message": "Method not allowed" })),
    )
}

/// Fields of the upload form, before validation.
#[derive(Debug, Default)]
struct UploadForm {
    product: Option<UploadedFile>,
    pose: Option<UploadedFile>,
    user_prompt: String,
    aspect_ratio: String,
}

fn map_multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BodyTooLarge
    } else {
        AppError::Parse(e.body_text())
    }
}

async fn read_file(field: Field<'_>, role: FileRole, max_bytes: usize) -> Result<Option<UploadedFile>, AppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let declared = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(map_multipart_error)?;

    // Browsers send an empty part when the input has no file selected.
    if bytes.is_empty() && file_name.is_empty() {
        return Ok(None);
    }
    if bytes.len() > max_bytes {
        return Err(AppError::FileTooLarge { role, limit: max_bytes });
    }

    let mime_type = declared
        .filter(|m| m != "application/octet-stream")
        .or_else(|| mime_guess::from_path(&file_name).first().map(|m| m.essence_str().to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let file = UploadedFile::new(file_name, mime_type, bytes);
    if !file.is_accepted_image() {
        return Err(AppError::UnsupportedMediaType { role, mime_type: file.mime_type });
    }
    info!("📎 Received {} file '{}' ({} bytes, {})", role, file.file_name, file.bytes.len(), file.mime_type);
    Ok(Some(file))
}

async fn read_form(mut multipart: Multipart, max_file_bytes: usize) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "productFile" => form.product = read_file(field, FileRole::Product, max_file_bytes).await?,
            "poseFile" => form.pose = read_file(field, FileRole::Pose, max_file_bytes).await?,
            "userPrompt" => form.user_prompt = field.text().await.map_err(map_multipart_error)?,
            "selectedAspectRatio" => form.aspect_ratio = field.text().await.map_err(map_multipart_error)?,
            other => tracing::debug!("Ignoring unknown form field '{}'", other),
        }
    }
    Ok(form)
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let request_id = Uuid::new_v4();
    async move {
        let multipart = multipart.map_err(|e| AppError::Parse(e.body_text()))?;
        let form = read_form(multipart, state.max_file_bytes).await?;

        let product = form.product.ok_or(AppError::MissingProduct)?;
        let aspect_ratio: AspectRatio = form.aspect_ratio.parse()?;
        info!(
            "🚀 Generating with model '{}' (pose: {}, aspect ratio: {})",
            state.model.name(),
            form.pose.is_some(),
            aspect_ratio
        );

        let request = build_generation_request(product, form.pose, &form.user_prompt, aspect_ratio);
        let parts = state.model.generate(&request).await?;
        let result = relay(parts)?;

        info!("✅ Generated {} image ({} bytes, text: {})", result.image.mime_type, result.image.bytes.len(), result.text.is_some());
        Ok::<_, AppError>(Json(result.into_response()))
    }
    .instrument(info_span!("upload", %request_id))
    .await
}
