//! Terminal client standing in for the browser page: pick files, generate,
//! show the result and download it.

pub mod download;
pub mod draft;
pub mod transport;
pub mod ui;

use anyhow::{bail, Context};
use std::{path::PathBuf, time::Duration};
use tracing::{error, info};

use crate::models::FileRole;
use download::{Export, ExportFormat};
use draft::{DraftError, Preview, RequestDraft};
use transport::UploadClient;
use ui::{UiEvent, UiState, View};

pub const DOWNLOAD_FAILURE_MESSAGE: &str = "Could not prepare the image for download. Please try generating again.";

/// Raised before any network traffic when the draft cannot be submitted.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Alert(#[from] DraftError);

pub struct Studio {
    draft: RequestDraft,
    state: UiState,
    client: UploadClient,
}

impl Studio {
    pub fn new(client: UploadClient) -> Self {
        Self { draft: RequestDraft::default(), state: UiState::Idle, client }
    }

    pub fn draft(&self) -> &RequestDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut RequestDraft {
        &mut self.draft
    }

    pub fn view(&self) -> View<'_> {
        self.state.render()
    }

    fn dispatch(&mut self, event: UiEvent) {
        let previous = std::mem::take(&mut self.state);
        self.state = previous.apply(event);
        tracing::debug!("UI state -> {}", self.state.name());
    }

    /// Generate from the current draft. Without a product image this returns an
    /// `Alert` and leaves the result area untouched.
    pub async fn generate(&mut self) -> Result<(), Alert> {
        if !self.view().generate_enabled {
            return Ok(());
        }
        let submission = self.draft.submission()?;
        let previous = std::mem::take(&mut self.state);
        self.state = previous.apply(UiEvent::GenerateClicked);

        let event = match self.client.submit(&submission).await {
            Ok(generated) => UiEvent::Generated(generated),
            Err(e) => {
                error!("❌ Generation failed: {}", e);
                UiEvent::Failed(e.user_message())
            }
        };
        self.dispatch(event);
        Ok(())
    }

    /// Export the displayed image. Returns `None` when download is disabled or the
    /// image cannot be prepared; the latter also moves the UI to the error state.
    pub fn download(&mut self, format: ExportFormat) -> Option<Export> {
        let result = match &self.state {
            UiState::Success(generated) => download::export(&generated.image, format),
            _ => return None,
        };
        match result {
            Ok(export) => Some(export),
            Err(e) => {
                error!("❌ Download preparation failed: {}", e);
                self.dispatch(UiEvent::Failed(DOWNLOAD_FAILURE_MESSAGE.to_string()));
                None
            }
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    /// Product photo (required to generate)
    #[clap(long)]
    product: Option<PathBuf>,
    /// Optional pose reference photo
    #[clap(long)]
    pose: Option<PathBuf>,
    /// Scene and styling prompt; blank uses the default
    #[clap(long, default_value = "")]
    prompt: String,
    #[clap(long, default_value = "1:1")]
    aspect_ratio: crate::models::AspectRatio,
    #[clap(long, value_enum, default_value = "png")]
    format: ExportFormat,
    /// Directory the download is written to
    #[clap(long, default_value = ".")]
    out: PathBuf,
    #[clap(long, env = "STUDIO_SERVER_URL", default_value = "http://localhost:8080")]
    server: String,
    /// Client-side request timeout in seconds
    #[clap(long, default_value_t = 150)]
    timeout: u64,
}

fn print_preview(role: FileRole, preview: &Preview) {
    match preview {
        Preview::Placeholder => println!("{role:>8}: (no file selected)"),
        Preview::Selected { file_name, mime_type, size } => {
            println!("{role:>8}: {file_name} ({mime_type}, {size} bytes)")
        }
    }
}

fn print_view(view: &View<'_>) {
    if view.placeholder_visible {
        println!("Your generated image will appear here.");
    }
    if view.spinner_visible {
        println!("⏳ Generating...");
    }
    if let Some(image) = view.image {
        println!("🖼️ Generated {} image ({} bytes)", image.mime_type, image.bytes.len());
    }
    if let Some(text) = view.text {
        println!("📝 {text}");
    }
    if let Some(error) = view.error {
        println!("⚠️ {error}");
    }
}

pub async fn run(args: GenerateArgs) -> anyhow::Result<()> {
    let client = UploadClient::new(&args.server, Duration::from_secs(args.timeout))
        .context("building HTTP client")?;
    let mut studio = Studio::new(client);

    for (role, path) in [(FileRole::Product, &args.product), (FileRole::Pose, &args.pose)] {
        if let Some(path) = path {
            let file = draft::load_file(path).await?;
            studio.draft_mut().select(role, file);
        }
    }
    studio.draft_mut().prompt = args.prompt;
    studio.draft_mut().aspect_ratio = args.aspect_ratio;

    print_preview(FileRole::Product, &studio.draft().preview(FileRole::Product));
    print_preview(FileRole::Pose, &studio.draft().preview(FileRole::Pose));
    print_view(&studio.view());

    if let Err(alert) = studio.generate().await {
        bail!("{alert}");
    }
    print_view(&studio.view());

    if !studio.view().download_enabled {
        bail!("generation failed");
    }
    let Some(export) = studio.download(args.format) else {
        print_view(&studio.view());
        bail!("download failed");
    };
    let path = download::save(&export, &args.out).await?;
    info!("Saved {}", path.display());
    println!("✅ Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataUri, UploadedFile};
    use crate::prompt::DEFAULT_PROMPT;
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Cursor;
    use transport::GENERIC_FAILURE_MESSAGE;
    use ui::Generated;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn studio_for(server: &MockServer) -> Studio {
        Studio::new(UploadClient::new(&server.uri(), Duration::from_secs(5)).unwrap())
    }

    fn product() -> UploadedFile {
        UploadedFile::new("shirt.png", "image/png", b"product".to_vec())
    }

    fn png_data_uri() -> String {
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        DataUri { mime_type: "image/png".into(), bytes: Bytes::from(buf) }.to_string()
    }

    #[tokio::test]
    async fn no_product_alerts_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut studio = studio_for(&server);
        let alert = studio.generate().await.unwrap_err();
        assert_eq!(alert.to_string(), "Please upload a product image first.");
        assert_eq!(studio.state, UiState::Idle);
    }

    #[tokio::test]
    async fn success_displays_result_and_enables_download() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "image": png_data_uri(),
                "text": "Studio shot"
            })))
            .mount(&server)
            .await;

        let mut studio = studio_for(&server);
        studio.draft_mut().select(FileRole::Product, product());
        studio.generate().await.unwrap();

        let view = studio.view();
        assert!(view.image.is_some());
        assert_eq!(view.text, Some("Studio shot"));
        assert!(view.download_enabled);

        let export = studio.download(ExportFormat::Jpeg).unwrap();
        assert_eq!(export.file_name, "generated-model.jpeg");
    }

    #[tokio::test]
    async fn empty_prompt_is_sent_blank_for_server_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "image": png_data_uri() })))
            .mount(&server)
            .await;

        let mut studio = studio_for(&server);
        studio.draft_mut().select(FileRole::Product, product());
        studio.generate().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).into_owned();
        assert!(body.contains("name=\"userPrompt\"\r\n\r\n\r\n"));
        assert!(!body.contains(DEFAULT_PROMPT));
    }

    #[tokio::test]
    async fn server_500_shows_generic_error_and_disables_download() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut studio = studio_for(&server);
        studio.draft_mut().select(FileRole::Product, product());
        studio.generate().await.unwrap();

        let view = studio.view();
        assert_eq!(view.error, Some(GENERIC_FAILURE_MESSAGE));
        assert_eq!(view.image, None);
        assert!(!view.download_enabled);
        assert!(view.generate_enabled);
        assert!(studio.download(ExportFormat::Png).is_none());
    }

    #[tokio::test]
    async fn undecodable_image_turns_download_into_error() {
        let server = MockServer::start().await;
        let mut studio = studio_for(&server);
        studio.state = UiState::Success(Generated {
            image: DataUri { mime_type: "image/webp".into(), bytes: Bytes::from_static(b"garbage") },
            text: None,
        });

        assert!(studio.download(ExportFormat::Png).is_none());
        assert_eq!(studio.view().error, Some(DOWNLOAD_FAILURE_MESSAGE));
        assert!(!studio.view().download_enabled);
    }
}
