use crate::config::Config;
use crate::models::{GenerationRequest, InlineImage, Part};
use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("upstream returned status {status}: {body}")] Status { status: u16, body: String },
    #[error("upstream call timed out")] Timeout,
    #[error("parse error: {0}")] Parse(String),
    #[error("Other: {0}")] Other(String),
}

impl From<reqwest::Error> for GeminiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() { GeminiError::Timeout } else { GeminiError::Http(e.to_string()) }
    }
}

/// Something that turns a generation request into the model's response parts.
#[async_trait]
pub trait ImageModel: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Part>, GeminiError>;
}

// Truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        let total = s.chars().count();
                        if total > 100 {
                            let head: String = s.chars().take(50).collect();
                            *val = Value::String(format!("{}...[truncated {} chars]", head, total - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &Config) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| GeminiError::Other(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.api_base.clone(),
            model: config.model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") };
        format!("{}/{}:generateContent", self.base_url, model_path)
    }

    fn request_body(request: &GenerationRequest) -> Value {
        let parts: Vec<Value> = request.parts().iter().map(part_to_wire).collect();
        json!({
            "contents": [{
                "role": "user",
                "parts": parts
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "candidateCount": 1,
                "imageConfig": {
                    "aspectRatio": request.aspect_ratio().as_str()
                }
            }
        })
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Part>, GeminiError> {
        let url = self.endpoint();
        info!("🔗 Making request to: {} ({} parts)", url, request.parts().len());

        let request_body = Self::request_body(request);
        debug!("📤 Request body: {}", loggable(&request_body));

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Status { status: status.as_u16(), body: error_body });
        }

        let response_text = response.text().await?;
        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(e.to_string()))?;

        if let Ok(value) = serde_json::from_str::<Value>(&response_text) {
            debug!("📥 Raw Gemini API response: {}", loggable(&value));
        }
        if let Some(reason) = parsed.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            warn!("🚫 Prompt blocked by model: {}", reason);
        }
        for candidate in &parsed.candidates {
            if let Some(reason) = candidate.finish_reason.as_deref() {
                info!("🏁 Candidate finish reason: {}", reason);
            }
        }

        parsed.into_parts()
    }
}

fn part_to_wire(part: &Part) -> Value {
    match part {
        Part::Text { text } => json!({ "text": text }),
        Part::Image(image) => json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.to_base64()
            }
        }),
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<WirePart> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePart {
    Inline {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Text { text: String },
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", alias = "mime_type")]
    mime_type: String,
}

impl GeminiResponse {
    /// Flatten every candidate's parts into typed parts, dropping kinds we do not relay.
    fn into_parts(self) -> Result<Vec<Part>, GeminiError> {
        let mut parts = Vec::new();
        for candidate in self.candidates {
            for part in candidate.content.parts {
                match part {
                    WirePart::Inline { inline_data } => {
                        let bytes = base64::engine::general_purpose::STANDARD
                            .decode(inline_data.data.as_bytes())
                            .map_err(|e| GeminiError::Parse(format!("inline data is not base64: {e}")))?;
                        parts.push(Part::Image(InlineImage::new(inline_data.mime_type, bytes)));
                    }
                    WirePart::Text { text } => parts.push(Part::Text { text }),
                    WirePart::Other(value) => debug!("Skipping unsupported part: {}", loggable(&value)),
                }
            }
        }
        Ok(parts)
    }
}

/// Stand-in used when no API key is configured, so the app can be exercised end to end.
pub struct PlaceholderModel;

impl PlaceholderModel {
    fn dimensions(aspect_ratio: &str) -> (u32, u32) {
        let parsed = aspect_ratio
            .split_once(':')
            .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
            .filter(|(w, h)| *w > 0 && *h > 0);
        match parsed {
            Some((w, h)) => (512, (512 * h / w).max(1)),
            None => (512, 512),
        }
    }

    pub fn render(aspect_ratio: &str) -> Result<Vec<u8>, GeminiError> {
        let (width, height) = Self::dimensions(aspect_ratio);
        let img = RgbaImage::from_fn(width, height, |x, y| {
            let r = 59 + (x * 80 / width) as u8;
            let g = 130 + (y * 60 / height) as u8;
            Rgba([r, g, 246, 255])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| GeminiError::Other(e.to_string()))?;
        Ok(buf)
    }
}

#[async_trait]
impl ImageModel for PlaceholderModel {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Part>, GeminiError> {
        info!("Using demo mode - no real images generated");
        let png = Self::render(request.aspect_ratio().as_str())?;
        Ok(vec![
            Part::text("Demo mode: set GEMINI_API_KEY to generate real model photographs."),
            Part::Image(InlineImage::new("image/png", png)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, UploadedFile};
    use crate::prompt::build_generation_request;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = Config {
            api_key: Some("test-key".into()),
            api_base: format!("{}/v1beta", server.uri()),
            upstream_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        GeminiClient::new("test-key".into(), &config).unwrap()
    }

    fn request_with_pose() -> GenerationRequest {
        build_generation_request(
            UploadedFile::new("p.png", "image/png", b"product".to_vec()),
            Some(UploadedFile::new("q.jpg", "image/jpeg", b"pose".to_vec())),
            "beach",
            "16:9".parse::<AspectRatio>().unwrap(),
        )
    }

    #[test]
    fn request_body_keeps_part_order_and_asks_for_both_modalities() {
        let body = GeminiClient::request_body(&request_with_pose());
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts[0]["text"].as_str().unwrap().ends_with("Scene and styling: beach"));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "cHJvZHVjdA==");
        assert_eq!(parts[2]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["TEXT", "IMAGE"]));
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
    }

    #[test]
    fn truncates_long_base64_for_logs() {
        let long = "A".repeat(500);
        let logged = loggable(&json!({ "parts": [{ "inlineData": { "data": long } }] }));
        assert!(logged.contains("[truncated 450 chars]"));
        assert!(logged.len() < 200);
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let data = format!("a{}", "é".repeat(120));
        let logged = loggable(&json!({ "data": data }));
        assert!(logged.contains(&format!("a{}...[truncated 71 chars]", "é".repeat(49))));
    }

    #[tokio::test]
    async fn parses_image_and_text_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash-image:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [
                        { "text": "Here is your photo" },
                        { "inlineData": { "mimeType": "image/png", "data": "aW1n" } },
                        { "thoughtSignature": "xyz" }
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let parts = client_for(&server).generate(&request_with_pose()).await.unwrap();
        assert_eq!(
            parts,
            vec![
                Part::text("Here is your photo"),
                Part::Image(InlineImage::new("image/png", b"img".to_vec())),
            ]
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server).generate(&request_with_pose()).await.unwrap_err();
        assert!(matches!(err, GeminiError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn blocked_prompt_yields_no_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let parts = client_for(&server).generate(&request_with_pose()).await.unwrap();
        assert!(parts.is_empty());
    }

    #[tokio::test]
    async fn placeholder_returns_png_matching_ratio() {
        let request = request_with_pose();
        let parts = PlaceholderModel.generate(&request).await.unwrap();
        let image = parts.iter().find_map(Part::as_image).unwrap();
        let decoded = image::load_from_memory(&image.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (512, 288));
    }
}
