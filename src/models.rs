use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Ratios the image model accepts for `imageConfig.aspectRatio`.
pub const SUPPORTED_ASPECT_RATIOS: &[&str] = &[
    "1:1", "2:3", "3:2", "3:4", "4:3", "4:5", "5:4", "9:16", "16:9", "21:9",
];

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Image types we forward to the model as inline data.
pub const ACCEPTED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// Binary payload with its MIME type, as sent to or received from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Bytes,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { mime_type: mime_type.into(), bytes: bytes.into() }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> DataUri {
        DataUri { mime_type: self.mime_type.clone(), bytes: self.bytes.clone() }
    }
}

/// A unit of content exchanged with the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text { text: String },
    Image(InlineImage),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&InlineImage> {
        match self {
            Part::Image(image) => Some(image),
            Part::Text { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileRole {
    Product,
    Pose,
}

impl FileRole {
    /// Multipart field name carrying this file.
    pub fn field_name(self) -> &'static str {
        match self {
            FileRole::Product => "productFile",
            FileRole::Pose => "poseFile",
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Product => f.write_str("product"),
            FileRole::Pose => f.write_str("pose"),
        }
    }
}

/// A file picked by the user, held only for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { file_name: file_name.into(), mime_type: mime_type.into(), bytes: bytes.into() }
    }

    pub fn is_accepted_image(&self) -> bool {
        ACCEPTED_IMAGE_TYPES.contains(&self.mime_type.as_str())
    }

    pub fn into_part(self) -> Part {
        Part::Image(InlineImage { mime_type: self.mime_type, bytes: self.bytes })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported aspect ratio '{0}'")]
pub struct AspectRatioError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio(String);

impl AspectRatio {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio(DEFAULT_ASPECT_RATIO.to_string())
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(AspectRatio::default());
        }
        if SUPPORTED_ASPECT_RATIOS.contains(&trimmed) {
            Ok(AspectRatio(trimmed.to_string()))
        } else {
            Err(AspectRatioError(trimmed.to_string()))
        }
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = AspectRatioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.0
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered parts plus the target aspect ratio. Only `prompt::build_generation_request`
/// constructs one, so the part order always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub(crate) parts: Vec<Part>,
    pub(crate) aspect_ratio: AspectRatio,
}

impl GenerationRequest {
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn aspect_ratio(&self) -> &AspectRatio {
        &self.aspect_ratio
    }

    pub fn instruction(&self) -> &str {
        self.parts.first().and_then(Part::as_text).unwrap_or_default()
    }
}

/// A successful generation. The image is mandatory; a response without one
/// never becomes a `GenerationResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub image: InlineImage,
    pub text: Option<String>,
}

impl GenerationResult {
    pub fn into_response(self) -> UploadResponse {
        UploadResponse {
            image: Some(self.image.to_data_uri().to_string()),
            text: self.text,
            error: None,
        }
    }
}

/// JSON body returned by `POST /api/upload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Decode(String),
}

/// `data:<mime>;base64,<payload>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Bytes,
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        write!(f, "data:{};base64,{}", self.mime_type, payload)
    }
}

impl FromStr for DataUri {
    type Err = DataUriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (header, payload) = rest.split_once(',').ok_or(DataUriError::MissingScheme)?;
        let mime_type = header.strip_suffix(";base64").ok_or(DataUriError::NotBase64)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| DataUriError::Decode(e.to_string()))?;
        Ok(DataUri { mime_type: mime_type.to_string(), bytes: Bytes::from(bytes) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn aspect_ratio_defaults_when_blank() {
        assert_eq!("".parse::<AspectRatio>().unwrap().as_str(), "1:1");
        assert_eq!("  ".parse::<AspectRatio>().unwrap().as_str(), "1:1");
    }

    #[test]
    fn aspect_ratio_rejects_unknown_values() {
        assert_eq!("16:9".parse::<AspectRatio>().unwrap().as_str(), "16:9");
        assert_eq!("7:3".parse::<AspectRatio>(), Err(AspectRatioError("7:3".into())));
        assert!("wide".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn data_uri_formats_mime_and_payload() {
        let uri = DataUri { mime_type: "image/png".into(), bytes: Bytes::from_static(b"abc") };
        assert_eq!(uri.to_string(), "data:image/png;base64,YWJj");
    }

    #[test]
    fn data_uri_parse_rejects_plain_urls() {
        assert_eq!("https://example.com/a.png".parse::<DataUri>(), Err(DataUriError::MissingScheme));
        assert_eq!("data:image/png,raw".parse::<DataUri>(), Err(DataUriError::NotBase64));
        assert!(matches!("data:image/png;base64,@@@".parse::<DataUri>(), Err(DataUriError::Decode(_))));
    }

    #[test]
    fn generation_result_serializes_without_error_field() {
        let result = GenerationResult {
            image: InlineImage::new("image/png", Bytes::from_static(b"abc")),
            text: None,
        };
        let json = serde_json::to_value(result.into_response()).unwrap();
        assert_eq!(json, serde_json::json!({ "image": "data:image/png;base64,YWJj" }));
    }

    #[test]
    fn only_image_types_are_accepted() {
        assert!(UploadedFile::new("a.png", "image/png", Vec::new()).is_accepted_image());
        assert!(!UploadedFile::new("a.pdf", "application/pdf", Vec::new()).is_accepted_image());
    }
}
