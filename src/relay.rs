use crate::models::{GenerationResult, InlineImage, Part};
use thiserror::Error;
use tracing::{info, warn};

pub const NO_IMAGE_MESSAGE: &str =
    "The model did not return an image. Try adjusting your prompt or using different images.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The model answered, but without an image. Any text it sent is kept for logging.
    #[error("no image in model response")]
    NoImage { text: Option<String> },
}

/// Pick the first image part and the first text part out of a model response.
/// Order within the response does not matter; a response without an image is a failure
/// even when it carries text.
pub fn relay(parts: Vec<Part>) -> Result<GenerationResult, RelayError> {
    let mut image: Option<InlineImage> = None;
    let mut text: Option<String> = None;

    for part in parts {
        match part {
            Part::Image(inline) if image.is_none() => {
                info!("🎯 Found image data with mime type: {}", inline.mime_type);
                image = Some(inline);
            }
            Part::Text { text: t } if text.is_none() && !t.is_empty() => {
                text = Some(t);
            }
            _ => {}
        }
    }

    match image {
        Some(image) => Ok(GenerationResult { image, text }),
        None => {
            warn!("⚠️ No inline image data found in response (text present: {})", text.is_some());
            Err(RelayError::NoImage { text })
        }
    }
}
