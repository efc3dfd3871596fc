use crate::models::{AspectRatio, GenerationRequest, Part, UploadedFile};

pub const DEFAULT_PROMPT: &str = "A confident-looking model in a brightly lit studio setting.";

pub const POSE_SENTENCE: &str = "The model must replicate the exact body pose, posture and camera angle of the person shown in the pose reference image, which is the last image provided.";

/// Opening of every instruction; the aspect ratio is interpolated after it.
pub fn template_sentence(aspect_ratio: &AspectRatio) -> String {
    format!(
        "Generate a photorealistic, high-resolution e-commerce fashion photograph with a {aspect_ratio} aspect ratio, showing a professional model wearing the exact product from the first image provided."
    )
}

/// Resolve the prompt the user typed, falling back to `DEFAULT_PROMPT` when blank.
/// Anything else is used exactly as typed.
pub fn effective_prompt(user_prompt: &str) -> &str {
    if user_prompt.trim().is_empty() { DEFAULT_PROMPT } else { user_prompt }
}

pub fn build_instruction(user_prompt: &str, aspect_ratio: &AspectRatio, with_pose: bool) -> String {
    let mut sentences = vec![
        template_sentence(aspect_ratio),
        "Preserve the product's color, fabric, texture, print and fit precisely; do not alter or restyle it.".to_string(),
    ];
    if with_pose {
        sentences.push(POSE_SENTENCE.to_string());
    }
    sentences.push(format!("Scene and styling: {}", effective_prompt(user_prompt)));
    sentences.join(" ")
}

/// Assemble the parts in the order the model expects:
/// instruction text, product image, then the pose image when present.
pub fn build_generation_request(
    product: UploadedFile,
    pose: Option<UploadedFile>,
    user_prompt: &str,
    aspect_ratio: AspectRatio,
) -> GenerationRequest {
    let instruction = build_instruction(user_prompt, &aspect_ratio, pose.is_some());
    let mut parts = Vec::with_capacity(3);
    parts.push(Part::text(instruction));
    parts.push(product.into_part());
    if let Some(pose) = pose {
        parts.push(pose.into_part());
    }
    GenerationRequest { parts, aspect_ratio }
}
