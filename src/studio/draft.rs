use std::path::Path;
use thiserror::Error;

use crate::models::{AspectRatio, FileRole, UploadedFile};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Please upload a product image first.")]
    MissingProduct,
    #[error("could not read {path}: {source}")]
    Read { path: String, source: std::io::Error },
}

/// What the preview area shows for one file slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Placeholder,
    Selected { file_name: String, mime_type: String, size: usize },
}

/// Everything needed to build one upload, borrowed from the draft.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub product: &'a UploadedFile,
    pub pose: Option<&'a UploadedFile>,
    pub prompt: &'a str,
    pub aspect_ratio: &'a AspectRatio,
}

/// The user's current selections. Replacing a file drops the previous one,
/// so nothing accumulates across repeated selections.
#[derive(Debug, Clone, Default)]
pub struct RequestDraft {
    product: Option<UploadedFile>,
    pose: Option<UploadedFile>,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

impl RequestDraft {
    fn slot(&mut self, role: FileRole) -> &mut Option<UploadedFile> {
        match role {
            FileRole::Product => &mut self.product,
            FileRole::Pose => &mut self.pose,
        }
    }

    /// Store a selection, returning whatever it replaced.
    pub fn select(&mut self, role: FileRole, file: UploadedFile) -> Option<UploadedFile> {
        tracing::debug!("Selected {} file '{}'", role, file.file_name);
        self.slot(role).replace(file)
    }

    pub fn clear(&mut self, role: FileRole) {
        *self.slot(role) = None;
    }

    pub fn file(&self, role: FileRole) -> Option<&UploadedFile> {
        match role {
            FileRole::Product => self.product.as_ref(),
            FileRole::Pose => self.pose.as_ref(),
        }
    }

    pub fn preview(&self, role: FileRole) -> Preview {
        match self.file(role) {
            None => Preview::Placeholder,
            Some(file) => Preview::Selected {
                file_name: file.file_name.clone(),
                mime_type: file.mime_type.clone(),
                size: file.bytes.len(),
            },
        }
    }

    pub fn submission(&self) -> Result<Submission<'_>, DraftError> {
        let product = self.product.as_ref().ok_or(DraftError::MissingProduct)?;
        Ok(Submission {
            product,
            pose: self.pose.as_ref(),
            prompt: &self.prompt,
            aspect_ratio: &self.aspect_ratio,
        })
    }
}

/// Read a file from disk, guessing its MIME type from the extension.
pub async fn load_file(path: &Path) -> Result<UploadedFile, DraftError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DraftError::Read { path: path.display().to_string(), source })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(UploadedFile::new(file_name, mime_type, bytes))
}
