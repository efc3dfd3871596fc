use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::{io::Cursor, path::{Path, PathBuf}};
use thiserror::Error;

use crate::models::DataUri;

pub const FILE_STEM: &str = "generated-model";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn file_name(self) -> String {
        format!("{FILE_STEM}.{}", self.extension())
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not load the generated image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not write {path}: {source}")]
    Write { path: String, source: std::io::Error },
}

#[derive(Debug, Clone)]
pub struct Export {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Paint RGBA pixels over an opaque white canvas of the same size.
pub fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut canvas = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u32::from(pixel[3]);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        canvas.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    canvas
}

/// Re-encode the displayed image at its natural size in the requested format.
pub fn export(image: &DataUri, format: ExportFormat) -> Result<Export, DownloadError> {
    let decoded = image::load_from_memory(&image.bytes)?;
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Png => {
            DynamicImage::ImageRgba8(decoded.to_rgba8())
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        }
        ExportFormat::Jpeg => {
            // JPEG has no alpha; without the white canvas transparent areas turn black.
            DynamicImage::ImageRgb8(flatten_on_white(&decoded))
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
        }
    }
    tracing::info!("💾 Exported {}x{} image as {}", decoded.width(), decoded.height(), format.file_name());
    Ok(Export { file_name: format.file_name(), mime_type: format.mime_type(), bytes })
}

pub async fn save(export: &Export, dir: &Path) -> Result<PathBuf, DownloadError> {
    let path = dir.join(&export.file_name);
    tokio::fs::write(&path, &export.bytes)
        .await
        .map_err(|source| DownloadError::Write { path: path.display().to_string(), source })?;
    Ok(path)
}
