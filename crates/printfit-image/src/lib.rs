use std::io::Cursor;
use std::path::Path;

use image::ImageReader;
use printfit_core::{CoreError, ImageMetrics};
use thiserror::Error;
use tracing::debug;

/// Extensions accepted when scanning directories for images.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn to_metrics(self) -> Result<ImageMetrics, CoreError> {
        ImageMetrics::new(i64::from(self.width), i64::from(self.height))
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Reads the pixel dimensions from an image file header without decoding pixels.
pub fn probe_path(path: &Path) -> Result<ImageSize, ProbeError> {
    let (width, height) = ImageReader::open(path)?.with_guessed_format()?.into_dimensions()?;
    debug!(path = %path.display(), width, height, "Probed image header");
    Ok(ImageSize { width, height })
}

pub fn probe_bytes(bytes: &[u8]) -> Result<ImageSize, ProbeError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok(ImageSize { width, height })
}

pub fn is_supported_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}
