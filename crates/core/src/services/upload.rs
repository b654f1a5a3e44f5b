//! Uploaded image files and the limits applied to them.

use civiccare_common::{AppError, AppResult, UploadConfig};
use image::ImageFormat;

/// An image received in a multipart request, held in memory until it is
/// screened and written to storage.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Name the client gave the file.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File contents.
    pub data: Vec<u8>,
}

impl UploadedImage {
    /// Create a new uploaded image.
    #[must_use]
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Image format detected from the file's magic bytes.
    pub fn format(&self) -> AppResult<ImageFormat> {
        image::guess_format(&self.data).map_err(|_| {
            AppError::Validation(format!("{} is not a supported image", self.file_name))
        })
    }

    /// Extension used when the file is stored.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.format()
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

/// Per-request upload limits.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size: usize,
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size: config.max_file_size,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl UploadLimits {
    /// Check a batch of images before anything is screened or stored.
    pub fn check(&self, images: &[UploadedImage]) -> AppResult<()> {
        if images.len() > self.max_files {
            return Err(AppError::Validation(format!(
                "At most {} images may be uploaded at once",
                self.max_files
            )));
        }

        for image in images {
            if image.data.is_empty() {
                return Err(AppError::Validation(format!("{} is empty", image.file_name)));
            }
            if image.data.len() > self.max_file_size {
                return Err(AppError::Validation(format!(
                    "{} exceeds the {} byte limit",
                    image.file_name, self.max_file_size
                )));
            }
            if !image.content_type.starts_with("image/") {
                return Err(AppError::Validation(format!(
                    "{} must be an image, got {}",
                    image.file_name, image.content_type
                )));
            }
            image.format()?;
        }

        Ok(())
    }
}

/// Smallest byte sequence recognised as a PNG.
#[cfg(any(test, feature = "test-utils"))]
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
