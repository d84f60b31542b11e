use image::{DynamicImage, GenericImageView, ImageError};
use std::path::Path;
use thiserror::Error;
use webp::WebPMemory;

use crate::config::Config;
use crate::CompressionMode;

/// How an encode attempt failed.
///
/// `Rejected` is the soft case (the input is not a convertible image) and is
/// folded into a boolean by the caller; `Failed` is a hard pipeline failure
/// and always surfaces.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("not a convertible image: {0}")]
    Rejected(String),

    #[error("{0}")]
    Failed(String),
}

/// Narrow seam around the pixel-format conversion so the encoder can be
/// swapped or mocked without touching conversion logic.
pub trait Encoder: Send + Sync {
    fn encode(&self, source: &Path, target: &Path) -> Result<(), EncodeError>;
}

/// Production encoder: decode via the `image` crate, encode via `webp`.
pub struct WebpEncoder {
    quality: f32,
    mode: CompressionMode,
}

// WebP refuses anything larger in either dimension
const MAX_WEBP_DIMENSION: u32 = 16383;

impl WebpEncoder {
    pub fn new(quality: u8, mode: CompressionMode) -> Self {
        Self {
            quality: quality as f32,
            mode,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.quality, config.mode)
    }

    fn encode_image(&self, img: &DynamicImage, source: &Path) -> Result<WebPMemory, EncodeError> {
        let encoder = webp::Encoder::from_image(img)
            .map_err(|e| EncodeError::Rejected(format!("unsupported pixel layout: {e}")))?;

        let lossless = match self.mode {
            CompressionMode::Lossless => true,
            CompressionMode::Lossy => false,
            CompressionMode::Auto => self.should_use_lossless(img, source),
        };

        if lossless {
            Ok(encoder.encode_lossless())
        } else {
            Ok(encoder.encode(self.quality))
        }
    }

    fn should_use_lossless(&self, img: &DynamicImage, source: &Path) -> bool {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            // Likely transparency or few colors
            "png" | "gif" => true,
            // Photo content, use lossy
            "jpg" | "jpeg" => false,
            _ => {
                let (width, height) = img.dimensions();
                (width as u64 * height as u64) < 50_000
            }
        }
    }

    /// Downscale to fit WebP's dimension limit; reject degenerate images.
    fn clamp_dimensions(&self, img: DynamicImage) -> Result<DynamicImage, EncodeError> {
        let (width, height) = img.dimensions();

        if width == 0 || height == 0 {
            return Err(EncodeError::Rejected(format!(
                "invalid image dimensions: {width}x{height}"
            )));
        }

        if width <= MAX_WEBP_DIMENSION && height <= MAX_WEBP_DIMENSION {
            return Ok(img);
        }

        let scale = MAX_WEBP_DIMENSION as f64 / width.max(height) as f64;
        let new_width = (width as f64 * scale) as u32;
        let new_height = (height as f64 * scale) as u32;

        log::warn!("resizing {width}x{height} to {new_width}x{new_height} to fit WebP limits");

        Ok(img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3))
    }
}

impl Encoder for WebpEncoder {
    fn encode(&self, source: &Path, target: &Path) -> Result<(), EncodeError> {
        let img = image::open(source).map_err(classify_image_error)?;
        let img = self.clamp_dimensions(img)?;
        let webp_data = self.encode_image(&img, source)?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EncodeError::Failed(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        std::fs::write(target, &*webp_data)
            .map_err(|e| EncodeError::Failed(format!("failed to write {}: {e}", target.display())))
    }
}

/// Decode and format errors mean "this is not an image we can convert";
/// everything else is a pipeline failure.
fn classify_image_error(error: ImageError) -> EncodeError {
    match error {
        ImageError::Decoding(_) | ImageError::Unsupported(_) => {
            EncodeError::Rejected(error.to_string())
        }
        other => EncodeError::Failed(other.to_string()),
    }
}
