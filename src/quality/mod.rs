//! Checks an upload must pass before it is worth classifying.

mod blur;
mod hashing;

pub use blur::{blur_score, Sharpness};
pub use hashing::{hamming_distance, perceptual_hash};

use image::{DynamicImage, GenericImageView};

use crate::config::QualityConfig;
use crate::error::{InspectError, Result};

/// Decode raw upload bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(InspectError::InvalidInput("no image uploaded".to_string()));
    }

    image::load_from_memory(bytes)
        .map_err(|e| InspectError::InvalidInput(format!("cannot decode image: {}", e)))
}

pub fn check_resolution(img: &DynamicImage, min_width: u32, min_height: u32) -> Result<()> {
    let (width, height) = img.dimensions();
    if width < min_width || height < min_height {
        return Err(InspectError::InvalidInput(format!(
            "resolution too low: {}x{} (minimum {}x{})",
            width, height, min_width, min_height
        )));
    }
    Ok(())
}

/// Reject blurry images; borderline ones pass and are reported to the caller.
pub fn check_sharpness(img: &DynamicImage, config: &QualityConfig) -> Result<Sharpness> {
    let score = blur_score(img);
    let sharpness = Sharpness::classify(score, config.blur_reject, config.blur_warn);

    if let Sharpness::Blurry(score) = sharpness {
        return Err(InspectError::InvalidInput(format!(
            "image too blurry (sharpness {:.1}, minimum {:.1})",
            score, config.blur_reject
        )));
    }
    Ok(sharpness)
}

/// Run every single-image gate in order.
pub fn check_image(img: &DynamicImage, config: &QualityConfig) -> Result<Sharpness> {
    check_resolution(img, config.min_width, config.min_height)?;
    check_sharpness(img, config)
}
