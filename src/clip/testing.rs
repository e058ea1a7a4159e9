//! Deterministic encoder for tests: an image embeds to its mean RGB colour,
//! text embeds to whatever vector was registered for it.

use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;

use super::{Embedding, Encoder};
use crate::config::{Config, ViewPrompt};
use crate::error::{InspectError, Result};

pub(crate) struct StubEncoder {
    texts: HashMap<String, Embedding>,
    failure: Option<InspectError>,
}

impl StubEncoder {
    pub(crate) fn new() -> Self {
        Self {
            texts: HashMap::new(),
            failure: None,
        }
    }

    pub(crate) fn with_text(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.texts.insert(text.to_string(), embedding);
        self
    }

    /// Every embed call returns this error.
    pub(crate) fn failing_with(mut self, error: InspectError) -> Self {
        self.failure = Some(error);
        self
    }
}

impl Encoder for StubEncoder {
    fn embed_image(&self, img: &DynamicImage) -> Result<Embedding> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        let rgb = img.to_rgb8();
        let count = (rgb.width() * rgb.height()) as f32;
        let mut sums = [0.0f32; 3];
        for pixel in rgb.pixels() {
            for channel in 0..3 {
                sums[channel] += pixel[channel] as f32 / 255.0;
            }
        }
        Ok(sums.iter().map(|s| s / count).collect())
    }

    fn embed_text(&self, text: &str) -> Result<Embedding> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        self.texts
            .get(text)
            .cloned()
            .ok_or_else(|| InspectError::Classification(format!("no stub embedding for '{}'", text)))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub(crate) fn solid(color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb(color)))
}

/// An image whose mean colour points along `color` but with enough edges
/// to look sharp and hash differently per `stripe` width.
pub(crate) fn striped(color: [u8; 3], width: u32, height: u32, stripe: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if (x / stripe + y / (stripe * 3)) % 2 == 0 {
            Rgb(color)
        } else {
            Rgb([0, 0, 0])
        }
    });
    DynamicImage::ImageRgb8(img)
}

pub(crate) fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode test png");
    buf.into_inner()
}

/// Config matching [`color_encoder`], with quality gates relaxed for small
/// synthetic images.
pub(crate) fn color_config() -> Config {
    let mut config = Config::default();
    config.labels.views = vec![
        ViewPrompt::new("front", "front prompt"),
        ViewPrompt::new("side", "side prompt"),
        ViewPrompt::new("rear", "rear prompt"),
    ];
    config.labels.damaged = "damaged prompt".to_string();
    config.labels.undamaged = "clean prompt".to_string();
    config.quality.min_width = 32;
    config.quality.min_height = 32;
    config.quality.blur_reject = 0.0;
    config.quality.blur_warn = 0.0;
    config
}

/// Red reads as a damaged front view, green as a clean side view.
pub(crate) fn color_encoder() -> StubEncoder {
    StubEncoder::new()
        .with_text("front prompt", vec![1.0, 0.0, 0.0])
        .with_text("side prompt", vec![0.0, 1.0, 0.0])
        .with_text("rear prompt", vec![0.0, 0.0, 1.0])
        .with_text("damaged prompt", vec![1.0, 0.0, 0.0])
        .with_text("clean prompt", vec![0.0, 1.0, 0.0])
}
