//! CLIP (Contrastive Language-Image Pre-training) zero-shot classification
//!
//! Provides:
//! - An [`Encoder`] seam over image and text embedding
//! - The ONNX Runtime implementation ([`ClipModel`])
//! - Cosine-similarity + softmax classification over a label set

mod classifier;
mod model;
#[cfg(test)]
pub(crate) mod testing;

pub use classifier::{cosine_similarity, softmax, Classification, Classifier};
pub use model::{ClipModel, Embedding};

use image::DynamicImage;

use crate::error::Result;

/// Maps images and text into a shared embedding space.
pub trait Encoder: Send + Sync {
    /// Embed a decoded image.
    fn embed_image(&self, img: &DynamicImage) -> Result<Embedding>;

    /// Embed a short text prompt.
    fn embed_text(&self, text: &str) -> Result<Embedding>;

    /// Get the encoder name for display
    fn name(&self) -> &str;

    /// Whether weights are already loaded in this process.
    fn is_ready(&self) -> bool {
        true
    }
}
