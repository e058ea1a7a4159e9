//! Zero-shot classification of an image against a set of text labels.

use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;

use super::{Embedding, Encoder};
use crate::error::{InspectError, Result};

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// Best-matching label, verbatim from the input set.
    pub label: String,
    /// Position of `label` in the input set.
    pub index: usize,
    /// Softmax score of `label`, in [0, 1].
    pub score: f32,
    /// Softmax score per label, in input order.
    pub scores: Vec<f32>,
    /// Gap between the best and second-best score (1.0 for a single label).
    pub margin: f32,
}

/// Scores images against label prompts with a shared encoder.
#[derive(Clone)]
pub struct Classifier {
    encoder: Arc<dyn Encoder>,
    logit_scale: f32,
}

impl Classifier {
    pub fn new(encoder: Arc<dyn Encoder>, logit_scale: f32) -> Self {
        Self {
            encoder,
            logit_scale,
        }
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    /// Pick the label whose embedding is closest to the image embedding.
    ///
    /// Cosine similarities are scaled by the logit scale and softmaxed across
    /// the labels. Equal scores resolve to the earliest label.
    pub fn classify(&self, img: &DynamicImage, labels: &[String]) -> Result<Classification> {
        if labels.is_empty() {
            return Err(InspectError::InvalidInput("label set is empty".to_string()));
        }
        if img.width() == 0 || img.height() == 0 {
            return Err(InspectError::InvalidInput("image has no pixels".to_string()));
        }

        let image_embedding = self.encoder.embed_image(img)?;
        check_embedding(&image_embedding, "image")?;

        let mut logits = Vec::with_capacity(labels.len());
        for label in labels {
            let text_embedding = self.encoder.embed_text(label)?;
            check_embedding(&text_embedding, label)?;
            if text_embedding.len() != image_embedding.len() {
                return Err(InspectError::Classification(format!(
                    "embedding size mismatch: image {} vs label '{}' {}",
                    image_embedding.len(),
                    label,
                    text_embedding.len()
                )));
            }
            logits.push(cosine_similarity(&image_embedding, &text_embedding) * self.logit_scale);
        }

        let scores = softmax(&logits);
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(InspectError::Classification(
                "non-finite label scores".to_string(),
            ));
        }

        let (index, score) = arg_max(&scores);
        let runner_up = scores
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, s)| *s)
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));
        let margin = runner_up.map_or(1.0, |second| score - second);

        tracing::debug!(
            encoder = self.encoder.name(),
            label = %labels[index],
            score,
            margin,
            "Classified image"
        );

        Ok(Classification {
            label: labels[index].clone(),
            index,
            score,
            scores,
            margin,
        })
    }
}

fn check_embedding(embedding: &Embedding, what: &str) -> Result<()> {
    if embedding.is_empty() {
        return Err(InspectError::Classification(format!(
            "empty embedding for {}",
            what
        )));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(InspectError::Classification(format!(
            "non-finite embedding for {}",
            what
        )));
    }
    Ok(())
}

/// First index holding the maximum value.
fn arg_max(scores: &[f32]) -> (usize, f32) {
    let mut best = (0, scores[0]);
    for (i, &s) in scores.iter().enumerate().skip(1) {
        if s > best.1 {
            best = (i, s);
        }
    }
    best
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let Some(max) = logits.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };

    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

/// Calculate cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
