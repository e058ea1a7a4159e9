//! CLIP model implementation using ONNX Runtime

use anyhow::{anyhow, Context};
use image::DynamicImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tokenizers::Tokenizer;

use super::Encoder;
use crate::config::ClipConfig;
use crate::error::{InspectError, Result};

/// CLIP embedding (512-dimensional vector for ViT-B/32)
pub type Embedding = Vec<f32>;

const INPUT_SIZE: u32 = 224;
/// CLIP's text context length.
const CONTEXT_LENGTH: usize = 77;
const PAD_TOKEN: i64 = 0;

const VISUAL_MODEL_FILE: &str = "clip-vit-b32-vision.onnx";
const TEXT_MODEL_FILE: &str = "clip-vit-b32-text.onnx";
const TOKENIZER_FILE: &str = "clip-vit-b32-tokenizer.json";

// CLIP normalization constants
const MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Handle to the CLIP visual and text encoders.
///
/// Sessions are loaded on first use (downloading weights if needed) and kept
/// for the lifetime of the handle. Share it behind an `Arc`.
pub struct ClipModel {
    config: ClipConfig,
    visual: OnceLock<Mutex<Session>>,
    text: OnceLock<Mutex<Session>>,
    tokenizer: OnceLock<Tokenizer>,
    text_cache: Mutex<HashMap<String, Embedding>>,
}

impl ClipModel {
    pub fn new(config: &ClipConfig) -> Self {
        Self {
            config: config.clone(),
            visual: OnceLock::new(),
            text: OnceLock::new(),
            tokenizer: OnceLock::new(),
            text_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Load both encoders and the tokenizer now rather than on first request.
    pub fn warm_up(&self) -> Result<()> {
        self.visual_session().map_err(model_load)?;
        self.text_session().map_err(model_load)?;
        self.tokenizer().map_err(model_load)?;
        Ok(())
    }

    fn visual_session(&self) -> anyhow::Result<&Mutex<Session>> {
        if let Some(session) = self.visual.get() {
            return Ok(session);
        }

        let model_path = ensure_model(&self.config.model_dir, VISUAL_MODEL_FILE, &self.config.visual_url)?;
        let session = build_session(&model_path, self.config.intra_threads)?;
        tracing::info!(path = ?model_path, "CLIP visual encoder loaded");

        let _ = self.visual.set(Mutex::new(session));
        self.visual
            .get()
            .ok_or_else(|| anyhow!("Visual model not initialized"))
    }

    fn text_session(&self) -> anyhow::Result<&Mutex<Session>> {
        if let Some(session) = self.text.get() {
            return Ok(session);
        }

        let model_path = ensure_model(&self.config.model_dir, TEXT_MODEL_FILE, &self.config.text_url)?;
        let session = build_session(&model_path, self.config.intra_threads)?;
        tracing::info!(path = ?model_path, "CLIP text encoder loaded");

        let _ = self.text.set(Mutex::new(session));
        self.text
            .get()
            .ok_or_else(|| anyhow!("Text model not initialized"))
    }

    fn tokenizer(&self) -> anyhow::Result<&Tokenizer> {
        if let Some(tokenizer) = self.tokenizer.get() {
            return Ok(tokenizer);
        }

        let path = ensure_model(&self.config.model_dir, TOKENIZER_FILE, &self.config.tokenizer_url)?;
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {}", path.display(), e))?;

        let _ = self.tokenizer.set(tokenizer);
        self.tokenizer
            .get()
            .ok_or_else(|| anyhow!("Tokenizer not initialized"))
    }
}

impl Encoder for ClipModel {
    fn embed_image(&self, img: &DynamicImage) -> Result<Embedding> {
        let session = self.visual_session().map_err(model_load)?;
        run_visual_encoder(session, img).map_err(classification)
    }

    fn embed_text(&self, text: &str) -> Result<Embedding> {
        if let Some(cached) = self
            .text_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(text).cloned())
        {
            return Ok(cached);
        }

        let session = self.text_session().map_err(model_load)?;
        let tokenizer = self.tokenizer().map_err(model_load)?;
        let embedding = run_text_encoder(session, tokenizer, text).map_err(classification)?;

        if let Ok(mut cache) = self.text_cache.lock() {
            cache.insert(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "clip-vit-b32"
    }

    fn is_ready(&self) -> bool {
        self.visual.get().is_some() && self.text.get().is_some()
    }
}

fn model_load(e: anyhow::Error) -> InspectError {
    InspectError::ModelLoad(format!("{:#}", e))
}

fn classification(e: anyhow::Error) -> InspectError {
    InspectError::Classification(format!("{:#}", e))
}

/// Download a model file into `models_dir` if it isn't cached yet
fn ensure_model(models_dir: &Path, filename: &str, url: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("Failed to create model directory {}", models_dir.display()))?;
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, url = %url, "Downloading CLIP model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        // One temp file per download, renamed into place when complete
        let mut partial = tempfile::NamedTempFile::new_in(models_dir)
            .context("Failed to create temporary model file")?;
        std::io::copy(&mut response.into_reader(), partial.as_file_mut())?;
        partial
            .persist(&model_path)
            .with_context(|| format!("Failed to store model at {}", model_path.display()))?;
        tracing::info!(model = %filename, path = ?model_path, "CLIP model downloaded");
    }

    Ok(model_path)
}

fn build_session(model_path: &Path, intra_threads: usize) -> anyhow::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Resize, center-crop and normalize an image into a CHW float buffer.
fn preprocess_image(img: &DynamicImage) -> Vec<f32> {
    let size = INPUT_SIZE as usize;

    // Shorter side to 224, then center crop
    let resized = img.resize_to_fill(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let mut input_data = vec![0.0f32; 3 * size * size];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * size + x as usize;
        for channel in 0..3 {
            input_data[channel * size * size + idx] =
                (pixel[channel] as f32 / 255.0 - MEAN[channel]) / STD[channel];
        }
    }

    input_data
}

/// Pad or truncate token ids to the CLIP context, returning ids and attention mask.
fn prepare_text_inputs(ids: &[u32]) -> (Vec<i64>, Vec<i64>) {
    let mut input_ids: Vec<i64> = ids.iter().map(|&id| id as i64).collect();

    if input_ids.len() > CONTEXT_LENGTH {
        // Keep the end-of-text token, CLIP pools on it.
        let eot = input_ids.last().copied().unwrap_or(PAD_TOKEN);
        input_ids.truncate(CONTEXT_LENGTH);
        input_ids[CONTEXT_LENGTH - 1] = eot;
    }

    let mut attention_mask = vec![1i64; input_ids.len()];
    input_ids.resize(CONTEXT_LENGTH, PAD_TOKEN);
    attention_mask.resize(CONTEXT_LENGTH, 0);

    (input_ids, attention_mask)
}

pub(crate) fn l2_normalize(embedding: Vec<f32>) -> Embedding {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        embedding.iter().map(|x| x / norm).collect()
    } else {
        embedding
    }
}

/// Run the visual encoder on an image
fn run_visual_encoder(session: &Mutex<Session>, img: &DynamicImage) -> anyhow::Result<Embedding> {
    let input_data = preprocess_image(img);

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))?;

    let mut model = session
        .lock()
        .map_err(|e| anyhow!("Failed to lock model: {}", e))?;

    let outputs = model.run(ort::inputs!["pixel_values" => input_tensor])?;

    let embedding_output = outputs
        .iter()
        .find(|(name, _)| *name == "image_embeds")
        .or_else(|| outputs.iter().next())
        .ok_or_else(|| anyhow!("No embedding output"))?;

    let (_shape, embedding_data) = embedding_output.1.try_extract_tensor::<f32>()?;

    Ok(l2_normalize(embedding_data.to_vec()))
}

/// Run the text encoder on a prompt
fn run_text_encoder(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    text: &str,
) -> anyhow::Result<Embedding> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let (input_ids, attention_mask) = prepare_text_inputs(encoding.get_ids());

    let ids_tensor = Tensor::from_array(([1usize, CONTEXT_LENGTH], input_ids.into_boxed_slice()))?;
    let mask_tensor =
        Tensor::from_array(([1usize, CONTEXT_LENGTH], attention_mask.into_boxed_slice()))?;

    let mut model = session
        .lock()
        .map_err(|e| anyhow!("Failed to lock model: {}", e))?;

    let outputs = model.run(ort::inputs![
        "input_ids" => ids_tensor,
        "attention_mask" => mask_tensor
    ])?;

    let embedding_output = outputs
        .iter()
        .find(|(name, _)| *name == "text_embeds")
        .or_else(|| outputs.iter().next())
        .ok_or_else(|| anyhow!("No embedding output"))?;

    let (_shape, embedding_data) = embedding_output.1.try_extract_tensor::<f32>()?;

    Ok(l2_normalize(embedding_data.to_vec()))
}
