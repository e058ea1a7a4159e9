use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pricing::CombinePolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub clip: ClipConfig,

    #[serde(default)]
    pub labels: LabelConfig,

    #[serde(default)]
    pub inspection: InspectionConfig,

    #[serde(default)]
    pub quality: QualityConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub explain: ExplainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Upper bound on a whole upload request (both images plus form fields).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Load the encoders at startup instead of on the first inspection.
    #[serde(default = "default_preload_model")]
    pub preload_model: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024 // 32MB
}

fn default_preload_model() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_upload_bytes: default_max_upload_bytes(),
            preload_model: default_preload_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_visual_url")]
    pub visual_url: String,

    #[serde(default = "default_text_url")]
    pub text_url: String,

    #[serde(default = "default_tokenizer_url")]
    pub tokenizer_url: String,

    /// Multiplier applied to cosine similarities before the softmax.
    #[serde(default = "default_logit_scale")]
    pub logit_scale: f32,

    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_model_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("pricelens")
        .join("models")
}

fn default_visual_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-vision/resolve/main/model.onnx".to_string()
}

fn default_text_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/model.onnx".to_string()
}

fn default_tokenizer_url() -> String {
    "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/tokenizer.json".to_string()
}

fn default_logit_scale() -> f32 {
    100.0 // learned temperature of the released CLIP checkpoints
}

fn default_intra_threads() -> usize {
    4
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            visual_url: default_visual_url(),
            text_url: default_text_url(),
            tokenizer_url: default_tokenizer_url(),
            logit_scale: default_logit_scale(),
            intra_threads: default_intra_threads(),
        }
    }
}

/// A candidate view: the name shown to the user and the prompt fed to CLIP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewPrompt {
    pub name: String,
    pub prompt: String,
}

impl ViewPrompt {
    pub fn new(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_views")]
    pub views: Vec<ViewPrompt>,

    #[serde(default = "default_damaged_prompt")]
    pub damaged: String,

    #[serde(default = "default_undamaged_prompt")]
    pub undamaged: String,
}

fn default_views() -> Vec<ViewPrompt> {
    vec![
        ViewPrompt::new("front", "a photo of the front of a car"),
        ViewPrompt::new("side", "a photo of the side of a car"),
        ViewPrompt::new("rear", "a photo of the rear of a car"),
        ViewPrompt::new(
            "unrelated",
            "a photo of an unrelated object, blurry scene, or extremely cropped image",
        ),
    ]
}

fn default_damaged_prompt() -> String {
    "a photo of a damaged car with dents, scratches or cracks".to_string()
}

fn default_undamaged_prompt() -> String {
    "a photo of a clean undamaged car".to_string()
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            views: default_views(),
            damaged: default_damaged_prompt(),
            undamaged: default_undamaged_prompt(),
        }
    }
}

impl LabelConfig {
    pub fn view_prompts(&self) -> Vec<String> {
        self.views.iter().map(|v| v.prompt.clone()).collect()
    }

    /// Damage label set; the damaged prompt is always index 0.
    pub fn damage_prompts(&self) -> Vec<String> {
        vec![self.damaged.clone(), self.undamaged.clone()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionConfig {
    /// View scores below this are shown as "unknown".
    #[serde(default = "default_min_view_confidence")]
    pub min_view_confidence: f32,

    /// Minimum gap between the best and second-best view score.
    #[serde(default = "default_min_view_margin")]
    pub min_view_margin: f32,
}

fn default_min_view_confidence() -> f32 {
    0.35
}

fn default_min_view_margin() -> f32 {
    0.05
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            min_view_confidence: default_min_view_confidence(),
            min_view_margin: default_min_view_margin(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default = "default_min_width")]
    pub min_width: u32,

    #[serde(default = "default_min_height")]
    pub min_height: u32,

    /// Laplacian variance below which an image is rejected as blurry.
    #[serde(default = "default_blur_reject")]
    pub blur_reject: f64,

    /// Laplacian variance below which an image is accepted with a warning.
    #[serde(default = "default_blur_warn")]
    pub blur_warn: f64,

    /// Hamming distance (of 64 bits) at or below which two uploads are duplicates.
    #[serde(default = "default_duplicate_max_distance")]
    pub duplicate_max_distance: u32,
}

fn default_min_width() -> u32 {
    400
}

fn default_min_height() -> u32 {
    300
}

fn default_blur_reject() -> f64 {
    12.0
}

fn default_blur_warn() -> f64 {
    18.0
}

fn default_duplicate_max_distance() -> u32 {
    5
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_width: default_min_width(),
            min_height: default_min_height(),
            blur_reject: default_blur_reject(),
            blur_warn: default_blur_warn(),
            duplicate_max_distance: default_duplicate_max_distance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub combine: CombinePolicy,

    /// Discount applied at a combined damage score of 1.0, before the floor.
    #[serde(default = "default_max_discount")]
    pub max_discount: f32,

    /// Lowest multiplier the damage curve can produce.
    #[serde(default = "default_floor")]
    pub floor: f32,

    /// Suggested price never drops below this share of the base price.
    #[serde(default = "default_min_value_ratio")]
    pub min_value_ratio: f64,

    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_max_discount() -> f32 {
    0.6
}

fn default_floor() -> f32 {
    0.5
}

fn default_min_value_ratio() -> f64 {
    0.10
}

fn default_currency() -> String {
    "EGP".to_string()
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            combine: CombinePolicy::default(),
            max_discount: default_max_discount(),
            floor: default_floor(),
            min_value_ratio: default_min_value_ratio(),
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExplainProviderType {
    #[default]
    Placeholder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainConfig {
    #[serde(default)]
    pub provider: ExplainProviderType,

    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,
}

fn default_placeholder_text() -> String {
    "Automated explanations are not available yet. The price multiplier above \
     is derived only from the averaged damage signal of the front and side photos."
        .to_string()
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            provider: ExplainProviderType::default(),
            placeholder_text: default_placeholder_text(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file if none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Reject settings that would break the classifier or the price curve.
    pub fn validate(&self) -> Result<()> {
        if self.labels.views.is_empty() {
            bail!("labels.views must contain at least one view");
        }
        if !(self.clip.logit_scale.is_finite() && self.clip.logit_scale > 0.0) {
            bail!("clip.logit_scale must be a finite positive number");
        }
        if !(0.0..=1.0).contains(&self.pricing.floor) {
            bail!("pricing.floor must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.pricing.max_discount) {
            bail!("pricing.max_discount must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.pricing.min_value_ratio) {
            bail!("pricing.min_value_ratio must be within [0, 1]");
        }
        if self.quality.blur_warn < self.quality.blur_reject {
            bail!("quality.blur_warn must not be below quality.blur_reject");
        }
        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pricelens")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PRICELENS_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}
