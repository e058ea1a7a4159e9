use anyhow::Result;
use serde::Serialize;

use crate::config::{ExplainConfig, ExplainProviderType};

/// What an explanation may talk about.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExplanationContext {
    pub product_name: Option<String>,
    /// Detected view label per uploaded slot, e.g. `("front", "front")`.
    pub views: Vec<(String, String)>,
    /// Damage score per successfully inspected slot.
    pub damage_scores: Vec<(String, f32)>,
    pub combined_damage: Option<f32>,
    pub price_multiplier: f32,
    pub failed_slots: Vec<String>,
}

/// Trait for components that turn inspection results into prose
pub trait ExplanationProvider: Send + Sync {
    fn generate_explanation(&self, context: &ExplanationContext) -> Result<String>;

    /// Get the provider name for display
    fn provider_name(&self) -> &'static str;
}

/// Returns the same configured text for every inspection.
pub struct PlaceholderExplainer {
    text: String,
}

impl PlaceholderExplainer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl ExplanationProvider for PlaceholderExplainer {
    fn generate_explanation(&self, _context: &ExplanationContext) -> Result<String> {
        Ok(self.text.clone())
    }

    fn provider_name(&self) -> &'static str {
        "placeholder"
    }
}

pub fn create_provider(config: &ExplainConfig) -> Box<dyn ExplanationProvider> {
    match config.provider {
        ExplainProviderType::Placeholder => {
            Box::new(PlaceholderExplainer::new(&config.placeholder_text))
        }
    }
}
