//! Error kinds surfaced by the classifier and the inspection flow.

/// Errors raised while classifying or inspecting an upload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InspectError {
    /// Encoder weights or tokenizer could not be fetched or loaded.
    #[error("model unavailable: {0}")]
    ModelLoad(String),

    /// Missing or undecodable image, or an empty label set.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Encoder produced output that cannot be scored.
    #[error("classification failed: {0}")]
    Classification(String),
}

impl InspectError {
    /// Short machine-readable name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelLoad(_) => "model_load",
            Self::InvalidInput(_) => "invalid_input",
            Self::Classification(_) => "classification",
        }
    }

    pub fn is_model_load(&self) -> bool {
        matches!(self, Self::ModelLoad(_))
    }
}

pub type Result<T> = std::result::Result<T, InspectError>;
