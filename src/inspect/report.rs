use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::pricing::PriceQuote;
use crate::quality::Sharpness;

/// Label shown when the view cannot be determined with confidence.
pub const UNKNOWN_VIEW: &str = "unknown";

/// Upload slot an image was submitted through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ViewSlot {
    Front,
    Side,
}

impl ViewSlot {
    pub const ALL: [ViewSlot; 2] = [ViewSlot::Front, ViewSlot::Side];

    /// Slot name; also the view label an image in this slot is expected to get.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewSlot::Front => "front",
            ViewSlot::Side => "side",
        }
    }
}

impl std::fmt::Display for ViewSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional details entered alongside the photos.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: Option<String>,
    pub base_price: Option<f64>,
    pub usage_years: Option<f32>,
}

/// One user interaction: the raw uploads plus product details.
#[derive(Debug, Clone, Default)]
pub struct InspectionRequest {
    pub front: Vec<u8>,
    pub side: Vec<u8>,
    pub product: ProductInfo,
}

impl InspectionRequest {
    pub fn upload(&self, slot: ViewSlot) -> &[u8] {
        match slot {
            ViewSlot::Front => &self.front,
            ViewSlot::Side => &self.side,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewResult {
    /// View name from the label set, or [`UNKNOWN_VIEW`].
    pub label: String,
    pub score: f32,
    pub margin: f32,
    pub matches_slot: bool,
}

impl ViewResult {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_VIEW.to_string(),
            score: 0.0,
            margin: 0.0,
            matches_slot: false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_VIEW
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageResult {
    /// `damaged` or `undamaged`, whichever prompt scored higher.
    pub label: String,
    /// Probability mass on the damaged prompt.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageFindings {
    pub width: u32,
    pub height: u32,
    pub sharpness: Sharpness,
    pub view: ViewResult,
    pub damage: DamageResult,
    pub phash: String,
    /// Inline JPEG thumbnail for the HTML report.
    #[serde(skip)]
    pub preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ImageOutcome {
    Inspected(ImageFindings),
    Failed { kind: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub slot: ViewSlot,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

impl ImageReport {
    pub fn findings(&self) -> Option<&ImageFindings> {
        match &self.outcome {
            ImageOutcome::Inspected(findings) => Some(findings),
            ImageOutcome::Failed { .. } => None,
        }
    }
}

/// Result of folding the per-image damage signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adjustment {
    pub combined_damage: Option<f32>,
    pub price_multiplier: f32,
    /// False when an image failed and the neutral multiplier was used.
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub generated_at: DateTime<Local>,
    pub product: ProductInfo,
    pub images: Vec<ImageReport>,
    pub adjustment: Adjustment,
    pub quote: Option<PriceQuote>,
    pub warnings: Vec<String>,
    pub explanation: String,
    pub explanation_provider: &'static str,
}

impl InspectionReport {
    pub fn image(&self, slot: ViewSlot) -> Option<&ImageReport> {
        self.images.iter().find(|image| image.slot == slot)
    }

    pub fn failed_slots(&self) -> Vec<ViewSlot> {
        self.images
            .iter()
            .filter(|image| image.findings().is_none())
            .map(|image| image.slot)
            .collect()
    }
}
