//! Front/side inspection flow.
//!
//! Each upload is decoded, quality-gated, then classified twice: once
//! against the view prompts and once against the damaged/undamaged pair.
//! The two damage scores fold into a price multiplier; if either image
//! fails, the multiplier stays neutral and the report names the failure.

mod preview;
mod report;

pub use preview::preview_data_url;
pub use report::{
    Adjustment, DamageResult, ImageFindings, ImageOutcome, ImageReport, InspectionReport,
    InspectionRequest, ProductInfo, ViewResult, ViewSlot, UNKNOWN_VIEW,
};

use image::{DynamicImage, GenericImageView};
use std::sync::Arc;

use crate::clip::{Classifier, Encoder};
use crate::config::{Config, InspectionConfig, LabelConfig, PricingConfig, QualityConfig};
use crate::error::{InspectError, Result};
use crate::explain::{ExplanationContext, ExplanationProvider};
use crate::pricing;
use crate::quality::{self, Sharpness};

const PREVIEW_SIZE: u32 = 320;

/// Fold two optional damage scores into a price adjustment.
///
/// Both scores must be present for an adjustment to apply; otherwise the
/// neutral multiplier 1.0 is returned.
pub fn adjust(front: Option<f32>, side: Option<f32>, config: &PricingConfig) -> Adjustment {
    match (front, side) {
        (Some(front), Some(side)) => {
            let combined = config.combine.combine(front, side);
            Adjustment {
                combined_damage: Some(combined),
                price_multiplier: pricing::price_multiplier(combined, config),
                applied: true,
            }
        }
        _ => Adjustment {
            combined_damage: None,
            price_multiplier: 1.0,
            applied: false,
        },
    }
}

/// Runs inspections against one shared encoder.
pub struct Inspector {
    classifier: Classifier,
    explainer: Arc<dyn ExplanationProvider>,
    labels: LabelConfig,
    inspection: InspectionConfig,
    quality: QualityConfig,
    pricing: PricingConfig,
}

impl Inspector {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        explainer: Arc<dyn ExplanationProvider>,
        config: &Config,
    ) -> Self {
        Self {
            classifier: Classifier::new(encoder, config.clip.logit_scale),
            explainer,
            labels: config.labels.clone(),
            inspection: config.inspection.clone(),
            quality: config.quality.clone(),
            pricing: config.pricing.clone(),
        }
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        self.classifier.encoder()
    }

    /// Inspect both uploads and price the result.
    ///
    /// Per-image problems end up in the report. Only a model load failure
    /// aborts the whole inspection.
    pub fn inspect(&self, request: &InspectionRequest) -> Result<InspectionReport> {
        let mut images = Vec::with_capacity(ViewSlot::ALL.len());
        let mut warnings = Vec::new();

        for slot in ViewSlot::ALL {
            let outcome = match self.inspect_image(slot, request.upload(slot), &mut warnings) {
                Ok(findings) => ImageOutcome::Inspected(findings),
                Err(e) if e.is_model_load() => {
                    tracing::error!(slot = %slot, error = %e, "Model unavailable");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(slot = %slot, error = %e, "Image failed inspection");
                    ImageOutcome::Failed {
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    }
                }
            };
            images.push(ImageReport { slot, outcome });
        }

        if let [ImageReport { outcome: ImageOutcome::Inspected(a), .. }, ImageReport { outcome: ImageOutcome::Inspected(b), .. }] =
            images.as_slice()
        {
            match quality::hamming_distance(&a.phash, &b.phash) {
                Ok(distance) if distance <= self.quality.duplicate_max_distance => {
                    warnings.push(format!(
                        "front and side photos look like the same picture (hash distance {})",
                        distance
                    ));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Skipping duplicate check"),
            }
        }

        let damage_of = |slot: ViewSlot| {
            images
                .iter()
                .find(|image| image.slot == slot)
                .and_then(|image| image.findings())
                .map(|findings| findings.damage.score)
        };
        let adjustment = adjust(
            damage_of(ViewSlot::Front),
            damage_of(ViewSlot::Side),
            &self.pricing,
        );

        let quote = request
            .product
            .base_price
            .filter(|price| *price > 0.0)
            .map(|price| {
                pricing::quote(
                    price,
                    request.product.usage_years.unwrap_or(0.0),
                    adjustment.price_multiplier,
                    &self.pricing,
                )
            });

        let context = ExplanationContext {
            product_name: request.product.name.clone(),
            views: images
                .iter()
                .filter_map(|image| {
                    image
                        .findings()
                        .map(|f| (image.slot.to_string(), f.view.label.clone()))
                })
                .collect(),
            damage_scores: images
                .iter()
                .filter_map(|image| {
                    image
                        .findings()
                        .map(|f| (image.slot.to_string(), f.damage.score))
                })
                .collect(),
            combined_damage: adjustment.combined_damage,
            price_multiplier: adjustment.price_multiplier,
            failed_slots: images
                .iter()
                .filter(|image| image.findings().is_none())
                .map(|image| image.slot.to_string())
                .collect(),
        };
        let explanation = match self.explainer.generate_explanation(&context) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(provider = self.explainer.provider_name(), error = %e, "Explanation failed");
                format!("Explanation unavailable: {}", e)
            }
        };

        tracing::info!(
            combined_damage = ?adjustment.combined_damage,
            multiplier = adjustment.price_multiplier,
            applied = adjustment.applied,
            warnings = warnings.len(),
            "Inspection complete"
        );

        Ok(InspectionReport {
            generated_at: chrono::Local::now(),
            product: request.product.clone(),
            images,
            adjustment,
            quote,
            warnings,
            explanation,
            explanation_provider: self.explainer.provider_name(),
        })
    }

    fn inspect_image(
        &self,
        slot: ViewSlot,
        bytes: &[u8],
        warnings: &mut Vec<String>,
    ) -> Result<ImageFindings> {
        let img = quality::decode(bytes)?;
        let sharpness = quality::check_image(&img, &self.quality)?;
        if let Sharpness::Borderline(score) = sharpness {
            warnings.push(format!("{} photo is borderline sharp ({:.1})", slot, score));
        }

        let view = self.classify_view(slot, &img)?;
        if view.is_unknown() {
            warnings.push(format!("{} photo: view could not be confirmed", slot));
        } else if !view.matches_slot {
            warnings.push(format!("{} photo looks like a {} view", slot, view.label));
        }

        let damage = self.classify_damage(&img)?;
        let phash = quality::perceptual_hash(&img)?;
        let (width, height) = img.dimensions();

        Ok(ImageFindings {
            width,
            height,
            sharpness,
            view,
            damage,
            phash,
            preview: preview_data_url(&img, PREVIEW_SIZE),
        })
    }

    /// Low-confidence and malformed view classifications degrade to "unknown".
    fn classify_view(&self, slot: ViewSlot, img: &DynamicImage) -> Result<ViewResult> {
        let prompts = self.labels.view_prompts();

        match self.classifier.classify(img, &prompts) {
            Ok(c) => {
                let confident = c.score >= self.inspection.min_view_confidence
                    && c.margin >= self.inspection.min_view_margin;
                let label = if confident {
                    self.labels.views[c.index].name.clone()
                } else {
                    UNKNOWN_VIEW.to_string()
                };

                Ok(ViewResult {
                    matches_slot: label == slot.as_str(),
                    label,
                    score: c.score,
                    margin: c.margin,
                })
            }
            Err(InspectError::Classification(reason)) => {
                tracing::warn!(slot = %slot, reason = %reason, "View classification failed");
                Ok(ViewResult::unknown())
            }
            Err(e) => Err(e),
        }
    }

    fn classify_damage(&self, img: &DynamicImage) -> Result<DamageResult> {
        let c = self.classifier.classify(img, &self.labels.damage_prompts())?;

        Ok(DamageResult {
            label: if c.index == 0 { "damaged" } else { "undamaged" }.to_string(),
            score: c.scores[0],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::testing::{
        color_config as test_config, color_encoder as stub, png_bytes, striped, StubEncoder,
    };
    use crate::explain::PlaceholderExplainer;

    fn inspector_with(encoder: StubEncoder, config: &Config) -> Inspector {
        Inspector::new(
            Arc::new(encoder),
            Arc::new(PlaceholderExplainer::new("placeholder text")),
            config,
        )
    }

    fn red() -> Vec<u8> {
        png_bytes(&striped([255, 0, 0], 64, 64, 2))
    }

    fn green() -> Vec<u8> {
        png_bytes(&striped([0, 255, 0], 96, 64, 5))
    }

    #[test]
    fn test_adjust_mean_of_both_scores() {
        let config = PricingConfig::default();
        let adjustment = adjust(Some(0.2), Some(0.4), &config);
        assert!((adjustment.combined_damage.unwrap() - 0.3).abs() < 1e-6);
        assert!(adjustment.applied);
    }

    #[test]
    fn test_adjust_damaged_front_clean_side() {
        let config = PricingConfig::default();
        let adjustment = adjust(Some(0.9), Some(0.1), &config);
        assert!((adjustment.combined_damage.unwrap() - 0.5).abs() < 1e-6);
        assert!(adjustment.price_multiplier < 1.0);
        assert!(adjustment.price_multiplier > config.floor);
    }

    #[test]
    fn test_adjust_missing_score_is_neutral() {
        let adjustment = adjust(Some(0.9), None, &PricingConfig::default());
        assert_eq!(adjustment.price_multiplier, 1.0);
        assert_eq!(adjustment.combined_damage, None);
        assert!(!adjustment.applied);
    }

    #[test]
    fn test_inspect_end_to_end() {
        let config = test_config();
        let inspector = inspector_with(stub(), &config);

        let report = inspector
            .inspect(&InspectionRequest {
                front: red(),
                side: green(),
                product: ProductInfo {
                    name: Some("Hatchback".to_string()),
                    base_price: Some(10_000.0),
                    usage_years: Some(3.0),
                },
            })
            .unwrap();

        let front = report.image(ViewSlot::Front).unwrap().findings().unwrap();
        assert_eq!(front.view.label, "front");
        assert!(front.view.matches_slot);
        assert_eq!(front.damage.label, "damaged");
        assert!(front.damage.score > 0.99);
        assert!(front.preview.is_some());

        let side = report.image(ViewSlot::Side).unwrap().findings().unwrap();
        assert_eq!(side.view.label, "side");
        assert_eq!(side.damage.label, "undamaged");
        assert!(side.damage.score < 0.01);

        let combined = report.adjustment.combined_damage.unwrap();
        assert!((combined - 0.5).abs() < 0.01);
        assert!(report.adjustment.applied);
        assert!(report.adjustment.price_multiplier < 1.0);
        assert!(report.adjustment.price_multiplier > config.pricing.floor);

        let quote = report.quote.as_ref().unwrap();
        assert!(quote.suggested_price < 10_000.0 * (1.0 - 0.35));
        assert_eq!(report.explanation, "placeholder text");
        assert!(report.failed_slots().is_empty());
    }

    #[test]
    fn test_invalid_side_image_keeps_neutral_multiplier() {
        let inspector = inspector_with(stub(), &test_config());

        let report = inspector
            .inspect(&InspectionRequest {
                front: red(),
                side: b"not an image".to_vec(),
                product: ProductInfo::default(),
            })
            .unwrap();

        assert_eq!(report.failed_slots(), vec![ViewSlot::Side]);
        assert_eq!(report.adjustment.price_multiplier, 1.0);
        assert!(!report.adjustment.applied);
        assert!(report.quote.is_none());

        match &report.image(ViewSlot::Side).unwrap().outcome {
            ImageOutcome::Failed { kind, .. } => assert_eq!(kind, "invalid_input"),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(report.image(ViewSlot::Front).unwrap().findings().is_some());
    }

    #[test]
    fn test_missing_upload_fails_that_slot() {
        let inspector = inspector_with(stub(), &test_config());

        let report = inspector
            .inspect(&InspectionRequest {
                front: Vec::new(),
                side: green(),
                product: ProductInfo::default(),
            })
            .unwrap();

        assert_eq!(report.failed_slots(), vec![ViewSlot::Front]);
        assert_eq!(report.adjustment.price_multiplier, 1.0);
    }

    #[test]
    fn test_low_resolution_is_rejected() {
        let mut config = test_config();
        config.quality.min_width = 400;
        let inspector = inspector_with(stub(), &config);

        let report = inspector
            .inspect(&InspectionRequest {
                front: red(),
                side: green(),
                product: ProductInfo::default(),
            })
            .unwrap();

        assert_eq!(report.failed_slots(), vec![ViewSlot::Front, ViewSlot::Side]);
    }

    #[test]
    fn test_model_load_failure_aborts() {
        let encoder = stub().failing_with(InspectError::ModelLoad("no weights".to_string()));
        let inspector = inspector_with(encoder, &test_config());

        let err = inspector
            .inspect(&InspectionRequest {
                front: red(),
                side: green(),
                product: ProductInfo::default(),
            })
            .unwrap_err();
        assert!(err.is_model_load());
    }

    #[test]
    fn test_malformed_view_output_shows_unknown() {
        let encoder = stub()
            .with_text("front prompt", vec![1.0, 0.0])
            .with_text("side prompt", vec![0.0, 1.0]);
        let inspector = inspector_with(encoder, &test_config());

        let report = inspector
            .inspect(&InspectionRequest {
                front: red(),
                side: green(),
                product: ProductInfo::default(),
            })
            .unwrap();

        let front = report.image(ViewSlot::Front).unwrap().findings().unwrap();
        assert_eq!(front.view.label, UNKNOWN_VIEW);
        assert!(report.adjustment.applied);
        assert!(report.warnings.iter().any(|w| w.contains("could not be confirmed")));
    }

    #[test]
    fn test_low_confidence_view_shows_unknown() {
        let mut config = test_config();
        config.inspection.min_view_confidence = 1.1;
        let inspector = inspector_with(stub(), &config);

        let report = inspector
            .inspect(&InspectionRequest {
                front: red(),
                side: green(),
                product: ProductInfo::default(),
            })
            .unwrap();

        for image in &report.images {
            assert!(image.findings().unwrap().view.is_unknown());
        }
    }

    #[test]
    fn test_wrong_slot_and_duplicate_warnings() {
        let inspector = inspector_with(stub(), &test_config());

        let report = inspector
            .inspect(&InspectionRequest {
                front: green(),
                side: green(),
                product: ProductInfo::default(),
            })
            .unwrap();

        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("front photo looks like a side view")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("same picture")));
    }
}
