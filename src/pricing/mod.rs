//! Naive damage-to-price folding.
//!
//! Two per-image damage scores are combined into one, mapped onto a
//! multiplier that falls linearly with damage and never drops below the
//! configured floor. When a base price is known the multiplier is applied
//! on top of an age-based depreciation table.

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;

/// How per-image damage scores are folded into one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CombinePolicy {
    #[default]
    Mean,
    Max,
}

impl CombinePolicy {
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            CombinePolicy::Mean => (a + b) / 2.0,
            CombinePolicy::Max => a.max(b),
        }
    }
}

/// Multiplier for a combined damage score: `max(floor, 1 - max_discount * damage)`.
pub fn price_multiplier(damage: f32, config: &PricingConfig) -> f32 {
    let damage = damage.clamp(0.0, 1.0);
    (1.0 - config.max_discount * damage).max(config.floor).min(1.0)
}

/// Share of value lost to age alone.
pub fn age_depreciation(years: f32) -> f64 {
    if !(years > 0.0) {
        return 0.15;
    }

    match years.floor() as u32 {
        0 | 1 => 0.15,
        2 => 0.25,
        3 => 0.35,
        4 => 0.43,
        5 => 0.50,
        6 => 0.55,
        _ => 0.60,
    }
}

/// Suggested resale price for a known base price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub base_price: f64,
    pub usage_years: f32,
    pub age_rate: f64,
    pub damage_multiplier: f32,
    pub suggested_price: f64,
    pub currency: String,
    /// The minimum-value rule raised the price.
    pub at_minimum: bool,
}

pub fn quote(base_price: f64, usage_years: f32, damage_multiplier: f32, config: &PricingConfig) -> PriceQuote {
    let age_rate = age_depreciation(usage_years);
    let raw = base_price * (1.0 - age_rate) * damage_multiplier as f64;
    let minimum = base_price * config.min_value_ratio;

    PriceQuote {
        base_price,
        usage_years,
        age_rate,
        damage_multiplier,
        suggested_price: raw.max(minimum),
        currency: config.currency.clone(),
        at_minimum: raw < minimum,
    }
}
