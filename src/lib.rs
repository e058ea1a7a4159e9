//! Explainable dynamic pricing prototype.
//!
//! Two photos of an item (front and side) are checked with a CLIP
//! zero-shot classifier for view type and visible damage. The damage
//! signals fold into a price multiplier that is shown, together with a
//! placeholder explanation, on a local web page.

pub mod clip;
pub mod config;
pub mod error;
pub mod explain;
pub mod inspect;
pub mod logging;
pub mod pricing;
pub mod quality;
pub mod web;

pub use error::{InspectError, Result};
