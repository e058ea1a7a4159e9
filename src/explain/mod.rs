pub mod provider;

pub use provider::{create_provider, ExplanationContext, ExplanationProvider, PlaceholderExplainer};
