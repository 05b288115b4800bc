//! # promptwright-core
//!
//! Deterministic building blocks for prompt enhancement.
//!
//! This crate provides:
//! - [`PromptContent`]: the structured content object, with YAML/JSON loading,
//!   schema validation and human-readable diffs
//! - [`QualityScorer`]: five-dimension quality scoring
//! - [`CapabilityRegistry`]: known models and deterministic model selection
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No I/O**: Scoring and selection never touch the network or disk
//! 3. **Total**: Scoring accepts any content object and never panics
//!
//! ## Example
//!
//! ```rust
//! use promptwright_core::{score, PromptContent};
//!
//! let content = PromptContent::new("Write a product description for a desk lamp")
//!     .with_role("Senior copywriter")
//!     .with_guardrail("Under 100 words");
//!
//! let metrics = score(&content);
//! assert!(metrics.overall() > 2.0);
//! ```

pub mod content;
pub mod models;
pub mod quality;

// Re-export main types at crate root
pub use content::{diff, ContentError, PromptContent};
pub use models::{
    provider_reputation, Capability, CapabilityRegistry, ModelDescriptor, Priority,
    RegistryError, SelectionError, SpeedClass,
};
pub use quality::{
    Dimension, DimensionScore, DimensionScorer, QualityMetrics, QualityScorer, ScoreCard,
};

/// Score content with the default scorer.
pub fn score(content: &PromptContent) -> QualityMetrics {
    QualityScorer::new().score(content)
}
