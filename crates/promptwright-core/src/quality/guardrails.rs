//! Guardrails
//!
//! Step function of the number of non-blank guardrails:
//! 0 → 1.0, 1 → 2.0, 2 → 3.0, 3 → 4.0, 4+ → 5.0.

use crate::content::PromptContent;

use super::{Dimension, DimensionScore, DimensionScorer};

/// Scores the guardrails dimension.
pub struct GuardrailsScorer;

impl GuardrailsScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GuardrailsScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionScorer for GuardrailsScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Guardrails
    }

    fn score(&self, content: &PromptContent) -> DimensionScore {
        let score = match content.guardrail_count() {
            0 => 1.0,
            1 => 2.0,
            2 => 3.0,
            3 => 4.0,
            _ => 5.0,
        };

        DimensionScore::base(self.dimension(), score).clamped()
    }
}
