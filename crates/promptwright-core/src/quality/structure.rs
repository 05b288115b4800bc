//! Structure
//!
//! **Question**: Is the prompt organised so the model can follow it?

use crate::content::PromptContent;

use super::patterns::has_explicit_structure;
use super::{Dimension, DimensionScore, DimensionScorer};

const BASE: f64 = 3.0;

/// Scores the structure dimension.
pub struct StructureScorer;

impl StructureScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StructureScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionScorer for StructureScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Structure
    }

    fn score(&self, content: &PromptContent) -> DimensionScore {
        let mut result = DimensionScore::base(self.dimension(), BASE);

        result.bonus(
            content.role().is_some() && content.directive().is_some(),
            0.5,
            "role and directive",
        );
        result.bonus(content.framework().is_some(), 0.5, "framework set");
        result.bonus(content.guardrail_count() > 0, 0.5, "guardrails listed");
        result.bonus(
            content.directive().is_some_and(has_explicit_structure),
            0.5,
            "structured directive",
        );

        result.clamped()
    }
}
