//! Completeness
//!
//! **Question**: Are all the parts of a good prompt there?
//!
//! Base 1.0, +1.0 for each of role, directive, framework and guardrails,
//! +0.5 when the directive is longer than 100 chars, +0.5 for three or more
//! guardrails. Capped at 5.0.

use crate::content::PromptContent;

use super::{Dimension, DimensionScore, DimensionScorer};

const BASE: f64 = 1.0;
const LONG_DIRECTIVE_CHARS: usize = 100;
const MANY_GUARDRAILS: usize = 3;

/// Scores the completeness dimension.
pub struct CompletenessScorer;

impl CompletenessScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CompletenessScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionScorer for CompletenessScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Completeness
    }

    fn score(&self, content: &PromptContent) -> DimensionScore {
        let mut result = DimensionScore::base(self.dimension(), BASE);
        let guardrails = content.guardrail_count();

        result.bonus(content.role().is_some(), 1.0, "has role");
        result.bonus(content.directive().is_some(), 1.0, "has directive");
        result.bonus(content.framework().is_some(), 1.0, "has framework");
        result.bonus(guardrails > 0, 1.0, "has guardrails");
        result.bonus(
            content
                .directive()
                .is_some_and(|d| d.chars().count() > LONG_DIRECTIVE_CHARS),
            0.5,
            "long directive",
        );
        result.bonus(guardrails >= MANY_GUARDRAILS, 0.5, "three or more guardrails");

        result.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_only() {
        let score = CompletenessScorer::new().score(&PromptContent::new("Plan a trip"));
        assert_eq!(score.score, 2.0);
    }

    #[test]
    fn test_all_parts_present() {
        let content = PromptContent::new("Plan a trip")
            .with_role("Travel agent")
            .with_framework("RISEN")
            .with_guardrail("Budget under $2000");
        assert_eq!(CompletenessScorer::new().score(&content).score, 5.0);
    }

    #[test]
    fn test_bonuses_without_framework() {
        let content = PromptContent::new("x".repeat(101))
            .with_role("Travel agent")
            .with_guardrail("a")
            .with_guardrail("b")
            .with_guardrail("c");
        // 1 + role + directive + guardrails + long + many
        assert_eq!(CompletenessScorer::new().score(&content).score, 5.0);

        let content = PromptContent::new("x".repeat(101)).with_guardrail("a");
        assert_eq!(CompletenessScorer::new().score(&content).score, 3.5);
    }

    #[test]
    fn test_blank_guardrails_ignored() {
        let content = PromptContent::new("Plan").with_guardrail("  ").with_guardrail("");
        assert_eq!(CompletenessScorer::new().score(&content).score, 2.0);
    }
}
