//! Clarity
//!
//! **Question**: Does the model know who it is and what it must do?
//!
//! | Check | Points |
//! |-------|--------|
//! | base | 3.0 |
//! | role longer than 20 chars | +0.5 |
//! | role carries an expertise/seniority marker | +0.5 |
//! | directive longer than 50 chars | +0.5 |
//! | directive starts with an action verb | +0.5 |

use crate::content::PromptContent;

use super::patterns::{begins_with_action_verb, has_expertise_marker};
use super::{Dimension, DimensionScore, DimensionScorer};

const BASE: f64 = 3.0;
const MIN_ROLE_CHARS: usize = 20;
const MIN_DIRECTIVE_CHARS: usize = 50;

/// Scores the clarity dimension.
pub struct ClarityScorer;

impl ClarityScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionScorer for ClarityScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Clarity
    }

    fn score(&self, content: &PromptContent) -> DimensionScore {
        let mut result = DimensionScore::base(self.dimension(), BASE);

        let role = content.role();
        result.bonus(
            role.is_some_and(|r| r.chars().count() > MIN_ROLE_CHARS),
            0.5,
            "detailed role",
        );
        result.bonus(
            role.is_some_and(has_expertise_marker),
            0.5,
            "role states expertise",
        );

        let directive = content.directive();
        result.bonus(
            directive.is_some_and(|d| d.chars().count() > MIN_DIRECTIVE_CHARS),
            0.5,
            "detailed directive",
        );
        result.bonus(
            directive.is_some_and(begins_with_action_verb),
            0.5,
            "directive opens with an action verb",
        );

        result.clamped()
    }
}
