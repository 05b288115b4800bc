//! Examples
//!
//! **Question**: Does the prompt show the model what a good answer looks like?
//!
//! Scans the directive and the context together.

use crate::content::PromptContent;

use super::patterns::{count_example_indicators, has_paired_io_markers};
use super::{Dimension, DimensionScore, DimensionScorer};

const BASE: f64 = 1.0;

/// Scores the examples dimension.
pub struct ExamplesScorer;

impl ExamplesScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExamplesScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl DimensionScorer for ExamplesScorer {
    fn dimension(&self) -> Dimension {
        Dimension::Examples
    }

    fn score(&self, content: &PromptContent) -> DimensionScore {
        let text = [content.directive(), content.context()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n");

        let indicators = count_example_indicators(&text);

        let mut result = DimensionScore::base(self.dimension(), BASE);
        result.bonus(indicators > 0, 2.0, "example indicators");
        result.bonus(has_paired_io_markers(&text), 1.0, "paired input/output");
        result.bonus(indicators > 1, 1.0, "multiple examples");

        result.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_examples() {
        let score = ExamplesScorer::new().score(&PromptContent::new("Write a limerick"));
        assert_eq!(score.score, 1.0);
    }

    #[test]
    fn test_single_indicator() {
        let content = PromptContent::new("Name a fruit, for example a pear");
        assert_eq!(ExamplesScorer::new().score(&content).score, 3.0);
    }

    #[test]
    fn test_examples_in_context_count() {
        let content = PromptContent::new("Classify the sentiment")
            .with_context("For example:\nInput: I love it\nOutput: positive\nFor instance, sarcasm is negative");
        assert_eq!(ExamplesScorer::new().score(&content).score, 5.0);
    }

    #[test]
    fn test_io_markers_without_indicator() {
        let content = PromptContent::new("Translate\nInput: hola\nOutput: hello");
        assert_eq!(ExamplesScorer::new().score(&content).score, 2.0);
    }
}
