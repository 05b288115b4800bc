//! Deterministic quality scoring for prompt content.
//!
//! Five dimension scorers each produce a score in `[1.0, 5.0]`; `overall`
//! is their fixed weighted combination, rounded to two decimals.
//!
//! | Dimension    | Weight |
//! |--------------|--------|
//! | clarity      | 0.30   |
//! | completeness | 0.30   |
//! | structure    | 0.20   |
//! | examples     | 0.10   |
//! | guardrails   | 0.10   |
//!
//! Scoring never performs I/O and returns identical metrics for identical
//! content, so results may be cached freely.

mod clarity;
mod completeness;
mod examples;
mod guardrails;
pub mod patterns;
mod structure;

pub use clarity::ClarityScorer;
pub use completeness::CompletenessScorer;
pub use examples::ExamplesScorer;
pub use guardrails::GuardrailsScorer;
pub use structure::StructureScorer;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::content::PromptContent;

/// Lowest score any dimension can take.
pub const MIN_SCORE: f64 = 1.0;

/// Highest score any dimension can take.
pub const MAX_SCORE: f64 = 5.0;

/// A quality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Clarity,
    Completeness,
    Structure,
    Examples,
    Guardrails,
    /// The weighted combination of the five scored dimensions
    Overall,
}

impl Dimension {
    /// The five independently scored dimensions, in weight order.
    pub const SCORED: [Dimension; 5] = [
        Dimension::Clarity,
        Dimension::Completeness,
        Dimension::Structure,
        Dimension::Examples,
        Dimension::Guardrails,
    ];

    /// Weight of this dimension in `overall` (zero for `Overall` itself).
    pub fn weight(&self) -> f64 {
        match self {
            Dimension::Clarity => 0.30,
            Dimension::Completeness => 0.30,
            Dimension::Structure => 0.20,
            Dimension::Examples => 0.10,
            Dimension::Guardrails => 0.10,
            Dimension::Overall => 0.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Clarity => "clarity",
            Dimension::Completeness => "completeness",
            Dimension::Structure => "structure",
            Dimension::Examples => "examples",
            Dimension::Guardrails => "guardrails",
            Dimension::Overall => "overall",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scores for one content object.
///
/// `overall` has no setter: it is always derived from the five dimension
/// scores when the metrics are built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityMetrics {
    clarity: f64,
    completeness: f64,
    structure: f64,
    examples: f64,
    guardrails: f64,
    overall: f64,
}

impl QualityMetrics {
    /// Build metrics from dimension scores, clamping each into range.
    pub fn from_scores(
        clarity: f64,
        completeness: f64,
        structure: f64,
        examples: f64,
        guardrails: f64,
    ) -> Self {
        let clarity = clamp_score(clarity);
        let completeness = clamp_score(completeness);
        let structure = clamp_score(structure);
        let examples = clamp_score(examples);
        let guardrails = clamp_score(guardrails);

        let weighted = clarity * Dimension::Clarity.weight()
            + completeness * Dimension::Completeness.weight()
            + structure * Dimension::Structure.weight()
            + examples * Dimension::Examples.weight()
            + guardrails * Dimension::Guardrails.weight();

        Self {
            clarity,
            completeness,
            structure,
            examples,
            guardrails,
            overall: round2(weighted),
        }
    }

    pub fn clarity(&self) -> f64 {
        self.clarity
    }

    pub fn completeness(&self) -> f64 {
        self.completeness
    }

    pub fn structure(&self) -> f64 {
        self.structure
    }

    pub fn examples(&self) -> f64 {
        self.examples
    }

    pub fn guardrails(&self) -> f64 {
        self.guardrails
    }

    pub fn overall(&self) -> f64 {
        self.overall
    }

    /// Score for any dimension, including `Overall`.
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Clarity => self.clarity,
            Dimension::Completeness => self.completeness,
            Dimension::Structure => self.structure,
            Dimension::Examples => self.examples,
            Dimension::Guardrails => self.guardrails,
            Dimension::Overall => self.overall,
        }
    }

    /// The lowest-scoring dimension (first in weight order on ties).
    pub fn weakest_dimension(&self) -> Dimension {
        Dimension::SCORED
            .into_iter()
            .fold(Dimension::Clarity, |weakest, d| {
                if self.get(d) < self.get(weakest) {
                    d
                } else {
                    weakest
                }
            })
    }
}

impl fmt::Display for QualityMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clarity={:.2} completeness={:.2} structure={:.2} examples={:.2} guardrails={:.2} overall={:.2}",
            self.clarity, self.completeness, self.structure, self.examples, self.guardrails, self.overall
        )
    }
}

/// One dimension's score and the bonuses that contributed to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: f64,
    pub bonuses: Vec<&'static str>,
}

impl DimensionScore {
    /// Start from a base score with no bonuses.
    pub(crate) fn base(dimension: Dimension, base: f64) -> Self {
        Self {
            dimension,
            score: base,
            bonuses: Vec::new(),
        }
    }

    /// Add `points` when `condition` holds, recording the bonus label.
    pub(crate) fn bonus(&mut self, condition: bool, points: f64, label: &'static str) {
        if condition {
            self.score += points;
            self.bonuses.push(label);
        }
    }

    pub(crate) fn clamped(mut self) -> Self {
        self.score = clamp_score(self.score);
        self
    }
}

/// Trait for one quality dimension.
///
/// Implementations must be pure: no I/O, no interior state, same input
/// same output. Missing or blank fields are absent for every check.
pub trait DimensionScorer: Send + Sync {
    /// The dimension this scorer produces.
    fn dimension(&self) -> Dimension;

    /// Score the content on this dimension.
    fn score(&self, content: &PromptContent) -> DimensionScore;
}

/// Full scoring breakdown for one content object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreCard {
    pub metrics: QualityMetrics,
    pub dimensions: Vec<DimensionScore>,
}

/// Scores content across all five dimensions.
pub struct QualityScorer {
    clarity: ClarityScorer,
    completeness: CompletenessScorer,
    structure: StructureScorer,
    examples: ExamplesScorer,
    guardrails: GuardrailsScorer,
}

impl QualityScorer {
    pub fn new() -> Self {
        Self {
            clarity: ClarityScorer::new(),
            completeness: CompletenessScorer::new(),
            structure: StructureScorer::new(),
            examples: ExamplesScorer::new(),
            guardrails: GuardrailsScorer::new(),
        }
    }

    /// Score content. Total over any content object; never panics.
    pub fn score(&self, content: &PromptContent) -> QualityMetrics {
        self.score_card(content).metrics
    }

    /// Score content and keep the per-dimension bonus breakdown.
    pub fn score_card(&self, content: &PromptContent) -> ScoreCard {
        let dimensions = vec![
            self.clarity.score(content),
            self.completeness.score(content),
            self.structure.score(content),
            self.examples.score(content),
            self.guardrails.score(content),
        ];

        let metrics = QualityMetrics::from_scores(
            dimensions[0].score,
            dimensions[1].score,
            dimensions[2].score,
            dimensions[3].score,
            dimensions[4].score,
        );

        ScoreCard {
            metrics,
            dimensions,
        }
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a score into `[MIN_SCORE, MAX_SCORE]`; NaN becomes the minimum.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        MIN_SCORE
    } else {
        score.clamp(MIN_SCORE, MAX_SCORE)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rich_content() -> PromptContent {
        PromptContent::new(
            "Write a migration guide for upgrading the billing service.\n\
             1. List breaking changes\n\
             2. Provide code samples\n\
             For example, show the old and new config side by side.\n\
             Input: v1 config\nOutput: v2 config",
        )
        .with_role("Senior platform engineer with deep billing expertise")
        .with_framework("RISEN")
        .with_guardrail("Do not invent APIs")
        .with_guardrail("Keep it under 800 words")
        .with_guardrail("Use British English")
        .with_guardrail("Cite the changelog")
    }

    #[test]
    fn test_empty_content_scores_minimums() {
        let metrics = QualityScorer::new().score(&PromptContent::default());
        assert_eq!(metrics.clarity(), 3.0);
        assert_eq!(metrics.completeness(), 1.0);
        assert_eq!(metrics.structure(), 3.0);
        assert_eq!(metrics.examples(), 1.0);
        assert_eq!(metrics.guardrails(), 1.0);
        // 0.9 + 0.3 + 0.6 + 0.1 + 0.1
        assert_eq!(metrics.overall(), 2.0);
    }

    #[test]
    fn test_rich_content_scores_high() {
        let metrics = QualityScorer::new().score(&rich_content());
        assert_eq!(metrics.clarity(), 5.0);
        assert_eq!(metrics.completeness(), 5.0);
        assert_eq!(metrics.structure(), 5.0);
        assert_eq!(metrics.guardrails(), 5.0);
        assert!(metrics.examples() >= 4.0);
    }

    #[test]
    fn test_overall_weighting() {
        let metrics = QualityMetrics::from_scores(4.0, 3.0, 5.0, 1.0, 2.0);
        // 1.2 + 0.9 + 1.0 + 0.1 + 0.2
        assert_eq!(metrics.overall(), 3.4);
        assert_eq!(metrics.get(Dimension::Overall), 3.4);
    }

    #[test]
    fn test_scores_clamped() {
        let metrics = QualityMetrics::from_scores(9.0, -2.0, f64::NAN, 5.0, 1.0);
        assert_eq!(metrics.clarity(), MAX_SCORE);
        assert_eq!(metrics.completeness(), MIN_SCORE);
        assert_eq!(metrics.structure(), MIN_SCORE);
    }

    #[test]
    fn test_weakest_dimension() {
        let metrics = QualityMetrics::from_scores(4.0, 3.0, 5.0, 1.0, 1.0);
        assert_eq!(metrics.weakest_dimension(), Dimension::Examples);
    }

    #[test]
    fn test_score_card_lists_bonuses() {
        let card = QualityScorer::new().score_card(&rich_content());
        assert_eq!(card.dimensions.len(), 5);
        let clarity = &card.dimensions[0];
        assert_eq!(clarity.dimension, Dimension::Clarity);
        assert_eq!(clarity.bonuses.len(), 4);
    }

    #[test]
    fn test_dimension_weights_sum_to_one() {
        let total: f64 = Dimension::SCORED.iter().map(|d| d.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    fn arb_content() -> impl Strategy<Value = PromptContent> {
        (
            proptest::option::of(".{0,80}"),
            proptest::option::of("(?s).{0,200}"),
            proptest::option::of("[A-Z-]{0,10}"),
            prop::collection::vec(".{0,30}", 0..6),
            proptest::option::of("(?s).{0,120}"),
        )
            .prop_map(|(role, directive, framework, guardrails, context)| PromptContent {
                role,
                directive,
                framework,
                guardrails,
                context,
                metadata: Default::default(),
            })
    }

    proptest! {
        #[test]
        fn prop_scoring_is_idempotent(content in arb_content()) {
            let scorer = QualityScorer::new();
            let first = scorer.score(&content);
            let second = scorer.score(&content);
            prop_assert_eq!(first.overall().to_bits(), second.overall().to_bits());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_scores_in_range_and_overall_is_weighted(content in arb_content()) {
            let metrics = QualityScorer::new().score(&content);
            for dimension in Dimension::SCORED {
                let score = metrics.get(dimension);
                prop_assert!((MIN_SCORE..=MAX_SCORE).contains(&score));
            }

            let expected = metrics.clarity() * 0.30
                + metrics.completeness() * 0.30
                + metrics.structure() * 0.20
                + metrics.examples() * 0.10
                + metrics.guardrails() * 0.10;
            prop_assert!((metrics.overall() - expected).abs() <= 0.005 + 1e-9);
        }
    }
}
