//! Shared detection patterns for the dimension scorers.
//!
//! Fixed word lists and regexes; changing any of them changes scores, so
//! they are part of the scoring contract.

use lazy_static::lazy_static;
use regex::Regex;

/// Verbs that mark a directive as an explicit instruction.
pub const ACTION_VERBS: &[&str] = &[
    "analyze", "answer", "assess", "build", "classify", "compare", "compose", "create",
    "describe", "design", "develop", "draft", "edit", "evaluate", "explain", "extract",
    "generate", "identify", "implement", "list", "outline", "plan", "produce", "propose",
    "provide", "recommend", "refactor", "review", "rewrite", "summarize", "translate",
    "write",
];

lazy_static! {
    /// Seniority and expertise markers in a role description
    pub static ref EXPERTISE_PATTERN: Regex = Regex::new(
        r"(?i)\b(expert|senior|specialist|experienced|seasoned|veteran|principal|lead|professional|authority|master|\d+\+?\s+years?)\b"
    ).unwrap();

    /// Phrases that introduce a worked example
    pub static ref EXAMPLE_INDICATOR_PATTERN: Regex = Regex::new(
        r"(?i)(\bfor example\b|\bfor instance\b|\be\.g\.|\bexamples?\s*:|\bsuch as\b|\bsample (input|output|response)\b)"
    ).unwrap();

    /// Line-leading input markers ("Input:", "Question:", "User:")
    pub static ref INPUT_MARKER_PATTERN: Regex = Regex::new(
        r"(?im)^\s*(input|question|user)\s*:"
    ).unwrap();

    /// Line-leading output markers ("Output:", "Answer:", "Assistant:")
    pub static ref OUTPUT_MARKER_PATTERN: Regex = Regex::new(
        r"(?im)^\s*(output|answer|response|assistant)\s*:"
    ).unwrap();

    /// Numbered ("1." / "2)") or bulleted ("-", "*", "•") list items
    pub static ref LIST_MARKER_PATTERN: Regex = Regex::new(
        r"(?m)^\s*(\d+[.)]|[-*•])\s+"
    ).unwrap();
}

/// Check if text contains an expertise or seniority marker.
pub fn has_expertise_marker(text: &str) -> bool {
    EXPERTISE_PATTERN.is_match(text)
}

/// Check if the first word of `text` is an action verb.
pub fn begins_with_action_verb(text: &str) -> bool {
    let first_word = text
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase());

    match first_word {
        Some(word) => ACTION_VERBS.contains(&word.as_str()),
        None => false,
    }
}

/// Count example-indicator phrases in text.
pub fn count_example_indicators(text: &str) -> usize {
    EXAMPLE_INDICATOR_PATTERN.find_iter(text).count()
}

/// Check if text contains both an input marker and an output marker.
pub fn has_paired_io_markers(text: &str) -> bool {
    INPUT_MARKER_PATTERN.is_match(text) && OUTPUT_MARKER_PATTERN.is_match(text)
}

/// Check if text shows explicit structure: line breaks or list markers.
pub fn has_explicit_structure(text: &str) -> bool {
    text.trim().contains('\n') || LIST_MARKER_PATTERN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expertise_detection() {
        assert!(has_expertise_marker("Senior backend engineer"));
        assert!(has_expertise_marker("Analyst with 10 years of experience"));
        assert!(has_expertise_marker("A seasoned editor"));
        assert!(!has_expertise_marker("A helpful assistant"));
    }

    #[test]
    fn test_action_verb_detection() {
        assert!(begins_with_action_verb("Write a short story"));
        assert!(begins_with_action_verb("  Summarize: the article below"));
        assert!(begins_with_action_verb("\"Explain\" recursion"));
        assert!(!begins_with_action_verb("I need a short story"));
        assert!(!begins_with_action_verb(""));
    }

    #[test]
    fn test_example_indicators() {
        assert_eq!(count_example_indicators("No examples here at all"), 0);
        assert_eq!(count_example_indicators("For example, a cat"), 1);
        assert_eq!(
            count_example_indicators("Use fruit such as apples, e.g. Granny Smith"),
            2
        );
        assert_eq!(count_example_indicators("Example: hello"), 1);
    }

    #[test]
    fn test_paired_io_markers() {
        assert!(has_paired_io_markers("Input: 2+2\nOutput: 4"));
        assert!(has_paired_io_markers("Question: why?\n  Answer: because"));
        assert!(!has_paired_io_markers("Input: 2+2 with no answer"));
    }

    #[test]
    fn test_explicit_structure() {
        assert!(has_explicit_structure("First do this.\nThen do that."));
        assert!(has_explicit_structure("1. Collect data"));
        assert!(has_explicit_structure("- gather requirements"));
        assert!(!has_explicit_structure("A single flat sentence."));
        assert!(!has_explicit_structure("Trailing newline only\n"));
    }
}
