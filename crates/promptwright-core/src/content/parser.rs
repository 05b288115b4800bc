//! Prompt content model and parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_content_schema;

/// Errors that can occur when loading content.
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Failed to read content file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schema validation failed: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// A structured instruction set for a generative model.
///
/// Every optional field is treated as absent when it is `None` or contains
/// only whitespace. Use the accessor methods rather than the raw fields
/// when that distinction matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptContent {
    /// Persona the model should adopt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The task instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,

    /// Named prompting framework (e.g. "CO-STAR")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    /// Constraints the response must respect
    #[serde(default)]
    pub guardrails: Vec<String>,

    /// Background material and worked examples
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Free-form annotations from the content supplier
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PromptContent {
    /// Create content from a bare directive.
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: Some(directive.into()),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    pub fn with_guardrail(mut self, guardrail: impl Into<String>) -> Self {
        self.guardrails.push(guardrail.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The role, if present and non-blank.
    pub fn role(&self) -> Option<&str> {
        present(&self.role)
    }

    /// The directive, if present and non-blank.
    pub fn directive(&self) -> Option<&str> {
        present(&self.directive)
    }

    /// The framework, if present and non-blank.
    pub fn framework(&self) -> Option<&str> {
        present(&self.framework)
    }

    /// The context, if present and non-blank.
    pub fn context(&self) -> Option<&str> {
        present(&self.context)
    }

    /// Non-blank guardrails, in order.
    pub fn guardrail_items(&self) -> impl Iterator<Item = &str> {
        self.guardrails
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
    }

    /// Number of non-blank guardrails.
    pub fn guardrail_count(&self) -> usize {
        self.guardrail_items().count()
    }

    /// Render the content as a single prompt text.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if let Some(role) = self.role() {
            sections.push(format!("## Role\n{}", role));
        }
        if let Some(framework) = self.framework() {
            sections.push(format!("## Framework\n{}", framework));
        }
        if let Some(directive) = self.directive() {
            sections.push(format!("## Directive\n{}", directive));
        }
        if let Some(context) = self.context() {
            sections.push(format!("## Context\n{}", context));
        }

        let guardrails: Vec<String> = self
            .guardrail_items()
            .map(|g| format!("- {}", g))
            .collect();
        if !guardrails.is_empty() {
            sections.push(format!("## Guardrails\n{}", guardrails.join("\n")));
        }

        sections.join("\n\n")
    }

    /// Parse content from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ContentError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse content from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse content from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse content from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Build content from an already-parsed JSON value.
    ///
    /// The value is checked against the content schema before
    /// deserialization; unknown keys are ignored.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ContentError> {
        validate_content_schema(&value).map_err(ContentError::SchemaViolation)?;
        let content: PromptContent = serde_json::from_value(value)?;
        content.validate()?;
        Ok(content)
    }

    fn validate(&self) -> Result<(), ContentError> {
        if self.directive().is_none() {
            return Err(ContentError::MissingField("directive".to_string()));
        }
        Ok(())
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONTENT: &str = r#"
role: "Senior data analyst"
directive: "Summarize the quarterly sales figures"
framework: "CO-STAR"
guardrails:
  - "Use only the supplied data"
  - "Keep it under 200 words"
metadata:
  source: "wizard"
"#;

    #[test]
    fn test_parse_valid_content() {
        let content = PromptContent::from_yaml(VALID_CONTENT).unwrap();
        assert_eq!(content.role(), Some("Senior data analyst"));
        assert_eq!(content.framework(), Some("CO-STAR"));
        assert_eq!(content.guardrail_count(), 2);
        assert_eq!(content.metadata["source"], "wizard");
    }

    #[test]
    fn test_parse_json_content() {
        let content =
            PromptContent::from_json(r#"{"directive": "Draft an email", "guardrails": []}"#)
                .unwrap();
        assert_eq!(content.directive(), Some("Draft an email"));
        assert!(content.role().is_none());
    }

    #[test]
    fn test_missing_directive_rejected() {
        let result = PromptContent::from_yaml("role: \"Analyst\"\n");
        assert!(matches!(result, Err(ContentError::SchemaViolation(_))));
    }

    #[test]
    fn test_blank_directive_rejected() {
        let result = PromptContent::from_json(r#"{"directive": "   "}"#);
        assert!(matches!(result, Err(ContentError::MissingField(_))));
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let content = PromptContent::new("Do it")
            .with_role("  ")
            .with_guardrail("")
            .with_guardrail("Be brief");
        assert!(content.role().is_none());
        assert_eq!(content.guardrail_count(), 1);
    }

    #[test]
    fn test_render_sections_in_order() {
        let content = PromptContent::new("Write a haiku")
            .with_role("Poet")
            .with_guardrail("Five-seven-five");
        let rendered = content.render();

        let role_at = rendered.find("## Role").unwrap();
        let directive_at = rendered.find("## Directive").unwrap();
        let guardrails_at = rendered.find("## Guardrails").unwrap();
        assert!(role_at < directive_at && directive_at < guardrails_at);
        assert!(rendered.contains("- Five-seven-five"));
        assert!(!rendered.contains("## Framework"));
    }

    #[test]
    fn test_serialization_skips_absent_fields() {
        let json = serde_json::to_value(PromptContent::new("Plan")).unwrap();
        assert!(json.get("role").is_none());
        assert_eq!(json["directive"], "Plan");
    }
}
