//! Prompt content: model, parsing, schema validation and diffing.

mod diff;
mod parser;
mod schema;

pub use diff::diff;
pub use parser::{ContentError, PromptContent};
pub use schema::{validate_content_schema, SchemaError};
