//! Built-in model catalog.
//!
//! Pricing per million input tokens (as of Dec 2025).

use super::{Capability, ModelDescriptor, SpeedClass};

const FRONTIER: [Capability; 5] = [
    Capability::Streaming,
    Capability::FunctionCalling,
    Capability::Vision,
    Capability::LongContext,
    Capability::StructuredOutput,
];

pub(super) fn builtin_models() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor::new("claude-opus-4-5", "anthropic")
            .with_capabilities(FRONTIER)
            .with_cost(5.0)
            .with_speed(SpeedClass::Slow)
            .with_max_context(200_000),
        ModelDescriptor::new("claude-sonnet-4-5", "anthropic")
            .with_capabilities(FRONTIER)
            .with_cost(3.0)
            .with_speed(SpeedClass::Medium)
            .with_max_context(200_000),
        ModelDescriptor::new("claude-haiku-4-5", "anthropic")
            .with_capabilities(FRONTIER)
            .with_cost(1.0)
            .with_speed(SpeedClass::Fast)
            .with_max_context(200_000),
        ModelDescriptor::new("gpt-4o", "openai")
            .with_capabilities(FRONTIER)
            .with_cost(2.5)
            .with_speed(SpeedClass::Medium)
            .with_max_context(128_000),
        ModelDescriptor::new("gpt-4o-mini", "openai")
            .with_capabilities(FRONTIER)
            .with_cost(0.15)
            .with_speed(SpeedClass::Fast)
            .with_max_context(128_000),
    ]
}
