//! Deterministic model selection.
//!
//! 1. Keep models whose capabilities are a superset of the required set
//! 2. Keep models at or under `max_cost`, when given
//! 3. Rank survivors by priority and return the first
//!
//! Every ranking ends with a comparison on model id, so the outcome depends
//! only on the candidate set and the inputs, never on iteration order.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use thiserror::Error;

use super::{Capability, ModelDescriptor, Priority};

/// Errors from model selection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("No eligible model: {0}")]
    NoEligibleModel(String),
}

/// Fixed provider reputation weights used by quality-priority ranking.
pub fn provider_reputation(provider_id: &str) -> u8 {
    match provider_id {
        "anthropic" => 95,
        "openai" => 90,
        "google" | "gemini" | "vertex" => 85,
        "mistral" => 75,
        "cohere" => 70,
        "groq" => 65,
        "local" | "ollama" => 40,
        _ => 50,
    }
}

/// Pick the best model among `candidates`.
pub fn select<'a>(
    candidates: impl IntoIterator<Item = &'a ModelDescriptor>,
    required: &BTreeSet<Capability>,
    max_cost: Option<f64>,
    priority: Priority,
) -> Result<&'a ModelDescriptor, SelectionError> {
    candidates
        .into_iter()
        .filter(|m| m.supports_all(required))
        .filter(|m| max_cost.map_or(true, |limit| m.cost_per_million_tokens <= limit))
        .min_by(|a, b| rank(a, b, priority))
        .ok_or_else(|| {
            SelectionError::NoEligibleModel(format!(
                "no model with capabilities {}",
                describe_requirements(required, max_cost)
            ))
        })
}

fn rank(a: &ModelDescriptor, b: &ModelDescriptor, priority: Priority) -> Ordering {
    let by_id = || a.id.cmp(&b.id);
    let by_cost = || a.cost_per_million_tokens.total_cmp(&b.cost_per_million_tokens);

    match priority {
        Priority::Speed => a
            .speed_class
            .rank()
            .cmp(&b.speed_class.rank())
            .then_with(by_cost)
            .then_with(by_id),
        Priority::Cost => by_cost().then_with(by_id),
        Priority::Quality => {
            let long_a = a.supports(Capability::LongContext);
            let long_b = b.supports(Capability::LongContext);
            long_b
                .cmp(&long_a)
                .then_with(|| {
                    provider_reputation(&b.provider_id).cmp(&provider_reputation(&a.provider_id))
                })
                .then_with(by_id)
        }
    }
}

pub(super) fn describe_requirements(
    required: &BTreeSet<Capability>,
    max_cost: Option<f64>,
) -> String {
    let capabilities: Vec<String> = required.iter().map(|c| c.to_string()).collect();
    match max_cost {
        Some(limit) => format!("[{}] at or under ${}/M tokens", capabilities.join(", "), limit),
        None => format!("[{}]", capabilities.join(", ")),
    }
}
