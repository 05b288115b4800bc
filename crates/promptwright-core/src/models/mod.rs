//! Model capability descriptors, registry and selection.

mod catalog;
mod registry;
mod selector;

pub use registry::{CapabilityRegistry, RegistryError};
pub use selector::{provider_reputation, select, SelectionError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A named feature a model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Streaming,
    FunctionCalling,
    Vision,
    LongContext,
    StructuredOutput,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Streaming => "streaming",
            Capability::FunctionCalling => "function-calling",
            Capability::Vision => "vision",
            Capability::LongContext => "long-context",
            Capability::StructuredOutput => "structured-output",
        };
        f.write_str(name)
    }
}

/// Relative latency class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedClass {
    Fast,
    Medium,
    Slow,
}

impl SpeedClass {
    /// Fixed ordering used by speed-priority selection (lower is faster).
    pub fn rank(&self) -> u8 {
        match self {
            SpeedClass::Fast => 1,
            SpeedClass::Medium => 2,
            SpeedClass::Slow => 3,
        }
    }
}

/// What a request optimizes for when choosing a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Speed,
    #[default]
    Quality,
    Cost,
}

/// Static description of a model and what it can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model identifier as the provider knows it
    pub id: String,

    /// Provider family serving this model
    pub provider_id: String,

    /// Supported capabilities
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,

    /// Price in USD per million tokens
    #[serde(default)]
    pub cost_per_million_tokens: f64,

    /// Latency class
    pub speed_class: SpeedClass,

    /// Context window size
    pub max_context_tokens: u32,
}

impl ModelDescriptor {
    /// Create a descriptor with no capabilities, zero cost and medium speed.
    pub fn new(id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider_id: provider_id.into(),
            capabilities: BTreeSet::new(),
            cost_per_million_tokens: 0.0,
            speed_class: SpeedClass::Medium,
            max_context_tokens: 8_192,
        }
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    pub fn with_cost(mut self, cost_per_million_tokens: f64) -> Self {
        self.cost_per_million_tokens = cost_per_million_tokens;
        self
    }

    pub fn with_speed(mut self, speed_class: SpeedClass) -> Self {
        self.speed_class = speed_class;
        self
    }

    pub fn with_max_context(mut self, max_context_tokens: u32) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    /// Whether this model supports a capability.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether this model supports every capability in `required`.
    pub fn supports_all(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }

    /// Estimated cost in USD for a number of tokens.
    pub fn estimate_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * self.cost_per_million_tokens / 1_000_000.0
    }
}
