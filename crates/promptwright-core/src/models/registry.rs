//! Capability registry of known models.
//!
//! The registry is filled once at startup and read many times afterwards.
//! It does no locking of its own; callers that allow registration after
//! startup wrap it in a lock so registration excludes concurrent selection.

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::selector::{self, SelectionError};
use super::{catalog, Capability, ModelDescriptor, Priority};

/// Errors from registering models.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Model already registered: {0}")]
    DuplicateModel(String),

    #[error("Invalid model descriptor '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },
}

/// Table of model descriptors keyed by model id.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    models: BTreeMap<String, ModelDescriptor>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-filled with the built-in model catalog.
    pub fn with_builtin_models() -> Self {
        let mut registry = Self::new();
        for model in catalog::builtin_models() {
            registry.models.insert(model.id.clone(), model);
        }
        registry
    }

    /// Register a model.
    ///
    /// Fails if a model with the same id is already present, or if the
    /// descriptor has an empty id/provider or a negative/non-finite cost.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<(), RegistryError> {
        validate_descriptor(&descriptor)?;

        if self.models.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateModel(descriptor.id));
        }

        tracing::debug!(
            model = %descriptor.id,
            provider = %descriptor.provider_id,
            "Registered model"
        );
        self.models.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Look up a model by id.
    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    /// Check if a model id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// All models in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }

    /// Select the best model across all providers.
    pub fn select(
        &self,
        required: &BTreeSet<Capability>,
        max_cost: Option<f64>,
        priority: Priority,
    ) -> Result<&ModelDescriptor, SelectionError> {
        selector::select(self.models.values(), required, max_cost, priority)
    }

    /// Select the best model served by one provider.
    pub fn select_for_provider(
        &self,
        provider_id: &str,
        required: &BTreeSet<Capability>,
        max_cost: Option<f64>,
        priority: Priority,
    ) -> Result<&ModelDescriptor, SelectionError> {
        let candidates = self
            .models
            .values()
            .filter(|m| m.provider_id == provider_id);

        selector::select(candidates, required, max_cost, priority).map_err(|_| {
            SelectionError::NoEligibleModel(format!(
                "provider '{}' has no model with capabilities {}",
                provider_id,
                selector::describe_requirements(required, max_cost)
            ))
        })
    }
}

fn validate_descriptor(descriptor: &ModelDescriptor) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidDescriptor {
        id: descriptor.id.clone(),
        reason: reason.to_string(),
    };

    if descriptor.id.trim().is_empty() {
        return Err(invalid("id must not be empty"));
    }
    if descriptor.provider_id.trim().is_empty() {
        return Err(invalid("provider_id must not be empty"));
    }
    if !descriptor.cost_per_million_tokens.is_finite() || descriptor.cost_per_million_tokens < 0.0
    {
        return Err(invalid("cost must be a finite, non-negative number"));
    }
    Ok(())
}
