//! Capability descriptors and the name-indexed registry used for selection.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ChainError;

/// Points awarded per exactly-matching keyword.
pub const KEYWORD_MATCH_WEIGHT: f64 = 2.0;

/// A named unit of work that can be placed in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// A registry entry together with its keyword score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilityMatch<'a> {
    pub descriptor: &'a CapabilityDescriptor,
    pub score: f64,
}

/// Capabilities indexed by unique name, iterated in registration order.
///
/// Populated once during startup and read-only afterwards, so it can be
/// shared across concurrent chains behind an `Arc` without locking.
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: IndexMap<String, CapabilityDescriptor>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a discovered catalog, skipping rejected entries.
    pub fn from_catalog<I>(catalog: I) -> Self
    where
        I: IntoIterator<Item = CapabilityDescriptor>,
    {
        let mut registry = Self::new();
        for descriptor in catalog {
            let name = descriptor.name.clone();
            if let Err(e) = registry.add(descriptor) {
                warn!(capability = %name, error = %e, "skipping capability");
            }
        }
        registry
    }

    /// Register a capability. The first registration of a name wins.
    pub fn add(&mut self, descriptor: CapabilityDescriptor) -> Result<(), ChainError> {
        if descriptor.name.is_empty() {
            return Err(ChainError::Validation(
                "capability name cannot be empty".to_string(),
            ));
        }
        if self.capabilities.contains_key(&descriptor.name) {
            return Err(ChainError::Validation(format!(
                "capability {:?} already registered",
                descriptor.name
            )));
        }
        debug!(capability = %descriptor.name, "registered capability");
        self.capabilities.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.capabilities.get(name)
    }

    /// All descriptors in registration order.
    pub fn all(&self) -> Vec<&CapabilityDescriptor> {
        self.capabilities.values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.capabilities.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Rank capabilities by how many of their keywords appear in `keywords`.
    ///
    /// Matching is exact string equality. Zero-score capabilities are
    /// dropped; equal scores keep registration order.
    pub fn match_keywords(&self, keywords: &[String]) -> Vec<CapabilityMatch<'_>> {
        if keywords.is_empty() {
            return Vec::new();
        }
        let wanted: HashSet<&str> = keywords.iter().map(String::as_str).collect();

        let mut matches: Vec<CapabilityMatch<'_>> = self
            .iter()
            .filter_map(|descriptor| {
                let score = match_score(&descriptor.keywords, &wanted);
                (score > 0.0).then_some(CapabilityMatch { descriptor, score })
            })
            .collect();

        // sort_by is stable: ties stay in registration order.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }
}

fn match_score(capability_keywords: &[String], wanted: &HashSet<&str>) -> f64 {
    capability_keywords
        .iter()
        .filter(|kw| wanted.contains(kw.as_str()))
        .count() as f64
        * KEYWORD_MATCH_WEIGHT
}
