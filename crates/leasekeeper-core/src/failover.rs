use std::collections::BTreeSet;

use rand::seq::SliceRandom;

use crate::error::{LeaseError, Result};
use crate::registry::RegistryEndpoint;

/// Picks registry endpoints for one failover sequence.
///
/// An endpoint marked as tried is never handed out again by the same
/// selector. Once every candidate has been tried the sequence is exhausted
/// for good; callers start a new selector to try the set again.
#[derive(Debug, Clone)]
pub struct FailoverSelector {
    candidates: Vec<RegistryEndpoint>,
    tried: BTreeSet<RegistryEndpoint>,
}

impl FailoverSelector {
    /// Create a selector over the candidate set. Duplicates are collapsed.
    pub fn new(candidates: impl IntoIterator<Item = RegistryEndpoint>) -> Self {
        let unique: BTreeSet<RegistryEndpoint> = candidates.into_iter().collect();
        Self {
            candidates: unique.into_iter().collect(),
            tried: BTreeSet::new(),
        }
    }

    /// Number of distinct candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of candidates already tried.
    pub fn tried_count(&self) -> usize {
        self.tried.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.tried.len() >= self.candidates.len()
    }

    /// Pick a uniformly random endpoint that has not been tried yet.
    pub fn pick(&self) -> Result<RegistryEndpoint> {
        let untried: Vec<&RegistryEndpoint> = self
            .candidates
            .iter()
            .filter(|e| !self.tried.contains(*e))
            .collect();

        untried
            .choose(&mut rand::thread_rng())
            .map(|e| (*e).clone())
            .ok_or(LeaseError::EndpointsExhausted(self.candidates.len()))
    }

    /// Record that the endpoint failed in this sequence.
    pub fn mark_tried(&mut self, endpoint: &RegistryEndpoint) {
        if self.candidates.contains(endpoint) {
            self.tried.insert(endpoint.clone());
        }
    }
}
