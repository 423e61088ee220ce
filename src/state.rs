//! Classification of resource state strings.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::WaitError;

/// What to do with a state that is in none of the configured sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlistedStatePolicy {
    /// Stop immediately with [`WaitError::UnexpectedState`].
    #[default]
    Fail,
    /// Treat the state as pending, leaving the timeout to end the wait.
    KeepWaiting,
}

/// The class a single state string falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// The operation is still in progress.
    Pending,
    /// The resource is usable.
    Target,
    /// The operation failed on the platform side.
    Failed,
    /// The state is in none of the configured sets.
    Unlisted,
}

/// Partition of state strings into pending, target and failed sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateClassification {
    /// States meaning "not done yet".
    pub pending: BTreeSet<String>,
    /// States meaning "done, proceed".
    pub target: BTreeSet<String>,
    /// States meaning "the operation failed".
    #[serde(default)]
    pub failed: BTreeSet<String>,
    /// Handling of states outside all three sets.
    #[serde(default)]
    pub on_unlisted: UnlistedStatePolicy,
}

impl StateClassification {
    /// Create a classification from pending and target states.
    pub fn new<P, T>(pending: P, target: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            failed: BTreeSet::new(),
            on_unlisted: UnlistedStatePolicy::default(),
        }
    }

    /// Add states that end the wait with a failure.
    pub fn with_failed<F>(mut self, failed: F) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
    {
        self.failed.extend(failed.into_iter().map(Into::into));
        self
    }

    /// Set the policy for unlisted states.
    pub fn with_unlisted_policy(mut self, policy: UnlistedStatePolicy) -> Self {
        self.on_unlisted = policy;
        self
    }

    /// Treat unlisted states as pending.
    pub fn keep_waiting_on_unlisted(self) -> Self {
        self.with_unlisted_policy(UnlistedStatePolicy::KeepWaiting)
    }

    /// Classify a state string.
    pub fn classify(&self, state: &str) -> StateClass {
        if self.target.contains(state) {
            StateClass::Target
        } else if self.pending.contains(state) {
            StateClass::Pending
        } else if self.failed.contains(state) {
            StateClass::Failed
        } else {
            StateClass::Unlisted
        }
    }

    /// The target states, in sorted order.
    pub fn target_states(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }

    /// Check that the sets are disjoint and that there is something to wait for.
    pub fn validate(&self) -> Result<(), WaitError> {
        if self.target.is_empty() {
            return Err(WaitError::InvalidStates(
                "at least one target state is required".to_string(),
            ));
        }

        let overlaps = [
            ("pending", &self.pending, "target", &self.target),
            ("pending", &self.pending, "failed", &self.failed),
            ("target", &self.target, "failed", &self.failed),
        ];
        for (left_name, left, right_name, right) in overlaps {
            if let Some(state) = left.intersection(right).next() {
                return Err(WaitError::InvalidStates(format!(
                    "state {:?} is both {} and {}",
                    state, left_name, right_name
                )));
            }
        }

        Ok(())
    }
}
