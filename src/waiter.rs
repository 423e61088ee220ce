//! Waiting for asynchronously provisioned resources.
//!
//! Most IaaS operations return before the resource is usable: a volume is
//! `creating`, a flexible GPU is `attaching`. A [`Waiter`] polls a
//! [`Refresh`] until the reported state is a target state, a failed state is
//! seen, the timeout elapses or the caller cancels.
//!
//! # Example
//!
//! ```ignore
//! use hemmer_resource_waiter::{Observation, StateClassification, WaitConfig, Waiter};
//!
//! let waiter = Waiter::new(
//!     format!("flexible GPU {}", id),
//!     StateClassification::new(["attaching", "detaching"], ["allocated", "attached"]),
//!     WaitConfig::default(),
//! )?;
//!
//! let gpu = waiter
//!     .wait(|| async {
//!         let gpu = client.read_flexible_gpu(&id).await?;
//!         Ok::<_, ApiError>(Observation::found(gpu.state.clone(), gpu))
//!     })
//!     .await?;
//! ```

use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::clock::{after, pause_until, Pause};
use crate::config::WaitConfig;
use crate::error::WaitError;
use crate::refresh::{Observation, Refresh};
use crate::state::{StateClass, StateClassification, UnlistedStatePolicy};

/// The outcome of a wait, as a plain tagged union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult<T> {
    /// The resource reached a target state.
    Success(T),
    /// The wait stopped for a reason other than the timeout.
    Failure(String),
    /// The resource did not converge in time.
    Timeout,
}

impl<T> PollResult<T> {
    /// Whether the wait succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<T> From<Result<T, WaitError>> for PollResult<T> {
    fn from(result: Result<T, WaitError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) if err.is_timeout() => Self::Timeout,
            Err(err) => Self::Failure(err.to_string()),
        }
    }
}

/// Polls a resource until its state converges.
///
/// A waiter is cheap to build and is meant to be created for each wait.
#[derive(Debug, Clone)]
pub struct Waiter {
    resource: String,
    states: StateClassification,
    config: WaitConfig,
    cancel: CancellationToken,
}

/// Mutable bookkeeping for one run of [`Waiter::wait`].
struct Progress {
    attempts: u32,
    last_state: Option<String>,
    not_found: u32,
    target_seen: u32,
}

impl Waiter {
    /// Create a waiter, validating the state sets and configuration.
    pub fn new(
        resource: impl Into<String>,
        states: StateClassification,
        config: WaitConfig,
    ) -> Result<Self, WaitError> {
        states.validate()?;
        config.validate()?;
        Ok(Self {
            resource: resource.into(),
            states,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort the wait when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The resource description used in errors and logs.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The state classification this waiter applies.
    pub fn states(&self) -> &StateClassification {
        &self.states
    }

    /// The timing configuration this waiter applies.
    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Poll `refresh` until the resource reaches a target state.
    ///
    /// Returns the last-read resource on success. Read errors are returned on
    /// first occurrence and never retried.
    #[instrument(skip_all, fields(resource = %self.resource))]
    pub async fn wait<T, R>(&self, mut refresh: R) -> Result<T, WaitError>
    where
        R: Refresh<T>,
    {
        let deadline = after(self.config.timeout);
        let mut progress = Progress {
            attempts: 0,
            last_state: None,
            not_found: 0,
            target_seen: 0,
        };

        if !self.config.initial_delay.is_zero() {
            self.pause(after(self.config.initial_delay), deadline, &progress)
                .await?;
        }

        loop {
            progress.attempts += 1;
            let observation = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.cancelled()),
                read = timeout_at(deadline, refresh.refresh()) => match read {
                    Ok(result) => result.map_err(|source| WaitError::Read {
                        resource: self.resource.clone(),
                        source,
                    })?,
                    Err(_) => return Err(self.timed_out(&progress)),
                },
            };

            if let Some(resource) = self.observe(observation, &mut progress)? {
                info!(attempts = progress.attempts, "Resource reached target state");
                return Ok(resource);
            }

            self.pause(after(self.config.poll_interval), deadline, &progress)
                .await?;
        }
    }

    /// Apply one observation. Returns the resource once the wait is over.
    fn observe<T>(
        &self,
        observation: Observation<T>,
        progress: &mut Progress,
    ) -> Result<Option<T>, WaitError> {
        let (resource, state) = match observation {
            Observation::Found { resource, state } => (resource, state),
            Observation::NotFound => {
                progress.not_found += 1;
                progress.target_seen = 0;
                debug!(
                    attempt = progress.attempts,
                    not_found = progress.not_found,
                    "Resource not found"
                );
                if progress.not_found > self.config.not_found_checks {
                    return Err(WaitError::NotFound {
                        resource: self.resource.clone(),
                        checks: progress.not_found,
                    });
                }
                return Ok(None);
            },
        };

        progress.not_found = 0;
        debug!(attempt = progress.attempts, state = %state, "Polled resource state");

        let outcome = match self.states.classify(&state) {
            StateClass::Target => {
                progress.target_seen += 1;
                if progress.target_seen >= self.config.target_occurrences {
                    Some(resource)
                } else {
                    None
                }
            },
            StateClass::Pending => {
                progress.target_seen = 0;
                None
            },
            StateClass::Failed => {
                warn!(state = %state, "Resource entered a failure state");
                return Err(WaitError::Failed {
                    resource: self.resource.clone(),
                    state,
                });
            },
            StateClass::Unlisted => match self.states.on_unlisted {
                UnlistedStatePolicy::Fail => {
                    warn!(state = %state, "Resource reported an unexpected state");
                    return Err(WaitError::UnexpectedState {
                        resource: self.resource.clone(),
                        state,
                        expected: self.states.target_states(),
                    });
                },
                UnlistedStatePolicy::KeepWaiting => {
                    progress.target_seen = 0;
                    None
                },
            },
        };

        progress.last_state = Some(state);
        Ok(outcome)
    }

    /// Sleep until `until`, or fail if the deadline comes first or the wait is cancelled.
    async fn pause(
        &self,
        until: Instant,
        deadline: Instant,
        progress: &Progress,
    ) -> Result<(), WaitError> {
        match pause_until(&self.cancel, until, deadline).await {
            Pause::Resume => Ok(()),
            Pause::Expired => Err(self.timed_out(progress)),
            Pause::Cancelled => Err(self.cancelled()),
        }
    }

    fn timed_out(&self, progress: &Progress) -> WaitError {
        warn!(
            attempts = progress.attempts,
            last_state = progress.last_state.as_deref().unwrap_or("unknown"),
            "Timed out waiting for resource"
        );
        WaitError::Timeout {
            resource: self.resource.clone(),
            timeout: self.config.timeout,
            last_state: progress.last_state.clone(),
            attempts: progress.attempts,
        }
    }

    fn cancelled(&self) -> WaitError {
        debug!("Wait cancelled");
        WaitError::Cancelled {
            resource: self.resource.clone(),
        }
    }
}
