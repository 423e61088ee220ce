//! Error types for waiting on resource state.

use std::time::Duration;

use thiserror::Error;

/// A boxed error returned by a refresh or retried operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while waiting for a resource to converge.
#[derive(Debug, Error)]
pub enum WaitError {
    /// Reading the resource failed. Read errors are never retried.
    #[error("Error reading {resource}: {source}")]
    Read {
        /// The resource being waited on.
        resource: String,
        /// The underlying read failure.
        #[source]
        source: BoxError,
    },

    /// The resource did not reach a target state before the timeout.
    #[error(
        "Timed out after {timeout:?} waiting for {resource} to become available (last state: {})",
        .last_state.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        /// The resource being waited on.
        resource: String,
        /// The configured timeout.
        timeout: Duration,
        /// The last state observed, if any read succeeded.
        last_state: Option<String>,
        /// How many reads were made.
        attempts: u32,
    },

    /// The resource entered a state classified as failed.
    #[error("{resource} entered failure state {state:?}")]
    Failed {
        /// The resource being waited on.
        resource: String,
        /// The failed state.
        state: String,
    },

    /// The resource reported a state that is neither pending, target nor failed.
    #[error("{resource} reported unexpected state {state:?} (expected one of {expected:?})")]
    UnexpectedState {
        /// The resource being waited on.
        resource: String,
        /// The unexpected state.
        state: String,
        /// The target states the waiter was looking for.
        expected: Vec<String>,
    },

    /// The resource could not be found.
    #[error("{resource} not found after {checks} consecutive reads")]
    NotFound {
        /// The resource being waited on.
        resource: String,
        /// How many consecutive reads returned nothing.
        checks: u32,
    },

    /// The wait was cancelled by the caller.
    #[error("Wait for {resource} was cancelled")]
    Cancelled {
        /// The resource being waited on.
        resource: String,
    },

    /// A retried operation kept failing transiently until the timeout.
    #[error("Gave up on {resource} after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// The resource being operated on.
        resource: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last transient failure.
        #[source]
        source: BoxError,
    },

    /// The pending, target and failed state sets are invalid.
    #[error("Invalid state classification: {0}")]
    InvalidStates(String),

    /// The wait configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl WaitError {
    /// Whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether this error came from the refresh operation itself.
    pub fn is_read_error(&self) -> bool {
        matches!(self, Self::Read { .. })
    }

    /// Whether the wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The last state observed before the wait stopped, when known.
    pub fn last_state(&self) -> Option<&str> {
        match self {
            Self::Timeout { last_state, .. } => last_state.as_deref(),
            Self::Failed { state, .. } | Self::UnexpectedState { state, .. } => Some(state),
            _ => None,
        }
    }

    /// The resource the error refers to, if it is tied to one.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Self::Read { resource, .. }
            | Self::Timeout { resource, .. }
            | Self::Failed { resource, .. }
            | Self::UnexpectedState { resource, .. }
            | Self::NotFound { resource, .. }
            | Self::Cancelled { resource }
            | Self::RetriesExhausted { resource, .. } => Some(resource),
            Self::InvalidStates(_) | Self::Configuration(_) => None,
        }
    }
}

impl From<WaitError> for tonic::Status {
    fn from(err: WaitError) -> Self {
        let msg = err.to_string();
        match err {
            WaitError::Read { .. } | WaitError::RetriesExhausted { .. } => {
                tonic::Status::unavailable(msg)
            },
            WaitError::Timeout { .. } => tonic::Status::deadline_exceeded(msg),
            WaitError::Failed { .. } | WaitError::UnexpectedState { .. } => {
                tonic::Status::failed_precondition(msg)
            },
            WaitError::NotFound { .. } => tonic::Status::not_found(msg),
            WaitError::Cancelled { .. } => tonic::Status::cancelled(msg),
            WaitError::InvalidStates(_) => tonic::Status::invalid_argument(msg),
            WaitError::Configuration(_) => tonic::Status::failed_precondition(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout(last_state: Option<&str>) -> WaitError {
        WaitError::Timeout {
            resource: "volume vol-1".to_string(),
            timeout: Duration::from_secs(60),
            last_state: last_state.map(str::to_string),
            attempts: 20,
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            timeout(Some("creating")).to_string(),
            "Timed out after 60s waiting for volume vol-1 to become available (last state: creating)"
        );
        assert!(timeout(None).to_string().ends_with("(last state: unknown)"));

        let err = WaitError::Failed {
            resource: "snapshot snap-1".to_string(),
            state: "error".to_string(),
        };
        assert_eq!(err.to_string(), "snapshot snap-1 entered failure state \"error\"");

        let err = WaitError::Read {
            resource: "vpc vpc-1".to_string(),
            source: "connection reset".into(),
        };
        assert_eq!(err.to_string(), "Error reading vpc vpc-1: connection reset");
    }

    #[test]
    fn test_error_accessors() {
        let err = timeout(Some("pending"));
        assert!(err.is_timeout());
        assert!(!err.is_read_error());
        assert_eq!(err.last_state(), Some("pending"));
        assert_eq!(err.resource(), Some("volume vol-1"));

        let err = WaitError::InvalidStates("empty target".to_string());
        assert_eq!(err.resource(), None);
        assert_eq!(err.last_state(), None);
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = timeout(None).into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);

        let status: tonic::Status = WaitError::Read {
            resource: "r".to_string(),
            source: "boom".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::Unavailable);

        let status: tonic::Status = WaitError::Failed {
            resource: "r".to_string(),
            state: "error".to_string(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = WaitError::NotFound {
            resource: "r".to_string(),
            checks: 1,
        }
        .into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = WaitError::Cancelled {
            resource: "r".to_string(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::Cancelled);

        let status: tonic::Status = WaitError::InvalidStates("overlap".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert!(status.message().contains("overlap"));
    }
}
