//! Diagnostics reported to the end user when a wait fails.
//!
//! A cancelled wait is reported as a warning: the resource may still
//! converge, the provider just stopped watching it.

use serde::{Deserialize, Serialize};

use crate::error::WaitError;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// The wait was abandoned without a verdict on the resource.
    Warning,
}

/// A diagnostic message for the provider to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<&WaitError> for Diagnostic {
    fn from(err: &WaitError) -> Self {
        let resource = err.resource().unwrap_or("resource");
        let summary = match err {
            WaitError::Read { .. } => format!("Unable to read {}", resource),
            WaitError::Timeout { .. } => {
                format!("Timed out waiting for {} to become available", resource)
            },
            WaitError::Failed { .. } | WaitError::UnexpectedState { .. } => {
                format!("{} is in an unusable state", resource)
            },
            WaitError::NotFound { .. } => format!("{} was not found", resource),
            WaitError::Cancelled { .. } => format!("Wait for {} was cancelled", resource),
            WaitError::RetriesExhausted { .. } => format!("Unable to operate on {}", resource),
            WaitError::InvalidStates(_) | WaitError::Configuration(_) => {
                "Invalid wait configuration".to_string()
            },
        };

        let mut detail = err.to_string();
        if let Some(state) = err.last_state() {
            detail.push_str(&format!("\nLast known state: {}", state));
        }

        let diagnostic = if err.is_cancelled() {
            Diagnostic::warning(summary)
        } else {
            Diagnostic::error(summary)
        };
        diagnostic.with_detail(detail)
    }
}

impl From<WaitError> for Diagnostic {
    fn from(err: WaitError) -> Self {
        Self::from(&err)
    }
}
