//! Testing utilities for code that waits on resources.
//!
//! [`ScriptedRefresh`] replays a fixed sequence of reads so a wait can be
//! exercised without a live API. Combined with tokio's paused clock, a test
//! runs instantly while still observing the configured intervals.
//!
//! # Example
//!
//! ```ignore
//! use hemmer_resource_waiter::testing::{Script, ScriptedRefresh};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_volume_becomes_available() {
//!     let refresh = ScriptedRefresh::new([
//!         Script::state("creating"),
//!         Script::state("available"),
//!     ]);
//!     let calls = refresh.calls();
//!
//!     let read = waiter.wait(refresh).await.unwrap();
//!
//!     assert_eq!(read, 2);
//!     assert_eq!(calls.get(), 2);
//! }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::diagnostic::{Diagnostic, DiagnosticSeverity};
use crate::error::{BoxError, WaitError};
use crate::refresh::{Observation, Refresh};

/// One scripted read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// The resource exists in the given state.
    State(String),
    /// The resource does not exist.
    NotFound,
    /// The read fails with the given message.
    Error(String),
}

impl Script {
    /// A read reporting `state`.
    pub fn state(state: impl Into<String>) -> Self {
        Self::State(state.into())
    }

    /// A read failing with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// A shared count of reads made by a [`ScriptedRefresh`].
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    /// The number of reads made so far.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// A [`Refresh`] that replays scripted reads.
///
/// The resource returned by each successful read is the 1-based number of
/// the call that produced it, so tests can tell which read a wait returned.
/// Once the script runs out, every further read fails.
#[derive(Debug, Clone)]
pub struct ScriptedRefresh {
    script: VecDeque<Script>,
    repeat: Option<Script>,
    calls: CallCounter,
}

impl ScriptedRefresh {
    /// Replay `script` in order.
    pub fn new(script: impl IntoIterator<Item = Script>) -> Self {
        Self {
            script: script.into_iter().collect(),
            repeat: None,
            calls: CallCounter::default(),
        }
    }

    /// Return `script` on every read.
    pub fn repeat(script: Script) -> Self {
        Self {
            script: VecDeque::new(),
            repeat: Some(script),
            calls: CallCounter::default(),
        }
    }

    /// A handle on the number of reads made.
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait::async_trait]
impl Refresh<u32> for ScriptedRefresh {
    async fn refresh(&mut self) -> Result<Observation<u32>, BoxError> {
        let call = self.calls.increment();
        let next = self.script.pop_front().or_else(|| self.repeat.clone());
        match next {
            Some(Script::State(state)) => Ok(Observation::found(state, call)),
            Some(Script::NotFound) => Ok(Observation::NotFound),
            Some(Script::Error(message)) => Err(message.into()),
            None => Err(format!("script exhausted after {} reads", call - 1).into()),
        }
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a wait timed out with the given last-known state.
///
/// # Panics
///
/// Panics if the error is not a timeout or the last state differs.
pub fn assert_timed_out(err: &WaitError, last_state: Option<&str>) {
    assert!(err.is_timeout(), "Expected a timeout, but got: {}", err);
    assert_eq!(
        err.last_state(),
        last_state,
        "Timeout reported an unexpected last state"
    );
}

/// Assert that a wait failed because its read failed.
///
/// # Panics
///
/// Panics if the error is not a read error or its message lacks `substring`.
pub fn assert_read_failed(err: &WaitError, substring: &str) {
    assert!(err.is_read_error(), "Expected a read error, but got: {}", err);
    assert!(
        err.to_string().contains(substring),
        "Expected read error containing '{}', but got: {}",
        substring,
        err
    );
}

/// Assert that a wait error is reported to the user with the given severity
/// and a summary containing `substring`.
///
/// # Panics
///
/// Panics if the diagnostic built from `err` differs.
pub fn assert_diagnostic(err: &WaitError, severity: DiagnosticSeverity, substring: &str) {
    let diagnostic = Diagnostic::from(err);
    assert_eq!(
        diagnostic.severity, severity,
        "Unexpected severity for diagnostic: {:?}",
        diagnostic
    );
    assert!(
        diagnostic.summary.contains(substring),
        "Expected a diagnostic summary containing '{}', but got: {}",
        substring,
        diagnostic.summary
    );
}
