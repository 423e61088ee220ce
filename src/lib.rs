//! Hemmer Resource Waiter
//!
//! Helpers for Hemmer providers whose resources are provisioned
//! asynchronously. IaaS APIs typically accept a request and return a
//! resource in a transitional state (`creating`, `attaching`, `pending`);
//! the provider must then poll until the resource is usable before writing
//! it to state.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Waiter**: polls a caller-supplied read until the state converges
//! - **StateClassification**: pending, target and failed state sets
//! - **WaitConfig**: poll interval and timeout, passed explicitly
//! - **Lifecycles**: state tables for common resources and the create, read
//!   and delete waits built on them
//! - **Retry helper**: repeats calls rejected with transient API errors
//! - **Error types**: a typed `WaitError`, convertible to a gRPC status or a
//!   user-facing diagnostic
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use hemmer_resource_waiter::{
//!     wait_until_available, Lifecycle, Observation, WaitConfig, CancellationToken,
//! };
//!
//! async fn create_volume(client: &Client, size: u32) -> Result<Volume, WaitError> {
//!     let created = client.create_volume(size).await?;
//!     wait_until_available(
//!         &Lifecycle::volume(),
//!         &created.id,
//!         WaitConfig::default(),
//!         &CancellationToken::new(),
//!         || async {
//!             let volume = client.read_volume(&created.id).await?;
//!             Ok::<_, ApiError>(Observation::found(volume.state.clone(), volume))
//!         },
//!     )
//!     .await
//! }
//! ```
//!
//! # Outcomes
//!
//! A wait ends in exactly one of:
//!
//! - the last-read resource, once a target state is observed
//! - [`WaitError::Read`] as soon as a read fails (reads are never retried)
//! - [`WaitError::Failed`] or [`WaitError::UnexpectedState`] on a failed or unlisted state
//! - [`WaitError::Timeout`] with the last known state
//! - [`WaitError::Cancelled`] when the caller's token is cancelled

#![warn(missing_docs)]
#![warn(clippy::all)]

mod clock;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod refresh;
pub mod retry;
pub mod state;
pub mod testing;
pub mod waiter;

// Re-export main types at crate root
pub use config::{WaitConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, MAX_DURATION};
pub use diagnostic::{Diagnostic, DiagnosticSeverity};
pub use error::{BoxError, WaitError};
pub use lifecycle::{wait_until_available, wait_until_deleted, wait_until_state_valid, Lifecycle};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use refresh::{Observation, Refresh};
pub use retry::{retry_until_available, ApiError, Transient};
pub use state::{StateClass, StateClassification, UnlistedStatePolicy};
pub use waiter::{PollResult, Waiter};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use tokio_util::sync::CancellationToken;
pub use tracing;
