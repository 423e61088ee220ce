//! The read capability a waiter polls.
//!
//! A [`Refresh`] performs one read of the resource and reports what it saw.
//! Any async closure returning `Result<Observation<T>, E>` implements it, so
//! CRUD handlers usually pass a closure around their API client:
//!
//! ```ignore
//! let volume = waiter
//!     .wait(|| async {
//!         let volume = client.read_volume(&id).await?;
//!         Ok::<_, ApiError>(Observation::found(volume.state.clone(), volume))
//!     })
//!     .await?;
//! ```

use std::future::Future;

use crate::error::BoxError;

/// The outcome of a single successful read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T> {
    /// The resource exists and is in `state`.
    Found {
        /// The full resource as returned by the API.
        resource: T,
        /// The resource's lifecycle state.
        state: String,
    },
    /// The API reported that the resource does not exist.
    NotFound,
}

impl<T> Observation<T> {
    /// Create an observation of an existing resource.
    pub fn found(state: impl Into<String>, resource: T) -> Self {
        Self::Found {
            resource,
            state: state.into(),
        }
    }

    /// The observed state, if the resource exists.
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Found { state, .. } => Some(state),
            Self::NotFound => None,
        }
    }

    /// Map the observed resource, keeping the state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Observation<U> {
        match self {
            Self::Found { resource, state } => Observation::Found {
                resource: f(resource),
                state,
            },
            Self::NotFound => Observation::NotFound,
        }
    }
}

/// A single read of a resource's current state.
#[async_trait::async_trait]
pub trait Refresh<T>: Send {
    /// Read the resource once.
    async fn refresh(&mut self) -> Result<Observation<T>, BoxError>;
}

#[async_trait::async_trait]
impl<T, E, F, Fut> Refresh<T> for F
where
    T: Send,
    E: Into<BoxError>,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Observation<T>, E>> + Send,
{
    async fn refresh(&mut self) -> Result<Observation<T>, BoxError> {
        (self)().await.map_err(Into::into)
    }
}
