//! Lifecycle states of the platform's resources and the waits CRUD handlers use.
//!
//! A [`Lifecycle`] names the states a resource kind moves through. From it
//! the three waits of a resource's life are derived:
//!
//! - [`wait_until_available`] after create/update, until the resource is usable
//! - [`wait_until_state_valid`] on read, until no transition is in progress
//! - [`wait_until_deleted`] after delete, until the resource is gone

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;

use crate::config::WaitConfig;
use crate::error::{BoxError, WaitError};
use crate::refresh::{Observation, Refresh};
use crate::state::StateClassification;
use crate::waiter::Waiter;

/// State reported in place of a "not found" read by the read and delete waits.
pub const NOT_FOUND_STATE: &str = "not-found";

/// State some resources report once deleted, before they disappear.
pub const DELETED_STATE: &str = "deleted";

/// The states a kind of resource moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    /// Human-readable resource kind, e.g. `"volume"`.
    pub kind: &'static str,
    /// States of a create or update in progress.
    pub pending: &'static [&'static str],
    /// States in which the resource is usable.
    pub ready: &'static [&'static str],
    /// States of a delete in progress.
    pub deleting: &'static [&'static str],
    /// States in which the platform gave up on the resource.
    pub failed: &'static [&'static str],
}

impl Lifecycle {
    /// Block storage volumes.
    pub const fn volume() -> Self {
        Self {
            kind: "volume",
            pending: &["creating"],
            ready: &["available", "in-use"],
            deleting: &["deleting"],
            failed: &["error"],
        }
    }

    /// Volume snapshots.
    pub const fn snapshot() -> Self {
        Self {
            kind: "snapshot",
            pending: &["pending", "in-queue"],
            ready: &["completed"],
            deleting: &["deleting"],
            failed: &["error"],
        }
    }

    /// Virtual private clouds.
    pub const fn vpc() -> Self {
        Self {
            kind: "VPC",
            pending: &["pending"],
            ready: &["available"],
            deleting: &["deleting"],
            failed: &[],
        }
    }

    /// Subnets.
    pub const fn subnet() -> Self {
        Self {
            kind: "subnet",
            pending: &["pending"],
            ready: &["available"],
            deleting: &["deleting"],
            failed: &[],
        }
    }

    /// Internet gateways, including their VPC link.
    pub const fn internet_gateway() -> Self {
        Self {
            kind: "internet gateway",
            pending: &["attaching", "detaching"],
            ready: &["available", "attached"],
            deleting: &["deleting"],
            failed: &[],
        }
    }

    /// NAT gateways.
    pub const fn nat_gateway() -> Self {
        Self {
            kind: "NAT gateway",
            pending: &["pending"],
            ready: &["available"],
            deleting: &["deleting"],
            failed: &["failed"],
        }
    }

    /// Flexible GPUs, including their attachment to a VM.
    pub const fn flexible_gpu() -> Self {
        Self {
            kind: "flexible GPU",
            pending: &["attaching", "detaching"],
            ready: &["allocated", "attached"],
            deleting: &[],
            failed: &[],
        }
    }

    /// Describe one resource of this kind, for errors and logs.
    pub fn describe(&self, id: &str) -> String {
        format!("{} {}", self.kind, id)
    }

    /// States for waiting until the resource is usable.
    pub fn available_states(&self) -> StateClassification {
        StateClassification::new(self.pending.iter().copied(), self.ready.iter().copied())
            .with_failed(self.failed.iter().copied())
    }

    /// States for reading a resource that may be mid-transition.
    ///
    /// Failed states are accepted so the read can report them. A missing or
    /// deleted resource is accepted as gone.
    pub fn read_states(&self) -> StateClassification {
        let pending = self.pending.iter().chain(self.deleting).copied();
        let target = self
            .ready
            .iter()
            .chain(self.failed)
            .copied()
            .chain([DELETED_STATE, NOT_FOUND_STATE]);
        StateClassification::new(pending, target)
    }

    /// States for waiting until the resource is gone.
    pub fn deletion_states(&self) -> StateClassification {
        let pending: BTreeSet<&str> = self
            .pending
            .iter()
            .chain(self.ready)
            .chain(self.deleting)
            .copied()
            .collect();
        StateClassification::new(pending, [DELETED_STATE, NOT_FOUND_STATE])
            .with_failed(self.failed.iter().copied())
    }

    fn waiter(
        &self,
        id: &str,
        states: StateClassification,
        config: WaitConfig,
        cancel: &CancellationToken,
    ) -> Result<Waiter, WaitError> {
        Waiter::new(self.describe(id), states, config)
            .map(|waiter| waiter.with_cancellation(cancel.clone()))
    }
}

/// Reports a gone resource as `None`: a "not found" read becomes
/// [`NOT_FOUND_STATE`] and a read in [`DELETED_STATE`] drops the resource.
struct GoneAsNone<R>(R);

#[async_trait::async_trait]
impl<T, R> Refresh<Option<T>> for GoneAsNone<R>
where
    T: Send,
    R: Refresh<T>,
{
    async fn refresh(&mut self) -> Result<Observation<Option<T>>, BoxError> {
        Ok(match self.0.refresh().await? {
            Observation::NotFound => Observation::found(NOT_FOUND_STATE, None),
            Observation::Found { state, .. } if state == DELETED_STATE => {
                Observation::found(state, None)
            },
            found => found.map(Some),
        })
    }
}

/// Wait after a create or update until the resource is usable.
pub async fn wait_until_available<T, R>(
    lifecycle: &Lifecycle,
    id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
    refresh: R,
) -> Result<T, WaitError>
where
    R: Refresh<T>,
{
    lifecycle
        .waiter(id, lifecycle.available_states(), config, cancel)?
        .wait(refresh)
        .await
}

/// Wait on read until no transition is in progress.
///
/// Returns `None` when the resource no longer exists or reports
/// [`DELETED_STATE`], so the caller can drop it from state.
pub async fn wait_until_state_valid<T, R>(
    lifecycle: &Lifecycle,
    id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
    refresh: R,
) -> Result<Option<T>, WaitError>
where
    T: Send,
    R: Refresh<T>,
{
    lifecycle
        .waiter(id, lifecycle.read_states(), config, cancel)?
        .wait(GoneAsNone(refresh))
        .await
}

/// Wait after a delete until the resource is gone.
pub async fn wait_until_deleted<T, R>(
    lifecycle: &Lifecycle,
    id: &str,
    config: WaitConfig,
    cancel: &CancellationToken,
    refresh: R,
) -> Result<(), WaitError>
where
    T: Send,
    R: Refresh<T>,
{
    lifecycle
        .waiter(id, lifecycle.deletion_states(), config, cancel)?
        .wait(GoneAsNone(refresh))
        .await
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::state::StateClass;
    use crate::testing::{assert_read_failed, Script, ScriptedRefresh};

    const ALL: [fn() -> Lifecycle; 7] = [
        Lifecycle::volume,
        Lifecycle::snapshot,
        Lifecycle::vpc,
        Lifecycle::subnet,
        Lifecycle::internet_gateway,
        Lifecycle::nat_gateway,
        Lifecycle::flexible_gpu,
    ];

    fn config() -> WaitConfig {
        WaitConfig::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[test]
    fn test_all_lifecycles_are_valid() {
        for lifecycle in ALL.map(|f| f()) {
            assert_ok!(lifecycle.available_states().validate(), "{}", lifecycle.kind);
            assert_ok!(lifecycle.read_states().validate(), "{}", lifecycle.kind);
            assert_ok!(lifecycle.deletion_states().validate(), "{}", lifecycle.kind);
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(Lifecycle::nat_gateway().describe("nat-1"), "NAT gateway nat-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_available() {
        let refresh = ScriptedRefresh::new([
            Script::NotFound,
            Script::state("creating"),
            Script::state("available"),
        ]);
        let calls = refresh.calls();

        let config = config().with_not_found_checks(1);
        let token = CancellationToken::new();
        let read = assert_ok!(
            wait_until_available(&Lifecycle::volume(), "vol-1", config, &token, refresh).await
        );

        assert_eq!(read, 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_error_state() {
        let refresh = ScriptedRefresh::new([Script::state("pending"), Script::state("error")]);

        let token = CancellationToken::new();
        let err = assert_err!(
            wait_until_available(&Lifecycle::snapshot(), "snap-1", config(), &token, refresh)
                .await
        );

        assert_eq!(err.to_string(), "snapshot snap-1 entered failure state \"error\"");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_waits_for_transition() {
        let refresh = ScriptedRefresh::new([
            Script::state("attaching"),
            Script::state("attached"),
        ]);

        let token = CancellationToken::new();
        let read = assert_ok!(
            wait_until_state_valid(&Lifecycle::flexible_gpu(), "fgpu-1", config(), &token, refresh)
                .await
        );

        assert_eq!(read, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_of_missing_resource() {
        let refresh = ScriptedRefresh::new([Script::NotFound]);

        let token = CancellationToken::new();
        let read = assert_ok!(
            wait_until_state_valid(&Lifecycle::vpc(), "vpc-1", config(), &token, refresh).await
        );

        assert_eq!(read, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_of_deleted_resource() {
        let refresh = ScriptedRefresh::new([Script::state("deleting"), Script::state("deleted")]);
        let calls = refresh.calls();

        let token = CancellationToken::new();
        let read = assert_ok!(
            wait_until_state_valid(&Lifecycle::volume(), "vol-1", config(), &token, refresh).await
        );

        assert_eq!(read, None);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_read_states_accept_gone_resources() {
        for lifecycle in ALL.map(|f| f()) {
            let states = lifecycle.read_states();
            assert_eq!(states.classify(DELETED_STATE), StateClass::Target);
            assert_eq!(states.classify(NOT_FOUND_STATE), StateClass::Target);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_reports_failed_resource() {
        let refresh = ScriptedRefresh::new([Script::state("error")]);

        let token = CancellationToken::new();
        let read = assert_ok!(
            wait_until_state_valid(&Lifecycle::volume(), "vol-1", config(), &token, refresh).await
        );

        assert_eq!(read, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_when_not_found() {
        let refresh = ScriptedRefresh::new([
            Script::state("available"),
            Script::state("deleting"),
            Script::NotFound,
        ]);
        let calls = refresh.calls();

        let token = CancellationToken::new();
        assert_ok!(
            wait_until_deleted(&Lifecycle::subnet(), "subnet-1", config(), &token, refresh).await
        );
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_state_counts_as_gone() {
        let refresh = ScriptedRefresh::new([Script::state("deleting"), Script::state("deleted")]);

        let token = CancellationToken::new();
        assert_ok!(
            wait_until_deleted(&Lifecycle::nat_gateway(), "nat-1", config(), &token, refresh)
                .await
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_read_error() {
        let refresh = ScriptedRefresh::new([Script::error("403 forbidden")]);

        let token = CancellationToken::new();
        let err = assert_err!(
            wait_until_deleted(&Lifecycle::internet_gateway(), "igw-1", config(), &token, refresh)
                .await
        );

        assert_read_failed(&err, "403 forbidden");
        assert_eq!(err.resource(), Some("internet gateway igw-1"));
    }
}
