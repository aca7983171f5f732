//! Fan-out policy for operator actions.
//!
//! Restart addresses processes one call at a time; kill and flush go out as
//! a single batched query. The asymmetry is a compatibility requirement of
//! the external service, not a choice to revisit here.

use crate::channel::{ProcessManagerChannel, RegistryError};
use psc_core::{ActionKind, InvalidActionError, ProcessQuery};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct DispatchReport {
    pub action: ActionKind,
    pub dispatched: Vec<Uuid>,
}

#[derive(Debug)]
pub struct RestartFailure {
    pub uuid: Uuid,
    pub error: RegistryError,
}

/// Outcome of a restart fan-out where at least one per-process call
/// failed. Both lists are always populated so the caller can say exactly
/// which processes were restarted and which were not.
#[derive(Debug)]
pub struct RestartReport {
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<RestartFailure>,
}

impl RestartReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    InvalidAction(#[from] InvalidActionError),
    #[error("restart failed for {} of {} processes", .0.failed.len(), .0.attempted())]
    RestartPartial(RestartReport),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct ActionDispatcher<C> {
    channel: C,
}

impl<C: ProcessManagerChannel> ActionDispatcher<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Applies `action` to `uuids`. An empty selection is a no-op that
    /// makes no RPC call at all.
    pub async fn dispatch(
        &self,
        uuids: &[Uuid],
        action: ActionKind,
    ) -> Result<DispatchReport, DispatchError> {
        if uuids.is_empty() {
            return Ok(DispatchReport {
                action,
                dispatched: Vec::new(),
            });
        }

        match action {
            ActionKind::Restart => self.restart_each(uuids).await,
            ActionKind::Kill => {
                self.channel
                    .kill(&ProcessQuery::uuids(uuids.iter().copied()))
                    .await?;
                Ok(self.report(action, uuids))
            }
            ActionKind::Flush => {
                self.channel
                    .flush(&ProcessQuery::uuids(uuids.iter().copied()))
                    .await?;
                Ok(self.report(action, uuids))
            }
        }
    }

    /// One call per process, best effort: a failure never aborts the
    /// remaining restarts, every outcome is collected.
    async fn restart_each(&self, uuids: &[Uuid]) -> Result<DispatchReport, DispatchError> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for &uuid in uuids {
            match self.channel.restart(&ProcessQuery::single(uuid)).await {
                Ok(()) => succeeded.push(uuid),
                Err(error) => {
                    warn!(event = "restart_failed", uuid = %uuid, error = %error);
                    failed.push(RestartFailure { uuid, error });
                }
            }
        }

        if failed.is_empty() {
            Ok(self.report(ActionKind::Restart, &succeeded))
        } else {
            Err(DispatchError::RestartPartial(RestartReport {
                succeeded,
                failed,
            }))
        }
    }

    fn report(&self, action: ActionKind, uuids: &[Uuid]) -> DispatchReport {
        info!(event = "action_dispatched", action = %action, targets = uuids.len());
        DispatchReport {
            action,
            dispatched: uuids.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordedCall, ScriptedChannel};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn uuids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[tokio::test]
    async fn empty_selection_is_a_noop_with_zero_calls() {
        let channel = Arc::new(ScriptedChannel::default());
        let dispatcher = ActionDispatcher::new(channel.clone());

        for action in [ActionKind::Restart, ActionKind::Kill, ActionKind::Flush] {
            let report = dispatcher.dispatch(&[], action).await.expect("noop");
            assert!(report.dispatched.is_empty());
        }
        assert_eq!(channel.recorded().len(), 0);
    }

    #[tokio::test]
    async fn restart_issues_one_call_per_uuid() {
        let channel = Arc::new(ScriptedChannel::default());
        let dispatcher = ActionDispatcher::new(channel.clone());
        let targets = uuids(3);

        let report = dispatcher
            .dispatch(&targets, ActionKind::Restart)
            .await
            .expect("restart");

        assert_eq!(report.dispatched, targets);
        let calls = channel.recorded();
        assert_eq!(calls.len(), 3);
        for (call, uuid) in calls.iter().zip(&targets) {
            assert_eq!(call, &RecordedCall::Restart(ProcessQuery::single(*uuid)));
        }
    }

    #[tokio::test]
    async fn kill_and_flush_batch_every_uuid_into_one_call() {
        let targets = uuids(4);

        for action in [ActionKind::Kill, ActionKind::Flush] {
            let channel = Arc::new(ScriptedChannel::default());
            let dispatcher = ActionDispatcher::new(channel.clone());

            dispatcher.dispatch(&targets, action).await.expect("batch");

            let calls = channel.recorded();
            assert_eq!(calls.len(), 1);
            let expected = ProcessQuery::uuids(targets.iter().copied());
            match (&calls[0], action) {
                (RecordedCall::Kill(query), ActionKind::Kill) => assert_eq!(query, &expected),
                (RecordedCall::Flush(query), ActionKind::Flush) => assert_eq!(query, &expected),
                other => panic!("unexpected call: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn restart_keeps_going_past_failures_and_reports_both_sides() {
        let targets = uuids(3);
        let channel = Arc::new(ScriptedChannel {
            restart_faults: HashMap::from([(targets[1], "denied".to_string())]),
            ..ScriptedChannel::default()
        });
        let dispatcher = ActionDispatcher::new(channel.clone());

        let err = dispatcher
            .dispatch(&targets, ActionKind::Restart)
            .await
            .unwrap_err();

        // all three calls went out despite the middle one failing
        assert_eq!(channel.recorded().len(), 3);
        match err {
            DispatchError::RestartPartial(report) => {
                assert_eq!(report.succeeded, vec![targets[0], targets[2]]);
                assert_eq!(report.failed.len(), 1);
                assert_eq!(report.failed[0].uuid, targets[1]);
                assert_eq!(report.attempted(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
