use crate::channel::{ProcessManagerChannel, RegistryError};
use psc_core::boot::BootRequest;
use tracing::{debug, info};

/// Boots a dummy session and waits for the whole progress stream.
///
/// Event payloads are discarded, but the stream is always drained to the
/// end so a failure partway through the boot surfaces instead of being
/// dropped with the events.
pub struct BootOrchestrator<C> {
    channel: C,
}

impl<C: ProcessManagerChannel> BootOrchestrator<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub async fn boot(&self, user: &str, request: &BootRequest) -> Result<(), RegistryError> {
        let mut events = self.channel.dummy_boot(user, request).await?;
        let mut drained = 0usize;
        while let Some(event) = events.recv().await {
            let event = event?;
            drained += 1;
            debug!(event = "boot_progress", phase = %event.phase, seq = drained);
        }
        info!(
            event = "boot_complete",
            session = %request.session_name,
            progress_events = drained
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordedCall, ScriptedChannel};
    use psc_core::wire::FaultPayload;
    use std::sync::Arc;

    fn request() -> BootRequest {
        BootRequest {
            session_name: "sess".to_string(),
            n_processes: 1,
            sleep: 5,
            n_sleeps: 4,
        }
    }

    #[tokio::test]
    async fn boot_submits_once_and_drains_the_stream() {
        let channel = Arc::new(ScriptedChannel {
            boot_phases: vec!["launched".to_string(), "ready".to_string()],
            ..ScriptedChannel::default()
        });
        let orchestrator = BootOrchestrator::new(channel.clone());

        orchestrator.boot("root", &request()).await.expect("boot");

        assert_eq!(
            channel.recorded(),
            vec![RecordedCall::DummyBoot {
                user: "root".to_string(),
                request: request(),
            }]
        );
    }

    #[tokio::test]
    async fn a_fault_partway_through_the_stream_fails_the_boot() {
        let channel = Arc::new(ScriptedChannel {
            boot_phases: vec!["launched".to_string()],
            boot_fault: Some(FaultPayload {
                code: "boot_failed".to_string(),
                message: "process exited during boot".to_string(),
                uuid: None,
            }),
            ..ScriptedChannel::default()
        });
        let orchestrator = BootOrchestrator::new(channel);

        let err = orchestrator.boot("root", &request()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Fault { code, .. } if code == "boot_failed"));
    }
}
