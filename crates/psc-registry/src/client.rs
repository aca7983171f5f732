use crate::channel::{ProcessManagerChannel, RegistryError};
use psc_core::{ProcessHandle, ProcessQuery, StatusCodeMap};
use tracing::debug;

/// Read-side client for the process registry. One RPC call per `list`, no
/// retry, no cache; records come back in the order the manager reports
/// them.
pub struct RegistryClient<C> {
    channel: C,
    status_codes: StatusCodeMap,
}

impl<C: ProcessManagerChannel> RegistryClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            status_codes: StatusCodeMap::from_schema(),
        }
    }

    pub async fn list(&self, query: &ProcessQuery) -> Result<Vec<ProcessHandle>, RegistryError> {
        let instances = self.channel.ps(query).await?;
        let mut handles = Vec::with_capacity(instances.len());
        for instance in &instances {
            handles.push(instance.decode(&self.status_codes)?);
        }
        debug!(event = "registry_list", returned = handles.len());
        Ok(handles)
    }

    pub async fn list_all(&self) -> Result<Vec<ProcessHandle>, RegistryError> {
        self.list(&ProcessQuery::all()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{instance, RecordedCall, ScriptedChannel};
    use psc_core::wire::HandleDecodeError;
    use psc_core::ProcessStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn list_all_sends_the_wildcard_query() {
        let channel = Arc::new(ScriptedChannel::default());
        let client = RegistryClient::new(channel.clone());

        client.list_all().await.expect("list");

        assert_eq!(
            channel.recorded(),
            vec![RecordedCall::Ps(ProcessQuery::all())]
        );
    }

    #[tokio::test]
    async fn list_decodes_records_in_service_order() {
        let channel = Arc::new(ScriptedChannel {
            processes: vec![
                instance("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11", 1, None),
                instance("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a22", 2, Some(1)),
            ],
            ..ScriptedChannel::default()
        });
        let client = RegistryClient::new(channel);

        let handles = client.list_all().await.expect("list");

        assert_eq!(handles.len(), 2);
        assert_eq!(
            handles[0].uuid.to_string(),
            "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11"
        );
        assert_eq!(handles[0].status, ProcessStatus::Running);
        assert_eq!(handles[0].exit_code, None);
        assert_eq!(
            handles[1].uuid.to_string(),
            "a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a22"
        );
        assert_eq!(handles[1].status, ProcessStatus::Exited);
        assert_eq!(handles[1].exit_code, Some(1));
    }

    #[tokio::test]
    async fn an_undeclared_status_code_fails_the_whole_call() {
        let channel = Arc::new(ScriptedChannel {
            processes: vec![
                instance("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11", 1, None),
                instance("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a22", 99, None),
            ],
            ..ScriptedChannel::default()
        });
        let client = RegistryClient::new(channel);

        let err = client.list_all().await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Decode(HandleDecodeError::UnknownStatus { code: 99, .. })
        ));
    }
}
