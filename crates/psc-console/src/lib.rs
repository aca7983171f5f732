//! The surface the web layer holds: registry queries, action dispatch,
//! log tailing, session boot and broadcast draining wired behind one
//! struct. Everything here is glue; the behavior lives in `psc-registry`
//! and `psc-relay`.

use psc_core::boot::{BootRequest, BootValidationError};
use psc_core::{ActionKind, BroadcastMessage, LogLine, ProcessHandle, ProcessQuery};
use psc_registry::boot::BootOrchestrator;
use psc_registry::channel::{ProcessManagerChannel, RegistryError};
use psc_registry::client::RegistryClient;
use psc_registry::dispatch::{ActionDispatcher, DispatchError, DispatchReport};
use psc_registry::tail::{LogTailReader, DEFAULT_LOG_DEPTH};
use psc_relay::MessageRelay;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub type SharedChannel = Arc<dyn ProcessManagerChannel>;

#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Validation(#[from] BootValidationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub struct Console {
    registry: RegistryClient<SharedChannel>,
    actions: ActionDispatcher<SharedChannel>,
    logs: LogTailReader<SharedChannel>,
    sessions: BootOrchestrator<SharedChannel>,
    relay: MessageRelay,
}

impl Console {
    pub fn new(channel: SharedChannel, relay: MessageRelay) -> Self {
        Self {
            registry: RegistryClient::new(channel.clone()),
            actions: ActionDispatcher::new(channel.clone()),
            logs: LogTailReader::new(channel.clone()),
            sessions: BootOrchestrator::new(channel),
            relay,
        }
    }

    pub async fn list_processes(
        &self,
        query: &ProcessQuery,
    ) -> Result<Vec<ProcessHandle>, RegistryError> {
        self.registry.list(query).await
    }

    pub async fn list_all_processes(&self) -> Result<Vec<ProcessHandle>, RegistryError> {
        self.registry.list_all().await
    }

    /// Parses the free-text action name at this boundary; when it does not
    /// name a known action, nothing at all is dispatched.
    pub async fn dispatch_action(
        &self,
        uuids: &[Uuid],
        action_name: &str,
    ) -> Result<DispatchReport, DispatchError> {
        let action: ActionKind = action_name.parse()?;
        self.actions.dispatch(uuids, action).await
    }

    pub async fn tail_logs(
        &self,
        uuid: Uuid,
        depth: Option<u32>,
    ) -> Result<Vec<LogLine>, RegistryError> {
        self.logs.tail(uuid, depth.unwrap_or(DEFAULT_LOG_DEPTH)).await
    }

    /// Validates raw form data and boots a session; the whole progress
    /// stream is drained before this returns.
    pub async fn boot(&self, user: &str, form: &Map<String, Value>) -> Result<(), BootError> {
        let request = BootRequest::from_form(form)?;
        self.sessions.boot(user, &request).await?;
        Ok(())
    }

    /// Typed entry for callers that already hold a validated request.
    pub async fn boot_request(
        &self,
        user: &str,
        request: &BootRequest,
    ) -> Result<(), RegistryError> {
        self.sessions.boot(user, request).await
    }

    /// Removes and returns every pending broadcast message, oldest first.
    /// Rendering order is the caller's choice.
    pub fn drain_messages(&self) -> Vec<BroadcastMessage> {
        self.relay.drain()
    }

    pub fn relay(&self) -> &MessageRelay {
        &self.relay
    }
}
