//! The narrow RPC seam between this crate and the external process
//! manager. Production traffic goes through [`crate::tcp::TcpChannel`];
//! tests substitute a scripted implementation.

use async_trait::async_trait;
use psc_core::boot::BootRequest;
use psc_core::frame::FrameError;
use psc_core::wire::{BootEventPayload, FaultPayload, HandleDecodeError, WireProcessInstance, FAULT_UNKNOWN_UUID};
use psc_core::{LogLine, ProcessQuery};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type LogStream = mpsc::Receiver<Result<LogLine, RegistryError>>;
pub type BootStream = mpsc::Receiver<Result<BootEventPayload, RegistryError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to process manager at {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("i/o failure talking to the process manager: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("connection closed before the call completed")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("process manager knows no process {uuid}")]
    NotFound { uuid: Uuid },
    #[error(transparent)]
    Decode(#[from] HandleDecodeError),
    #[error("process manager fault {code}: {message}")]
    Fault { code: String, message: String },
    #[error("unexpected {frame} frame answering {command}")]
    UnexpectedFrame {
        command: &'static str,
        frame: &'static str,
    },
}

/// Maps a service fault frame onto the error taxonomy. An `unknown_uuid`
/// fault that names a parseable uuid becomes a not-found.
pub fn fault_error(fault: FaultPayload) -> RegistryError {
    if fault.code == FAULT_UNKNOWN_UUID {
        if let Some(uuid) = fault.uuid.as_deref().and_then(|v| Uuid::parse_str(v).ok()) {
            return RegistryError::NotFound { uuid };
        }
    }
    RegistryError::Fault {
        code: fault.code,
        message: fault.message,
    }
}

/// The RPC surface this core requires from the process manager. One method
/// per wire command; streamed commands hand back a receiver the caller
/// must drain.
#[async_trait]
pub trait ProcessManagerChannel: Send + Sync {
    async fn ps(&self, query: &ProcessQuery) -> Result<Vec<WireProcessInstance>, RegistryError>;

    async fn restart(&self, query: &ProcessQuery) -> Result<(), RegistryError>;

    async fn kill(&self, query: &ProcessQuery) -> Result<(), RegistryError>;

    async fn flush(&self, query: &ProcessQuery) -> Result<(), RegistryError>;

    async fn logs(&self, query: &ProcessQuery, how_far: u32) -> Result<LogStream, RegistryError>;

    async fn dummy_boot(&self, user: &str, request: &BootRequest) -> Result<BootStream, RegistryError>;
}

#[async_trait]
impl<C> ProcessManagerChannel for Arc<C>
where
    C: ProcessManagerChannel + ?Sized,
{
    async fn ps(&self, query: &ProcessQuery) -> Result<Vec<WireProcessInstance>, RegistryError> {
        self.as_ref().ps(query).await
    }

    async fn restart(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.as_ref().restart(query).await
    }

    async fn kill(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.as_ref().kill(query).await
    }

    async fn flush(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.as_ref().flush(query).await
    }

    async fn logs(&self, query: &ProcessQuery, how_far: u32) -> Result<LogStream, RegistryError> {
        self.as_ref().logs(query, how_far).await
    }

    async fn dummy_boot(&self, user: &str, request: &BootRequest) -> Result<BootStream, RegistryError> {
        self.as_ref().dummy_boot(user, request).await
    }
}
