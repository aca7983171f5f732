//! Wire contract with the process manager: newline-delimited JSON frames,
//! one fresh connection and token per call.
//!
//! Requests are a single envelope frame. Unary commands answer with result
//! frames terminated by `done`; streamed commands (`logs`, `dummy_boot`)
//! emit item frames until `done`. Service faults arrive as `fault` frames
//! with a machine-readable code.

use crate::{ProcessHandle, ProcessQuery, StatusCodeMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const WIRE_PROTOCOL_VERSION: u16 = 1;

/// Fault code the manager sends when a query names a uuid it does not know.
pub const FAULT_UNKNOWN_UUID: &str = "unknown_uuid";

fn default_version() -> u16 {
    WIRE_PROTOCOL_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    #[serde(default = "default_version")]
    pub version: u16,
    pub token: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub command: RpcCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", content = "params", rename_all = "snake_case")]
pub enum RpcCommand {
    Ps {
        query: ProcessQuery,
    },
    Restart {
        query: ProcessQuery,
    },
    Kill {
        query: ProcessQuery,
    },
    Flush {
        query: ProcessQuery,
    },
    Logs {
        query: ProcessQuery,
        how_far: u32,
    },
    DummyBoot {
        user: String,
        session_name: String,
        n_processes: u32,
        sleep: u32,
        n_sleeps: u32,
    },
}

impl RpcCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RpcCommand::Ps { .. } => "ps",
            RpcCommand::Restart { .. } => "restart",
            RpcCommand::Kill { .. } => "kill",
            RpcCommand::Flush { .. } => "flush",
            RpcCommand::Logs { .. } => "logs",
            RpcCommand::DummyBoot { .. } => "dummy_boot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ResponseFrame {
    ProcessList(ProcessListPayload),
    Ack(AckPayload),
    LogChunk(LogChunkPayload),
    BootEvent(BootEventPayload),
    Fault(FaultPayload),
    Done,
}

impl ResponseFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseFrame::ProcessList(_) => "process_list",
            ResponseFrame::Ack(_) => "ack",
            ResponseFrame::LogChunk(_) => "log_chunk",
            ResponseFrame::BootEvent(_) => "boot_event",
            ResponseFrame::Fault(_) => "fault",
            ResponseFrame::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessListPayload {
    pub values: Vec<WireProcessInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AckPayload {
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogChunkPayload {
    pub line: String,
}

/// One progress event off the boot stream. Consumers drain these to
/// completion; the payload itself carries no contract beyond the phase tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BootEventPayload {
    pub phase: String,
    #[serde(default)]
    pub process: Option<WireProcessInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaultPayload {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub uuid: Option<String>,
}

/// A process record exactly as the manager reports it: status still an
/// integer code, exit code always present whether or not it means anything.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireProcessInstance {
    pub uuid: String,
    pub metadata: WireProcessMetadata,
    pub status_code: i32,
    #[serde(default)]
    pub return_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireProcessMetadata {
    pub name: String,
    pub user: String,
    pub session: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandleDecodeError {
    #[error("process {uuid} carries undeclared status code {code}")]
    UnknownStatus { uuid: String, code: i32 },
    #[error("malformed process uuid {value:?}: {source}")]
    Uuid { value: String, source: uuid::Error },
}

impl WireProcessInstance {
    /// Decodes into the domain read model. The exit code is only kept for
    /// terminated processes; the manager reports zero for live ones.
    pub fn decode(&self, codes: &StatusCodeMap) -> Result<ProcessHandle, HandleDecodeError> {
        let uuid = Uuid::parse_str(&self.uuid).map_err(|source| HandleDecodeError::Uuid {
            value: self.uuid.clone(),
            source,
        })?;
        let status = codes
            .decode(self.status_code)
            .map_err(|err| HandleDecodeError::UnknownStatus {
                uuid: self.uuid.clone(),
                code: err.code,
            })?;
        Ok(ProcessHandle {
            uuid,
            name: self.metadata.name.clone(),
            user: self.metadata.user.clone(),
            session: self.metadata.session.clone(),
            status,
            exit_code: self.return_code.filter(|_| status.is_terminal()),
        })
    }
}
