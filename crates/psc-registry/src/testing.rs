//! Scripted channel used by the unit tests: records every call and plays
//! back canned data without a network.

use crate::channel::{
    fault_error, BootStream, LogStream, ProcessManagerChannel, RegistryError,
};
use async_trait::async_trait;
use psc_core::boot::BootRequest;
use psc_core::wire::{
    BootEventPayload, FaultPayload, WireProcessInstance, WireProcessMetadata,
};
use psc_core::{LogLine, ProcessQuery};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Ps(ProcessQuery),
    Restart(ProcessQuery),
    Kill(ProcessQuery),
    Flush(ProcessQuery),
    Logs(ProcessQuery, u32),
    DummyBoot { user: String, request: BootRequest },
}

#[derive(Default)]
pub struct ScriptedChannel {
    pub calls: Mutex<Vec<RecordedCall>>,
    pub processes: Vec<WireProcessInstance>,
    /// uuid -> fault code returned for that process's restart call
    pub restart_faults: HashMap<Uuid, String>,
    pub log_lines: Vec<String>,
    /// emitted after the scripted log lines
    pub log_fault: Option<FaultPayload>,
    pub boot_phases: Vec<String>,
    /// emitted after the scripted boot phases
    pub boot_fault: Option<FaultPayload>,
}

impl ScriptedChannel {
    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl ProcessManagerChannel for ScriptedChannel {
    async fn ps(&self, query: &ProcessQuery) -> Result<Vec<WireProcessInstance>, RegistryError> {
        self.record(RecordedCall::Ps(query.clone()));
        Ok(self.processes.clone())
    }

    async fn restart(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.record(RecordedCall::Restart(query.clone()));
        if let ProcessQuery::Uuids(uuids) = query {
            for uuid in uuids {
                if let Some(code) = self.restart_faults.get(uuid) {
                    return Err(fault_error(FaultPayload {
                        code: code.clone(),
                        message: format!("restart refused for {uuid}"),
                        uuid: Some(uuid.to_string()),
                    }));
                }
            }
        }
        Ok(())
    }

    async fn kill(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.record(RecordedCall::Kill(query.clone()));
        Ok(())
    }

    async fn flush(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.record(RecordedCall::Flush(query.clone()));
        Ok(())
    }

    async fn logs(&self, query: &ProcessQuery, how_far: u32) -> Result<LogStream, RegistryError> {
        self.record(RecordedCall::Logs(query.clone(), how_far));
        // the service returns the window of the how_far most recent lines
        let skip = self.log_lines.len().saturating_sub(how_far as usize);
        let window: Vec<&String> = self.log_lines.iter().skip(skip).collect();
        let (tx, rx) = mpsc::channel(window.len() + 2);
        for line in window {
            tx.try_send(Ok(LogLine { line: line.clone() }))
                .expect("queue log line");
        }
        if let Some(fault) = &self.log_fault {
            tx.try_send(Err(fault_error(fault.clone())))
                .expect("queue log fault");
        }
        Ok(rx)
    }

    async fn dummy_boot(
        &self,
        user: &str,
        request: &BootRequest,
    ) -> Result<BootStream, RegistryError> {
        self.record(RecordedCall::DummyBoot {
            user: user.to_string(),
            request: request.clone(),
        });
        let (tx, rx) = mpsc::channel(self.boot_phases.len() + 2);
        for phase in &self.boot_phases {
            tx.try_send(Ok(BootEventPayload {
                phase: phase.clone(),
                process: None,
            }))
            .expect("queue boot event");
        }
        if let Some(fault) = &self.boot_fault {
            tx.try_send(Err(fault_error(fault.clone())))
                .expect("queue boot fault");
        }
        Ok(rx)
    }
}

pub fn instance(uuid: &str, status_code: i32, return_code: Option<i32>) -> WireProcessInstance {
    WireProcessInstance {
        uuid: uuid.to_string(),
        metadata: WireProcessMetadata {
            name: "runner".to_string(),
            user: "root".to_string(),
            session: "sess".to_string(),
        },
        status_code,
        return_code,
    }
}
