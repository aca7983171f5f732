use crate::channel::{ProcessManagerChannel, RegistryError};
use psc_core::{LogLine, ProcessQuery};
use uuid::Uuid;

pub const DEFAULT_LOG_DEPTH: u32 = 100;

/// Fetches a bounded window of a process's most recent log lines, oldest
/// first, materialized eagerly.
pub struct LogTailReader<C> {
    channel: C,
}

impl<C: ProcessManagerChannel> LogTailReader<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub async fn tail(&self, uuid: Uuid, depth: u32) -> Result<Vec<LogLine>, RegistryError> {
        if depth == 0 {
            return Ok(Vec::new());
        }

        let mut stream = self
            .channel
            .logs(&ProcessQuery::single(uuid), depth)
            .await?;
        let mut lines = Vec::new();
        while let Some(item) = stream.recv().await {
            lines.push(item?);
            if lines.len() == depth as usize {
                break;
            }
        }
        Ok(lines)
    }
}
