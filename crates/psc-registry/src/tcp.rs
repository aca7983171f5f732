//! NDJSON-over-TCP implementation of the channel trait.
//!
//! Every call opens its own connection and carries its own token; there is
//! no shared connection state between calls.

use crate::channel::{
    fault_error, BootStream, LogStream, ProcessManagerChannel, RegistryError, TransportError,
};
use async_trait::async_trait;
use chrono::Utc;
use psc_core::boot::BootRequest;
use psc_core::frame::{decode_frame, encode_frame, MAX_FRAME_BYTES};
use psc_core::wire::{
    RequestEnvelope, ResponseFrame, RpcCommand, WireProcessInstance, WIRE_PROTOCOL_VERSION,
};
use psc_core::{LogLine, ProcessQuery};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

const STREAM_QUEUE_CAPACITY: usize = 64;

pub struct TcpChannel {
    addr: String,
    max_frame_bytes: usize,
    request_counter: AtomicU64,
}

impl TcpChannel {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            max_frame_bytes: MAX_FRAME_BYTES,
            request_counter: AtomicU64::new(0),
        }
    }

    fn next_request_id(&self) -> String {
        let id = self.request_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("req-{id}")
    }

    fn envelope(&self, command: RpcCommand) -> RequestEnvelope {
        RequestEnvelope {
            version: WIRE_PROTOCOL_VERSION,
            token: user_token(),
            timestamp: Utc::now().to_rfc3339(),
            request_id: Some(self.next_request_id()),
            command,
        }
    }

    async fn open(
        &self,
        command: RpcCommand,
    ) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf), TransportError> {
        let name = command.name();
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        let (read, mut write) = stream.into_split();
        let bytes = encode_frame(&self.envelope(command), self.max_frame_bytes)?;
        write.write_all(&bytes).await?;
        write.flush().await?;
        debug!(event = "pm_call", command = name, addr = %self.addr);
        Ok((BufReader::new(read), write))
    }

    /// Runs a unary command: collects result frames until `done`, turning
    /// a fault frame into the call's error.
    async fn unary(&self, command: RpcCommand) -> Result<Vec<ResponseFrame>, RegistryError> {
        let (mut reader, _write) = self.open(command).await?;
        let mut frames = Vec::new();
        loop {
            match read_frame(&mut reader, self.max_frame_bytes).await? {
                None => return Err(TransportError::Disconnected.into()),
                Some(ResponseFrame::Done) => return Ok(frames),
                Some(ResponseFrame::Fault(fault)) => return Err(fault_error(fault)),
                Some(frame) => frames.push(frame),
            }
        }
    }

    /// Runs a streamed command, mapping each item frame through `map` into
    /// the receiver handed back to the caller. The connection stays open
    /// until `done`, a fault, or the receiver is dropped.
    async fn streamed<T, F>(
        &self,
        command: RpcCommand,
        map: F,
    ) -> Result<mpsc::Receiver<Result<T, RegistryError>>, RegistryError>
    where
        T: Send + 'static,
        F: Fn(ResponseFrame) -> Result<T, RegistryError> + Send + 'static,
    {
        let (mut reader, write) = self.open(command).await?;
        let max_frame_bytes = self.max_frame_bytes;
        let (tx, rx) = mpsc::channel(STREAM_QUEUE_CAPACITY);
        tokio::spawn(async move {
            // the write half lives as long as the read loop
            let _write = write;
            loop {
                match read_frame(&mut reader, max_frame_bytes).await {
                    Ok(Some(ResponseFrame::Done)) => break,
                    Ok(Some(ResponseFrame::Fault(fault))) => {
                        let _ = tx.send(Err(fault_error(fault))).await;
                        break;
                    }
                    Ok(Some(frame)) => {
                        let item = map(frame);
                        let failed = item.is_err();
                        if tx.send(item).await.is_err() || failed {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(Err(TransportError::Disconnected.into())).await;
                        break;
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err.into())).await;
                        break;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn acked(&self, command: RpcCommand) -> Result<(), RegistryError> {
        self.unary(command).await.map(|_| ())
    }
}

async fn read_frame(
    reader: &mut BufReader<OwnedReadHalf>,
    max_frame_bytes: usize,
) -> Result<Option<ResponseFrame>, TransportError> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        if line.trim().is_empty() {
            continue;
        }
        return Ok(Some(decode_frame(line.as_bytes(), max_frame_bytes)?));
    }
}

/// Per-call credential in the dummy token scheme the manager accepts:
/// the calling user's name.
fn user_token() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[async_trait]
impl ProcessManagerChannel for TcpChannel {
    async fn ps(&self, query: &ProcessQuery) -> Result<Vec<WireProcessInstance>, RegistryError> {
        let frames = self
            .unary(RpcCommand::Ps {
                query: query.clone(),
            })
            .await?;
        for frame in frames {
            match frame {
                ResponseFrame::ProcessList(payload) => return Ok(payload.values),
                other => {
                    return Err(RegistryError::UnexpectedFrame {
                        command: "ps",
                        frame: other.kind(),
                    })
                }
            }
        }
        Err(RegistryError::UnexpectedFrame {
            command: "ps",
            frame: "done",
        })
    }

    async fn restart(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.acked(RpcCommand::Restart {
            query: query.clone(),
        })
        .await
    }

    async fn kill(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.acked(RpcCommand::Kill {
            query: query.clone(),
        })
        .await
    }

    async fn flush(&self, query: &ProcessQuery) -> Result<(), RegistryError> {
        self.acked(RpcCommand::Flush {
            query: query.clone(),
        })
        .await
    }

    async fn logs(&self, query: &ProcessQuery, how_far: u32) -> Result<LogStream, RegistryError> {
        self.streamed(
            RpcCommand::Logs {
                query: query.clone(),
                how_far,
            },
            |frame| match frame {
                ResponseFrame::LogChunk(chunk) => Ok(LogLine { line: chunk.line }),
                other => Err(RegistryError::UnexpectedFrame {
                    command: "logs",
                    frame: other.kind(),
                }),
            },
        )
        .await
    }

    async fn dummy_boot(
        &self,
        user: &str,
        request: &BootRequest,
    ) -> Result<BootStream, RegistryError> {
        self.streamed(
            RpcCommand::DummyBoot {
                user: user.to_string(),
                session_name: request.session_name.clone(),
                n_processes: request.n_processes,
                sleep: request.sleep,
                n_sleeps: request.n_sleeps,
            },
            |frame| match frame {
                ResponseFrame::BootEvent(event) => Ok(event),
                other => Err(RegistryError::UnexpectedFrame {
                    command: "dummy_boot",
                    frame: other.kind(),
                }),
            },
        )
        .await
    }
}
