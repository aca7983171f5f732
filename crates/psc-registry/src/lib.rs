//! Client-side engine for the process manager: registry queries, action
//! dispatch, log tailing and session boot, all behind one narrow channel
//! trait so the RPC surface can be substituted in tests.

pub mod boot;
pub mod channel;
pub mod client;
pub mod dispatch;
pub mod tail;
pub mod tcp;

#[cfg(test)]
mod testing;

pub use boot::BootOrchestrator;
pub use channel::{BootStream, LogStream, ProcessManagerChannel, RegistryError, TransportError};
pub use client::RegistryClient;
pub use dispatch::{ActionDispatcher, DispatchError, DispatchReport, RestartFailure, RestartReport};
pub use tail::{LogTailReader, DEFAULT_LOG_DEPTH};
pub use tcp::TcpChannel;
