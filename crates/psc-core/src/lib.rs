use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub mod boot;
pub mod frame;
pub mod wire;

/// Latest known state of one process owned by the external process manager.
///
/// Handles are read-model records: the manager creates and destroys the
/// underlying processes, this side only observes them and requests
/// transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessHandle {
    pub uuid: Uuid,
    pub name: String,
    pub user: String,
    pub session: String,
    pub status: ProcessStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Booted,
    Running,
    Exited,
    Failed,
    Killed,
}

/// Integer codes the process manager uses for each status on the wire.
/// `wire_code` is the total inverse; `schema_lists_every_status` keeps the
/// two in sync.
pub const STATUS_SCHEMA: &[(i32, ProcessStatus)] = &[
    (0, ProcessStatus::Booted),
    (1, ProcessStatus::Running),
    (2, ProcessStatus::Exited),
    (3, ProcessStatus::Failed),
    (4, ProcessStatus::Killed),
];

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Booted => "booted",
            ProcessStatus::Running => "running",
            ProcessStatus::Exited => "exited",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Killed => "killed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Exited | ProcessStatus::Failed | ProcessStatus::Killed
        )
    }

    pub fn wire_code(self) -> i32 {
        match self {
            ProcessStatus::Booted => 0,
            ProcessStatus::Running => 1,
            ProcessStatus::Exited => 2,
            ProcessStatus::Failed => 3,
            ProcessStatus::Killed => 4,
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("status code {code} is not declared in the process manager schema")]
pub struct UnknownStatusError {
    pub code: i32,
}

/// Decoder for wire status codes, built once from [`STATUS_SCHEMA`].
///
/// A code the schema does not declare fails the whole call; nothing is
/// defaulted to a guessed status.
#[derive(Debug, Clone)]
pub struct StatusCodeMap {
    by_code: HashMap<i32, ProcessStatus>,
}

impl StatusCodeMap {
    pub fn from_schema() -> Self {
        Self {
            by_code: STATUS_SCHEMA.iter().copied().collect(),
        }
    }

    pub fn decode(&self, code: i32) -> Result<ProcessStatus, UnknownStatusError> {
        self.by_code
            .get(&code)
            .copied()
            .ok_or(UnknownStatusError { code })
    }
}

impl Default for StatusCodeMap {
    fn default() -> Self {
        Self::from_schema()
    }
}

/// An action an operator can request on a set of processes. Closed set;
/// anything else is rejected at parse time, never coerced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Restart,
    Kill,
    Flush,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Restart => "restart",
            ActionKind::Kill => "kill",
            ActionKind::Flush => "flush",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown process action: {0:?}")]
pub struct InvalidActionError(pub String);

impl FromStr for ActionKind {
    type Err = InvalidActionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "restart" => Ok(ActionKind::Restart),
            "kill" => Ok(ActionKind::Kill),
            "flush" => Ok(ActionKind::Flush),
            _ => Err(InvalidActionError(input.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid process name pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("a name query needs at least one pattern")]
    Empty,
}

/// Selects the processes an operation targets: name regex patterns or an
/// explicit uuid set, never both in one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProcessQuery {
    Names(Vec<String>),
    Uuids(Vec<Uuid>),
}

impl ProcessQuery {
    pub const MATCH_ALL: &'static str = ".*";

    /// The wildcard form: one pattern matching every process name.
    pub fn all() -> Self {
        Self::Names(vec![Self::MATCH_ALL.to_string()])
    }

    /// Builds a name query, rejecting patterns that are not valid regexes
    /// before anything reaches the wire.
    pub fn names<I, S>(patterns: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            return Err(QueryError::Empty);
        }
        for pattern in &patterns {
            if let Err(source) = Regex::new(pattern) {
                return Err(QueryError::Pattern {
                    pattern: pattern.clone(),
                    source,
                });
            }
        }
        Ok(Self::Names(patterns))
    }

    pub fn uuids(uuids: impl IntoIterator<Item = Uuid>) -> Self {
        Self::Uuids(uuids.into_iter().collect())
    }

    pub fn single(uuid: Uuid) -> Self {
        Self::Uuids(vec![uuid])
    }
}

/// One decoded log record; windows are chronological, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLine {
    pub line: String,
}

/// A message relayed from the external broadcast bus, consumed
/// destructively by whoever drains the relay next.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastMessage {
    pub received_at: DateTime<Utc>,
    pub text: String,
}
