use crate::engine::Decision;
use crate::error::GuardError;
use crate::list::AddressEntry;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque command identifier.
pub type CommandId = String;

/// Execution metadata attached to each command.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandMeta {
    /// Command identifier (unique per request).
    pub id: CommandId,
    /// Who issued the command, if the transport knows.
    #[serde(default)]
    pub principal: Option<String>,
    /// Timestamp in milliseconds (epoch).
    #[serde(default)]
    pub timestamp_millis: Option<u128>,
}

impl CommandMeta {
    /// Fresh metadata with a random id and the current time.
    pub fn generate() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            principal: None,
            timestamp_millis: SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis()),
        }
    }

    /// Attach the issuing principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

/// Errors returned by the router itself, as opposed to a failed command.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum CommandError {
    /// Command text or JSON did not decode.
    #[error("decode: {0}")]
    Decode(String),
    /// An [`AuditSink`](super::AuditSink) rejected the record. The command
    /// itself was already applied.
    #[error("audit: {0}")]
    Audit(String),
}

/// Structured command failure payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandFailure {
    /// Caller provided invalid arguments.
    InvalidArgs {
        /// human-friendly description of the invalid input
        msg: String,
    },
    /// The exact subnet already exists in a list.
    Conflict {
        /// which pair and list collided
        msg: String,
    },
    /// Requested resource was not found.
    NotFound {
        /// identifier of missing resource
        what: String,
    },
    /// Catch-all internal error.
    Internal {
        /// internal error message
        msg: String,
    },
}

impl From<&GuardError> for CommandFailure {
    fn from(err: &GuardError) -> Self {
        match err {
            GuardError::Validation(e) => CommandFailure::InvalidArgs { msg: e.to_string() },
            GuardError::Conflict { .. } => CommandFailure::Conflict { msg: err.to_string() },
            GuardError::NotFound { list, subnet } => {
                CommandFailure::NotFound { what: format!("{subnet} in the {list} list") }
            }
            other => CommandFailure::Internal { msg: other.to_string() },
        }
    }
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandFailure::InvalidArgs { msg } => write!(f, "{msg}"),
            CommandFailure::Conflict { msg } => write!(f, "{msg}"),
            CommandFailure::NotFound { what } => write!(f, "{what} not found"),
            CommandFailure::Internal { msg } => write!(f, "{msg}"),
        }
    }
}

/// Command result type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResult {
    /// Command acknowledged (success).
    Ack,
    /// Outcome of a `check` command.
    Decision {
        /// The engine's decision.
        decision: Decision,
    },
    /// A subnet was added under `id`.
    Added {
        /// Assigned id.
        id: u64,
    },
    /// Answer to an exact membership query.
    Listed {
        /// Whether the pair is present.
        present: bool,
    },
    /// Every entry of one list.
    Entries {
        /// Entries ordered by id.
        entries: Vec<AddressEntry>,
    },
    /// Command failed.
    Error {
        /// Why.
        failure: CommandFailure,
    },
}

impl CommandResult {
    /// Whether this result reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(self, CommandResult::Error { .. })
    }
}

impl From<Result<CommandResult, GuardError>> for CommandResult {
    fn from(res: Result<CommandResult, GuardError>) -> Self {
        res.unwrap_or_else(|e| CommandResult::Error { failure: CommandFailure::from(&e) })
    }
}

/// Audit record emitted after command execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Command ID.
    pub id: CommandId,
    /// Command label.
    pub label: String,
    /// Principal who executed the command.
    pub principal: String,
    /// Status/Result of execution.
    pub status: String,
}

/// Record of a command execution for history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryRecord {
    /// Metadata from the request.
    pub meta: CommandMeta,
    /// Command label.
    pub label: String,
    /// Result of the execution.
    pub result: CommandResult,
}
