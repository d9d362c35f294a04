use super::command::AdminCommand;
use super::types::*;
use crate::engine::DecisionEngine;
use crate::error::GuardError;
use crate::telemetry::{GuardEvent, NullSink, TelemetrySink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Audit sink interface.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    async fn record(&self, record: AuditRecord) -> Result<(), CommandError>;
}

/// Simple audit sink that logs via tracing.
#[derive(Clone, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), CommandError> {
        info!(target: "bruteguard::audit", id=%record.id, label=%record.label, principal=%record.principal, status=%record.status, "audit");
        Ok(())
    }
}

/// In-memory audit sink (tests/diagnostics).
#[derive(Clone, Debug, Default)]
pub struct MemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    /// Create a new in-memory audit sink.
    pub fn new() -> Self {
        Self::default()
    }
    /// Retrieve recorded audit records.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), CommandError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Command history interface (pluggable storage).
#[async_trait]
pub trait CommandHistory: Send + Sync {
    /// Append a command execution record.
    async fn append(&self, record: HistoryRecord);
    /// List recent command history, oldest first.
    async fn list(&self) -> Vec<HistoryRecord>;
    /// Clear history.
    async fn clear(&self);
}

/// Bounded in-memory history; the oldest record is dropped when full.
#[derive(Clone, Debug)]
pub struct InMemoryHistory {
    entries: Arc<Mutex<VecDeque<HistoryRecord>>>,
    capacity: usize,
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::with_capacity(1_000)
    }
}

impl InMemoryHistory {
    /// History keeping at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Arc::new(Mutex::new(VecDeque::new())), capacity: capacity.max(1) }
    }
}

#[async_trait]
impl CommandHistory for InMemoryHistory {
    async fn append(&self, record: HistoryRecord) {
        let mut guard = self.entries.lock().await;
        guard.push_back(record);
        if guard.len() > self.capacity {
            guard.pop_front();
        }
    }

    async fn list(&self) -> Vec<HistoryRecord> {
        self.entries.lock().await.iter().cloned().collect()
    }

    async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

/// Dispatches [`AdminCommand`]s to a [`DecisionEngine`], then records history
/// and audit.
///
/// Engine failures do not fail `execute`; they come back as
/// [`CommandResult::Error`] with a structured [`CommandFailure`]. `Err` is
/// reserved for decode and audit failures.
pub struct CommandRouter<S = NullSink> {
    engine: Arc<DecisionEngine<S>>,
    history: Arc<dyn CommandHistory>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<S> CommandRouter<S> {
    /// Create a router over `engine` with the default in-memory history.
    pub fn new(engine: Arc<DecisionEngine<S>>) -> Self {
        Self { engine, history: Arc::new(InMemoryHistory::default()), audit: None }
    }

    /// Replace the history store.
    pub fn with_history(mut self, history: Arc<dyn CommandHistory>) -> Self {
        self.history = history;
        self
    }

    /// Attach an audit sink to the router.
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// History store in use.
    pub fn history(&self) -> &Arc<dyn CommandHistory> {
        &self.history
    }
}

impl<S> CommandRouter<S>
where
    S: TelemetrySink,
    <S as tower::Service<GuardEvent>>::Future: Send + 'static,
{
    /// Execute a command (engine -> history/audit).
    pub async fn execute(
        &self,
        meta: CommandMeta,
        cmd: AdminCommand,
    ) -> Result<CommandResult, CommandError> {
        let label = cmd.label();
        let result = CommandResult::from(self.dispatch(cmd).await);
        info!(target: "bruteguard::control", id = %meta.id, label, ok = !result.is_error(), "command executed");

        self.history
            .append(HistoryRecord { meta: meta.clone(), label: label.into(), result: result.clone() })
            .await;

        if let Some(sink) = &self.audit {
            let status = match &result {
                CommandResult::Error { failure } => format!("error: {}", failure),
                _ => "ok".into(),
            };
            let record = AuditRecord {
                id: meta.id,
                label: label.into(),
                principal: meta.principal.unwrap_or_else(|| "unknown".into()),
                status,
            };
            sink.record(record).await?;
        }
        Ok(result)
    }

    /// Decode a JSON command (tagged by `cmd`) and execute it with fresh metadata.
    pub async fn execute_json(&self, raw: &str) -> Result<CommandResult, CommandError> {
        let cmd: AdminCommand =
            serde_json::from_str(raw).map_err(|e| CommandError::Decode(e.to_string()))?;
        self.execute(CommandMeta::generate(), cmd).await
    }

    /// Parse an operator text line and execute it with fresh metadata.
    pub async fn execute_line(&self, line: &str) -> Result<CommandResult, CommandError> {
        let cmd: AdminCommand = line.parse().map_err(|e: super::command::ParseCommandError| {
            CommandError::Decode(e.to_string())
        })?;
        self.execute(CommandMeta::generate(), cmd).await
    }

    async fn dispatch(&self, cmd: AdminCommand) -> Result<CommandResult, GuardError> {
        let engine = &self.engine;
        match cmd {
            AdminCommand::Check { login, password, address } => {
                let decision = engine.evaluate(&login, password.expose(), &address).await?;
                Ok(CommandResult::Decision { decision })
            }
            AdminCommand::AddAddress { list, ip, mask } => {
                let id = engine.add_address(list, &ip, mask).await?;
                Ok(CommandResult::Added { id })
            }
            AdminCommand::RemoveAddress { list, ip, mask } => {
                engine.remove_address(list, &ip, mask).await?;
                Ok(CommandResult::Ack)
            }
            AdminCommand::IsListed { list, ip, mask } => {
                let present = engine.is_address_listed_exact(list, &ip, mask).await?;
                Ok(CommandResult::Listed { present })
            }
            AdminCommand::ListAll { list } => {
                let entries = engine.list_all(list).await?;
                Ok(CommandResult::Entries { entries })
            }
            AdminCommand::ResetLogin { login } => {
                engine.reset_login(&login).await?;
                Ok(CommandResult::Ack)
            }
            AdminCommand::ResetAddress { address } => {
                engine.reset_address(&address).await?;
                Ok(CommandResult::Ack)
            }
            AdminCommand::Health => Ok(CommandResult::Ack),
        }
    }
}
