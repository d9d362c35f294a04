//! Operator control plane: list administration, counter resets and ad-hoc
//! checks as transport-agnostic commands.
//!
//! Transports decode an [`AdminCommand`] from JSON or from an operator text
//! line, and hand it to a [`CommandRouter`]. The router calls the engine,
//! converts failures into a structured [`CommandFailure`], appends to a
//! [`CommandHistory`] and records an [`AuditRecord`].
//!
//! ```rust
//! use bruteguard::control::{CommandResult, CommandRouter};
//! use bruteguard::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = Arc::new(DecisionEngine::new(
//!     Arc::new(InMemoryListStore::new()),
//!     Arc::new(InMemoryCounterStore::new()),
//!     Thresholds::default(),
//! ));
//! let router = CommandRouter::new(engine);
//! let added = router.execute_line("bladd 10.0.0.0/8").await.unwrap();
//! assert_eq!(added, CommandResult::Added { id: 1 });
//! let res = router
//!     .execute_json(r#"{"cmd":"is_listed","list":"deny","ip":"10.0.0.0","mask":8}"#)
//!     .await
//!     .unwrap();
//! assert_eq!(res, CommandResult::Listed { present: true });
//! # }
//! ```

mod command;
mod router;
mod types;

pub use command::{AdminCommand, ParseCommandError, Secret};
pub use router::{
    AuditSink, CommandHistory, CommandRouter, InMemoryHistory, MemoryAuditSink, TracingAuditSink,
};
pub use types::{
    AuditRecord, CommandError, CommandFailure, CommandId, CommandMeta, CommandResult,
    HistoryRecord,
};
