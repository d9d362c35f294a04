#![cfg(feature = "control")]
#![allow(missing_docs)]

#[path = "common/test_helpers.rs"]
mod test_helpers;

use bruteguard::control::{
    AdminCommand, CommandFailure, CommandMeta, CommandResult, CommandRouter, MemoryAuditSink,
};
use bruteguard::prelude::*;
use std::sync::Arc;
use test_helpers::fixture;

#[tokio::test]
async fn operator_session_over_text_commands() {
    let f = fixture(Thresholds::new(1, 100, 100));
    let router = CommandRouter::new(f.engine.clone());

    assert_eq!(router.execute_line("wladd 10.0.0.0/8").await.unwrap(), CommandResult::Added { id: 1 });
    assert_eq!(
        router.execute_line("BlacklistAdd 192.168.64.0/24").await.unwrap(),
        CommandResult::Added { id: 1 }
    );
    assert_eq!(
        router.execute_line("wlisin 10.0.0.0/8").await.unwrap(),
        CommandResult::Listed { present: true }
    );

    let res = router.execute_line("blallin").await.unwrap();
    match res {
        CommandResult::Entries { entries } => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].to_string(), "[ID: 1, IP: 192.168.64.0/24]");
        }
        other => panic!("unexpected {other:?}"),
    }

    let res = router.execute_line("request eve pw 192.168.64.200").await.unwrap();
    assert_eq!(
        res,
        CommandResult::Decision { decision: Decision { allowed: false, reason: Reason::Denylisted } }
    );

    router.execute_line("request eve pw 198.51.100.1").await.unwrap();
    let res = router.execute_line("request eve pw 198.51.100.1").await.unwrap();
    assert_eq!(
        res,
        CommandResult::Decision { decision: Decision { allowed: false, reason: Reason::LoginRate } }
    );
    assert_eq!(router.execute_line("logincl eve").await.unwrap(), CommandResult::Ack);
    let res = router.execute_line("request eve pw 198.51.100.1").await.unwrap();
    assert!(matches!(res, CommandResult::Decision { decision } if decision.allowed));

    assert_eq!(router.execute_line("blrm 192.168.64.0/24").await.unwrap(), CommandResult::Ack);
    assert_eq!(router.history().list().await.len(), 10);
}

#[tokio::test]
async fn failures_map_to_structured_results() {
    let f = fixture(Thresholds::default());
    let router = CommandRouter::new(f.engine.clone());
    router.execute_line("bladd 10.0.0.0/8").await.unwrap();

    let res = router.execute_line("wladd 10.0.0.0/8").await.unwrap();
    assert!(matches!(res, CommandResult::Error { failure: CommandFailure::Conflict { .. } }));

    let res = router.execute_line("wlrm 10.0.0.0/8").await.unwrap();
    assert_eq!(
        res,
        CommandResult::Error {
            failure: CommandFailure::NotFound { what: "10.0.0.0/8 in the allow list".into() }
        }
    );

    let res = router.execute_line("ipcl 300.1.1.1").await.unwrap();
    assert!(matches!(res, CommandResult::Error { failure: CommandFailure::InvalidArgs { .. } }));
}

#[tokio::test]
async fn json_commands_and_results_use_tagged_forms() {
    let f = fixture(Thresholds::default());
    let audit = Arc::new(MemoryAuditSink::new());
    let router = CommandRouter::new(f.engine.clone()).with_audit(audit.clone());

    let res = router
        .execute_json(r#"{"cmd":"add_address","list":"whitelist","ip":"203.0.113.0","mask":24}"#)
        .await
        .unwrap();
    assert_eq!(serde_json::to_value(&res).unwrap(), serde_json::json!({"status": "added", "id": 1}));

    let res = router
        .execute_json(r#"{"cmd":"check","login":"a","password":"b","address":"203.0.113.9"}"#)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&res).unwrap(),
        serde_json::json!({
            "status": "decision",
            "decision": {"allowed": true, "reason": "allowlisted"}
        })
    );

    let meta = CommandMeta::generate().with_principal("oncall");
    router.execute(meta, AdminCommand::Health).await.unwrap();

    let records = audit.records().await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].label, "health");
    assert_eq!(records[2].principal, "oncall");
    assert!(records.iter().all(|r| r.status == "ok"));
}
