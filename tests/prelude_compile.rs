//! Compile-time prelude coverage test.
use bruteguard::prelude::*;
use std::sync::Arc;
use tower::{service_fn, ServiceBuilder, ServiceExt};

struct Form {
    user: String,
    pass: String,
    peer: String,
}

impl LoginAttempt for Form {
    fn login(&self) -> &str {
        &self.user
    }
    fn password(&self) -> &str {
        &self.pass
    }
    fn address(&self) -> &str {
        &self.peer
    }
}

#[tokio::test]
async fn prelude_reexports_core_types() {
    let engine = DecisionEngine::new(
        Arc::new(InMemoryListStore::new()),
        Arc::new(InMemoryCounterStore::new()),
        Thresholds::default(),
    )
    .with_sink(LogSink);
    let engine = Arc::new(engine);
    engine.add_address(ListKind::Deny, "192.0.2.0", 24).await.expect("add");

    let svc = ServiceBuilder::new()
        .layer(GuardLayer::new(engine))
        .service(service_fn(|form: Form| async move { Ok::<_, std::io::Error>(form.user) }));

    let form = Form { user: "dave".into(), pass: "pw".into(), peer: "192.0.2.44".into() };
    let err: GateError<std::io::Error> = svc.oneshot(form).await.unwrap_err();
    assert_eq!(err.reason(), Some(Reason::Denylisted));
    assert_eq!(err.to_string(), "login attempt denied: IP is in blacklist");
}
