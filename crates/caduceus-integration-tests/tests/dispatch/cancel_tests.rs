//! Cancellation and registry replacement.

use std::sync::Arc;
use std::time::Duration;

use caduceus_runtime::ProtocolRegistry;
use caduceus_test::prelude::*;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_cancel_during_slow_handler_discards_everything() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("1")]))
        .with_protocol(slow_protocol(
            "b",
            "t2",
            ["X"],
            Duration::from_secs(2),
            vec![log_effect("2")],
        ))
        .build();
    let dispatcher = Arc::new(dispatcher);
    let token = CancellationToken::new();

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let token = token.clone();
        tokio::spawn(async move {
            dispatcher
                .dispatch_cancellable(test_event("X"), &token)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();

    let cancelled = task.await.unwrap().unwrap_err();
    assert_eq!(cancelled.event_type, test_event_type("X"));
    assert_eq!(cancelled.completed, 1);
}

#[tokio::test]
async fn test_uncancelled_token_behaves_like_dispatch() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("1")]))
        .build();

    let report = dispatcher
        .dispatch_cancellable(test_event("X"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.effects, dispatcher.dispatch(test_event("X")).await);
}

#[tokio::test]
async fn test_replaced_registry_applies_to_next_dispatch() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("old")]))
        .build();

    let mut registry = ProtocolRegistry::new();
    registry
        .register(static_protocol("b", "t1", ["X"], vec![log_effect("new")]))
        .unwrap();
    let previous = dispatcher.replace_registry(registry);
    assert!(previous.contains(&test_protocol_id("a", "t1")));

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects[0].payload["message"], "new");
}

#[tokio::test]
async fn test_in_flight_dispatch_keeps_its_registry() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(slow_protocol(
            "a",
            "t1",
            ["X"],
            Duration::from_millis(200),
            vec![log_effect("old")],
        ))
        .build();
    let dispatcher = Arc::new(dispatcher);

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(test_event("X")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    dispatcher.replace_registry(ProtocolRegistry::new());

    let effects = task.await.unwrap();
    assert_eq!(effects.len(), 1);
    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
}
