//! Handler ordering and basic dispatch behavior.

use caduceus_core::EffectType;
use caduceus_test::prelude::*;

fn messages(effects: &[caduceus_core::Effect]) -> Vec<String> {
    effects
        .iter()
        .map(|e| e.payload["message"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_event_with_no_handlers_yields_nothing() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["Y"], vec![log_effect("a:t1")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert!(effects.is_empty());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_effects_follow_registration_order() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("zeta", "first", ["X"], vec![log_effect("1")]))
        .with_protocol(static_protocol(
            "alpha",
            "second",
            ["X"],
            vec![log_effect("2a"), log_effect("2b")],
        ))
        .with_protocol(static_protocol("mid", "third", ["X"], vec![log_effect("3")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(messages(&effects), vec!["1", "2a", "2b", "3"]);
}

#[tokio::test]
async fn test_only_subscribed_handlers_run() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "both", ["X", "Y"], vec![log_effect("both")]))
        .with_protocol(static_protocol("b", "only_y", ["Y"], vec![log_effect("only_y")]))
        .build();

    assert_eq!(messages(&dispatcher.dispatch(test_event("X")).await), vec!["both"]);
    assert_eq!(
        messages(&dispatcher.dispatch(test_event("Y")).await),
        vec!["both", "only_y"]
    );
}

#[tokio::test]
async fn test_same_event_twice_gives_identical_effects() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("a")]))
        .with_protocol(echo_protocol("b", "echo", ["X"]))
        .build();
    let event = urgent_task_event();
    let event = caduceus_core::Event {
        event_type: test_event_type("X"),
        ..event
    };

    let first = dispatcher.dispatch(event.clone()).await;
    let second = dispatcher.dispatch(event).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn test_handler_sees_bound_event() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(echo_protocol("a", "echo", ["TASK_CREATED"]))
        .build();

    let effects = dispatcher.dispatch(urgent_task_event()).await;
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].effect_type, EffectType::Log);
    let echoed = &effects[0].payload;
    assert_eq!(echoed["target"]["id"], "task-1");
    assert_eq!(echoed["context"]["task"]["priority"], "urgent");
}

#[tokio::test]
async fn test_report_has_one_record_per_handler() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("a")]))
        .with_protocol(failing_protocol("b", "t2", ["X"], "boom"))
        .build();

    let report = dispatcher.dispatch_report(test_event("X")).await;
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].protocol, test_protocol_id("a", "t1"));
    assert!(report.records[0].is_success());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.effects.len(), 1);
    assert!(!report.dispatch_id.is_nil());
}
