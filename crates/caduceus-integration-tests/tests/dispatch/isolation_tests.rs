//! Per-handler isolation: one handler's failure never affects another.

use std::time::Duration;

use caduceus_core::DiagnosticKind;
use caduceus_test::prelude::*;

#[tokio::test]
async fn test_scenario_failing_second_handler() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("t1")]))
        .with_protocol(failing_protocol("b", "t2", ["X"], "boom"))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(
        effects.iter().map(caduceus_core::Effect::to_raw).collect::<Vec<_>>(),
        vec![log_effect("t1")]
    );

    let failures = sink.of_kind(DiagnosticKind::HandlerExecutionError);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].plugin, test_plugin("b"));
    assert_eq!(failures[0].protocol, test_protocol_id("b", "t2"));
    assert!(failures[0].message.contains("boom"));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_failing_handler_between_two_others_keeps_order() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("1")]))
        .with_protocol(failing_protocol("b", "t2", ["X"], "boom"))
        .with_protocol(static_protocol("c", "t3", ["X"], vec![log_effect("3")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    let raw: Vec<_> = effects.iter().map(caduceus_core::Effect::to_raw).collect();
    assert_eq!(raw, vec![log_effect("1"), log_effect("3")]);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_system_exec_import_denied_alone() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(importing_protocol(
            "rogue",
            "exec",
            ["X"],
            "os.system_exec",
            vec![log_effect("never")],
        ))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert!(effects.is_empty());

    let denied = sink.of_kind(DiagnosticKind::ImportDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].plugin, test_plugin("rogue"));
    assert!(denied[0].message.contains("os.system_exec"));
}

#[tokio::test]
async fn test_system_exec_import_denied_among_others() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol("a", "t1", ["X"], vec![log_effect("1")]))
        .with_protocol(importing_protocol(
            "rogue",
            "exec",
            ["X"],
            "os.system_exec",
            vec![log_effect("never")],
        ))
        .with_protocol(static_protocol("c", "t3", ["X"], vec![log_effect("3")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    let raw: Vec<_> = effects.iter().map(caduceus_core::Effect::to_raw).collect();
    assert_eq!(raw, vec![log_effect("1"), log_effect("3")]);
    assert_eq!(sink.of_kind(DiagnosticKind::ImportDenied).len(), 1);
}

#[tokio::test]
async fn test_allowed_and_own_package_imports_load() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(importing_protocol(
            "a",
            "sdk",
            ["X"],
            "caduceus.effects",
            vec![log_effect("sdk")],
        ))
        .with_protocol(importing_protocol(
            "banner",
            "own",
            ["X"],
            "banner.helpers",
            vec![log_effect("own")],
        ))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 2);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_plugin_named_after_system_package_cannot_import_it() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(importing_protocol(
            "os",
            "exec",
            ["X"],
            "os.system_exec",
            vec![log_effect("never")],
        ))
        .build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    let denied = sink.of_kind(DiagnosticKind::ImportDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].plugin, test_plugin("os"));
    assert!(denied[0].message.contains("os.system_exec"));
}

#[tokio::test]
async fn test_panicking_handler_is_contained() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(panicking_protocol("a", "t1", ["X"], "kaboom"))
        .with_protocol(static_protocol("b", "t2", ["X"], vec![log_effect("2")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 1);

    let panics = sink.of_kind(DiagnosticKind::HandlerPanicked);
    assert_eq!(panics.len(), 1);
    assert!(panics[0].message.contains("kaboom"));
}

#[tokio::test]
async fn test_slow_handler_times_out_and_others_continue() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(slow_protocol(
            "slow",
            "t1",
            ["X"],
            Duration::from_secs(2),
            vec![log_effect("late")],
        ))
        .with_protocol(static_protocol("b", "t2", ["X"], vec![log_effect("2")]))
        .with_timeout(Duration::from_millis(50))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    let raw: Vec<_> = effects.iter().map(caduceus_core::Effect::to_raw).collect();
    assert_eq!(raw, vec![log_effect("2")]);

    let timeouts = sink.of_kind(DiagnosticKind::HandlerTimeout);
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].plugin, test_plugin("slow"));
}

#[tokio::test]
async fn test_denied_import_checked_on_every_dispatch() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(importing_protocol("rogue", "net", ["X"], "socket", vec![]))
        .build();

    dispatcher.dispatch(test_event("X")).await;
    dispatcher.dispatch(test_event("X")).await;
    assert_eq!(sink.of_kind(DiagnosticKind::ImportDenied).len(), 2);
}
