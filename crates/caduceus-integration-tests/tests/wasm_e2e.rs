//! End-to-end tests for WASM protocols.
//!
//! Guests are assembled with `caduceus_test::GuestModule`, written to a temp
//! directory and loaded through the real extism engine.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use caduceus_core::{DiagnosticKind, EffectType};
use caduceus_runtime::ProtocolDescriptor;
use caduceus_sandbox::AllowListBuilder;
use caduceus_test::prelude::*;
use serde_json::json;

fn wasm_protocol(
    dir: &Path,
    plugin: &str,
    name: &str,
    responds_to: &str,
    guest: &GuestModule,
) -> ProtocolDescriptor {
    let module = guest.write_to(dir, &format!("{plugin}/{name}.wasm"));
    ProtocolDescriptor::wasm(
        test_protocol_id(plugin, name),
        [test_event_type(responds_to)],
        module,
        guest.export_name(),
    )
}

#[tokio::test]
async fn test_wasm_protocol_emits_effects() {
    let dir = tempfile::tempdir().unwrap();
    let guest = effects_output(&[
        raw_effect("ADD_BANNER_ALERT", json!({"narrative": "Urgent task"})),
        log_effect("wasm"),
    ]);
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "banner", "show", "TASK_CREATED", &guest))
        .build();

    let effects = dispatcher.dispatch(urgent_task_event()).await;
    assert!(sink.is_empty(), "unexpected diagnostics: {:?}", sink.diagnostics());
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[0].effect_type, EffectType::AddBannerAlert);
    assert_eq!(effects[1].payload["message"], "wasm");
}

#[tokio::test]
async fn test_wasm_single_object_and_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let single = GuestModule::new().output_json(&log_effect("one"));
    let silent = GuestModule::new();
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "a", "single", "X", &single))
        .with_protocol(wasm_protocol(dir.path(), "b", "silent", "X", &silent))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert!(sink.is_empty());
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].payload["message"], "one");
}

#[tokio::test]
async fn test_wasm_trap_isolated_from_native_handler() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "crash", "trap", "X", &GuestModule::new().trap()))
        .with_protocol(static_protocol("ok", "t1", ["X"], vec![log_effect("native")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 1);

    let failures = sink.of_kind(DiagnosticKind::HandlerExecutionError);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].plugin, test_plugin("crash"));
}

#[tokio::test]
async fn test_wasm_nonzero_return_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let guest = effects_output(&[log_effect("ignored")]).returning(1);
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "a", "fail", "X", &guest))
        .build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    assert_eq!(sink.of_kind(DiagnosticKind::HandlerExecutionError).len(), 1);
}

#[tokio::test]
async fn test_wasm_garbage_output_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let guest = GuestModule::new().output("not json");
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "a", "garbage", "X", &guest))
        .build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    assert_eq!(sink.of_kind(DiagnosticKind::HandlerExecutionError).len(), 1);
}

#[tokio::test]
async fn test_wasm_infinite_loop_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "spin", "forever", "X", &GuestModule::new().spin()))
        .with_protocol(static_protocol("ok", "t1", ["X"], vec![log_effect("after")]))
        .with_timeout(Duration::from_millis(200))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 1);

    let timeouts = sink.of_kind(DiagnosticKind::HandlerTimeout);
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].plugin, test_plugin("spin"));
}

#[tokio::test]
async fn test_wasm_denied_import_never_instantiated() {
    let dir = tempfile::tempdir().unwrap();
    let guest = effects_output(&[log_effect("never")]).with_import("os", "system_exec");
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "rogue", "exec", "X", &guest))
        .with_protocol(static_protocol("ok", "t1", ["X"], vec![log_effect("kept")]))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].payload["message"], "kept");

    let denied = sink.of_kind(DiagnosticKind::ImportDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].plugin, test_plugin("rogue"));
    assert!(denied[0].message.contains("os"));
}

#[tokio::test]
async fn test_wasm_unlisted_host_function_denied() {
    let dir = tempfile::tempdir().unwrap();
    let guest = GuestModule::new().with_import("extism:host/user", "spawn_process");
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "rogue", "host", "X", &guest))
        .build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    let denied = sink.of_kind(DiagnosticKind::ImportDenied);
    assert_eq!(denied.len(), 1);
    assert!(denied[0].message.contains("spawn_process"));
}

#[tokio::test]
async fn test_wasm_plugin_named_after_host_module_gets_no_extra_imports() {
    let dir = tempfile::tempdir().unwrap();
    let guest = effects_output(&[log_effect("never")])
        .with_import("wasi_snapshot_preview1", "path_open")
        .with_import("wasi_snapshot_preview1", "sock_accept");
    let allowlist = AllowListBuilder::host_default()
        .with_wasi_preview1()
        .build()
        .unwrap();
    let (dispatcher, sink) = DispatchHarness::new()
        .with_allowlist(allowlist)
        .with_protocol(wasm_protocol(dir.path(), "wasi_snapshot_preview1", "fs", "X", &guest))
        .build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    let denied = sink.of_kind(DiagnosticKind::ImportDenied);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].plugin, test_plugin("wasi_snapshot_preview1"));
    assert!(denied[0].message.contains("path_open"));
}

#[tokio::test]
async fn test_wasm_missing_module_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = ProtocolDescriptor::wasm(
        test_protocol_id("gone", "p"),
        [test_event_type("X")],
        dir.path().join("missing.wasm"),
        "compute",
    );
    let (dispatcher, sink) = DispatchHarness::new().with_protocol(descriptor).build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    assert_eq!(sink.of_kind(DiagnosticKind::LoadError).len(), 1);
}

#[tokio::test]
async fn test_wasm_missing_entrypoint_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let guest = GuestModule::new().with_export("on_event");
    let module = guest.write_to(dir.path(), "p.wasm");
    let descriptor = ProtocolDescriptor::wasm(
        test_protocol_id("a", "p"),
        [test_event_type("X")],
        module,
        "compute",
    );
    let (dispatcher, sink) = DispatchHarness::new().with_protocol(descriptor).build();

    assert!(dispatcher.dispatch(test_event("X")).await.is_empty());
    assert_eq!(sink.of_kind(DiagnosticKind::LoadError).len(), 1);
}

#[tokio::test]
async fn test_wasm_reads_its_secret_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let secret_effects = json!([log_effect("from-secret")]).to_string();
    let guest = GuestModule::new()
        .log("info", "computing")
        .output_secret("EFFECTS");
    let descriptor = wasm_protocol(dir.path(), "a", "secret", "X", &guest)
        .with_secrets(BTreeMap::from([("EFFECTS".to_string(), secret_effects)]));
    let (dispatcher, sink) = DispatchHarness::new().with_protocol(descriptor).build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert!(sink.is_empty(), "unexpected diagnostics: {:?}", sink.diagnostics());
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].payload["message"], "from-secret");
}

#[tokio::test]
async fn test_wasm_dispatch_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let guest = effects_output(&[log_effect("again")]);
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(wasm_protocol(dir.path(), "a", "p", "X", &guest))
        .build();

    let first = dispatcher.dispatch(test_event("X")).await;
    let second = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
}
