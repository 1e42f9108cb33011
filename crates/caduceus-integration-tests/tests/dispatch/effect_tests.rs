//! Effect validation at the dispatch boundary.

use caduceus_core::{DiagnosticKind, EffectType};
use caduceus_runtime::EffectValidator;
use caduceus_test::prelude::*;
use serde_json::json;

#[tokio::test]
async fn test_unknown_effect_type_dropped_siblings_kept() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol(
            "a",
            "t1",
            ["X"],
            vec![
                log_effect("before"),
                raw_effect("LAUNCH_ROCKETS", json!({})),
                log_effect("after"),
            ],
        ))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    let raw: Vec<_> = effects.iter().map(caduceus_core::Effect::to_raw).collect();
    assert_eq!(raw, vec![log_effect("before"), log_effect("after")]);

    let rejected = sink.of_kind(DiagnosticKind::EffectShapeError);
    assert_eq!(rejected.len(), 1);
    assert!(rejected[0].message.contains("LAUNCH_ROCKETS"));
}

#[tokio::test]
async fn test_malformed_effects_each_reported() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol(
            "a",
            "t1",
            ["X"],
            vec![
                json!("not an object"),
                json!({"payload": {}}),
                json!({"type": "LOG", "payload": [1, 2]}),
                json!({"type": "LOG", "payload": {}, "extra": true}),
                raw_effect("ADD_BANNER_ALERT", json!({"narrative": "urgent"})),
            ],
        ))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].effect_type, EffectType::AddBannerAlert);
    assert_eq!(sink.of_kind(DiagnosticKind::EffectShapeError).len(), 4);
}

#[tokio::test]
async fn test_string_payload_holding_json_object_accepted() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_protocol(static_protocol(
            "a",
            "t1",
            ["X"],
            vec![json!({"type": "CREATE_TASK", "payload": "{\"title\": \"Call patient\"}"})],
        ))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert!(sink.is_empty());
    assert_eq!(effects[0].payload, json!({"title": "Call patient"}));
}

#[tokio::test]
async fn test_oversized_payload_rejected() {
    let (dispatcher, sink) = DispatchHarness::new()
        .with_validator(EffectValidator::new().with_max_payload_bytes(32))
        .with_protocol(static_protocol(
            "a",
            "t1",
            ["X"],
            vec![
                log_effect("ok"),
                raw_effect("LOG", json!({"message": "x".repeat(64)})),
            ],
        ))
        .build();

    let effects = dispatcher.dispatch(test_event("X")).await;
    assert_eq!(effects.len(), 1);
    assert_eq!(sink.of_kind(DiagnosticKind::EffectShapeError).len(), 1);
}

#[tokio::test]
async fn test_rejected_effects_listed_on_record() {
    let (dispatcher, _sink) = DispatchHarness::new()
        .with_protocol(static_protocol(
            "a",
            "t1",
            ["X"],
            vec![raw_effect("NOPE", json!({})), log_effect("ok")],
        ))
        .build();

    let report = dispatcher.dispatch_report(test_event("X")).await;
    let record = &report.records[0];
    assert!(record.is_success());
    assert_eq!(record.effects().len(), 1);
    assert_eq!(record.rejected.len(), 1);
    assert_eq!(record.rejected[0].field, "type");
}
