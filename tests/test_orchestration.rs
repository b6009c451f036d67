mod common;

use common::{apply_completions, monitor_with, sample_fields, CallKind, ScriptedBackend};
use field_monitor::bus::{drain, MonitorEvent};
use field_monitor::controller::{AnalysisState, TrendState};
use field_monitor::models::{DateRange, Field, Provider, VegetationIndex};
use field_monitor::views::MapView;
use chrono::NaiveDate;

#[tokio::test]
async fn test_out_of_order_provider_switch_keeps_latest() {
    let backend = ScriptedBackend::new(sample_fields());
    backend.hold_responses();
    let (mut monitor, _session) = monitor_with(backend.clone());
    let mut events = monitor.subscribe();

    monitor.refresh_fields().await.unwrap();
    monitor.select_field("f1").await.unwrap();
    monitor.set_provider(Some(Provider::LissIv)).unwrap();
    monitor.set_provider(Some(Provider::HrData)).unwrap();
    let latest = monitor.set_provider(Some(Provider::Eos04)).unwrap();

    // Four triggers, each with an analysis and a trend request
    backend.wait_for_held(8).await;

    // Newest first, then the superseded ones in scrambled order
    assert_eq!(backend.release_provider(Some(Provider::Eos04)), 2);
    assert_eq!(apply_completions(&mut monitor, 2).await, 2);
    assert_eq!(backend.release_provider(Some(Provider::LissIv)), 2);
    assert_eq!(backend.release_provider(None), 2);
    assert_eq!(backend.release_provider(Some(Provider::HrData)), 2);
    assert_eq!(apply_completions(&mut monitor, 6).await, 0);

    match monitor.controller().state() {
        AnalysisState::Settled { token, selection, result } => {
            assert_eq!(*token, latest);
            assert_eq!(selection.provider, Some(Provider::Eos04));
            assert_eq!(result.image.provider.as_deref(), Some("eos_04"));
        }
        other => panic!("expected settled analysis, got {:?}", other),
    }
    match monitor.controller().trend() {
        TrendState::Ready(series) => assert!(series.dates()[0].ends_with("eos_04")),
        other => panic!("expected ready trend, got {:?}", other),
    }

    let events = drain(&mut events);
    let settled: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, MonitorEvent::AnalysisSettled { .. }))
        .collect();
    assert_eq!(settled.len(), 1);
    assert!(matches!(settled[0], MonitorEvent::AnalysisSettled { token, .. } if *token == latest));
}

#[tokio::test]
async fn test_response_arrival_never_overrides_trigger_order() {
    let backend = ScriptedBackend::new(sample_fields());
    backend.hold_responses();
    let (mut monitor, _session) = monitor_with(backend.clone());

    monitor.refresh_fields().await.unwrap();
    monitor.select_field("f1").await.unwrap();
    let second = monitor.set_provider(Some(Provider::HrData)).unwrap();
    backend.wait_for_held(4).await;

    // The later trigger resolves first; the earlier one arrives afterwards
    backend.release_provider(Some(Provider::HrData));
    apply_completions(&mut monitor, 2).await;
    backend.release_provider(None);
    apply_completions(&mut monitor, 2).await;

    assert_eq!(monitor.controller().state().token(), Some(second));
    let result = monitor.controller().state().result().unwrap();
    assert_eq!(result.image.provider.as_deref(), Some("hr_data"));
}

#[tokio::test]
async fn test_index_switch_issues_no_request() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    let mut events = monitor.subscribe();

    monitor.refresh_fields().await.unwrap();
    monitor.select_field("f1").await.unwrap();
    monitor.settle().await;
    let token = monitor.controller().current_token();
    let calls_before = backend.calls().len();

    monitor.set_index(VegetationIndex::Evi);
    monitor.set_index(VegetationIndex::Moisture);
    tokio::task::yield_now().await;

    assert_eq!(backend.calls().len(), calls_before);
    assert_eq!(monitor.controller().current_token(), token);
    assert!(matches!(monitor.controller().state(), AnalysisState::Settled { .. }));
    assert_eq!(monitor.selection().index, VegetationIndex::Moisture);
    assert!(drain(&mut events).contains(&MonitorEvent::IndexChanged(VegetationIndex::Moisture)));
}

#[tokio::test]
async fn test_provider_without_field_is_noop() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();

    assert!(monitor.set_provider(Some(Provider::LissIv)).is_none());
    assert_eq!(monitor.filters().provider(), None);
    assert_eq!(backend.count(CallKind::Analyze), 0);
}

#[tokio::test]
async fn test_date_range_change_requeries_with_dates() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();
    monitor.select_field("f2").await.unwrap();
    monitor.settle().await;

    let start = NaiveDate::from_ymd_opt(2024, 1, 1);
    let end = NaiveDate::from_ymd_opt(2024, 3, 31);
    let range = DateRange::new(start, end).unwrap();
    assert!(monitor.set_date_range(range).unwrap().is_some());
    monitor.settle().await;

    let last_analyze = backend
        .calls()
        .into_iter()
        .filter(|c| c.kind == CallKind::Analyze)
        .last()
        .unwrap();
    assert_eq!(last_analyze.date_range, range);
    assert_eq!(last_analyze.field_id.as_deref(), Some("f2"));
}

#[tokio::test]
async fn test_inverted_date_range_leaves_selection_unchanged() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();
    monitor.select_field("f1").await.unwrap();
    monitor.settle().await;
    let analyze_calls = backend.count(CallKind::Analyze);

    let inverted = DateRange {
        start: NaiveDate::from_ymd_opt(2024, 5, 1),
        end: NaiveDate::from_ymd_opt(2024, 4, 1),
    };
    assert!(monitor.set_date_range(inverted).is_err());
    assert!(monitor.filters().date_range().is_unbounded());
    assert_eq!(backend.count(CallKind::Analyze), analyze_calls);
}

#[tokio::test]
async fn test_unknown_field_reloads_registry() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();

    let mut fields = sample_fields();
    fields.push(common::square_field("f4", "New Plot", 78.3, 20.3));
    backend.set_fields(fields);

    let err = monitor.select_field("f4").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(backend.count(CallKind::ListFields), 2);
    assert_eq!(backend.count(CallKind::Analyze), 0);

    // The reloaded list now knows the field
    monitor.select_field("f4").await.unwrap();
    monitor.settle().await;
    assert!(monitor.controller().state().result().is_some());
}

#[tokio::test]
async fn test_failed_load_retains_previous_fields() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    let mut events = monitor.subscribe();
    monitor.refresh_fields().await.unwrap();

    backend.fail_list(Some("HTTP 503 Service Unavailable"));
    assert!(monitor.refresh_fields().await.unwrap_err().is_fetch());
    assert_eq!(monitor.registry().fields().len(), 3);
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, MonitorEvent::FieldsFailed(m) if m.contains("503"))));
}

#[tokio::test]
async fn test_malformed_geometry_does_not_empty_registry() {
    let listing = r#"[
        {"field_id": "f1", "name": "North Plot", "geometry": {"type": "Polygon", "coordinates": [[[78.1, 20.1], [78.11, 20.1], [78.11, 20.11], [78.1, 20.1]]]}},
        {"field_id": "f2", "name": "Split Plot", "geometry": {"type": "MultiPolygon", "coordinates": [[[[78.2, 20.0], [78.21, 20.0], [78.21, 20.01], [78.2, 20.0]]]]}},
        {"field_id": "f3", "name": "Unmapped Plot", "geometry": null}
    ]"#;
    let fields: Vec<Field> = serde_json::from_str(listing).unwrap();
    let backend = ScriptedBackend::new(fields);
    let (mut monitor, _session) = monitor_with(backend.clone());

    let loaded = monitor.refresh_fields().await.unwrap();
    assert_eq!(loaded.len(), 3);

    let mut map = MapView::new();
    let report = map.redraw(&loaded);
    assert_eq!(report.drawn, 1);
    assert_eq!(report.skipped, vec!["f2".to_string(), "f3".to_string()]);

    // A field without a drawable boundary is still selectable from the list
    monitor.select_field("f2").await.unwrap();
    monitor.settle().await;
    assert!(monitor.controller().state().result().is_some());
}

#[tokio::test]
async fn test_analysis_failure_then_reselect() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, _session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();

    backend.fail_analysis("HTTP 500 Internal Server Error");
    monitor.select_field("f1").await.unwrap();
    monitor.settle().await;
    match monitor.controller().state() {
        AnalysisState::Failed { error, .. } => assert!(error.contains("500")),
        other => panic!("expected failure, got {:?}", other),
    }
    // No automatic retry
    assert_eq!(backend.count(CallKind::Analyze), 1);

    monitor.select_field("f1").await.unwrap();
    assert!(monitor.controller().state().is_requesting());
}

#[tokio::test]
async fn test_unauthorized_clears_credential() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, session) = monitor_with(backend.clone());
    let mut events = monitor.subscribe();
    monitor.refresh_fields().await.unwrap();

    backend.reject_credentials();
    monitor.select_field("f1").await.unwrap();
    monitor.settle().await;

    assert_eq!(session.get_credential().unwrap(), None);
    assert!(!monitor.is_signed_in());
    assert!(drain(&mut events).contains(&MonitorEvent::AuthRequired));
    // Never retried with the same credential
    assert_eq!(backend.count(CallKind::Analyze), 1);
}

#[tokio::test]
async fn test_stale_unauthorized_still_clears_credential() {
    let backend = ScriptedBackend::new(sample_fields());
    backend.hold_responses();
    let (mut monitor, session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();

    monitor.select_field("f1").await.unwrap();
    monitor.select_field("f2").await.unwrap();
    backend.wait_for_held(4).await;

    backend.reject_credentials();
    backend.release_where(|c| c.field_id.as_deref() == Some("f1"));
    assert_eq!(apply_completions(&mut monitor, 2).await, 0);
    assert_eq!(session.get_credential().unwrap(), None);
}

#[tokio::test]
async fn test_stale_unauthorized_spares_reissued_credential() {
    let backend = ScriptedBackend::new(sample_fields());
    backend.hold_responses();
    let (mut monitor, session) = monitor_with(backend.clone());
    let mut events = monitor.subscribe();
    monitor.refresh_fields().await.unwrap();

    monitor.select_field("f1").await.unwrap();
    backend.wait_for_held(2).await;
    backend.reject_credentials();

    // The analysis 401 invalidates the credential both requests were sent with
    assert!(backend.release_oldest_where(|c| c.kind == CallKind::Analyze));
    assert_eq!(apply_completions(&mut monitor, 1).await, 1);
    assert_eq!(session.get_credential().unwrap(), None);

    monitor.sign_in("agronomist", "secret").await.unwrap();
    let retry = monitor.reevaluate().unwrap();
    backend.wait_for_held(3).await;
    drain(&mut events);

    // The first trigger's trend 401 lands after re-authentication
    assert!(backend.release_oldest_where(|c| c.kind == CallKind::Trend));
    assert_eq!(apply_completions(&mut monitor, 1).await, 0);

    assert_eq!(session.get_credential().unwrap().as_deref(), Some("token-abc"));
    assert!(monitor.is_signed_in());
    assert_eq!(monitor.controller().current_token(), Some(retry));
    assert!(monitor.controller().state().is_requesting());
    assert!(!drain(&mut events).contains(&MonitorEvent::AuthRequired));
}

#[tokio::test]
async fn test_sign_in_and_sign_out() {
    let backend = ScriptedBackend::new(sample_fields());
    let (mut monitor, session) = monitor_with(backend.clone());
    session.clear().unwrap();
    let mut events = monitor.subscribe();

    assert!(monitor.sign_in("agronomist", "wrong").await.unwrap_err().is_auth());
    monitor.sign_in("agronomist", "secret").await.unwrap();
    assert_eq!(session.get_credential().unwrap().as_deref(), Some("token-abc"));

    monitor.refresh_fields().await.unwrap();
    monitor.select_field("f1").await.unwrap();
    monitor.set_index(VegetationIndex::Ndwi);
    monitor.sign_out().unwrap();

    assert_eq!(session.get_credential().unwrap(), None);
    assert!(monitor.registry().fields().is_empty());
    assert_eq!(monitor.selection(), Default::default());
    assert_eq!(monitor.controller().state(), &AnalysisState::Idle);
    assert!(drain(&mut events).contains(&MonitorEvent::SignedOut));
}

#[tokio::test]
async fn test_clear_selection_discards_in_flight() {
    let backend = ScriptedBackend::new(sample_fields());
    backend.hold_responses();
    let (mut monitor, _session) = monitor_with(backend.clone());
    monitor.refresh_fields().await.unwrap();

    monitor.select_field("f1").await.unwrap();
    backend.wait_for_held(2).await;
    monitor.clear_selection();

    backend.release_where(|_| true);
    assert_eq!(apply_completions(&mut monitor, 2).await, 0);
    assert_eq!(monitor.controller().state(), &AnalysisState::Idle);
    assert!(monitor.registry().selected().is_none());
}
