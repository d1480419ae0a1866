//! Marker reconciliation against the in-memory map backend.

use std::time::Duration;

use roadworks_map::api::{RecordId, RepairWork, WorkType};
use roadworks_map::fakes::{MapOp, MemoryMapBackend};
use roadworks_map::{
    LayerSpec, MapBackend, MapController, SurfaceConfig, VariantKind, ViewStateStore,
};
use serde_json::json;
use tokio::time::Instant;

const TWO_LINES: &str = r#"{"type":"MultiLineString","coordinates":[[[36.1,49.9],[36.2,50.0]],[[36.3,50.1],[36.4,50.2]]]}"#;

async fn ready_controller() -> MapController<MemoryMapBackend> {
    let mut c = MapController::new(
        MemoryMapBackend::with_container("map"),
        SurfaceConfig::default(),
        ViewStateStore::shared(),
    );
    c.initialize(None, None).await.unwrap();
    c.backend_mut().clear_ops();
    c
}

fn point(id: i64, lat: f64, lng: f64) -> RepairWork {
    let mut w = RepairWork::new(id, "2025-03-01T08:30:00");
    w.latitude = Some(lat);
    w.longitude = Some(lng);
    w
}

#[tokio::test(start_paused = true)]
async fn second_identical_refresh_changes_nothing() {
    let mut c = ready_controller().await;
    let records = vec![point(1, 1.0, 1.0), point(2, 2.0, 2.0)];

    let first = c.reconcile(&records).await;
    assert_eq!(first.added, vec![RecordId(1), RecordId(2)]);
    let mutations = c.backend().layer_mutations();

    let second = c.reconcile(&records).await;
    assert!(second.is_noop());
    assert_eq!(c.backend().layer_mutations(), mutations);
}

#[tokio::test(start_paused = true)]
async fn replaced_record_is_removed_before_new_one_is_added() {
    let mut c = ready_controller().await;
    c.reconcile(&[point(1, 1.0, 1.0)]).await;
    let old = c.marker(RecordId(1)).unwrap().layer;
    c.backend_mut().clear_ops();

    let outcome = c.reconcile(&[point(2, 2.0, 2.0)]).await;

    assert_eq!(outcome.removed, vec![RecordId(1)]);
    assert_eq!(outcome.added, vec![RecordId(2)]);
    assert_eq!(
        c.backend().ops()[0],
        MapOp::RemoveLayer(old),
        "remove phase must run first"
    );
    assert!(matches!(c.backend().ops()[1], MapOp::AddLayer(_)));
    assert_eq!(c.marker_ids(), vec![RecordId(2)]);
    assert_eq!(c.backend().marker_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn segment_geometry_wins_over_point() {
    let mut c = ready_controller().await;
    let mut w = point(7, 1.0, 1.0);
    w.street_segment_geojson = Some(
        r#"{"type":"Feature","geometry":{"type":"LineString","coordinates":[[36.1,49.9],[36.2,50.0]]}}"#
            .into(),
    );
    w.work_type = Some(WorkType {
        id: 3,
        name: "Asphalt".into(),
        description: None,
        color: "#aa0000".into(),
        is_active: true,
        created_at: None,
        updated_at: None,
    });

    c.reconcile(&[w]).await;

    let handle = *c.marker(RecordId(7)).unwrap();
    assert_eq!(handle.kind, VariantKind::Segment);
    match &c.backend().layer(handle.layer).unwrap().spec {
        LayerSpec::Polyline { style, points, .. } => {
            assert_eq!(style.weight, 6);
            assert_eq!(style.color, "#aa0000");
            assert_eq!(points[0].lat, 49.9);
        }
        other => panic!("expected polyline, got {:?}", other),
    }
    assert_eq!(c.backend().marker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn grouped_segment_children_go_before_the_group() {
    let mut c = ready_controller().await;
    let mut w = RepairWork::new(4, "2025-03-01T08:30:00");
    w.street_segment_geojson = Some(TWO_LINES.into());
    c.reconcile(&[w]).await;

    let group = c.marker(RecordId(4)).unwrap().layer;
    let children = c.backend().group_children(group);
    assert_eq!(children.len(), 2);
    c.backend_mut().clear_ops();

    assert!(c.remove_record(RecordId(4)));

    assert_eq!(
        c.backend().ops(),
        &[
            MapOp::RemoveLayer(children[0]),
            MapOp::RemoveLayer(children[1]),
            MapOp::ClearGroup(group),
            MapOp::RemoveLayer(group),
        ]
    );
    assert_eq!(c.backend().polyline_count(), 0);
    assert!(!c.remove_record(RecordId(4)));
}

#[tokio::test(start_paused = true)]
async fn refresh_is_abandoned_when_surface_never_ready() {
    let mut c = ready_controller().await;
    c.backend_mut().resize_container("map", 0, 0);

    let started = Instant::now();
    let outcome = c.reconcile(&[point(1, 1.0, 1.0)]).await;

    assert!(outcome.abandoned);
    assert!(outcome.added.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert!(c.marker_ids().is_empty());
    assert_eq!(c.backend().layer_mutations(), 0);
}

#[tokio::test(start_paused = true)]
async fn undrawable_and_duplicate_records() {
    let mut c = ready_controller().await;
    let mut nowhere = RepairWork::new(2, "2025-03-01T08:30:00");
    nowhere.location = Some("біля мосту".into());
    let mut route = RepairWork::new(3, "2025-03-01T08:30:00");
    route.start_location = Some("49.9,36.2".into());
    route.end_location = Some("50.0,36.3".into());

    let outcome = c
        .reconcile(&[point(1, 1.0, 1.0), point(1, 5.0, 5.0), nowhere, route])
        .await;

    assert_eq!(outcome.added, vec![RecordId(1), RecordId(3)]);
    assert_eq!(outcome.skipped, vec![RecordId(2)]);
    assert_eq!(c.marker(RecordId(3)).unwrap().kind, VariantKind::Route);
    assert_eq!(c.backend().marker_count(), 1);
    assert_eq!(c.backend().polyline_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn ids_are_normalized_once() {
    let mut c = ready_controller().await;
    let records: Vec<RepairWork> = serde_json::from_value(json!([
        {"id": "5", "start_datetime": "2025-03-01T08:30:00", "location": "1,1"}
    ]))
    .unwrap();
    c.reconcile(&records).await;

    let again: Vec<RepairWork> = serde_json::from_value(json!([
        {"id": 5, "start_datetime": "2025-03-01T08:30:00", "location": "1,1"}
    ]))
    .unwrap();
    let outcome = c.reconcile(&again).await;

    assert!(outcome.is_noop());
    assert_eq!(c.marker_ids(), vec![RecordId(5)]);
}

#[tokio::test(start_paused = true)]
async fn popup_is_bound_to_marker() {
    let mut c = ready_controller().await;
    let mut w = point(1, 49.99, 36.23);
    w.description = Some("Ямковий ремонт".into());
    c.reconcile(&[w]).await;

    let layer = c.marker(RecordId(1)).unwrap().layer;
    let popup = c.backend().popup_content(layer).unwrap();
    assert!(popup.contains("Ямковий ремонт"));
    assert!(popup.contains("49.9900, 36.2300"));
    assert!(popup.contains("триває"));
}

#[tokio::test(start_paused = true)]
async fn clear_records_removes_everything() {
    let mut c = ready_controller().await;
    c.reconcile(&[point(1, 1.0, 1.0), point(2, 2.0, 2.0)]).await;

    c.clear_records();

    assert!(c.marker_ids().is_empty());
    assert_eq!(c.backend().marker_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn ready_surface_draws_without_polling_budget() {
    let config = SurfaceConfig {
        ready_poll_attempts: 0,
        ..SurfaceConfig::default()
    };
    let mut c = MapController::new(
        MemoryMapBackend::with_container("map"),
        config,
        ViewStateStore::shared(),
    );
    c.initialize(None, None).await.unwrap();

    let started = Instant::now();
    let outcome = c.reconcile(&[point(1, 1.0, 1.0)]).await;

    assert!(!outcome.abandoned);
    assert_eq!(outcome.added, vec![RecordId(1)]);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn hidden_surface_without_polling_budget_is_abandoned_at_once() {
    let config = SurfaceConfig {
        ready_poll_attempts: 0,
        ..SurfaceConfig::default()
    };
    let mut c = MapController::new(
        MemoryMapBackend::with_container("map"),
        config,
        ViewStateStore::shared(),
    );
    c.initialize(None, None).await.unwrap();
    c.backend_mut().resize_container("map", 0, 0);
    c.backend_mut().clear_ops();

    let outcome = c.reconcile(&[point(1, 1.0, 1.0)]).await;

    assert!(outcome.abandoned);
    assert!(c.backend().ops().is_empty());
}
