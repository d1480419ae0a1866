//! Endpoint mapping of the `RoadworksApi` facade.

use roadworks_api::fakes::ScriptedBackend;
use roadworks_api::request::PartValue;
use roadworks_api::{
    ApiConfig, Method, PhotoUpload, RecordId, RepairWorkFilter, RequestBody, RoadworksApi,
    SegmentRequest, TransportClient, WorkStatus,
};
use serde_json::json;

fn api() -> RoadworksApi<ScriptedBackend> {
    RoadworksApi::with_transport(TransportClient::with_backend(
        ApiConfig::default().with_base_url("http://api.test"),
        ScriptedBackend::new(),
    ))
}

fn last_url(api: &RoadworksApi<ScriptedBackend>) -> String {
    api.transport().backend().last_request().unwrap().url
}

#[tokio::test]
async fn search_streets_uses_fast_search_with_limit() {
    let api = api();
    api.transport().backend().push_json(
        200,
        json!([{"street_name": "Сумська вулиця", "street_key": "sumska", "source": "local_cache"}]),
    );

    let found = api.search_streets("Сум ська").await.unwrap();

    assert_eq!(found[0].street_key, "sumska");
    assert_eq!(
        last_url(&api),
        "http://api.test/api/v1/streets/fast-search?q=%D0%A1%D1%83%D0%BC+%D1%81%D1%8C%D0%BA%D0%B0&limit=10"
    );
}

#[tokio::test]
async fn missing_street_geometry_is_none() {
    let api = api();
    api.transport().backend().push_json(200, serde_json::Value::Null);

    let geometry = api.street_geometry("Nowhere street").await.unwrap();

    assert!(geometry.is_none());
    assert_eq!(
        last_url(&api),
        "http://api.test/api/v1/streets/fast-geometry/Nowhere%20street"
    );
}

#[tokio::test]
async fn reverse_geocode_and_osm_geometry_paths() {
    let api = api();
    let backend = api.transport().backend();
    backend.push_json(200, json!({"display_name": "15, Sumska", "road": "Sumska"}));
    backend.push_json(
        200,
        json!({"coordinates": [[1.0, 2.0]], "name": "Sumska", "osm_type": "way", "osm_id": 42}),
    );

    let place = api.reverse_geocode(49.5, 36.25).await.unwrap().unwrap();
    assert_eq!(place.road.as_deref(), Some("Sumska"));
    let requests = backend.requests();
    assert_eq!(
        requests[0].request.url,
        "http://api.test/api/v1/streets/reverse?lat=49.5&lon=36.25"
    );

    let geometry = api.street_geometry_by_osm("way", 42).await.unwrap().unwrap();
    assert_eq!(geometry.osm_id, 42);
    assert_eq!(
        last_url(&api),
        "http://api.test/api/v1/streets/geometry/way/42"
    );
}

#[tokio::test]
async fn calculate_segment_posts_to_local_endpoint() {
    let api = api();
    api.transport().backend().push_json(
        200,
        json!({
            "segment_geojson": {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[36.2, 49.9], [36.3, 50.0]]}},
            "start_point": {}, "end_point": {},
            "distance_meters": 812.4,
            "street_name": "Sumska"
        }),
    );

    let result = api
        .calculate_segment(&SegmentRequest {
            start_lat: 49.9,
            start_lon: 36.2,
            end_lat: 50.0,
            end_lon: 36.3,
            street_name: "Sumska".into(),
        })
        .await
        .unwrap();

    assert_eq!(result.street_name, "Sumska");
    let request = api.transport().backend().last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url, "http://api.test/api/v1/streets/segment-local");
}

#[tokio::test]
async fn repair_works_applies_filters() {
    let api = api();
    let backend = api.transport().backend();
    backend.push_json(200, json!([]));
    backend.push_json(
        200,
        json!([{"id": "3", "start_datetime": "2025-01-01T00:00:00", "location": "1,2"}]),
    );

    api.repair_works(&RepairWorkFilter::default()).await.unwrap();
    assert_eq!(last_url(&api), "http://api.test/api/v1/repair-works/");

    let works = api
        .repair_works(&RepairWorkFilter {
            status: Some(WorkStatus::Completed),
            limit: Some(50),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(works[0].id, RecordId(3));
    assert_eq!(
        last_url(&api),
        "http://api.test/api/v1/repair-works/?status=completed&limit=50"
    );
}

#[tokio::test]
async fn delete_repair_work_accepts_message_body() {
    let api = api();
    api.transport()
        .backend()
        .push_json(200, json!({"message": "Ремонтна робота успішно видалена"}));

    api.delete_repair_work(RecordId(11)).await.unwrap();

    let request = api.transport().backend().last_request().unwrap();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.url, "http://api.test/api/v1/repair-works/11");
}

#[tokio::test]
async fn upload_photo_sends_multipart_form() {
    let api = api();
    api.transport().backend().push_json(
        200,
        json!({
            "id": 1, "repair_work_id": 4, "filename": "pit.jpg",
            "file_path": "uploads/pit.jpg", "sort_order": 0
        }),
    );

    let photo = api
        .upload_photo(
            RecordId(4),
            PhotoUpload::new("pit.jpg", Some("image/jpeg"), vec![0xFF, 0xD8])
                .with_description("pothole"),
        )
        .await
        .unwrap();

    assert_eq!(photo.repair_work_id, RecordId(4));
    let request = api.transport().backend().last_request().unwrap();
    assert_eq!(request.url, "http://api.test/api/v1/repair-works/4/photos");
    assert_eq!(request.header("Content-Type"), None);
    match request.body {
        Some(RequestBody::Multipart(form)) => {
            assert_eq!(form.parts[0].name, "file");
            assert!(matches!(
                form.parts[0].value,
                PartValue::File { ref file_name, .. } if file_name == "pit.jpg"
            ));
            assert_eq!(form.text_field("description"), Some("pothole"));
            assert_eq!(form.text_field("sort_order"), Some("0"));
        }
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[test]
fn photo_url_is_absolute() {
    let api = api();
    assert_eq!(
        api.photo_url(RecordId(4), 9),
        "http://api.test/api/v1/repair-works/4/photos/9/download"
    );
}
