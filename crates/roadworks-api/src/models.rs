//! Wire models for the roadworks backend.
//!
//! Field names follow the backend's JSON. Identifiers of repair works are
//! normalized to [`RecordId`] while decoding, so nothing downstream ever
//! compares a string id against a numeric one.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::request::MultipartForm;

/// Marker color for records without a work type.
pub const DEFAULT_WORK_COLOR: &str = "#667eea";

// ---------------------------------------------------------------------------
// Identifiers and coordinates
// ---------------------------------------------------------------------------

/// Canonical repair work identifier.
///
/// Decodes from a JSON number or from a string holding an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId(id)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RecordId)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct RecordIdVisitor;

impl<'de> Visitor<'de> for RecordIdVisitor {
    type Value = RecordId;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("an integer or a string holding an integer")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RecordId, E> {
        Ok(RecordId(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RecordId, E> {
        i64::try_from(v)
            .map(RecordId)
            .map_err(|_| E::custom(format!("record id {} out of range", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RecordId, E> {
        v.parse()
            .map_err(|_| E::custom(format!("invalid record id {:?}", v)))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RecordIdVisitor)
    }
}

/// Geographic point, `[lat, lng]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    /// Finite and inside the WGS84 range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        LatLng { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

// ---------------------------------------------------------------------------
// Work types
// ---------------------------------------------------------------------------

fn default_color() -> String {
    DEFAULT_WORK_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
}

impl NewWorkType {
    pub fn new(name: &str, color: &str) -> Self {
        NewWorkType {
            name: name.to_string(),
            description: None,
            color: color.to_string(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkTypePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

// ---------------------------------------------------------------------------
// Streets
// ---------------------------------------------------------------------------

/// Entry of the fast prefix search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetSuggestion {
    pub street_name: String,
    pub street_key: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Street line geometry, `[lat, lng]` ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetGeometry {
    /// Single-line geometry
    #[serde(default)]
    pub coordinates: Vec<LatLng>,
    /// Multi-segment geometry; preferred over `coordinates` when non-empty
    #[serde(default)]
    pub segments: Option<Vec<Vec<LatLng>>>,
    pub name: String,
    pub osm_type: String,
    pub osm_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocode {
    pub display_name: String,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub road: Option<String>,
    #[serde(default)]
    pub suburb: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
}

/// Input for the street segment calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRequest {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    pub street_name: String,
}

/// Street segment between two points; `segment_geojson` is a GeoJSON
/// Feature with `[lon, lat]` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub segment_geojson: Value,
    #[serde(default)]
    pub start_point: Value,
    #[serde(default)]
    pub end_point: Value,
    pub distance_meters: f64,
    pub street_name: String,
}

// ---------------------------------------------------------------------------
// Repair works
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Cancelled,
    Delayed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::Planned => "planned",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::Completed => "completed",
            WorkStatus::Cancelled => "cancelled",
            WorkStatus::Delayed => "delayed",
        }
    }
}

/// A repair work as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairWork {
    pub id: RecordId,

    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_location: Option<String>,
    #[serde(default)]
    pub end_location: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub start_latitude: Option<f64>,
    #[serde(default)]
    pub start_longitude: Option<f64>,
    #[serde(default)]
    pub end_latitude: Option<f64>,
    #[serde(default)]
    pub end_longitude: Option<f64>,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,

    pub start_datetime: String,
    /// Absent while the work is ongoing
    #[serde(default)]
    pub end_datetime: Option<String>,
    #[serde(default)]
    pub planned_duration_hours: Option<u32>,

    #[serde(default)]
    pub status: WorkStatus,
    #[serde(default)]
    pub work_type_id: Option<i64>,
    #[serde(default)]
    pub work_type: Option<WorkType>,

    /// GeoJSON text of the selected street segment
    #[serde(default)]
    pub street_segment_geojson: Option<String>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub street_osm_type: Option<String>,
    #[serde(default)]
    pub street_osm_id: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RepairWork {
    /// Minimal record; everything but id and start time left empty.
    pub fn new(id: impl Into<RecordId>, start_datetime: &str) -> Self {
        RepairWork {
            id: id.into(),
            location: None,
            start_location: None,
            end_location: None,
            latitude: None,
            longitude: None,
            start_latitude: None,
            start_longitude: None,
            end_latitude: None,
            end_longitude: None,
            description: None,
            notes: None,
            start_datetime: start_datetime.to_string(),
            end_datetime: None,
            planned_duration_hours: None,
            status: WorkStatus::Planned,
            work_type_id: None,
            work_type: None,
            street_segment_geojson: None,
            street_name: None,
            street_osm_type: None,
            street_osm_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.end_datetime.is_none()
    }

    /// Marker color: the work type's, or the default.
    pub fn color(&self) -> &str {
        self.work_type
            .as_ref()
            .map(|t| t.color.as_str())
            .unwrap_or(DEFAULT_WORK_COLOR)
    }
}

/// Body of a create call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRepairWork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub start_datetime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_duration_hours: Option<u32>,
    pub status: WorkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_segment_geojson: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_osm_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_osm_id: Option<String>,
}

/// Body of an update call; only present fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairWorkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_segment_geojson: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
}

/// Query filters for listing repair works. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairWorkFilter {
    pub status: Option<WorkStatus>,
    pub work_type_id: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_completed: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl RepairWorkFilter {
    /// URL-encoded query string, empty when no filter is set.
    pub fn to_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());

        if let Some(status) = self.status {
            query.append_pair("status", status.as_str());
        }
        if let Some(id) = self.work_type_id {
            query.append_pair("work_type_id", &id.to_string());
        }
        if let Some(start) = self.start_date.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("start_date", start);
        }
        if let Some(end) = self.end_date.as_deref().filter(|s| !s.is_empty()) {
            query.append_pair("end_date", end);
        }
        if let Some(done) = self.is_completed {
            query.append_pair("is_completed", if done { "true" } else { "false" });
        }
        if let Some(limit) = self.limit {
            query.append_pair("limit", &limit.to_string());
        }
        if let Some(offset) = self.offset {
            query.append_pair("offset", &offset.to_string());
        }

        query.finish()
    }
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub repair_work_id: RecordId,
    pub filename: String,
    pub file_path: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoList {
    pub photos: Vec<Photo>,
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

/// A photo file to attach to a repair work.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
    pub sort_order: i32,
}

impl PhotoUpload {
    pub fn new(file_name: &str, mime_type: Option<&str>, bytes: Vec<u8>) -> Self {
        PhotoUpload {
            file_name: file_name.to_string(),
            mime_type: mime_type.map(str::to_string),
            bytes,
            description: None,
            sort_order: 0,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Multipart body: `file`, `description` (only when non-empty),
    /// `sort_order`.
    pub fn into_form(self) -> MultipartForm {
        let mut form = MultipartForm::new().file(
            "file",
            &self.file_name,
            self.mime_type.as_deref(),
            self.bytes,
        );
        if let Some(description) = self.description.filter(|d| !d.is_empty()) {
            form = form.text("description", description);
        }
        form.text("sort_order", self.sort_order.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_accepts_numbers_and_strings() {
        let from_number: RecordId = serde_json::from_value(json!(42)).unwrap();
        let from_string: RecordId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, RecordId(42));

        assert!(serde_json::from_value::<RecordId>(json!("forty-two")).is_err());
    }

    #[test]
    fn repair_work_decodes_backend_shape() {
        let work: RepairWork = serde_json::from_value(json!({
            "id": "7",
            "location": "49.99, 36.23",
            "latitude": 49.99,
            "longitude": 36.23,
            "start_datetime": "2025-03-01T08:00:00",
            "end_datetime": null,
            "status": "in_progress",
            "work_type": {"id": 1, "name": "Asphalt", "color": "#FF0000"}
        }))
        .unwrap();

        assert_eq!(work.id, RecordId(7));
        assert_eq!(work.status, WorkStatus::InProgress);
        assert!(work.is_ongoing());
        assert_eq!(work.color(), "#FF0000");
    }

    #[test]
    fn color_defaults_without_work_type() {
        let work = RepairWork::new(1, "2025-03-01T08:00:00");
        assert_eq!(work.color(), DEFAULT_WORK_COLOR);
    }

    #[test]
    fn street_geometry_uses_lat_lng_pairs() {
        let geometry: StreetGeometry = serde_json::from_value(json!({
            "coordinates": [[49.99, 36.23], [49.98, 36.24]],
            "segments": null,
            "name": "Sumska",
            "osm_type": "way",
            "osm_id": 1
        }))
        .unwrap();

        assert_eq!(geometry.coordinates[1], LatLng::new(49.98, 36.24));
        assert!(geometry.segments.is_none());
    }

    #[test]
    fn filter_skips_unset_fields() {
        assert_eq!(RepairWorkFilter::default().to_query(), "");

        let filter = RepairWorkFilter {
            status: Some(WorkStatus::InProgress),
            work_type_id: Some(3),
            start_date: Some(String::new()),
            is_completed: Some(false),
            ..Default::default()
        };
        assert_eq!(
            filter.to_query(),
            "status=in_progress&work_type_id=3&is_completed=false"
        );
    }

    #[test]
    fn photo_form_omits_empty_description() {
        let form = PhotoUpload::new("a.jpg", Some("image/jpeg"), vec![1, 2, 3]).into_form();
        assert_eq!(form.text_field("description"), None);
        assert_eq!(form.text_field("sort_order"), Some("0"));

        let form = PhotoUpload::new("a.jpg", None, vec![])
            .with_description("crack")
            .into_form();
        assert_eq!(form.text_field("description"), Some("crack"));
    }
}
