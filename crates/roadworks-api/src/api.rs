//! Domain API facade
//!
//! One method per backend resource operation. Everything goes through the
//! [`TransportClient`], so every call gets the same timeout, retry and
//! failure classification.

use crate::backend::{HttpBackend, ReqwestBackend};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::{
    NewRepairWork, NewWorkType, Photo, PhotoList, PhotoPatch, PhotoUpload, RecordId,
    RepairWork, RepairWorkFilter, RepairWorkPatch, ReverseGeocode, SegmentRequest,
    SegmentResult, StreetGeometry, StreetSuggestion, WorkType, WorkTypePatch,
};
use crate::transport::TransportClient;

/// Result type for facade calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

const WORK_TYPES: &str = "/api/v1/work-types/";
const STREETS: &str = "/api/v1/streets";
const REPAIR_WORKS: &str = "/api/v1/repair-works/";

/// Result count requested from the fast street search.
pub const STREET_SEARCH_LIMIT: u32 = 10;

/// Percent-encode a single path segment (spaces as `%20`).
fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn query(pairs: &[(&str, &str)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().copied())
        .finish()
}

/// Typed access to the roadworks backend.
pub struct RoadworksApi<B = ReqwestBackend> {
    transport: TransportClient<B>,
}

impl RoadworksApi<ReqwestBackend> {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            transport: TransportClient::new(config),
        }
    }
}

impl<B: HttpBackend> RoadworksApi<B> {
    pub fn with_transport(transport: TransportClient<B>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &TransportClient<B> {
        &self.transport
    }

    // ===== Work types =====

    pub async fn work_types(&self) -> ApiResult<Vec<WorkType>> {
        self.transport.get(WORK_TYPES).await
    }

    pub async fn create_work_type(&self, work_type: &NewWorkType) -> ApiResult<WorkType> {
        self.transport.post(WORK_TYPES, work_type).await
    }

    pub async fn update_work_type(&self, id: i64, patch: &WorkTypePatch) -> ApiResult<WorkType> {
        self.transport
            .put(&format!("{}{}", WORK_TYPES, id), patch)
            .await
    }

    pub async fn delete_work_type(&self, id: i64) -> ApiResult<()> {
        self.transport
            .delete::<serde_json::Value>(&format!("{}{}", WORK_TYPES, id))
            .await
            .map(|_| ())
    }

    // ===== Streets =====

    /// Prefix search over the backend's street cache.
    pub async fn search_streets(&self, text: &str) -> ApiResult<Vec<StreetSuggestion>> {
        let limit = STREET_SEARCH_LIMIT.to_string();
        let path = format!(
            "{}/fast-search?{}",
            STREETS,
            query(&[("q", text), ("limit", &limit)])
        );
        self.transport.get(&path).await
    }

    /// Geometry of a street by name; `None` when the backend knows no such street.
    pub async fn street_geometry(&self, name: &str) -> ApiResult<Option<StreetGeometry>> {
        let path = format!("{}/fast-geometry/{}", STREETS, encode_segment(name));
        self.transport.get(&path).await
    }

    pub async fn street_geometry_by_osm(
        &self,
        osm_type: &str,
        osm_id: i64,
    ) -> ApiResult<Option<StreetGeometry>> {
        let path = format!(
            "{}/geometry/{}/{}",
            STREETS,
            encode_segment(osm_type),
            osm_id
        );
        self.transport.get(&path).await
    }

    pub async fn reverse_geocode(&self, lat: f64, lon: f64) -> ApiResult<Option<ReverseGeocode>> {
        let path = format!(
            "{}/reverse?{}",
            STREETS,
            query(&[("lat", &lat.to_string()), ("lon", &lon.to_string())])
        );
        self.transport.get(&path).await
    }

    /// Street segment between two points, computed by the backend.
    pub async fn calculate_segment(&self, request: &SegmentRequest) -> ApiResult<SegmentResult> {
        self.transport
            .post(&format!("{}/segment-local", STREETS), request)
            .await
    }

    // ===== Repair works =====

    pub async fn repair_works(&self, filter: &RepairWorkFilter) -> ApiResult<Vec<RepairWork>> {
        let query = filter.to_query();
        let path = if query.is_empty() {
            REPAIR_WORKS.to_string()
        } else {
            format!("{}?{}", REPAIR_WORKS, query)
        };
        self.transport.get(&path).await
    }

    pub async fn repair_work(&self, id: RecordId) -> ApiResult<RepairWork> {
        self.transport
            .get(&format!("{}{}", REPAIR_WORKS, id))
            .await
    }

    pub async fn create_repair_work(&self, work: &NewRepairWork) -> ApiResult<RepairWork> {
        self.transport.post(REPAIR_WORKS, work).await
    }

    pub async fn update_repair_work(
        &self,
        id: RecordId,
        patch: &RepairWorkPatch,
    ) -> ApiResult<RepairWork> {
        self.transport
            .put(&format!("{}{}", REPAIR_WORKS, id), patch)
            .await
    }

    pub async fn delete_repair_work(&self, id: RecordId) -> ApiResult<()> {
        self.transport
            .delete::<serde_json::Value>(&format!("{}{}", REPAIR_WORKS, id))
            .await
            .map(|_| ())
    }

    // ===== Photos =====

    pub async fn photos(&self, work_id: RecordId) -> ApiResult<PhotoList> {
        self.transport
            .get(&format!("{}{}/photos", REPAIR_WORKS, work_id))
            .await
    }

    /// Upload a photo as `multipart/form-data`.
    pub async fn upload_photo(&self, work_id: RecordId, upload: PhotoUpload) -> ApiResult<Photo> {
        self.transport
            .post_multipart(
                &format!("{}{}/photos", REPAIR_WORKS, work_id),
                upload.into_form(),
            )
            .await
    }

    pub async fn update_photo(
        &self,
        work_id: RecordId,
        photo_id: i64,
        patch: &PhotoPatch,
    ) -> ApiResult<Photo> {
        self.transport
            .put(
                &format!("{}{}/photos/{}", REPAIR_WORKS, work_id, photo_id),
                patch,
            )
            .await
    }

    pub async fn delete_photo(&self, work_id: RecordId, photo_id: i64) -> ApiResult<()> {
        self.transport
            .delete::<serde_json::Value>(&format!(
                "{}{}/photos/{}",
                REPAIR_WORKS, work_id, photo_id
            ))
            .await
            .map(|_| ())
    }

    /// Download/view URL of a photo.
    pub fn photo_url(&self, work_id: RecordId, photo_id: i64) -> String {
        self.transport.resolve_url(&format!(
            "{}{}/photos/{}/download",
            REPAIR_WORKS, work_id, photo_id
        ))
    }
}
