//! Roadworks API client
//!
//! Resilient request transport for the roadworks backend:
//!
//! - [`transport`] - `TransportClient` with per-attempt timeout and bounded
//!   linear-backoff retry
//! - [`error`]     - `TransportFailure` taxonomy and user-facing messages
//! - [`api`]       - `RoadworksApi` facade over every backend resource
//! - [`models`]    - wire types (`RepairWork`, `WorkType`, `StreetGeometry`, ...)
//! - [`backend`]   - `HttpBackend` seam and the `reqwest` implementation
//! - [`fakes`]     - scripted backend for tests

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod fakes;
pub mod models;
pub mod request;
pub mod transport;

pub use api::{ApiResult, RoadworksApi};
pub use backend::{BackendError, HttpBackend, ReqwestBackend};
pub use config::{ApiConfig, PageLocation};
pub use error::{ApiError, FailureDetails, FailureStatus, TransportFailure, ValidationIssue};
pub use models::{
    LatLng, NewRepairWork, NewWorkType, Photo, PhotoList, PhotoPatch, PhotoUpload, RecordId,
    RepairWork, RepairWorkFilter, RepairWorkPatch, ReverseGeocode, SegmentRequest,
    SegmentResult, StreetGeometry, StreetSuggestion, WorkStatus, WorkType, WorkTypePatch,
};
pub use request::{HttpRequest, HttpResponse, Method, MultipartForm, RequestBody, RequestDescriptor};
pub use transport::{RetryPolicy, TransportClient};
