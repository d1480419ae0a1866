//! Error types for roadworks-map

use thiserror::Error;

/// Failures of the map surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// Container element never appeared
    #[error("map container {container_id:?} not found after {attempts} attempt(s)")]
    ContainerNotFound { container_id: String, attempts: u32 },

    /// Rendering library is not available
    #[error("map rendering library is not loaded")]
    LibraryNotLoaded,

    /// The library refused to create an instance
    #[error("map creation failed: {0}")]
    CreateFailed(String),

    /// Operation needs a live instance
    #[error("map surface is not initialized")]
    NotInitialized,
}

/// Failures while decoding record geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid GeoJSON: {0}")]
    InvalidJson(String),

    #[error("unsupported geometry type: {0}")]
    UnsupportedType(String),

    #[error("geometry has no usable coordinates")]
    Empty,

    #[error("coordinate out of range: ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },
}

impl From<serde_json::Error> for GeometryError {
    fn from(err: serde_json::Error) -> Self {
        GeometryError::InvalidJson(err.to_string())
    }
}

/// Result type for surface operations
pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;
