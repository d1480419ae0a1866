//! Map surface configuration

use std::time::Duration;

use roadworks_api::LatLng;
use serde::{Deserialize, Serialize};

/// Kharkiv city centre.
pub const DEFAULT_CENTER: LatLng = LatLng::new(49.9935, 36.2304);
pub const DEFAULT_ZOOM: u8 = 12;

/// Base tile layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileConfig {
    pub url_template: String,
    pub max_zoom: u8,
    pub attribution: String,
}

impl Default for TileConfig {
    fn default() -> Self {
        TileConfig {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            max_zoom: 19,
            attribution: "© OpenStreetMap contributors".to_string(),
        }
    }
}

/// Configuration of the map surface controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    /// Id of the container element the map is mounted into
    pub container_id: String,
    /// Retries after the first initialization attempt
    pub init_retries: u32,
    /// Delay between initialization attempts (milliseconds)
    pub init_retry_delay_ms: u64,
    /// Readiness probes before drawing is abandoned
    pub ready_poll_attempts: u32,
    /// Interval between readiness probes (milliseconds)
    pub ready_poll_interval_ms: u64,
    pub default_center: LatLng,
    pub default_zoom: u8,
    pub tiles: TileConfig,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        SurfaceConfig {
            container_id: "map".to_string(),
            init_retries: 3,
            init_retry_delay_ms: 500,
            ready_poll_attempts: 10,
            ready_poll_interval_ms: 100,
            default_center: DEFAULT_CENTER,
            default_zoom: DEFAULT_ZOOM,
            tiles: TileConfig::default(),
        }
    }
}

impl SurfaceConfig {
    pub fn for_container(container_id: &str) -> Self {
        SurfaceConfig {
            container_id: container_id.to_string(),
            ..Self::default()
        }
    }

    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }
}
