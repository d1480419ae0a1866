//! Transport configuration
//!
//! The base URL depends on where the client page is served from: the
//! recognized development hosts talk to the local backend, everything else
//! uses the page's own origin.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend used when the page is served from a development host.
pub const DEV_API_ORIGIN: &str = "http://localhost:8000";

const DEV_HOSTNAMES: [&str; 2] = ["localhost", "127.0.0.1"];
const DEV_PORT: u16 = 3000;

/// Location of the page hosting the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLocation {
    /// Scheme + host + optional port, e.g. `https://roadworks.example`
    pub origin: String,
    pub hostname: String,
    pub port: Option<u16>,
}

impl PageLocation {
    pub fn new(origin: &str, hostname: &str, port: Option<u16>) -> Self {
        PageLocation {
            origin: origin.trim_end_matches('/').to_string(),
            hostname: hostname.to_string(),
            port,
        }
    }

    /// Whether this page is one of the development hosts.
    pub fn is_development(&self) -> bool {
        DEV_HOSTNAMES.contains(&self.hostname.as_str()) || self.port == Some(DEV_PORT)
    }

    /// Base URL for API requests issued from this page.
    pub fn api_base_url(&self) -> String {
        if self.is_development() {
            DEV_API_ORIGIN.to_string()
        } else {
            self.origin.clone()
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Prefix for relative request paths
    pub base_url: String,
    /// Wall-clock limit for a single attempt (milliseconds)
    pub timeout_ms: u64,
    /// Total attempts per call, including the first one
    pub retry_attempts: u32,
    /// Linear backoff unit (milliseconds)
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEV_API_ORIGIN.to_string(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_delay_ms: 1_000,
        }
    }
}

impl ApiConfig {
    /// Config for a client hosted on the given page.
    pub fn for_page(page: &PageLocation) -> Self {
        ApiConfig {
            base_url: page.api_base_url(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ApiConfig::default();
        assert_eq!(cfg.timeout_ms, 30_000);
        assert_eq!(cfg.retry_attempts, 3);
        assert_eq!(cfg.retry_delay_ms, 1_000);
    }

    #[test]
    fn test_development_hosts_use_local_backend() {
        let localhost = PageLocation::new("http://localhost:5173", "localhost", Some(5173));
        let loopback = PageLocation::new("http://127.0.0.1", "127.0.0.1", None);
        let dev_port = PageLocation::new("http://10.0.0.5:3000", "10.0.0.5", Some(3000));

        for page in [localhost, loopback, dev_port] {
            assert_eq!(ApiConfig::for_page(&page).base_url, DEV_API_ORIGIN);
        }
    }

    #[test]
    fn test_production_uses_page_origin() {
        let page = PageLocation::new("https://roadworks.example/", "roadworks.example", None);
        assert_eq!(
            ApiConfig::for_page(&page).base_url,
            "https://roadworks.example"
        );
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = ApiConfig::default().with_retry(5, Duration::from_millis(250));
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ApiConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
        assert_eq!(back.retry_delay_ms, 250);
    }
}
