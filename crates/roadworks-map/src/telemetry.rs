//! Tracing set-up for hosts embedding the roadworks crates.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events `level` applies to when `RUST_LOG` is unset.
const CRATES: [&str; 2] = ["roadworks_api", "roadworks_map"];

/// Filter directives used without `RUST_LOG`: `level` for the roadworks
/// crates, warnings for everything else (HTTP client internals mostly).
pub fn default_directives(level: Level) -> String {
    let mut directives = vec![Level::WARN.as_str().to_lowercase()];
    directives.extend(
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level.as_str().to_lowercase())),
    );
    directives.join(",")
}

/// Install the global subscriber. `json` switches to one JSON object per
/// line with span context. Returns `false` if a subscriber was already set.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };

    match installed {
        Ok(()) => {
            tracing::debug!(event = "telemetry.installed", json = json, level = %level);
            true
        }
        Err(_) => false,
    }
}
