//! Roadworks map core
//!
//! Owns an externally supplied map rendering object and keeps it in sync
//! with repair-work records:
//!
//! - [`controller`] - `MapController` life-cycle, viewport, highlights
//! - [`markers`]    - record-to-marker reconciliation
//! - [`view_state`] - `ViewStateStore` surviving remounts, selection observers
//! - [`surface`]    - `MapBackend` seam to the rendering library
//! - [`geometry`]   - coordinate parsing and bounds
//! - [`popup`]      - popup content
//! - [`obs`], [`telemetry`] - tracing hooks and subscriber setup
//! - [`fakes`]      - in-memory map backend for tests
//!
//! The HTTP side lives in `roadworks-api` and is re-exported as [`api`].

pub mod config;
pub mod controller;
pub mod error;
pub mod fakes;
pub mod geometry;
pub mod markers;
pub mod obs;
pub mod popup;
pub mod surface;
pub mod telemetry;
pub mod view_state;

pub use roadworks_api as api;

pub use config::{SurfaceConfig, TileConfig, DEFAULT_CENTER, DEFAULT_ZOOM};
pub use controller::{MapController, SurfaceState};
pub use error::{GeometryError, SurfaceError, SurfaceResult};
pub use geometry::Bounds;
pub use markers::{AddOutcome, MarkerHandle, ReconcileOutcome, RenderVariant, VariantKind};
pub use surface::{
    Animation, ContainerRef, FitOptions, LayerId, LayerSpec, LineStyle, MapBackend, MapHandle,
    MarkerStyle, SurfaceEvent, ViewOptions,
};
pub use view_state::{SelectionObserver, Subscription, ViewState, ViewStateStore};
