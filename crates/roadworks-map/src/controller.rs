//! Map surface controller.
//!
//! Owns the life-cycle of one map instance:
//!
//! ```text
//! Uninitialized -> Initializing -> Ready -> Destroyed
//!        ^              |            |          |
//!        +--- failed ---+            +-- recreate --> Initializing
//! ```
//!
//! All mutation of the instance and its drawables goes through
//! `&mut MapController`, so there is exactly one owner.

use std::collections::BTreeMap;
use std::sync::Arc;

use roadworks_api::{LatLng, RecordId, SegmentResult, StreetGeometry};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::SurfaceConfig;
use crate::error::{GeometryError, SurfaceError, SurfaceResult};
use crate::geometry::{line_center, parse_line_geometry, Bounds};
use crate::markers::MarkerHandle;
use crate::obs::{self, SurfaceSpan};
use crate::popup;
use crate::surface::{
    Animation, FitOptions, LayerId, LayerSpec, LineStyle, MapBackend, MapHandle, MarkerStyle,
    SurfaceEvent, ViewOptions,
};
use crate::view_state::ViewStateStore;

pub const HIGHLIGHT_COLOR: &str = "#ff6b6b";
pub const TEMP_MARKER_COLOR: &str = "#4CAF50";

const FIT_PADDING: u32 = 30;
const FIT_MAX_ZOOM: u8 = 16;

/// Life-cycle state of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

type ClickHandler = Box<dyn FnMut(LatLng) + Send>;
type ReadyHandler = Box<dyn FnMut() + Send>;

/// Single owner of a map instance and everything drawn on it.
pub struct MapController<B: MapBackend> {
    backend: B,
    config: SurfaceConfig,
    view_state: Arc<ViewStateStore>,
    state: SurfaceState,
    map: Option<MapHandle>,
    pub(crate) markers: BTreeMap<RecordId, MarkerHandle>,
    temp_markers: Vec<LayerId>,
    highlight: Option<LayerId>,
    selected_segment: Option<LayerId>,
    segment_popup: Option<LayerId>,
    click_handler: Option<ClickHandler>,
    ready_handler: Option<ReadyHandler>,
    last_click: Option<LatLng>,
}

impl<B: MapBackend> MapController<B> {
    pub fn new(backend: B, config: SurfaceConfig, view_state: Arc<ViewStateStore>) -> Self {
        MapController {
            backend,
            config,
            view_state,
            state: SurfaceState::Uninitialized,
            map: None,
            markers: BTreeMap::new(),
            temp_markers: Vec::new(),
            highlight: None,
            selected_segment: None,
            segment_popup: None,
            click_handler: None,
            ready_handler: None,
            last_click: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn view_state(&self) -> &Arc<ViewStateStore> {
        &self.view_state
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn map(&self) -> Option<MapHandle> {
        self.map
    }

    // ===== Life-cycle =====

    /// Create the map instance, retrying within the configured bound.
    ///
    /// A missing container is retried after the fixed delay. Other failures
    /// wait `delay * (attempt + 1)`. Any existing instance is torn down first.
    pub async fn initialize(
        &mut self,
        center: Option<LatLng>,
        zoom: Option<u8>,
    ) -> SurfaceResult<MapHandle> {
        let retries = self.config.init_retries;
        let mut attempt: u32 = 0;

        loop {
            self.state = SurfaceState::Initializing;
            match self.try_create(center, zoom, attempt) {
                Ok(map) => {
                    self.state = SurfaceState::Ready;
                    obs::emit_surface_initialized(&self.config.container_id, attempt + 1);
                    if let Some(handler) = self.ready_handler.as_mut() {
                        handler();
                    }
                    return Ok(map);
                }
                Err(err) => {
                    self.state = self.settled_state();
                    if attempt >= retries {
                        obs::emit_surface_init_failed(
                            &self.config.container_id,
                            attempt + 1,
                            &err,
                        );
                        return Err(err);
                    }
                    let delay = match err {
                        SurfaceError::ContainerNotFound { .. } => self.config.init_retry_delay(),
                        _ => self.config.init_retry_delay() * (attempt + 1),
                    };
                    warn!(
                        event = "surface.init_retry",
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// State matching the instance after a failed attempt. A previous
    /// instance survives failures that happen before it is torn down.
    fn settled_state(&self) -> SurfaceState {
        if self.map.is_some() {
            SurfaceState::Ready
        } else {
            SurfaceState::Uninitialized
        }
    }

    fn try_create(
        &mut self,
        center: Option<LatLng>,
        zoom: Option<u8>,
        attempt: u32,
    ) -> SurfaceResult<MapHandle> {
        let container = self
            .backend
            .lookup_container(&self.config.container_id)
            .ok_or_else(|| SurfaceError::ContainerNotFound {
                container_id: self.config.container_id.clone(),
                attempts: attempt + 1,
            })?;
        if !self.backend.is_loaded() {
            return Err(SurfaceError::LibraryNotLoaded);
        }
        if self.map.is_some() {
            self.destroy();
            self.state = SurfaceState::Initializing;
        }

        let map = self
            .backend
            .create_map(&container)
            .map_err(SurfaceError::CreateFailed)?;
        self.map = Some(map);

        let center = center.unwrap_or(self.config.default_center);
        let zoom = zoom.unwrap_or(self.config.default_zoom);
        self.backend
            .set_view(map, center, zoom, ViewOptions::new(Animation::Instant));

        let tiles = &self.config.tiles;
        self.backend.add_layer(
            map,
            LayerSpec::Tiles {
                url_template: tiles.url_template.clone(),
                max_zoom: tiles.max_zoom,
                attribution: tiles.attribution.clone(),
            },
        );
        debug!(event = "surface.created", container_id = %container.id, generation = container.generation);
        Ok(map)
    }

    /// State-aware entry point used whenever the map view is (re)mounted.
    ///
    /// An existing instance still bound to the very same attached container
    /// is reused and its view restored. Otherwise the surface is recreated,
    /// at the stored viewport when one was saved before.
    pub async fn mount(&mut self) -> SurfaceResult<MapHandle> {
        let stored = self.view_state.snapshot();

        if stored.initialized {
            if let Some(map) = self.map {
                let current = self.backend.lookup_container(&self.config.container_id);
                let bound = self.backend.container_of(map);
                let same = match (&current, &bound) {
                    (Some(current), Some(bound)) => {
                        current == bound && self.backend.is_attached(bound)
                    }
                    _ => false,
                };
                if same {
                    self.restore_view_state();
                    self.wait_until_ready().await;
                    return Ok(map);
                }
                info!(event = "surface.container_changed", container_id = %self.config.container_id);
                self.destroy();
            }
        }

        let (center, zoom) = if stored.initialized {
            (Some(stored.center), Some(stored.zoom))
        } else {
            (None, None)
        };
        let map = self.initialize(center, zoom).await?;
        self.wait_until_ready().await;

        if let Some((_, geometry)) = stored.selection() {
            self.draw_highlight(geometry);
        }
        self.view_state.mark_initialized();
        Ok(map)
    }

    /// Instance exists and its container is attached with a non-zero size.
    pub fn is_ready(&self) -> bool {
        let Some(map) = self.map else {
            return false;
        };
        match self.backend.container_of(map) {
            Some(container) => {
                let (width, height) = self.backend.container_size(&container);
                self.backend.is_attached(&container) && width > 0 && height > 0
            }
            None => false,
        }
    }

    /// Poll readiness within the configured bound, re-laying out the map
    /// after every miss. Returns `false` when the bound is exhausted.
    pub async fn wait_until_ready(&mut self) -> bool {
        let attempts = self.config.ready_poll_attempts;
        let mut attempt: u32 = 0;
        loop {
            if self.is_ready() {
                return true;
            }
            if attempt >= attempts {
                break;
            }
            attempt += 1;
            debug!(
                event = "surface.waiting",
                attempt = attempt,
                max_attempts = attempts,
            );
            sleep(self.config.ready_poll_interval()).await;
            if let Some(map) = self.map {
                self.backend.invalidate_size(map);
            }
        }
        warn!(event = "surface.not_ready", attempts = attempts);
        false
    }

    /// Clear every drawable and release the instance. Safe to repeat.
    pub fn destroy(&mut self) {
        let Some(map) = self.map else {
            return;
        };
        let _span = SurfaceSpan::enter(&self.config.container_id);
        self.clear_records();
        self.clear_temp_markers();
        self.clear_highlighted_street();
        self.clear_selected_segment();
        self.backend.remove_map(map);
        self.map = None;
        self.state = SurfaceState::Destroyed;
        obs::emit_surface_destroyed(&self.config.container_id);
    }

    // ===== Events =====

    /// Register the click handler, replacing any previous one.
    pub fn on_click<F>(&mut self, handler: F)
    where
        F: FnMut(LatLng) + Send + 'static,
    {
        self.click_handler = Some(Box::new(handler));
    }

    pub fn clear_click_handler(&mut self) {
        self.click_handler = None;
    }

    /// Called after every successful initialization.
    pub fn on_ready<F>(&mut self, handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.ready_handler = Some(Box::new(handler));
    }

    /// Route an event raised by the library.
    pub fn handle_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Click(at) => {
                self.last_click = Some(at);
                if let Some(handler) = self.click_handler.as_mut() {
                    handler(at);
                }
            }
            SurfaceEvent::MoveEnd | SurfaceEvent::ZoomEnd => {
                let Some(map) = self.map else {
                    return;
                };
                if let (Some(center), Some(zoom)) =
                    (self.backend.center(map), self.backend.zoom(map))
                {
                    self.view_state.save_viewport(center, zoom);
                }
            }
        }
    }

    /// Last clicked point, else the map center when ready.
    pub fn current_point(&self) -> Option<LatLng> {
        if self.last_click.is_some() {
            return self.last_click;
        }
        if !self.is_ready() {
            return None;
        }
        self.map.and_then(|map| self.backend.center(map))
    }

    // ===== Viewport =====

    pub(crate) fn apply_view(&mut self, center: LatLng, zoom: u8, animation: Animation) {
        if let Some(map) = self.map {
            self.backend
                .set_view(map, center, zoom, ViewOptions::new(animation));
        }
    }

    pub fn set_view(&mut self, center: LatLng, zoom: u8, animation: Animation) {
        if !self.is_ready() {
            return;
        }
        self.apply_view(center, zoom, animation);
    }

    /// Fit the camera to `points` (padding 30, max zoom 16).
    pub fn fit_bounds(&mut self, points: &[LatLng], animation: Animation) {
        if !self.is_ready() || points.is_empty() {
            return;
        }
        let bounds = Bounds::from_points(points);
        self.fit(
            bounds,
            FitOptions {
                padding: FIT_PADDING,
                max_zoom: FIT_MAX_ZOOM,
                animation,
            },
        );
    }

    /// Fit the camera to multi-segment geometry.
    ///
    /// More than 10 segments widen the padding to 50, more than 5 cap the
    /// zoom at 15. Segments shorter than two points do not count towards
    /// the bounds.
    pub fn fit_bounds_for_segments(&mut self, segments: &[Vec<LatLng>], animation: Animation) {
        if !self.is_ready() || segments.is_empty() {
            return;
        }
        let bounds = Bounds::from_points(segments.iter().filter(|s| s.len() >= 2).flatten());
        let options = FitOptions {
            padding: if segments.len() > 10 { 50 } else { FIT_PADDING },
            max_zoom: if segments.len() > 5 { 15 } else { FIT_MAX_ZOOM },
            animation,
        };
        self.fit(bounds, options);
    }

    fn fit(&mut self, bounds: Bounds, options: FitOptions) {
        let Some(map) = self.map else {
            return;
        };
        if !bounds.is_valid() {
            warn!(event = "surface.invalid_bounds");
            return;
        }
        self.backend.fit_bounds(map, bounds, options);
    }

    // ===== Drawables =====

    /// Remove a drawable; groups lose every child before the group itself.
    pub(crate) fn remove_drawable(&mut self, layer: LayerId) {
        let Some(map) = self.map else {
            return;
        };
        let children = self.backend.group_children(layer);
        if !children.is_empty() {
            for child in children {
                if self.backend.has_layer(map, child) {
                    self.backend.remove_layer(map, child);
                }
            }
            self.backend.clear_group(map, layer);
        }
        if self.backend.has_layer(map, layer) {
            self.backend.remove_layer(map, layer);
        }
    }

    pub(crate) fn add_drawable(&mut self, spec: LayerSpec) -> Option<LayerId> {
        let map = self.map?;
        Some(self.backend.add_layer(map, spec))
    }

    fn highlight_spec(points: &[LatLng]) -> LayerSpec {
        LayerSpec::Polyline {
            points: points.to_vec(),
            style: LineStyle::new(HIGHLIGHT_COLOR, 5, 0.9).with_class("highlighted-street"),
            popup: None,
        }
    }

    /// Draw the street highlight without moving the camera.
    pub(crate) fn draw_highlight(&mut self, geometry: &StreetGeometry) -> Option<LayerId> {
        let segments: Vec<&Vec<LatLng>> = geometry
            .segments
            .iter()
            .flatten()
            .filter(|s| s.len() >= 2)
            .collect();
        let spec = if geometry.segments.as_ref().map_or(false, |s| !s.is_empty()) {
            if segments.is_empty() {
                return None;
            }
            LayerSpec::Group {
                children: segments
                    .into_iter()
                    .map(|s| Self::highlight_spec(s))
                    .collect(),
            }
        } else if !geometry.coordinates.is_empty() {
            Self::highlight_spec(&geometry.coordinates)
        } else {
            return None;
        };
        let layer = self.add_drawable(spec)?;
        self.highlight = Some(layer);
        Some(layer)
    }

    /// Highlight a street and fit the camera to it.
    pub fn highlight_street(&mut self, geometry: &StreetGeometry) {
        if !self.is_ready() {
            return;
        }
        self.clear_highlighted_street();
        if self.draw_highlight(geometry).is_none() {
            return;
        }
        match geometry.segments.as_ref().filter(|s| !s.is_empty()) {
            Some(segments) => self.fit_bounds_for_segments(segments, Animation::Animated),
            None => self.fit_bounds(&geometry.coordinates, Animation::Animated),
        }
    }

    pub fn clear_highlighted_street(&mut self) {
        if let Some(layer) = self.highlight.take() {
            self.remove_drawable(layer);
        }
    }

    pub fn highlighted_street(&self) -> Option<LayerId> {
        self.highlight
    }

    /// Draw a calculated segment and open its summary popup.
    pub fn display_segment(&mut self, result: &SegmentResult) -> Result<(), GeometryError> {
        if !self.is_ready() {
            return Ok(());
        }
        let lines = parse_line_geometry(&result.segment_geojson)?;
        self.clear_selected_segment();

        let style = LineStyle::new(HIGHLIGHT_COLOR, 8, 0.9).with_class("selected-segment");
        let spec = match lines.as_slice() {
            [line] => LayerSpec::Polyline {
                points: line.clone(),
                style,
                popup: None,
            },
            _ => LayerSpec::Group {
                children: lines
                    .iter()
                    .map(|line| LayerSpec::Polyline {
                        points: line.clone(),
                        style: style.clone(),
                        popup: None,
                    })
                    .collect(),
            },
        };
        self.selected_segment = self.add_drawable(spec);

        let points: Vec<LatLng> = lines.into_iter().flatten().collect();
        let center = line_center(&points);
        if let Some(map) = self.map {
            let popup = self
                .backend
                .open_popup(map, center, &popup::segment_popup(result));
            self.segment_popup = Some(popup);
        }
        Ok(())
    }

    pub fn clear_selected_segment(&mut self) {
        if let Some(layer) = self.selected_segment.take() {
            self.remove_drawable(layer);
        }
        if let Some(popup) = self.segment_popup.take() {
            if let Some(map) = self.map {
                self.backend.close_popup(map, popup);
            }
        }
    }

    pub fn selected_segment(&self) -> Option<LayerId> {
        self.selected_segment
    }

    /// Small green marker for a point being picked.
    pub fn add_temp_marker(&mut self, at: LatLng) -> Option<LayerId> {
        if !self.is_ready() {
            return None;
        }
        let layer = self.add_drawable(LayerSpec::Marker {
            at,
            style: MarkerStyle {
                color: TEMP_MARKER_COLOR.to_string(),
                size: 16,
                class_name: "temp-marker".to_string(),
            },
            popup: None,
        })?;
        self.temp_markers.push(layer);
        Some(layer)
    }

    pub fn clear_temp_markers(&mut self) {
        for layer in std::mem::take(&mut self.temp_markers) {
            self.remove_drawable(layer);
        }
    }

    pub fn temp_markers(&self) -> &[LayerId] {
        &self.temp_markers
    }
}
