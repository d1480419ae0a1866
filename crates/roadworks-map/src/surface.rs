//! Boundary to the external map rendering library.
//!
//! The controller never talks to a concrete library. Everything it needs
//! (container probing, map creation, layers, viewport, popups) goes through
//! [`MapBackend`]. The in-memory implementation lives in [`crate::fakes`].

use roadworks_api::LatLng;
use serde::{Deserialize, Serialize};

use crate::geometry::Bounds;

/// A container element as seen at lookup time.
///
/// Re-mounting an element with the same id yields a new `generation`, so two
/// refs compare equal only when they point at the very same element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerRef {
    pub id: String,
    pub generation: u64,
}

/// Handle of a live map instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapHandle(pub u64);

/// Handle of a drawable owned by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

/// Round marker appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: String,
    /// Diameter in pixels
    pub size: u32,
    pub class_name: String,
}

/// Polyline appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
    pub weight: u32,
    pub opacity: f64,
    pub class_name: Option<String>,
}

impl LineStyle {
    pub fn new(color: &str, weight: u32, opacity: f64) -> Self {
        LineStyle {
            color: color.to_string(),
            weight,
            opacity,
            class_name: None,
        }
    }

    pub fn with_class(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_string());
        self
    }
}

/// What to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Tiles {
        url_template: String,
        max_zoom: u8,
        attribution: String,
    },
    Marker {
        at: LatLng,
        style: MarkerStyle,
        popup: Option<String>,
    },
    Polyline {
        points: Vec<LatLng>,
        style: LineStyle,
        popup: Option<String>,
    },
    /// Children are registered as separate layers owned by the group.
    Group { children: Vec<LayerSpec> },
}

/// Whether a viewport change is animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Animation {
    Animated,
    /// Only used when restoring a saved view.
    Instant,
}

impl Animation {
    pub fn is_animated(&self) -> bool {
        matches!(self, Animation::Animated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub animation: Animation,
    /// Animation length in seconds
    pub duration: f64,
}

impl ViewOptions {
    pub fn new(animation: Animation) -> Self {
        let duration = match animation {
            Animation::Animated => 0.25,
            Animation::Instant => 0.0,
        };
        ViewOptions {
            animation,
            duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Pixel padding on every side
    pub padding: u32,
    pub max_zoom: u8,
    pub animation: Animation,
}

/// Events raised by the library and routed through the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    Click(LatLng),
    MoveEnd,
    ZoomEnd,
}

/// Operations consumed from the map rendering library.
pub trait MapBackend {
    /// Whether the library itself is available.
    fn is_loaded(&self) -> bool;

    /// Find the container element by id.
    fn lookup_container(&mut self, id: &str) -> Option<ContainerRef>;

    /// Whether the element is still part of the document.
    fn is_attached(&self, container: &ContainerRef) -> bool;

    /// Rendered `(width, height)` of the element.
    fn container_size(&self, container: &ContainerRef) -> (u32, u32);

    fn create_map(&mut self, container: &ContainerRef) -> Result<MapHandle, String>;

    /// Release the instance and every layer still attached to it.
    fn remove_map(&mut self, map: MapHandle);

    /// Container the instance was created in.
    fn container_of(&self, map: MapHandle) -> Option<ContainerRef>;

    fn invalidate_size(&mut self, map: MapHandle);

    fn set_view(&mut self, map: MapHandle, center: LatLng, zoom: u8, options: ViewOptions);

    fn fit_bounds(&mut self, map: MapHandle, bounds: Bounds, options: FitOptions);

    fn center(&self, map: MapHandle) -> Option<LatLng>;

    fn zoom(&self, map: MapHandle) -> Option<u8>;

    fn add_layer(&mut self, map: MapHandle, spec: LayerSpec) -> LayerId;

    /// Detach a single layer. A group's children are left in place.
    fn remove_layer(&mut self, map: MapHandle, layer: LayerId);

    fn has_layer(&self, map: MapHandle, layer: LayerId) -> bool;

    fn group_children(&self, group: LayerId) -> Vec<LayerId>;

    /// Detach every child of a group.
    fn clear_group(&mut self, map: MapHandle, group: LayerId);

    /// Standalone popup anchored at a point.
    fn open_popup(&mut self, map: MapHandle, at: LatLng, content: &str) -> LayerId;

    fn close_popup(&mut self, map: MapHandle, popup: LayerId);
}
