//! In-memory map library (testing only)
//!
//! `MemoryMapBackend` simulates the parts of a map rendering library the
//! controller relies on: container elements that can be mounted, detached
//! and resized, a layer registry per map instance, and an operation log.
//! Removing a group layer does not remove its children, so leaked children
//! stay visible in the registry.

use std::collections::{BTreeMap, HashMap};

use roadworks_api::LatLng;

use crate::geometry::Bounds;
use crate::surface::{
    ContainerRef, FitOptions, LayerId, LayerSpec, MapBackend, MapHandle, ViewOptions,
};

/// One recorded call into the library.
#[derive(Debug, Clone, PartialEq)]
pub enum MapOp {
    CreateMap(ContainerRef),
    RemoveMap(MapHandle),
    SetView {
        center: LatLng,
        zoom: u8,
        options: ViewOptions,
    },
    FitBounds {
        bounds: Bounds,
        options: FitOptions,
    },
    AddLayer(LayerId),
    RemoveLayer(LayerId),
    ClearGroup(LayerId),
    InvalidateSize(MapHandle),
    OpenPopup(LayerId),
    ClosePopup(LayerId),
}

#[derive(Debug, Clone)]
struct Element {
    generation: u64,
    attached: bool,
    size: (u32, u32),
}

#[derive(Debug, Clone)]
struct PendingElement {
    lookups_left: u32,
    size: (u32, u32),
}

#[derive(Debug, Clone)]
struct MapState {
    container: ContainerRef,
    center: LatLng,
    zoom: u8,
}

/// A registered drawable.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    pub map: MapHandle,
    pub spec: LayerSpec,
    pub parent: Option<LayerId>,
    pub children: Vec<LayerId>,
}

/// In-memory [`MapBackend`].
#[derive(Debug, Clone)]
pub struct MemoryMapBackend {
    loaded: bool,
    elements: HashMap<String, Element>,
    pending: HashMap<String, PendingElement>,
    maps: BTreeMap<MapHandle, MapState>,
    layers: BTreeMap<LayerId, LayerEntry>,
    failing_creates: u32,
    lookups: u32,
    next_id: u64,
    ops: Vec<MapOp>,
}

impl Default for MemoryMapBackend {
    fn default() -> Self {
        MemoryMapBackend {
            loaded: true,
            elements: HashMap::new(),
            pending: HashMap::new(),
            maps: BTreeMap::new(),
            layers: BTreeMap::new(),
            failing_creates: 0,
            lookups: 0,
            next_id: 1,
            ops: Vec::new(),
        }
    }
}

impl MemoryMapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend with one attached, visible container.
    pub fn with_container(id: &str) -> Self {
        let mut backend = Self::new();
        backend.mount_container(id, 800, 600);
        backend
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ----- document simulation -----

    /// Attach a fresh element; replaces any element with the same id.
    pub fn mount_container(&mut self, id: &str, width: u32, height: u32) -> ContainerRef {
        let generation = self.next();
        self.elements.insert(
            id.to_string(),
            Element {
                generation,
                attached: true,
                size: (width, height),
            },
        );
        ContainerRef {
            id: id.to_string(),
            generation,
        }
    }

    /// The element appears after `lookups` failed lookups.
    pub fn mount_container_after(&mut self, id: &str, lookups: u32) {
        self.pending.insert(
            id.to_string(),
            PendingElement {
                lookups_left: lookups,
                size: (800, 600),
            },
        );
    }

    /// The element stays known but is no longer part of the document.
    pub fn detach_container(&mut self, id: &str) {
        if let Some(element) = self.elements.get_mut(id) {
            element.attached = false;
        }
    }

    pub fn resize_container(&mut self, id: &str, width: u32, height: u32) {
        if let Some(element) = self.elements.get_mut(id) {
            element.size = (width, height);
        }
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Make the next `count` `create_map` calls fail.
    pub fn fail_next_creates(&mut self, count: u32) {
        self.failing_creates = count;
    }

    // ----- inspection -----

    pub fn ops(&self) -> &[MapOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn lookups(&self) -> u32 {
        self.lookups
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerEntry> {
        self.layers.get(&id)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Live layers of a map, in creation order.
    pub fn layers_of(&self, map: MapHandle) -> Vec<(LayerId, &LayerEntry)> {
        self.layers
            .iter()
            .filter(|(_, entry)| entry.map == map)
            .map(|(id, entry)| (*id, entry))
            .collect()
    }

    pub fn marker_count(&self) -> usize {
        self.layers
            .values()
            .filter(|e| matches!(e.spec, LayerSpec::Marker { .. }))
            .count()
    }

    pub fn polyline_count(&self) -> usize {
        self.layers
            .values()
            .filter(|e| matches!(e.spec, LayerSpec::Polyline { .. }))
            .count()
    }

    /// Number of `AddLayer`/`RemoveLayer` operations in the log.
    pub fn layer_mutations(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, MapOp::AddLayer(_) | MapOp::RemoveLayer(_)))
            .count()
    }

    pub fn popup_content(&self, layer: LayerId) -> Option<&str> {
        match self.layers.get(&layer).map(|e| &e.spec) {
            Some(LayerSpec::Marker { popup, .. }) | Some(LayerSpec::Polyline { popup, .. }) => {
                popup.as_deref()
            }
            _ => None,
        }
    }

    fn register(
        &mut self,
        map: MapHandle,
        spec: LayerSpec,
        parent: Option<LayerId>,
    ) -> LayerId {
        let id = LayerId(self.next());
        let children = match &spec {
            LayerSpec::Group { children } => children
                .clone()
                .into_iter()
                .map(|child| self.register(map, child, Some(id)))
                .collect(),
            _ => Vec::new(),
        };
        self.layers.insert(
            id,
            LayerEntry {
                map,
                spec,
                parent,
                children,
            },
        );
        self.ops.push(MapOp::AddLayer(id));
        id
    }
}

impl MapBackend for MemoryMapBackend {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn lookup_container(&mut self, id: &str) -> Option<ContainerRef> {
        self.lookups += 1;
        if let Some(pending) = self.pending.get_mut(id) {
            if pending.lookups_left > 0 {
                pending.lookups_left -= 1;
                return None;
            }
            let (width, height) = pending.size;
            self.pending.remove(id);
            return Some(self.mount_container(id, width, height));
        }
        self.elements
            .get(id)
            .filter(|e| e.attached)
            .map(|e| ContainerRef {
                id: id.to_string(),
                generation: e.generation,
            })
    }

    fn is_attached(&self, container: &ContainerRef) -> bool {
        self.elements
            .get(&container.id)
            .map(|e| e.attached && e.generation == container.generation)
            .unwrap_or(false)
    }

    fn container_size(&self, container: &ContainerRef) -> (u32, u32) {
        self.elements
            .get(&container.id)
            .filter(|e| e.generation == container.generation)
            .map(|e| e.size)
            .unwrap_or((0, 0))
    }

    fn create_map(&mut self, container: &ContainerRef) -> Result<MapHandle, String> {
        if self.failing_creates > 0 {
            self.failing_creates -= 1;
            return Err("map container is already initialized".to_string());
        }
        let handle = MapHandle(self.next());
        self.maps.insert(
            handle,
            MapState {
                container: container.clone(),
                center: LatLng::new(0.0, 0.0),
                zoom: 0,
            },
        );
        self.ops.push(MapOp::CreateMap(container.clone()));
        Ok(handle)
    }

    fn remove_map(&mut self, map: MapHandle) {
        if self.maps.remove(&map).is_some() {
            self.layers.retain(|_, entry| entry.map != map);
            self.ops.push(MapOp::RemoveMap(map));
        }
    }

    fn container_of(&self, map: MapHandle) -> Option<ContainerRef> {
        self.maps.get(&map).map(|m| m.container.clone())
    }

    fn invalidate_size(&mut self, map: MapHandle) {
        self.ops.push(MapOp::InvalidateSize(map));
    }

    fn set_view(&mut self, map: MapHandle, center: LatLng, zoom: u8, options: ViewOptions) {
        if let Some(state) = self.maps.get_mut(&map) {
            state.center = center;
            state.zoom = zoom;
            self.ops.push(MapOp::SetView {
                center,
                zoom,
                options,
            });
        }
    }

    fn fit_bounds(&mut self, map: MapHandle, bounds: Bounds, options: FitOptions) {
        let (Some(sw), Some(ne)) = (bounds.south_west(), bounds.north_east()) else {
            return;
        };
        if let Some(state) = self.maps.get_mut(&map) {
            state.center = LatLng::new((sw.lat + ne.lat) / 2.0, (sw.lng + ne.lng) / 2.0);
            state.zoom = options.max_zoom;
            self.ops.push(MapOp::FitBounds { bounds, options });
        }
    }

    fn center(&self, map: MapHandle) -> Option<LatLng> {
        self.maps.get(&map).map(|m| m.center)
    }

    fn zoom(&self, map: MapHandle) -> Option<u8> {
        self.maps.get(&map).map(|m| m.zoom)
    }

    fn add_layer(&mut self, map: MapHandle, spec: LayerSpec) -> LayerId {
        self.register(map, spec, None)
    }

    fn remove_layer(&mut self, map: MapHandle, layer: LayerId) {
        let owned = self.layers.get(&layer).map(|e| e.map == map).unwrap_or(false);
        if owned {
            self.layers.remove(&layer);
            self.ops.push(MapOp::RemoveLayer(layer));
        }
    }

    fn has_layer(&self, map: MapHandle, layer: LayerId) -> bool {
        self.layers.get(&layer).map(|e| e.map == map).unwrap_or(false)
    }

    fn group_children(&self, group: LayerId) -> Vec<LayerId> {
        self.layers
            .get(&group)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    fn clear_group(&mut self, map: MapHandle, group: LayerId) {
        for child in self.group_children(group) {
            self.remove_layer(map, child);
        }
        if let Some(entry) = self.layers.get_mut(&group) {
            entry.children.clear();
            self.ops.push(MapOp::ClearGroup(group));
        }
    }

    fn open_popup(&mut self, map: MapHandle, at: LatLng, content: &str) -> LayerId {
        let id = self.register(
            map,
            LayerSpec::Marker {
                at,
                style: crate::surface::MarkerStyle {
                    color: String::new(),
                    size: 0,
                    class_name: "popup".to_string(),
                },
                popup: Some(content.to_string()),
            },
            None,
        );
        self.ops.push(MapOp::OpenPopup(id));
        id
    }

    fn close_popup(&mut self, map: MapHandle, popup: LayerId) {
        if self.has_layer(map, popup) {
            self.layers.remove(&popup);
            self.ops.push(MapOp::ClosePopup(popup));
        }
    }
}
