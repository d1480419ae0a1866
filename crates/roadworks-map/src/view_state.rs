//! View state that outlives individual map instances.
//!
//! A `ViewStateStore` keeps the last viewport and the selected street while
//! the map is unmounted and remounted. It is shared through `Arc`; every
//! component that reads or writes it gets the store handed in explicitly.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use roadworks_api::{LatLng, StreetGeometry};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{DEFAULT_CENTER, DEFAULT_ZOOM};
use crate::controller::MapController;
use crate::obs;
use crate::surface::{Animation, MapBackend};

/// Snapshot of the persisted view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub initialized: bool,
    pub center: LatLng,
    pub zoom: u8,
    pub selected_street: Option<String>,
    pub selected_geometry: Option<StreetGeometry>,
}

impl ViewState {
    fn with_defaults(center: LatLng, zoom: u8) -> Self {
        ViewState {
            initialized: false,
            center,
            zoom,
            selected_street: None,
            selected_geometry: None,
        }
    }

    /// Stored highlight, present only when both name and geometry are set.
    pub fn selection(&self) -> Option<(&str, &StreetGeometry)> {
        match (&self.selected_street, &self.selected_geometry) {
            (Some(name), Some(geometry)) => Some((name.as_str(), geometry)),
            _ => None,
        }
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_CENTER, DEFAULT_ZOOM)
    }
}

/// Callback run when the selected street is cleared.
pub type SelectionObserver = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct ObserverRegistry {
    next_id: u64,
    observers: Vec<(u64, SelectionObserver)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Disposer returned by [`ViewStateStore::subscribe_selection_cleared`].
///
/// Dropping it unsubscribes; call [`Subscription::detach`] to keep the
/// observer registered for the lifetime of the store.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ObserverRegistry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        drop(self);
    }

    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).observers.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owned, shareable view state.
pub struct ViewStateStore {
    default_center: LatLng,
    default_zoom: u8,
    state: Mutex<ViewState>,
    observers: Arc<Mutex<ObserverRegistry>>,
}

impl Default for ViewStateStore {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_CENTER, DEFAULT_ZOOM)
    }
}

impl ViewStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose reset target is `center`/`zoom`.
    pub fn with_defaults(center: LatLng, zoom: u8) -> Self {
        ViewStateStore {
            default_center: center,
            default_zoom: zoom,
            state: Mutex::new(ViewState::with_defaults(center, zoom)),
            observers: Arc::new(Mutex::new(ObserverRegistry::default())),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn snapshot(&self) -> ViewState {
        lock(&self.state).clone()
    }

    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    pub fn mark_initialized(&self) {
        lock(&self.state).initialized = true;
    }

    /// Overwrite the stored viewport; the last write wins.
    pub fn save_viewport(&self, center: LatLng, zoom: u8) {
        {
            let mut state = lock(&self.state);
            state.center = center;
            state.zoom = zoom;
        }
        obs::emit_viewport_saved(center, zoom);
    }

    pub fn save_selection(&self, street_name: &str, geometry: StreetGeometry) {
        let mut state = lock(&self.state);
        state.selected_street = Some(street_name.to_string());
        state.selected_geometry = Some(geometry);
        info!(event = "view_state.selection_saved", street = %street_name);
    }

    /// Drop the selection and notify every subscriber in subscription order.
    ///
    /// Observers run outside the locks. A failing or panicking observer is
    /// logged and the rest still run. Returns the number of observers run.
    pub fn clear_selection(&self) -> usize {
        {
            let mut state = lock(&self.state);
            state.selected_street = None;
            state.selected_geometry = None;
        }

        let observers: Vec<(u64, SelectionObserver)> = lock(&self.observers).observers.clone();
        let mut failed = 0;
        for (id, observer) in &observers {
            match panic::catch_unwind(AssertUnwindSafe(|| (**observer)())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failed += 1;
                    obs::emit_observer_failed(*id, &err);
                }
                Err(payload) => {
                    failed += 1;
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "observer panicked".to_string());
                    obs::emit_observer_failed(*id, &message);
                }
            }
        }
        obs::emit_selection_cleared(observers.len(), failed);
        observers.len()
    }

    pub fn subscribe_selection_cleared<F>(&self, observer: F) -> Subscription
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.observers);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.observers.push((id, Arc::new(observer)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.observers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.observers).observers.len()
    }

    /// Back to the default viewport with no selection. Observers are not
    /// notified and the initialized flag is kept.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.center = self.default_center;
        state.zoom = self.default_zoom;
        state.selected_street = None;
        state.selected_geometry = None;
    }
}

impl<B: MapBackend> MapController<B> {
    /// Apply the stored viewport without animation and redraw the stored
    /// highlight. The camera is not refitted to the highlight.
    pub fn restore_view_state(&mut self) {
        let state = self.view_state().snapshot();
        if self.map().is_none() {
            return;
        }
        self.apply_view(state.center, state.zoom, Animation::Instant);
        if let Some((_, geometry)) = state.selection() {
            self.clear_highlighted_street();
            self.draw_highlight(geometry);
        }
        obs::emit_surface_restored(&self.config().container_id, state.center, state.zoom);
    }

    /// Reset the store and, when the surface is ready, jump to the defaults
    /// and drop the highlight.
    pub fn reset_view_state(&mut self) {
        self.view_state().reset();
        if self.is_ready() {
            let state = self.view_state().snapshot();
            self.set_view(state.center, state.zoom, Animation::Instant);
            self.clear_highlighted_street();
        }
        info!(event = "view_state.reset");
    }
}
