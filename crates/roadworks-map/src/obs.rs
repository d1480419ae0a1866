//! Structured observability hooks for the map surface.
//!
//! - `SurfaceSpan` RAII guard tagging everything inside with the container id
//! - `emit_*` functions for surface, reconciliation and view-state events
//!
//! Milestones are `info!`, routine viewport saves `debug!`, soft failures
//! `warn!` and swallowed observer failures `error!`.

use roadworks_api::LatLng;
use tracing::{debug, error, info, warn};

/// RAII guard that enters a surface-scoped span.
///
/// Only hold it across synchronous sections; it must not live over an
/// `.await`.
pub struct SurfaceSpan {
    _span: tracing::span::EnteredSpan,
}

impl SurfaceSpan {
    pub fn enter(container_id: &str) -> Self {
        let span = tracing::info_span!("roadworks.surface", container_id = %container_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: map instance created and ready for drawing.
pub fn emit_surface_initialized(container_id: &str, attempts: u32) {
    info!(
        event = "surface.initialized",
        container_id = %container_id,
        attempts = attempts,
    );
}

/// Emit event: initialization gave up after exhausting its attempts.
pub fn emit_surface_init_failed(container_id: &str, attempts: u32, error: &dyn std::fmt::Display) {
    error!(
        event = "surface.init_failed",
        container_id = %container_id,
        attempts = attempts,
        error = %error,
    );
}

/// Emit event: map instance released.
pub fn emit_surface_destroyed(container_id: &str) {
    info!(event = "surface.destroyed", container_id = %container_id);
}

/// Emit event: the existing instance was reused and its view restored.
pub fn emit_surface_restored(container_id: &str, center: LatLng, zoom: u8) {
    info!(
        event = "surface.restored",
        container_id = %container_id,
        lat = center.lat,
        lng = center.lng,
        zoom = zoom,
    );
}

/// Emit event: a marker refresh completed.
pub fn emit_reconcile_finished(added: usize, removed: usize, skipped: usize) {
    info!(
        event = "markers.reconciled",
        added = added,
        removed = removed,
        skipped = skipped,
    );
}

/// Emit event: readiness never reached, refresh dropped (warning level).
pub fn emit_reconcile_abandoned(poll_attempts: u32) {
    warn!(event = "markers.abandoned", poll_attempts = poll_attempts);
}

/// Emit event: viewport stored after a move or zoom.
pub fn emit_viewport_saved(center: LatLng, zoom: u8) {
    debug!(
        event = "view_state.viewport_saved",
        lat = center.lat,
        lng = center.lng,
        zoom = zoom,
    );
}

/// Emit event: the selected street was cleared and subscribers notified.
pub fn emit_selection_cleared(notified: usize, failed: usize) {
    info!(
        event = "view_state.selection_cleared",
        notified = notified,
        failed = failed,
    );
}

/// Emit event: a selection-cleared subscriber failed (error level).
pub fn emit_observer_failed(subscription: u64, error: &dyn std::fmt::Display) {
    error!(
        event = "view_state.observer_failed",
        subscription = subscription,
        error = %error,
    );
}
