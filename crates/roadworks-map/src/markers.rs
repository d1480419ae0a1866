//! Keeps drawn markers in sync with a list of repair works.
//!
//! Markers are keyed by [`RecordId`], so there is at most one drawable per
//! record. A refresh removes stale markers before adding new ones and leaves
//! markers of unchanged ids alone.

use std::collections::BTreeSet;

use roadworks_api::{LatLng, RecordId, RepairWork};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::controller::MapController;
use crate::geometry::{parse_lat_lng, parse_line_geometry_str, point_from_fields};
use crate::obs::{self, SurfaceSpan};
use crate::popup;
use crate::surface::{LayerId, LayerSpec, LineStyle, MapBackend, MarkerStyle};

const POINT_SIZE: u32 = 20;
const ROUTE_WEIGHT: u32 = 4;
const SEGMENT_WEIGHT: u32 = 6;
const LINE_OPACITY: f64 = 0.8;

/// How a record is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderVariant {
    /// Street segment geometry, one or more lines
    Segment(Vec<Vec<LatLng>>),
    Point(LatLng),
    /// Straight line between two points
    Route { start: LatLng, end: LatLng },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    Segment,
    Point,
    Route,
}

fn point_of(work: &RepairWork) -> Option<LatLng> {
    point_from_fields(work.latitude, work.longitude)
        .or_else(|| work.location.as_deref().and_then(parse_lat_lng))
}

fn route_of(work: &RepairWork) -> Option<(LatLng, LatLng)> {
    let explicit = (
        point_from_fields(work.start_latitude, work.start_longitude),
        point_from_fields(work.end_latitude, work.end_longitude),
    );
    if let (Some(start), Some(end)) = explicit {
        return Some((start, end));
    }
    let start = work.start_location.as_deref().and_then(parse_lat_lng)?;
    let end = work.end_location.as_deref().and_then(parse_lat_lng)?;
    Some((start, end))
}

impl RenderVariant {
    /// Segment geometry wins over a point, a point over a route. Geometry
    /// that fails to parse is logged and the next variant is tried.
    pub fn classify(work: &RepairWork) -> Option<Self> {
        if let Some(text) = work.street_segment_geojson.as_deref() {
            match parse_line_geometry_str(text) {
                Ok(lines) => return Some(RenderVariant::Segment(lines)),
                Err(err) => {
                    warn!(event = "markers.bad_geometry", record_id = %work.id, error = %err)
                }
            }
        }
        if let Some(point) = point_of(work) {
            return Some(RenderVariant::Point(point));
        }
        route_of(work).map(|(start, end)| RenderVariant::Route { start, end })
    }

    pub fn kind(&self) -> VariantKind {
        match self {
            RenderVariant::Segment(_) => VariantKind::Segment,
            RenderVariant::Point(_) => VariantKind::Point,
            RenderVariant::Route { .. } => VariantKind::Route,
        }
    }

    fn into_layer(self, color: &str, popup: String) -> LayerSpec {
        match self {
            RenderVariant::Point(at) => LayerSpec::Marker {
                at,
                style: MarkerStyle {
                    color: color.to_string(),
                    size: POINT_SIZE,
                    class_name: "work-marker point".to_string(),
                },
                popup: Some(popup),
            },
            RenderVariant::Route { start, end } => LayerSpec::Polyline {
                points: vec![start, end],
                style: LineStyle::new(color, ROUTE_WEIGHT, LINE_OPACITY),
                popup: Some(popup),
            },
            RenderVariant::Segment(mut lines) => {
                let style = LineStyle::new(color, SEGMENT_WEIGHT, LINE_OPACITY)
                    .with_class("street-segment-work");
                if lines.len() == 1 {
                    LayerSpec::Polyline {
                        points: lines.remove(0),
                        style,
                        popup: Some(popup),
                    }
                } else {
                    LayerSpec::Group {
                        children: lines
                            .into_iter()
                            .map(|points| LayerSpec::Polyline {
                                points,
                                style: style.clone(),
                                popup: Some(popup.clone()),
                            })
                            .collect(),
                    }
                }
            }
        }
    }
}

/// The drawable owned by one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerHandle {
    pub record_id: RecordId,
    pub layer: LayerId,
    pub kind: VariantKind,
}

/// Result of a single [`MapController::add_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added(MarkerHandle),
    AlreadyDrawn,
    /// Nothing drawable on the record
    Skipped,
    NotReady,
}

/// What a refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub added: Vec<RecordId>,
    pub removed: Vec<RecordId>,
    pub skipped: Vec<RecordId>,
    /// The surface never became ready; nothing was touched
    pub abandoned: bool,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl<B: MapBackend> MapController<B> {
    /// Bring the drawn markers in line with `records`.
    ///
    /// Waits for readiness first and drops the refresh with a warning when
    /// it never comes. The remove phase finishes before the add phase.
    pub async fn reconcile(&mut self, records: &[RepairWork]) -> ReconcileOutcome {
        if !self.wait_until_ready().await {
            obs::emit_reconcile_abandoned(self.config().ready_poll_attempts);
            return ReconcileOutcome {
                abandoned: true,
                ..Default::default()
            };
        }

        let _span = SurfaceSpan::enter(&self.config().container_id);
        let mut outcome = ReconcileOutcome::default();

        let incoming: BTreeSet<RecordId> = records.iter().map(|r| r.id).collect();
        let stale: Vec<RecordId> = self
            .markers
            .keys()
            .filter(|id| !incoming.contains(id))
            .copied()
            .collect();
        for id in stale {
            if self.remove_record(id) {
                outcome.removed.push(id);
            }
        }

        for record in records {
            match self.add_record(record) {
                AddOutcome::Added(handle) => outcome.added.push(handle.record_id),
                AddOutcome::Skipped => outcome.skipped.push(record.id),
                AddOutcome::AlreadyDrawn | AddOutcome::NotReady => {}
            }
        }

        obs::emit_reconcile_finished(
            outcome.added.len(),
            outcome.removed.len(),
            outcome.skipped.len(),
        );
        outcome
    }

    /// Draw one record unless it is already on the map.
    pub fn add_record(&mut self, record: &RepairWork) -> AddOutcome {
        if !self.is_ready() {
            return AddOutcome::NotReady;
        }
        if self.markers.contains_key(&record.id) {
            return AddOutcome::AlreadyDrawn;
        }
        let Some(variant) = RenderVariant::classify(record) else {
            debug!(event = "markers.skipped", record_id = %record.id);
            return AddOutcome::Skipped;
        };

        let kind = variant.kind();
        let spec = variant.into_layer(record.color(), popup::work_popup(record));
        let Some(layer) = self.add_drawable(spec) else {
            return AddOutcome::NotReady;
        };
        let handle = MarkerHandle {
            record_id: record.id,
            layer,
            kind,
        };
        self.markers.insert(record.id, handle);
        AddOutcome::Added(handle)
    }

    /// Remove the record's drawable. Returns whether one was drawn.
    pub fn remove_record(&mut self, id: RecordId) -> bool {
        match self.markers.remove(&id) {
            Some(handle) => {
                self.remove_drawable(handle.layer);
                true
            }
            None => false,
        }
    }

    pub fn clear_records(&mut self) {
        let ids: Vec<RecordId> = self.markers.keys().copied().collect();
        for id in ids {
            self.remove_record(id);
        }
    }

    /// Ids currently drawn, ascending.
    pub fn marker_ids(&self) -> Vec<RecordId> {
        self.markers.keys().copied().collect()
    }

    pub fn marker(&self, id: RecordId) -> Option<&MarkerHandle> {
        self.markers.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEGMENT: &str =
        r#"{"type":"Feature","geometry":{"type":"LineString","coordinates":[[36.1,49.9],[36.2,50.0]]}}"#;

    fn work(id: i64) -> RepairWork {
        RepairWork::new(id, "2025-03-01T08:30:00")
    }

    #[test]
    fn test_segment_beats_point() {
        let mut w = work(1);
        w.latitude = Some(1.0);
        w.longitude = Some(1.0);
        w.street_segment_geojson = Some(SEGMENT.into());
        assert_eq!(RenderVariant::classify(&w).map(|v| v.kind()), Some(VariantKind::Segment));
    }

    #[test]
    fn test_bad_geometry_falls_through() {
        let mut w = work(1);
        w.street_segment_geojson = Some("{oops".into());
        w.location = Some("49.9, 36.2".into());
        assert_eq!(
            RenderVariant::classify(&w),
            Some(RenderVariant::Point(LatLng::new(49.9, 36.2)))
        );
    }

    #[test]
    fn test_unparseable_location_falls_through_to_route() {
        let mut w = work(1);
        w.location = Some("near the bridge".into());
        w.start_location = Some("1,2".into());
        w.end_location = Some("3,4".into());
        assert_eq!(
            RenderVariant::classify(&w),
            Some(RenderVariant::Route {
                start: LatLng::new(1.0, 2.0),
                end: LatLng::new(3.0, 4.0)
            })
        );
    }

    #[test]
    fn test_nothing_drawable() {
        let mut w = work(1);
        w.start_latitude = Some(1.0);
        w.start_longitude = Some(2.0);
        assert_eq!(RenderVariant::classify(&w), None);
    }

    #[test]
    fn test_point_layer_uses_work_type_color() {
        let spec = RenderVariant::Point(LatLng::new(1.0, 2.0)).into_layer("#123456", "p".into());
        match spec {
            LayerSpec::Marker { style, popup, .. } => {
                assert_eq!(style.color, "#123456");
                assert_eq!(style.size, 20);
                assert_eq!(popup.as_deref(), Some("p"));
            }
            other => panic!("expected marker, got {:?}", other),
        }
    }
}
