//! Coordinate parsing and bounds helpers.
//!
//! Record geometry arrives in three shapes: explicit latitude/longitude
//! fields, `"lat,lon"` strings, and GeoJSON line geometry (`[lon, lat]`
//! positions). Everything is normalized to [`LatLng`] here.

use roadworks_api::LatLng;
use serde_json::Value;

use crate::error::GeometryError;

/// Parse a `"lat,lon"` string. Both parts must be finite numbers.
pub fn parse_lat_lng(text: &str) -> Option<LatLng> {
    let mut parts = text.split(',');
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    let lng = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() || !lat.is_finite() || !lng.is_finite() {
        return None;
    }
    Some(LatLng::new(lat, lng))
}

/// Point from a pair of optional coordinate fields.
pub fn point_from_fields(lat: Option<f64>, lng: Option<f64>) -> Option<LatLng> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
        _ => None,
    }
}

fn position(value: &Value) -> Result<LatLng, GeometryError> {
    let pair = value
        .as_array()
        .filter(|p| p.len() >= 2)
        .ok_or_else(|| GeometryError::InvalidJson(format!("bad position {}", value)))?;
    let lng = pair[0].as_f64();
    let lat = pair[1].as_f64();
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            let point = LatLng::new(lat, lng);
            if point.is_valid() {
                Ok(point)
            } else {
                Err(GeometryError::InvalidCoordinate { lat, lng })
            }
        }
        _ => Err(GeometryError::InvalidJson(format!("bad position {}", value))),
    }
}

fn line(value: &Value) -> Result<Vec<LatLng>, GeometryError> {
    value
        .as_array()
        .ok_or_else(|| GeometryError::InvalidJson("coordinates must be an array".into()))?
        .iter()
        .map(position)
        .collect()
}

/// Decode GeoJSON line geometry into `[lat, lng]` ordered lines.
///
/// Accepts a `Feature` or a bare geometry of type `LineString` or
/// `MultiLineString`. Lines with fewer than two points are dropped.
pub fn parse_line_geometry(value: &Value) -> Result<Vec<Vec<LatLng>>, GeometryError> {
    let geometry = match value.get("type").and_then(Value::as_str) {
        Some("Feature") => value
            .get("geometry")
            .ok_or_else(|| GeometryError::InvalidJson("feature without geometry".into()))?,
        _ => value,
    };

    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeometryError::InvalidJson("geometry without type".into()))?;
    let coordinates = geometry
        .get("coordinates")
        .ok_or_else(|| GeometryError::InvalidJson("geometry without coordinates".into()))?;

    let lines = match kind {
        "LineString" => vec![line(coordinates)?],
        "MultiLineString" => coordinates
            .as_array()
            .ok_or_else(|| GeometryError::InvalidJson("coordinates must be an array".into()))?
            .iter()
            .map(line)
            .collect::<Result<Vec<_>, _>>()?,
        other => return Err(GeometryError::UnsupportedType(other.to_string())),
    };

    let lines: Vec<Vec<LatLng>> = lines.into_iter().filter(|l| l.len() >= 2).collect();
    if lines.is_empty() {
        return Err(GeometryError::Empty);
    }
    Ok(lines)
}

/// [`parse_line_geometry`] over GeoJSON text.
pub fn parse_line_geometry_str(text: &str) -> Result<Vec<Vec<LatLng>>, GeometryError> {
    let value: Value = serde_json::from_str(text)?;
    parse_line_geometry(&value)
}

/// Arithmetic mean of the points; `(0, 0)` for an empty slice.
pub fn line_center(points: &[LatLng]) -> LatLng {
    if points.is_empty() {
        return LatLng::new(0.0, 0.0);
    }
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    LatLng::new(lat / n, lng / n)
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    extent: Option<(LatLng, LatLng)>,
}

impl Bounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Self {
        let mut bounds = Self::new();
        for p in points {
            bounds.extend(*p);
        }
        bounds
    }

    /// Grow to include `point`; non-finite points are ignored.
    pub fn extend(&mut self, point: LatLng) {
        if !point.lat.is_finite() || !point.lng.is_finite() {
            return;
        }
        self.extent = Some(match self.extent {
            None => (point, point),
            Some((sw, ne)) => (
                LatLng::new(sw.lat.min(point.lat), sw.lng.min(point.lng)),
                LatLng::new(ne.lat.max(point.lat), ne.lng.max(point.lng)),
            ),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.extent.is_some()
    }

    pub fn south_west(&self) -> Option<LatLng> {
        self.extent.map(|(sw, _)| sw)
    }

    pub fn north_east(&self) -> Option<LatLng> {
        self.extent.map(|(_, ne)| ne)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_lat_lng_strings() {
        assert_eq!(parse_lat_lng("49.99, 36.23"), Some(LatLng::new(49.99, 36.23)));
        assert_eq!(parse_lat_lng(" 1,2 "), Some(LatLng::new(1.0, 2.0)));
        assert_eq!(parse_lat_lng("49.99"), None);
        assert_eq!(parse_lat_lng("a, b"), None);
        assert_eq!(parse_lat_lng("1,2,3"), None);
        assert_eq!(parse_lat_lng("NaN, 2"), None);
    }

    #[test]
    fn parses_line_string_feature_in_lat_lng_order() {
        let feature = json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [[36.1, 49.9], [36.2, 50.0]]}
        });
        let lines = parse_line_geometry(&feature).unwrap();
        assert_eq!(
            lines,
            vec![vec![LatLng::new(49.9, 36.1), LatLng::new(50.0, 36.2)]]
        );
    }

    #[test]
    fn parses_bare_multi_line_string() {
        let geometry = json!({
            "type": "MultiLineString",
            "coordinates": [[[36.1, 49.9], [36.2, 50.0]], [[36.3, 50.1]], [[36.4, 50.2], [36.5, 50.3, 120.0]]]
        });
        let lines = parse_line_geometry(&geometry).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1][1], LatLng::new(50.3, 36.5));
    }

    #[test]
    fn rejects_unusable_geometry() {
        assert!(matches!(
            parse_line_geometry_str("{not json"),
            Err(GeometryError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_line_geometry(&json!({"type": "Point", "coordinates": [1.0, 2.0]})),
            Err(GeometryError::UnsupportedType(_))
        ));
        assert_eq!(
            parse_line_geometry(&json!({"type": "LineString", "coordinates": [[1.0, 2.0]]})),
            Err(GeometryError::Empty)
        );
        assert!(matches!(
            parse_line_geometry(&json!({"type": "LineString", "coordinates": [[1.0, 95.0], [1.0, 2.0]]})),
            Err(GeometryError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn bounds_and_center() {
        let points = [LatLng::new(1.0, 4.0), LatLng::new(3.0, 2.0)];
        let bounds = Bounds::from_points(&points);
        assert_eq!(bounds.south_west(), Some(LatLng::new(1.0, 2.0)));
        assert_eq!(bounds.north_east(), Some(LatLng::new(3.0, 4.0)));
        assert!(!Bounds::new().is_valid());
        assert_eq!(line_center(&points), LatLng::new(2.0, 3.0));
    }
}
