//! Popup content for drawn records.
//!
//! Content is derived only from record fields. Location derivation follows
//! the same priority as marker rendering (segment, point, route) and any
//! field that cannot be interpreted degrades to [`NOT_SPECIFIED`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use roadworks_api::{RepairWork, SegmentResult};

use crate::geometry::{parse_lat_lng, parse_line_geometry_str, point_from_fields};

pub const NOT_SPECIFIED: &str = "Не вказано";
pub const UNKNOWN_TYPE: &str = "Невідомий тип";
pub const DEFAULT_TITLE: &str = "Ремонтні роботи";
pub const ONGOING: &str = "триває";

const DISPLAY_FORMAT: &str = "%d.%m.%Y, %H:%M";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Escape text for interpolation into HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `dd.mm.yyyy, HH:MM`, in the timestamp's own offset when it carries one.
///
/// Unparseable input is returned unchanged; empty input yields `""`.
pub fn format_datetime(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return dt.format(DISPLAY_FORMAT).to_string();
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return dt.format(DISPLAY_FORMAT).to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return format!("{}, 00:00", date.format("%d.%m.%Y"));
    }
    text.to_string()
}

/// `start - end`, with [`ONGOING`] in place of a missing end.
pub fn format_period(work: &RepairWork) -> String {
    let start = format_datetime(&work.start_datetime);
    let end = work
        .end_datetime
        .as_deref()
        .map(format_datetime)
        .unwrap_or_else(|| ONGOING.to_string());
    format!("{} - {}", start, end)
}

fn fmt_point(lat: f64, lng: f64) -> String {
    format!("{:.4}, {:.4}", lat, lng)
}

/// Human-readable location, or `None` when the record has none.
pub fn describe_location(work: &RepairWork) -> Option<String> {
    if let (Some(name), Some(geojson)) = (&work.street_name, &work.street_segment_geojson) {
        if parse_line_geometry_str(geojson).is_ok() {
            return Some(format!("🛣️ {} (сегмент)", name));
        }
    }

    if let Some(point) = point_from_fields(work.latitude, work.longitude) {
        return Some(fmt_point(point.lat, point.lng));
    }
    if let Some(location) = work.location.as_deref().filter(|l| !l.trim().is_empty()) {
        return Some(match parse_lat_lng(location) {
            Some(point) => fmt_point(point.lat, point.lng),
            None => location.to_string(),
        });
    }

    let start = point_from_fields(work.start_latitude, work.start_longitude);
    let end = point_from_fields(work.end_latitude, work.end_longitude);
    if let (Some(start), Some(end)) = (start, end) {
        return Some(format!(
            "{} → {}",
            fmt_point(start.lat, start.lng),
            fmt_point(end.lat, end.lng)
        ));
    }
    match (&work.start_location, &work.end_location) {
        (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => {
            Some(format!("{} → {}", start, end))
        }
        _ => None,
    }
}

pub fn location_label(work: &RepairWork) -> String {
    describe_location(work).unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Popup HTML bound to a record's drawable.
pub fn work_popup(work: &RepairWork) -> String {
    let title = work
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    let type_name = work
        .work_type
        .as_ref()
        .map(|t| t.name.as_str())
        .unwrap_or(UNKNOWN_TYPE);

    format!(
        "<div class=\"popup-content\">\
         <h4>{}</h4>\
         <p><strong>Тип:</strong> {}</p>\
         <p><strong>Період:</strong> {}</p>\
         <p><strong>Місце:</strong> {}</p>\
         </div>",
        escape_html(title),
        escape_html(type_name),
        escape_html(&format_period(work)),
        escape_html(&location_label(work)),
    )
}

/// Popup HTML for a freshly calculated street segment.
pub fn segment_popup(result: &SegmentResult) -> String {
    format!(
        "<div style=\"text-align: center;\">\
         <strong>🎯 Обраний сегмент</strong><br>\
         <small>📏 Довжина: {} м</small><br>\
         <small>🛣️ {}</small>\
         </div>",
        result.distance_meters.round() as i64,
        escape_html(&result.street_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadworks_api::WorkType;

    fn work() -> RepairWork {
        RepairWork::new(1, "2025-03-01T08:30:00")
    }

    #[test]
    fn formats_datetimes() {
        assert_eq!(format_datetime("2025-03-01T08:30:00"), "01.03.2025, 08:30");
        assert_eq!(format_datetime("2025-03-01T08:30:00+02:00"), "01.03.2025, 08:30");
        assert_eq!(format_datetime("2025-03-01"), "01.03.2025, 00:00");
        assert_eq!(format_datetime("yesterday"), "yesterday");
        assert_eq!(format_datetime(""), "");
    }

    #[test]
    fn ongoing_period() {
        let mut w = work();
        assert_eq!(format_period(&w), "01.03.2025, 08:30 - триває");
        w.end_datetime = Some("2025-03-02T17:00:00".into());
        assert_eq!(format_period(&w), "01.03.2025, 08:30 - 02.03.2025, 17:00");
    }

    #[test]
    fn location_follows_render_priority() {
        let mut w = work();
        assert_eq!(location_label(&w), NOT_SPECIFIED);

        w.start_location = Some("1,2".into());
        w.end_location = Some("3,4".into());
        assert_eq!(location_label(&w), "1,2 → 3,4");

        w.start_latitude = Some(1.0);
        w.start_longitude = Some(2.0);
        w.end_latitude = Some(3.0);
        w.end_longitude = Some(4.0);
        assert_eq!(location_label(&w), "1.0000, 2.0000 → 3.0000, 4.0000");

        w.location = Some("49.99312, 36.23".into());
        assert_eq!(location_label(&w), "49.9931, 36.2300");

        w.street_name = Some("Сумська".into());
        w.street_segment_geojson =
            Some(r#"{"type":"LineString","coordinates":[[36.1,49.9],[36.2,50.0]]}"#.into());
        assert_eq!(location_label(&w), "🛣️ Сумська (сегмент)");
    }

    #[test]
    fn unparseable_inputs_degrade() {
        let mut w = work();
        w.street_name = Some("Сумська".into());
        w.street_segment_geojson = Some("{broken".into());
        assert_eq!(location_label(&w), NOT_SPECIFIED);

        w.location = Some("somewhere".into());
        assert_eq!(location_label(&w), "somewhere");
    }

    #[test]
    fn popup_is_escaped() {
        let mut w = work();
        w.description = Some("<b>Pit</b> & crack".into());
        w.work_type = Some(WorkType {
            id: 1,
            name: "Asphalt".into(),
            description: None,
            color: "#111111".into(),
            is_active: true,
            created_at: None,
            updated_at: None,
        });
        let html = work_popup(&w);
        assert!(html.contains("&lt;b&gt;Pit&lt;/b&gt; &amp; crack"));
        assert!(html.contains("<strong>Тип:</strong> Asphalt"));
        assert!(html.contains(NOT_SPECIFIED));
    }

    #[test]
    fn defaults_for_missing_fields() {
        let html = work_popup(&work());
        assert!(html.contains(DEFAULT_TITLE));
        assert!(html.contains(UNKNOWN_TYPE));
        assert!(html.contains(ONGOING));
    }
}
