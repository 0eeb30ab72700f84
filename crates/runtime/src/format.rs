//! Local rendering of distance results.

use serde_json::Value;

use crate::locate::LocationCache;

/// Human-readable distance: kilometres with one decimal from 1000 m up.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1}公里", meters / 1000.0)
    } else {
        format!("{}米", meters)
    }
}

/// Whole minutes, rounded down.
pub fn format_minutes(seconds: f64) -> u64 {
    (seconds / 60.0).floor().max(0.0) as u64
}

/// Distance and duration of the first route in a distance-tool payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteSummary {
    pub distance_m: f64,
    pub duration_s: f64,
}

impl RouteSummary {
    /// Read `results[0].distance` and `results[0].duration`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let first = payload.get("results")?.as_array()?.first()?;
        Some(Self {
            distance_m: number(first.get("distance")?)?,
            duration_s: number(first.get("duration")?)?,
        })
    }
}

// AMap sends numbers as strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite() && *n >= 0.0)
}

pub fn render_route_summary(summary: &RouteSummary, cache: &LocationCache) -> String {
    format!(
        "从{}到{}的驾车距离是{}，预计需要{}分钟的驾车时间。",
        cache.origin_label,
        cache.destination_label,
        format_distance(summary.distance_m),
        format_minutes(summary.duration_s),
    )
}
