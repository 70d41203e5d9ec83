//! SLA deadline computation.
//!
//! Deterministic: base hours per category, scaled by a priority-level
//! multiplier. The overdue sweep that compares `sla_deadline` to the clock
//! runs outside this crate.

use crate::complaint::PriorityLevel;
use chrono::{DateTime, Duration, Utc};

/// Base resolution window in hours for a category. Unknown categories get
/// the generic 72h window.
pub fn base_hours(category: &str) -> f64 {
    match category {
        "pothole" => 48.0,
        "water_leakage" => 24.0,
        "garbage" => 24.0,
        "streetlight" => 72.0,
        "sewage" => 36.0,
        "road_damage" => 48.0,
        _ => 72.0,
    }
}

/// Priority multiplier: more urgent complaints shrink the window.
pub fn level_multiplier(level: PriorityLevel) -> f64 {
    match level {
        PriorityLevel::Low => 1.5,
        PriorityLevel::Medium => 1.0,
        PriorityLevel::High => 0.5,
        PriorityLevel::Critical => 0.4,
    }
}

/// Resolution window in (fractional) hours for a category/priority pair.
pub fn sla_hours(category: &str, level: PriorityLevel) -> f64 {
    base_hours(category) * level_multiplier(level)
}

/// Absolute deadline from `now` for a category/priority pair.
pub fn sla_deadline(category: &str, level: PriorityLevel, now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = (sla_hours(category, level) * 3600.0) as i64;
    now + Duration::seconds(secs)
}

/// Render a window for display. Fractional hours floor to whole hours;
/// 24h and above render as whole days (floored).
pub fn format_sla_window(hours: f64) -> String {
    let whole = hours.floor() as i64;
    if whole >= 24 {
        format!("{} days", whole / 24)
    } else {
        format!("{} hours", whole)
    }
}
