//! Time ruler ticks, aligned to the zoom level's interval from the day anchor.

use chrono::{DateTime, Duration, TimeZone, Utc};
use maestro_core::geometry::{pixels_per_minute, zoom_scale};
use maestro_core::ZoomLevel;
use serde::Serialize;
use std::fmt::Display;

use crate::navigation::{Viewport, ViewportSize};

/// Upper bound on ticks returned for one range.
pub const MAX_RULER_TICKS: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulerTick {
    pub x: f64,
    pub time: DateTime<Utc>,
    pub label: String,
}

fn label_format(zoom: ZoomLevel) -> &'static str {
    match zoom {
        ZoomLevel::Hour | ZoomLevel::Day => "%H:%M",
        ZoomLevel::Week => "%a %d",
        ZoomLevel::Month => "%b %d",
    }
}

/// Ticks covering world x in `[from_x, to_x]`, labelled in `tz`.
pub fn ruler_ticks<Tz>(
    reference: DateTime<Utc>,
    zoom: ZoomLevel,
    from_x: f64,
    to_x: f64,
    tz: &Tz,
) -> Vec<RulerTick>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let interval = zoom_scale(zoom).ruler_interval_minutes;
    let step = interval as f64 * pixels_per_minute(zoom);
    let (low, high) = if from_x <= to_x {
        (from_x, to_x)
    } else {
        (to_x, from_x)
    };
    if !low.is_finite() || !high.is_finite() {
        return Vec::new();
    }
    let first = (low / step).floor() as i64;
    let last = (high / step).ceil() as i64;
    let last = last.min(first.saturating_add(MAX_RULER_TICKS as i64 - 1));
    let format = label_format(zoom);

    (first..=last)
        .filter_map(|index| {
            let time = reference.checked_add_signed(Duration::minutes(index * interval))?;
            Some(RulerTick {
                x: index as f64 * step,
                time,
                label: time.with_timezone(tz).format(format).to_string(),
            })
        })
        .collect()
}

/// Ticks for whatever the viewport currently shows.
pub fn visible_ticks<Tz>(
    reference: DateTime<Utc>,
    zoom: ZoomLevel,
    viewport: Viewport,
    size: ViewportSize,
    tz: &Tz,
) -> Vec<RulerTick>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let scale = if viewport.scale > 0.0 { viewport.scale } else { 1.0 };
    let from_x = -viewport.x / scale;
    let to_x = from_x + size.width / scale;
    ruler_ticks(reference, zoom, from_x, to_x, tz)
}
