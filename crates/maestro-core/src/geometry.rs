//! Time <-> pixel conversions for the timeline.
//!
//! Everything here is pure: positions are measured in minutes from a
//! reference time (normally the start of the current day) and scaled by the
//! zoom level's pixels-per-minute factor.

use crate::ZoomLevel;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Height of one space lane in pixels.
pub const LANE_HEIGHT: f64 = 80.0;

const NANOS_PER_MINUTE: f64 = 60_000_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomScale {
    pub level: ZoomLevel,
    pub pixels_per_minute: f64,
    pub min_segment_width: f64,
    pub ruler_interval_minutes: i64,
}

pub const ZOOM_SCALES: [ZoomScale; 4] = [
    ZoomScale {
        level: ZoomLevel::Hour,
        pixels_per_minute: 2.0,
        min_segment_width: 100.0,
        ruler_interval_minutes: 60,
    },
    ZoomScale {
        level: ZoomLevel::Day,
        pixels_per_minute: 0.5,
        min_segment_width: 60.0,
        ruler_interval_minutes: 360,
    },
    ZoomScale {
        level: ZoomLevel::Week,
        pixels_per_minute: 0.1,
        min_segment_width: 40.0,
        ruler_interval_minutes: 1_440,
    },
    ZoomScale {
        level: ZoomLevel::Month,
        pixels_per_minute: 0.025,
        min_segment_width: 30.0,
        ruler_interval_minutes: 10_080,
    },
];

pub fn zoom_scale(zoom: ZoomLevel) -> &'static ZoomScale {
    let index = match zoom {
        ZoomLevel::Hour => 0,
        ZoomLevel::Day => 1,
        ZoomLevel::Week => 2,
        ZoomLevel::Month => 3,
    };
    &ZOOM_SCALES[index]
}

pub fn pixels_per_minute(zoom: ZoomLevel) -> f64 {
    zoom_scale(zoom).pixels_per_minute
}

pub fn min_segment_width(zoom: ZoomLevel) -> f64 {
    zoom_scale(zoom).min_segment_width
}

pub fn ruler_interval(zoom: ZoomLevel) -> Duration {
    Duration::minutes(zoom_scale(zoom).ruler_interval_minutes)
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / NANOS_PER_MINUTE,
        None => delta.num_milliseconds() as f64 / 60_000.0,
    }
}

/// Horizontal position of `time`; negative before `reference`.
pub fn time_to_pixels(time: DateTime<Utc>, zoom: ZoomLevel, reference: DateTime<Utc>) -> f64 {
    minutes_between(reference, time) * pixels_per_minute(zoom)
}

/// Inverse of [`time_to_pixels`], rounded to the nearest nanosecond.
pub fn pixels_to_time(pixels: f64, zoom: ZoomLevel, reference: DateTime<Utc>) -> DateTime<Utc> {
    let minutes = pixels / pixels_per_minute(zoom);
    let nanos = (minutes * NANOS_PER_MINUTE).round() as i64;
    reference
        .checked_add_signed(Duration::nanoseconds(nanos))
        .unwrap_or(if nanos < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Rendered width of a segment. Open segments (`end == None`) are measured up
/// to `now`, so they grow as the clock advances. Never narrower than the zoom
/// level's minimum width.
pub fn segment_width(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    zoom: ZoomLevel,
    reference: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let effective_end = end.unwrap_or(now);
    let natural =
        time_to_pixels(effective_end, zoom, reference) - time_to_pixels(start, zoom, reference);
    natural.max(min_segment_width(zoom))
}

/// Start of the day containing `now`, as observed in `tz`.
pub fn day_anchor<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local_midnight = now.with_timezone(tz).date_naive().and_time(NaiveTime::MIN);
    tz.from_local_datetime(&local_midnight)
        .earliest()
        .map(|anchor| anchor.with_timezone(&Utc))
        .unwrap_or_else(|| now.date_naive().and_time(NaiveTime::MIN).and_utc())
}
