//! Camera control for the timeline pane. Requests come in as keyboard,
//! button or pane events and go out as [`NavigationUpdate`]s that set zoom
//! and viewport in one step.

use chrono::{DateTime, Utc};
use maestro_core::geometry::{pixels_to_time, time_to_pixels, LANE_HEIGHT};
use maestro_core::{TimelineState, ZoomLevel};
use maestro_workspace::{Point, WorkspaceStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationConfig {
    pub default_zoom: ZoomLevel,
    /// Used until the pane reports a measured size.
    pub fallback_size: ViewportSize,
    pub animation_ms: u64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            default_zoom: ZoomLevel::Day,
            fallback_size: ViewportSize {
                width: 1000.0,
                height: 800.0,
            },
            animation_ms: 300,
        }
    }
}

/// Zoom and viewport to apply together. `animation_ms == None` means jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NavigationUpdate {
    pub zoom_level: ZoomLevel,
    pub viewport: Viewport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub code: String,
    pub repeat: bool,
}

impl KeyInput {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            repeat: false,
        }
    }
}

/// Result of a click on the lane area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaneHit {
    pub lane_index: usize,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NavigationController {
    config: NavigationConfig,
    zoom: ZoomLevel,
    viewport: Viewport,
    measured: Option<ViewportSize>,
}

impl NavigationController {
    pub fn new(config: NavigationConfig) -> Self {
        Self {
            zoom: config.default_zoom,
            config,
            viewport: Viewport::default(),
            measured: None,
        }
    }

    /// Restores the camera persisted with a workspace.
    pub fn from_state(config: NavigationConfig, timeline: &TimelineState) -> Self {
        Self {
            zoom: timeline.zoom_level,
            config,
            viewport: Viewport {
                x: timeline.scroll_x,
                y: timeline.scroll_y,
                scale: 1.0,
            },
            measured: None,
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn zoom(&self) -> ZoomLevel {
        self.zoom
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn container_size(&self) -> ViewportSize {
        self.measured.unwrap_or(self.config.fallback_size)
    }

    /// `None` (or a degenerate size) reverts to the fallback.
    pub fn set_container_size(&mut self, size: Option<ViewportSize>) {
        self.measured = size.filter(|size| size.width > 0.0 && size.height > 0.0);
    }

    /// Records a pan or pinch performed directly by the render layer.
    pub fn on_pan(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// World x of the visible left edge; label nodes pin to it.
    pub fn label_offset(&self) -> f64 {
        -self.viewport.x / self.scale()
    }

    pub fn apply(&mut self, update: NavigationUpdate) {
        self.zoom = update.zoom_level;
        self.viewport = update.viewport;
    }

    /// Writes the current camera into the workspace so it survives restarts.
    pub fn persist_view(&self, store: &mut WorkspaceStore) {
        store.set_timeline_view(self.zoom, self.viewport.x, self.viewport.y);
    }

    fn scale(&self) -> f64 {
        if self.viewport.scale > 0.0 {
            self.viewport.scale
        } else {
            1.0
        }
    }

    fn lanes_centered_y(&self, lane_count: usize) -> f64 {
        -(lane_count as f64 * LANE_HEIGHT / 2.0) + self.container_size().height / 2.0
    }

    fn centered_x(&self, zoom: ZoomLevel, now: DateTime<Utc>, reference: DateTime<Utc>) -> f64 {
        -time_to_pixels(now, zoom, reference) + self.container_size().width / 2.0
    }

    /// Default zoom, "now" centered horizontally, all lanes centered
    /// vertically.
    pub fn center_on_now(
        &mut self,
        now: DateTime<Utc>,
        reference: DateTime<Utc>,
        lane_count: usize,
    ) -> NavigationUpdate {
        let zoom = self.config.default_zoom;
        let update = NavigationUpdate {
            zoom_level: zoom,
            viewport: Viewport {
                x: self.centered_x(zoom, now, reference),
                y: self.lanes_centered_y(lane_count),
                scale: 1.0,
            },
            animation_ms: Some(self.config.animation_ms),
        };
        self.apply(update);
        update
    }

    /// Default zoom, "now" centered horizontally, the lane at `position`
    /// centered vertically.
    pub fn center_on_lane(
        &mut self,
        position: usize,
        now: DateTime<Utc>,
        reference: DateTime<Utc>,
    ) -> NavigationUpdate {
        let zoom = self.config.default_zoom;
        let size = self.container_size();
        let update = NavigationUpdate {
            zoom_level: zoom,
            viewport: Viewport {
                x: self.centered_x(zoom, now, reference),
                y: -(position as f64 * LANE_HEIGHT) + size.height / 2.0,
                scale: 1.0,
            },
            animation_ms: Some(self.config.animation_ms),
        };
        self.apply(update);
        update
    }

    /// Switches zoom and re-centers "now" in one step, so no frame renders
    /// the new zoom at the old offset. All lanes are centered vertically.
    pub fn change_zoom_and_recenter(
        &mut self,
        zoom: ZoomLevel,
        now: DateTime<Utc>,
        reference: DateTime<Utc>,
        lane_count: usize,
    ) -> NavigationUpdate {
        let update = NavigationUpdate {
            zoom_level: zoom,
            viewport: Viewport {
                x: self.centered_x(zoom, now, reference),
                y: self.lanes_centered_y(lane_count),
                scale: 1.0,
            },
            animation_ms: None,
        };
        self.apply(update);
        update
    }

    /// Space (not auto-repeated) centers on now. Every other key is ignored.
    pub fn handle_key(
        &mut self,
        key: &KeyInput,
        now: DateTime<Utc>,
        reference: DateTime<Utc>,
        lane_count: usize,
    ) -> Option<NavigationUpdate> {
        if key.code != "Space" || key.repeat {
            return None;
        }
        Some(self.center_on_now(now, reference, lane_count))
    }

    /// Screen x where the "now" marker is drawn.
    pub fn now_screen_x(&self, now: DateTime<Utc>, reference: DateTime<Utc>) -> f64 {
        time_to_pixels(now, self.zoom, reference) * self.scale() + self.viewport.x
    }

    /// Maps a pane-relative screen point to a lane and an instant. Points
    /// above the first lane or below the last one miss.
    pub fn hit_test(
        &self,
        screen: Point,
        lane_count: usize,
        reference: DateTime<Utc>,
    ) -> Option<PaneHit> {
        let scale = self.scale();
        let world_x = (screen.x - self.viewport.x) / scale;
        let world_y = (screen.y - self.viewport.y) / scale;
        if !world_x.is_finite() || !world_y.is_finite() || world_y < 0.0 {
            return None;
        }
        let lane_index = (world_y / LANE_HEIGHT).floor() as usize;
        if lane_index >= lane_count {
            return None;
        }
        Some(PaneHit {
            lane_index,
            time: pixels_to_time(world_x, self.zoom, reference),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn controller() -> NavigationController {
        let mut nav = NavigationController::new(NavigationConfig::default());
        nav.set_container_size(Some(ViewportSize {
            width: 1000.0,
            height: 600.0,
        }));
        nav
    }

    #[test]
    fn center_on_now_uses_default_zoom_and_centers_lanes() {
        let mut nav = controller();
        nav.apply(NavigationUpdate {
            zoom_level: ZoomLevel::Month,
            viewport: Viewport {
                x: 5.0,
                y: 5.0,
                scale: 2.0,
            },
            animation_ms: None,
        });
        let now = reference() + Duration::hours(12);
        let update = nav.center_on_now(now, reference(), 3);
        assert_eq!(update.zoom_level, ZoomLevel::Day);
        assert_eq!(update.viewport.x, 140.0);
        assert_eq!(update.viewport.y, 180.0);
        assert_eq!(update.viewport.scale, 1.0);
        assert_eq!(update.animation_ms, Some(300));
        assert_eq!(nav.now_screen_x(now, reference()), 500.0);
    }

    #[test]
    fn zoom_change_keeps_now_centered() {
        let mut nav = controller();
        let now = reference() + Duration::hours(12);
        nav.center_on_now(now, reference(), 2);
        nav.on_pan(Viewport {
            x: 0.0,
            y: -400.0,
            scale: 1.0,
        });

        let update = nav.change_zoom_and_recenter(ZoomLevel::Week, now, reference(), 5);
        assert_eq!(update.zoom_level, ZoomLevel::Week);
        assert_eq!(update.animation_ms, None);
        assert_eq!(update.viewport.x, 428.0);
        assert_eq!(update.viewport.y, 100.0);
        assert_eq!(nav.zoom(), ZoomLevel::Week);
        assert_eq!(nav.now_screen_x(now, reference()), 500.0);
    }

    #[test]
    fn center_on_lane_resets_to_default_zoom() {
        let mut nav = controller();
        let now = reference() + Duration::hours(12);
        nav.change_zoom_and_recenter(ZoomLevel::Month, now, reference(), 3);
        let update = nav.center_on_lane(2, now, reference());
        assert_eq!(update.zoom_level, ZoomLevel::Day);
        assert_eq!(nav.zoom(), ZoomLevel::Day);
        assert_eq!(update.viewport.y, 140.0);
        assert_eq!(update.viewport.x, 140.0);
        assert_eq!(update.animation_ms, Some(300));
        assert_eq!(nav.now_screen_x(now, reference()), 500.0);
    }

    #[test]
    fn only_fresh_space_presses_navigate() {
        let mut nav = controller();
        let now = reference();
        assert!(nav
            .handle_key(&KeyInput::new("KeyA"), now, reference(), 1)
            .is_none());
        let repeat = KeyInput {
            code: "Space".to_string(),
            repeat: true,
        };
        assert!(nav.handle_key(&repeat, now, reference(), 1).is_none());
        assert!(nav
            .handle_key(&KeyInput::new("Space"), now, reference(), 1)
            .is_some());
    }

    #[test]
    fn fallback_size_until_measured() {
        let mut nav = NavigationController::new(NavigationConfig::default());
        assert_eq!(nav.container_size().width, 1000.0);
        assert_eq!(nav.container_size().height, 800.0);
        nav.set_container_size(Some(ViewportSize {
            width: 0.0,
            height: 10.0,
        }));
        assert_eq!(nav.container_size().width, 1000.0);
    }

    #[test]
    fn label_offset_tracks_pan_and_scale() {
        let mut nav = controller();
        nav.on_pan(Viewport {
            x: -300.0,
            y: 0.0,
            scale: 2.0,
        });
        assert_eq!(nav.label_offset(), 150.0);
    }

    #[test]
    fn hit_test_maps_screen_to_lane_and_time() {
        let mut nav = controller();
        nav.on_pan(Viewport {
            x: -100.0,
            y: 0.0,
            scale: 1.0,
        });
        let hit = nav
            .hit_test(Point::new(80.0, 170.0), 3, reference())
            .expect("hit");
        assert_eq!(hit.lane_index, 2);
        assert_eq!(hit.time, reference() + Duration::hours(6));
        assert!(nav.hit_test(Point::new(80.0, 250.0), 3, reference()).is_none());
        assert!(nav.hit_test(Point::new(80.0, -1.0), 3, reference()).is_none());
    }
}
