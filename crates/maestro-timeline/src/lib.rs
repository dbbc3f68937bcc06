//! Render-ready view of the timeline: one label box per space lane and one
//! box per segment, positioned in world pixels.

use chrono::{DateTime, Utc};
use maestro_core::geometry::{segment_width, time_to_pixels, LANE_HEIGHT};
use maestro_core::{Segment, SegmentStatus, SegmentType, Space, ZoomLevel};
use maestro_workspace::{Point, WorkspaceStore};
use serde::Serialize;

mod cache;
pub mod navigation;
pub mod ruler;

pub use cache::TimelineViewModel;
pub use navigation::{
    KeyInput, NavigationConfig, NavigationController, NavigationUpdate, PaneHit, Viewport,
    ViewportSize,
};
pub use ruler::{ruler_ticks, visible_ticks, RulerTick};

/// Gap between the pinned label box and the visible left edge.
pub const LABEL_PADDING: f64 = 20.0;
pub const LABEL_WIDTH: f64 = 160.0;
pub const NEW_SEGMENT_TITLE: &str = "New segment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Label,
    Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeData {
    Label {
        space_id: String,
        name: String,
        position: usize,
        primary_color: String,
        secondary_color: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
    Segment {
        segment_id: String,
        space_id: String,
        title: String,
        segment_type: SegmentType,
        status: SegmentStatus,
        start_time: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<DateTime<Utc>>,
        live: bool,
        selected: bool,
        color: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineNode {
    pub id: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub data: NodeData,
}

impl TimelineNode {
    pub fn is_live(&self) -> bool {
        matches!(self.data, NodeData::Segment { live: true, .. })
    }
}

/// Everything a node list is derived from.
#[derive(Debug, Clone, Copy)]
pub struct NodeInputs<'a> {
    pub spaces: &'a [Space],
    pub zoom: ZoomLevel,
    pub now: DateTime<Utc>,
    pub reference: DateTime<Utc>,
    /// World x of the visible left edge, so labels stay pinned while the
    /// segments scroll underneath.
    pub label_offset: f64,
    pub selected: Option<&'a str>,
}

pub fn label_node_id(space_id: &str) -> String {
    format!("space-label-{space_id}")
}

pub fn lane_y(position: usize) -> f64 {
    position as f64 * LANE_HEIGHT
}

pub fn now_marker_x(now: DateTime<Utc>, zoom: ZoomLevel, reference: DateTime<Utc>) -> f64 {
    time_to_pixels(now, zoom, reference)
}

fn label_node(space: &Space, inputs: &NodeInputs<'_>) -> TimelineNode {
    TimelineNode {
        id: label_node_id(&space.id),
        kind: NodeKind::Label,
        x: inputs.label_offset + LABEL_PADDING,
        y: lane_y(space.position),
        width: LABEL_WIDTH,
        height: LANE_HEIGHT,
        data: NodeData::Label {
            space_id: space.id.clone(),
            name: space.name.clone(),
            position: space.position,
            primary_color: space.primary_color.clone(),
            secondary_color: space.secondary_color.clone(),
            icon: space.icon.clone(),
            next: space.next.clone(),
        },
    }
}

fn segment_node(segment: &Segment, space: &Space, inputs: &NodeInputs<'_>) -> TimelineNode {
    TimelineNode {
        id: segment.id.clone(),
        kind: NodeKind::Segment,
        x: time_to_pixels(segment.start_time, inputs.zoom, inputs.reference),
        y: lane_y(space.position),
        width: segment_width(
            segment.start_time,
            segment.end_time,
            inputs.zoom,
            inputs.reference,
            inputs.now,
        ),
        height: LANE_HEIGHT,
        data: NodeData::Segment {
            segment_id: segment.id.clone(),
            space_id: space.id.clone(),
            title: segment.title.clone(),
            segment_type: segment.segment_type,
            status: segment.status,
            start_time: segment.start_time,
            end_time: segment.end_time,
            live: segment.is_live(),
            selected: inputs.selected == Some(segment.id.as_str()),
            color: space.primary_color.clone(),
        },
    }
}

/// Single pass over every space and segment.
pub fn build_nodes(inputs: &NodeInputs<'_>) -> Vec<TimelineNode> {
    let total = inputs.spaces.len()
        + inputs
            .spaces
            .iter()
            .map(|space| space.segments.len())
            .sum::<usize>();
    let mut nodes = Vec::with_capacity(total);
    for space in inputs.spaces {
        nodes.push(label_node(space, inputs));
        for segment in &space.segments {
            nodes.push(segment_node(segment, space, inputs));
        }
    }
    nodes
}

/// Turns a click on empty lane space into a note segment starting at the
/// clicked instant.
pub fn create_segment_from_click(
    store: &mut WorkspaceStore,
    navigation: &NavigationController,
    screen: Point,
    reference: DateTime<Utc>,
) -> Option<Segment> {
    let hit = navigation.hit_test(screen, store.spaces().len(), reference)?;
    let space_id = store
        .spaces()
        .iter()
        .find(|space| space.position == hit.lane_index)?
        .id
        .clone();
    store.create_segment_at(
        &space_id,
        NEW_SEGMENT_TITLE,
        SegmentType::Note,
        None,
        hit.time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use maestro_core::{SegmentConfig, Space};

    fn ts(offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + offset_ms)
            .single()
            .expect("valid timestamp")
    }

    fn lanes() -> Vec<Space> {
        let mut work = Space::new("Work", 0, ts(0));
        let mut play = Space::new("Play", 1, ts(0));
        let mut ended = Segment::new(
            work.id.clone(),
            "Write code",
            SegmentType::Terminal,
            SegmentConfig::default(),
            ts(60 * 60_000),
        );
        ended.status = SegmentStatus::Completed;
        ended.end_time = Some(ts(3 * 60 * 60_000));
        work.segments.push(ended);
        play.segments.push(Segment::new(
            play.id.clone(),
            "Watch talk",
            SegmentType::Browser,
            SegmentConfig::default(),
            ts(2 * 60 * 60_000),
        ));
        vec![work, play]
    }

    #[test]
    fn nodes_follow_lane_positions_and_zoom() {
        let spaces = lanes();
        let inputs = NodeInputs {
            spaces: &spaces,
            zoom: ZoomLevel::Day,
            now: ts(4 * 60 * 60_000),
            reference: ts(0),
            label_offset: -250.0,
            selected: None,
        };
        let nodes = build_nodes(&inputs);
        assert_eq!(nodes.len(), 4);

        assert_eq!(nodes[0].id, label_node_id(&spaces[0].id));
        assert_eq!(nodes[0].kind, NodeKind::Label);
        assert_eq!(nodes[0].x, -230.0);
        assert_eq!(nodes[0].y, 0.0);

        let ended = &nodes[1];
        assert_eq!(ended.kind, NodeKind::Segment);
        assert_eq!(ended.x, 30.0);
        assert_eq!(ended.width, 60.0);
        assert!(!ended.is_live());

        assert_eq!(nodes[2].y, LANE_HEIGHT);
        let live = &nodes[3];
        assert_eq!(live.x, 60.0);
        assert_eq!(live.y, LANE_HEIGHT);
        assert_eq!(live.width, 60.0);
        assert!(live.is_live());
    }

    #[test]
    fn live_widths_track_now() {
        let spaces = lanes();
        let mut inputs = NodeInputs {
            spaces: &spaces,
            zoom: ZoomLevel::Hour,
            now: ts(2 * 60 * 60_000),
            reference: ts(0),
            label_offset: 0.0,
            selected: None,
        };
        let before = build_nodes(&inputs)[3].width;
        inputs.now = inputs.now + Duration::minutes(90);
        let after = build_nodes(&inputs)[3].width;
        assert_eq!(before, 100.0);
        assert_eq!(after, 180.0);
    }

    #[test]
    fn selection_and_serialized_shape() {
        let spaces = lanes();
        let selected = spaces[1].segments[0].id.clone();
        let inputs = NodeInputs {
            spaces: &spaces,
            zoom: ZoomLevel::Week,
            now: ts(0),
            reference: ts(0),
            label_offset: 0.0,
            selected: Some(&selected),
        };
        let nodes = build_nodes(&inputs);
        assert!(matches!(
            nodes[3].data,
            NodeData::Segment { selected: true, .. }
        ));
        let json = serde_json::to_value(&nodes[0]).expect("serialize");
        assert_eq!(json["kind"], "label");
        assert_eq!(json["data"]["type"], "label");
        assert_eq!(json["data"]["name"], "Work");
    }
}
