use chrono::{DateTime, Utc};
use maestro_core::geometry::segment_width;
use maestro_core::ZoomLevel;
use maestro_workspace::WorkspaceStore;

use crate::{build_nodes, NodeData, NodeInputs, TimelineNode};

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    revision: u64,
    zoom: ZoomLevel,
    reference: DateTime<Utc>,
    label_offset: f64,
}

/// Memoized node list. A store revision, zoom, reference or label offset
/// change rebuilds everything; a clock tick alone only re-measures the live
/// segments.
#[derive(Debug, Default)]
pub struct TimelineViewModel {
    key: Option<CacheKey>,
    now: Option<DateTime<Utc>>,
    nodes: Vec<TimelineNode>,
    live: Vec<usize>,
    rebuilds: u64,
    refreshes: u64,
}

impl TimelineViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(
        &mut self,
        store: &WorkspaceStore,
        now: DateTime<Utc>,
        reference: DateTime<Utc>,
        label_offset: f64,
    ) -> &[TimelineNode] {
        let key = CacheKey {
            revision: store.revision(),
            zoom: store.zoom_level(),
            reference,
            label_offset,
        };
        if self.key != Some(key) {
            self.rebuild(store, key, now);
        } else if self.now != Some(now) {
            self.refresh_live(key, now);
        }
        &self.nodes
    }

    /// Number of full rebuilds so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Number of live-width refreshes so far.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    fn rebuild(&mut self, store: &WorkspaceStore, key: CacheKey, now: DateTime<Utc>) {
        let state = store.state();
        let inputs = NodeInputs {
            spaces: state.spaces(),
            zoom: key.zoom,
            now,
            reference: key.reference,
            label_offset: key.label_offset,
            selected: state.timeline().selected_segment_id.as_deref(),
        };
        self.nodes = build_nodes(&inputs);
        self.live = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_live())
            .map(|(index, _)| index)
            .collect();
        self.key = Some(key);
        self.now = Some(now);
        self.rebuilds += 1;
    }

    fn refresh_live(&mut self, key: CacheKey, now: DateTime<Utc>) {
        for &index in &self.live {
            let node = &mut self.nodes[index];
            if let NodeData::Segment { start_time, .. } = &node.data {
                node.width = segment_width(*start_time, None, key.zoom, key.reference, now);
            }
        }
        self.now = Some(now);
        self.refreshes += 1;
    }
}
