//! Explicit state container for spaces, segments and tabs.
//!
//! Every mutation goes through [`WorkspaceStore`], runs to completion, bumps
//! the revision counter, re-checks the structural invariants and then
//! notifies subscribers. Missing ids are silent no-ops.

use chrono::{DateTime, Utc};
use maestro_core::{
    Clock, Segment, Space, Tab, TimelineState, WorkspaceSnapshot, ZoomLevel,
    SNAPSHOT_SCHEMA_VERSION,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub mod drag;
pub mod history;
pub mod invariants;
mod lifecycle;
mod spaces;
mod tabs;

pub use drag::{
    detect_collision, DragFrame, DragId, DragReconciler, DropOutcome, Droppable, Point, Rect,
};
pub use history::HistoryConfig;
pub use invariants::InvariantViolation;
pub use spaces::{SegmentPatch, SpacePatch};
pub use tabs::TabZones;

use history::History;

/// Plain data behind the store. Spaces are kept ordered by `position`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceState {
    pub(crate) spaces: Vec<Space>,
    pub(crate) tabs: Vec<Tab>,
    pub(crate) active_space_id: Option<String>,
    pub(crate) active_tab_id: Option<String>,
    pub(crate) timeline: TimelineState,
    segment_owner: HashMap<String, String>,
}

impl WorkspaceState {
    pub fn from_snapshot(snapshot: WorkspaceSnapshot) -> Self {
        let mut state = Self {
            spaces: snapshot.spaces,
            tabs: snapshot.tabs,
            active_space_id: snapshot.active_space_id,
            active_tab_id: snapshot.active_tab_id,
            timeline: snapshot.timeline,
            segment_owner: HashMap::new(),
        };
        state.spaces.sort_by_key(|space| space.position);
        state.renumber_spaces();
        for space in &mut state.spaces {
            let space_id = space.id.clone();
            for segment in &mut space.segments {
                segment.space_id = space_id.clone();
            }
        }
        let known: Vec<String> = state.spaces.iter().map(|space| space.id.clone()).collect();
        state.tabs.retain(|tab| known.contains(&tab.space_id));
        if !state.active_space_known() {
            state.active_space_id = state.spaces.first().map(|space| space.id.clone());
        }
        if !state.active_tab_known() {
            state.active_tab_id = None;
        }
        state.reindex();
        state
    }

    pub fn to_snapshot(&self, saved_at: DateTime<Utc>) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            spaces: self.spaces.clone(),
            tabs: self.tabs.clone(),
            active_space_id: self.active_space_id.clone(),
            active_tab_id: self.active_tab_id.clone(),
            timeline: self.timeline.clone(),
            saved_at,
        }
    }

    pub fn spaces(&self) -> &[Space] {
        &self.spaces
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn active_space_id(&self) -> Option<&str> {
        self.active_space_id.as_deref()
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active_tab_id.as_deref()
    }

    pub fn timeline(&self) -> &TimelineState {
        &self.timeline
    }

    pub fn segment_count(&self) -> usize {
        self.segment_owner.len()
    }

    pub(crate) fn reindex(&mut self) {
        self.segment_owner.clear();
        for space in &self.spaces {
            for segment in &space.segments {
                self.segment_owner
                    .insert(segment.id.clone(), space.id.clone());
            }
        }
    }

    pub(crate) fn index_segment(&mut self, segment_id: &str, space_id: &str) {
        self.segment_owner
            .insert(segment_id.to_string(), space_id.to_string());
    }

    pub(crate) fn unindex_segment(&mut self, segment_id: &str) {
        self.segment_owner.remove(segment_id);
    }

    pub(crate) fn segment_owner(&self, segment_id: &str) -> Option<&str> {
        self.segment_owner.get(segment_id).map(String::as_str)
    }

    pub(crate) fn renumber_spaces(&mut self) {
        for (position, space) in self.spaces.iter_mut().enumerate() {
            space.position = position;
        }
    }

    pub(crate) fn space_index(&self, space_id: &str) -> Option<usize> {
        self.spaces.iter().position(|space| space.id == space_id)
    }

    pub(crate) fn space_mut(&mut self, space_id: &str) -> Option<&mut Space> {
        self.spaces.iter_mut().find(|space| space.id == space_id)
    }

    pub(crate) fn locate_segment(&self, segment_id: &str) -> Option<(usize, usize)> {
        let owner = self.segment_owner.get(segment_id)?;
        let space_index = self.space_index(owner)?;
        let segment_index = self.spaces[space_index]
            .segments
            .iter()
            .position(|segment| segment.id == segment_id)?;
        Some((space_index, segment_index))
    }

    pub(crate) fn segment(&self, segment_id: &str) -> Option<&Segment> {
        let (space_index, segment_index) = self.locate_segment(segment_id)?;
        Some(&self.spaces[space_index].segments[segment_index])
    }

    pub(crate) fn segment_mut(&mut self, segment_id: &str) -> Option<&mut Segment> {
        let (space_index, segment_index) = self.locate_segment(segment_id)?;
        Some(&mut self.spaces[space_index].segments[segment_index])
    }

    pub(crate) fn tab_index(&self, tab_id: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == tab_id)
    }

    fn active_space_known(&self) -> bool {
        match &self.active_space_id {
            Some(id) => self.space_index(id).is_some(),
            None => false,
        }
    }

    fn active_tab_known(&self) -> bool {
        match &self.active_tab_id {
            Some(id) => self.tab_index(id).is_some(),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    SpaceAdded { space_id: String },
    SpaceUpdated { space_id: String },
    SpaceRemoved { space_id: String },
    SpacesReordered,
    SegmentCreated { space_id: String, segment_id: String },
    SegmentUpdated { space_id: String, segment_id: String },
    SegmentRemoved { space_id: String, segment_id: String },
    SegmentsStarted { segment_ids: Vec<String> },
    MarkersChanged { space_id: String },
    TabsChanged { space_id: String },
    ActiveChanged,
    TimelineChanged,
    HistoryRestored,
    Replaced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub revision: u64,
    pub change: Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Box<dyn FnMut(&StoreEvent) + Send>;

pub struct WorkspaceStore {
    state: WorkspaceState,
    clock: Arc<dyn Clock>,
    history: History,
    revision: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for WorkspaceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceStore")
            .field("revision", &self.revision)
            .field("spaces", &self.state.spaces.len())
            .field("segments", &self.state.segment_count())
            .field("tabs", &self.state.tabs.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl WorkspaceStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_history(clock, HistoryConfig::default())
    }

    pub fn with_history(clock: Arc<dyn Clock>, history: HistoryConfig) -> Self {
        Self {
            state: WorkspaceState::default(),
            clock,
            history: History::new(history),
            revision: 0,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn from_snapshot(
        snapshot: WorkspaceSnapshot,
        clock: Arc<dyn Clock>,
        history: HistoryConfig,
    ) -> Self {
        let mut store = Self::with_history(clock, history);
        store.state = WorkspaceState::from_snapshot(snapshot);
        store.enforce_invariants();
        store
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        self.state.to_snapshot(self.clock.now())
    }

    /// Swaps in an imported snapshot as a single undoable step.
    pub fn replace(&mut self, snapshot: WorkspaceSnapshot) {
        self.mutate("replace", |state, _now| {
            *state = WorkspaceState::from_snapshot(snapshot);
            Some(((), Change::Replaced))
        });
    }

    /// Drops every space, segment and tab. Undoable.
    pub fn clear(&mut self) {
        self.mutate("clear", |state, _now| {
            let timeline = TimelineState {
                zoom_level: state.timeline.zoom_level,
                ..TimelineState::default()
            };
            *state = WorkspaceState {
                timeline,
                ..WorkspaceState::default()
            };
            Some(((), Change::Replaced))
        });
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn zoom_level(&self) -> ZoomLevel {
        self.state.timeline.zoom_level
    }

    /// Persists the camera after a navigation request. Not an undo step.
    pub fn set_timeline_view(&mut self, zoom_level: ZoomLevel, scroll_x: f64, scroll_y: f64) {
        let unchanged = self.state.timeline.zoom_level == zoom_level
            && self.state.timeline.scroll_x == scroll_x
            && self.state.timeline.scroll_y == scroll_y;
        if unchanged {
            return;
        }
        self.mutate_view("set_timeline_view", |state, _now| {
            state.timeline.zoom_level = zoom_level;
            state.timeline.scroll_x = scroll_x;
            state.timeline.scroll_y = scroll_y;
            Some(((), Change::TimelineChanged))
        });
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.state) {
            Some(previous) => {
                self.restore(previous);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.state) {
            Some(next) => {
                self.restore(next);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, mut restored: WorkspaceState) {
        // The camera is not part of undo.
        restored.timeline.zoom_level = self.state.timeline.zoom_level;
        restored.timeline.scroll_x = self.state.timeline.scroll_x;
        restored.timeline.scroll_y = self.state.timeline.scroll_y;
        restored.reindex();
        if let Some(selected) = restored.timeline.selected_segment_id.clone() {
            if restored.segment(&selected).is_none() {
                restored.timeline.selected_segment_id = None;
            }
        }
        self.state = restored;
        self.commit(Change::HistoryRestored);
    }

    /// Runs an undoable mutation. `op` must leave `state` untouched when it
    /// returns `None`.
    pub(crate) fn mutate<R>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut WorkspaceState, DateTime<Utc>) -> Option<(R, Change)>,
    ) -> Option<R> {
        let now = self.clock.now();
        let before = self.state.clone();
        match op(&mut self.state, now) {
            Some((output, change)) => {
                self.history.record(before, now);
                self.commit(change);
                Some(output)
            }
            None => {
                debug!(op = name, "workspace mutation skipped");
                None
            }
        }
    }

    /// Like [`Self::mutate`] but without an undo entry.
    pub(crate) fn mutate_view<R>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut WorkspaceState, DateTime<Utc>) -> Option<(R, Change)>,
    ) -> Option<R> {
        let now = self.clock.now();
        match op(&mut self.state, now) {
            Some((output, change)) => {
                self.commit(change);
                Some(output)
            }
            None => {
                debug!(op = name, "workspace mutation skipped");
                None
            }
        }
    }

    fn commit(&mut self, change: Change) {
        self.revision += 1;
        self.enforce_invariants();
        let event = StoreEvent {
            revision: self.revision,
            change,
        };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    fn enforce_invariants(&self) {
        invariants::enforce(invariants::check(&self.state), "workspace store");
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{store_at, ts};
    use super::*;
    use chrono::Duration;
    use maestro_core::SegmentType;
    use std::sync::Mutex;

    #[test]
    fn subscribers_see_every_commit_until_unsubscribed() {
        let (mut store, _clock) = store_at(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = store.subscribe(move |event| {
            sink.lock().expect("lock").push(event.clone());
        });

        let space = store.add_space("Work");
        store
            .create_segment(&space.id, "Write code", SegmentType::Terminal, None)
            .expect("segment");
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.add_space("Later");

        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].revision, 1);
        assert_eq!(
            seen[0].change,
            Change::SpaceAdded {
                space_id: space.id.clone()
            }
        );
        assert!(matches!(seen[1].change, Change::SegmentCreated { .. }));
        assert_eq!(store.revision(), 3);
    }

    #[test]
    fn no_op_mutations_do_not_bump_revision() {
        let (mut store, _clock) = store_at(0);
        assert!(!store.end_segment("missing"));
        assert!(store
            .create_segment("missing", "x", SegmentType::Note, None)
            .is_none());
        assert_eq!(store.revision(), 0);
        assert!(!store.can_undo());
    }

    #[test]
    fn snapshot_round_trip_restores_index() {
        let (mut store, clock) = store_at(0);
        let space = store.add_space("Work");
        let segment = store
            .create_segment(&space.id, "Write code", SegmentType::Terminal, None)
            .expect("segment");
        clock.advance(Duration::minutes(5));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.saved_at, ts(300_000));

        let mut restored = WorkspaceStore::from_snapshot(
            snapshot,
            store.clock(),
            HistoryConfig::default(),
        );
        assert!(restored.end_segment(&segment.id));
        assert_eq!(
            restored.segment(&segment.id).and_then(|s| s.end_time),
            Some(ts(300_000))
        );
    }

    #[test]
    fn timeline_view_changes_are_not_undoable() {
        let (mut store, _clock) = store_at(0);
        store.set_timeline_view(ZoomLevel::Week, -120.0, 40.0);
        assert_eq!(store.zoom_level(), ZoomLevel::Week);
        assert_eq!(store.revision(), 1);
        assert!(!store.can_undo());

        store.set_timeline_view(ZoomLevel::Week, -120.0, 40.0);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn clear_and_replace_are_undoable() {
        let (mut store, clock) = store_at(0);
        store.add_space("Work");
        let snapshot = store.snapshot();
        clock.advance(Duration::seconds(1));

        store.clear();
        assert!(store.state().spaces().is_empty());
        assert!(store.undo());
        assert_eq!(store.state().spaces().len(), 1);

        clock.advance(Duration::seconds(1));
        store.clear();
        clock.advance(Duration::seconds(1));
        store.replace(snapshot);
        assert_eq!(store.state().spaces()[0].name, "Work");
    }
}
