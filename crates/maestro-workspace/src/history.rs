use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::WorkspaceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo steps kept.
    pub limit: usize,
    /// Mutations closer together than this collapse into one undo step.
    pub coalesce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            coalesce_ms: 100,
        }
    }
}

/// Undo/redo stacks of whole-state snapshots.
#[derive(Debug)]
pub(crate) struct History {
    config: HistoryConfig,
    past: VecDeque<WorkspaceState>,
    future: Vec<WorkspaceState>,
    last_recorded_at: Option<DateTime<Utc>>,
}

impl History {
    pub(crate) fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            past: VecDeque::new(),
            future: Vec::new(),
            last_recorded_at: None,
        }
    }

    fn coalesce_window(&self) -> Duration {
        Duration::milliseconds(self.config.coalesce_ms.min(i64::MAX as u64) as i64)
    }

    /// Records the state as it was before a committed mutation.
    pub(crate) fn record(&mut self, before: WorkspaceState, now: DateTime<Utc>) {
        self.future.clear();
        if self.config.limit == 0 {
            return;
        }

        let coalesce = match self.last_recorded_at {
            Some(last) => now >= last && now - last < self.coalesce_window(),
            None => false,
        };
        if !coalesce || self.past.is_empty() {
            self.past.push_back(before);
            while self.past.len() > self.config.limit {
                self.past.pop_front();
            }
        }
        self.last_recorded_at = Some(now);
    }

    pub(crate) fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub(crate) fn undo(&mut self, current: &WorkspaceState) -> Option<WorkspaceState> {
        let previous = self.past.pop_back()?;
        self.future.push(current.clone());
        self.last_recorded_at = None;
        Some(previous)
    }

    pub(crate) fn redo(&mut self, current: &WorkspaceState) -> Option<WorkspaceState> {
        let next = self.future.pop()?;
        self.past.push_back(current.clone());
        self.last_recorded_at = None;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::store_at;
    use crate::HistoryConfig;
    use crate::WorkspaceStore;
    use chrono::Duration;
    use maestro_core::{ManualClock, SegmentType};
    use std::sync::Arc;

    #[test]
    fn undo_and_redo_walk_the_stack() {
        let (mut store, clock) = store_at(0);
        let space = store.add_space("Work");
        clock.advance(Duration::seconds(1));
        let segment = store
            .create_segment(&space.id, "Write code", SegmentType::Terminal, None)
            .expect("segment");

        assert!(store.undo());
        assert!(store.segment(&segment.id).is_none());
        assert_eq!(store.state().spaces().len(), 1);
        assert!(store.can_redo());

        assert!(store.redo());
        assert!(store.segment(&segment.id).is_some());

        assert!(store.undo());
        assert!(store.undo());
        assert!(store.state().spaces().is_empty());
        assert!(!store.undo());
    }

    #[test]
    fn bursts_inside_the_window_collapse_into_one_step() {
        let (mut store, clock) = store_at(0);
        let space = store.add_space("Work");
        clock.advance(Duration::seconds(1));

        for title in ["a", "b", "c"] {
            store.create_segment(&space.id, title, SegmentType::Note, None);
            clock.advance(Duration::milliseconds(40));
        }
        assert_eq!(store.state().segment_count(), 3);

        assert!(store.undo());
        assert_eq!(store.state().segment_count(), 0);
        assert_eq!(store.state().spaces().len(), 1);
    }

    #[test]
    fn new_mutation_after_undo_drops_redo_branch() {
        let (mut store, clock) = store_at(0);
        store.add_space("One");
        clock.advance(Duration::seconds(1));
        store.add_space("Two");
        assert!(store.undo());
        assert!(store.can_redo());

        clock.advance(Duration::seconds(1));
        store.add_space("Three");
        assert!(!store.can_redo());
        let names: Vec<_> = store.state().spaces().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Three"]);
    }

    #[test]
    fn limit_bounds_the_undo_depth() {
        let clock = Arc::new(ManualClock::new(crate::test_support::ts(0)));
        let mut store = WorkspaceStore::with_history(
            clock.clone(),
            HistoryConfig {
                limit: 2,
                coalesce_ms: 0,
            },
        );
        for name in ["a", "b", "c", "d"] {
            store.add_space(name);
            clock.advance(Duration::seconds(1));
        }
        assert!(store.undo());
        assert!(store.undo());
        assert!(!store.undo());
        assert_eq!(store.state().spaces().len(), 2);
    }

    #[test]
    fn undo_keeps_the_camera() {
        let (mut store, clock) = store_at(0);
        store.add_space("Work");
        store.set_timeline_view(maestro_core::ZoomLevel::Hour, 12.0, 0.0);
        clock.advance(Duration::seconds(1));
        assert!(store.undo());
        assert_eq!(store.zoom_level(), maestro_core::ZoomLevel::Hour);
    }
}
