use chrono::{DateTime, Utc};
use maestro_core::{new_id, Marker, MarkerKind, Segment, SegmentConfig, Space};
use tracing::warn;

use crate::{invariants, Change, WorkspaceStore};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpacePatch {
    pub name: Option<String>,
    pub primary_color: Option<String>,
    pub secondary_color: Option<String>,
    /// `Some(None)` clears the icon.
    pub icon: Option<Option<String>>,
    /// `Some(None)` clears the "what's next" note.
    pub next: Option<Option<String>>,
}

impl SpacePatch {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.primary_color.is_none()
            && self.secondary_color.is_none()
            && self.icon.is_none()
            && self.next.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentPatch {
    pub title: Option<String>,
    /// Merged into the existing config field by field.
    pub config: Option<SegmentConfig>,
}

impl WorkspaceStore {
    pub fn spaces(&self) -> &[Space] {
        self.state().spaces()
    }

    pub fn space(&self, space_id: &str) -> Option<&Space> {
        self.state()
            .spaces()
            .iter()
            .find(|space| space.id == space_id)
    }

    /// Appends a lane at the next free position, colored from the palette.
    pub fn add_space(&mut self, name: &str) -> Space {
        let space = Space::new(name, self.state().spaces().len(), self.now());
        let inserted = space.clone();
        self.mutate("add_space", move |state, _now| {
            if state.active_space_id.is_none() {
                state.active_space_id = Some(inserted.id.clone());
            }
            let change = Change::SpaceAdded {
                space_id: inserted.id.clone(),
            };
            state.spaces.push(inserted);
            Some(((), change))
        });
        space
    }

    /// Removes the lane together with its segments and tabs.
    pub fn remove_space(&mut self, space_id: &str) -> Option<Space> {
        self.mutate("remove_space", |state, _now| {
            let index = state.space_index(space_id)?;
            let removed = state.spaces.remove(index);
            state.renumber_spaces();
            for segment in &removed.segments {
                state.unindex_segment(&segment.id);
            }
            state.tabs.retain(|tab| tab.space_id != space_id);

            if state.active_space_id.as_deref() == Some(space_id) {
                state.active_space_id = state.spaces.first().map(|space| space.id.clone());
            }
            let active_tab_gone = match &state.active_tab_id {
                Some(tab_id) => state.tab_index(tab_id).is_none(),
                None => false,
            };
            if active_tab_gone {
                state.active_tab_id = state
                    .active_space_id
                    .as_deref()
                    .and_then(|space| state.tabs.iter().find(|tab| tab.space_id == space))
                    .map(|tab| tab.id.clone());
            }
            let selection_gone = match &state.timeline.selected_segment_id {
                Some(selected) => removed.segment(selected).is_some(),
                None => false,
            };
            if selection_gone {
                state.timeline.selected_segment_id = None;
            }

            let change = Change::SpaceRemoved {
                space_id: space_id.to_string(),
            };
            Some((removed, change))
        })
    }

    pub fn update_space(&mut self, space_id: &str, patch: SpacePatch) -> bool {
        if patch.is_empty() {
            return false;
        }
        self.mutate("update_space", |state, _now| {
            let space = state.space_mut(space_id)?;
            if let Some(name) = patch.name {
                space.name = name;
            }
            if let Some(primary) = patch.primary_color {
                space.primary_color = primary;
            }
            if let Some(secondary) = patch.secondary_color {
                space.secondary_color = secondary;
            }
            if let Some(icon) = patch.icon {
                space.icon = icon;
            }
            if let Some(next) = patch.next {
                space.next = next;
            }
            let change = Change::SpaceUpdated {
                space_id: space_id.to_string(),
            };
            Some(((), change))
        })
        .is_some()
    }

    /// Moves a lane to `new_position` (clamped) and renumbers all lanes to a
    /// dense 0..N-1 sequence.
    pub fn reorder_space(&mut self, space_id: &str, new_position: usize) -> bool {
        self.mutate("reorder_space", |state, _now| {
            let from = state.space_index(space_id)?;
            let to = new_position.min(state.spaces.len().saturating_sub(1));
            if from == to {
                return None;
            }
            let space = state.spaces.remove(from);
            state.spaces.insert(to, space);
            state.renumber_spaces();
            Some(((), Change::SpacesReordered))
        })
        .is_some()
    }

    /// Files an existing segment under `space_id`. Rejects duplicates and
    /// segments whose timestamps disagree with their status.
    pub fn add_segment(&mut self, space_id: &str, segment: Segment) -> bool {
        if let Err(violation) = invariants::check_segment(&segment) {
            warn!(segment_id = %segment.id, %violation, "rejecting malformed segment");
            return false;
        }
        self.mutate("add_segment", |state, _now| {
            if state.segment_owner(&segment.id).is_some() {
                return None;
            }
            let index = state.space_index(space_id)?;
            let mut segment = segment;
            segment.space_id = space_id.to_string();
            let change = Change::SegmentCreated {
                space_id: space_id.to_string(),
                segment_id: segment.id.clone(),
            };
            state.index_segment(&segment.id, space_id);
            state.spaces[index].segments.push(segment);
            Some(((), change))
        })
        .is_some()
    }

    pub fn remove_segment(&mut self, space_id: &str, segment_id: &str) -> Option<Segment> {
        self.mutate("remove_segment", |state, _now| {
            let space_index = state.space_index(space_id)?;
            let segment_index = state.spaces[space_index]
                .segments
                .iter()
                .position(|segment| segment.id == segment_id)?;
            let removed = state.spaces[space_index].segments.remove(segment_index);
            state.unindex_segment(segment_id);
            for tab in &mut state.tabs {
                if tab.segment_id.as_deref() == Some(segment_id) {
                    tab.segment_id = None;
                }
            }
            if state.timeline.selected_segment_id.as_deref() == Some(segment_id) {
                state.timeline.selected_segment_id = None;
            }
            let change = Change::SegmentRemoved {
                space_id: space_id.to_string(),
                segment_id: segment_id.to_string(),
            };
            Some((removed, change))
        })
    }

    pub fn update_segment(&mut self, space_id: &str, segment_id: &str, patch: SegmentPatch) -> bool {
        if patch.title.is_none() && patch.config.is_none() {
            return false;
        }
        self.mutate("update_segment", |state, _now| {
            let space = state.space_mut(space_id)?;
            let segment = space
                .segments
                .iter_mut()
                .find(|segment| segment.id == segment_id)?;
            if let Some(title) = patch.title {
                segment.title = title;
            }
            if let Some(config) = patch.config {
                segment.config.merge(config);
            }
            let change = Change::SegmentUpdated {
                space_id: space_id.to_string(),
                segment_id: segment_id.to_string(),
            };
            Some(((), change))
        })
        .is_some()
    }

    pub fn add_marker(
        &mut self,
        space_id: &str,
        time: DateTime<Utc>,
        kind: MarkerKind,
        title: &str,
    ) -> Option<Marker> {
        self.mutate("add_marker", |state, _now| {
            let space = state.space_mut(space_id)?;
            let marker = Marker {
                id: new_id(),
                space_id: space_id.to_string(),
                time,
                kind,
                title: title.to_string(),
                description: None,
                color: None,
            };
            space.markers.push(marker.clone());
            space.markers.sort_by_key(|marker| marker.time);
            let change = Change::MarkersChanged {
                space_id: space_id.to_string(),
            };
            Some((marker, change))
        })
    }

    pub fn remove_marker(&mut self, space_id: &str, marker_id: &str) -> bool {
        self.mutate("remove_marker", |state, _now| {
            let space = state.space_mut(space_id)?;
            let index = space
                .markers
                .iter()
                .position(|marker| marker.id == marker_id)?;
            space.markers.remove(index);
            let change = Change::MarkersChanged {
                space_id: space_id.to_string(),
            };
            Some(((), change))
        })
        .is_some()
    }

    /// Bumps the lane's last-active timestamp. Not an undo step.
    pub fn touch_space(&mut self, space_id: &str) -> bool {
        self.mutate_view("touch_space", |state, now| {
            let space = state.space_mut(space_id)?;
            space.last_active_at = now;
            let change = Change::SpaceUpdated {
                space_id: space_id.to_string(),
            };
            Some(((), change))
        })
        .is_some()
    }

    pub fn add_recent_coding_path(&mut self, space_id: &str, path: &str) -> bool {
        if path.trim().is_empty() {
            return false;
        }
        self.mutate_view("add_recent_coding_path", |state, _now| {
            let space = state.space_mut(space_id)?;
            space.remember_coding_path(path);
            let change = Change::SpaceUpdated {
                space_id: space_id.to_string(),
            };
            Some(((), change))
        })
        .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{store_at, ts};
    use chrono::Duration;
    use maestro_core::{SegmentStatus, SegmentType, TabType};

    fn positions(store: &WorkspaceStore) -> Vec<(String, usize)> {
        store
            .spaces()
            .iter()
            .map(|space| (space.name.clone(), space.position))
            .collect()
    }

    #[test]
    fn add_space_assigns_next_position_and_palette() {
        let (mut store, _clock) = store_at(0);
        let first = store.add_space("One");
        let second = store.add_space("Two");
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert_eq!(second.primary_color, "#10b981");
        assert_eq!(second.last_active_at, ts(0));
        assert_eq!(store.state().active_space_id(), Some(first.id.as_str()));
    }

    #[test]
    fn reorder_keeps_positions_dense() {
        let (mut store, _clock) = store_at(0);
        let a = store.add_space("A");
        store.add_space("B");
        let c = store.add_space("C");

        assert!(store.reorder_space(&c.id, 0));
        assert_eq!(
            positions(&store),
            vec![
                ("C".to_string(), 0),
                ("A".to_string(), 1),
                ("B".to_string(), 2)
            ]
        );

        assert!(store.reorder_space(&a.id, 99));
        assert_eq!(store.spaces()[2].id, a.id);
        assert!(!store.reorder_space(&a.id, 2));
        assert!(!store.reorder_space("missing", 0));
    }

    #[test]
    fn remove_space_cascades_and_renumbers() {
        let (mut store, _clock) = store_at(0);
        let a = store.add_space("A");
        let b = store.add_space("B");
        let c = store.add_space("C");
        let segment = store
            .create_segment(&b.id, "work", SegmentType::Terminal, None)
            .expect("segment");
        let tab = store
            .open_tab(&b.id, TabType::Terminal, "shell", Some(&segment.id))
            .expect("tab");
        assert!(store.select_segment(Some(&segment.id)));

        let removed = store.remove_space(&b.id).expect("removed");
        assert_eq!(removed.segments.len(), 1);
        assert!(store.segment(&segment.id).is_none());
        assert!(store.tab(&tab.id).is_none());
        assert_eq!(store.state().active_space_id(), Some(a.id.as_str()));
        assert_eq!(store.state().active_tab_id(), None);
        assert_eq!(store.state().timeline().selected_segment_id, None);
        assert_eq!(store.space(&c.id).map(|space| space.position), Some(1));
        assert!(store.remove_space(&b.id).is_none());
    }

    #[test]
    fn segment_crud_is_lenient_about_missing_ids() {
        let (mut store, clock) = store_at(0);
        let space = store.add_space("Work");
        let mut imported = Segment::new(
            "elsewhere",
            "Imported",
            SegmentType::External,
            SegmentConfig::default(),
            ts(-60_000),
        );
        imported.status = SegmentStatus::Completed;
        imported.end_time = Some(ts(-1_000));

        assert!(!store.add_segment("missing", imported.clone()));
        assert!(store.add_segment(&space.id, imported.clone()));
        assert!(!store.add_segment(&space.id, imported.clone()));
        assert_eq!(
            store.segment(&imported.id).map(|s| s.space_id.as_str()),
            Some(space.id.as_str())
        );

        let mut broken = imported.clone();
        broken.id = "broken".to_string();
        broken.end_time = None;
        assert!(!store.add_segment(&space.id, broken));

        clock.advance(Duration::seconds(1));
        assert!(store.update_segment(
            &space.id,
            &imported.id,
            SegmentPatch {
                title: Some("Renamed".to_string()),
                config: None,
            }
        ));
        assert!(!store.update_segment("missing", &imported.id, SegmentPatch::default()));
        assert!(!store.update_segment(
            &space.id,
            "missing",
            SegmentPatch {
                title: Some("x".to_string()),
                config: None,
            }
        ));
        assert_eq!(
            store.segment(&imported.id).map(|s| s.title.as_str()),
            Some("Renamed")
        );

        assert!(store.remove_segment("missing", &imported.id).is_none());
        assert!(store.remove_segment(&space.id, &imported.id).is_some());
        assert!(store.remove_segment(&space.id, &imported.id).is_none());
    }

    #[test]
    fn markers_stay_sorted_by_time() {
        let (mut store, _clock) = store_at(0);
        let space = store.add_space("Plan");
        let late = store
            .add_marker(&space.id, ts(90_000), MarkerKind::Deadline, "Ship")
            .expect("marker");
        store
            .add_marker(&space.id, ts(30_000), MarkerKind::Milestone, "Beta")
            .expect("marker");
        assert!(store
            .add_marker("missing", ts(0), MarkerKind::Note, "x")
            .is_none());

        let titles: Vec<_> = store.spaces()[0]
            .markers
            .iter()
            .map(|marker| marker.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Beta", "Ship"]);
        assert!(store.remove_marker(&space.id, &late.id));
        assert!(!store.remove_marker(&space.id, &late.id));
    }

    #[test]
    fn update_touch_and_coding_paths() {
        let (mut store, clock) = store_at(0);
        let space = store.add_space("Code");
        assert!(store.update_space(
            &space.id,
            SpacePatch {
                name: Some("Coding".to_string()),
                next: Some(Some("write tests".to_string())),
                ..SpacePatch::default()
            }
        ));
        assert!(!store.update_space(&space.id, SpacePatch::default()));

        clock.advance(Duration::minutes(3));
        assert!(store.touch_space(&space.id));
        assert!(store.add_recent_coding_path(&space.id, "/repo/a"));
        assert!(!store.add_recent_coding_path(&space.id, "  "));

        let current = store.space(&space.id).expect("space");
        assert_eq!(current.name, "Coding");
        assert_eq!(current.next.as_deref(), Some("write tests"));
        assert_eq!(current.last_active_at, ts(180_000));
        assert_eq!(current.recent_coding_paths, vec!["/repo/a"]);
    }
}
