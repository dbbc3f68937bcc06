//! Drag-and-drop of tabs between the favorites and tabs zones.
//!
//! Mid-drag rearrangement lives only in the reconciler's local copy of the
//! zones; the store is written once, on drop. Cancelling simply discards the
//! local copy. Every frame first re-syncs the local copy with the store so
//! tabs closed or opened during the drag are never lost or duplicated.

use maestro_core::Zone;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

use crate::{invariants, TabZones, WorkspaceStore};

/// Something that can be dragged or dropped onto: a tab or a whole zone
/// container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DragId {
    Tab(String),
    Zone(Zone),
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let left = self.x.max(other.x);
        let right = (self.x + self.width).min(other.x + other.width);
        let top = self.y.max(other.y);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            0.0
        } else {
            (right - left) * (bottom - top)
        }
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x, self.y + self.height),
            Point::new(self.x + self.width, self.y + self.height),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droppable {
    pub id: DragId,
    pub rect: Rect,
}

/// One pointer frame as reported by the render layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DragFrame {
    pub pointer: Option<Point>,
    /// Current rect of the dragged element.
    pub dragged: Rect,
    pub droppables: Vec<Droppable>,
}

impl DragFrame {
    fn rect_of(&self, id: &DragId) -> Option<Rect> {
        self.droppables
            .iter()
            .find(|droppable| &droppable.id == id)
            .map(|droppable| droppable.rect)
    }

    /// Whether the pointer (or the dragged rect's center when there is no
    /// pointer) sits below the vertical midpoint of `target`.
    fn is_below(&self, target: &Rect) -> bool {
        let y = self
            .pointer
            .map(|pointer| pointer.y)
            .unwrap_or_else(|| self.dragged.center().y);
        y > target.center().y
    }
}

fn by_score(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn closest_center<'a>(
    from: Rect,
    candidates: impl Iterator<Item = &'a Droppable>,
) -> Option<DragId> {
    let origin = from.center();
    candidates
        .min_by(|a, b| {
            by_score(
                a.rect.center().distance_to(origin),
                b.rect.center().distance_to(origin),
            )
        })
        .map(|droppable| droppable.id.clone())
}

fn pointer_within<'a>(
    pointer: Point,
    candidates: impl Iterator<Item = &'a Droppable>,
) -> Option<DragId> {
    let corner_distance = |rect: &Rect| {
        rect.corners()
            .iter()
            .map(|corner| corner.distance_to(pointer))
            .sum::<f64>()
            / 4.0
    };
    candidates
        .filter(|droppable| droppable.rect.contains(pointer))
        .min_by(|a, b| by_score(corner_distance(&a.rect), corner_distance(&b.rect)))
        .map(|droppable| droppable.id.clone())
}

fn rect_intersection<'a>(
    dragged: Rect,
    candidates: impl Iterator<Item = &'a Droppable>,
) -> Option<DragId> {
    let ratio = |rect: &Rect| {
        let overlap = rect.intersection_area(&dragged);
        let union = rect.area() + dragged.area() - overlap;
        if union <= 0.0 {
            0.0
        } else {
            overlap / union
        }
    };
    candidates
        .map(|droppable| (ratio(&droppable.rect), droppable))
        .filter(|(score, _)| *score > 0.0)
        .max_by(|a, b| by_score(a.0, b.0))
        .map(|(_, droppable)| droppable.id.clone())
}

/// Resolves the drop target for one frame.
///
/// Zone containers being dragged only collide with other containers. Tabs
/// prefer targets under the pointer, then overlapping targets. A hit on a
/// populated zone container is narrowed to the nearest tab in that zone;
/// an empty zone is itself the target. With no hit the previous target is
/// kept.
pub fn detect_collision(
    active: &DragId,
    frame: &DragFrame,
    zones: &TabZones,
    last_over: Option<&DragId>,
) -> Option<DragId> {
    let known = |droppable: &&Droppable| match &droppable.id {
        DragId::Zone(_) => true,
        DragId::Tab(id) => zones.zone_of(id).is_some(),
    };

    if let DragId::Zone(_) = active {
        let containers = frame
            .droppables
            .iter()
            .filter(|droppable| matches!(droppable.id, DragId::Zone(_)));
        return closest_center(frame.dragged, containers).or_else(|| last_over.cloned());
    }

    let hit = frame
        .pointer
        .and_then(|pointer| pointer_within(pointer, frame.droppables.iter().filter(known)))
        .or_else(|| rect_intersection(frame.dragged, frame.droppables.iter().filter(known)));

    match hit {
        Some(DragId::Zone(zone)) => {
            let items = zones.zone(zone);
            if items.is_empty() {
                return Some(DragId::Zone(zone));
            }
            let members = frame.droppables.iter().filter(|droppable| match &droppable.id {
                DragId::Tab(id) => items.contains(id),
                DragId::Zone(_) => false,
            });
            Some(closest_center(frame.dragged, members).unwrap_or(DragId::Zone(zone)))
        }
        Some(target) => Some(target),
        None => last_over.cloned(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// The arrangement was written to the store.
    Committed(TabZones),
    /// Valid drop that left the order as it was.
    Unchanged,
    /// No target, explicit cancel, or the dragged tab disappeared.
    Cancelled,
}

#[derive(Debug, Clone)]
struct DragSession {
    space_id: String,
    active: DragId,
    zones: TabZones,
    hovered_zone: Option<Zone>,
    last_over: Option<DragId>,
}

impl DragSession {
    /// Drops ids the store no longer has and appends ones it gained. Returns
    /// the live id set, or `None` when the drag can no longer continue.
    fn sync_with(&mut self, store: &WorkspaceStore) -> Option<BTreeSet<String>> {
        let current = store.zones(&self.space_id)?;
        let live = current.all_ids();
        self.zones.favorites.retain(|id| live.contains(id));
        self.zones.tabs.retain(|id| live.contains(id));
        for zone in [Zone::Favorites, Zone::Tabs] {
            for id in current.zone(zone) {
                if self.zones.zone_of(id).is_none() {
                    self.zones.zone_mut(zone).push(id.clone());
                }
            }
        }
        if let Some(DragId::Tab(id)) = &self.last_over {
            if !live.contains(id) {
                self.last_over = None;
            }
        }
        match &self.active {
            DragId::Tab(id) if !live.contains(id) => None,
            _ => Some(live),
        }
    }

    fn active_tab(&self) -> Option<&str> {
        match &self.active {
            DragId::Tab(id) => Some(id.as_str()),
            DragId::Zone(_) => None,
        }
    }

    fn zone_of_target(&self, over: &DragId) -> Option<Zone> {
        match over {
            DragId::Zone(zone) => Some(*zone),
            DragId::Tab(id) => self.zones.zone_of(id),
        }
    }

    /// Moves the dragged tab into the zone of `over`, next to it.
    fn move_across(&mut self, over: &DragId, frame: &DragFrame) {
        let Some(active_id) = self.active_tab().map(str::to_string) else {
            return;
        };
        let (Some(from), Some(to)) = (self.zones.zone_of(&active_id), self.zone_of_target(over))
        else {
            return;
        };
        if from == to {
            return;
        }

        let new_index = match over {
            DragId::Zone(_) => self.zones.zone(to).len(),
            DragId::Tab(over_id) => {
                let over_index = self
                    .zones
                    .zone(to)
                    .iter()
                    .position(|id| id == over_id)
                    .unwrap_or(0);
                let below = frame
                    .rect_of(over)
                    .map(|rect| frame.is_below(&rect))
                    .unwrap_or(false);
                over_index + usize::from(below)
            }
        };

        self.zones.zone_mut(from).retain(|id| *id != active_id);
        let target = self.zones.zone_mut(to);
        let index = new_index.min(target.len());
        target.insert(index, active_id);
    }

    /// Reorders inside one zone. Moving forward lands after the target,
    /// moving backward lands before it.
    fn move_within(&mut self, over_id: &str) {
        let Some(active_id) = self.active_tab().map(str::to_string) else {
            return;
        };
        let Some(zone) = self.zones.zone_of(&active_id) else {
            return;
        };
        if self.zones.zone_of(over_id) != Some(zone) || over_id == active_id {
            return;
        }
        let items = self.zones.zone_mut(zone);
        let (Some(old_index), Some(new_index)) = (
            items.iter().position(|id| *id == active_id),
            items.iter().position(|id| id == over_id),
        ) else {
            return;
        };
        let moved = items.remove(old_index);
        items.insert(new_index, moved);
    }
}

#[derive(Debug, Default)]
pub struct DragReconciler {
    session: Option<DragSession>,
}

impl DragReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_id(&self) -> Option<&DragId> {
        self.session.as_ref().map(|session| &session.active)
    }

    pub fn hovered_zone(&self) -> Option<Zone> {
        self.session.as_ref().and_then(|session| session.hovered_zone)
    }

    /// The arrangement to draw while a drag is in progress.
    pub fn preview(&self) -> Option<&TabZones> {
        self.session.as_ref().map(|session| &session.zones)
    }

    pub fn drag_start(&mut self, store: &WorkspaceStore, space_id: &str, active: DragId) -> bool {
        let Some(zones) = store.zones(space_id) else {
            return false;
        };
        let hovered_zone = match &active {
            DragId::Tab(id) => match zones.zone_of(id) {
                Some(zone) => Some(zone),
                None => return false,
            },
            DragId::Zone(zone) => Some(*zone),
        };
        self.session = Some(DragSession {
            space_id: space_id.to_string(),
            active,
            zones,
            hovered_zone,
            last_over: None,
        });
        true
    }

    /// Applies cross-zone moves to the local arrangement. Returns the target
    /// resolved for this frame.
    pub fn drag_over(&mut self, store: &WorkspaceStore, frame: &DragFrame) -> Option<DragId> {
        let live = match self.session.as_mut() {
            Some(session) => session.sync_with(store),
            None => return None,
        };
        let Some(live) = live else {
            debug!("dragged tab disappeared, dropping drag");
            self.session = None;
            return None;
        };
        let session = self.session.as_mut()?;

        let Some(over) = detect_collision(
            &session.active,
            frame,
            &session.zones,
            session.last_over.as_ref(),
        ) else {
            session.hovered_zone = None;
            return None;
        };
        session.last_over = Some(over.clone());
        if session.active_tab().is_some() {
            if let Some(zone) = session.zone_of_target(&over) {
                session.hovered_zone = Some(zone);
            }
            session.move_across(&over, frame);
        }
        invariants::enforce(
            invariants::check_zone_partition(&live, &session.zones),
            "drag over",
        );
        Some(over)
    }

    /// Finishes the drag and commits the final arrangement to the store.
    pub fn drag_end(&mut self, store: &mut WorkspaceStore, frame: &DragFrame) -> DropOutcome {
        let Some(mut session) = self.session.take() else {
            return DropOutcome::Cancelled;
        };
        let Some(live) = session.sync_with(store) else {
            return DropOutcome::Cancelled;
        };
        let Some(over) = detect_collision(
            &session.active,
            frame,
            &session.zones,
            session.last_over.as_ref(),
        ) else {
            debug!(space_id = %session.space_id, "drop without target");
            return DropOutcome::Cancelled;
        };
        if session.active_tab().is_none() {
            return DropOutcome::Unchanged;
        }

        session.move_across(&over, frame);
        if let DragId::Tab(over_id) = &over {
            session.move_within(over_id);
        }
        invariants::enforce(
            invariants::check_zone_partition(&live, &session.zones),
            "drag end",
        );

        if store.apply_zone_order(&session.space_id, &session.zones) {
            DropOutcome::Committed(session.zones)
        } else {
            DropOutcome::Unchanged
        }
    }

    pub fn drag_cancel(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::store_at;
    use maestro_core::TabType;

    fn tab_id(store: &WorkspaceStore, title: &str) -> String {
        store
            .state()
            .tabs()
            .iter()
            .find(|tab| tab.title == title)
            .map(|tab| tab.id.clone())
            .expect("tab by title")
    }

    fn tab(store: &WorkspaceStore, title: &str, rect: Rect) -> Droppable {
        Droppable {
            id: DragId::Tab(tab_id(store, title)),
            rect,
        }
    }

    fn zone(zone: Zone, rect: Rect) -> Droppable {
        Droppable {
            id: DragId::Zone(zone),
            rect,
        }
    }

    fn frame_at(pointer: Point, droppables: Vec<Droppable>) -> DragFrame {
        DragFrame {
            pointer: Some(pointer),
            dragged: Rect::new(pointer.x - 100.0, pointer.y - 15.0, 200.0, 30.0),
            droppables,
        }
    }

    /// Space with favorites [A] and tabs [B, C].
    fn favorites_fixture() -> (WorkspaceStore, String) {
        let (mut store, _clock) = store_at(0);
        let space = store.add_space("Work");
        for title in ["A", "B", "C"] {
            store.open_tab(&space.id, TabType::Terminal, title, None);
        }
        let a = tab_id(&store, "A");
        assert_eq!(store.toggle_favorite(&a), Some(true));
        let zones = store.zones(&space.id).expect("zones");
        assert_eq!(zones.favorites, vec![a]);
        assert_eq!(zones.tabs, ids(&store, &["B", "C"]));
        (store, space.id)
    }

    fn ids(store: &WorkspaceStore, titles: &[&str]) -> Vec<String> {
        titles.iter().map(|title| tab_id(store, title)).collect()
    }

    #[test]
    fn hover_zone_clears_when_nothing_is_under_the_pointer() {
        let (store, space_id) = favorites_fixture();
        let mut drag = DragReconciler::new();
        assert!(drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "B"))));
        assert_eq!(drag.hovered_zone(), Some(Zone::Tabs));

        let away = frame_at(
            Point::new(900.0, 900.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 100.0)),
                zone(Zone::Tabs, Rect::new(0.0, 120.0, 200.0, 140.0)),
            ],
        );
        assert_eq!(drag.drag_over(&store, &away), None);
        assert!(drag.is_dragging());
        assert_eq!(drag.hovered_zone(), None);
    }

    #[test]
    fn cross_zone_drag_above_first_favorite() {
        let (mut store, space_id) = favorites_fixture();
        let mut drag = DragReconciler::new();
        assert!(drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "B"))));
        assert_eq!(drag.hovered_zone(), Some(Zone::Tabs));

        let hover = frame_at(
            Point::new(100.0, 15.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 100.0)),
                tab(&store, "A", Rect::new(0.0, 10.0, 200.0, 30.0)),
                zone(Zone::Tabs, Rect::new(0.0, 120.0, 200.0, 140.0)),
                tab(&store, "B", Rect::new(0.0, 130.0, 200.0, 30.0)),
                tab(&store, "C", Rect::new(0.0, 170.0, 200.0, 30.0)),
            ],
        );
        let over = drag.drag_over(&store, &hover).expect("target");
        assert_eq!(over, DragId::Tab(tab_id(&store, "A")));
        assert_eq!(drag.hovered_zone(), Some(Zone::Favorites));
        let preview = drag.preview().expect("preview");
        assert_eq!(preview.favorites, ids(&store, &["B", "A"]));
        assert_eq!(preview.tabs, ids(&store, &["C"]));
        // Nothing is written until the drop.
        assert_eq!(
            store.zones(&space_id).expect("zones").favorites,
            ids(&store, &["A"])
        );

        // After the visual reorder, B's placeholder sits where A was.
        let drop = frame_at(
            Point::new(100.0, 15.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 100.0)),
                tab(&store, "B", Rect::new(0.0, 10.0, 200.0, 30.0)),
                tab(&store, "A", Rect::new(0.0, 40.0, 200.0, 30.0)),
                zone(Zone::Tabs, Rect::new(0.0, 120.0, 200.0, 140.0)),
                tab(&store, "C", Rect::new(0.0, 130.0, 200.0, 30.0)),
            ],
        );
        let outcome = drag.drag_end(&mut store, &drop);
        let expected = TabZones {
            favorites: ids(&store, &["B", "A"]),
            tabs: ids(&store, &["C"]),
        };
        assert_eq!(outcome, DropOutcome::Committed(expected.clone()));
        assert_eq!(store.zones(&space_id), Some(expected));
        assert!(!drag.is_dragging());
        let b = store.tab(&tab_id(&store, "B")).expect("B");
        assert!(b.is_favorite);
    }

    #[test]
    fn same_zone_drop_after_last_item() {
        let (mut store, _clock) = store_at(0);
        let space = store.add_space("Work");
        for title in ["X", "Y", "Z"] {
            store.open_tab(&space.id, TabType::Browser, title, None);
        }
        let mut drag = DragReconciler::new();
        assert!(drag.drag_start(&store, &space.id, DragId::Tab(tab_id(&store, "X"))));

        let drop = frame_at(
            Point::new(100.0, 75.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, -60.0, 200.0, 50.0)),
                zone(Zone::Tabs, Rect::new(0.0, 0.0, 200.0, 100.0)),
                tab(&store, "X", Rect::new(0.0, 0.0, 200.0, 30.0)),
                tab(&store, "Y", Rect::new(0.0, 30.0, 200.0, 30.0)),
                tab(&store, "Z", Rect::new(0.0, 60.0, 200.0, 30.0)),
            ],
        );
        let outcome = drag.drag_end(&mut store, &drop);
        assert!(matches!(outcome, DropOutcome::Committed(_)));
        assert_eq!(
            store.zones(&space.id).expect("zones").tabs,
            ids(&store, &["Y", "Z", "X"])
        );
    }

    #[test]
    fn backward_move_lands_before_target() {
        let (mut store, _clock) = store_at(0);
        let space = store.add_space("Work");
        for title in ["X", "Y", "Z"] {
            store.open_tab(&space.id, TabType::Browser, title, None);
        }
        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space.id, DragId::Tab(tab_id(&store, "Z")));
        let drop = frame_at(
            Point::new(100.0, 40.0),
            vec![
                tab(&store, "X", Rect::new(0.0, 0.0, 200.0, 30.0)),
                tab(&store, "Y", Rect::new(0.0, 30.0, 200.0, 30.0)),
                tab(&store, "Z", Rect::new(0.0, 60.0, 200.0, 30.0)),
            ],
        );
        drag.drag_end(&mut store, &drop);
        assert_eq!(
            store.zones(&space.id).expect("zones").tabs,
            ids(&store, &["X", "Z", "Y"])
        );
    }

    #[test]
    fn cancel_discards_mid_drag_moves() {
        let (store, space_id) = favorites_fixture();
        let before = store.zones(&space_id);
        let revision = store.revision();

        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "C")));
        let hover = frame_at(
            Point::new(100.0, 50.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 100.0)),
                tab(&store, "A", Rect::new(0.0, 10.0, 200.0, 30.0)),
            ],
        );
        drag.drag_over(&store, &hover);
        assert_eq!(
            drag.preview().map(|zones| zones.favorites.len()),
            Some(2)
        );

        drag.drag_cancel();
        assert!(drag.preview().is_none());
        assert_eq!(store.zones(&space_id), before);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn drop_on_empty_zone_moves_tab_there() {
        let (mut store, _clock) = store_at(0);
        let space = store.add_space("Work");
        store.open_tab(&space.id, TabType::Terminal, "only", None);
        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space.id, DragId::Tab(tab_id(&store, "only")));

        let drop = frame_at(
            Point::new(100.0, 20.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 50.0)),
                zone(Zone::Tabs, Rect::new(0.0, 60.0, 200.0, 50.0)),
                tab(&store, "only", Rect::new(0.0, 70.0, 200.0, 30.0)),
            ],
        );
        assert!(matches!(
            drag.drag_end(&mut store, &drop),
            DropOutcome::Committed(_)
        ));
        let zones = store.zones(&space.id).expect("zones");
        assert_eq!(zones.favorites, ids(&store, &["only"]));
        assert!(zones.tabs.is_empty());
    }

    #[test]
    fn fast_pointer_keeps_last_target() {
        let (store, space_id) = favorites_fixture();
        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "C")));
        let droppables = vec![tab(&store, "B", Rect::new(0.0, 130.0, 200.0, 30.0))];

        let first = drag
            .drag_over(&store, &frame_at(Point::new(100.0, 140.0), droppables.clone()))
            .expect("first target");
        let lost = DragFrame {
            pointer: Some(Point::new(900.0, 900.0)),
            dragged: Rect::new(800.0, 885.0, 200.0, 30.0),
            droppables,
        };
        assert_eq!(drag.drag_over(&store, &lost), Some(first));
    }

    #[test]
    fn drop_without_any_target_cancels() {
        let (mut store, space_id) = favorites_fixture();
        let revision = store.revision();
        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "B")));
        let nowhere = DragFrame {
            pointer: Some(Point::new(900.0, 900.0)),
            dragged: Rect::new(800.0, 885.0, 200.0, 30.0),
            droppables: Vec::new(),
        };
        assert_eq!(drag.drag_end(&mut store, &nowhere), DropOutcome::Cancelled);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn tabs_closed_or_opened_mid_drag_are_reconciled() {
        let (mut store, space_id) = favorites_fixture();
        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "B")));

        store.close_tab(&tab_id(&store, "C"));
        store.open_tab(&space_id, TabType::Note, "D", None);

        let drop = frame_at(
            Point::new(100.0, 15.0),
            vec![
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 100.0)),
                tab(&store, "A", Rect::new(0.0, 10.0, 200.0, 30.0)),
            ],
        );
        drag.drag_end(&mut store, &drop);
        let zones = store.zones(&space_id).expect("zones");
        assert_eq!(zones.favorites, ids(&store, &["B", "A"]));
        assert_eq!(zones.tabs, ids(&store, &["D"]));

        let mut drag = DragReconciler::new();
        drag.drag_start(&store, &space_id, DragId::Tab(tab_id(&store, "D")));
        store.close_tab(&tab_id(&store, "D"));
        assert_eq!(drag.drag_over(&store, &drop), None);
        assert!(!drag.is_dragging());
    }

    #[test]
    fn dragging_a_zone_only_targets_zones() {
        let (mut store, space_id) = favorites_fixture();
        let revision = store.revision();
        let mut drag = DragReconciler::new();
        assert!(drag.drag_start(&store, &space_id, DragId::Zone(Zone::Tabs)));
        let frame = DragFrame {
            pointer: Some(Point::new(100.0, 15.0)),
            dragged: Rect::new(0.0, 0.0, 200.0, 100.0),
            droppables: vec![
                tab(&store, "A", Rect::new(0.0, 10.0, 200.0, 30.0)),
                zone(Zone::Favorites, Rect::new(0.0, 0.0, 200.0, 100.0)),
                zone(Zone::Tabs, Rect::new(0.0, 120.0, 200.0, 140.0)),
            ],
        };
        assert_eq!(
            drag.drag_over(&store, &frame),
            Some(DragId::Zone(Zone::Favorites))
        );
        assert_eq!(drag.drag_end(&mut store, &frame), DropOutcome::Unchanged);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn rect_intersection_used_without_pointer() {
        let zones = TabZones {
            favorites: vec![],
            tabs: vec!["t1".to_string(), "t2".to_string()],
        };
        let frame = DragFrame {
            pointer: None,
            dragged: Rect::new(0.0, 50.0, 100.0, 30.0),
            droppables: vec![
                Droppable {
                    id: DragId::Tab("t1".to_string()),
                    rect: Rect::new(0.0, 0.0, 100.0, 60.0),
                },
                Droppable {
                    id: DragId::Tab("t2".to_string()),
                    rect: Rect::new(0.0, 60.0, 100.0, 60.0),
                },
                Droppable {
                    id: DragId::Tab("stranger".to_string()),
                    rect: Rect::new(0.0, 50.0, 100.0, 30.0),
                },
            ],
        };
        assert_eq!(
            detect_collision(&DragId::Tab("t1".to_string()), &frame, &zones, None),
            Some(DragId::Tab("t2".to_string()))
        );
    }
}
