use maestro_core::{new_id, Tab, TabStatus, TabType, Zone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::{invariants, Change, WorkspaceStore};

/// Ordered tab ids of one space, split by zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabZones {
    pub favorites: Vec<String>,
    pub tabs: Vec<String>,
}

impl TabZones {
    pub fn zone(&self, zone: Zone) -> &[String] {
        match zone {
            Zone::Favorites => &self.favorites,
            Zone::Tabs => &self.tabs,
        }
    }

    pub fn zone_mut(&mut self, zone: Zone) -> &mut Vec<String> {
        match zone {
            Zone::Favorites => &mut self.favorites,
            Zone::Tabs => &mut self.tabs,
        }
    }

    pub fn zone_of(&self, tab_id: &str) -> Option<Zone> {
        if self.favorites.iter().any(|id| id == tab_id) {
            Some(Zone::Favorites)
        } else if self.tabs.iter().any(|id| id == tab_id) {
            Some(Zone::Tabs)
        } else {
            None
        }
    }

    pub fn all_ids(&self) -> BTreeSet<String> {
        self.favorites
            .iter()
            .chain(self.tabs.iter())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.favorites.len() + self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkspaceStore {
    pub fn tab(&self, tab_id: &str) -> Option<&Tab> {
        self.state().tabs().iter().find(|tab| tab.id == tab_id)
    }

    pub fn tabs_in(&self, space_id: &str) -> Vec<&Tab> {
        self.state()
            .tabs()
            .iter()
            .filter(|tab| tab.space_id == space_id)
            .collect()
    }

    /// Zone view of a space; order inside each zone follows the global tab
    /// order.
    pub fn zones(&self, space_id: &str) -> Option<TabZones> {
        self.space(space_id)?;
        let mut zones = TabZones::default();
        for tab in self.tabs_in(space_id) {
            zones.zone_mut(tab.zone()).push(tab.id.clone());
        }
        Some(zones)
    }

    /// Opens a tab at the end of the space's tab zone and focuses it.
    pub fn open_tab(
        &mut self,
        space_id: &str,
        tab_type: TabType,
        title: &str,
        segment_id: Option<&str>,
    ) -> Option<Tab> {
        self.mutate("open_tab", |state, _now| {
            state.space_index(space_id)?;
            let segment_id = segment_id.filter(|id| state.segment(id).is_some());
            let tab = Tab {
                id: new_id(),
                space_id: space_id.to_string(),
                tab_type,
                title: title.to_string(),
                is_favorite: false,
                segment_id: segment_id.map(str::to_string),
                status: TabStatus::Idle,
            };
            state.tabs.push(tab.clone());
            state.active_space_id = Some(space_id.to_string());
            state.active_tab_id = Some(tab.id.clone());
            let change = Change::TabsChanged {
                space_id: space_id.to_string(),
            };
            Some((tab, change))
        })
    }

    /// Closes a tab. If it was focused, focus moves to the tab that took its
    /// place in the same space, else the one before it.
    pub fn close_tab(&mut self, tab_id: &str) -> Option<Tab> {
        self.mutate("close_tab", |state, _now| {
            let index = state.tab_index(tab_id)?;
            let space_id = state.tabs[index].space_id.clone();
            let siblings: Vec<String> = state
                .tabs
                .iter()
                .filter(|tab| tab.space_id == space_id)
                .map(|tab| tab.id.clone())
                .collect();
            let sibling_index = siblings.iter().position(|id| id == tab_id).unwrap_or(0);
            let removed = state.tabs.remove(index);

            if state.active_tab_id.as_deref() == Some(tab_id) {
                let next = siblings
                    .get(sibling_index + 1)
                    .or_else(|| {
                        sibling_index
                            .checked_sub(1)
                            .and_then(|previous| siblings.get(previous))
                    })
                    .cloned();
                state.active_tab_id = next;
            }
            let change = Change::TabsChanged { space_id };
            Some((removed, change))
        })
    }

    /// Focuses a tab and the space it belongs to.
    pub fn set_active_tab(&mut self, tab_id: &str) -> bool {
        self.mutate_view("set_active_tab", |state, _now| {
            let index = state.tab_index(tab_id)?;
            if state.active_tab_id.as_deref() == Some(tab_id) {
                return None;
            }
            state.active_space_id = Some(state.tabs[index].space_id.clone());
            state.active_tab_id = Some(tab_id.to_string());
            Some(((), Change::ActiveChanged))
        })
        .is_some()
    }

    /// Focuses a space and its first tab, favorites first.
    pub fn switch_space(&mut self, space_id: &str) -> bool {
        let first_tab = self.zones(space_id).and_then(|zones| {
            zones
                .favorites
                .first()
                .or_else(|| zones.tabs.first())
                .cloned()
        });
        self.mutate_view("switch_space", |state, now| {
            let space = state.space_mut(space_id)?;
            space.last_active_at = now;
            state.active_space_id = Some(space_id.to_string());
            state.active_tab_id = first_tab;
            Some(((), Change::ActiveChanged))
        })
        .is_some()
    }

    pub fn rename_tab(&mut self, tab_id: &str, title: &str) -> bool {
        self.mutate("rename_tab", |state, _now| {
            let index = state.tab_index(tab_id)?;
            let tab = &mut state.tabs[index];
            if tab.title == title {
                return None;
            }
            tab.title = title.to_string();
            let change = Change::TabsChanged {
                space_id: tab.space_id.clone(),
            };
            Some(((), change))
        })
        .is_some()
    }

    /// Running/idle indicator. Not an undo step.
    pub fn set_tab_status(&mut self, tab_id: &str, status: TabStatus) -> bool {
        self.mutate_view("set_tab_status", |state, _now| {
            let index = state.tab_index(tab_id)?;
            let tab = &mut state.tabs[index];
            if tab.status == status {
                return None;
            }
            tab.status = status;
            let change = Change::TabsChanged {
                space_id: tab.space_id.clone(),
            };
            Some(((), change))
        })
        .is_some()
    }

    /// Moves the tab to the other zone, appending it at the end. Returns the
    /// new favorite flag.
    pub fn toggle_favorite(&mut self, tab_id: &str) -> Option<bool> {
        self.mutate("toggle_favorite", |state, _now| {
            let index = state.tab_index(tab_id)?;
            let mut tab = state.tabs.remove(index);
            tab.is_favorite = !tab.is_favorite;
            let is_favorite = tab.is_favorite;
            let change = Change::TabsChanged {
                space_id: tab.space_id.clone(),
            };
            state.tabs.push(tab);
            Some((is_favorite, change))
        })
    }

    /// Commits a zone arrangement for one space. `zones` must be a
    /// permutation of the space's tabs; anything else is ignored.
    pub fn apply_zone_order(&mut self, space_id: &str, zones: &TabZones) -> bool {
        let Some(current) = self.zones(space_id) else {
            return false;
        };
        if &current == zones {
            return false;
        }
        if let Err(violation) = invariants::check_zone_partition(&current.all_ids(), zones) {
            debug!(space_id, %violation, "zone order rejected");
            return false;
        }

        self.mutate("apply_zone_order", |state, _now| {
            let slots: Vec<usize> = state
                .tabs
                .iter()
                .enumerate()
                .filter(|(_, tab)| tab.space_id == space_id)
                .map(|(index, _)| index)
                .collect();
            let ordered: Vec<(&String, bool)> = zones
                .favorites
                .iter()
                .map(|id| (id, true))
                .chain(zones.tabs.iter().map(|id| (id, false)))
                .collect();

            let mut arranged = Vec::with_capacity(ordered.len());
            for (id, is_favorite) in ordered {
                let index = state.tab_index(id)?;
                let mut tab = state.tabs[index].clone();
                tab.is_favorite = is_favorite;
                arranged.push(tab);
            }
            for (slot, tab) in slots.into_iter().zip(arranged) {
                state.tabs[slot] = tab;
            }
            let change = Change::TabsChanged {
                space_id: space_id.to_string(),
            };
            Some(((), change))
        })
        .is_some()
    }
}
