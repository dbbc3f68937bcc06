//! Structural checks run after every committed mutation.
//!
//! A failure here is a reconciliation bug, never user error: debug builds
//! panic, release builds log at error level and carry on with the state as is.

use maestro_core::{Segment, SegmentStatus};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;
use tracing::error;

use crate::{TabZones, WorkspaceState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("duplicate space id {0}")]
    DuplicateSpace(String),
    #[error("space {space_id} has position {found}, expected {expected}")]
    SparseSpacePosition {
        space_id: String,
        expected: usize,
        found: usize,
    },
    #[error("duplicate segment id {0}")]
    DuplicateSegment(String),
    #[error("segment {segment_id} lives in space {stored_in} but names space {claimed}")]
    SegmentOwnerMismatch {
        segment_id: String,
        stored_in: String,
        claimed: String,
    },
    #[error("segment index out of sync for {0}")]
    SegmentIndexOutOfSync(String),
    #[error("segment {0} ends before it starts")]
    SegmentEndsBeforeStart(String),
    #[error("segment {segment_id} is {status} but end time present = {has_end}")]
    EndTimeStatusMismatch {
        segment_id: String,
        status: SegmentStatus,
        has_end: bool,
    },
    #[error("duplicate tab id {0}")]
    DuplicateTab(String),
    #[error("tab {tab_id} belongs to unknown space {space_id}")]
    OrphanTab { tab_id: String, space_id: String },
    #[error("tab {0} appears more than once across zones")]
    TabInBothZones(String),
    #[error("tab {0} is missing from the zones")]
    TabMissingFromZones(String),
    #[error("tab {0} in the zones does not belong to the space")]
    UnknownTabInZones(String),
    #[error("active space {0} does not exist")]
    DanglingActiveSpace(String),
    #[error("active tab {0} does not exist")]
    DanglingActiveTab(String),
}

pub fn check_segment(segment: &Segment) -> Result<(), InvariantViolation> {
    if let Some(end) = segment.end_time {
        if end < segment.start_time {
            return Err(InvariantViolation::SegmentEndsBeforeStart(
                segment.id.clone(),
            ));
        }
    }
    let has_end = segment.end_time.is_some();
    if has_end != segment.status.is_terminal() {
        return Err(InvariantViolation::EndTimeStatusMismatch {
            segment_id: segment.id.clone(),
            status: segment.status,
            has_end,
        });
    }
    Ok(())
}

pub fn check(state: &WorkspaceState) -> Result<(), InvariantViolation> {
    let mut space_ids = HashSet::new();
    let mut segment_ids = HashSet::new();
    for (expected, space) in state.spaces.iter().enumerate() {
        if !space_ids.insert(space.id.as_str()) {
            return Err(InvariantViolation::DuplicateSpace(space.id.clone()));
        }
        if space.position != expected {
            return Err(InvariantViolation::SparseSpacePosition {
                space_id: space.id.clone(),
                expected,
                found: space.position,
            });
        }
        for segment in &space.segments {
            if !segment_ids.insert(segment.id.as_str()) {
                return Err(InvariantViolation::DuplicateSegment(segment.id.clone()));
            }
            if segment.space_id != space.id {
                return Err(InvariantViolation::SegmentOwnerMismatch {
                    segment_id: segment.id.clone(),
                    stored_in: space.id.clone(),
                    claimed: segment.space_id.clone(),
                });
            }
            if state.segment_owner(&segment.id) != Some(space.id.as_str()) {
                return Err(InvariantViolation::SegmentIndexOutOfSync(
                    segment.id.clone(),
                ));
            }
            check_segment(segment)?;
        }
    }
    if state.segment_count() != segment_ids.len() {
        let stale = state
            .segment_owner
            .keys()
            .find(|id| !segment_ids.contains(id.as_str()))
            .cloned()
            .unwrap_or_default();
        return Err(InvariantViolation::SegmentIndexOutOfSync(stale));
    }

    let mut tab_ids = HashSet::new();
    for tab in &state.tabs {
        if !tab_ids.insert(tab.id.as_str()) {
            return Err(InvariantViolation::DuplicateTab(tab.id.clone()));
        }
        if !space_ids.contains(tab.space_id.as_str()) {
            return Err(InvariantViolation::OrphanTab {
                tab_id: tab.id.clone(),
                space_id: tab.space_id.clone(),
            });
        }
    }

    if let Some(active) = &state.active_space_id {
        if !space_ids.contains(active.as_str()) {
            return Err(InvariantViolation::DanglingActiveSpace(active.clone()));
        }
    }
    if let Some(active) = &state.active_tab_id {
        if !tab_ids.contains(active.as_str()) {
            return Err(InvariantViolation::DanglingActiveTab(active.clone()));
        }
    }
    Ok(())
}

/// The two zones of a space must together hold exactly `expected`, each id
/// once.
pub fn check_zone_partition(
    expected: &BTreeSet<String>,
    zones: &TabZones,
) -> Result<(), InvariantViolation> {
    let mut seen = BTreeSet::new();
    for id in zones.favorites.iter().chain(zones.tabs.iter()) {
        if !seen.insert(id.as_str()) {
            return Err(InvariantViolation::TabInBothZones(id.clone()));
        }
        if !expected.contains(id) {
            return Err(InvariantViolation::UnknownTabInZones(id.clone()));
        }
    }
    if let Some(missing) = expected.iter().find(|id| !seen.contains(id.as_str())) {
        return Err(InvariantViolation::TabMissingFromZones(missing.clone()));
    }
    Ok(())
}

pub(crate) fn enforce(result: Result<(), InvariantViolation>, context: &str) {
    if let Err(violation) = result {
        if cfg!(debug_assertions) {
            panic!("{context}: invariant violated: {violation}");
        }
        error!(context, %violation, "invariant violated");
    }
}
