//! Segment lifecycle. Ended segments stay in their space's history; the
//! "active" working set is derived on demand from status.

use chrono::{DateTime, Utc};
use maestro_core::{Segment, SegmentConfig, SegmentStatus, SegmentType};
use tracing::debug;

use crate::{Change, WorkspaceStore};

impl WorkspaceStore {
    /// Starts a new segment now. Returns `None` when the space is unknown.
    pub fn create_segment(
        &mut self,
        space_id: &str,
        title: &str,
        segment_type: SegmentType,
        config: Option<SegmentConfig>,
    ) -> Option<Segment> {
        self.insert_segment(space_id, title, segment_type, config, None)
    }

    /// Creates a segment at an explicit start time, as a click on an empty
    /// part of a lane does. A start in the future yields a scheduled segment.
    pub fn create_segment_at(
        &mut self,
        space_id: &str,
        title: &str,
        segment_type: SegmentType,
        config: Option<SegmentConfig>,
        start_time: DateTime<Utc>,
    ) -> Option<Segment> {
        self.insert_segment(space_id, title, segment_type, config, Some(start_time))
    }

    fn insert_segment(
        &mut self,
        space_id: &str,
        title: &str,
        segment_type: SegmentType,
        config: Option<SegmentConfig>,
        start_time: Option<DateTime<Utc>>,
    ) -> Option<Segment> {
        self.mutate("create_segment", |state, now| {
            let index = state.space_index(space_id)?;
            let start_time = start_time.unwrap_or(now);
            let mut segment = Segment::new(
                space_id,
                title,
                segment_type,
                config.unwrap_or_default(),
                start_time,
            );
            if start_time > now {
                segment.status = SegmentStatus::Scheduled;
            }
            let space = &mut state.spaces[index];
            space.segments.push(segment.clone());
            space.last_active_at = now;
            state.index_segment(&segment.id, space_id);
            let change = Change::SegmentCreated {
                space_id: space_id.to_string(),
                segment_id: segment.id.clone(),
            };
            Some((segment, change))
        })
    }

    /// Stamps `end_time` and completes the segment. Ending twice is a no-op
    /// and keeps the first end time.
    pub fn end_segment(&mut self, segment_id: &str) -> bool {
        self.mutate("end_segment", |state, now| {
            let segment = state.segment_mut(segment_id)?;
            if !segment.status.can_transition_to(SegmentStatus::Completed) {
                return None;
            }
            segment.status = SegmentStatus::Completed;
            segment.end_time = Some(now.max(segment.start_time));
            let change = Change::SegmentUpdated {
                space_id: segment.space_id.clone(),
                segment_id: segment.id.clone(),
            };
            Some(((), change))
        })
        .is_some()
    }

    pub fn pause_segment(&mut self, segment_id: &str) -> bool {
        self.transition("pause_segment", segment_id, SegmentStatus::Paused, |_| true)
    }

    pub fn resume_segment(&mut self, segment_id: &str) -> bool {
        self.transition("resume_segment", segment_id, SegmentStatus::Active, |segment| {
            segment.status == SegmentStatus::Paused
        })
    }

    /// Scheduled -> active, used when a planted segment's trigger fires.
    pub fn trigger_scheduled(&mut self, segment_id: &str) -> bool {
        self.transition(
            "trigger_scheduled",
            segment_id,
            SegmentStatus::Active,
            |segment| segment.status == SegmentStatus::Scheduled,
        )
    }

    pub fn mark_agent_working(&mut self, segment_id: &str) -> bool {
        self.transition(
            "mark_agent_working",
            segment_id,
            SegmentStatus::AgentWorking,
            |segment| segment.segment_type == SegmentType::Agent,
        )
    }

    pub fn mark_agent_idle(&mut self, segment_id: &str) -> bool {
        self.transition(
            "mark_agent_idle",
            segment_id,
            SegmentStatus::Active,
            |segment| segment.status == SegmentStatus::AgentWorking,
        )
    }

    fn transition(
        &mut self,
        name: &'static str,
        segment_id: &str,
        next: SegmentStatus,
        guard: impl FnOnce(&Segment) -> bool,
    ) -> bool {
        self.mutate(name, |state, _now| {
            let segment = state.segment_mut(segment_id)?;
            if !guard(segment) || !segment.status.can_transition_to(next) {
                debug!(
                    op = name,
                    segment_id,
                    from = %segment.status,
                    to = %next,
                    "transition not allowed"
                );
                return None;
            }
            segment.status = next;
            let change = Change::SegmentUpdated {
                space_id: segment.space_id.clone(),
                segment_id: segment.id.clone(),
            };
            Some(((), change))
        })
        .is_some()
    }

    pub fn update_segment_config(&mut self, segment_id: &str, patch: SegmentConfig) -> bool {
        self.mutate("update_segment_config", |state, _now| {
            let segment = state.segment_mut(segment_id)?;
            segment.config.merge(patch);
            let change = Change::SegmentUpdated {
                space_id: segment.space_id.clone(),
                segment_id: segment.id.clone(),
            };
            Some(((), change))
        })
        .is_some()
    }

    /// `None` clears the selection; an unknown id leaves it untouched.
    pub fn select_segment(&mut self, segment_id: Option<&str>) -> bool {
        self.mutate_view("select_segment", |state, _now| {
            if let Some(id) = segment_id {
                state.segment(id)?;
            }
            let next = segment_id.map(str::to_string);
            if state.timeline.selected_segment_id == next {
                return None;
            }
            state.timeline.selected_segment_id = next;
            Some(((), Change::TimelineChanged))
        })
        .is_some()
    }

    pub fn segment(&self, segment_id: &str) -> Option<&Segment> {
        self.state().segment(segment_id)
    }

    /// Every segment that has not been ended, in lane order.
    pub fn active_segments(&self) -> Vec<&Segment> {
        self.state()
            .spaces()
            .iter()
            .flat_map(|space| space.segments.iter())
            .filter(|segment| !segment.status.is_terminal())
            .collect()
    }

    /// Scheduled segments whose start time has arrived.
    pub fn due_scheduled(&self, now: DateTime<Utc>) -> Vec<String> {
        self.state()
            .spaces()
            .iter()
            .flat_map(|space| space.segments.iter())
            .filter(|segment| {
                segment.status == SegmentStatus::Scheduled && segment.start_time <= now
            })
            .map(|segment| segment.id.clone())
            .collect()
    }

    /// Clock-driven counterpart of [`Self::trigger_scheduled`]: starts every
    /// due segment in one commit that is not an undo step.
    pub fn start_due_scheduled(&mut self) -> Vec<String> {
        let due = self.due_scheduled(self.now());
        if due.is_empty() {
            return due;
        }
        self.mutate_view("start_due_scheduled", |state, _now| {
            for id in &due {
                if let Some(segment) = state.segment_mut(id) {
                    segment.status = SegmentStatus::Active;
                }
            }
            Some((due.clone(), Change::SegmentsStarted { segment_ids: due }))
        })
        .unwrap_or_default()
    }
}
