use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod clock;
pub mod geometry;

pub use clock::{Clock, ManualClock, SystemClock};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
pub const RECENT_CODING_PATHS_LIMIT: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl CoreError {
    fn unknown(kind: &'static str, value: &str) -> Self {
        CoreError::UnknownVariant {
            kind,
            value: value.to_string(),
        }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZoomLevel {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl ZoomLevel {
    pub const ALL: [ZoomLevel; 4] = [
        ZoomLevel::Hour,
        ZoomLevel::Day,
        ZoomLevel::Week,
        ZoomLevel::Month,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomLevel::Hour => "hour",
            ZoomLevel::Day => "day",
            ZoomLevel::Week => "week",
            ZoomLevel::Month => "month",
        }
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoomLevel {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "hour" | "h" => Ok(ZoomLevel::Hour),
            "day" | "d" => Ok(ZoomLevel::Day),
            "week" | "w" => Ok(ZoomLevel::Week),
            "month" | "m" => Ok(ZoomLevel::Month),
            other => Err(CoreError::unknown("zoom level", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentType {
    Browser,
    Terminal,
    Agent,
    Note,
    External,
    Planted,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Browser => "browser",
            SegmentType::Terminal => "terminal",
            SegmentType::Agent => "agent",
            SegmentType::Note => "note",
            SegmentType::External => "external",
            SegmentType::Planted => "planted",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "browser" => Ok(SegmentType::Browser),
            "terminal" => Ok(SegmentType::Terminal),
            "agent" => Ok(SegmentType::Agent),
            "note" => Ok(SegmentType::Note),
            "external" => Ok(SegmentType::External),
            "planted" => Ok(SegmentType::Planted),
            other => Err(CoreError::unknown("segment type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentStatus {
    Active,
    Paused,
    Completed,
    AgentWorking,
    Scheduled,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Active => "active",
            SegmentStatus::Paused => "paused",
            SegmentStatus::Completed => "completed",
            SegmentStatus::AgentWorking => "agent-working",
            SegmentStatus::Scheduled => "scheduled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Completed)
    }

    /// Allowed edges of the segment state machine. `agent-working` is a
    /// sub-state of `active`, so it shares the exits of `active`.
    pub fn can_transition_to(&self, next: SegmentStatus) -> bool {
        use SegmentStatus::*;
        matches!(
            (self, next),
            (Active, Paused)
                | (Active, Completed)
                | (Active, AgentWorking)
                | (AgentWorking, Active)
                | (AgentWorking, Paused)
                | (AgentWorking, Completed)
                | (Paused, Active)
                | (Paused, Completed)
                | (Scheduled, Active)
        )
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentStatus {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "active" => Ok(SegmentStatus::Active),
            "paused" => Ok(SegmentStatus::Paused),
            "completed" | "done" => Ok(SegmentStatus::Completed),
            "agent-working" | "agent_working" => Ok(SegmentStatus::AgentWorking),
            "scheduled" => Ok(SegmentStatus::Scheduled),
            other => Err(CoreError::unknown("segment status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    ClaudeCode,
    Codex,
    Cursor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Time,
    Event,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    pub kind: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserTab {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Type-specific payload of a segment. Every field is optional so partially
/// written configs from older snapshots still load; keys this build does not
/// know about are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SegmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tabs: Option<Vec<BrowserTab>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_buffer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_scroll_position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<AgentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

fn overlay<T>(target: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *target = patch;
    }
}

impl SegmentConfig {
    /// Overlays every field present in `patch`; absent fields keep their
    /// current value.
    pub fn merge(&mut self, patch: SegmentConfig) {
        overlay(&mut self.urls, patch.urls);
        overlay(&mut self.tabs, patch.tabs);
        overlay(&mut self.commands, patch.commands);
        overlay(&mut self.working_dir, patch.working_dir);
        overlay(&mut self.env, patch.env);
        overlay(&mut self.terminal_buffer, patch.terminal_buffer);
        overlay(&mut self.terminal_theme, patch.terminal_theme);
        overlay(
            &mut self.terminal_scroll_position,
            patch.terminal_scroll_position,
        );
        overlay(&mut self.agent_type, patch.agent_type);
        overlay(&mut self.agent_task, patch.agent_task);
        overlay(&mut self.app_name, patch.app_name);
        overlay(&mut self.app_path, patch.app_path);
        overlay(&mut self.files, patch.files);
        overlay(&mut self.trigger, patch.trigger);
        overlay(&mut self.content, patch.content);
        self.extra.extend(patch.extra);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub id: String,
    pub space_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub segment_type: SegmentType,
    pub status: SegmentStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub config: SegmentConfig,
}

impl Segment {
    pub fn new(
        space_id: impl Into<String>,
        title: impl Into<String>,
        segment_type: SegmentType,
        config: SegmentConfig,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            space_id: space_id.into(),
            title: title.into(),
            segment_type,
            status: SegmentStatus::Active,
            start_time,
            end_time: None,
            config,
        }
    }

    /// Open-ended segments grow with the clock until they are ended.
    pub fn is_live(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end_time.unwrap_or(now)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Deadline,
    Milestone,
    Note,
}

impl MarkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKind::Deadline => "deadline",
            MarkerKind::Milestone => "milestone",
            MarkerKind::Note => "note",
        }
    }
}

impl FromStr for MarkerKind {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "deadline" => Ok(MarkerKind::Deadline),
            "milestone" => Ok(MarkerKind::Milestone),
            "note" => Ok(MarkerKind::Note),
            other => Err(CoreError::unknown("marker kind", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Marker {
    pub id: String,
    pub space_id: String,
    pub time: DateTime<Utc>,
    pub kind: MarkerKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceColors {
    pub name: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
}

pub const SPACE_COLOR_PALETTE: [SpaceColors; 8] = [
    SpaceColors {
        name: "indigo",
        primary: "#6366f1",
        secondary: "#4338ca",
    },
    SpaceColors {
        name: "emerald",
        primary: "#10b981",
        secondary: "#047857",
    },
    SpaceColors {
        name: "amber",
        primary: "#f59e0b",
        secondary: "#d97706",
    },
    SpaceColors {
        name: "rose",
        primary: "#f43f5e",
        secondary: "#e11d48",
    },
    SpaceColors {
        name: "violet",
        primary: "#8b5cf6",
        secondary: "#7c3aed",
    },
    SpaceColors {
        name: "cyan",
        primary: "#06b6d4",
        secondary: "#0891b2",
    },
    SpaceColors {
        name: "coral",
        primary: "#fb7185",
        secondary: "#f472b6",
    },
    SpaceColors {
        name: "sage",
        primary: "#84cc16",
        secondary: "#65a30d",
    },
];

/// Palette entry for the n-th space, cycling once the palette is exhausted.
pub fn palette_for(index: usize) -> SpaceColors {
    SPACE_COLOR_PALETTE[index % SPACE_COLOR_PALETTE.len()]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub position: usize,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub recent_coding_paths: Vec<String>,
}

impl Space {
    pub fn new(name: impl Into<String>, position: usize, now: DateTime<Utc>) -> Self {
        let colors = palette_for(position);
        Self {
            id: new_id(),
            name: name.into(),
            position,
            primary_color: colors.primary.to_string(),
            secondary_color: colors.secondary.to_string(),
            icon: None,
            segments: Vec::new(),
            markers: Vec::new(),
            next: None,
            last_active_at: now,
            recent_coding_paths: Vec::new(),
        }
    }

    pub fn segment(&self, segment_id: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == segment_id)
    }

    /// Most recent first, deduplicated, capped at `RECENT_CODING_PATHS_LIMIT`.
    pub fn remember_coding_path(&mut self, path: &str) {
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        self.recent_coding_paths.retain(|existing| existing != path);
        self.recent_coding_paths.insert(0, path.to_string());
        self.recent_coding_paths.truncate(RECENT_CODING_PATHS_LIMIT);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TabType {
    Terminal,
    Browser,
    Note,
    Agent,
    Tasks,
    AppLauncher,
}

impl TabType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabType::Terminal => "terminal",
            TabType::Browser => "browser",
            TabType::Note => "note",
            TabType::Agent => "agent",
            TabType::Tasks => "tasks",
            TabType::AppLauncher => "app-launcher",
        }
    }
}

impl FromStr for TabType {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "terminal" => Ok(TabType::Terminal),
            "browser" => Ok(TabType::Browser),
            "note" => Ok(TabType::Note),
            "agent" => Ok(TabType::Agent),
            "tasks" => Ok(TabType::Tasks),
            "app-launcher" | "app_launcher" | "launcher" => Ok(TabType::AppLauncher),
            other => Err(CoreError::unknown("tab type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    #[default]
    Idle,
    Running,
}

impl TabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabStatus::Idle => "idle",
            TabStatus::Running => "running",
        }
    }
}

impl FromStr for TabStatus {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "idle" => Ok(TabStatus::Idle),
            "running" => Ok(TabStatus::Running),
            other => Err(CoreError::unknown("tab status", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    pub id: String,
    pub space_id: String,
    #[serde(rename = "type")]
    pub tab_type: TabType,
    pub title: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
    #[serde(default)]
    pub status: TabStatus,
}

impl Tab {
    pub fn zone(&self) -> Zone {
        Zone::for_favorite(self.is_favorite)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Favorites,
    Tabs,
}

impl Zone {
    pub fn for_favorite(is_favorite: bool) -> Self {
        if is_favorite {
            Zone::Favorites
        } else {
            Zone::Tabs
        }
    }

    pub fn is_favorite(&self) -> bool {
        matches!(self, Zone::Favorites)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Favorites => "favorites",
            Zone::Tabs => "tabs",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "favorites" | "favorite" | "fav" => Ok(Zone::Favorites),
            "tabs" | "tab" => Ok(Zone::Tabs),
            other => Err(CoreError::unknown("zone", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineState {
    #[serde(default)]
    pub zoom_level: ZoomLevel,
    #[serde(default)]
    pub scroll_x: f64,
    #[serde(default)]
    pub scroll_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_segment_id: Option<String>,
}

impl Default for TimelineState {
    fn default() -> Self {
        Self {
            zoom_level: ZoomLevel::Day,
            scroll_x: 0.0,
            scroll_y: 0.0,
            selected_segment_id: None,
        }
    }
}

/// Durable form of the whole workspace graph. Segments travel nested inside
/// their owning space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceSnapshot {
    pub schema_version: u32,
    #[serde(default)]
    pub spaces: Vec<Space>,
    #[serde(default)]
    pub tabs: Vec<Tab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_space_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<String>,
    #[serde(default)]
    pub timeline: TimelineState,
    pub saved_at: DateTime<Utc>,
}

impl WorkspaceSnapshot {
    pub fn empty(saved_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            spaces: Vec::new(),
            tabs: Vec::new(),
            active_space_id: None,
            active_tab_id: None,
            timeline: TimelineState::default(),
            saved_at,
        }
    }

    pub fn segment_count(&self) -> usize {
        self.spaces.iter().map(|space| space.segments.len()).sum()
    }
}
