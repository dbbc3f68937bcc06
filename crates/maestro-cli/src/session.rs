use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use maestro_core::geometry::day_anchor;
use maestro_core::{Clock, ZoomLevel};
use maestro_runtime::MaestroConfig;
use maestro_storage::{export_json, import_json, SnapshotStore, SqliteSnapshotStore};
use maestro_timeline::{
    visible_ticks, NavigationConfig, NavigationController, RulerTick, TimelineNode,
    TimelineViewModel, Viewport,
};
use maestro_workspace::WorkspaceStore;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::{Commands, SegmentCommands, SpaceCommands, TabCommands};

/// One CLI invocation (or one shell) against the persisted workspace.
pub(crate) struct CliSession {
    store: WorkspaceStore,
    snapshots: Box<dyn SnapshotStore>,
    navigation: NavigationConfig,
    saved_revision: u64,
}

#[derive(Serialize)]
struct TimelineOutput<'a> {
    zoom_level: ZoomLevel,
    reference: DateTime<Utc>,
    now_x: f64,
    viewport: Viewport,
    ruler: Vec<RulerTick>,
    nodes: &'a [TimelineNode],
}

pub(crate) fn open_database(path: &Path) -> Result<SqliteSnapshotStore> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    SqliteSnapshotStore::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn resolve_prefix<'a>(
    kind: &str,
    key: &str,
    ids: impl Iterator<Item = &'a str> + Clone,
) -> Result<String> {
    if let Some(id) = ids.clone().find(|id| *id == key) {
        return Ok(id.to_string());
    }
    let matches: Vec<&str> = ids.filter(|id| id.starts_with(key)).collect();
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => bail!("no {kind} matches {key:?}"),
        _ => bail!("{kind} id {key:?} is ambiguous"),
    }
}

impl CliSession {
    pub(crate) fn open(config: &MaestroConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let snapshots = open_database(&config.db_path())?;
        Self::with_snapshots(config, Box::new(snapshots), clock)
    }

    pub(crate) fn with_snapshots(
        config: &MaestroConfig,
        snapshots: Box<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = match snapshots.load().context("Failed to load workspace")? {
            Some(snapshot) => WorkspaceStore::from_snapshot(snapshot, clock, config.history),
            None => WorkspaceStore::with_history(clock, config.history),
        };
        Ok(Self {
            saved_revision: store.revision(),
            store,
            snapshots,
            navigation: config.navigation(),
        })
    }

    pub(crate) fn save_if_changed(&mut self) -> Result<()> {
        if self.store.revision() == self.saved_revision {
            return Ok(());
        }
        self.snapshots
            .save(&self.store.snapshot())
            .context("Failed to save workspace")?;
        self.saved_revision = self.store.revision();
        debug!(revision = self.saved_revision, "workspace saved");
        Ok(())
    }

    fn resolve_space(&self, key: &str) -> Result<String> {
        let spaces = self.store.spaces();
        if let Some(space) = spaces.iter().find(|space| space.id == key) {
            return Ok(space.id.clone());
        }
        let named: Vec<&str> = spaces
            .iter()
            .filter(|space| space.name == key)
            .map(|space| space.id.as_str())
            .collect();
        match named.as_slice() {
            [id] => Ok(id.to_string()),
            [] => resolve_prefix("space", key, spaces.iter().map(|space| space.id.as_str())),
            _ => bail!("space name {key:?} is ambiguous; use its id"),
        }
    }

    fn resolve_segment(&self, key: &str) -> Result<String> {
        let ids = self
            .store
            .spaces()
            .iter()
            .flat_map(|space| space.segments.iter())
            .map(|segment| segment.id.as_str());
        resolve_prefix("segment", key, ids)
    }

    fn resolve_tab(&self, key: &str) -> Result<String> {
        resolve_prefix("tab", key, self.store.state().tabs().iter().map(|tab| tab.id.as_str()))
    }

    pub(crate) fn execute(&mut self, command: Commands, out: &mut dyn Write) -> Result<()> {
        match command {
            Commands::Space { action } => self.space(action, out),
            Commands::Segment { action } => self.segment(action, out),
            Commands::Tab { action } => self.tab(action, out),
            Commands::Timeline { zoom, offset } => self.timeline(zoom, offset, out),
            Commands::Export { out: path } => self.export(path, out),
            Commands::Import { file } => self.import(&file, out),
            Commands::Undo => {
                let message = if self.store.undo() {
                    "undone"
                } else {
                    "nothing to undo"
                };
                writeln!(out, "{message}")?;
                Ok(())
            }
            Commands::Redo => {
                let message = if self.store.redo() {
                    "redone"
                } else {
                    "nothing to redo"
                };
                writeln!(out, "{message}")?;
                Ok(())
            }
            Commands::Shell | Commands::Watch { .. } => {
                bail!("this command cannot run inside a session")
            }
        }
    }

    fn space(&mut self, action: SpaceCommands, out: &mut dyn Write) -> Result<()> {
        match action {
            SpaceCommands::Add { name } => {
                let space = self.store.add_space(&name);
                writeln!(out, "{}", space.id)?;
            }
            SpaceCommands::List => {
                let active = self.store.state().active_space_id();
                for space in self.store.spaces() {
                    let marker = if active == Some(space.id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    writeln!(
                        out,
                        "{marker}{}\t{}\t{}\t{} segments",
                        space.position,
                        space.id,
                        space.name,
                        space.segments.len()
                    )?;
                }
            }
            SpaceCommands::Rm { space } => {
                let id = self.resolve_space(&space)?;
                if let Some(removed) = self.store.remove_space(&id) {
                    writeln!(out, "removed {}", removed.name)?;
                }
            }
            SpaceCommands::Move { space, position } => {
                let id = self.resolve_space(&space)?;
                self.store.reorder_space(&id, position);
                let position = self.store.space(&id).map(|space| space.position);
                if let Some(position) = position {
                    writeln!(out, "{id} now at {position}")?;
                }
            }
        }
        Ok(())
    }

    fn segment(&mut self, action: SegmentCommands, out: &mut dyn Write) -> Result<()> {
        match action {
            SegmentCommands::Start {
                space,
                title,
                kind,
                at,
            } => {
                let space_id = self.resolve_space(&space)?;
                let segment = match at {
                    Some(start) => {
                        self.store
                            .create_segment_at(&space_id, &title, kind, None, start)
                    }
                    None => self.store.create_segment(&space_id, &title, kind, None),
                }
                .with_context(|| format!("Failed to start segment in {space}"))?;
                writeln!(out, "{}\t{}", segment.id, segment.status)?;
            }
            SegmentCommands::End { segment } => {
                let id = self.resolve_segment(&segment)?;
                let changed = self.store.end_segment(&id);
                self.report_transition(&id, changed, out)?;
            }
            SegmentCommands::Pause { segment } => {
                let id = self.resolve_segment(&segment)?;
                let changed = self.store.pause_segment(&id);
                self.report_transition(&id, changed, out)?;
            }
            SegmentCommands::Resume { segment } => {
                let id = self.resolve_segment(&segment)?;
                let changed = self.store.resume_segment(&id);
                self.report_transition(&id, changed, out)?;
            }
            SegmentCommands::List { space, all } => {
                let filter = space.map(|key| self.resolve_space(&key)).transpose()?;
                for space in self.store.spaces() {
                    if filter.as_deref().is_some_and(|id| id != space.id) {
                        continue;
                    }
                    for segment in &space.segments {
                        if !all && segment.status.is_terminal() {
                            continue;
                        }
                        let end = segment
                            .end_time
                            .map(|end| end.to_rfc3339())
                            .unwrap_or_else(|| "-".to_string());
                        writeln!(
                            out,
                            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                            segment.id,
                            space.name,
                            segment.status,
                            segment.segment_type,
                            segment.start_time.to_rfc3339(),
                            end,
                            segment.title
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    fn report_transition(&self, id: &str, changed: bool, out: &mut dyn Write) -> Result<()> {
        let status = self
            .store
            .segment(id)
            .map(|segment| segment.status.to_string())
            .unwrap_or_default();
        if changed {
            writeln!(out, "{id}\t{status}")?;
        } else {
            writeln!(out, "{id}\tunchanged ({status})")?;
        }
        Ok(())
    }

    fn tab(&mut self, action: TabCommands, out: &mut dyn Write) -> Result<()> {
        match action {
            TabCommands::Open {
                space,
                title,
                kind,
                segment,
            } => {
                let space_id = self.resolve_space(&space)?;
                let segment_id = segment.map(|key| self.resolve_segment(&key)).transpose()?;
                let tab = self
                    .store
                    .open_tab(&space_id, kind, &title, segment_id.as_deref())
                    .with_context(|| format!("Failed to open tab in {space}"))?;
                writeln!(out, "{}", tab.id)?;
            }
            TabCommands::Close { tab } => {
                let id = self.resolve_tab(&tab)?;
                if let Some(closed) = self.store.close_tab(&id) {
                    writeln!(out, "closed {}", closed.title)?;
                }
            }
            TabCommands::Fav { tab } => {
                let id = self.resolve_tab(&tab)?;
                if let Some(favorite) = self.store.toggle_favorite(&id) {
                    let zone = if favorite { "favorites" } else { "tabs" };
                    writeln!(out, "{id}\t{zone}")?;
                }
            }
            TabCommands::List { space } => {
                let space_id = self.resolve_space(&space)?;
                let zones = self.store.zones(&space_id).unwrap_or_default();
                let active = self.store.state().active_tab_id();
                let rows = zones
                    .favorites
                    .iter()
                    .map(|id| ("favorites", id))
                    .chain(zones.tabs.iter().map(|id| ("tabs", id)));
                for (zone, id) in rows {
                    let Some(tab) = self.store.tab(id) else {
                        continue;
                    };
                    let marker = if active == Some(id.as_str()) { "*" } else { " " };
                    writeln!(
                        out,
                        "{marker}{zone}\t{}\t{}\t{}\t{}",
                        tab.id,
                        tab.tab_type.as_str(),
                        tab.status.as_str(),
                        tab.title
                    )?;
                }
            }
        }
        Ok(())
    }

    fn timeline(
        &mut self,
        zoom: Option<ZoomLevel>,
        offset: Option<f64>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let now = self.store.now();
        let reference = day_anchor(now, &Local);
        let mut navigation =
            NavigationController::from_state(self.navigation, self.store.state().timeline());
        if let Some(zoom) = zoom {
            let lanes = self.store.spaces().len();
            navigation.change_zoom_and_recenter(zoom, now, reference, lanes);
        }
        if let Some(offset) = offset {
            let viewport = navigation.viewport();
            navigation.on_pan(Viewport {
                x: -offset * viewport.scale,
                ..viewport
            });
        }
        navigation.persist_view(&mut self.store);

        let mut view = TimelineViewModel::new();
        let nodes = view.nodes(&self.store, now, reference, navigation.label_offset());
        let output = TimelineOutput {
            zoom_level: navigation.zoom(),
            reference,
            now_x: maestro_timeline::now_marker_x(now, navigation.zoom(), reference),
            viewport: navigation.viewport(),
            ruler: visible_ticks(
                reference,
                navigation.zoom(),
                navigation.viewport(),
                navigation.container_size(),
                &Local,
            ),
            nodes,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        Ok(())
    }

    fn export(&self, path: Option<PathBuf>, out: &mut dyn Write) -> Result<()> {
        let json = export_json(&self.store.snapshot()).context("Failed to export workspace")?;
        match path {
            Some(path) => {
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                writeln!(out, "exported to {}", path.display())?;
            }
            None => writeln!(out, "{json}")?,
        }
        Ok(())
    }

    fn import(&mut self, path: &Path, out: &mut dyn Write) -> Result<()> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let snapshot =
            import_json(&json).with_context(|| format!("Failed to parse {}", path.display()))?;
        let (spaces, segments, tabs) = (
            snapshot.spaces.len(),
            snapshot.segment_count(),
            snapshot.tabs.len(),
        );
        self.store.replace(snapshot);
        writeln!(
            out,
            "imported {spaces} spaces, {segments} segments, {tabs} tabs"
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &WorkspaceStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use maestro_core::{ManualClock, SegmentStatus, SegmentType, TabType};
    use maestro_storage::MemorySnapshotStore;

    fn ts(offset_ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + offset_ms)
            .single()
            .expect("valid timestamp")
    }

    fn session() -> (CliSession, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(ts(0)));
        let session = CliSession::with_snapshots(
            &MaestroConfig::default(),
            Box::new(MemorySnapshotStore::new()),
            clock.clone(),
        )
        .expect("session");
        (session, clock)
    }

    fn run(session: &mut CliSession, command: Commands) -> String {
        let mut out = Vec::new();
        session.execute(command, &mut out).expect("execute");
        String::from_utf8(out).expect("utf-8")
    }

    fn add_space(session: &mut CliSession, name: &str) -> String {
        run(
            session,
            Commands::Space {
                action: SpaceCommands::Add {
                    name: name.to_string(),
                },
            },
        )
        .trim()
        .to_string()
    }

    #[test]
    fn segments_resolve_by_space_name_and_id_prefix() {
        let (mut session, clock) = session();
        add_space(&mut session, "Work");
        let started = run(
            &mut session,
            Commands::Segment {
                action: SegmentCommands::Start {
                    space: "Work".to_string(),
                    title: "Write code".to_string(),
                    kind: SegmentType::Terminal,
                    at: None,
                },
            },
        );
        let id = started.split('\t').next().expect("id").to_string();
        assert!(started.trim_end().ends_with("active"));

        clock.advance(Duration::minutes(3));
        let ended = run(
            &mut session,
            Commands::Segment {
                action: SegmentCommands::End {
                    segment: id[..8].to_string(),
                },
            },
        );
        assert_eq!(ended.trim_end(), format!("{id}\tcompleted"));

        let again = run(
            &mut session,
            Commands::Segment {
                action: SegmentCommands::End {
                    segment: id.clone(),
                },
            },
        );
        assert!(again.contains("unchanged"));

        let active_only = run(
            &mut session,
            Commands::Segment {
                action: SegmentCommands::List {
                    space: None,
                    all: false,
                },
            },
        );
        assert!(active_only.is_empty());
        let everything = run(
            &mut session,
            Commands::Segment {
                action: SegmentCommands::List {
                    space: Some("Work".to_string()),
                    all: true,
                },
            },
        );
        assert_eq!(everything.lines().count(), 1);
        assert_eq!(
            session.store().segment(&id).map(|segment| segment.status),
            Some(SegmentStatus::Completed)
        );
    }

    #[test]
    fn unknown_targets_are_errors() {
        let (mut session, _clock) = session();
        let mut out = Vec::new();
        let err = session
            .execute(
                Commands::Space {
                    action: SpaceCommands::Rm {
                        space: "nowhere".to_string(),
                    },
                },
                &mut out,
            )
            .expect_err("missing space");
        assert!(err.to_string().contains("no space matches"));
    }

    #[test]
    fn tabs_list_by_zone_after_favoriting() {
        let (mut session, _clock) = session();
        add_space(&mut session, "Work");
        let mut ids = Vec::new();
        for title in ["shell", "docs"] {
            let out = run(
                &mut session,
                Commands::Tab {
                    action: TabCommands::Open {
                        space: "Work".to_string(),
                        title: title.to_string(),
                        kind: TabType::Terminal,
                        segment: None,
                    },
                },
            );
            ids.push(out.trim().to_string());
        }
        let fav = run(
            &mut session,
            Commands::Tab {
                action: TabCommands::Fav { tab: ids[1].clone() },
            },
        );
        assert_eq!(fav.trim(), format!("{}\tfavorites", ids[1]));

        let listing = run(
            &mut session,
            Commands::Tab {
                action: TabCommands::List {
                    space: "Work".to_string(),
                },
            },
        );
        let zones: Vec<&str> = listing
            .lines()
            .map(|line| line.trim_start_matches(['*', ' ']).split('\t').next().unwrap_or(""))
            .collect();
        assert_eq!(zones, vec!["favorites", "tabs"]);
        assert!(listing.lines().next().unwrap_or("").contains("docs"));
    }

    #[test]
    fn timeline_prints_nodes_and_persists_zoom() {
        let (mut session, _clock) = session();
        let space_id = add_space(&mut session, "Work");
        let out = run(
            &mut session,
            Commands::Timeline {
                zoom: Some(ZoomLevel::Week),
                offset: Some(-250.0),
            },
        );
        let json: serde_json::Value = serde_json::from_str(&out).expect("json");
        assert_eq!(json["zoom_level"], "week");
        assert_eq!(json["viewport"]["x"], 250.0);
        assert_eq!(json["viewport"]["y"], 360.0);
        assert_eq!(json["nodes"][0]["id"], format!("space-label-{space_id}"));
        assert_eq!(json["nodes"][0]["x"], -230.0);
        assert_eq!(session.store().zoom_level(), ZoomLevel::Week);
    }

    #[test]
    fn export_import_and_undo() {
        let (mut session, _clock) = session();
        add_space(&mut session, "Work");
        let file = tempfile::NamedTempFile::new().expect("temp file");
        run(
            &mut session,
            Commands::Export {
                out: Some(file.path().to_path_buf()),
            },
        );

        let (mut fresh, _clock) = super::tests::session();
        let out = run(
            &mut fresh,
            Commands::Import {
                file: file.path().to_path_buf(),
            },
        );
        assert_eq!(out.trim(), "imported 1 spaces, 0 segments, 0 tabs");
        assert_eq!(fresh.store().spaces().len(), 1);

        assert_eq!(run(&mut fresh, Commands::Undo).trim(), "undone");
        assert!(fresh.store().spaces().is_empty());
        assert_eq!(run(&mut fresh, Commands::Redo).trim(), "redone");
        assert_eq!(run(&mut fresh, Commands::Redo).trim(), "nothing to redo");
    }

    #[test]
    fn saves_only_when_the_revision_moved() {
        let (mut session, _clock) = session();
        session.save_if_changed().expect("save");
        assert!(session.snapshots.load().expect("load").is_none());

        add_space(&mut session, "Work");
        session.save_if_changed().expect("save");
        let saved = session.snapshots.load().expect("load").expect("snapshot");
        assert_eq!(saved.spaces.len(), 1);
    }
}
