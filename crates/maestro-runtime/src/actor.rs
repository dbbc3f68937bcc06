//! Single-writer actor. Every mutation of the workspace runs on one task;
//! callers reach it through a cloneable [`WorkspaceHandle`].

use chrono::{DateTime, Local, Utc};
use maestro_core::geometry::day_anchor;
use maestro_core::{Segment, ZoomLevel};
use maestro_timeline::{
    create_segment_from_click, now_marker_x, KeyInput, NavigationConfig, NavigationController,
    NavigationUpdate, TimelineNode, TimelineViewModel, ViewportSize,
};
use maestro_workspace::{Point, WorkspaceStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::persist::PersistHandle;
use crate::RuntimeError;

const COMMAND_BUFFER: usize = 256;

/// Latest render-ready view, republished after every tick and mutation.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineFrame {
    pub revision: u64,
    pub ticks: u64,
    pub now: DateTime<Utc>,
    pub reference: DateTime<Utc>,
    pub zoom_level: ZoomLevel,
    pub now_x: f64,
    pub nodes: Arc<Vec<TimelineNode>>,
}

impl TimelineFrame {
    pub fn live_nodes(&self) -> impl Iterator<Item = &TimelineNode> {
        self.nodes.iter().filter(|node| node.is_live())
    }
}

/// Everything the actor owns.
pub struct Session {
    pub store: WorkspaceStore,
    pub navigation: NavigationController,
    view: TimelineViewModel,
    ticks: u64,
}

impl Session {
    pub fn new(store: WorkspaceStore, navigation: NavigationConfig) -> Self {
        let navigation = NavigationController::from_state(navigation, store.state().timeline());
        Self {
            store,
            navigation,
            view: TimelineViewModel::new(),
            ticks: 0,
        }
    }

    /// Start of the local day containing `now`; timeline x = 0 sits there.
    pub fn reference(&self) -> DateTime<Utc> {
        day_anchor(self.store.now(), &Local)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Applies a navigation request and records the camera in the workspace.
    pub fn apply_navigation(&mut self, update: NavigationUpdate) {
        self.navigation.apply(update);
        self.navigation.persist_view(&mut self.store);
    }

    pub fn set_container_size(&mut self, size: Option<ViewportSize>) {
        self.navigation.set_container_size(size);
    }

    pub fn center_on_now(&mut self) -> NavigationUpdate {
        let now = self.store.now();
        let reference = self.reference();
        let lanes = self.store.spaces().len();
        let update = self.navigation.center_on_now(now, reference, lanes);
        self.navigation.persist_view(&mut self.store);
        update
    }

    pub fn center_on_space(&mut self, space_id: &str) -> Option<NavigationUpdate> {
        let position = self.store.space(space_id)?.position;
        let now = self.store.now();
        let reference = self.reference();
        let update = self.navigation.center_on_lane(position, now, reference);
        self.navigation.persist_view(&mut self.store);
        Some(update)
    }

    pub fn change_zoom(&mut self, zoom: ZoomLevel) -> NavigationUpdate {
        let now = self.store.now();
        let reference = self.reference();
        let lanes = self.store.spaces().len();
        let update = self
            .navigation
            .change_zoom_and_recenter(zoom, now, reference, lanes);
        self.navigation.persist_view(&mut self.store);
        update
    }

    pub fn handle_key(&mut self, key: &KeyInput) -> Option<NavigationUpdate> {
        let now = self.store.now();
        let reference = self.reference();
        let lanes = self.store.spaces().len();
        let update = self.navigation.handle_key(key, now, reference, lanes)?;
        self.navigation.persist_view(&mut self.store);
        Some(update)
    }

    pub fn click_pane(&mut self, screen: Point) -> Option<Segment> {
        let reference = self.reference();
        create_segment_from_click(&mut self.store, &self.navigation, screen, reference)
    }

    /// Starts scheduled segments whose start time has passed. Returns how
    /// many were triggered.
    fn tick(&mut self) -> usize {
        self.ticks += 1;
        self.store.start_due_scheduled().len()
    }

    pub fn frame(&mut self) -> TimelineFrame {
        let now = self.store.now();
        let reference = self.reference();
        let label_offset = self.navigation.label_offset();
        let zoom_level = self.store.zoom_level();
        let nodes = self
            .view
            .nodes(&self.store, now, reference, label_offset)
            .to_vec();
        TimelineFrame {
            revision: self.store.revision(),
            ticks: self.ticks,
            now,
            reference,
            zoom_level,
            now_x: now_marker_x(now, zoom_level, reference),
            nodes: Arc::new(nodes),
        }
    }
}

type Job = Box<dyn FnOnce(&mut Session) + Send>;

enum Command {
    Run(Job),
    Tick,
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct WorkspaceHandle {
    tx: mpsc::Sender<Command>,
    frames: watch::Receiver<TimelineFrame>,
}

impl WorkspaceHandle {
    /// Runs `job` on the actor and returns its result.
    pub async fn with_session<R, F>(&self, job: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Session) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |session| {
            let _ = reply_tx.send(job(session));
        });
        self.tx
            .send(Command::Run(job))
            .await
            .map_err(|_| RuntimeError::ActorGone)?;
        reply_rx.await.map_err(|_| RuntimeError::ActorGone)
    }

    pub async fn with_store<R, F>(&self, job: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut WorkspaceStore) -> R + Send + 'static,
    {
        self.with_session(move |session| job(&mut session.store))
            .await
    }

    pub async fn tick(&self) -> Result<(), RuntimeError> {
        self.tx
            .send(Command::Tick)
            .await
            .map_err(|_| RuntimeError::ActorGone)
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(reply_tx))
            .await
            .map_err(|_| RuntimeError::ActorGone)?;
        reply_rx.await.map_err(|_| RuntimeError::ActorGone)
    }

    pub fn frames(&self) -> watch::Receiver<TimelineFrame> {
        self.frames.clone()
    }

    pub fn latest_frame(&self) -> TimelineFrame {
        self.frames.borrow().clone()
    }
}

/// Spawns the actor. The join handle yields the session back after
/// shutdown.
pub fn spawn_actor(
    mut session: Session,
    persister: Option<PersistHandle>,
) -> (WorkspaceHandle, JoinHandle<Session>) {
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let (frames_tx, frames_rx) = watch::channel(session.frame());
    let task = tokio::spawn(async move {
        let mut persisted_revision = session.store.revision();
        while let Some(command) = rx.recv().await {
            match command {
                Command::Run(job) => job(&mut session),
                Command::Tick => {
                    let triggered = session.tick();
                    if triggered > 0 {
                        info!(triggered, "scheduled segments started");
                    }
                }
                Command::Shutdown(reply) => {
                    let _ = reply.send(());
                    break;
                }
            }

            let revision = session.store.revision();
            if revision != persisted_revision {
                persisted_revision = revision;
                if let Some(persister) = &persister {
                    if !persister.mark_dirty(session.store.snapshot()) {
                        debug!("persister stopped; change not queued");
                    }
                }
            }
            frames_tx.send_replace(session.frame());
        }
        session
    });
    (
        WorkspaceHandle {
            tx,
            frames: frames_rx,
        },
        task,
    )
}
