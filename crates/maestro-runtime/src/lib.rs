//! Async shell around the workspace: the single-writer actor, the clock
//! scheduler and the debounced persister, plus config and logging setup.

use maestro_core::Clock;
use maestro_storage::{SnapshotStore, StorageError};
use maestro_workspace::WorkspaceStore;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::info;

pub mod actor;
pub mod config;
pub mod logging;
pub mod persist;
pub mod scheduler;

pub use actor::{spawn_actor, Session, TimelineFrame, WorkspaceHandle};
pub use config::{load_config, ConfigError, MaestroConfig};
pub use persist::{spawn_persister, PersistHandle, PersistQueue};
pub use scheduler::ClockScheduler;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("workspace actor is no longer running")]
    ActorGone,
    #[error("snapshot persister is no longer running")]
    PersisterGone,
    #[error("snapshot store lock poisoned")]
    StorePoisoned,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("task join error: {0}")]
    Join(#[from] JoinError),
}

/// A booted workspace: actor, clock scheduler and persister.
pub struct Runtime {
    handle: WorkspaceHandle,
    scheduler: ClockScheduler,
    persister: PersistHandle,
    persister_task: JoinHandle<()>,
    actor_task: JoinHandle<Session>,
}

impl Runtime {
    pub async fn boot<S>(
        config: &MaestroConfig,
        snapshots: S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RuntimeError>
    where
        S: SnapshotStore + 'static,
    {
        Self::boot_shared(config, Arc::new(Mutex::new(snapshots)), clock).await
    }

    /// Like [`Runtime::boot`] but leaves the caller a handle on the store.
    pub async fn boot_shared<S>(
        config: &MaestroConfig,
        snapshots: Arc<Mutex<S>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RuntimeError>
    where
        S: SnapshotStore + 'static,
    {
        let loaded = {
            let guard = snapshots.lock().map_err(|_| RuntimeError::StorePoisoned)?;
            guard.load()?
        };
        let store = match loaded {
            Some(snapshot) => {
                info!(
                    spaces = snapshot.spaces.len(),
                    segments = snapshot.segment_count(),
                    tabs = snapshot.tabs.len(),
                    "workspace restored"
                );
                WorkspaceStore::from_snapshot(snapshot, clock, config.history)
            }
            None => {
                info!("starting with an empty workspace");
                WorkspaceStore::with_history(clock, config.history)
            }
        };

        let (persister, persister_task) = spawn_persister(snapshots, config.debounce());
        let session = Session::new(store, config.navigation());
        let (handle, actor_task) = spawn_actor(session, Some(persister.clone()));
        let scheduler = ClockScheduler::start(handle.clone(), config.tick());
        Ok(Self {
            handle,
            scheduler,
            persister,
            persister_task,
            actor_task,
        })
    }

    pub fn handle(&self) -> WorkspaceHandle {
        self.handle.clone()
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Stops the ticker, drains the actor, flushes pending writes and hands
    /// back the final store.
    pub async fn shutdown(self) -> Result<WorkspaceStore, RuntimeError> {
        let Runtime {
            handle,
            mut scheduler,
            persister,
            persister_task,
            actor_task,
        } = self;
        scheduler.stop();
        handle.shutdown().await?;
        let session = actor_task.await?;
        persister.flush().await?;
        drop(persister);
        persister_task.await?;
        info!(revision = session.store.revision(), "workspace runtime stopped");
        Ok(session.store)
    }
}
