//! Debounced snapshot writer. Mutations mark the workspace dirty; the
//! snapshot is written once the workspace has been quiet for the window.

use maestro_core::WorkspaceSnapshot;
use maestro_storage::SnapshotStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::RuntimeError;

/// Pure debounce state. Callers pass the current instant explicitly.
#[derive(Debug)]
pub struct PersistQueue {
    window: Duration,
    pending: Option<WorkspaceSnapshot>,
    dirty_at: Option<Instant>,
}

impl PersistQueue {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            dirty_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replaces any pending snapshot and restarts the quiet window.
    pub fn mark_dirty(&mut self, snapshot: WorkspaceSnapshot, now: Instant) {
        self.pending = Some(snapshot);
        self.dirty_at = Some(now);
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.pending.as_ref()?;
        self.dirty_at.map(|at| at + self.window)
    }

    pub fn take_due(&mut self, now: Instant) -> Option<WorkspaceSnapshot> {
        match self.due_at() {
            Some(due) if now >= due => self.take_now(),
            _ => None,
        }
    }

    pub fn take_now(&mut self) -> Option<WorkspaceSnapshot> {
        self.dirty_at = None;
        self.pending.take()
    }

    /// Puts back a snapshot whose write failed so it is retried one window
    /// later. A newer pending snapshot wins.
    pub fn requeue(&mut self, snapshot: WorkspaceSnapshot, now: Instant) {
        if self.pending.is_none() {
            self.mark_dirty(snapshot, now);
        }
    }
}

enum PersistCommand {
    Dirty(WorkspaceSnapshot),
    Flush(oneshot::Sender<Result<(), RuntimeError>>),
}

#[derive(Debug, Clone)]
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistHandle {
    pub fn mark_dirty(&self, snapshot: WorkspaceSnapshot) -> bool {
        self.tx.send(PersistCommand::Dirty(snapshot)).is_ok()
    }

    /// Writes whatever is pending right away.
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PersistCommand::Flush(reply_tx))
            .map_err(|_| RuntimeError::PersisterGone)?;
        reply_rx.await.map_err(|_| RuntimeError::PersisterGone)?
    }
}

async fn write_snapshot<S>(
    store: &Arc<Mutex<S>>,
    snapshot: WorkspaceSnapshot,
) -> Result<(), RuntimeError>
where
    S: SnapshotStore + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || -> Result<(), RuntimeError> {
        let mut guard = store.lock().map_err(|_| RuntimeError::StorePoisoned)?;
        guard.save(&snapshot)?;
        Ok(())
    })
    .await?
}

/// Spawns the writer task. It exits after a final write once every handle
/// has been dropped.
pub fn spawn_persister<S>(store: Arc<Mutex<S>>, window: Duration) -> (PersistHandle, JoinHandle<()>)
where
    S: SnapshotStore + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut queue = PersistQueue::new(window);
        loop {
            let deadline = queue.due_at();
            tokio::select! {
                command = rx.recv() => match command {
                    Some(PersistCommand::Dirty(snapshot)) => {
                        queue.mark_dirty(snapshot, Instant::now());
                    }
                    Some(PersistCommand::Flush(reply)) => {
                        let result = match queue.take_now() {
                            Some(snapshot) => {
                                let result = write_snapshot(&store, snapshot.clone()).await;
                                if let Err(err) = &result {
                                    warn!(error = %err, "snapshot flush failed");
                                    queue.requeue(snapshot, Instant::now());
                                }
                                result
                            }
                            None => Ok(()),
                        };
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Some(snapshot) = queue.take_now() {
                            if let Err(err) = write_snapshot(&store, snapshot).await {
                                warn!(error = %err, "final snapshot write failed");
                            }
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(snapshot) = queue.take_due(Instant::now()) {
                        match write_snapshot(&store, snapshot.clone()).await {
                            Ok(()) => debug!(saved_at = %snapshot.saved_at, "snapshot saved"),
                            Err(err) => {
                                warn!(error = %err, "snapshot save failed, retrying next window");
                                queue.requeue(snapshot, Instant::now());
                            }
                        }
                    }
                }
            }
        }
    });
    (PersistHandle { tx }, task)
}
