use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::actor::WorkspaceHandle;

/// Feeds periodic ticks to the actor so live segments keep growing.
pub struct ClockScheduler {
    task: Option<JoinHandle<()>>,
}

impl ClockScheduler {
    pub fn start(handle: WorkspaceHandle, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if handle.tick().await.is_err() {
                    debug!("workspace actor gone; clock scheduler exiting");
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ClockScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
