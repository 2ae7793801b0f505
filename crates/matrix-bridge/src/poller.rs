//! Periodic status polling
//!
//! The matrix never announces front-panel changes, so the bridge asks for a
//! full routing dump on a fixed interval. The poll task only produces ticks;
//! the actor decides whether there is a socket to send the request on.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::actor::BridgeActorCommand;

/// Owner of the (at most one) poll task
#[derive(Debug, Default)]
pub struct Poller {
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Create a poller with nothing scheduled
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a poll task is scheduled
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Schedule the poll task unless one already exists
    ///
    /// Returns true if a new task was scheduled. Callers replacing the
    /// interval must [`cancel`](Self::cancel) first.
    pub fn start(
        &mut self,
        period: Duration,
        generation: u64,
        bridge_tx: mpsc::WeakSender<BridgeActorCommand>,
    ) -> bool {
        if self.task.is_some() {
            return false;
        }

        debug!("Polling matrix every {:?} (generation {})", period, generation);
        self.task = Some(tokio::spawn(run_poll_task(period, generation, bridge_tx)));
        true
    }

    /// Cancel the poll task; safe to call when nothing is scheduled
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Polling cancelled");
        }
    }

    /// Cancel the poll task and wait for it to finish
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            debug!("Polling stopped");
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_poll_task(
    period: Duration,
    generation: u64,
    bridge_tx: mpsc::WeakSender<BridgeActorCommand>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; polling starts one period in
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(tx) = bridge_tx.upgrade() else {
            break;
        };
        if tx
            .send(BridgeActorCommand::PollTick { generation })
            .await
            .is_err()
        {
            break;
        }
    }
}
