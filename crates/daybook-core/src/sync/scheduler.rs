//! Background loop that decides when cycles run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::engine::{BatchSyncResult, SyncEngine};
use crate::db::SyncStore;
use crate::network::NetworkState;
use crate::remote::{LivenessProbe, RemoteStore};

const TRIGGER_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Tick,
    Reconnect,
    Manual,
}

impl Trigger {
    const fn label(self) -> &'static str {
        match self {
            Self::Tick => "periodic",
            Self::Reconnect => "reconnect",
            Self::Manual => "manual",
        }
    }
}

pub struct SyncScheduler;

impl SyncScheduler {
    /// Start the scheduling loop for `user_id`.
    ///
    /// Periodic and reconnect cycles only run while auto-sync is enabled;
    /// manual triggers always run. Every trigger is gated on connectivity.
    pub fn spawn<S, R, P>(
        engine: Arc<SyncEngine<S, R, P>>,
        user_id: impl Into<String>,
        interval: Duration,
    ) -> SchedulerHandle
    where
        S: SyncStore + 'static,
        R: RemoteStore + 'static,
        P: LivenessProbe + 'static,
    {
        let user_id = user_id.into();
        let (trigger_tx, mut trigger_rx) = mpsc::channel(TRIGGER_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let monitor = Arc::clone(engine.monitor());
        let reconnect_tx = trigger_tx.clone();
        let listener = monitor.on_change(move |state| {
            if state == NetworkState::Online {
                // A full channel already holds a pending trigger
                let _ = reconnect_tx.try_send(Trigger::Reconnect);
            }
        });

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Sync scheduler started for {user_id} (every {interval:?})");

            loop {
                let trigger = tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => Trigger::Tick,
                    Some(trigger) = trigger_rx.recv() => trigger,
                };

                if trigger != Trigger::Manual && !engine.auto_sync() {
                    tracing::debug!("Auto sync disabled, ignoring {} trigger", trigger.label());
                    continue;
                }
                if !engine.monitor().is_online() {
                    tracing::debug!("Offline, ignoring {} trigger", trigger.label());
                    continue;
                }

                let result = engine.run_cycle(&user_id).await;
                log_result(trigger, &result);
            }

            tracing::info!("Sync scheduler stopped for {user_id}");
        });

        let deregister = Box::new(move || {
            monitor.remove_listener(listener);
        });

        SchedulerHandle {
            trigger: trigger_tx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            deregister: Some(deregister),
        }
    }
}

fn log_result(trigger: Trigger, result: &BatchSyncResult) {
    if let Some(reason) = result.skipped {
        tracing::debug!("{} sync skipped: {reason:?}", trigger.label());
    } else if result.errors.is_empty() {
        tracing::info!(
            "{} sync: {} uploaded, {} downloaded",
            trigger.label(),
            result.uploaded,
            result.downloaded
        );
    } else {
        tracing::warn!(
            "{} sync: {} uploaded, {} downloaded, {} error(s)",
            trigger.label(),
            result.uploaded,
            result.downloaded,
            result.errors.len()
        );
    }
}

/// Controls a running scheduler; dropping it stops the loop
pub struct SchedulerHandle {
    trigger: mpsc::Sender<Trigger>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    deregister: Option<Box<dyn FnOnce() + Send>>,
}

impl SchedulerHandle {
    /// Ask for a cycle now; returns `false` if a trigger is already queued
    pub fn trigger_now(&self) -> bool {
        self.trigger.try_send(Trigger::Manual).is_ok()
    }

    /// Stop the loop after any cycle in progress finishes
    pub async fn shutdown(mut self) {
        if let Some(deregister) = self.deregister.take() {
            deregister();
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!("Sync scheduler task ended abnormally: {error}");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(deregister) = self.deregister.take() {
            deregister();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
