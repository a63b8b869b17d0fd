//! # Background Sync Tasks
//!
//! Three long-running tasks keep the queue moving without caller involvement:
//!
//! - **Network watcher**: applies every reachability change to the connection
//!   state; when reachability comes back it waits out the debounce, probes the
//!   backend and drains the queue if the probe succeeds.
//! - **Liveness probe**: probes the backend on a fixed period and drains when
//!   that flips the state to connected.
//! - **Auto-sync**: drains a non-empty queue on a fixed period while connected.
//!
//! Drains after a reconnect ignore retry backoff; periodic drains honour it.
//!
//! Tasks hold a `Weak` reference and stop once the engine is gone.

use super::{NetworkInfo, SyncEngine};
use crate::client::offline::DrainMode;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

pub fn spawn_all(engine: &Arc<SyncEngine>) -> Vec<JoinHandle<()>> {
    // subscribed before spawning: changes published right after `start` reach the watcher
    let changes = engine.network.subscribe();
    vec![
        tokio::spawn(watch_network(Arc::downgrade(engine), changes)),
        tokio::spawn(probe_loop(Arc::downgrade(engine), engine.config.probe_interval)),
        tokio::spawn(auto_sync_loop(Arc::downgrade(engine), engine.config.auto_sync_interval)),
    ]
}

async fn watch_network(engine: Weak<SyncEngine>, mut changes: watch::Receiver<NetworkInfo>) {
    while changes.changed().await.is_ok() {
        let info = changes.borrow_and_update().clone();
        let Some(engine) = engine.upgrade() else {
            break;
        };

        if !engine.connection.set_network(info).await {
            continue;
        }

        tracing::info!("network reachable again, probing backend");
        if !settle(&engine, &mut changes).await {
            continue;
        }
        if engine.connection.probe_backend().await {
            drain_if_pending(&engine, "reconnect", DrainMode::Reconnect).await;
        }
    }
    tracing::debug!("network watcher stopped");
}

/// Wait out the reconnect debounce, applying changes that arrive meanwhile
///
/// Each change restarts the debounce. False if reachability was lost again
/// or the observer went away.
async fn settle(engine: &SyncEngine, changes: &mut watch::Receiver<NetworkInfo>) -> bool {
    loop {
        tokio::select! {
            _ = sleep(engine.config.reconnect_debounce) => return true,
            changed = changes.changed() => {
                if changed.is_err() {
                    return false;
                }
                let info = changes.borrow_and_update().clone();
                engine.connection.set_network(info).await;
                if !engine.connection.is_internet_reachable().await {
                    tracing::debug!("network lost during reconnect debounce");
                    return false;
                }
            }
        }
    }
}

async fn probe_loop(engine: Weak<SyncEngine>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };

        let was_connected = engine.connection.is_connected().await;
        let connected = engine.connection.probe_backend().await;
        if connected && !was_connected {
            tracing::info!("backend reachable again");
            drain_if_pending(&engine, "probe", DrainMode::Reconnect).await;
        }
    }
    tracing::debug!("liveness probe stopped");
}

async fn auto_sync_loop(engine: Weak<SyncEngine>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };

        if engine.connection.is_connected().await {
            drain_if_pending(&engine, "auto-sync", DrainMode::Scheduled).await;
        }
    }
    tracing::debug!("auto-sync stopped");
}

async fn drain_if_pending(engine: &SyncEngine, trigger: &'static str, mode: DrainMode) {
    if engine.queue.is_empty().await {
        return;
    }

    let report = engine.run_drain(mode).await;
    if report.attempted > 0 {
        tracing::info!(
            trigger,
            attempted = report.attempted,
            replayed = report.replayed.len(),
            exhausted = report.exhausted.len(),
            remaining = report.remaining,
            "background drain finished"
        );
    }
}
