//! Event-driven controller
//!
//! Owns redelivery for the engine:
//! - one reconciliation per key at a time; events for an in-flight key are
//!   coalesced and the key is run again once the current attempt finishes
//! - bounded concurrency across keys
//! - every attempt runs under a deadline; expiry is retryable
//! - `LocalConflict` is requeued immediately, other retryable failures with
//!   exponential backoff; a key has at most one delayed retry pending
//! - periodic resync of every known key

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch, Mutex, Semaphore};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use authsync_core::{AuthSyncError, ResourceEvent, ResourceKind, ResourceStore, Result};

use crate::orchestrator::{Reconcile, ReconcileOutcome};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Reconciliations allowed to run at once.
    pub concurrency: usize,

    /// How often every known key is reconciled again.
    pub resync_interval: Duration,

    /// Deadline for one reconciliation.
    pub reconcile_timeout: Duration,

    /// Delay before the first retry.
    pub backoff_base: Duration,

    /// Upper bound for the retry delay.
    pub backoff_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            resync_interval: Duration::from_secs(300),
            reconcile_timeout: Duration::from_secs(60),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(300),
        }
    }
}

impl ControllerConfig {
    /// `base * 2^(attempt - 1)`, capped at `backoff_max`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

#[derive(Debug, Default)]
struct WorkState {
    in_flight: HashSet<ResourceEvent>,
    /// Keys that changed while in flight
    dirty: HashSet<ResourceEvent>,
    /// Consecutive failures per key
    attempts: HashMap<ResourceEvent, u32>,
    /// Keys with a delayed retry still sleeping
    retry_pending: HashSet<ResourceEvent>,
}

/// Drives reconcilers from store events.
pub struct Controller<St> {
    reconcilers: HashMap<ResourceKind, Arc<dyn Reconcile>>,
    store: Arc<St>,
    config: ControllerConfig,
    state: Mutex<WorkState>,
    semaphore: Arc<Semaphore>,
    synced: watch::Sender<bool>,
}

impl<St: ResourceStore + 'static> Controller<St> {
    pub fn new(
        reconcilers: Vec<Arc<dyn Reconcile>>,
        store: Arc<St>,
        config: ControllerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        let (synced, _) = watch::channel(false);
        Self {
            reconcilers: reconcilers.into_iter().map(|r| (r.kind(), r)).collect(),
            store,
            config,
            state: Mutex::new(WorkState::default()),
            semaphore,
            synced,
        }
    }

    /// Flips to `true` once the startup resync has queued every stored key.
    pub fn synced(&self) -> watch::Receiver<bool> {
        self.synced.subscribe()
    }

    /// Run until `shutdown` flips to `true` or the event stream closes.
    ///
    /// The first resync fires immediately, so every stored key is
    /// reconciled once at startup.
    #[instrument(skip_all)]
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ResourceEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            concurrency = self.config.concurrency,
            resync_secs = self.config.resync_interval.as_secs(),
            "Starting controller"
        );

        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<ResourceEvent>();
        let mut resync = interval(self.config.resync_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Controller shutdown requested");
                        break;
                    }
                }
                received = events.recv() => match received {
                    Ok(event) => self.clone().schedule(event, requeue_tx.clone()).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged, resyncing");
                        self.resync(&requeue_tx).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event stream closed");
                        break;
                    }
                },
                Some(event) = requeue_rx.recv() => {
                    self.clone().schedule(event, requeue_tx.clone()).await;
                }
                _ = resync.tick() => {
                    self.resync(&requeue_tx).await;
                }
            }
        }

        info!("Waiting for in-flight reconciliations to complete...");
        let permits = u32::try_from(self.config.concurrency.max(1)).unwrap_or(u32::MAX);
        let _ = self.semaphore.acquire_many(permits).await;
        info!("Controller stopped");
    }

    async fn resync(&self, requeue: &mpsc::UnboundedSender<ResourceEvent>) {
        let mut queued = 0usize;
        for kind in self.reconcilers.keys().copied() {
            match self.store.list_keys(kind).await {
                Ok(keys) => {
                    for key in keys {
                        // Receiver only closes once `run` has returned.
                        let _ = requeue.send(ResourceEvent::new(kind, key));
                        queued += 1;
                    }
                }
                Err(e) => error!(%kind, error = %e, "Failed to list keys for resync"),
            }
        }
        debug!(queued, "Queued resync");
        self.synced.send_replace(true);
    }

    async fn schedule(
        self: Arc<Self>,
        event: ResourceEvent,
        requeue: mpsc::UnboundedSender<ResourceEvent>,
    ) {
        let Some(reconciler) = self.reconcilers.get(&event.kind).cloned() else {
            debug!(kind = %event.kind, "No reconciler registered for kind");
            return;
        };

        {
            let mut state = self.state.lock().await;
            if state.in_flight.contains(&event) {
                state.dirty.insert(event);
                return;
            }
            state.in_flight.insert(event.clone());
        }

        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };

            let result = timeout(self.config.reconcile_timeout, reconciler.reconcile(&event.key))
                .await
                .unwrap_or_else(|_| {
                    Err(AuthSyncError::remote_unavailable(format!(
                        "reconciliation of {} {} timed out",
                        event.kind, event.key
                    )))
                });

            self.complete(event, result, requeue).await;
        });
    }

    async fn complete(
        self: Arc<Self>,
        event: ResourceEvent,
        result: Result<ReconcileOutcome>,
        requeue: mpsc::UnboundedSender<ResourceEvent>,
    ) {
        let mut state = self.state.lock().await;
        state.in_flight.remove(&event);
        let rerun = state.dirty.remove(&event);

        match result {
            Ok(outcome) => {
                state.attempts.remove(&event);
                debug!(kind = %event.kind, key = %event.key, ?outcome, "Reconciled");
                if rerun {
                    let _ = requeue.send(event);
                }
            }
            Err(e) if e.requeue_immediately() => {
                debug!(kind = %event.kind, key = %event.key, error = %e, "Conflict, requeueing");
                let _ = requeue.send(event);
            }
            Err(e) if e.is_retryable() => {
                let attempt = state.attempts.entry(event.clone()).or_insert(0);
                *attempt += 1;
                let delay = self.config.backoff_delay(*attempt);
                warn!(
                    kind = %event.kind,
                    key = %event.key,
                    attempt = *attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Reconciliation failed, retrying"
                );
                // The pending retry also covers changes seen while in flight.
                if !state.retry_pending.insert(event.clone()) {
                    debug!(kind = %event.kind, key = %event.key, "Retry already pending");
                    return;
                }
                let controller = Arc::clone(&self);
                tokio::spawn(async move {
                    sleep(delay).await;
                    controller.state.lock().await.retry_pending.remove(&event);
                    let _ = requeue.send(event);
                });
            }
            Err(e) => {
                state.attempts.remove(&event);
                error!(
                    kind = %event.kind,
                    key = %event.key,
                    error = %e,
                    "Reconciliation failed permanently, waiting for a spec change"
                );
                if rerun {
                    let _ = requeue.send(event);
                }
            }
        }
    }

    /// Consecutive failures recorded for an event's key
    pub async fn attempts(&self, event: &ResourceEvent) -> u32 {
        self.state
            .lock()
            .await
            .attempts
            .get(event)
            .copied()
            .unwrap_or(0)
    }
}
