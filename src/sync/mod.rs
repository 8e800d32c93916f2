// SPDX-License-Identifier: MIT
//! The synchronizer — reconciles the snapshot fetch, locally submitted
//! mutations, and live push events into one authoritative task store.
//!
//! Lifecycle: [`Synchronizer::start`] opens the live channel and kicks off
//! the snapshot fetch concurrently (neither waits for the other). Every
//! decoded `task_created` event and every acknowledged create mutation is
//! upserted into the store for as long as the synchronizer lives.
//! [`Synchronizer::shutdown`] closes the channel, cancels any pending
//! reconnect backoff, and discards results of requests still in flight.
//!
//! Presentation code holds a `Synchronizer` instance explicitly — there is
//! no global store. It reads [`Synchronizer::tasks`], watches
//! [`Synchronizer::phase`] and [`Synchronizer::connectivity`], and redraws
//! on notifications from [`Synchronizer::subscribe`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::auth::AccessToken;
use crate::channel::{ChannelConfig, ChannelState, LiveChannel, LiveEvent};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::tasks::{Task, TaskDraft, TaskStatus, TaskStore};

const CHANGE_BUFFER: usize = 64;

/// Startup phase of the initial snapshot, for presentation code to render a
/// loading / ready / error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Loading,
    Ready,
    /// Terminal: the snapshot could not be loaded. No retry happens at this
    /// layer — recovery is a fresh [`Synchronizer::start`].
    Failed(String),
}

/// Store change notifications delivered to observers. Observers re-read the
/// snapshot on notification; deltas are never replayed, so a lagged observer
/// misses nothing but intermediate redraws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// The snapshot seeded the store.
    Seeded,
    /// A live event added or replaced a task.
    EventApplied,
    /// A locally submitted create was acknowledged and applied. Presentation
    /// code closes its create surface on this.
    CreateApplied,
}

/// Explicitly owned orchestrator of the task board's state.
pub struct Synchronizer {
    store: Arc<RwLock<TaskStore>>,
    api: Arc<ApiClient>,
    changes: broadcast::Sender<StoreChange>,
    phase: watch::Receiver<SyncPhase>,
    connectivity: watch::Receiver<ChannelState>,
    shutdown: Arc<watch::Sender<bool>>,
    disposed: Arc<AtomicBool>,
}

impl Synchronizer {
    /// Construct and start. Must run inside a tokio runtime.
    ///
    /// The caller is expected to have consulted its
    /// [`crate::auth::Authorizer`] first; the token passed here is the
    /// capability that authorization produced.
    pub fn start(config: &ClientConfig, token: Option<AccessToken>) -> Result<Self, ClientError> {
        let api = Arc::new(ApiClient::new(config, token)?);
        let store = Arc::new(RwLock::new(TaskStore::new()));
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        let (phase_tx, phase) = watch::channel(SyncPhase::Loading);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown = Arc::new(shutdown_tx);
        let disposed = Arc::new(AtomicBool::new(false));

        let channel = LiveChannel::open(ChannelConfig {
            ws_base_url: config.ws_base_url(),
            max_attempts: config.reconnect.max_attempts,
            backoff: config.reconnect.backoff_schedule(),
        });
        let connectivity = channel.state();

        // Event pump — the single consumer of the channel's event stream.
        tokio::spawn(pump_events(
            channel,
            config.reconnect.max_attempts,
            store.clone(),
            changes.clone(),
            shutdown_rx,
            disposed.clone(),
        ));

        // Snapshot — concurrent with the channel's first connect attempt.
        tokio::spawn(load_snapshot(
            api.clone(),
            store.clone(),
            changes.clone(),
            phase_tx,
            shutdown.clone(),
            disposed.clone(),
        ));

        Ok(Self {
            store,
            api,
            changes,
            phase,
            connectivity,
            shutdown,
            disposed,
        })
    }

    /// Read-only snapshot of the current task collection, insertion-ordered.
    pub async fn tasks(&self) -> Vec<Task> {
        self.store.read().await.tasks().to_vec()
    }

    /// Tasks partitioned into the three status columns.
    pub async fn board(&self) -> Vec<(TaskStatus, Vec<Task>)> {
        let store = self.store.read().await;
        store
            .by_status()
            .into_iter()
            .map(|(status, tasks)| (status, tasks.into_iter().cloned().collect()))
            .collect()
    }

    /// Subscribe to store change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    /// Watch the snapshot phase.
    pub fn phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.clone()
    }

    /// Watch the live channel state. [`ChannelState::Lost`] means degraded
    /// connectivity, not invalid data — loaded tasks stay usable.
    pub fn connectivity(&self) -> watch::Receiver<ChannelState> {
        self.connectivity.clone()
    }

    /// Submit a create mutation and fold the acknowledged task into the
    /// store under its server-assigned id. The live channel will echo the
    /// same creation; the store's idempotent upsert collapses the two.
    ///
    /// On error the store is untouched and the caller decides what to do
    /// with its create surface.
    pub async fn submit_create(&self, draft: TaskDraft) -> Result<Task, ClientError> {
        let task = self.api.create_task(&draft).await?;
        if self.disposed.load(Ordering::SeqCst) {
            debug!(id = %task.id, "sync: dropping create result — synchronizer disposed");
            return Ok(task);
        }
        self.store.write().await.upsert(task.clone());
        let _ = self.changes.send(StoreChange::CreateApplied);
        Ok(task)
    }

    /// Tear down: close the live channel, cancel any pending reconnect, stop
    /// applying in-flight results. Idempotent.
    pub fn shutdown(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
        info!("sync: shut down");
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(true);
    }
}

/// Apply decoded live events to the store, in wire order, until the channel
/// ends or the synchronizer shuts down.
async fn pump_events(
    mut channel: LiveChannel,
    max_attempts: u32,
    store: Arc<RwLock<TaskStore>>,
    changes: broadcast::Sender<StoreChange>,
    mut shutdown: watch::Receiver<bool>,
    disposed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            event = channel.recv() => match event {
                Some(LiveEvent::TaskCreated(task)) => {
                    if disposed.load(Ordering::SeqCst) {
                        break;
                    }
                    debug!(id = %task.id, "sync: applying task_created");
                    store.write().await.upsert(task);
                    let _ = changes.send(StoreChange::EventApplied);
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }

    if !disposed.load(Ordering::SeqCst) && *channel.state().borrow() == ChannelState::Lost {
        let err = ClientError::ChannelLost {
            attempts: max_attempts,
        };
        warn!(err = %err, "sync: live updates degraded — loaded tasks stay usable");
    } else {
        debug!("sync: live channel ended");
    }
    channel.close();
}

/// Run the one-shot snapshot fetch and seed the store.
async fn load_snapshot(
    api: Arc<ApiClient>,
    store: Arc<RwLock<TaskStore>>,
    changes: broadcast::Sender<StoreChange>,
    phase: watch::Sender<SyncPhase>,
    shutdown: Arc<watch::Sender<bool>>,
    disposed: Arc<AtomicBool>,
) {
    match api.fetch_tasks().await {
        Ok(tasks) => {
            if disposed.load(Ordering::SeqCst) {
                debug!("sync: dropping snapshot — synchronizer disposed");
                return;
            }
            info!(count = tasks.len(), "sync: snapshot loaded");
            store.write().await.seed(tasks);
            let _ = phase.send(SyncPhase::Ready);
            let _ = changes.send(StoreChange::Seeded);
        }
        Err(e) => {
            warn!(err = %e, "sync: snapshot failed — stopping");
            let _ = phase.send(SyncPhase::Failed(e.to_string()));
            // No base snapshot means live events are meaningless. Tear the
            // channel down rather than hold a socket for a dead session.
            disposed.store(true, Ordering::SeqCst);
            let _ = shutdown.send(true);
        }
    }
}
