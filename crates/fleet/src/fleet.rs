//! Listener fleet
//!
//! The directory of running listeners and the lifecycle operations that
//! mutate it. All mutation happens under one async mutex: an operation is
//! not complete until its sockets are verifiably bound or released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use logwell_config::{ListenerTuning, SyslogSourceConfig, Transport};
use logwell_pipeline::{Diagnostic, DiagnosticsSink, EventSink};
use logwell_sources::{
    AdmissionPolicy, ListenerHandle, ListenerMetricsSnapshot, SyslogListener,
};

use crate::error::FleetError;
use crate::store::ConfigStore;

/// How many unexpected-exit restarts a source gets before it is given up on
const MAX_RESTARTS: u32 = 3;

/// One directory entry: the config a listener was started with and its handle
struct FleetEntry {
    config: SyslogSourceConfig,
    handle: ListenerHandle,
    /// Bumped on every (re)start; a stale watcher never touches a newer entry
    generation: u64,
    /// Cancelled when the entry is removed, releasing its watcher task
    watcher_cancel: CancellationToken,
    /// Unexpected-exit restarts consumed so far
    restarts: u32,
}

/// Status of one running listener
#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub id: String,
    pub slug: String,
    pub port: u16,
    pub transport: Transport,
    pub metrics: ListenerMetricsSnapshot,
}

/// Keeps running listeners in sync with source configuration
///
/// Constructed behind an `Arc` so crash watchers can call back into it.
pub struct ListenerFleet {
    tuning: ListenerTuning,
    sink: Arc<dyn EventSink>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    directory: Mutex<HashMap<String, FleetEntry>>,
    next_generation: AtomicU64,
}

enum UpdateAction {
    Start,
    Restart,
    SwapRuntime,
    Untouched,
}

impl ListenerFleet {
    /// Create an empty fleet
    pub fn new(
        tuning: ListenerTuning,
        sink: Arc<dyn EventSink>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            tuning,
            sink,
            diagnostics,
            directory: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        })
    }

    /// Start one listener per active source in the store
    ///
    /// Failures are isolated per source: a port conflict on one entry is
    /// reported and the remaining sources still start. Returns how many
    /// listeners are running.
    pub async fn start_all(self: &Arc<Self>, store: &dyn ConfigStore) -> Result<usize, FleetError> {
        let configs = store
            .list_active_sources()
            .await
            .map_err(FleetError::Store)?;

        let mut started = 0;
        for config in configs {
            let id = config.id.clone();
            match self.source_created(config).await {
                Ok(()) => started += 1,
                Err(e) => {
                    tracing::error!(
                        source_id = %id,
                        error = %e,
                        "failed to start listener, continuing with remaining sources"
                    );
                }
            }
        }

        tracing::info!(listeners = started, "fleet started");
        Ok(started)
    }

    /// A source was created: start its listener
    ///
    /// A bind failure propagates to the caller so the creation transaction
    /// can be reported as failed rather than recording a source with no
    /// listener behind it.
    pub async fn source_created(
        self: &Arc<Self>,
        config: SyslogSourceConfig,
    ) -> Result<(), FleetError> {
        let mut directory = self.directory.lock().await;

        if directory.contains_key(&config.id) {
            return Err(FleetError::AlreadyRunning {
                id: config.id.clone(),
            });
        }
        if !config.is_active() {
            tracing::debug!(source_id = %config.id, "created source is revoked, no listener");
            return Ok(());
        }

        self.start_entry(&mut directory, config, 0)
    }

    /// A source was edited: restart, swap runtime state, or leave untouched
    ///
    /// Only a port or transport change costs a restart (stop old sockets,
    /// then bind new ones). Slug and host-policy changes apply to the
    /// running listener in place. Everything else is a no-op.
    pub async fn source_updated(
        self: &Arc<Self>,
        config: SyslogSourceConfig,
    ) -> Result<(), FleetError> {
        let mut directory = self.directory.lock().await;

        if !config.is_active() {
            Self::remove_entry(&mut directory, &config.id).await;
            return Ok(());
        }

        let action = match directory.get(&config.id) {
            None => UpdateAction::Start,
            Some(entry)
                if entry.config.port != config.port
                    || entry.config.transport != config.transport =>
            {
                UpdateAction::Restart
            }
            Some(entry)
                if entry.config.slug != config.slug
                    || entry.config.allowed_hosts != config.allowed_hosts
                    || entry.config.auto_register_hosts != config.auto_register_hosts =>
            {
                UpdateAction::SwapRuntime
            }
            Some(_) => UpdateAction::Untouched,
        };

        match action {
            UpdateAction::Start => self.start_entry(&mut directory, config, 0),
            UpdateAction::Restart => {
                if let Some(old) = Self::take_entry(&mut directory, &config.id) {
                    tracing::info!(
                        source_id = %config.id,
                        old_port = old.handle.port(),
                        new_port = config.port,
                        "socket configuration changed, restarting listener"
                    );
                    old.handle.stop().await;
                }
                self.start_entry(&mut directory, config, 0)
            }
            UpdateAction::SwapRuntime => {
                if let Some(entry) = directory.get_mut(&config.id) {
                    entry.handle.update_runtime(
                        &config.slug,
                        AdmissionPolicy::new(
                            config.allowed_hosts.iter().cloned(),
                            config.auto_register_hosts,
                        ),
                    );
                    entry.config = config;
                }
                Ok(())
            }
            UpdateAction::Untouched => Ok(()),
        }
    }

    /// A source was revoked: stop its listener and release the port
    pub async fn source_revoked(&self, id: &str) {
        let mut directory = self.directory.lock().await;
        Self::remove_entry(&mut directory, id).await;
    }

    /// A source was deleted: same lifecycle consequence as a revocation
    pub async fn source_deleted(&self, id: &str) {
        self.source_revoked(id).await;
    }

    /// Bring the fleet in line with the store's current active list
    ///
    /// Stops listeners whose source disappeared, starts missing ones, and
    /// applies edits - each source isolated from the others' failures.
    pub async fn reconcile(self: &Arc<Self>, store: &dyn ConfigStore) -> Result<(), FleetError> {
        let configs = store
            .list_active_sources()
            .await
            .map_err(FleetError::Store)?;

        let keep: HashSet<&str> = configs.iter().map(|c| c.id.as_str()).collect();
        let stale: Vec<String> = {
            let directory = self.directory.lock().await;
            directory
                .keys()
                .filter(|id| !keep.contains(id.as_str()))
                .cloned()
                .collect()
        };
        for id in stale {
            tracing::info!(source_id = %id, "source no longer configured, stopping listener");
            self.source_revoked(&id).await;
        }

        for config in configs {
            let id = config.id.clone();
            if let Err(e) = self.source_updated(config).await {
                tracing::error!(
                    source_id = %id,
                    error = %e,
                    "failed to apply source configuration"
                );
            }
        }

        Ok(())
    }

    /// Stop every listener
    pub async fn shutdown(&self) {
        let mut directory = self.directory.lock().await;
        let entries: Vec<FleetEntry> = directory.drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            entry.watcher_cancel.cancel();
            entry.handle.stop().await;
        }
        tracing::info!("all listeners stopped");
    }

    /// Whether a listener is running for `id`
    pub async fn is_running(&self, id: &str) -> bool {
        self.directory.lock().await.contains_key(id)
    }

    /// Number of running listeners
    pub async fn running_count(&self) -> usize {
        self.directory.lock().await.len()
    }

    /// Per-source status snapshot, sorted by id
    pub async fn status(&self) -> Vec<SourceStatus> {
        let directory = self.directory.lock().await;
        let mut statuses: Vec<SourceStatus> = directory
            .values()
            .map(|entry| SourceStatus {
                id: entry.config.id.clone(),
                slug: entry.handle.slug().to_string(),
                port: entry.handle.port(),
                transport: entry.handle.transport(),
                metrics: entry.handle.metrics(),
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    // =========================================================================
    // Internals (directory lock held by the caller)
    // =========================================================================

    fn start_entry(
        self: &Arc<Self>,
        directory: &mut HashMap<String, FleetEntry>,
        config: SyslogSourceConfig,
        restarts: u32,
    ) -> Result<(), FleetError> {
        let handle = SyslogListener::start(
            &config,
            &self.tuning,
            Arc::clone(&self.sink),
            Arc::clone(&self.diagnostics),
        )
        .map_err(|e| {
            self.diagnostics
                .report(Diagnostic::bind_failure(&config.id, e.to_string()));
            FleetError::listener(&config.id, e)
        })?;

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let watcher_cancel = CancellationToken::new();
        self.spawn_watcher(&config.id, generation, handle.failed(), watcher_cancel.clone());

        directory.insert(
            config.id.clone(),
            FleetEntry {
                config,
                handle,
                generation,
                watcher_cancel,
                restarts,
            },
        );
        Ok(())
    }

    async fn remove_entry(directory: &mut HashMap<String, FleetEntry>, id: &str) {
        if let Some(entry) = Self::take_entry(directory, id) {
            entry.handle.stop().await;
        }
    }

    fn take_entry(directory: &mut HashMap<String, FleetEntry>, id: &str) -> Option<FleetEntry> {
        let entry = directory.remove(id)?;
        entry.watcher_cancel.cancel();
        Some(entry)
    }

    /// Watch for a listener's receive tasks dying underneath it
    ///
    /// There is no supervisor runtime to lean on: the handle's `failed`
    /// token is the completion signal, and the fleet decides whether to
    /// restart. The generation check keeps a stale watcher from touching
    /// an entry that a concurrent update or revoke already replaced.
    fn spawn_watcher(
        self: &Arc<Self>,
        id: &str,
        generation: u64,
        failed: CancellationToken,
        watcher_cancel: CancellationToken,
    ) {
        let fleet = Arc::downgrade(self);
        let id = id.to_string();

        tokio::spawn(async move {
            tokio::select! {
                _ = watcher_cancel.cancelled() => {}
                _ = failed.cancelled() => {
                    if let Some(fleet) = fleet.upgrade() {
                        fleet.handle_listener_failure(&id, generation).await;
                    }
                }
            }
        });
    }

    async fn handle_listener_failure(self: &Arc<Self>, id: &str, generation: u64) {
        let mut directory = self.directory.lock().await;

        let current = directory.get(id).is_some_and(|e| e.generation == generation);
        if !current {
            return;
        }
        let Some(entry) = Self::take_entry(&mut directory, id) else {
            return;
        };

        self.diagnostics.report(Diagnostic::listener_exit(
            id,
            "receive task exited unexpectedly",
        ));

        // Reap whatever is left of the old listener before rebinding
        entry.handle.stop().await;

        if entry.restarts >= MAX_RESTARTS {
            tracing::error!(
                source_id = %id,
                restarts = entry.restarts,
                "listener keeps dying, giving up"
            );
            return;
        }

        tracing::warn!(
            source_id = %id,
            restart = entry.restarts + 1,
            "listener died unexpectedly, restarting"
        );
        if let Err(e) = self.start_entry(&mut directory, entry.config, entry.restarts + 1) {
            tracing::error!(
                source_id = %id,
                error = %e,
                "restart failed, source left without a listener"
            );
        }
    }
}

impl std::fmt::Debug for ListenerFleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerFleet").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "fleet_test.rs"]
mod fleet_test;
