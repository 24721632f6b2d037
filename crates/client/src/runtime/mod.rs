//! Hosting runtime for the offline asset cache.
//!
//! Owns the lifecycle state machine, the event dispatch tables and the
//! background sync registry. Two worker slots are kept: the active worker
//! that answers requests, and a pending one that is installing or waiting.
//! A pending worker that fails leaves the active one in control. Requests
//! are only intercepted while an active worker controls clients; otherwise
//! they go straight to the network.
//!
//! The generation that last activated is recorded in the store database and
//! restored on the next `register`, so a restart or a failed upgrade keeps
//! serving the previous shell.

pub mod dispatch;
pub mod lifecycle;
pub mod sync;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use schemars::JsonSchema;
use serde::Serialize;
use shellcache_core::{ActiveGeneration, AppConfig, CacheVersion, Error, ResourceRequest};

use self::dispatch::{Dispatcher, Event, EventOutcome};
use self::lifecycle::WorkerState;
use self::sync::{LogSyncTask, SyncRegistry, SyncReport, SyncSignal};
use crate::worker::{ActivateReport, FetchDecision, InstallReport, OfflineAssetCache, Served, ServedFrom};

/// Activation policy.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Activate as soon as install succeeds instead of waiting.
    pub skip_waiting: bool,
    /// Take control of clients right after activation instead of at the next navigation.
    pub claim_clients: bool,
    /// Tag the default sync task is registered under.
    pub sync_tag: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self { skip_waiting: true, claim_clients: true, sync_tag: "background-sync".into() }
    }
}

impl RuntimeOptions {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            skip_waiting: config.skip_waiting,
            claim_clients: config.claim_clients,
            sync_tag: config.sync_tag.clone(),
        }
    }
}

/// What `register` did.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Registration {
    pub install: InstallReport,
    /// Present when the worker activated without waiting.
    pub activate: Option<ActivateReport>,
    pub state: WorkerState,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RuntimeStatus {
    /// State of the newest worker: the pending one if any, else the active one.
    pub state: WorkerState,
    /// Configured cache version.
    pub version: String,
    /// Version currently answering requests.
    pub active_version: Option<String>,
    /// State of a worker installing or waiting behind the active one.
    pub pending_state: Option<WorkerState>,
    pub shell_store: String,
    pub runtime_store: String,
    pub retained_stores: Vec<String>,
    pub controlling: bool,
    pub skip_waiting: bool,
    pub claim_clients: bool,
    pub sync_tags: Vec<String>,
}

/// One worker version with its own dispatch table.
#[derive(Clone)]
struct Registered {
    worker: Arc<OfflineAssetCache>,
    dispatcher: Arc<Dispatcher>,
    state: WorkerState,
}

impl Registered {
    fn new(worker: Arc<OfflineAssetCache>, sync: Arc<SyncRegistry>, state: WorkerState) -> Self {
        let dispatcher = Arc::new(Dispatcher::standard(worker.clone(), sync));
        Self { worker, dispatcher, state }
    }

    fn version(&self) -> &CacheVersion {
        &self.worker.config().version
    }
}

#[derive(Default)]
struct Slots {
    /// Active, or redundant once superseded.
    active: Option<Registered>,
    /// Installing, installed (waiting), activating, or redundant after a failure.
    pending: Option<Registered>,
}

pub struct Runtime {
    worker: Arc<OfflineAssetCache>,
    sync: Arc<SyncRegistry>,
    options: RuntimeOptions,
    slots: RwLock<Slots>,
    lifecycle: tokio::sync::Mutex<()>,
    controlling: AtomicBool,
    next_signal: AtomicU64,
}

impl Runtime {
    /// `worker` is the configured version; every install starts from it.
    pub fn new(worker: OfflineAssetCache, options: RuntimeOptions) -> Self {
        let sync = Arc::new(SyncRegistry::new());
        sync.register(options.sync_tag.clone(), Arc::new(LogSyncTask));

        Self {
            worker: Arc::new(worker),
            sync,
            options,
            slots: RwLock::new(Slots::default()),
            lifecycle: tokio::sync::Mutex::new(()),
            controlling: AtomicBool::new(false),
            next_signal: AtomicU64::new(0),
        }
    }

    /// The configured worker version.
    pub fn worker(&self) -> &Arc<OfflineAssetCache> {
        &self.worker
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    /// Registry for additional sync tasks.
    pub fn sync_registry(&self) -> &Arc<SyncRegistry> {
        &self.sync
    }

    /// State of the newest worker: the pending one if any, else the active one.
    pub fn state(&self) -> WorkerState {
        let slots = self.slots();
        slots
            .pending
            .as_ref()
            .or(slots.active.as_ref())
            .map_or(WorkerState::Uninstalled, |w| w.state)
    }

    /// Version answering intercepted requests, if any.
    pub fn active_version(&self) -> Option<String> {
        self.active().map(|active| active.version().to_string())
    }

    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Restore the last activated generation, install the configured
    /// version, then activate it immediately when `skip_waiting` is set.
    pub async fn register(&self) -> Result<Registration, Error> {
        self.restore().await?;
        let install = self.install().await?;
        let activate = if self.options.skip_waiting { Some(self.activate().await?) } else { None };
        Ok(Registration { install, activate, state: self.state() })
    }

    /// Put the recorded generation back in control. No-op when a worker is
    /// already active or nothing was recorded.
    async fn restore(&self) -> Result<(), Error> {
        let _guard = self.lifecycle.lock().await;
        if self.slots().active.is_some() {
            return Ok(());
        }

        let scope = self.worker.config().origin.as_str();
        let Some(generation) = self.worker.db().active_generation(scope).await? else {
            return Ok(());
        };

        let mut config = self.worker.config().clone();
        config.version = CacheVersion::new(generation.version.clone())?;
        config.layout.shell = generation.shell_store.clone();
        config.layout.runtime = generation.runtime_store.clone();
        let worker = OfflineAssetCache::new(self.worker.db().clone(), self.worker.fetcher().clone(), config);

        tracing::info!(
            version = %generation.version,
            store = %generation.shell_store,
            activated_at = %generation.activated_at,
            "restored active worker"
        );
        self.slots_mut().active = Some(Registered::new(Arc::new(worker), self.sync.clone(), WorkerState::Active));
        self.controlling.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Install the configured version as a new pending worker.
    ///
    /// Allowed when nothing is pending or the last attempt went redundant.
    /// A failed install makes only the pending worker redundant; the active
    /// worker keeps serving.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;
        let candidate = {
            let mut slots = self.slots_mut();
            if let Some(pending) = slots.pending.as_ref().filter(|p| !p.state.is_terminal()) {
                return Err(Error::InvalidState(format!(
                    "worker {} is already {}",
                    pending.version(),
                    pending.state
                )));
            }
            let candidate = Registered::new(self.worker.clone(), self.sync.clone(), WorkerState::Installing);
            tracing::info!(
                version = %candidate.version(),
                from = %WorkerState::Uninstalled,
                to = %WorkerState::Installing,
                "worker state changed"
            );
            slots.pending = Some(candidate.clone());
            candidate
        };

        match candidate.dispatcher.dispatch(Event::Install).await {
            Ok(EventOutcome::Installed(report)) => {
                self.advance_pending(WorkerState::Installed)?;
                Ok(report)
            }
            Ok(other) => {
                self.advance_pending(WorkerState::Redundant)?;
                Err(unexpected("install", &other))
            }
            Err(e) => {
                tracing::error!(
                    version = %candidate.version(),
                    active = ?self.active_version(),
                    error = %e,
                    "install failed, worker is redundant"
                );
                self.advance_pending(WorkerState::Redundant)?;
                Err(e)
            }
        }
    }

    /// Activate the waiting worker, replacing the active one.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.lifecycle.lock().await;
        let candidate = self
            .slots()
            .pending
            .clone()
            .ok_or_else(|| Error::InvalidState("no installed worker is waiting".into()))?;
        self.advance_pending(WorkerState::Activating)?;

        match candidate.dispatcher.dispatch(Event::Activate).await {
            Ok(EventOutcome::Activated(report)) => {
                self.advance_pending(WorkerState::Active)?;
                self.promote();
                self.record_generation(&candidate).await;
                self.controlling.store(self.options.claim_clients, Ordering::SeqCst);
                if self.options.claim_clients {
                    tracing::info!(version = %candidate.version(), "clients claimed");
                }
                Ok(report)
            }
            Ok(other) => {
                self.advance_pending(WorkerState::Redundant)?;
                Err(unexpected("activate", &other))
            }
            Err(e) => {
                tracing::error!(version = %candidate.version(), error = %e, "activation failed, worker is redundant");
                self.advance_pending(WorkerState::Redundant)?;
                Err(e)
            }
        }
    }

    /// Answer a request the way a controlled client would see it.
    pub async fn fetch(&self, request: ResourceRequest) -> Result<Served, Error> {
        let Some(active) = self.active() else {
            tracing::debug!(state = %self.state(), url = %request.url, "no active worker");
            return self.passthrough(&request).await;
        };

        if !self.is_controlling() {
            if !request.is_navigation() {
                return self.passthrough(&request).await;
            }
            self.controlling.store(true, Ordering::SeqCst);
            tracing::info!(
                url = %request.url,
                version = %active.version(),
                "navigation brought clients under control"
            );
        }

        match active.dispatcher.dispatch(Event::Fetch(request.clone())).await? {
            EventOutcome::Fetched(FetchDecision::Respond(served)) => Ok(served),
            EventOutcome::Fetched(FetchDecision::Bypass(_)) => self.passthrough(&request).await,
            other => Err(unexpected("fetch", &other)),
        }
    }

    /// Deliver a fresh runtime-numbered sync signal for `tag`.
    pub async fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        let id = self.next_signal.fetch_add(1, Ordering::SeqCst) + 1;
        self.deliver_sync(SyncSignal::runtime(id, tag)).await
    }

    /// Deliver a signal to the active worker. Repeated ids run nothing.
    pub async fn deliver_sync(&self, signal: SyncSignal) -> Result<SyncReport, Error> {
        let Some(active) = self.active() else {
            return Err(Error::InvalidState(format!("cannot sync while {}", self.state())));
        };
        match active.dispatcher.dispatch(Event::Sync(signal)).await? {
            EventOutcome::Synced(report) => Ok(report),
            other => Err(unexpected("sync", &other)),
        }
    }

    /// Retire the active worker and forget its generation.
    pub async fn supersede(&self) -> Result<WorkerState, Error> {
        let _guard = self.lifecycle.lock().await;
        let version = {
            let mut slots = self.slots_mut();
            let active = slots
                .active
                .as_mut()
                .ok_or_else(|| Error::InvalidState("no active worker to supersede".into()))?;
            active.state = active.state.advance(WorkerState::Redundant)?;
            active.version().clone()
        };
        self.controlling.store(false, Ordering::SeqCst);
        self.worker.db().clear_active_generation(self.worker.config().origin.as_str()).await?;
        tracing::info!(version = %version, "active worker superseded");
        Ok(WorkerState::Redundant)
    }

    pub fn status(&self) -> RuntimeStatus {
        let config = self.worker.config();
        RuntimeStatus {
            state: self.state(),
            version: config.version.to_string(),
            active_version: self.active_version(),
            pending_state: self.slots().pending.as_ref().map(|p| p.state),
            shell_store: config.layout.shell.clone(),
            runtime_store: config.layout.runtime.clone(),
            retained_stores: config.layout.retained_names(),
            controlling: self.is_controlling(),
            skip_waiting: self.options.skip_waiting,
            claim_clients: self.options.claim_clients,
            sync_tags: self.sync.tags(),
        }
    }

    async fn passthrough(&self, request: &ResourceRequest) -> Result<Served, Error> {
        let response = self.worker.fetcher().fetch(request).await?;
        Ok(Served::new(response, ServedFrom::Bypass))
    }

    fn slots(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slots_mut(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The active worker, if one is in the active state.
    fn active(&self) -> Option<Registered> {
        self.slots()
            .active
            .clone()
            .filter(|active| active.state.can_intercept_fetch())
    }

    fn advance_pending(&self, next: WorkerState) -> Result<(), Error> {
        let mut slots = self.slots_mut();
        let pending = slots
            .pending
            .as_mut()
            .ok_or_else(|| Error::InvalidState(format!("no pending worker to move to {next}")))?;
        let prev = pending.state;
        pending.state = prev.advance(next)?;
        tracing::info!(version = %pending.version(), from = %prev, to = %next, "worker state changed");
        Ok(())
    }

    /// Move the pending worker into the active slot.
    fn promote(&self) {
        let mut slots = self.slots_mut();
        let promoted = slots.pending.take();
        let previous = std::mem::replace(&mut slots.active, promoted)
            .filter(|previous| previous.state.can_transition_to(WorkerState::Redundant));
        if let Some(previous) = previous {
            tracing::info!(
                version = %previous.version(),
                from = %previous.state,
                to = %WorkerState::Redundant,
                "worker state changed"
            );
        }
    }

    /// Failures are logged: the worker is already active.
    async fn record_generation(&self, active: &Registered) {
        let layout = active.worker.layout();
        let generation = ActiveGeneration::new(
            active.worker.config().origin.as_str(),
            active.version().as_str(),
            layout.shell.as_str(),
            layout.runtime.as_str(),
        );
        if let Err(e) = self.worker.db().set_active_generation(&generation).await {
            tracing::warn!(version = %generation.version, error = %e, "active generation not recorded");
        }
    }
}

fn unexpected(event: &str, outcome: &EventOutcome) -> Error {
    Error::InvalidState(format!("{event} handler returned {outcome:?}"))
}
