//! Event dispatch table.
//!
//! The runtime delivers lifecycle, fetch and sync events through a fixed
//! table built for each worker version. Handlers are trait objects so a host
//! can swap in its own behavior for any event kind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use shellcache_core::{Error, ResourceRequest};

use super::sync::{SyncRegistry, SyncReport, SyncSignal};
use crate::worker::{ActivateReport, FetchDecision, InstallReport, OfflineAssetCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Sync,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(ResourceRequest),
    Sync(SyncSignal),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Install => EventKind::Install,
            Event::Activate => EventKind::Activate,
            Event::Fetch(_) => EventKind::Fetch,
            Event::Sync(_) => EventKind::Sync,
        }
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(FetchDecision),
    Synced(SyncReport),
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<EventOutcome, Error>;
}

/// Routes install, activate and fetch events to the offline asset cache.
pub struct WorkerHandler {
    worker: Arc<OfflineAssetCache>,
}

impl WorkerHandler {
    pub fn new(worker: Arc<OfflineAssetCache>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl Handler for WorkerHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Install => self.worker.install().await.map(EventOutcome::Installed),
            Event::Activate => self.worker.activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => self.worker.decide(&request).await.map(EventOutcome::Fetched),
            Event::Sync(_) => Err(Error::InvalidState("worker handler does not take sync events".into())),
        }
    }
}

/// Routes sync events to the registry.
pub struct SyncHandler {
    registry: Arc<SyncRegistry>,
}

impl SyncHandler {
    pub fn new(registry: Arc<SyncRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Handler for SyncHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, Error> {
        match event {
            Event::Sync(signal) => Ok(EventOutcome::Synced(self.registry.dispatch(&signal).await)),
            other => Err(Error::InvalidState(format!(
                "sync handler does not take {} events",
                other.kind().as_str()
            ))),
        }
    }
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<EventKind, Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard table: worker events to the cache, sync events to the registry.
    pub fn standard(worker: Arc<OfflineAssetCache>, registry: Arc<SyncRegistry>) -> Self {
        let worker: Arc<dyn Handler> = Arc::new(WorkerHandler::new(worker));
        let mut dispatcher = Self::new();
        dispatcher.register(EventKind::Install, worker.clone());
        dispatcher.register(EventKind::Activate, worker.clone());
        dispatcher.register(EventKind::Fetch, worker);
        dispatcher.register(EventKind::Sync, Arc::new(SyncHandler::new(registry)));
        dispatcher
    }

    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn Handler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, Error> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| Error::InvalidState(format!("no handler registered for {} events", kind.as_str())))?;
        handler.handle(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::sync::{LogSyncTask, SyncOutcome};
    use crate::testing::{StubFetcher, app_config, test_worker, url};

    async fn standard() -> Dispatcher {
        let worker = Arc::new(test_worker(StubFetcher::with_app_shell(), app_config()).await);
        let registry = Arc::new(SyncRegistry::new());
        registry.register("background-sync", Arc::new(LogSyncTask));
        Dispatcher::standard(worker, registry)
    }

    #[tokio::test]
    async fn test_standard_table_covers_every_kind() {
        let dispatcher = standard().await;
        for kind in [EventKind::Install, EventKind::Activate, EventKind::Fetch, EventKind::Sync] {
            assert!(dispatcher.has(kind), "missing {}", kind.as_str());
        }
    }

    #[tokio::test]
    async fn test_routes_each_event() {
        let dispatcher = standard().await;

        let installed = dispatcher.dispatch(Event::Install).await.unwrap();
        assert!(matches!(installed, EventOutcome::Installed(ref r) if r.store == "app-shell-v1"));

        let activated = dispatcher.dispatch(Event::Activate).await.unwrap();
        assert!(matches!(activated, EventOutcome::Activated(ref r) if r.kept == vec!["app-shell-v1"]));

        let fetched = dispatcher
            .dispatch(Event::Fetch(ResourceRequest::navigate(url("/"))))
            .await
            .unwrap();
        assert!(matches!(fetched, EventOutcome::Fetched(FetchDecision::Respond(_))));

        let synced = dispatcher
            .dispatch(Event::Sync(SyncSignal::host(1, "background-sync")))
            .await
            .unwrap();
        assert!(matches!(synced, EventOutcome::Synced(ref r) if r.outcome == SyncOutcome::Completed));
    }

    #[tokio::test]
    async fn test_missing_handler_is_invalid_state() {
        let dispatcher = Dispatcher::new();
        let result = dispatcher.dispatch(Event::Install).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_sync_handler_rejects_other_events() {
        let handler = SyncHandler::new(Arc::new(SyncRegistry::new()));
        let result = handler.handle(Event::Activate).await;
        assert!(matches!(result, Err(Error::InvalidState(ref msg)) if msg.contains("activate")));
    }
}
