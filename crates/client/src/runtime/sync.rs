//! Background sync extension point.
//!
//! When connectivity returns the host delivers a sync signal carrying a tag.
//! The registry maps tags to named tasks and runs each signal at most once;
//! a task's failure is reported on its own and never touches the fetch path.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shellcache_core::Error;

/// Who numbered a signal. Host ids and runtime-assigned ids never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Host,
    Runtime,
}

/// A sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSignal {
    pub id: u64,
    pub source: SignalSource,
    pub tag: String,
}

impl SyncSignal {
    /// Signal numbered by the host.
    pub fn host(id: u64, tag: impl Into<String>) -> Self {
        Self { id, source: SignalSource::Host, tag: tag.into() }
    }

    pub(crate) fn runtime(id: u64, tag: impl Into<String>) -> Self {
        Self { id, source: SignalSource::Runtime, tag: tag.into() }
    }
}

/// Deferred work run when a sync signal arrives.
#[async_trait]
pub trait SyncTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), Error>;
}

/// Default task: records that a sync happened and does nothing else.
pub struct LogSyncTask;

#[async_trait]
impl SyncTask for LogSyncTask {
    fn name(&self) -> &str {
        "log-sync"
    }

    async fn run(&self) -> Result<(), Error> {
        tracing::info!("performing background sync");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SyncOutcome {
    Completed,
    Failed(String),
    /// No task registered for the tag.
    Ignored,
    /// This signal id already ran.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncReport {
    pub signal_id: u64,
    pub source: SignalSource,
    pub tag: String,
    pub task: Option<String>,
    pub outcome: SyncOutcome,
}

/// Tag → task table plus the set of signals already handled.
#[derive(Default)]
pub struct SyncRegistry {
    tasks: RwLock<HashMap<String, Arc<dyn SyncTask>>>,
    seen: Mutex<HashSet<(SignalSource, u64)>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` for `tag`, replacing any previous task.
    pub fn register(&self, tag: impl Into<String>, task: Arc<dyn SyncTask>) {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.into(), task);
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tags.sort();
        tags
    }

    /// Run the task for `signal.tag`, at most once per signal id and source.
    pub async fn dispatch(&self, signal: &SyncSignal) -> SyncReport {
        let report = |task: Option<String>, outcome| SyncReport {
            signal_id: signal.id,
            source: signal.source,
            tag: signal.tag.clone(),
            task,
            outcome,
        };

        let first_delivery = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((signal.source, signal.id));
        if !first_delivery {
            tracing::debug!(signal_id = signal.id, tag = %signal.tag, "sync signal already handled");
            return report(None, SyncOutcome::Duplicate);
        }

        let task = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&signal.tag)
            .cloned();
        let Some(task) = task else {
            tracing::debug!(tag = %signal.tag, "no sync task for tag");
            return report(None, SyncOutcome::Ignored);
        };

        let name = task.name().to_string();
        tracing::info!(signal_id = signal.id, tag = %signal.tag, task = %name, "background sync triggered");

        match task.run().await {
            Ok(()) => report(Some(name), SyncOutcome::Completed),
            Err(e) => {
                tracing::warn!(tag = %signal.tag, task = %name, error = %e, "background sync failed");
                report(Some(name), SyncOutcome::Failed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTask {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SyncTask for CountingTask {
        fn name(&self) -> &str {
            "outbox"
        }

        async fn run(&self) -> Result<(), Error> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::SyncFailed { tag: "outbox".into(), reason: "server rejected batch".into() })
            } else {
                Ok(())
            }
        }
    }

    fn signal(id: u64, tag: &str) -> SyncSignal {
        SyncSignal::host(id, tag)
    }

    #[tokio::test]
    async fn test_runs_registered_task() {
        let registry = SyncRegistry::new();
        let task = Arc::new(CountingTask { runs: AtomicUsize::new(0), fail: false });
        registry.register("background-sync", task.clone());

        let report = registry.dispatch(&signal(1, "background-sync")).await;
        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.task.as_deref(), Some("outbox"));
        assert_eq!(task.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_at_most_once_per_signal() {
        let registry = SyncRegistry::new();
        let task = Arc::new(CountingTask { runs: AtomicUsize::new(0), fail: false });
        registry.register("background-sync", task.clone());

        registry.dispatch(&signal(7, "background-sync")).await;
        let again = registry.dispatch(&signal(7, "background-sync")).await;
        let next = registry.dispatch(&signal(8, "background-sync")).await;

        assert_eq!(again.outcome, SyncOutcome::Duplicate);
        assert_eq!(next.outcome, SyncOutcome::Completed);
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_tag_ignored() {
        let registry = SyncRegistry::new();
        registry.register("background-sync", Arc::new(LogSyncTask));

        let report = registry.dispatch(&signal(1, "periodic-refresh")).await;
        assert_eq!(report.outcome, SyncOutcome::Ignored);
        assert!(report.task.is_none());
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let registry = SyncRegistry::new();
        registry.register("background-sync", Arc::new(CountingTask { runs: AtomicUsize::new(0), fail: true }));

        let report = registry.dispatch(&signal(1, "background-sync")).await;
        assert!(matches!(report.outcome, SyncOutcome::Failed(ref reason) if reason.contains("SYNC_FAILED")));
    }

    #[test]
    fn test_tags_sorted() {
        let registry = SyncRegistry::new();
        registry.register("b", Arc::new(LogSyncTask));
        registry.register("a", Arc::new(LogSyncTask));
        assert_eq!(registry.tags(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_sources_do_not_share_ids() {
        let registry = SyncRegistry::new();
        registry.register("background-sync", Arc::new(LogSyncTask));

        registry.dispatch(&SyncSignal::host(1, "background-sync")).await;
        let generated = registry.dispatch(&SyncSignal::runtime(1, "background-sync")).await;
        assert_eq!(generated.outcome, SyncOutcome::Completed);
        assert_eq!(generated.source, SignalSource::Runtime);
    }

    #[tokio::test]
    async fn test_poisoned_locks_still_dispatch() {
        let registry = Arc::new(SyncRegistry::new());
        let poisoner = registry.clone();
        let _ = std::thread::spawn(move || {
            let _tasks = poisoner.tasks.write().unwrap();
            let _seen = poisoner.seen.lock().unwrap();
            panic!("poison both locks");
        })
        .join();
        assert!(registry.tasks.is_poisoned());

        registry.register("background-sync", Arc::new(LogSyncTask));
        assert_eq!(registry.tags(), vec!["background-sync"]);

        let first = registry.dispatch(&signal(1, "background-sync")).await;
        let again = registry.dispatch(&signal(1, "background-sync")).await;
        assert_eq!(first.outcome, SyncOutcome::Completed);
        assert_eq!(again.outcome, SyncOutcome::Duplicate);
    }
}
