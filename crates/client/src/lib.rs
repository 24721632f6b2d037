//! Network side of shellcache.
//!
//! This crate provides the HTTP fetcher, the offline asset cache worker and
//! the runtime that hosts it. The server crate drives everything through
//! [`Runtime`].

pub mod fetch;
pub mod runtime;
pub mod worker;

#[cfg(test)]
mod testing;

pub use fetch::{FetchClient, FetchConfig, Fetcher};
pub use runtime::dispatch::{Dispatcher, Event, EventKind, EventOutcome, Handler};
pub use runtime::lifecycle::WorkerState;
pub use runtime::sync::{LogSyncTask, SignalSource, SyncOutcome, SyncRegistry, SyncReport, SyncSignal, SyncTask};
pub use runtime::{Registration, Runtime, RuntimeOptions, RuntimeStatus};
pub use worker::fallback::OFFLINE_BODY;
pub use worker::{
    ActivateReport, BypassReason, FetchDecision, InstallReport, OfflineAssetCache, Served, ServedFrom, WorkerConfig,
};
