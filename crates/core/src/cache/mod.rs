//! SQLite-backed persistent cache stores.
//!
//! A store is a named set of GET request/response pairs. Stores follow the
//! `<purpose>-<version>` convention and are created on install, pruned on
//! activate, and read or written while serving requests. Access is async via
//! tokio-rusqlite:
//!
//! - Request keys are SHA-256 over method and canonical URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Optional per-store byte quota
//! - The active generation per scope survives restarts

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::{EntryKey, url_key};
pub use generations::ActiveGeneration;
