//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Request, response and manifest data model
//! - Persistent cache stores with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod request;
pub mod response;
pub mod routes;

pub use cache::{ActiveGeneration, CacheDb, EntryKey};
pub use config::AppConfig;
pub use error::Error;
pub use manifest::{CacheVersion, Manifest, StoreLayout};
pub use request::{Destination, ResourceRequest};
pub use response::{Body, Response, ResponseType};
pub use routes::{RouteRule, RouteTable, Strategy};
