//! Cache-related MCP tools.
//!
//! This module provides read access to the named response stores.

pub mod get;
pub mod stores;

pub use get::{CacheGetParams, get_impl};
pub use stores::stores_impl;
