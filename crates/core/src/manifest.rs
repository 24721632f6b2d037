//! App-shell manifest, cache versions and store naming.
//!
//! Stores are named `<purpose>-<version>`. The shell store holds the manifest
//! entries written at install; the runtime store holds entries fetched while
//! serving requests. Each has its own version so the two can be pruned
//! independently by later releases.

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identifier for one generation of cached resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(String);

impl CacheVersion {
    pub fn new(version: impl Into<String>) -> Result<Self, Error> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(Error::InvalidInput("cache version cannot be empty".into()));
        }
        Ok(Self(version))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free list of paths that must be available offline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Build a manifest, preserving order.
    ///
    /// Every entry must be an absolute path and appear once.
    pub fn new<I, S>(entries: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry.into();
            if !entry.starts_with('/') {
                return Err(Error::InvalidInput(format!("manifest entry must start with '/': {entry}")));
            }
            if out.contains(&entry) {
                return Err(Error::InvalidInput(format!("duplicate manifest entry: {entry}")));
            }
            out.push(entry);
        }
        Ok(Self { entries: out })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Store names for the current generation plus the retention allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub shell: String,
    pub runtime: String,
    retained: Vec<String>,
}

impl StoreLayout {
    pub fn new(
        shell_purpose: &str, version: &CacheVersion, runtime_purpose: &str, runtime_version: &CacheVersion,
    ) -> Self {
        Self {
            shell: store_name(shell_purpose, version),
            runtime: store_name(runtime_purpose, runtime_version),
            retained: Vec::new(),
        }
    }

    /// Extra store names activation must never delete.
    pub fn with_retained(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.retained.extend(names);
        self
    }

    pub fn is_retained(&self, name: &str) -> bool {
        name == self.shell || name == self.runtime || self.retained.iter().any(|n| n == name)
    }

    /// Every name activation keeps, active stores first.
    pub fn retained_names(&self) -> Vec<String> {
        let mut names = vec![self.shell.clone(), self.runtime.clone()];
        for name in &self.retained {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// `<purpose>-<version>`
pub fn store_name(purpose: &str, version: &CacheVersion) -> String {
    format!("{purpose}-{version}")
}
