//! The generation currently in control of a scope.
//!
//! Written on activation and read back when a runtime starts, so an
//! upgrade that never activates leaves the previous generation serving.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

use super::connection::CacheDb;
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActiveGeneration {
    /// Application origin the generation serves.
    pub scope: String,
    pub version: String,
    pub shell_store: String,
    pub runtime_store: String,
    pub activated_at: String,
}

impl ActiveGeneration {
    pub fn new(
        scope: impl Into<String>, version: impl Into<String>, shell_store: impl Into<String>,
        runtime_store: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            version: version.into(),
            shell_store: shell_store.into(),
            runtime_store: runtime_store.into(),
            activated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl CacheDb {
    /// Record `generation` as the one in control of its scope.
    pub async fn set_active_generation(&self, generation: &ActiveGeneration) -> Result<(), Error> {
        let generation = generation.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO registrations (scope, version, shell_store, runtime_store, activated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(scope) DO UPDATE SET
                        version = excluded.version,
                        shell_store = excluded.shell_store,
                        runtime_store = excluded.runtime_store,
                        activated_at = excluded.activated_at",
                    params![
                        generation.scope,
                        generation.version,
                        generation.shell_store,
                        generation.runtime_store,
                        generation.activated_at
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn active_generation(&self, scope: &str) -> Result<Option<ActiveGeneration>, Error> {
        let scope = scope.to_string();
        self.conn
            .call(move |conn| -> Result<Option<ActiveGeneration>, Error> {
                let generation = conn
                    .query_row(
                        "SELECT scope, version, shell_store, runtime_store, activated_at
                         FROM registrations WHERE scope = ?1",
                        params![scope],
                        |row| {
                            Ok(ActiveGeneration {
                                scope: row.get(0)?,
                                version: row.get(1)?,
                                shell_store: row.get(2)?,
                                runtime_store: row.get(3)?,
                                activated_at: row.get(4)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(generation)
            })
            .await
            .map_err(Error::from)
    }

    /// Forget the active generation. Returns false if none was recorded.
    pub async fn clear_active_generation(&self, scope: &str) -> Result<bool, Error> {
        let scope = scope.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM registrations WHERE scope = ?1", params![scope])?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }
}
