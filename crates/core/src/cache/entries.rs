//! Stored request/response pairs.
//!
//! Only GET requests are ever keyed. Headers are kept as an ordered list so a
//! stored response reads back exactly as it was captured.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::{Error, ResourceRequest, Response, ResponseType};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Listing metadata for one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryKey {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub size: u64,
    pub stored_at: String,
}

/// A response captured for storage, body already read.
struct PreparedEntry {
    key_hash: String,
    method: String,
    url: String,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_type: &'static str,
    response_url: Option<String>,
}

impl PreparedEntry {
    fn new(request: &ResourceRequest, mut response: Response) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::InvalidInput(format!("only GET requests can be stored, got {}", request.method)));
        }
        let url = url_key(&request.url);
        let headers_json = serde_json::to_string(&response.headers)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize headers: {e}")))?;
        let body = response.take_body()?.to_vec();

        Ok(Self {
            key_hash: compute_request_key("GET", &url),
            method: "GET".into(),
            url,
            status: response.status,
            status_text: response.status_text,
            headers_json,
            body,
            response_type: response.response_type.as_str(),
            response_url: response.url,
        })
    }
}

/// Canonical URL string used for keys: fragment removed.
pub fn url_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

fn insert(conn: &rusqlite::Connection, store: &str, entry: &PreparedEntry, quota: Option<u64>) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
        params![store, chrono::Utc::now().to_rfc3339()],
    )?;

    if let Some(quota) = quota {
        let others: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM entries WHERE store = ?1 AND key_hash != ?2",
            params![store, entry.key_hash],
            |row| row.get(0),
        )?;
        let needed = others as u64 + entry.body.len() as u64;
        if needed > quota {
            return Err(Error::QuotaExceeded { store: store.to_string(), needed, quota });
        }
    }

    conn.execute(
        "INSERT INTO entries (
            store, key_hash, method, url, status, status_text,
            headers_json, body, response_type, response_url, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(store, key_hash) DO UPDATE SET
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            response_type = excluded.response_type,
            response_url = excluded.response_url,
            stored_at = excluded.stored_at",
        params![
            store,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            entry.status,
            &entry.status_text,
            &entry.headers_json,
            &entry.body,
            entry.response_type,
            &entry.response_url,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// status, status_text, headers_json, body, response_type, response_url
type StoredRow = (u16, String, String, Vec<u8>, String, Option<String>);

fn row_to_response(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn build_response(row: StoredRow) -> Result<Response, Error> {
    let (status, status_text, headers_json, body, response_type, response_url) = row;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)
        .map_err(|e| Error::InvalidInput(format!("corrupt stored headers: {e}")))?;
    let mut response = Response::new(status, status_text, body)
        .with_headers(headers)
        .with_type(ResponseType::parse(&response_type));
    response.url = response_url;
    Ok(response)
}

impl CacheDb {
    /// Store a response for a GET request, consuming it.
    ///
    /// Creates the store if needed and replaces any previous entry for the
    /// same request. Callers that still need the response must `try_clone()`
    /// it first.
    pub async fn put_entry(&self, store: &str, request: &ResourceRequest, response: Response) -> Result<(), Error> {
        let entry = PreparedEntry::new(request, response)?;
        let store = store.to_string();
        let quota = self.quota_bytes;
        self.conn
            .call(move |conn| -> Result<(), Error> { insert(conn, &store, &entry, quota) })
            .await
            .map_err(Error::from)
    }

    /// Store several responses in one transaction: all are written or none are.
    pub async fn put_entries(&self, store: &str, entries: Vec<(ResourceRequest, Response)>) -> Result<usize, Error> {
        let prepared = entries
            .into_iter()
            .map(|(request, response)| PreparedEntry::new(&request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let store = store.to_string();
        let quota = self.quota_bytes;
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                for entry in &prepared {
                    insert(&tx, &store, entry, quota)?;
                }
                tx.commit()?;
                Ok(prepared.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request in one store.
    pub async fn match_entry(&self, store: &str, method: &str, url: &Url) -> Result<Option<Response>, Error> {
        let key_hash = compute_request_key(method, &url_key(url));
        let store = store.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let result = conn.query_row(
                    "SELECT status, status_text, headers_json, body, response_type, response_url
                     FROM entries WHERE store = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                    row_to_response,
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(build_response).transpose()
    }

    /// Look up a request across every store, oldest store first.
    pub async fn match_any(&self, method: &str, url: &Url) -> Result<Option<Response>, Error> {
        let key_hash = compute_request_key(method, &url_key(url));
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let result = conn.query_row(
                    "SELECT e.status, e.status_text, e.headers_json, e.body, e.response_type, e.response_url
                     FROM entries e JOIN stores s ON s.name = e.store
                     WHERE e.key_hash = ?1
                     ORDER BY s.rowid ASC LIMIT 1",
                    params![key_hash],
                    row_to_response,
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(build_response).transpose()
    }

    /// Entry metadata for a store, ordered by URL.
    pub async fn entry_keys(&self, store: &str) -> Result<Vec<EntryKey>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, LENGTH(body), stored_at
                     FROM entries WHERE store = ?1 ORDER BY url ASC",
                )?;
                let keys = stmt
                    .query_map(params![store], |row| {
                        Ok(EntryKey {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get(2)?,
                            size: row.get::<_, i64>(3)? as u64,
                            stored_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove one entry. Returns false if it was not stored.
    pub async fn delete_entry(&self, store: &str, method: &str, url: &Url) -> Result<bool, Error> {
        let key_hash = compute_request_key(method, &url_key(url));
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE store = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                )?;
                Ok(deleted == 1)
            })
            .await
            .map_err(Error::from)
    }
}
