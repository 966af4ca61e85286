//! SQLite implementation of [`CacheStorage`].
//!
//! Partitions are rows of `partitions`; their pairs live in `entries` and are
//! removed with the partition through the foreign key cascade.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tokio_rusqlite::{params, rusqlite};
use url::Url;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use super::storage::{CacheStorage, CachedEntry, MatchOptions};
use crate::Error;
use crate::request::{CacheRequest, CacheResponse, headers_from_json, headers_to_json};

const ENTRY_COLUMNS: &str = "e.method, e.url, e.request_headers_json, e.status, e.headers_json, e.body";

/// Columns of one `entries` row before decoding.
struct RawEntry {
    method: String,
    url: String,
    request_headers_json: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl RawEntry {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            method: row.get(0)?,
            url: row.get(1)?,
            request_headers_json: row.get(2)?,
            status: row.get(3)?,
            headers_json: row.get(4)?,
            body: row.get(5)?,
        })
    }

    fn decode(self) -> Result<CachedEntry, Error> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|e| Error::StoreRead(format!("stored method '{}': {e}", self.method)))?;
        let url = Url::parse(&self.url).map_err(|e| Error::StoreRead(format!("stored url '{}': {e}", self.url)))?;
        let status = u16::try_from(self.status)
            .ok()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .ok_or_else(|| Error::StoreRead(format!("stored status {}", self.status)))?;

        let mut request = CacheRequest::new(method, url);
        request.headers = headers_from_json(&self.request_headers_json)?;
        let response = CacheResponse::new(status, headers_from_json(&self.headers_json)?, Bytes::from(self.body));

        Ok(CachedEntry { request, response })
    }
}

/// An entry ready to be written.
struct EncodedEntry {
    key_hash: String,
    method: String,
    url: String,
    request_headers_json: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl EncodedEntry {
    fn encode(request: &CacheRequest, response: &CacheResponse) -> Result<Self, Error> {
        if !request.is_get() {
            return Err(Error::UnsupportedRequest(format!("cannot store {} {}", request.method, request.url)));
        }
        if response.status == StatusCode::PARTIAL_CONTENT {
            return Err(Error::UnsupportedRequest(format!("cannot store partial response for {}", request.url)));
        }
        if response.vary().iter().any(|name| name == "*") {
            return Err(Error::UnsupportedRequest(format!("cannot store 'Vary: *' response for {}", request.url)));
        }

        let url = request.url.as_str().to_string();
        Ok(Self {
            key_hash: compute_cache_key(request.method.as_str(), &url),
            method: request.method.as_str().to_string(),
            url,
            request_headers_json: vary_headers_json(request, response)?,
            status: i64::from(response.status.as_u16()),
            headers_json: headers_to_json(&response.headers)?,
            body: response.body.to_vec(),
        })
    }

    fn upsert(&self, conn: &rusqlite::Connection, partition: &str, stored_at: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO entries (
                partition, key_hash, method, url, request_headers_json,
                status, headers_json, body, stored_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(partition, key_hash) DO UPDATE SET
                request_headers_json = excluded.request_headers_json,
                status = excluded.status,
                headers_json = excluded.headers_json,
                body = excluded.body,
                stored_at = excluded.stored_at",
            params![
                partition,
                &self.key_hash,
                &self.method,
                &self.url,
                &self.request_headers_json,
                self.status,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )
    }
}

/// Record only the request headers the response varies on.
fn vary_headers_json(request: &CacheRequest, response: &CacheResponse) -> Result<String, Error> {
    let mut recorded = HeaderMap::new();
    for name in response.vary() {
        if let Some(value) = request.headers.get(name.as_str())
            && let Ok(header) = http::HeaderName::from_bytes(name.as_bytes())
        {
            recorded.insert(header, value.clone());
        }
    }
    headers_to_json(&recorded)
}

/// Whether a stored pair satisfies the request's `Vary` negotiation.
fn vary_matches(stored: &CachedEntry, request: &CacheRequest) -> bool {
    stored.response.vary().iter().all(|name| {
        name != "*" && stored.request.headers.get(name.as_str()) == request.headers.get(name.as_str())
    })
}

fn insert_partition(conn: &rusqlite::Connection, partition: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
        params![partition, chrono::Utc::now().to_rfc3339()],
    )
}

fn read_failure(err: Error) -> Error {
    match err {
        Error::Database(e) => Error::StoreRead(e.to_string()),
        other => other,
    }
}

fn write_failure(err: Error) -> Error {
    match err {
        Error::Database(e) => Error::StoreWrite(e.to_string()),
        other => other,
    }
}

impl CacheDb {
    async fn query_entries(
        &self, partition: Option<String>, request: &CacheRequest, options: MatchOptions,
    ) -> Result<Vec<CachedEntry>, Error> {
        if !request.is_get() {
            return Ok(Vec::new());
        }

        let method = request.method.as_str().to_string();
        let key_hash = compute_cache_key(&method, request.url.as_str());

        let raw = self
            .conn
            .call(move |conn| -> Result<Vec<RawEntry>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                     JOIN partitions p ON p.name = e.partition
                     WHERE e.method = ?1 AND e.key_hash = ?2 AND (?3 IS NULL OR e.partition = ?3)
                     ORDER BY p.rowid, e.rowid"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![method, key_hash, partition], RawEntry::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
            .map_err(read_failure)?;

        let mut matches = Vec::with_capacity(raw.len());
        for entry in raw {
            let entry = entry.decode()?;
            if options.ignore_vary || vary_matches(&entry, request) {
                matches.push(entry);
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, partition: &str) -> Result<(), Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                insert_partition(conn, &partition)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
            .map_err(write_failure)
    }

    async fn has(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![partition],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
            .map_err(read_failure)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
            .map_err(read_failure)
    }

    async fn delete(&self, partition: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM partitions WHERE name = ?1", params![partition])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
            .map_err(write_failure)
    }

    async fn put(&self, partition: &str, request: &CacheRequest, response: &CacheResponse) -> Result<(), Error> {
        let entry = EncodedEntry::encode(request, response)?;
        let partition = partition.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                insert_partition(&tx, &partition)?;
                entry.upsert(&tx, &partition, &stored_at)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
            .map_err(write_failure)
    }

    async fn put_all(&self, partition: &str, entries: &[CachedEntry]) -> Result<(), Error> {
        let encoded = entries
            .iter()
            .map(|e| EncodedEntry::encode(&e.request, &e.response))
            .collect::<Result<Vec<_>, _>>()?;
        let partition = partition.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                insert_partition(&tx, &partition)?;
                for entry in &encoded {
                    entry.upsert(&tx, &partition, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
            .map_err(write_failure)
    }

    async fn lookup(
        &self, partition: &str, request: &CacheRequest, options: MatchOptions,
    ) -> Result<Option<CacheResponse>, Error> {
        let matches = self.query_entries(Some(partition.to_string()), request, options).await?;
        Ok(matches.into_iter().next().map(|e| e.response))
    }

    async fn lookup_any(&self, request: &CacheRequest, options: MatchOptions) -> Result<Option<CacheResponse>, Error> {
        let matches = self.query_entries(None, request, options).await?;
        Ok(matches.into_iter().next().map(|e| e.response))
    }

    async fn entries(&self, partition: &str) -> Result<Vec<CachedEntry>, Error> {
        let partition = partition.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Vec<RawEntry>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.partition = ?1 ORDER BY e.rowid");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![partition], RawEntry::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
            .map_err(read_failure)?;

        raw.into_iter().map(RawEntry::decode).collect()
    }
}
