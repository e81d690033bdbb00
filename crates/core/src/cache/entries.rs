//! SQLite implementation of [`CacheStorage`].

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::storage::{CacheStorage, StoreStats, ensure_storable};
use crate::Error;
use crate::model::{EdgeRequest, EdgeResponse};

/// Raw row as read from `cache_entries`.
type EntryRow = (i64, String, Vec<u8>, Option<String>);

fn decode_entry((status, headers_json, body, final_url): EntryRow) -> Result<EdgeResponse, Error> {
    let status = u16::try_from(status).map_err(|_| Error::CorruptEntry(format!("status {status} out of range")))?;
    let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
    Ok(EdgeResponse { status, headers, body: Bytes::from(body), url: final_url, redirected: false })
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let created_at = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, request: &EdgeRequest) -> Result<Option<EdgeResponse>, Error> {
        let name = name.to_string();
        let key_hash = request.cache_key();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, headers_json, body, final_url
                     FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![name, key_hash], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(decode_entry).transpose()
    }

    async fn put(&self, name: &str, request: &EdgeRequest, response: &EdgeResponse) -> Result<(), Error> {
        ensure_storable(request, response)?;

        let name = name.to_string();
        let key_hash = request.cache_key();
        let method = request.method.to_ascii_uppercase();
        let url = request.url.to_string();
        let status = i64::from(response.status);
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let final_url = response.url.clone();
        let now = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        store, key_hash, method, url, status, headers_json, body, final_url, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(store, key_hash) DO UPDATE SET
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        final_url = excluded.final_url,
                        stored_at = excluded.stored_at",
                    params![name, key_hash, method, url, status, headers_json, body, final_url, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn urls(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![name], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    async fn stats(&self, name: &str) -> Result<StoreStats, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<StoreStats, Error> {
                let (entries, bytes): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(length(body)), 0) FROM cache_entries WHERE store = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(StoreStats { entries: entries as u64, bytes: bytes as u64 })
            })
            .await
            .map_err(Error::from)
    }
}
