//! SQLite-backed catalog store.
//!
//! One row per record, unique on `content_id`. Rows are read back in
//! insertion order through the autoincrement `seq` column, a page at a time,
//! and each page's matches are sent before the next page is read. Rows
//! committed while a scan runs may show up at its end. All SQLite calls run
//! on the blocking pool.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use super::{drain_into, CatalogStore, ScanEnd, ScanSink};
use crate::library::error::CatalogError;
use crate::library::record::{ContentId, Record};
use crate::library::search::SearchQuery;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    tags TEXT NOT NULL,
    quality TEXT NOT NULL,
    size_bytes INTEGER,
    owner_id TEXT,
    indexed_at TEXT NOT NULL
);
"#;

/// How long SQLite waits on a locked database file
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows read per connection lock during a scan
const SCAN_PAGE: usize = 64;

type Handle = Arc<Mutex<Option<Connection>>>;

/// Durable store in a single SQLite database file
pub struct SqliteStore {
    conn: Handle,
    label: String,
}

impl SqliteStore {
    /// Open or create the database at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CatalogError::storage(&format!("create {}", parent.display()), e)
                })?;
            }
        }

        let label = path.display().to_string();
        let conn = task::spawn_blocking(move || -> Result<Connection, CatalogError> {
            let conn = Connection::open(&path)
                .map_err(|e| CatalogError::storage("open database", e))?;
            init_connection(&conn)?;
            Ok(conn)
        })
        .await
        .map_err(|e| CatalogError::storage("open task", e))??;

        info!(path = %label, "Opened catalog database");
        Ok(Self::from_connection(conn, label))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CatalogError::storage("open in-memory database", e))?;
        init_connection(&conn)?;
        Ok(Self::from_connection(conn, ":memory:".to_string()))
    }

    fn from_connection(conn: Connection, label: String) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            label,
        }
    }

    async fn lock(
        &self,
        deadline: Instant,
        operation: &'static str,
    ) -> Result<OwnedMutexGuard<Option<Connection>>, CatalogError> {
        let started = Instant::now();
        let guard = timeout_at(deadline, self.conn.clone().lock_owned())
            .await
            .map_err(|_| CatalogError::TimedOut {
                operation,
                after: started.elapsed(),
            })?;

        if guard.is_none() {
            return Err(CatalogError::StorageUnavailable(format!(
                "database {} is closed",
                self.label
            )));
        }
        Ok(guard)
    }
}

fn init_connection(conn: &Connection) -> Result<(), CatalogError> {
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| CatalogError::storage("set busy timeout", e))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| CatalogError::storage("initialize schema", e))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn insert_row(
    conn: &mut Connection,
    record: &Record,
    deadline: Instant,
    started: Instant,
) -> Result<(), CatalogError> {
    let tags = serde_json::to_string(record.tags())
        .map_err(|e| CatalogError::storage("encode tags", e))?;

    let tx = conn
        .transaction()
        .map_err(|e| CatalogError::storage("begin transaction", e))?;

    let inserted = tx.execute(
        "INSERT INTO records (content_id, title, tags, quality, size_bytes, owner_id, indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.content_id().as_str(),
            record.title(),
            tags,
            record.quality(),
            record.size_bytes().map(|s| s as i64),
            record.owner_id(),
            record.indexed_at().to_rfc3339(),
        ],
    );

    match inserted {
        Err(e) if is_unique_violation(&e) => {
            return Err(CatalogError::DuplicateContent(record.content_id().clone()));
        }
        Err(e) => return Err(CatalogError::storage("insert record", e)),
        Ok(_) => {}
    }

    // Dropping the transaction rolls it back
    if Instant::now() >= deadline {
        return Err(CatalogError::TimedOut {
            operation: "insert",
            after: started.elapsed(),
        });
    }

    tx.commit()
        .map_err(|e| CatalogError::storage("commit transaction", e))
}

fn decode_row(row: &rusqlite::Row<'_>) -> Result<Record, CatalogError> {
    let get_err = |e: rusqlite::Error| CatalogError::storage("read row", e);

    let content_id: String = row.get(0).map_err(get_err)?;
    let title: String = row.get(1).map_err(get_err)?;
    let tags: String = row.get(2).map_err(get_err)?;
    let quality: String = row.get(3).map_err(get_err)?;
    let size_bytes: Option<i64> = row.get(4).map_err(get_err)?;
    let owner_id: Option<String> = row.get(5).map_err(get_err)?;
    let indexed_at: String = row.get(6).map_err(get_err)?;

    let tags: Vec<String> =
        serde_json::from_str(&tags).map_err(|e| CatalogError::storage("decode tags", e))?;
    let indexed_at = DateTime::parse_from_rfc3339(&indexed_at)
        .map_err(|e| CatalogError::storage("decode timestamp", e))?
        .with_timezone(&Utc);

    Ok(Record::from_parts(
        ContentId::parse(&content_id)?,
        title,
        tags,
        quality,
        size_bytes.map(|s| s as u64),
        owner_id,
        indexed_at,
    ))
}

/// Matches from one page of a scan
struct ScanPage {
    matched: Vec<Record>,
    /// `seq` of the last row read
    last_seq: Option<i64>,
    rows_read: usize,
}

fn scan_page(
    conn: &Connection,
    query: &SearchQuery,
    after_seq: i64,
) -> Result<ScanPage, CatalogError> {
    let mut stmt = conn
        .prepare(
            "SELECT content_id, title, tags, quality, size_bytes, owner_id, indexed_at, seq
             FROM records WHERE seq > ?1 ORDER BY seq LIMIT ?2",
        )
        .map_err(|e| CatalogError::storage("prepare scan", e))?;
    let mut rows = stmt
        .query(params![after_seq, SCAN_PAGE as i64])
        .map_err(|e| CatalogError::storage("run scan", e))?;

    let mut page = ScanPage {
        matched: Vec::new(),
        last_seq: None,
        rows_read: 0,
    };
    while let Some(row) = rows.next().map_err(|e| CatalogError::storage("read row", e))? {
        page.rows_read += 1;
        page.last_seq = Some(row.get(7).map_err(|e| CatalogError::storage("read row", e))?);

        let record = decode_row(row)?;
        if query.matches(&record) {
            page.matched.push(record);
        }
    }

    Ok(page)
}

#[async_trait]
impl CatalogStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn insert(&self, record: &Record, deadline: Instant) -> Result<(), CatalogError> {
        let started = Instant::now();
        let mut guard = self.lock(deadline, "insert").await?;
        let record = record.clone();

        // Awaited to completion so the caller always learns whether the row
        // was committed.
        task::spawn_blocking(move || match guard.as_mut() {
            Some(conn) => insert_row(conn, &record, deadline, started),
            None => Err(CatalogError::StorageUnavailable("database is closed".into())),
        })
        .await
        .map_err(|e| CatalogError::storage("insert task", e))?
    }

    async fn scan(&self, query: &SearchQuery, deadline: Instant, sink: ScanSink) -> ScanEnd {
        let mut after_seq = 0;

        loop {
            let guard = match self.lock(deadline, "query").await {
                Ok(guard) => guard,
                Err(CatalogError::TimedOut { .. }) => return ScanEnd::DeadlineReached,
                Err(e) => {
                    let _ = sink.send(Err(e)).await;
                    return ScanEnd::Exhausted;
                }
            };

            // The guard is dropped with the closure, so writers are not held
            // up while this page waits on the reader.
            let page_query = query.clone();
            let page = task::spawn_blocking(move || match guard.as_ref() {
                Some(conn) => scan_page(conn, &page_query, after_seq),
                None => Err(CatalogError::StorageUnavailable("database is closed".into())),
            })
            .await
            .map_err(|e| CatalogError::storage("query task", e))
            .and_then(|result| result);

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    let _ = sink.send(Err(e)).await;
                    return ScanEnd::Exhausted;
                }
            };

            match drain_into(page.matched, deadline, &sink).await {
                ScanEnd::Exhausted => {}
                end => return end,
            }

            match page.last_seq {
                Some(seq) if page.rows_read == SCAN_PAGE => after_seq = seq,
                _ => return ScanEnd::Exhausted,
            }
            if Instant::now() >= deadline {
                debug!(after_seq, "Scan deadline reached");
                return ScanEnd::DeadlineReached;
            }
        }
    }

    async fn health_check(&self) -> Result<(), CatalogError> {
        let guard = self
            .lock(Instant::now() + BUSY_TIMEOUT, "health check")
            .await?;

        task::spawn_blocking(move || match guard.as_ref() {
            Some(conn) => conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get::<_, i64>(0))
                .map(|_| ())
                .map_err(|e| CatalogError::storage("health check", e)),
            None => Err(CatalogError::StorageUnavailable("database is closed".into())),
        })
        .await
        .map_err(|e| CatalogError::storage("health check task", e))?
    }

    async fn close(&self) -> Result<(), CatalogError> {
        let conn = self.conn.lock().await.take();

        if let Some(conn) = conn {
            task::spawn_blocking(move || conn.close().map_err(|(_, e)| e))
                .await
                .map_err(|e| CatalogError::storage("close task", e))?
                .map_err(|e| CatalogError::storage("close database", e))?;
            info!(path = %self.label, "Closed catalog database");
        }

        Ok(())
    }
}
