//! SQLite-backed cache and usage counters.
//!
//! The in-memory backends forget everything on restart. This store keeps the
//! same contracts ([`ResolutionCache`] and [`UsageStore`]) but persists them in
//! a single database file so a redeploy does not lose the statistics or force
//! every post to be extracted again.

use std::path::Path;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::cache::ResolutionCache;
use crate::stats::{DownloadLog, UsageSnapshot, UsageStore};

const COUNTER_REQUESTS: &str = "requests";
const COUNTER_DOWNLOADS: &str = "downloads";
const COUNTER_CACHE_HITS: &str = "cache_hits";
const COUNTER_VIDEOS_SERVED: &str = "videos_served";

/// Wrapper around one SQLite connection shared by every request handler.
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex. Each trait method holds the lock for exactly one statement, which is
/// what gives the per-operation atomicity the contracts ask for.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the database and ensures the schema
    /// exists. WAL mode keeps `/stats` reads from blocking writers.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("enabling WAL mode")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")
            .context("setting synchronous mode")?;

        Self::with_connection(conn)
    }

    /// In-memory database, handy for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        ensure_tables(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn bump(&self, counter: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                r#"
                INSERT INTO counters (name, value) VALUES (?1, 1)
                ON CONFLICT(name) DO UPDATE SET value = value + 1
                "#,
                params![counter],
            )
            .with_context(|| format!("incrementing {counter}"))?;
        Ok(())
    }

    fn counter(conn: &Connection, counter: &str) -> Result<u64> {
        let value: Option<i64> = conn
            .query_row(
                "SELECT value FROM counters WHERE name = ?1",
                params![counter],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("reading {counter}"))?;
        Ok(value.unwrap_or(0).max(0) as u64)
    }
}

/// Creates the tables inside one transaction so a failure leaves the file
/// untouched.
fn ensure_tables(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS resolutions (
            source_url TEXT PRIMARY KEY,
            media_url TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            value INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS clients (
            client_id TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS download_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id TEXT NOT NULL,
            source_url TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );
        "#,
    )
    .context("creating schema")?;

    tx.commit()?;
    Ok(())
}

impl ResolutionCache for SqliteStore {
    fn get(&self, source_url: &str) -> Result<Option<String>> {
        let media_url = self
            .conn
            .lock()
            .query_row(
                "SELECT media_url FROM resolutions WHERE source_url = ?1",
                params![source_url],
                |row| row.get(0),
            )
            .optional()
            .context("reading cached resolution")?;
        Ok(media_url)
    }

    fn put(&self, source_url: &str, media_url: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                r#"
                INSERT INTO resolutions (source_url, media_url) VALUES (?1, ?2)
                ON CONFLICT(source_url) DO UPDATE SET media_url = excluded.media_url
                "#,
                params![source_url, media_url],
            )
            .context("storing resolution")?;
        Ok(())
    }

    fn remove(&self, source_url: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "DELETE FROM resolutions WHERE source_url = ?1",
                params![source_url],
            )
            .context("removing resolution")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM resolutions", [])
            .context("clearing resolutions")?;
        Ok(())
    }
}

impl UsageStore for SqliteStore {
    fn record_request(&self) -> Result<()> {
        self.bump(COUNTER_REQUESTS)
    }

    fn record_client(&self, client_id: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT OR IGNORE INTO clients (client_id) VALUES (?1)",
                params![client_id],
            )
            .context("recording client")?;
        Ok(())
    }

    fn record_served(&self, entry: DownloadLog, cache_hit: bool) -> Result<()> {
        self.bump(COUNTER_DOWNLOADS)?;
        self.bump(COUNTER_VIDEOS_SERVED)?;
        if cache_hit {
            self.bump(COUNTER_CACHE_HITS)?;
        }
        self.conn
            .lock()
            .execute(
                r#"
                INSERT INTO download_logs (client_id, source_url, timestamp)
                VALUES (?1, ?2, ?3)
                "#,
                params![entry.client_id, entry.source_url, entry.timestamp],
            )
            .context("appending download log")?;
        Ok(())
    }

    fn snapshot(&self) -> Result<UsageSnapshot> {
        let conn = self.conn.lock();

        let unique_ips: i64 = conn
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))
            .context("counting clients")?;

        let mut stmt = conn.prepare(
            r#"
            SELECT client_id, source_url, timestamp
            FROM download_logs
            ORDER BY id ASC
            "#,
        )?;
        let mut rows = stmt.query([])?;
        let mut download_logs = Vec::new();
        while let Some(row) = rows.next()? {
            download_logs.push(DownloadLog {
                client_id: row.get(0)?,
                source_url: row.get(1)?,
                timestamp: row.get(2)?,
            });
        }

        Ok(UsageSnapshot {
            requests: Self::counter(&conn, COUNTER_REQUESTS)?,
            downloads: Self::counter(&conn, COUNTER_DOWNLOADS)?,
            cache_hits: Self::counter(&conn, COUNTER_CACHE_HITS)?,
            videos_served: Self::counter(&conn, COUNTER_VIDEOS_SERVED)?,
            unique_ips: unique_ips.max(0) as u64,
            download_logs,
        })
    }

    fn reset(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                DELETE FROM counters;
                DELETE FROM clients;
                DELETE FROM download_logs;
                "#,
            )
            .context("resetting usage counters")?;
        Ok(())
    }
}
