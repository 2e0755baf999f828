use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::schema::{drop_schema, init_schema};
use super::Symbol;
use crate::error::{IndexError, Result};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Symbols extracted from one file at a given modification time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Seconds since the epoch.
    pub last_modified: f64,
    pub symbols: Vec<Symbol>,
    /// Extraction hit a syntax error; `symbols` is empty.
    #[serde(default)]
    pub parse_failed: bool,
}

impl CacheEntry {
    pub fn new(last_modified: f64, symbols: Vec<Symbol>) -> Self {
        Self {
            last_modified,
            symbols,
            parse_failed: false,
        }
    }

    pub fn failed(last_modified: f64) -> Self {
        Self {
            last_modified,
            symbols: Vec::new(),
            parse_failed: true,
        }
    }

    /// Usable without re-extraction iff the file's current mtime is the stored one.
    pub fn is_fresh(&self, current_modified: f64) -> bool {
        self.last_modified == current_modified
    }
}

/// Modification time of `path` in float seconds since the epoch.
pub fn modified_time(path: &Path) -> std::io::Result<f64> {
    let modified = std::fs::metadata(path)?.modified()?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(std::io::Error::other)?;
    Ok(since_epoch.as_secs_f64())
}

/// Persistent per-workspace cache of extraction results, keyed by absolute path.
///
/// Each write is a single `INSERT OR REPLACE`, so entries are replaced
/// atomically. Callers serialize scans; the store does no locking of its own.
#[derive(Clone)]
pub struct CacheStore {
    pool: ConnectionPool,
    db_path: PathBuf,
}

impl CacheStore {
    /// Create or open a cache database
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        info!("Opening symbol cache at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
            }
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder().max_size(4).build(manager)?;

        {
            let conn = pool.get()?;
            init_schema(&conn)?;
        }

        Ok(Self { pool, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn get(&self, path: &str) -> Result<Option<CacheEntry>> {
        let conn = self.get_conn()?;

        let row = conn
            .query_row(
                "SELECT last_modified, symbols, parse_failed FROM cache_entries WHERE path = ?1",
                [path],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((last_modified, symbols, parse_failed)) => Ok(Some(CacheEntry {
                last_modified,
                symbols: serde_json::from_str(&symbols)?,
                parse_failed,
            })),
            None => Ok(None),
        }
    }

    pub fn put(&self, path: &str, entry: &CacheEntry) -> Result<()> {
        let conn = self.get_conn()?;
        let symbols = serde_json::to_string(&entry.symbols)?;

        debug!("Caching {} symbols for {}", entry.symbols.len(), path);

        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (path, last_modified, symbols, parse_failed, updated_at)
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)",
            params![path, entry.last_modified, symbols, entry.parse_failed],
        )?;

        Ok(())
    }

    pub fn iterate_keys(&self) -> Result<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT path FROM cache_entries ORDER BY path")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Remove entries whose file no longer exists. Returns how many were removed.
    pub fn purge_missing(&self) -> Result<usize> {
        let missing: Vec<String> = self
            .iterate_keys()?
            .into_iter()
            .filter(|key| !Path::new(key).exists())
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        for key in &missing {
            tx.execute("DELETE FROM cache_entries WHERE path = ?1", [key])?;
        }
        tx.commit()?;

        info!("Purged {} stale cache entries", missing.len());
        Ok(missing.len())
    }

    /// Drop every entry (rebuild).
    pub fn clear(&self) -> Result<()> {
        let conn = self.get_conn()?;
        drop_schema(&conn)?;
        init_schema(&conn)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.get_conn()?;
        let (entries, failed): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(parse_failed), 0) FROM cache_entries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CacheStats {
            entries: entries as usize,
            failed_entries: failed as usize,
        })
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub failed_entries: usize,
}
