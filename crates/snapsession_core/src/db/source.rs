//! Connection source implementations for SQLite.
//!
//! # Invariants
//! - Every connection handed out has `foreign_keys=ON` and a busy timeout.
//! - `FileConnectionSource` never shares a connection between acquisitions.

use super::{ConnectionSource, DbError, DbResult, PooledConnection};
use log::{debug, error, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a dedicated connection to a database file per acquisition.
#[derive(Debug, Clone)]
pub struct FileConnectionSource {
    path: PathBuf,
}

impl FileConnectionSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionSource for FileConnectionSource {
    fn acquire(&self) -> DbResult<PooledConnection<'_>> {
        let started_at = Instant::now();
        match Connection::open(&self.path).map_err(DbError::from).and_then(|conn| {
            configure_connection(&conn)?;
            Ok(conn)
        }) {
            Ok(conn) => {
                debug!(
                    "event=db_connect module=db status=ok mode=file duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(PooledConnection::Owned(conn))
            }
            Err(err) => {
                error!(
                    "event=db_connect module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

/// Serialises every acquisition onto one connection.
///
/// Suited to in-memory databases, where separate connections would each see
/// an empty database.
#[derive(Debug)]
pub struct SharedConnectionSource {
    conn: Mutex<Connection>,
}

impl SharedConnectionSource {
    /// Wraps an already opened connection, applying the core pragmas.
    pub fn new(conn: Connection) -> DbResult<Self> {
        configure_connection(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        info!("event=db_connect module=db status=ok mode=memory");
        Self::new(conn)
    }
}

impl ConnectionSource for SharedConnectionSource {
    fn acquire(&self) -> DbResult<PooledConnection<'_>> {
        match self.conn.lock() {
            Ok(guard) => Ok(PooledConnection::Shared(guard)),
            Err(_) => {
                error!("event=db_connect module=db status=error mode=shared error_code=lock_poisoned");
                Err(DbError::Poisoned)
            }
        }
    }
}

fn configure_connection(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{FileConnectionSource, SharedConnectionSource};
    use crate::db::ConnectionSource;

    #[test]
    fn file_source_hands_out_independent_configured_connections() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConnectionSource::new(dir.path().join("source.db"));

        {
            let conn = source.acquire().unwrap();
            conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
                .unwrap();
        }

        let first = source.acquire().unwrap();
        let second = source.acquire().unwrap();
        let foreign_keys: i64 = first
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn shared_source_releases_lock_when_handle_drops() {
        let source = SharedConnectionSource::open_in_memory().unwrap();
        drop(source.acquire().unwrap());
        let again = source.acquire().unwrap();
        let one: i64 = again.query_row("SELECT 1;", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}
