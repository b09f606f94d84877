//! SQLite connection sources used by sessions.
//!
//! # Responsibility
//! - Define the connection acquisition seam consumed by `Session`.
//! - Open and configure SQLite connections with the pragmas core relies on.
//!
//! # Invariants
//! - A `PooledConnection` is released when dropped, on success and on error.
//! - Connection sources are safe to share across threads; sessions are not.
//!
//! # See also
//! - `session::Session` for the one-statement-per-acquisition usage.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::MutexGuard;

mod source;

pub use source::{FileConnectionSource, SharedConnectionSource};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The shared connection lock was poisoned by a panicking holder.
    Poisoned,
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Poisoned => write!(f, "shared connection lock is poisoned"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Poisoned => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Capability to acquire a connection on demand.
///
/// Implementations must allow concurrent acquisition from several threads.
pub trait ConnectionSource: Send + Sync {
    fn acquire(&self) -> DbResult<PooledConnection<'_>>;
}

/// Scoped connection handle; dropping it releases the connection.
pub enum PooledConnection<'a> {
    /// Dedicated connection, closed on drop.
    Owned(Connection),
    /// Shared connection, unlocked on drop.
    Shared(MutexGuard<'a, Connection>),
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Owned(conn) => conn,
            Self::Shared(guard) => guard,
        }
    }
}
