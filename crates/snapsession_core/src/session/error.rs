//! Session error taxonomy.

use crate::db::DbError;
use crate::mapping::descriptor::MappingError;
use crate::model::key::EntityKey;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by `Session` operations. Nothing is retried internally.
#[derive(Debug)]
pub enum SessionError {
    /// Lookup by id returned no row.
    NotFound(EntityKey),
    /// Missing or inconsistent mapping metadata.
    Mapping(MappingError),
    /// A flush update matched zero rows.
    UpdateConflict(EntityKey),
    /// Acquiring or using a connection failed.
    Connection(DbError),
    /// A field value could not be rendered into an update statement.
    Serialization { field: String, reason: String },
    /// The session was already closed.
    Closed,
    /// `close()` attempted every dirty entry and at least one failed.
    FlushIncomplete {
        updated: usize,
        failures: Vec<(EntityKey, SessionError)>,
    },
}

impl SessionError {
    /// Per-entity failures carried by `FlushIncomplete`; empty otherwise.
    pub fn flush_failures(&self) -> &[(EntityKey, SessionError)] {
        match self {
            Self::FlushIncomplete { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "entity not found: {key}"),
            Self::Mapping(err) => write!(f, "{err}"),
            Self::UpdateConflict(key) => {
                write!(f, "update of {key} affected no rows")
            }
            Self::Connection(err) => write!(f, "connection failure: {err}"),
            Self::Serialization { field, reason } => {
                write!(f, "cannot serialize `{field}`: {reason}")
            }
            Self::Closed => write!(f, "session is closed"),
            Self::FlushIncomplete { updated, failures } => {
                write!(
                    f,
                    "flush incomplete: {updated} updated, {} failed",
                    failures.len()
                )?;
                for (key, err) in failures {
                    write!(f, "; {key}: {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Mapping(err) => Some(err),
            Self::Connection(err) => Some(err),
            Self::FlushIncomplete { failures, .. } => failures
                .first()
                .map(|(_, err)| err as &(dyn Error + 'static)),
            Self::NotFound(_)
            | Self::UpdateConflict(_)
            | Self::Serialization { .. }
            | Self::Closed => None,
        }
    }
}

impl From<MappingError> for SessionError {
    fn from(value: MappingError) -> Self {
        Self::Mapping(value)
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Connection(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Connection(DbError::Sqlite(value))
    }
}
