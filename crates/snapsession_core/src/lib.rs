//! Session-scoped persistence context over SQLite.
//! Loads rows into entities through an identity map and writes back only the
//! entities whose fields changed since they were loaded.

pub mod db;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod session;

pub use db::{
    ConnectionSource, DbError, DbResult, FileConnectionSource, PooledConnection,
    SharedConnectionSource,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use mapping::descriptor::{EntityConfig, EntityDescriptor, EntityRegistry, MappingError};
pub use mapping::entity::{Entity, Field};
pub use model::key::EntityKey;
pub use model::value::{EntityId, FieldType, FromValue, Value, ValueError};
pub use session::error::{SessionError, SessionResult};
pub use session::{FlushReport, Session, SessionFactory, SessionState};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
