//! Session orchestration: identity map, change tracking and flush.
//!
//! # Responsibility
//! - Own the session-scoped cache of loaded entities and their snapshots.
//! - Drive the row mapper and change tracker for find/close.
//!
//! # Invariants
//! - The cache is first-level only; nothing is shared between sessions
//!   except the connection source and the entity registry.

pub mod change_tracker;
mod context;
pub mod error;
mod factory;

pub use context::{FlushReport, Session, SessionState};
pub use factory::SessionFactory;
