//! Value and identity model shared by every session component.
//!
//! # Responsibility
//! - Define the column value representation used for mapping and snapshots.
//! - Define the identity key that addresses one row within a session.
//!
//! # Invariants
//! - Identity keys have value semantics (structural `Eq` + `Hash`).

pub mod key;
pub mod value;
