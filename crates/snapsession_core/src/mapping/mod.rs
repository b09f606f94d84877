//! Entity mapping: field tables, table/column metadata and row conversion.
//!
//! # Responsibility
//! - Replace annotation/reflection metadata with explicit registration.
//! - Keep SQL statement text inside the mapping boundary.
//!
//! # Invariants
//! - Field order is lexicographic by field name everywhere it matters.

pub mod descriptor;
pub mod entity;
pub mod row_mapper;
