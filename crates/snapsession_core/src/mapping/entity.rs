//! Entity contract consumed by the session.
//!
//! # Responsibility
//! - Describe how a Rust type exposes its persisted fields.
//! - Replace runtime field introspection with an explicit accessor table.
//!
//! # Invariants
//! - Field names are stable and unique within one entity type.
//! - `Entity::default()` is the zero-valued instance filled by the row mapper.

use crate::model::value::{FieldType, Value, ValueError};

/// Reads the current value of one field.
pub type FieldGetter<T> = fn(&T) -> Value;

/// Assigns a value to one field, rejecting values of the wrong shape.
pub type FieldSetter<T> = fn(&mut T, Value) -> Result<(), ValueError>;

/// A persistable entity kind.
///
/// Table and column names are not part of this trait; they are supplied as an
/// `EntityConfig` when the kind is registered.
pub trait Entity: Default + 'static {
    /// Kind name used in identity keys and diagnostics.
    const KIND: &'static str;

    /// Declared persisted fields, in any order.
    fn fields() -> Vec<Field<Self>>;
}

/// Accessor table entry for one persisted field of `T`.
pub struct Field<T> {
    pub name: &'static str,
    pub ty: FieldType,
    /// Whether `Value::Null` is a legal current value for the field.
    pub nullable: bool,
    pub get: FieldGetter<T>,
    pub set: FieldSetter<T>,
}

impl<T> Field<T> {
    pub fn new(
        name: &'static str,
        ty: FieldType,
        get: FieldGetter<T>,
        set: FieldSetter<T>,
    ) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            get,
            set,
        }
    }

    /// Marks the field as accepting `NULL`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            ty: self.ty,
            nullable: self.nullable,
            get: self.get,
            set: self.set,
        }
    }
}

impl<T> std::fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("nullable", &self.nullable)
            .finish()
    }
}
