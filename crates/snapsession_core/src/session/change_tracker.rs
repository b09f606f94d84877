//! Snapshot capture and dirty checking.
//!
//! # Invariants
//! - Snapshot positions follow descriptor field order (sorted by field name).
//! - Comparison is plain value equality; `Null` against non-null is a change.

use crate::mapping::descriptor::EntityDescriptor;
use crate::mapping::entity::Entity;
use crate::model::value::Value;

/// Field values captured when an entity was loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Vec<Value>,
}

impl Snapshot {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Reads every field of `instance` in descriptor order.
pub fn current_values<T: Entity>(descriptor: &EntityDescriptor<T>, instance: &T) -> Vec<Value> {
    descriptor
        .fields()
        .iter()
        .map(|field| (field.field.get)(instance))
        .collect()
}

pub fn snapshot<T: Entity>(descriptor: &EntityDescriptor<T>, instance: &T) -> Snapshot {
    Snapshot::new(current_values(descriptor, instance))
}

/// Returns whether any field of `instance` differs from `snapshot`.
pub fn is_dirty<T: Entity>(
    descriptor: &EntityDescriptor<T>,
    instance: &T,
    snapshot: &Snapshot,
) -> bool {
    values_differ(&current_values(descriptor, instance), snapshot.values())
}

/// Positional comparison of two value sequences, stopping at the first
/// mismatch. Sequences of different length always differ.
pub fn values_differ(current: &[Value], snapshot: &[Value]) -> bool {
    current.len() != snapshot.len()
        || current
            .iter()
            .zip(snapshot)
            .any(|(value, original)| value != original)
}
