//! Identity key addressing one conceptual row.

use crate::mapping::entity::Entity;
use crate::model::value::EntityId;
use std::fmt::{Display, Formatter};

/// Composite `(entity kind, primary key)` used by the session identity map.
///
/// Equality, hashing and ordering are structural over both components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    kind: &'static str,
    id: EntityId,
}

impl EntityKey {
    pub fn new(kind: &'static str, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key for entity type `T` using its registered kind name.
    pub fn of<T: Entity>(id: impl Into<EntityId>) -> Self {
        Self::new(T::KIND, id)
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}
