//! Entity registration and table/column metadata lookup.
//!
//! # Responsibility
//! - Validate `EntityConfig` against an entity's declared fields once.
//! - Resolve table and column names for registered kinds.
//!
//! # Invariants
//! - Descriptor fields are sorted lexicographically by field name.
//! - Exactly one field resolves to the `id` column.
//! - Table and column names are plain SQL identifiers, so they can be
//!   interpolated into statements.

use crate::mapping::entity::{Entity, Field};
use crate::model::value::{EntityId, FieldType};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Column that holds the primary key of every mapped table.
pub const ID_COLUMN: &str = "id";

static SQL_IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Table/column metadata supplied when registering an entity kind.
///
/// Serialized shape: `{ "table": "products", "columns": { "created_at": "created_on" } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub table: String,
    /// Field name -> column name overrides. Unlisted fields use their own name.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
}

impl EntityConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Overrides the column name for `field`.
    pub fn column(mut self, field: impl Into<String>, column: impl Into<String>) -> Self {
        self.columns.insert(field.into(), column.into());
        self
    }
}

/// Missing or inconsistent mapping metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    UnregisteredKind(&'static str),
    MissingTable(&'static str),
    InvalidIdentifier(String),
    UnknownField {
        kind: &'static str,
        field: String,
    },
    DuplicateField {
        kind: &'static str,
        field: &'static str,
    },
    DuplicateColumn {
        kind: &'static str,
        column: String,
    },
    MissingIdField(&'static str),
    KindConflict(&'static str),
    MissingColumn {
        table: String,
        column: String,
    },
    TypeMismatch {
        kind: &'static str,
        field: &'static str,
        message: String,
    },
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnregisteredKind(kind) => write!(f, "entity kind `{kind}` is not registered"),
            Self::MissingTable(kind) => write!(f, "entity kind `{kind}` has no table name"),
            Self::InvalidIdentifier(name) => {
                write!(f, "`{name}` is not a valid SQL identifier")
            }
            Self::UnknownField { kind, field } => {
                write!(f, "column override names unknown field `{kind}.{field}`")
            }
            Self::DuplicateField { kind, field } => {
                write!(f, "field `{kind}.{field}` is declared more than once")
            }
            Self::DuplicateColumn { kind, column } => {
                write!(f, "column `{column}` is mapped twice in `{kind}`")
            }
            Self::MissingIdField(kind) => {
                write!(f, "entity kind `{kind}` has no field mapped to column `{ID_COLUMN}`")
            }
            Self::KindConflict(kind) => {
                write!(f, "entity kind `{kind}` is already bound to another type")
            }
            Self::MissingColumn { table, column } => {
                write!(f, "column `{table}.{column}` is missing from the result row")
            }
            Self::TypeMismatch {
                kind,
                field,
                message,
            } => write!(f, "cannot assign `{kind}.{field}`: {message}"),
        }
    }
}

impl Error for MappingError {}

/// One field of a registered entity with its resolved column name.
pub struct FieldDescriptor<T> {
    pub field: Field<T>,
    pub column: String,
}

/// Resolved mapping metadata for entity type `T`.
pub struct EntityDescriptor<T> {
    table: String,
    fields: Vec<FieldDescriptor<T>>,
    id_index: usize,
}

impl<T: Entity> EntityDescriptor<T> {
    /// Builds and validates the descriptor for `T` from `config`.
    pub fn build(config: EntityConfig) -> Result<Self, MappingError> {
        let table = config.table.trim().to_string();
        if table.is_empty() {
            return Err(MappingError::MissingTable(T::KIND));
        }
        ensure_identifier(&table)?;

        let mut declared = T::fields();
        declared.sort_by(|left, right| left.name.cmp(right.name));
        if let Some(pair) = declared.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(MappingError::DuplicateField {
                kind: T::KIND,
                field: pair[0].name,
            });
        }

        if let Some(unknown) = config
            .columns
            .keys()
            .find(|name| !declared.iter().any(|field| field.name == name.as_str()))
        {
            return Err(MappingError::UnknownField {
                kind: T::KIND,
                field: unknown.clone(),
            });
        }

        let mut seen_columns = HashSet::new();
        let mut fields = Vec::with_capacity(declared.len());
        for field in declared {
            let column = config
                .columns
                .get(field.name)
                .cloned()
                .unwrap_or_else(|| field.name.to_string());
            ensure_identifier(&column)?;
            if !seen_columns.insert(column.clone()) {
                return Err(MappingError::DuplicateColumn {
                    kind: T::KIND,
                    column,
                });
            }
            fields.push(FieldDescriptor { field, column });
        }

        let id_index = fields
            .iter()
            .position(|descriptor| descriptor.column == ID_COLUMN)
            .ok_or(MappingError::MissingIdField(T::KIND))?;

        Ok(Self {
            table,
            fields,
            id_index,
        })
    }

    pub fn kind(&self) -> &'static str {
        T::KIND
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fields in lexicographic field-name order.
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Position of the identifier field within `fields()`.
    pub fn id_index(&self) -> usize {
        self.id_index
    }

    /// Rejects an identifier whose storage class differs from the id field.
    ///
    /// SQLite column affinity would match `'2'` against an INTEGER key, so
    /// without this check two keys could load the same row.
    pub fn check_id(&self, id: &EntityId) -> Result<(), MappingError> {
        let field = &self.fields[self.id_index].field;
        match (field.ty, id) {
            (FieldType::Integer, EntityId::Integer(_)) | (FieldType::Text, EntityId::Text(_)) => {
                Ok(())
            }
            (ty, _) => Err(MappingError::TypeMismatch {
                kind: T::KIND,
                field: field.name,
                message: format!("identifier `{id}` does not fit a {ty:?} key"),
            }),
        }
    }

    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|descriptor| descriptor.field.name == field)
            .map(|descriptor| descriptor.column.as_str())
    }
}

fn ensure_identifier(name: &str) -> Result<(), MappingError> {
    if SQL_IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(MappingError::InvalidIdentifier(name.to_string()))
    }
}

/// Registry of entity descriptors, built once and shared by every session.
#[derive(Default)]
pub struct EntityRegistry {
    descriptors: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    kinds: HashMap<&'static str, TypeId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers entity type `T` with its table/column metadata.
    ///
    /// Re-registering the same type replaces its descriptor.
    ///
    /// # Errors
    /// - Returns `MappingError` when `config` does not fit `T::fields()`.
    /// - Returns `MappingError::KindConflict` when another type already uses
    ///   `T::KIND`.
    pub fn register<T: Entity>(&mut self, config: EntityConfig) -> Result<(), MappingError> {
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.kinds.get(T::KIND) {
            if *existing != type_id {
                return Err(MappingError::KindConflict(T::KIND));
            }
        }

        let descriptor = EntityDescriptor::<T>::build(config)?;
        self.kinds.insert(T::KIND, type_id);
        self.descriptors.insert(type_id, Arc::new(descriptor));
        Ok(())
    }

    /// Builder-style variant of `register`.
    pub fn with<T: Entity>(mut self, config: EntityConfig) -> Result<Self, MappingError> {
        self.register::<T>(config)?;
        Ok(self)
    }

    /// Returns the descriptor registered for `T`.
    pub fn descriptor<T: Entity>(&self) -> Result<Arc<EntityDescriptor<T>>, MappingError> {
        self.descriptors
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|erased| erased.downcast::<EntityDescriptor<T>>().ok())
            .ok_or(MappingError::UnregisteredKind(T::KIND))
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.descriptors.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
