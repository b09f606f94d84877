//! Row <-> entity conversion and statement text.
//!
//! # Responsibility
//! - Build entity instances from lookup result rows.
//! - Render an instance's current field values as an update set-clause.
//!
//! # Invariants
//! - Fields are visited in descriptor order (sorted by field name), the same
//!   order snapshots use.
//! - The identifier field is never part of the set-clause; it only filters.
//! - Set-clause values are rendered as SQL literals, not bound parameters.
//!   Text is quote-escaped, but values are otherwise trusted.

use crate::mapping::descriptor::{EntityDescriptor, FieldDescriptor, MappingError, ID_COLUMN};
use crate::mapping::entity::Entity;
use crate::model::value::{EntityId, Value, ValueError};
use crate::session::error::{SessionError, SessionResult};
use rusqlite::Row;

const TIMESTAMP_LITERAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Update statement ready for execution: literal set-clause plus bound id.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub sql: String,
    pub id: EntityId,
}

/// Lookup statement for one row of `descriptor`'s table.
pub fn select_sql<T: Entity>(descriptor: &EntityDescriptor<T>) -> String {
    format!(
        "SELECT * FROM {} WHERE {ID_COLUMN} = ?1",
        descriptor.table()
    )
}

/// Builds a new `T` from `row`, assigning every declared field.
///
/// # Errors
/// - `MappingError::MissingColumn` when a resolved column is absent from `row`.
/// - `MappingError::TypeMismatch` when a column value does not fit its field.
pub fn materialize<T: Entity>(descriptor: &EntityDescriptor<T>, row: &Row<'_>) -> SessionResult<T> {
    let mut instance = T::default();

    for field in descriptor.fields() {
        let raw = row
            .get_ref(field.column.as_str())
            .map_err(|err| match err {
                rusqlite::Error::InvalidColumnName(_) => {
                    SessionError::Mapping(MappingError::MissingColumn {
                        table: descriptor.table().to_string(),
                        column: field.column.clone(),
                    })
                }
                other => SessionError::from(other),
            })?;
        let value = Value::from_column(raw, field.field.ty)
            .map_err(|err| type_mismatch::<T>(field, err))?;
        (field.field.set)(&mut instance, value).map_err(|err| type_mismatch::<T>(field, err))?;
    }

    Ok(instance)
}

/// Renders `(column, literal)` pairs for every non-identifier field.
///
/// # Errors
/// - `SessionError::Serialization` when a non-nullable field is currently
///   `NULL`, or a real value is not finite.
pub fn column_assignments<T: Entity>(
    descriptor: &EntityDescriptor<T>,
    instance: &T,
) -> SessionResult<Vec<(String, String)>> {
    descriptor
        .fields()
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != descriptor.id_index())
        .map(|(_, field)| -> SessionResult<(String, String)> {
            let value = (field.field.get)(instance);
            let literal = render_literal(&value, field.field.nullable).map_err(|reason| {
                SessionError::Serialization {
                    field: format!("{}.{}", T::KIND, field.field.name),
                    reason,
                }
            })?;
            Ok((field.column.clone(), literal))
        })
        .collect()
}

/// Builds the update statement writing all of `instance`'s fields back to
/// the row identified by `id`.
pub fn update_statement<T: Entity>(
    descriptor: &EntityDescriptor<T>,
    instance: &T,
    id: &EntityId,
) -> SessionResult<UpdateStatement> {
    let set_clause = column_assignments(descriptor, instance)?
        .into_iter()
        .map(|(column, literal)| format!("{column} = {literal}"))
        .collect::<Vec<_>>()
        .join(", ");

    if set_clause.is_empty() {
        return Err(SessionError::Serialization {
            field: T::KIND.to_string(),
            reason: "entity has no columns besides the identifier".to_string(),
        });
    }

    Ok(UpdateStatement {
        sql: format!(
            "UPDATE {} SET {set_clause} WHERE {ID_COLUMN} = ?1",
            descriptor.table()
        ),
        id: id.clone(),
    })
}

/// Renders one value as a SQL literal.
pub fn render_literal(value: &Value, nullable: bool) -> Result<String, String> {
    match value {
        Value::Null if nullable => Ok("NULL".to_string()),
        Value::Null => Err("value is null but the field is not nullable".to_string()),
        Value::Integer(inner) => Ok(inner.to_string()),
        Value::Real(inner) if inner.is_finite() => Ok(format!("{inner:?}")),
        Value::Real(inner) => Err(format!("non-finite real `{inner}` has no SQL literal")),
        Value::Text(inner) => Ok(quote(inner)),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|byte| format!("{byte:02X}")).collect();
            Ok(format!("X'{hex}'"))
        }
        Value::Timestamp(inner) => Ok(quote(&inner.format(TIMESTAMP_LITERAL_FORMAT).to_string())),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn type_mismatch<T: Entity>(field: &FieldDescriptor<T>, err: ValueError) -> SessionError {
    SessionError::Mapping(MappingError::TypeMismatch {
        kind: T::KIND,
        field: field.field.name,
        message: err.to_string(),
    })
}
