#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use snapsession_core::{
    ConnectionSource, Entity, EntityConfig, EntityRegistry, Field, FieldType, FromValue,
    SessionFactory, SharedConnectionSource, Value,
};
use std::sync::Arc;

pub const SCHEMA_SQL: &str = "
    CREATE TABLE products (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        price REAL NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE customers (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        nickname TEXT
    );
    CREATE TABLE product_updates (product_id INTEGER NOT NULL);
    CREATE TRIGGER product_update_audit AFTER UPDATE ON products
    BEGIN
        INSERT INTO product_updates (product_id) VALUES (OLD.id);
    END;
    INSERT INTO products (id, name, price, created_at) VALUES
        (1, 'Gadget', 4.5, '2023-12-31 23:59:59'),
        (2, 'Widget', 9.99, '2024-01-15 10:30:00');
    INSERT INTO customers (id, email, nickname) VALUES
        ('c-1', 'ada@example.com', 'ada'),
        ('c-2', 'bob@example.com', NULL);
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub price: f64,
    pub created_at: NaiveDateTime,
}

impl Entity for Product {
    const KIND: &'static str = "Product";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::new("id", FieldType::Integer, |p| p.id.into(), |p, v| {
                p.id = FromValue::from_value(v)?;
                Ok(())
            }),
            Field::<Self>::new("name", FieldType::Text, |p| p.name.clone().into(), |p, v| {
                p.name = FromValue::from_value(v)?;
                Ok(())
            }),
            Field::<Self>::new("price", FieldType::Real, |p| p.price.into(), |p, v| {
                p.price = FromValue::from_value(v)?;
                Ok(())
            }),
            Field::<Self>::new(
                "createdAt",
                FieldType::Timestamp,
                |p| p.created_at.into(),
                |p, v| {
                    p.created_at = FromValue::from_value(v)?;
                    Ok(())
                },
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub nickname: Option<String>,
}

impl Entity for Customer {
    const KIND: &'static str = "Customer";

    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::<Self>::new("id", FieldType::Text, |c| c.id.clone().into(), |c, v| {
                c.id = FromValue::from_value(v)?;
                Ok(())
            }),
            Field::<Self>::new("email", FieldType::Text, |c| c.email.clone().into(), |c, v| {
                c.email = FromValue::from_value(v)?;
                Ok(())
            }),
            Field::<Self>::new("nickname", FieldType::Text, |c| c.nickname.clone().into(), |c, v| {
                c.nickname = FromValue::from_value(v)?;
                Ok(())
            })
            .nullable(),
        ]
    }
}

pub fn registry() -> EntityRegistry {
    EntityRegistry::new()
        .with::<Product>(EntityConfig::new("products").column("createdAt", "created_at"))
        .and_then(|registry| registry.with::<Customer>(EntityConfig::new("customers")))
        .expect("test entities should register")
}

/// Seeded in-memory database plus a factory over it.
///
/// The returned source handle lets tests inspect or tamper with storage
/// behind the session's back.
pub fn seeded_factory() -> (Arc<SharedConnectionSource>, SessionFactory) {
    seeded_factory_with(registry())
}

pub fn seeded_factory_with(
    registry: EntityRegistry,
) -> (Arc<SharedConnectionSource>, SessionFactory) {
    let source = Arc::new(SharedConnectionSource::open_in_memory().unwrap());
    source.acquire().unwrap().execute_batch(SCHEMA_SQL).unwrap();
    let shared: Arc<dyn ConnectionSource> = source.clone();
    let factory = SessionFactory::from_shared(shared, Arc::new(registry));
    (source, factory)
}

pub fn product_update_count(source: &SharedConnectionSource) -> i64 {
    source
        .acquire()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM product_updates;", [], |row| row.get(0))
        .unwrap()
}

pub fn stored_product(source: &SharedConnectionSource, id: i64) -> (String, f64, String) {
    source
        .acquire()
        .unwrap()
        .query_row(
            "SELECT name, price, created_at FROM products WHERE id = ?1;",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap()
}

pub fn widget_created_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .and_then(|date| date.and_hms_opt(10, 30, 0))
        .unwrap()
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}
