//! CLI demo of session identity semantics.
//!
//! # Responsibility
//! - Wire a SQLite file to a `SessionFactory`.
//! - Show that one session hands out one instance per id while two sessions
//!   hand out equal but distinct instances.
//!
//! Usage: `snapsession_cli <db-path> [product-id]`. The database must contain
//! a `products (id, name, price, created_at)` table.

use snapsession_core::{
    default_log_level, init_logging, Entity, EntityConfig, EntityRegistry, Field, FieldType,
    FileConnectionSource, FromValue, SessionFactory,
};
use std::error::Error;
use std::process::ExitCode;
use std::rc::Rc;

const DEFAULT_PRODUCT_ID: i64 = 2;

#[derive(Debug, Clone, Default, PartialEq)]
struct Product {
    id: i64,
    name: String,
    price: f64,
    created_at: chrono::NaiveDateTime,
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

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .ok_or("usage: snapsession_cli <db-path> [product-id]")?;
    let product_id = match args.next() {
        Some(raw) => raw.parse::<i64>()?,
        None => DEFAULT_PRODUCT_ID,
    };

    if let Ok(log_dir) = std::env::var("SNAPSESSION_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let registry = EntityRegistry::new()
        .with::<Product>(EntityConfig::new("products").column("createdAt", "created_at"))?;
    let factory = SessionFactory::new(FileConnectionSource::new(&db_path), registry);

    let mut first_session = factory.create_session();
    let first = first_session.find::<Product>(product_id)?;
    let second = first_session.find::<Product>(product_id)?;
    println!("same_session_identical={}", Rc::ptr_eq(&first, &second));
    first_session.close()?;

    let mut second_session = factory.create_session();
    let third = second_session.find::<Product>(product_id)?;
    println!("cross_session_identical={}", Rc::ptr_eq(&third, &second));
    println!("cross_session_equal={}", *third.borrow() == *second.borrow());
    println!("product={:?}", third.borrow());
    second_session.close()?;

    Ok(())
}
