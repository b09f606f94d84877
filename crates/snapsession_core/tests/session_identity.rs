mod common;

use common::{registry, seeded_factory, widget_created_at, Customer, Product, SCHEMA_SQL};
use snapsession_core::{
    ConnectionSource, EntityConfig, EntityKey, EntityRegistry, FileConnectionSource,
    MappingError, SessionError, SessionFactory, SessionState,
};
use std::rc::Rc;
use std::thread;

#[test]
fn find_twice_returns_the_same_instance() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();

    let first = session.find::<Product>(2).unwrap();
    let second = session.find::<Product>(2_i64).unwrap();

    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(session.cached_len(), 1);
    assert_eq!(session.snapshot_len(), 1);
}

#[test]
fn loaded_instance_carries_row_values_and_converted_timestamp() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();

    let widget = session.find::<Product>(2).unwrap();
    let widget = widget.borrow();
    assert_eq!(widget.id, 2);
    assert_eq!(widget.name, "Widget");
    assert_eq!(widget.price, 9.99);
    assert_eq!(widget.created_at, widget_created_at());
}

#[test]
fn separate_sessions_hand_out_equal_but_distinct_instances() {
    let (_source, factory) = seeded_factory();
    let mut session_a = factory.create_session();
    let mut session_b = factory.create_session();

    let from_a = session_a.find::<Product>(2).unwrap();
    let from_b = session_b.find::<Product>(2).unwrap();

    assert!(!Rc::ptr_eq(&from_a, &from_b));
    assert_eq!(*from_a.borrow(), *from_b.borrow());
    assert_ne!(session_a.id(), session_b.id());
}

#[test]
fn mutation_is_visible_through_every_handle_in_one_session() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();

    let first = session.find::<Product>(1).unwrap();
    first.borrow_mut().price = 5.0;

    let again = session.find::<Product>(1).unwrap();
    assert_eq!(again.borrow().price, 5.0);
}

#[test]
fn missing_row_is_not_found_and_not_cached() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();
    session.find::<Product>(1).unwrap();

    let err = session.find::<Product>(404).unwrap_err();

    assert!(matches!(err, SessionError::NotFound(ref key) if *key == EntityKey::of::<Product>(404)));
    assert!(!session.contains::<Product>(404));
    assert_eq!(session.cached_len(), 1);
    assert_eq!(session.snapshot_len(), 1);
}

#[test]
fn kinds_and_id_types_form_separate_keys() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();

    let customer = session.find::<Customer>("c-2").unwrap();
    assert_eq!(customer.borrow().nickname, None);
    session.find::<Product>(1).unwrap();

    assert!(session.contains::<Customer>("c-2"));
    assert!(!session.contains::<Customer>(1));
    assert!(!session.contains::<Product>("c-2"));
    assert_eq!(session.cached_len(), 2);
}

#[test]
fn id_of_the_wrong_storage_class_is_rejected_before_loading() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();
    let widget = session.find::<Product>(2).unwrap();

    let err = session.find::<Product>("2").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Mapping(MappingError::TypeMismatch { kind: "Product", field: "id", .. })
    ));
    let err = session.find::<Customer>(1).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Mapping(MappingError::TypeMismatch { kind: "Customer", field: "id", .. })
    ));

    assert_eq!(session.cached_len(), 1);
    assert_eq!(session.snapshot_len(), 1);
    assert!(Rc::ptr_eq(&widget, &session.find::<Product>(2).unwrap()));
}

#[test]
fn column_value_of_the_wrong_type_is_a_mapping_error() {
    let (source, factory) = seeded_factory();
    source
        .acquire()
        .unwrap()
        .execute("UPDATE products SET price = 'cheap' WHERE id = 2;", [])
        .unwrap();
    let mut session = factory.create_session();
    session.find::<Product>(1).unwrap();

    let err = session.find::<Product>(2).unwrap_err();
    match err {
        SessionError::Mapping(MappingError::TypeMismatch { kind, field, .. }) => {
            assert_eq!(kind, "Product");
            assert_eq!(field, "price");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!session.contains::<Product>(2));
    assert_eq!(session.cached_len(), 1);
    assert_eq!(session.snapshot_len(), 1);
}

#[test]
fn unreachable_database_is_a_connection_failure_on_find() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileConnectionSource::new(dir.path().join("missing").join("shop.db"));
    let mut session = SessionFactory::new(source, registry()).create_session();

    let err = session.find::<Product>(2).unwrap_err();
    assert!(matches!(err, SessionError::Connection(_)));
    assert_eq!(session.cached_len(), 0);
    assert_eq!(session.snapshot_len(), 0);
    assert!(session.is_open());
}

#[test]
fn database_lost_before_close_is_a_connection_failure_on_flush() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    let source = FileConnectionSource::new(data_dir.join("shop.db"));
    source.acquire().unwrap().execute_batch(SCHEMA_SQL).unwrap();
    let mut session = SessionFactory::new(source, registry()).create_session();

    let widget = session.find::<Product>(2).unwrap();
    widget.borrow_mut().price = 1.0;
    std::fs::remove_dir_all(&data_dir).unwrap();

    let err = session.close().unwrap_err();
    let failures = err.flush_failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, EntityKey::of::<Product>(2));
    assert!(matches!(failures[0].1, SessionError::Connection(_)));
    assert_eq!(session.cached_len(), 0);
    assert_eq!(session.snapshot_len(), 0);
}

#[test]
fn unregistered_kind_is_a_mapping_error() {
    let (_source, factory) = common::seeded_factory_with(
        EntityRegistry::new()
            .with::<Product>(EntityConfig::new("products").column("createdAt", "created_at"))
            .unwrap(),
    );
    let mut session = factory.create_session();

    let err = session.find::<Customer>("c-1").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Mapping(MappingError::UnregisteredKind("Customer"))
    ));
    assert_eq!(session.cached_len(), 0);
}

#[test]
fn column_absent_from_row_is_a_mapping_error() {
    let (_source, factory) = common::seeded_factory_with(
        EntityRegistry::new()
            .with::<Product>(EntityConfig::new("products").column("createdAt", "created_on"))
            .unwrap(),
    );
    let mut session = factory.create_session();

    let err = session.find::<Product>(2).unwrap_err();
    match err {
        SessionError::Mapping(MappingError::MissingColumn { table, column }) => {
            assert_eq!(table, "products");
            assert_eq!(column, "created_on");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.cached_len(), 0);
    assert_eq!(session.snapshot_len(), 0);
}

#[test]
fn closed_session_rejects_find_and_second_close() {
    let (_source, factory) = seeded_factory();
    let mut session = factory.create_session();
    session.find::<Product>(2).unwrap();

    session.close().unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.find::<Product>(2).unwrap_err(),
        SessionError::Closed
    ));
    assert!(matches!(session.close().unwrap_err(), SessionError::Closed));
    assert_eq!(session.cached_len(), 0);
}

#[test]
fn file_source_serves_sessions_on_several_threads() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileConnectionSource::new(dir.path().join("shop.db"));
    source.acquire().unwrap().execute_batch(SCHEMA_SQL).unwrap();
    let factory = SessionFactory::new(source, registry());

    let names: Vec<String> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let factory = &factory;
                scope.spawn(move || {
                    let mut session = factory.create_session();
                    let widget = session.find::<Product>(2).unwrap();
                    let name = widget.borrow().name.clone();
                    session.close().unwrap();
                    name
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_eq!(names, vec!["Widget"; 4]);
}
