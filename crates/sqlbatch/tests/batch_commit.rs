//! End-to-end commit behavior against a recording connection.

use asupersync::runtime::RuntimeBuilder;
use sqlbatch::prelude::*;
use sqlbatch_core::{MetadataErrorKind, QueryErrorKind, ValidationErrorKind};
use sqlbatch_testing::{
    Call, Fault, MockConnection, NOW, Order, Tag, expect_err, fixed_clock, registry, share,
    unwrap_outcome,
};
use std::sync::Arc;

fn processor(conn: MockConnection) -> BatchProcessor<MockConnection> {
    BatchProcessor::new(conn, registry()).with_clock(fixed_clock)
}

#[test]
fn empty_commit_makes_no_database_calls() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert!(summary.is_empty());
    assert_eq!(summary, CommitSummary::default());
    assert!(processor.connection().calls().is_empty());
}

#[test]
fn new_and_modified_orders_flush_as_two_buckets() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let (_, fresh) = share(Order::new("NEW", 10));
    let mut paid = Order::from_row(5, "NEW", 10);
    paid.set_status("PAID");
    let (_, paid) = share(paid);

    processor.persist(fresh);
    processor.persist(paid);
    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.statements, 2);

    let executed = processor.connection().executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0].0,
        "INSERT INTO orders (status, total, priority, notes, created_at, updated_at) \
         VALUES (:p0, :p1, :p2, :p3, :p4, :p5);"
    );
    assert_eq!(
        executed[0].1,
        vec![
            Value::from("NEW"),
            Value::BigInt(10),
            Value::Int(1),
            Value::Null,
            Value::Null,
            Value::Null,
        ]
    );
    assert_eq!(executed[1].0, "UPDATE orders SET status=:p0 WHERE id=:p1;");
    assert_eq!(executed[1].1, vec![Value::from("PAID"), Value::BigInt(5)]);

    assert_eq!(
        processor.connection().calls().iter().filter(|c| **c == Call::Commit).count(),
        2
    );
}

#[test]
fn sequence_key_is_drawn_inline() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut registry = MappingRegistry::new();
    registry.insert(
        Order::ENTITY_TYPE,
        <Order as Mapped>::table_map().sequence("orders_id_seq"),
    );
    let mut processor = BatchProcessor::new(MockConnection::new(Dialect::Postgres), Arc::new(registry));

    let (_, fresh) = share(Order::new("NEW", 10));
    processor.persist(fresh);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let executed = processor.connection().executed();
    assert_eq!(
        executed[0].0,
        "INSERT INTO orders (id, status, total, priority, notes, created_at, updated_at) \
         VALUES ((SELECT nextval('orders_id_seq')), :p0, :p1, :p2, :p3, :p4, :p5);"
    );
    assert_eq!(executed[0].1.len(), 6);
    assert_eq!(executed[0].1[0], Value::from("NEW"));
}

#[test]
fn sequence_key_omitted_without_sequence_support() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut registry = MappingRegistry::new();
    registry.insert(
        Tag::ENTITY_TYPE,
        <Tag as Mapped>::table_map().sequence("tags_id_seq"),
    );
    let mut processor = BatchProcessor::new(MockConnection::new(Dialect::Sqlite), Arc::new(registry));

    let (_, tag) = share(Tag::new("rust"));
    processor.persist(tag);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let executed = processor.connection().executed();
    assert_eq!(executed[0].0, "INSERT INTO tags (label) VALUES (:p0);");
}

#[test]
fn unmodified_entity_staged_twice_writes_nothing() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let (_, loaded) = share(Order::from_row(5, "NEW", 10));
    processor.persist(loaded.clone());
    processor.persist(loaded);
    assert!(processor.is_empty());

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));
    assert_eq!(summary.statements, 0);
    assert!(processor.connection().calls().is_empty());
}

#[test]
fn modified_entity_staged_twice_writes_twice() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let mut paid = Order::from_row(5, "NEW", 10);
    paid.set_status("PAID");
    let (_, paid) = share(paid);
    processor.persist(paid.clone());
    processor.persist(paid);
    assert_eq!(processor.pending_counts().updates, 2);

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.statements, 1);

    let executed = processor.connection().executed();
    assert_eq!(
        executed[0].0,
        "UPDATE orders SET status=:p0 WHERE id=:p1;UPDATE orders SET status=:p2 WHERE id=:p3;"
    );
    assert_eq!(
        executed[0].1,
        vec![
            Value::from("PAID"),
            Value::BigInt(5),
            Value::from("PAID"),
            Value::BigInt(5),
        ]
    );
}

#[test]
fn update_locates_row_by_loaded_key() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let mut order = Order::from_row(5, "NEW", 10);
    order.set_total(12);
    order.id = Some(50);
    order.dirty.mark("id");
    let (_, order) = share(order);
    processor.persist(order);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let executed = processor.connection().executed();
    assert_eq!(executed[0].0, "UPDATE orders SET total=:p0 WHERE id=:p1;");
    assert_eq!(executed[0].1, vec![Value::BigInt(12), Value::BigInt(5)]);
}

#[test]
fn invalid_enum_value_aborts_before_any_call() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let mut order = Order::new("NEW", 10);
    order.set_priority("urgent");
    let (_, order) = share(order);
    processor.persist(order);

    let err = expect_err(rt.block_on(async { processor.commit(&cx).await }));
    let validation = match err {
        Error::Validation(validation) => validation,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert_eq!(validation.errors[0].field, "priority");
    assert_eq!(validation.errors[0].kind, ValidationErrorKind::EnumValue);
    assert!(processor.connection().calls().is_empty());
    assert!(processor.is_empty());
}

#[test]
fn enum_discriminants_are_accepted() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let mut order = Order::from_row(5, "NEW", 10);
    order.set_priority(Value::Int(2));
    let (_, order) = share(order);
    processor.persist(order);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let executed = processor.connection().executed();
    assert_eq!(executed[0].1, vec![Value::Int(2), Value::BigInt(5)]);
}

#[test]
fn failing_update_bucket_keeps_committed_inserts() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres).with_fault(Fault::Execute(2)));

    let (_, fresh) = share(Order::new("NEW", 10));
    let mut paid = Order::from_row(5, "NEW", 10);
    paid.set_status("PAID");
    let (paid_state, paid) = share(paid);
    processor.persist(fresh);
    processor.persist(paid);

    let err = expect_err(rt.block_on(async { processor.commit(&cx).await }));

    let batch = err.as_batch().expect("wrapped batch error");
    assert_eq!(batch.operation, Operation::Update);
    assert_eq!(batch.entity_type, Order::ENTITY_TYPE);
    let message = err.to_string();
    assert!(message.starts_with("Failed to execute update statement for Order. Error: "));
    assert!(message.contains("duplicate key"));
    assert_eq!(err.sqlstate(), Some("23505"));
    assert!(!err.is_retryable());

    let calls = processor.connection().calls();
    assert_eq!(calls.len(), 6);
    assert_eq!(calls[0], Call::Begin(None));
    assert_eq!(calls[2], Call::Commit);
    assert_eq!(calls[3], Call::Begin(None));
    assert_eq!(calls[5], Call::Rollback);

    let log = paid_state.read().unwrap().hook_log.clone();
    assert_eq!(log, vec!["pre_save", "pre_update"]);
    assert!(processor.is_empty());
}

#[test]
fn failure_stops_later_buckets() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres).with_fault(Fault::Execute(1)));

    let (_, fresh) = share(Order::new("NEW", 10));
    let (_, tag) = share(Tag::renamed(3, "systems"));
    processor.persist(fresh);
    processor.persist(tag);

    let err = expect_err(rt.block_on(async { processor.commit(&cx).await }));
    assert_eq!(
        err.as_batch().map(|b| b.operation),
        Some(Operation::Insert)
    );

    let calls = processor.connection().calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], Call::Rollback);
    assert!(processor.is_empty());
}

#[test]
fn commit_failure_surfaces_as_batch_error() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor =
        processor(MockConnection::new(Dialect::Postgres).with_fault(Fault::Commit));

    let (fresh_state, fresh) = share(Order::new("NEW", 10));
    processor.persist(fresh);

    let err = expect_err(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(
        err.to_string(),
        "Failed to execute insert statement for Order. Error: \
         Query error (SQLSTATE 40001): could not serialize access due to concurrent update"
    );
    let cause = match err.as_batch().map(|b| b.cause.as_ref()) {
        Some(Error::Query(query)) => query.kind,
        other => panic!("expected query cause, got {other:?}"),
    };
    assert_eq!(cause, QueryErrorKind::Serialization);

    let calls = processor.connection().calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], Call::Begin(None));
    assert!(matches!(calls[1], Call::Execute(..)));
    assert_eq!(calls[2], Call::Commit);

    let log = fresh_state.read().unwrap().hook_log.clone();
    assert_eq!(log, vec!["pre_save", "pre_insert"]);
    assert!(processor.is_empty());
}

#[test]
fn begin_failure_executes_nothing() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let config = BatchConfig::new().isolation(IsolationLevel::RepeatableRead);
    let mut processor = processor(MockConnection::new(Dialect::Postgres).with_fault(Fault::Begin))
        .with_config(config);

    let (_, tag) = share(Tag::renamed(3, "systems"));
    processor.persist(tag);

    let err = expect_err(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(err.as_batch().map(|b| b.operation), Some(Operation::Update));
    assert_eq!(err.as_batch().map(|b| b.entity_type), Some(Tag::ENTITY_TYPE));
    assert!(
        err.to_string()
            .starts_with("Failed to execute update statement for Tag. Error: ")
    );
    assert_eq!(
        processor.connection().calls(),
        vec![Call::Begin(Some(IsolationLevel::RepeatableRead))]
    );
}

#[test]
fn insert_buckets_run_before_update_buckets() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let (_, renamed) = share(Tag::renamed(3, "systems"));
    let (_, fresh_tag) = share(Tag::new("rust"));
    let (_, fresh_order) = share(Order::new("NEW", 1));
    processor.persist(renamed);
    processor.persist(fresh_tag);
    processor.persist(fresh_order);

    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let statements: Vec<String> = processor
        .connection()
        .executed()
        .into_iter()
        .map(|(sql, _)| sql)
        .collect();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].starts_with("INSERT INTO tags"));
    assert!(statements[1].starts_with("INSERT INTO orders"));
    assert!(statements[2].starts_with("UPDATE tags"));
}

#[test]
fn unknown_entity_type_is_metadata_error() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut registry = MappingRegistry::new();
    registry.register::<Order>();
    let mut processor = BatchProcessor::new(MockConnection::new(Dialect::Postgres), Arc::new(registry));

    let (_, tag) = share(Tag::new("rust"));
    processor.persist(tag);

    let err = expect_err(rt.block_on(async { processor.commit(&cx).await }));
    let meta = match err {
        Error::Metadata(meta) => meta,
        other => panic!("expected metadata error, got {other:?}"),
    };
    assert_eq!(meta.kind, MetadataErrorKind::UnknownEntityType);
    assert!(meta.message.contains("Tag"));
    assert!(processor.connection().calls().is_empty());
}

#[test]
fn configured_isolation_and_dialect_placeholders() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let config = BatchConfig::new()
        .isolation(IsolationLevel::Serializable)
        .placeholders(PlaceholderStyle::Dialect);
    let mut processor = processor(MockConnection::new(Dialect::Postgres)).with_config(config);

    let mut paid = Order::from_row(5, "NEW", 10);
    paid.set_status("PAID");
    paid.set_total(11);
    let (_, paid) = share(paid);
    processor.persist(paid);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let calls = processor.connection().calls();
    assert_eq!(calls[0], Call::Begin(Some(IsolationLevel::Serializable)));
    assert_eq!(
        processor.connection().executed()[0].0,
        "UPDATE orders SET status=$1, total=$2 WHERE id=$3;"
    );
}

#[test]
fn quoted_identifiers_follow_the_dialect() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut registry = MappingRegistry::new();
    registry.insert(
        Tag::ENTITY_TYPE,
        <Tag as Mapped>::table_map().quote_identifiers(true),
    );
    let mut processor = BatchProcessor::new(MockConnection::new(Dialect::Mysql), Arc::new(registry));

    let (_, tag) = share(Tag::renamed(3, "systems"));
    processor.persist(tag);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(
        processor.connection().executed()[0].0,
        "UPDATE `tags` SET `label`=:p0 WHERE `id`=:p1;"
    );
}

#[test]
fn modified_insert_policy_lets_defaults_apply() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let config = BatchConfig::new().insert_columns(InsertColumns::Modified);
    let mut processor = processor(MockConnection::new(Dialect::Postgres)).with_config(config);

    let (_, fresh) = share(Order::new("NEW", 10));
    processor.persist(fresh);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(
        processor.connection().executed()[0].0,
        "INSERT INTO orders (status, total, priority) VALUES (:p0, :p1, :p2);"
    );
}

#[test]
fn long_text_collections_are_stored_as_json() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let mut order = Order::from_row(5, "NEW", 10);
    order.set_notes(Value::from(vec!["gift".to_string(), "fragile".to_string()]));
    let (_, order) = share(order);
    processor.persist(order);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(
        processor.connection().executed()[0].1[0],
        Value::Text(r#"["gift","fragile"]"#.to_string())
    );
}

#[test]
fn timestamps_use_one_clock_reading() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(MockConnection::new(Dialect::Postgres));

    let (fresh_state, fresh) = share(Order::new("NEW", 10).with_stamps());
    let mut paid = Order::from_row(5, "NEW", 10).with_stamps();
    paid.set_status("PAID");
    let (paid_state, paid) = share(paid);
    processor.persist(fresh);
    processor.persist(paid);
    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let fresh = fresh_state.read().unwrap();
    assert_eq!(fresh.created_at, Some(NOW));
    assert_eq!(fresh.updated_at, Some(NOW));

    let paid = paid_state.read().unwrap();
    assert_eq!(paid.created_at, None);
    assert_eq!(paid.updated_at, Some(NOW));

    let executed = processor.connection().executed();
    assert_eq!(
        executed[1].0,
        "UPDATE orders SET status=:p0, updated_at=:p1 WHERE id=:p2;"
    );
    assert_eq!(
        executed[1].1,
        vec![Value::from("PAID"), Value::Timestamp(NOW), Value::BigInt(5)]
    );
}

#[test]
fn into_connection_returns_the_handle() {
    let conn = MockConnection::new(Dialect::Sqlite);
    let processor = BatchProcessor::new(conn, registry());
    assert_eq!(processor.config().placeholders, PlaceholderStyle::Named);
    let conn = processor.into_connection();
    assert_eq!(conn.dialect(), Dialect::Sqlite);
}
