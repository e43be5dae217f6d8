use asupersync::runtime::RuntimeBuilder;
use sqlbatch::prelude::*;
use sqlbatch_testing::{MockConnection, Order, fixed_clock, registry, share, unwrap_outcome};

fn processor(config: BatchConfig) -> BatchProcessor<MockConnection> {
    BatchProcessor::new(MockConnection::new(Dialect::Postgres), registry())
        .with_config(config)
        .with_clock(fixed_clock)
}

#[test]
fn hooks_wrap_each_write_in_order() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(BatchConfig::default());

    let (fresh_state, fresh) = share(Order::new("NEW", 10));
    let mut paid = Order::from_row(5, "NEW", 10);
    paid.set_status("PAID");
    let (paid_state, paid) = share(paid);
    processor.persist(fresh);
    processor.persist(paid);

    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(
        fresh_state.read().unwrap().hook_log,
        vec!["pre_save", "pre_insert", "post_insert", "post_save"]
    );
    assert_eq!(
        paid_state.read().unwrap().hook_log,
        vec!["pre_save", "pre_update", "post_update", "post_save"]
    );
}

#[test]
fn hook_changes_are_captured_at_synthesis() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(BatchConfig::default());

    let mut order = Order::from_row(5, "NEW", 10);
    order.set_status("PAID");
    let (state, handle) = share(order);
    processor.persist(handle);

    // A change made after staging but before commit is what gets written.
    state.write().unwrap().set_status("SHIPPED");

    unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    let executed = processor.connection().executed();
    assert_eq!(executed[0].1[0], Value::from("SHIPPED"));
}

#[test]
fn vetoes_are_ignored_by_default() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(BatchConfig::default());

    let mut refusing = Order::new("NEW", 10);
    refusing.refuse = Some("pre_insert");
    let (state, handle) = share(refusing);
    processor.persist(handle);

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.vetoed, 0);
    assert_eq!(
        state.read().unwrap().hook_log,
        vec!["pre_save", "pre_insert", "post_insert", "post_save"]
    );
}

#[test]
fn honored_veto_drops_the_entity() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(BatchConfig::new().honor_vetoes(true));

    let mut refusing = Order::new("DRAFT", 1);
    refusing.refuse = Some("pre_save");
    let (refusing_state, refusing) = share(refusing);
    let (kept_state, kept) = share(Order::new("NEW", 10));
    processor.persist(refusing);
    processor.persist(kept);

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.vetoed, 1);
    assert_eq!(refusing_state.read().unwrap().hook_log, vec!["pre_save"]);
    assert_eq!(
        kept_state.read().unwrap().hook_log,
        vec!["pre_save", "pre_insert", "post_insert", "post_save"]
    );

    let executed = processor.connection().executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].1[0], Value::from("NEW"));
}

#[test]
fn fully_vetoed_bucket_makes_no_calls() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(BatchConfig::new().honor_vetoes(true));

    let mut refusing = Order::from_row(5, "NEW", 10);
    refusing.set_status("PAID");
    refusing.refuse = Some("pre_update");
    let (_, refusing) = share(refusing);
    processor.persist(refusing);

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert!(summary.is_empty());
    assert_eq!(summary.vetoed, 1);
    assert!(processor.connection().calls().is_empty());
}

#[test]
fn skipped_update_gets_no_post_hooks() {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    let mut processor = processor(BatchConfig::default());

    // Only the key changed: nothing to SET.
    let mut order = Order::from_row(5, "NEW", 10);
    order.id = Some(6);
    order.dirty.mark("id");
    let (state, handle) = share(order);
    processor.persist(handle);

    let summary = unwrap_outcome(rt.block_on(async { processor.commit(&cx).await }));

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.statements, 0);
    assert!(processor.connection().calls().is_empty());
    assert_eq!(state.read().unwrap().hook_log, vec!["pre_save", "pre_update"]);
}
