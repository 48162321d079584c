//! Integration tests: transactions, rollback, deferred validation and
//! value streams.

use grove_forest::{Forest, ForestError, NodeInit, TransOptions, Value};
use grove_kernel::{LifecycleState, Record};

fn aborted(reason: &str) -> ForestError {
    ForestError::Aborted(reason.to_string())
}

#[test]
fn failed_transaction_removes_everything_it_wrote() {
    let mut forest = Forest::new();
    let root = forest
        .add_node(NodeInit::new(Value::map([("alpha", 1)])))
        .expect("root");

    let mut written = None;
    let err = forest
        .transact(|forest| {
            let child = forest.add_child(root, NodeInit::new(2).named("beta"))?;
            forest.update_value(root, Value::map([("alpha", 5)]))?;
            written = Some(child);
            Err::<(), _>(aborted("changed my mind"))
        })
        .expect_err("aborted");

    let ForestError::TransactionFailed { trans, source } = err else {
        panic!("expected a transaction failure, got {err:?}");
    };
    assert!(matches!(*source, ForestError::Aborted(_)));

    let child = written.expect("child tick");
    assert!(!forest.is_active_node(child));
    assert_eq!(forest.value(child), None);
    assert_eq!(forest.value(root), Some(Value::map([("alpha", 1)])));
    assert!(forest.children(root).is_empty());

    let record = forest.transactions().get(trans).expect("trans record");
    assert_eq!(record.lifecycle().state(), LifecycleState::Error);
    assert!(record.end().is_some());
    assert!(record.error().is_some_and(|e| e.contains("changed my mind")));
    assert!(!forest.has_pending_transaction());
}

#[test]
fn rollback_restores_the_previous_value() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new(1)).expect("node");

    let result = forest.transact(|forest| {
        forest.update_value(node, 2)?;
        forest.update_value(node, 3)?;
        Err::<(), _>(aborted("nope"))
    });
    assert!(result.is_err());
    assert_eq!(forest.value(node), Some(Value::from(1)));

    let states: Vec<LifecycleState> = forest
        .value_history(node)
        .iter()
        .map(|change| change.lifecycle().state())
        .collect();
    assert_eq!(states, vec![LifecycleState::Removed, LifecycleState::Removed]);
}

#[test]
fn validation_failure_inside_a_transaction_rolls_back() {
    let mut forest = Forest::new();
    let a = forest.add_node(NodeInit::new("a")).expect("a");
    let b = forest.add_node(NodeInit::new(1)).expect("b");

    let err = forest
        .transact(|forest| {
            forest.update_value(b, 2)?;
            forest.update_value(a, Value::Array(vec![]))?;
            Ok(())
        })
        .expect_err("a is locked to scalar");
    assert!(err.is_validation());
    assert_eq!(forest.value(b), Some(Value::from(1)));
    assert_eq!(forest.value(a), Some(Value::from("a")));
}

#[test]
fn successful_transaction_completes() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new(1)).expect("node");

    let change = forest
        .transact_with(TransOptions::default().labeled("bump"), |forest| {
            assert_eq!(forest.pending_transactions().len(), 1);
            forest.update_value(node, 2)
        })
        .expect("transaction");
    assert_eq!(forest.value(node), Some(Value::from(2)));
    assert_eq!(
        forest.value_changes().get(change).map(|c| c.lifecycle().state()),
        Some(LifecycleState::Good)
    );

    let trans = forest.transactions().all().last().expect("trans record");
    assert_eq!(trans.lifecycle().state(), LifecycleState::Complete);
    assert_eq!(trans.label(), Some("bump"));
    assert!(trans.end().is_some_and(|end| end > trans.start()));
}

#[test]
fn outer_transaction_survives_a_swallowed_inner_failure() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new(1)).expect("node");
    let other = forest.add_node(NodeInit::new("x")).expect("other");

    forest
        .transact(|forest| {
            forest.update_value(node, 2)?;
            let inner = forest.transact(|forest| {
                assert_eq!(forest.pending_transactions().len(), 2);
                forest.update_value(other, "y")?;
                Err::<(), _>(aborted("inner"))
            });
            assert!(inner.is_err());
            assert_eq!(forest.value(other), Some(Value::from("x")));
            forest.update_value(node, 3)?;
            Ok(())
        })
        .expect("outer completes");

    assert_eq!(forest.value(node), Some(Value::from(3)));
    assert_eq!(forest.value(other), Some(Value::from("x")));

    let states: Vec<LifecycleState> = forest
        .transactions()
        .all()
        .map(|t| t.lifecycle().state())
        .collect();
    assert_eq!(states, vec![LifecycleState::Complete, LifecycleState::Error]);
}

#[test]
fn unvalidated_batch_may_pass_through_invalid_states() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new("foo")).expect("node");

    forest
        .transact_with(TransOptions::unvalidated(), |forest| {
            assert!(forest.validation_suppressed());
            forest.update_value(node, Value::Array(vec![]))?;
            assert_eq!(forest.value(node), Some(Value::Array(vec![])));
            forest.update_value(node, "bar")?;
            Ok(())
        })
        .expect("final state is valid");

    assert!(!forest.validation_suppressed());
    assert_eq!(forest.value(node), Some(Value::from("bar")));
    assert!(
        forest
            .value_history(node)
            .iter()
            .all(|change| change.lifecycle().state() == LifecycleState::Good)
    );
}

#[test]
fn final_pass_failure_rolls_the_batch_back() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new("foo")).expect("node");

    let err = forest
        .transact_with(TransOptions::unvalidated(), |forest| {
            forest.update_value(node, Value::Array(vec![]))?;
            Ok(())
        })
        .expect_err("array left behind");
    assert!(err.is_validation());
    assert!(matches!(err, ForestError::TransactionFailed { .. }));
    assert_eq!(forest.value(node), Some(Value::from("foo")));
}

#[test]
fn nested_unvalidated_batches_validate_once_at_the_outermost() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new("foo")).expect("node");

    forest
        .transact_with(TransOptions::unvalidated(), |forest| {
            forest.transact_with(TransOptions::unvalidated(), |forest| {
                forest.update_value(node, Value::Array(vec![]))?;
                Ok(())
            })?;
            // Still invalid here; the inner batch deferred to us.
            assert_eq!(forest.value(node), Some(Value::Array(vec![])));
            forest.update_value(node, "fixed")?;
            Ok(())
        })
        .expect("outer final pass succeeds");

    assert_eq!(forest.value(node), Some(Value::from("fixed")));
}

#[test]
fn streams_are_cold_and_quiet_during_transactions() {
    let mut forest = Forest::new();
    let node = forest.add_node(NodeInit::new(1)).expect("node");
    let mut stream = forest.watch(node);
    assert_eq!(stream.node(), node);

    assert_eq!(stream.poll(&forest), Some(Value::from(1)));
    assert_eq!(stream.poll(&forest), None);

    forest.update_value(node, 2).expect("update");
    assert_eq!(stream.poll(&forest), Some(Value::from(2)));

    forest
        .transact(|forest| {
            forest.update_value(node, 3)?;
            assert_eq!(stream.poll(forest), None);
            forest.update_value(node, 4)?;
            Ok(())
        })
        .expect("transaction");
    assert_eq!(stream.poll(&forest), Some(Value::from(4)));

    forest.update_value(node, 4).expect("same value");
    assert_eq!(stream.poll(&forest), None);
}

#[test]
fn streams_follow_child_changes() {
    let mut forest = Forest::new();
    let root = forest
        .add_node(NodeInit::new(Value::map::<&str, Value>([])))
        .expect("root");
    let mut stream = forest.watch(root);
    assert_eq!(stream.poll(&forest), Some(Value::map::<&str, Value>([])));

    let child = forest
        .add_child(root, NodeInit::new(1).named("n"))
        .expect("child");
    assert_eq!(stream.poll(&forest), Some(Value::map([("n", 1)])));

    forest.update_value(child, 2).expect("update child");
    assert_eq!(stream.poll(&forest), Some(Value::map([("n", 2)])));
}

#[test]
fn records_written_in_a_transaction_start_after_it() {
    let mut forest = Forest::new();
    let node = forest
        .transact(|forest| forest.add_node(NodeInit::new(1)))
        .expect("node");
    let trans = forest.transactions().all().next().expect("trans");
    assert!(node > trans.tick());
    assert_eq!(trans.start(), trans.tick());
}
