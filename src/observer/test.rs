use std::cell::Cell;

use super::*;
use crate::{boxify, BehaviorCallback, BehaviorNode, BehaviorResult, Context, Registry, TickResult};

/// Runs once, then completes with the result stored in the cell.
struct Delayed {
    result: Rc<Cell<BehaviorResult>>,
    started: bool,
}

impl BehaviorNode for Delayed {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        if !self.started {
            self.started = true;
            return Ok(BehaviorResult::Running);
        }
        self.started = false;
        Ok(self.result.get())
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.started = false;
    }
}

fn tree(result: &Rc<Cell<BehaviorResult>>) -> Tree {
    let mut registry = Registry::default();
    let result = result.clone();
    registry.register(
        "Delayed",
        boxify(move || Delayed {
            result: result.clone(),
            started: false,
        }),
    );
    registry
        .create_tree_from_text(
            "tree main = Sequence { AlwaysSuccess Delayed }",
            "main",
        )
        .unwrap()
}

#[test]
fn test_counts() {
    let result = Rc::new(Cell::new(BehaviorResult::Success));
    let mut tree = tree(&result);
    let observer = TreeObserver::new(&tree);
    assert_eq!(observer.all_statistics().len(), 3);
    assert_eq!(
        observer.statistics("Delayed"),
        Some(NodeStatistics::default())
    );

    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Running);
    let delayed = observer.statistics("Delayed").unwrap();
    assert_eq!(delayed.current_status, NodeStatus::Running);
    assert_eq!(delayed.transitions_count, 1);

    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
    let root = observer.statistics(1).unwrap();
    assert_eq!(root.success_count, 1);
    assert_eq!(root.last_result, NodeStatus::Success);

    // The sequence resets its children once it completes
    let delayed = observer.statistics("Delayed").unwrap();
    assert_eq!(delayed.success_count, 1);
    assert_eq!(delayed.current_status, NodeStatus::Idle);
    assert_eq!(delayed.last_result, NodeStatus::Success);
    assert_eq!(delayed.transitions_count, 2);

    result.set(BehaviorResult::Fail);
    tree.tick_while_running(&mut |_| None, || ());
    let delayed = observer.statistics("Delayed").unwrap();
    assert_eq!(delayed.success_count, 1);
    assert_eq!(delayed.failure_count, 1);
    assert_eq!(delayed.last_result, NodeStatus::Failure);
    assert_eq!(observer.statistics(1).unwrap().failure_count, 1);
}

#[test]
fn test_lookup_and_reset() {
    let result = Rc::new(Cell::new(BehaviorResult::Success));
    let mut tree = tree(&result);
    let observer = TreeObserver::new(&tree);

    assert_eq!(observer.path_to_uid().get("AlwaysSuccess"), Some(&2));
    assert_eq!(observer.uid_to_path().get(&3).map(String::as_str), Some("Delayed"));
    assert_eq!(observer.statistics("Nope"), None);
    assert_eq!(observer.statistics(42), None);

    tree.tick_while_running(&mut |_| None, || ());
    assert_eq!(observer.statistics(2).unwrap().success_count, 1);

    observer.reset_statistics();
    assert!(observer
        .all_statistics()
        .values()
        .all(|stats| *stats == NodeStatistics::default()));
}

#[test]
fn test_halt_notifies_idle() {
    let result = Rc::new(Cell::new(BehaviorResult::Success));
    let mut tree = tree(&result);
    let observer = TreeObserver::new(&tree);

    tree.tick_once(&mut |_| None);
    tree.halt_tree();

    assert_eq!(tree.root_status(), NodeStatus::Idle);
    let delayed = observer.statistics("Delayed").unwrap();
    assert_eq!(delayed.current_status, NodeStatus::Idle);
    assert_eq!(delayed.transitions_count, 1);
    assert_eq!(delayed.success_count, 0);
}

#[test]
fn test_one_transition_per_tick() {
    let mut tree = Registry::default()
        .create_tree_from_text("tree main = Sequence { AlwaysSuccess }", "main")
        .unwrap();
    let observer = TreeObserver::new(&tree);

    for _ in 0..3 {
        assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
    }
    let leaf = observer.statistics("AlwaysSuccess").unwrap();
    assert_eq!(leaf.transitions_count, 3);
    assert_eq!(leaf.success_count, 3);
    assert_eq!(leaf.current_status, NodeStatus::Idle);
}
