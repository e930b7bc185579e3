use std::{sync::mpsc, thread, time::Duration};

use super::*;
use crate::{NodeStatus, Tree};

fn tree(cell: &SignalCell) -> (Tree, mpsc::Receiver<String>) {
    let (sender, receiver) = mpsc::channel();
    let mut registry = Registry::default();
    register_signal_nodes(&mut registry, cell.clone(), ChannelPublisher::new(sender));
    let tree = registry
        .create_tree_from_text(
            r#"
tree main = Sequence {
    PublishState(state <- "ready")
    Fallback {
        WaitForSignal
        PublishState(state <- "rejected")
    }
}
"#,
            "main",
        )
        .unwrap();
    (tree, receiver)
}

#[test]
fn test_cell() {
    let cell = SignalCell::default();
    assert_eq!(cell.take(), None);

    cell.deliver(false);
    cell.deliver(true);
    assert!(cell.has_new_value());
    assert_eq!(cell.take(), Some(true));
    assert_eq!(cell.take(), None);

    cell.deliver(true);
    cell.reset();
    assert_eq!(cell.take(), None);
}

#[test]
fn test_stale_signal_is_discarded() {
    let cell = SignalCell::default();
    let (mut tree, receiver) = tree(&cell);

    cell.deliver(true);
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Running);
    assert_eq!(receiver.try_recv().unwrap(), "ready");
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Running);

    cell.deliver(false);
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
    assert_eq!(receiver.try_recv().unwrap(), "rejected");
}

#[test]
fn test_delivery_from_another_thread() {
    let cell = SignalCell::default();
    let (mut tree, receiver) = tree(&cell);
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Running);

    let remote = cell.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        remote.deliver(true);
    });

    let result = tree.tick_while_running(&mut |_| None, || {
        thread::sleep(Duration::from_millis(1))
    });
    handle.join().unwrap();
    assert_eq!(result, BehaviorResult::Success);
    assert_eq!(tree.root_status(), NodeStatus::Success);

    // Nothing but the first state was published
    assert_eq!(receiver.try_recv().unwrap(), "ready");
    assert!(receiver.try_recv().is_err());
}

#[test]
fn test_closed_channel_fails() {
    let cell = SignalCell::default();
    let (mut tree, receiver) = tree(&cell);
    drop(receiver);

    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Fail);
    let publish = tree.find("PublishState").unwrap();
    assert!(matches!(publish.last_error(), Some(TickError::Node(_))));
}
