//! Watching status changes of the nodes of a tree.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    rc::Rc,
};

use tracing::debug;

use crate::{NodeStatus, Tree};

/// Receives every status change of every node of a tree, synchronously,
/// while the tree is ticked or halted.
pub trait StatusListener {
    fn on_status_change(&self, uid: u16, path: &str, prev: NodeStatus, status: NodeStatus);
}

/// Counters kept by [`TreeObserver`] for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStatistics {
    pub current_status: NodeStatus,
    /// Last `Success` or `Failure`
    pub last_result: NodeStatus,
    /// Status changes into `Running`, `Success` or `Failure`. Resets into
    /// `Idle` only update `current_status`.
    pub transitions_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

#[derive(Default)]
struct ObserverState {
    statistics: BTreeMap<u16, NodeStatistics>,
}

impl StatusListener for RefCell<ObserverState> {
    fn on_status_change(&self, uid: u16, _path: &str, _prev: NodeStatus, status: NodeStatus) {
        let mut state = self.borrow_mut();
        let stats = state.statistics.entry(uid).or_default();
        stats.current_status = status;
        if status == NodeStatus::Idle {
            return;
        }
        stats.transitions_count += 1;
        match status {
            NodeStatus::Success => stats.success_count += 1,
            NodeStatus::Failure => stats.failure_count += 1,
            _ => return,
        }
        stats.last_result = status;
    }
}

/// A node of the tree, by uid or by full path.
pub enum NodeRef<'a> {
    Uid(u16),
    Path(&'a str),
}

impl From<u16> for NodeRef<'_> {
    fn from(uid: u16) -> Self {
        Self::Uid(uid)
    }
}

impl<'a> From<&'a str> for NodeRef<'a> {
    fn from(path: &'a str) -> Self {
        Self::Path(path)
    }
}

/// Counts transitions, successes and failures of every node of a tree.
///
/// ```
/// # use behavior_tree_engine::*;
/// let registry = Registry::default();
/// let mut tree = registry
///     .create_tree_from_text("tree main = Sequence { AlwaysSuccess AlwaysSuccess }", "main")
///     .unwrap();
/// let observer = TreeObserver::new(&tree);
/// tree.tick_once(&mut |_| None);
///
/// let stats = observer.statistics("AlwaysSuccess").unwrap();
/// assert_eq!(stats.success_count, 1);
/// ```
pub struct TreeObserver {
    state: Rc<RefCell<ObserverState>>,
    uid_to_path: BTreeMap<u16, String>,
    path_to_uid: HashMap<String, u16>,
}

impl TreeObserver {
    pub fn new(tree: &Tree) -> Self {
        let uid_to_path = tree.uid_to_path();
        let path_to_uid = uid_to_path
            .iter()
            .map(|(uid, path)| (path.clone(), *uid))
            .collect();
        let state = Rc::new(RefCell::new(ObserverState {
            statistics: uid_to_path
                .keys()
                .map(|uid| (*uid, NodeStatistics::default()))
                .collect(),
        }));
        tree.add_listener(state.clone());
        Self {
            state,
            uid_to_path,
            path_to_uid,
        }
    }

    pub fn statistics<'a>(&self, node: impl Into<NodeRef<'a>>) -> Option<NodeStatistics> {
        let uid = match node.into() {
            NodeRef::Uid(uid) => uid,
            NodeRef::Path(path) => *self.path_to_uid.get(path)?,
        };
        self.state.borrow().statistics.get(&uid).copied()
    }

    /// Statistics of every node, by uid.
    pub fn all_statistics(&self) -> BTreeMap<u16, NodeStatistics> {
        self.state.borrow().statistics.clone()
    }

    pub fn uid_to_path(&self) -> &BTreeMap<u16, String> {
        &self.uid_to_path
    }

    pub fn path_to_uid(&self) -> &HashMap<String, u16> {
        &self.path_to_uid
    }

    pub fn reset_statistics(&self) {
        for stats in self.state.borrow_mut().statistics.values_mut() {
            *stats = NodeStatistics::default();
        }
    }
}

/// Emits a `debug` event for every status change.
#[derive(Default)]
pub struct TracingLogger;

impl StatusListener for TracingLogger {
    fn on_status_change(&self, uid: u16, path: &str, prev: NodeStatus, status: NodeStatus) {
        debug!(uid, "{path}: {prev} -> {status}");
    }
}

#[cfg(test)]
mod test;
