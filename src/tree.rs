use std::{
    collections::{BTreeMap, HashSet},
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use crate::{
    BehaviorCallback, BehaviorNodeContainer, BehaviorResult, Blackboard, BlackboardRef, Context,
    NodeStatus, StatusListener, TickEnv,
};

/// A subtree instantiated in a tree.
pub struct SubtreeInfo {
    /// Name of the subtree in the source
    pub tree_id: String,
    pub instance_path: String,
    pub blackboard: BlackboardRef,
}

/// Hands out uids in the order nodes are created and unique paths.
///
/// A path is the prefix of the enclosing subtree followed by the name of the
/// node. A name that is already taken gets `::uid` appended.
pub(crate) struct Naming {
    next_uid: u16,
    paths: HashSet<String>,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            next_uid: 1,
            paths: HashSet::new(),
        }
    }
}

impl Naming {
    pub fn next(&mut self, prefix: &str, name: &str) -> (u16, String) {
        let uid = self.next_uid;
        self.next_uid = self.next_uid.wrapping_add(1);
        let mut path = format!("{prefix}{name}");
        if self.paths.contains(&path) {
            path = format!("{path}::{uid}");
        }
        self.paths.insert(path.clone());
        (uid, path)
    }
}

/// An instantiated behavior tree with its blackboard.
pub struct Tree {
    root: BehaviorNodeContainer,
    blackboard: BlackboardRef,
    subtrees: Vec<SubtreeInfo>,
    env: Rc<TickEnv>,
}

impl Tree {
    pub(crate) fn new(
        root: BehaviorNodeContainer,
        blackboard: BlackboardRef,
        subtrees: Vec<SubtreeInfo>,
        env: Rc<TickEnv>,
    ) -> Self {
        Self {
            root,
            blackboard,
            subtrees,
            env,
        }
    }

    /// Wraps a tree assembled by hand, assigning uids and paths to its nodes.
    pub fn from_root(mut root: BehaviorNodeContainer) -> Self {
        fn assign(node: &mut BehaviorNodeContainer, naming: &mut Naming) {
            let name = if node.name.is_empty() {
                node.kind.clone()
            } else {
                node.name.clone()
            };
            let (uid, path) = naming.next("", &name);
            node.uid = uid;
            node.path = path;
            for child in node.children_mut() {
                assign(child, naming);
            }
        }
        assign(&mut root, &mut Naming::default());
        Self::new(root, Blackboard::create(), vec![], Rc::new(TickEnv::default()))
    }

    /// Ticks the root once.
    pub fn tick_once(&mut self, arg: BehaviorCallback) -> BehaviorResult {
        let mut ctx = Context::new(self.blackboard.clone(), self.env.clone());
        self.root.tick(arg, &mut ctx)
    }

    /// Ticks until the root is not `Running`, calling `between` after every
    /// tick that returned `Running`.
    pub fn tick_while_running(
        &mut self,
        arg: BehaviorCallback,
        mut between: impl FnMut(),
    ) -> BehaviorResult {
        loop {
            let result = self.tick_once(&mut *arg);
            if result != BehaviorResult::Running {
                return result;
            }
            between();
        }
    }

    /// Halts every node of the tree.
    pub fn halt_tree(&mut self) {
        let mut ctx = Context::new(self.blackboard.clone(), self.env.clone());
        self.root.halt(&mut ctx);
    }

    pub fn root_status(&self) -> NodeStatus {
        self.root.status()
    }

    pub fn root(&self) -> &BehaviorNodeContainer {
        &self.root
    }

    /// The blackboard of the root tree.
    pub fn blackboard(&self) -> &BlackboardRef {
        &self.blackboard
    }

    pub fn subtrees(&self) -> &[SubtreeInfo] {
        &self.subtrees
    }

    pub fn env(&self) -> &Rc<TickEnv> {
        &self.env
    }

    pub fn add_listener(&self, listener: Rc<dyn StatusListener>) {
        self.env.add_listener(listener);
    }

    /// Visits every node, parents before children.
    pub fn visit(&self, mut f: impl FnMut(&BehaviorNodeContainer)) {
        fn visit_rec(node: &BehaviorNodeContainer, f: &mut impl FnMut(&BehaviorNodeContainer)) {
            f(node);
            for child in node.children() {
                visit_rec(child, f);
            }
        }
        visit_rec(&self.root, &mut f);
    }

    /// Visits every node mutably, parents before children. Combine with
    /// [`crate::BehaviorNode::as_any_mut`] to reach a concrete node type.
    pub fn visit_mut(&mut self, mut f: impl FnMut(&mut BehaviorNodeContainer)) {
        fn visit_rec(
            node: &mut BehaviorNodeContainer,
            f: &mut impl FnMut(&mut BehaviorNodeContainer),
        ) {
            f(node);
            for child in node.children_mut() {
                visit_rec(child, f);
            }
        }
        visit_rec(&mut self.root, &mut f);
    }

    pub fn uid_to_path(&self) -> BTreeMap<u16, String> {
        let mut ret = BTreeMap::new();
        self.visit(|node| {
            ret.insert(node.uid(), node.path().to_owned());
        });
        ret
    }

    /// Finds a node by its full path.
    pub fn find(&self, path: &str) -> Option<&BehaviorNodeContainer> {
        fn find_rec<'a>(node: &'a BehaviorNodeContainer, path: &str) -> Option<&'a BehaviorNodeContainer> {
            if node.path() == path {
                return Some(node);
            }
            node.children().iter().find_map(|child| find_rec(child, path))
        }
        find_rec(&self.root, path)
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        fn fmt_rec(node: &BehaviorNodeContainer, depth: usize, f: &mut Formatter) -> fmt::Result {
            write!(f, "{:indent$}{}", "", node.name(), indent = depth * 2)?;
            if node.name() != node.kind() {
                write!(f, " ({})", node.kind())?;
            }
            writeln!(f, " #{} {}", node.uid(), node.status())?;
            for child in node.children() {
                fmt_rec(child, depth + 1, f)?;
            }
            Ok(())
        }
        fmt_rec(&self.root, 0, f)
    }
}

#[cfg(test)]
mod test;
