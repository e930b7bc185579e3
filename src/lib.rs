//! # behavior-tree-engine (Rust crate)
//!
//! A reactive behavior tree engine with typed blackboards, an embedded
//! scripting language, mock substitution for tests and execution observers.
//!
//!
//! ## Overview
//!
//! A behavior tree composes small, independently testable nodes (conditions,
//! actions, composites and decorators) into a tree that is repeatedly
//! re-evaluated ("ticked") to drive decision making.
//! See [BehaviorTreeCPP's documentation](https://www.behaviortree.dev/) for the
//! thorough introduction to the idea.
//!
//! Every tick returns a [`BehaviorResult`]: `Success`, `Fail` or `Running`.
//! Between ticks each node keeps a [`NodeStatus`], which is `Idle` until the
//! node is ticked for the first time and again after it has been halted.
//!
//!
//! ## How it looks like
//!
//! You describe a tree in the text format of this crate:
//!
//! ```raw
//! tree main = Sequence {
//!     Fallback {
//!         Inverter { IsDoorClosed }
//!         DoorClosed
//!     }
//!     PassThroughDoor
//! }
//!
//! tree DoorClosed = Fallback {
//!     OpenDoor
//!     Retry (n <- "5") { PickLock }
//!     SmashDoor
//! }
//! ```
//!
//! register your own nodes in a [`Registry`] and instantiate the tree.
//!
//! ```rust
//! # use behavior_tree_engine::*;
//! struct PrintArmNode;
//!
//! impl BehaviorNode for PrintArmNode {
//!     fn provided_ports(&self) -> Vec<PortSpec> {
//!         vec![PortSpec::input::<String>("arm")]
//!     }
//!
//!     fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
//!         let arm = ctx.get_input::<String>("arm")?;
//!         println!("Got {arm}");
//!         Ok(BehaviorResult::Success)
//!     }
//! }
//!
//! let mut registry = Registry::default();
//! registry.register("PrintArmNode", boxify(|| PrintArmNode));
//!
//! let mut tree = registry.create_tree_from_text(r#"
//! tree main = Sequence {
//!     PrintArmNode (arm <- "left_arm")
//!     PrintArmNode (arm <- "right_arm")
//! }
//! "#, "main").unwrap();
//!
//! assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
//! ```
//!
//! The argument to the `tick_once` has weird value `&mut |_| None`.
//! It is a callback for the behavior nodes to communicate with the environment.
//! The closure, aliased as [`BehaviorCallback`], takes a `&dyn std::any::Any`
//! and returns an optional `Box<dyn std::any::Any>`, which allows the user to
//! pass or return any type, but in exchange, the user needs to check the type
//! with `downcast_ref` in order to use it.
//!
//! This design was adopted because there is no other good way to communicate
//! between behavior nodes and an environment _whose lifetime is not 'static_.
//! Blackboard variables have the same limitation; you can't pass a reference
//! through a blackboard.
//!
//!
//! ## Ports and the blackboard
//!
//! Nodes talk to each other through ports mapped to blackboard variables.
//!
//! ```raw
//! a <- b      input port
//! a -> b      output port
//! a <-> b     inout port
//! a <- "42"   literal, parsed on read
//! ```
//!
//! Ports declared with a type ([`PortSpec::input`]) bind the type of the
//! blackboard entry they are mapped to when the tree is built, so two nodes
//! disagreeing on the type of a variable is a load error rather than a surprise
//! at runtime. Text (literals or string entries) is converted through the
//! [`Converters`] of the registry; register your own parser with
//! [`Registry::register_converter`].
//!
//! A subtree has its own blackboard scope. Its parameters are remapped to the
//! parent's variables and every access is forwarded to the parent scope.
//!
//! ```raw
//! tree main = Sequence {
//!     Sub (input <- "42", output -> subtreeResult)
//!     PrintString (input <- subtreeResult)
//! }
//!
//! tree Sub(in input: int, out output) = Double (input <- input, output -> output)
//! ```
//!
//!
//! ## Scripts
//!
//! Nodes accept attributes holding short scripts evaluated against the
//! blackboard of the tree they live in.
//!
//! ```raw
//! tree main = Sequence {
//!     Script (code <- "door_open := false; attempts := 0")
//!     OpenDoor (_onFailure = "attempts += 1", _skipIf = "door_open")
//!     PassThroughDoor (_failureIf = "attempts > 3")
//! }
//! ```
//!
//! See the [`script`] module for the language.
//!
//!
//! ## Testing trees
//!
//! Leaf nodes can be replaced by other registered kinds or by configurable
//! mocks while a tree is built, see [`substitution`]. A [`TreeObserver`]
//! counts the status transitions of every node.
//!
//!
//! ## Syntax specification
//!
//! ```raw
//! tree = "tree" tree-name [ "(" tree-port-list ")" ] "=" node
//!
//! tree-port-list = port-def | tree-port-list "," port-def
//!
//! port-def = ( "in" | "out" | "inout" ) tree-port-name [ ":" type-name ]
//!
//! node = if-syntax | var-def-syntax | node-syntax
//!
//! if-syntax = "if" "(" conditional ")" "{" node* "}" [ "else" "{" node* "}" ]
//!
//! conditional-factor = "!" conditional-factor | "(" conditional ")" | node-syntax
//!
//! conditional-and =  conditional-factor | conditional-and "&&" conditional-factor
//!
//! conditional =  conditional-and | conditional "||" conditional-and
//!
//! node-syntax = node-name [ "(" port-list ")" ] [ "{" node* "}" ]
//!
//! port-list = ( port | attribute ) [ "," port-list ]
//!
//! port = node-port-name ("<-" | "->" | "<->") ( blackboard-port-name | string )
//!
//! attribute = attribute-name "=" string
//!
//! var-def-syntax = "var" identifier [ "=" ( "true" | "false" ) ]
//! ```
//!
//! Line comments start with a hash (`#`).

mod blackboard;
mod clock;
mod container;
mod context;
mod convert;
pub mod error;
mod nodes;
pub mod observer;
pub mod parser;
mod port;
mod registry;
pub mod script;
pub mod signal;
pub mod substitution;
mod symbol;
mod tree;
mod value;

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

pub use crate::blackboard::{Blackboard, BlackboardRef, Entry};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::container::BehaviorNodeContainer;
pub use crate::context::{Context, TickEnv};
pub use crate::convert::Converters;
pub use crate::error::TickError;
pub use crate::nodes::{
    AlwaysFailureNode, AlwaysSuccessNode, FallbackNode, ForceFailureNode, ForceSuccessNode,
    IfNode, InverterNode, IsTrueNode, KeepRunningUntilFailureNode, ParallelNode,
    ReactiveFallbackNode, ReactiveSequenceNode, RepeatNode, RetryNode, ScriptConditionNode,
    ScriptNode, SequenceNode, SequenceWithMemoryNode, SetBoolNode, SimpleActionNode,
    SimpleConditionNode, SleepNode, StatefulAction, StatefulActionNode, SubtreeNode, TimeoutNode,
};
pub use crate::observer::{NodeStatistics, StatusListener, TracingLogger, TreeObserver};
pub use crate::symbol::Symbol;
pub use crate::tree::{SubtreeInfo, Tree};
pub use crate::value::{PortValue, TypeInfo, Value, ValueType};
pub use crate::{
    parser::{load, load_tree, parse_file},
    port::{PortSpec, PortType},
    registry::{boxify, Constructor, Registry},
};
pub use ::once_cell::sync::*;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum BehaviorResult {
    Success,
    Fail,
    /// The node should keep running in the next tick
    Running,
}

pub type TickResult = Result<BehaviorResult, TickError>;

/// Status of a node between ticks.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Hash)]
pub enum NodeStatus {
    /// Never ticked, or halted
    #[default]
    Idle,
    Running,
    Success,
    Failure,
}

impl NodeStatus {
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl From<BehaviorResult> for NodeStatus {
    fn from(result: BehaviorResult) -> Self {
        match result {
            BehaviorResult::Success => Self::Success,
            BehaviorResult::Fail => Self::Failure,
            BehaviorResult::Running => Self::Running,
        }
    }
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        })
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeCategory {
    Condition,
    Action,
    Control,
    Decorator,
    Subtree,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlackboardValue {
    Ref(Symbol, PortType),
    Literal(String),
}

impl From<&str> for BlackboardValue {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_owned())
    }
}

/// Mapping from the ports of a node to blackboard keys or literals.
pub type BBMap = HashMap<Symbol, BlackboardValue>;
pub type BehaviorCallback<'a> = &'a mut dyn FnMut(&dyn Any) -> Option<Box<dyn Any>>;

#[derive(PartialEq, Eq, Debug)]
pub enum NumChildren {
    Finite(usize),
    Infinite,
}

impl PartialOrd for NumChildren {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(match (self, other) {
            (NumChildren::Finite(_), NumChildren::Infinite) => std::cmp::Ordering::Less,
            (NumChildren::Infinite, NumChildren::Finite(_)) => std::cmp::Ordering::Greater,
            (NumChildren::Finite(lhs), NumChildren::Finite(rhs)) => lhs.cmp(rhs),
            (NumChildren::Infinite, NumChildren::Infinite) => return None,
        })
    }
}

pub trait BehaviorNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    /// Called when the node is halted while `Running`. The children, if any,
    /// are already reset when this is called.
    fn halt(&mut self, _ctx: &mut Context) {}

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(0)
    }

    fn category(&self) -> NodeCategory {
        match self.max_children() {
            NumChildren::Finite(0) => NodeCategory::Action,
            NumChildren::Finite(1) => NodeCategory::Decorator,
            _ => NodeCategory::Control,
        }
    }

    /// Opt-in access to the concrete type, used by [`Tree::visit_mut`].
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

#[macro_export]
macro_rules! hash_map {
    () => {
        std::collections::HashMap::default()
    };
    ($($name: literal => $val: expr),+ $(,)?) => {{
        let mut ret = std::collections::HashMap::default();
        $(ret.insert($name.into(), $val.into());)+
        ret
    }};
}
