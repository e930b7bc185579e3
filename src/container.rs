use tracing::{trace, warn};

use crate::{
    error::{AddChildError, AddChildResult, ScriptError, TickError},
    script::Script,
    BBMap, BehaviorCallback, BehaviorNode, BehaviorResult, BlackboardRef, BlackboardValue, Context,
    NodeCategory, NodeStatus, NumChildren, PortSpec, Symbol,
};

/// Scripts attached to a node with attributes in the tree source.
#[derive(Default)]
pub(crate) struct Conditions {
    pub failure_if: Option<Script>,
    pub success_if: Option<Script>,
    pub skip_if: Option<Script>,
    pub on_success: Option<Script>,
    pub on_failure: Option<Script>,
    pub post: Option<Script>,
    pub on_halted: Option<Script>,
}

impl Conditions {
    pub fn slot(&mut self, attribute: &str) -> Option<&mut Option<Script>> {
        Some(match attribute {
            "_failureIf" => &mut self.failure_if,
            "_successIf" => &mut self.success_if,
            "_skipIf" => &mut self.skip_if,
            "_onSuccess" => &mut self.on_success,
            "_onFailure" => &mut self.on_failure,
            "_post" => &mut self.post,
            "_onHalted" => &mut self.on_halted,
            _ => return None,
        })
    }

    fn check_pre(&self, blackboard: &BlackboardRef) -> Result<Option<BehaviorResult>, ScriptError> {
        let checks = [
            (&self.failure_if, BehaviorResult::Fail),
            (&self.success_if, BehaviorResult::Success),
            (&self.skip_if, BehaviorResult::Success),
        ];
        for (script, result) in checks {
            if let Some(script) = script {
                if script.eval_bool(blackboard)? {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    fn run_post(&self, blackboard: &BlackboardRef, result: BehaviorResult) -> Result<(), ScriptError> {
        let specific = match result {
            BehaviorResult::Success => &self.on_success,
            BehaviorResult::Fail => &self.on_failure,
            BehaviorResult::Running => return Ok(()),
        };
        for script in [specific, &self.post].into_iter().flatten() {
            script.eval(blackboard)?;
        }
        Ok(())
    }
}

pub struct BehaviorNodeContainer {
    /// Instance name of the node, the kind unless given with `name = "..."`
    pub(crate) name: String,
    /// Name of the type of the node, or of the subtree
    pub(crate) kind: String,
    pub(crate) uid: u16,
    pub(crate) path: String,
    pub(crate) node: Box<dyn BehaviorNode>,
    pub(crate) blackboard_map: BBMap,
    pub(crate) ports: Vec<PortSpec>,
    pub(crate) child_nodes: Vec<BehaviorNodeContainer>,
    /// Blackboard scope of the children, set on subtree instances
    pub(crate) scope: Option<BlackboardRef>,
    pub(crate) conditions: Conditions,
    status: NodeStatus,
    last_error: Option<TickError>,
}

impl BehaviorNodeContainer {
    pub fn new(node: Box<dyn BehaviorNode>, blackboard_map: BBMap) -> Self {
        let ports = node.provided_ports();
        Self {
            name: String::new(),
            kind: String::new(),
            uid: 0,
            path: String::new(),
            node,
            blackboard_map,
            ports,
            child_nodes: vec![],
            scope: None,
            conditions: Conditions::default(),
            status: NodeStatus::Idle,
            last_error: None,
        }
    }

    pub fn new_raw(node: Box<dyn BehaviorNode>) -> Self {
        Self::new(node, BBMap::new())
    }

    pub fn new_node(node: impl BehaviorNode + 'static) -> Self {
        Self::new_raw(Box::new(node))
    }

    /// Sets the instance name, used as the path by [`crate::Tree::from_root`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn swap_context(&mut self, ctx: &mut Context) {
        std::mem::swap(&mut self.child_nodes, &mut ctx.child_nodes);
        std::mem::swap(&mut self.blackboard_map, &mut ctx.blackboard_map);
        std::mem::swap(&mut self.ports, &mut ctx.ports);
        if let Some(scope) = self.scope.as_mut() {
            ctx.swap_blackboard(scope);
        }
    }

    pub fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> BehaviorResult {
        let result = match self.tick_inner(arg, ctx) {
            Ok(result) => {
                self.last_error = None;
                result
            }
            Err(err) => {
                warn!("{} ({}) failed: {err}", self.path_or_kind(), self.kind);
                self.last_error = Some(err);
                BehaviorResult::Fail
            }
        };
        self.set_status(ctx, result.into());
        result
    }

    fn tick_inner(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> Result<BehaviorResult, TickError> {
        if self.status != NodeStatus::Running {
            if let Some(result) = self.conditions.check_pre(ctx.blackboard())? {
                return Ok(result);
            }
        }

        self.swap_context(ctx);
        let result = self.node.tick(arg, ctx);
        self.swap_context(ctx);
        let result = result?;

        if result == BehaviorResult::Running && self.node.category() == NodeCategory::Condition {
            return Err(TickError::ConditionRunning(self.path_or_kind().to_owned()));
        }

        self.conditions.run_post(ctx.blackboard(), result)?;
        Ok(result)
    }

    /// Stops the node and all of its descendants, bringing them back to `Idle`.
    ///
    /// Descendants are reset first. The halt hook of the node and its
    /// `_onHalted` script only run if the node was `Running`.
    pub fn halt(&mut self, ctx: &mut Context) {
        if self.status == NodeStatus::Idle {
            return;
        }
        let was_running = self.status == NodeStatus::Running;
        self.swap_context(ctx);
        ctx.reset_children();
        if was_running {
            self.node.halt(ctx);
        }
        self.swap_context(ctx);
        if was_running {
            if let Some(script) = &self.conditions.on_halted {
                if let Err(err) = script.eval(ctx.blackboard()) {
                    warn!("_onHalted of {} failed: {err}", self.path_or_kind());
                }
            }
        }
        self.set_status(ctx, NodeStatus::Idle);
    }

    fn set_status(&mut self, ctx: &Context, status: NodeStatus) {
        if self.status == status {
            return;
        }
        let prev = std::mem::replace(&mut self.status, status);
        trace!("{} [{}]: {prev} -> {status}", self.path_or_kind(), self.uid);
        ctx.env.notify(self.uid, &self.path, prev, status);
    }

    fn path_or_kind(&self) -> &str {
        if self.path.is_empty() {
            &self.kind
        } else {
            &self.path
        }
    }

    pub fn add_child(&mut self, child: BehaviorNodeContainer) -> AddChildResult {
        if NumChildren::Finite(self.child_nodes.len()) < self.node.max_children() {
            self.child_nodes.push(child);
            Ok(())
        } else {
            Err(AddChildError::TooManyNodes)
        }
    }

    pub fn children(&self) -> &[BehaviorNodeContainer] {
        &self.child_nodes
    }

    pub(crate) fn children_mut(&mut self) -> &mut [BehaviorNodeContainer] {
        &mut self.child_nodes
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// The cause of the last failure, if the node failed because of an error.
    pub fn last_error(&self) -> Option<&TickError> {
        self.last_error.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn uid(&self) -> u16 {
        self.uid
    }

    /// Full path of the node, unique within the tree.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn category(&self) -> NodeCategory {
        self.node.category()
    }

    pub fn node_mut(&mut self) -> &mut dyn BehaviorNode {
        self.node.as_mut()
    }

    pub fn blackboard_map(&self) -> &BBMap {
        &self.blackboard_map
    }

    pub fn ports(&self) -> &[PortSpec] {
        &self.ports
    }

    /// Port mappings in the order the node declares its ports.
    pub fn port_map(&self) -> impl Iterator<Item = (&PortSpec, &BlackboardValue)> {
        self.ports
            .iter()
            .filter_map(|port| Some((port, self.blackboard_map.get(&port.key)?)))
    }

    pub fn blackboard_key(&self, port: impl Into<Symbol>) -> Option<&BlackboardValue> {
        self.blackboard_map.get(&port.into())
    }

    pub fn is_subtree(&self) -> bool {
        self.scope.is_some()
    }

    pub fn subtree_blackboard(&self) -> Option<&BlackboardRef> {
        self.scope.as_ref()
    }
}
