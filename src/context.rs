use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    error::PortError, script::ScriptEnums, BBMap, BehaviorCallback, BehaviorNodeContainer,
    BehaviorResult, Blackboard, BlackboardRef, BlackboardValue, Clock, Converters, NodeStatus,
    PortSpec, PortType, PortValue, StatusListener, Symbol, SystemClock, Value,
};

/// State shared by every node of a tree during ticks.
pub struct TickEnv {
    pub(crate) converters: Converters,
    pub(crate) enums: ScriptEnums,
    pub(crate) clock: Rc<dyn Clock>,
    listeners: RefCell<Vec<Rc<dyn StatusListener>>>,
}

impl Default for TickEnv {
    fn default() -> Self {
        Self::new(
            Converters::default(),
            ScriptEnums::default(),
            Rc::new(SystemClock::default()),
        )
    }
}

impl TickEnv {
    pub fn new(converters: Converters, enums: ScriptEnums, clock: Rc<dyn Clock>) -> Self {
        Self {
            converters,
            enums,
            clock,
            listeners: RefCell::new(vec![]),
        }
    }

    pub fn add_listener(&self, listener: Rc<dyn StatusListener>) {
        self.listeners.borrow_mut().push(listener);
    }

    pub(crate) fn notify(&self, uid: u16, path: &str, prev: NodeStatus, status: NodeStatus) {
        // Clone so that a listener may register another one while being notified
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener.on_status_change(uid, path, prev, status);
        }
    }
}

/// The view of the tree a node gets while it is ticked.
///
/// The port mapping, the declared ports and the children of the node being
/// ticked are swapped in by [`BehaviorNodeContainer`] for the duration of the
/// tick, so the node only ever sees its own.
pub struct Context {
    blackboard: BlackboardRef,
    pub(crate) blackboard_map: BBMap,
    pub(crate) ports: Vec<PortSpec>,
    pub(crate) child_nodes: Vec<BehaviorNodeContainer>,
    pub(crate) env: Rc<TickEnv>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Blackboard::create(), Rc::new(TickEnv::default()))
    }
}

impl Context {
    pub fn new(blackboard: BlackboardRef, env: Rc<TickEnv>) -> Self {
        Self {
            blackboard,
            blackboard_map: BBMap::new(),
            ports: vec![],
            child_nodes: vec![],
            env,
        }
    }

    /// The blackboard scope of the tree or subtree the node belongs to.
    pub fn blackboard(&self) -> &BlackboardRef {
        &self.blackboard
    }

    pub(crate) fn swap_blackboard(&mut self, blackboard: &mut BlackboardRef) {
        std::mem::swap(&mut self.blackboard, blackboard);
    }

    pub fn env(&self) -> &Rc<TickEnv> {
        &self.env
    }

    pub fn converters(&self) -> &Converters {
        &self.env.converters
    }

    /// Current time of the tree clock.
    pub fn now(&self) -> Duration {
        self.env.clock.now()
    }

    fn port_spec(&self, key: Symbol) -> Option<&PortSpec> {
        self.ports.iter().find(|port| port.key == key)
    }

    /// Reads a port without converting it.
    ///
    /// A literal comes back as [`Value::Str`]; so does a declared default that
    /// is used because the port is not mapped or the key is unset.
    pub fn get_input_value(&self, port: impl Into<Symbol>) -> Result<Value, PortError> {
        let key = port.into();
        let spec = self.port_spec(key);
        if spec.map_or(false, |spec| spec.ty == PortType::Output) {
            return Err(PortError::ReadFromOutput(key.to_string()));
        }
        let default = || spec.and_then(|spec| spec.default.clone()).map(Value::Str);
        match self.blackboard_map.get(&key) {
            Some(BlackboardValue::Literal(literal)) => Ok(Value::Str(literal.clone())),
            Some(BlackboardValue::Ref(_, PortType::Output)) => {
                Err(PortError::ReadFromOutput(key.to_string()))
            }
            Some(BlackboardValue::Ref(mapped, _)) => {
                match self.blackboard.borrow().get_value(*mapped) {
                    Err(err) if err.is_not_found() => default().ok_or(err),
                    res => res,
                }
            }
            None => match default() {
                Some(value) => Ok(value),
                None => self.blackboard.borrow().get_value(key),
            },
        }
    }

    /// Reads a port as `T`. Strings are parsed with the registered converters.
    pub fn get_input<T: PortValue>(&self, port: impl Into<Symbol>) -> Result<T, PortError> {
        let key = port.into();
        let value = self.get_input_value(key)?;
        if let Some(value) = T::from_value(&value) {
            return Ok(value);
        }
        match value {
            Value::Str(text) => Ok(self.env.converters.parse::<T>(&text)?),
            value => Err(PortError::TypeMismatch {
                key: key.to_string(),
                expected: T::value_type().to_string(),
                found: value.type_name().to_owned(),
            }),
        }
    }

    pub fn set_output_value(&mut self, port: impl Into<Symbol>, value: Value) -> Result<(), PortError> {
        let key = port.into();
        if self.port_spec(key).map_or(false, |spec| spec.ty == PortType::Input) {
            return Err(PortError::WriteToInput(key.to_string()));
        }
        let mapped = match self.blackboard_map.get(&key) {
            None => key,
            Some(BlackboardValue::Ref(_, PortType::Input)) => {
                return Err(PortError::WriteToInput(key.to_string()))
            }
            Some(BlackboardValue::Ref(mapped, _)) => *mapped,
            Some(BlackboardValue::Literal(_)) => {
                return Err(PortError::WriteToLiteral(key.to_string()))
            }
        };
        self.blackboard.borrow_mut().set_value(mapped, value)
    }

    pub fn set_output<T: PortValue>(&mut self, port: impl Into<Symbol>, value: T) -> Result<(), PortError> {
        self.set_output_value(port, value.into_value())
    }

    pub fn num_children(&self) -> usize {
        self.child_nodes.len()
    }

    pub fn child_status(&self, idx: usize) -> Option<NodeStatus> {
        self.child_nodes.get(idx).map(BehaviorNodeContainer::status)
    }

    /// Ticks the child at `idx`, or returns `None` if there is no such child.
    pub fn tick_child(&mut self, idx: usize, arg: BehaviorCallback) -> Option<BehaviorResult> {
        let mut children = std::mem::take(&mut self.child_nodes);
        let res = children.get_mut(idx).map(|child| child.tick(arg, self));
        self.child_nodes = children;
        res
    }

    /// Halts the child at `idx` and its descendants. No-op if it is `Idle`.
    pub fn halt_child(&mut self, idx: usize) {
        let mut children = std::mem::take(&mut self.child_nodes);
        if let Some(child) = children.get_mut(idx) {
            child.halt(self);
        }
        self.child_nodes = children;
    }

    /// Halts every child, bringing them back to `Idle`.
    pub fn reset_children(&mut self) {
        let mut children = std::mem::take(&mut self.child_nodes);
        for child in children.iter_mut() {
            child.halt(self);
        }
        self.child_nodes = children;
    }
}
