use std::{rc::Rc, time::Duration};

use super::{StatefulAction, StatefulActionNode};
use crate::{
    error::ScriptError, script::Script, BehaviorCallback, BehaviorNode, BehaviorResult, Context,
    Lazy, NodeCategory, PortSpec, Symbol, TickResult, Value,
};

pub(crate) static VALUE: Lazy<Symbol> = Lazy::new(|| "value".into());
pub(crate) static OUTPUT: Lazy<Symbol> = Lazy::new(|| "output".into());

pub struct SetBoolNode;

impl BehaviorNode for SetBoolNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<bool>(*VALUE), PortSpec::output::<bool>(*OUTPUT)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let value = ctx.get_input::<bool>(*VALUE)?;
        ctx.set_output(*OUTPUT, value)?;
        Ok(BehaviorResult::Success)
    }
}

pub(crate) static INPUT: Lazy<Symbol> = Lazy::new(|| "input".into());

pub struct IsTrueNode;

impl BehaviorNode for IsTrueNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<bool>(*INPUT)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(if ctx.get_input::<bool>(*INPUT)? {
            BehaviorResult::Success
        } else {
            BehaviorResult::Fail
        })
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Condition
    }
}

pub struct AlwaysSuccessNode;

impl BehaviorNode for AlwaysSuccessNode {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(BehaviorResult::Success)
    }
}

pub struct AlwaysFailureNode;

impl BehaviorNode for AlwaysFailureNode {
    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(BehaviorResult::Fail)
    }
}

static CODE: Lazy<Symbol> = Lazy::new(|| "code".into());

/// Parses `code` unless it is the script evaluated last time, then runs it.
fn eval_cached(cache: &mut Option<Script>, code: &str, ctx: &Context) -> Result<Value, ScriptError> {
    if let Some(script) = cache.as_ref().filter(|script| script.source() == code) {
        return script.eval(ctx.blackboard());
    }
    let script = cache.insert(Script::parse(code, &ctx.env().enums)?);
    script.eval(ctx.blackboard())
}

/// Runs the script in the `code` port and succeeds.
#[derive(Default)]
pub struct ScriptNode {
    cache: Option<Script>,
}

impl BehaviorNode for ScriptNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<String>(*CODE)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let code = ctx.get_input::<String>(*CODE)?;
        eval_cached(&mut self.cache, &code, ctx)?;
        Ok(BehaviorResult::Success)
    }
}

/// Succeeds if the script in the `code` port evaluates to true.
#[derive(Default)]
pub struct ScriptConditionNode {
    cache: Option<Script>,
}

impl BehaviorNode for ScriptConditionNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<String>(*CODE)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let code = ctx.get_input::<String>(*CODE)?;
        Ok(match eval_cached(&mut self.cache, &code, ctx)? {
            Value::Bool(true) => BehaviorResult::Success,
            Value::Bool(false) => BehaviorResult::Fail,
            Value::Int(i) if i != 0 => BehaviorResult::Success,
            Value::Int(_) => BehaviorResult::Fail,
            value => return Err(ScriptError::NotBoolean(value.type_name().to_owned()).into()),
        })
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Condition
    }
}

static MSEC: Lazy<Symbol> = Lazy::new(|| "msec".into());

/// Waits for `msec` milliseconds of the tree clock without blocking.
#[derive(Default)]
pub struct Sleep {
    deadline: Duration,
}

impl StatefulAction for Sleep {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<u64>(*MSEC)]
    }

    fn on_start(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let msec = ctx.get_input::<u64>(*MSEC)?;
        self.deadline = ctx.now() + Duration::from_millis(msec);
        Ok(if msec == 0 {
            BehaviorResult::Success
        } else {
            BehaviorResult::Running
        })
    }

    fn on_running(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(if ctx.now() >= self.deadline {
            BehaviorResult::Success
        } else {
            BehaviorResult::Running
        })
    }
}

pub type SleepNode = StatefulActionNode<Sleep>;

pub(crate) type SimpleFn = Rc<dyn Fn(BehaviorCallback, &mut Context) -> TickResult>;

/// An action defined by a closure.
pub struct SimpleActionNode {
    ports: Vec<PortSpec>,
    f: SimpleFn,
}

impl SimpleActionNode {
    pub fn new(
        ports: Vec<PortSpec>,
        f: impl Fn(BehaviorCallback, &mut Context) -> TickResult + 'static,
    ) -> Self {
        Self::from_shared(ports, Rc::new(f))
    }

    pub(crate) fn from_shared(ports: Vec<PortSpec>, f: SimpleFn) -> Self {
        Self { ports, f }
    }
}

impl BehaviorNode for SimpleActionNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.ports.clone()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        (self.f)(arg, ctx)
    }
}

/// A condition defined by a closure. Returning `Running` is an error.
pub struct SimpleConditionNode(SimpleActionNode);

impl SimpleConditionNode {
    pub fn new(
        ports: Vec<PortSpec>,
        f: impl Fn(BehaviorCallback, &mut Context) -> TickResult + 'static,
    ) -> Self {
        Self(SimpleActionNode::new(ports, f))
    }

    pub(crate) fn from_shared(ports: Vec<PortSpec>, f: SimpleFn) -> Self {
        Self(SimpleActionNode::from_shared(ports, f))
    }
}

impl BehaviorNode for SimpleConditionNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.0.provided_ports()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        self.0.tick(arg, ctx)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Condition
    }
}
