use std::time::Duration;

use crate::{
    error::TickError, BehaviorCallback, BehaviorNode, BehaviorResult, Context, Lazy, NumChildren,
    PortSpec, Symbol, TickResult,
};

fn tick_only_child(arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
    ctx.tick_child(0, arg)
        .ok_or_else(|| TickError::Node("decorator has no child node".to_owned()))
}

macro_rules! decorator_children {
    () => {
        fn max_children(&self) -> NumChildren {
            NumChildren::Finite(1)
        }
    };
}

#[derive(Default)]
pub struct InverterNode;

impl BehaviorNode for InverterNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(match tick_only_child(arg, ctx)? {
            BehaviorResult::Running => BehaviorResult::Running,
            BehaviorResult::Success => BehaviorResult::Fail,
            BehaviorResult::Fail => BehaviorResult::Success,
        })
    }

    decorator_children!();
}

#[derive(Default)]
pub struct ForceSuccessNode;

impl BehaviorNode for ForceSuccessNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(match tick_only_child(arg, ctx)? {
            BehaviorResult::Running => BehaviorResult::Running,
            _ => BehaviorResult::Success,
        })
    }

    decorator_children!();
}

#[derive(Default)]
pub struct ForceFailureNode;

impl BehaviorNode for ForceFailureNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(match tick_only_child(arg, ctx)? {
            BehaviorResult::Running => BehaviorResult::Running,
            _ => BehaviorResult::Fail,
        })
    }

    decorator_children!();
}

static N: Lazy<Symbol> = Lazy::new(|| "n".into());

/// Repeats a succeeding child `n` times, one cycle per tick. `n = -1` repeats
/// forever.
pub struct RepeatNode {
    count_port: Symbol,
    done: i64,
}

impl RepeatNode {
    /// Reads the number of cycles from `port` instead of `n`.
    pub fn with_port(port: impl Into<Symbol>) -> Self {
        Self {
            count_port: port.into(),
            done: 0,
        }
    }
}

impl Default for RepeatNode {
    fn default() -> Self {
        Self::with_port(*N)
    }
}

impl BehaviorNode for RepeatNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<i64>(self.count_port)
            .with_description("Number of cycles, -1 for infinite")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let n = ctx.get_input::<i64>(self.count_port)?;
        if n == 0 {
            return Ok(BehaviorResult::Success);
        }
        match tick_only_child(arg, ctx)? {
            BehaviorResult::Success => {
                self.done += 1;
                ctx.reset_children();
                if n > 0 && self.done >= n {
                    self.done = 0;
                    Ok(BehaviorResult::Success)
                } else {
                    Ok(BehaviorResult::Running)
                }
            }
            BehaviorResult::Fail => {
                self.done = 0;
                ctx.reset_children();
                Ok(BehaviorResult::Fail)
            }
            BehaviorResult::Running => Ok(BehaviorResult::Running),
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.done = 0;
    }

    decorator_children!();
}

/// Restarts a failing child until it succeeds or `n` attempts have failed.
///
/// Each attempt takes its own tick; the node is `Running` in between.
/// `n = -1` retries forever.
pub struct RetryNode {
    count_port: Symbol,
    failures: i64,
}

impl RetryNode {
    /// Reads the number of attempts from `port` instead of `n`.
    pub fn with_port(port: impl Into<Symbol>) -> Self {
        Self {
            count_port: port.into(),
            failures: 0,
        }
    }
}

impl Default for RetryNode {
    fn default() -> Self {
        Self::with_port(*N)
    }
}

impl BehaviorNode for RetryNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<i64>(self.count_port)
            .with_description("Number of attempts, -1 for infinite")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let n = ctx.get_input::<i64>(self.count_port)?;
        match tick_only_child(arg, ctx)? {
            BehaviorResult::Fail => {
                self.failures += 1;
                ctx.reset_children();
                if n >= 0 && self.failures >= n {
                    self.failures = 0;
                    Ok(BehaviorResult::Fail)
                } else {
                    Ok(BehaviorResult::Running)
                }
            }
            BehaviorResult::Success => {
                self.failures = 0;
                ctx.reset_children();
                Ok(BehaviorResult::Success)
            }
            BehaviorResult::Running => Ok(BehaviorResult::Running),
        }
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.failures = 0;
    }

    decorator_children!();
}

static MSEC: Lazy<Symbol> = Lazy::new(|| "msec".into());

/// Fails and halts the child if it is still running `msec` milliseconds after
/// it was started, measured on the tree clock.
#[derive(Default)]
pub struct TimeoutNode {
    deadline: Option<Duration>,
}

impl BehaviorNode for TimeoutNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<u64>(*MSEC)]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let now = ctx.now();
        match self.deadline {
            None => {
                let msec = ctx.get_input::<u64>(*MSEC)?;
                self.deadline = Some(now + Duration::from_millis(msec));
            }
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                ctx.reset_children();
                return Ok(BehaviorResult::Fail);
            }
            _ => (),
        }
        let result = tick_only_child(arg, ctx)?;
        if result != BehaviorResult::Running {
            self.deadline = None;
        }
        Ok(result)
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.deadline = None;
    }

    decorator_children!();
}

/// Keeps ticking the child as long as it does not fail.
#[derive(Default)]
pub struct KeepRunningUntilFailureNode;

impl BehaviorNode for KeepRunningUntilFailureNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        match tick_only_child(arg, ctx)? {
            BehaviorResult::Fail => {
                ctx.reset_children();
                Ok(BehaviorResult::Fail)
            }
            BehaviorResult::Success => {
                ctx.reset_children();
                Ok(BehaviorResult::Running)
            }
            BehaviorResult::Running => Ok(BehaviorResult::Running),
        }
    }

    decorator_children!();
}
