mod decorator;
mod leaf;
mod stateful;

pub use self::decorator::{
    ForceFailureNode, ForceSuccessNode, InverterNode, KeepRunningUntilFailureNode, RepeatNode,
    RetryNode, TimeoutNode,
};
pub use self::leaf::{
    AlwaysFailureNode, AlwaysSuccessNode, IsTrueNode, ScriptConditionNode, ScriptNode,
    SetBoolNode, SimpleActionNode, SimpleConditionNode, SleepNode,
};
pub use self::stateful::{StatefulAction, StatefulActionNode};

use crate::{
    error::TickError, BehaviorCallback, BehaviorNode, BehaviorResult, Context, Lazy, NodeCategory, NodeStatus,
    NumChildren, PortSpec, Symbol, TickResult,
};

/// SubtreeNode is the root of a subtree instance.
///
/// The local blackboard scope is owned by the container of this node, which
/// swaps it in while the subtree is ticked or halted.
pub struct SubtreeNode {
    params: Vec<PortSpec>,
}

impl SubtreeNode {
    pub fn new(params: Vec<PortSpec>) -> Self {
        Self { params }
    }
}

impl BehaviorNode for SubtreeNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.params.clone()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        Ok(ctx.tick_child(0, arg).unwrap_or(BehaviorResult::Fail))
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Subtree
    }
}

/// Ticks children in order until one fails or is running.
///
/// Children that already succeeded are skipped while a later child is
/// running. Every child is reset when the sequence completes.
#[derive(Default)]
pub struct SequenceNode {
    current_child: Option<usize>,
}

impl BehaviorNode for SequenceNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let from = self.current_child.unwrap_or(0);
        for i in from..ctx.num_children() {
            match ctx.tick_child(i, arg) {
                Some(BehaviorResult::Fail) => {
                    self.current_child = None;
                    ctx.reset_children();
                    return Ok(BehaviorResult::Fail);
                }
                Some(BehaviorResult::Running) => {
                    self.current_child = Some(i);
                    return Ok(BehaviorResult::Running);
                }
                _ => (),
            }
        }
        self.current_child = None;
        ctx.reset_children();
        Ok(BehaviorResult::Success)
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.current_child = None;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

/// A sequence that resumes from the failed child instead of starting over.
#[derive(Default)]
pub struct SequenceWithMemoryNode {
    current_child: usize,
}

impl BehaviorNode for SequenceWithMemoryNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        for i in self.current_child..ctx.num_children() {
            match ctx.tick_child(i, arg) {
                Some(BehaviorResult::Fail) => {
                    self.current_child = i;
                    ctx.halt_child(i);
                    return Ok(BehaviorResult::Fail);
                }
                Some(BehaviorResult::Running) => {
                    self.current_child = i;
                    return Ok(BehaviorResult::Running);
                }
                _ => (),
            }
        }
        self.current_child = 0;
        ctx.reset_children();
        Ok(BehaviorResult::Success)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

/// Halts the running children after `idx`.
fn halt_running_after(ctx: &mut Context, idx: usize) {
    for j in idx + 1..ctx.num_children() {
        if ctx.child_status(j) == Some(NodeStatus::Running) {
            ctx.halt_child(j);
        }
    }
}

#[derive(Default)]
pub struct ReactiveSequenceNode;

impl BehaviorNode for ReactiveSequenceNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        for i in 0..ctx.num_children() {
            match ctx.tick_child(i, arg) {
                Some(BehaviorResult::Fail) => {
                    ctx.reset_children();
                    return Ok(BehaviorResult::Fail);
                }
                Some(BehaviorResult::Running) => {
                    halt_running_after(ctx, i);
                    return Ok(BehaviorResult::Running);
                }
                _ => (),
            }
        }
        ctx.reset_children();
        Ok(BehaviorResult::Success)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

#[derive(Default)]
pub struct FallbackNode {
    current_child: Option<usize>,
}

impl BehaviorNode for FallbackNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let from = self.current_child.unwrap_or(0);
        for i in from..ctx.num_children() {
            match ctx.tick_child(i, arg) {
                Some(BehaviorResult::Success) => {
                    self.current_child = None;
                    ctx.reset_children();
                    return Ok(BehaviorResult::Success);
                }
                Some(BehaviorResult::Running) => {
                    self.current_child = Some(i);
                    return Ok(BehaviorResult::Running);
                }
                _ => (),
            }
        }
        self.current_child = None;
        ctx.reset_children();
        Ok(BehaviorResult::Fail)
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.current_child = None;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

#[derive(Default)]
pub struct ReactiveFallbackNode;

impl BehaviorNode for ReactiveFallbackNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        for i in 0..ctx.num_children() {
            match ctx.tick_child(i, arg) {
                Some(BehaviorResult::Success) => {
                    ctx.reset_children();
                    return Ok(BehaviorResult::Success);
                }
                Some(BehaviorResult::Running) => {
                    halt_running_after(ctx, i);
                    return Ok(BehaviorResult::Running);
                }
                _ => (),
            }
        }
        ctx.reset_children();
        Ok(BehaviorResult::Fail)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

static SUCCESS_COUNT: Lazy<Symbol> = Lazy::new(|| "success_count".into());
static FAILURE_COUNT: Lazy<Symbol> = Lazy::new(|| "failure_count".into());

/// Ticks every child that has not completed yet.
///
/// Negative thresholds count from the number of children, `-1` meaning all of
/// them.
#[derive(Default)]
pub struct ParallelNode;

fn threshold(value: i64, num_children: usize) -> usize {
    if value < 0 {
        (num_children as i64 + 1 + value).max(0) as usize
    } else {
        value as usize
    }
}

impl BehaviorNode for ParallelNode {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::input::<i64>(*SUCCESS_COUNT).with_default("-1"),
            PortSpec::input::<i64>(*FAILURE_COUNT).with_default("1"),
        ]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let num_children = ctx.num_children();
        let success_threshold = threshold(ctx.get_input(*SUCCESS_COUNT)?, num_children);
        let failure_threshold = threshold(ctx.get_input(*FAILURE_COUNT)?, num_children);
        if success_threshold > num_children {
            return Err(TickError::Node(format!(
                "success threshold {success_threshold} exceeds {num_children} children"
            )));
        }
        if failure_threshold > num_children {
            return Err(TickError::Node(format!(
                "failure threshold {failure_threshold} exceeds {num_children} children"
            )));
        }

        let (mut successes, mut failures) = (0, 0);
        for i in 0..num_children {
            let status = match ctx.child_status(i) {
                Some(status) if status.is_completed() => status,
                _ => ctx.tick_child(i, arg).map_or(NodeStatus::Idle, NodeStatus::from),
            };
            match status {
                NodeStatus::Success => successes += 1,
                NodeStatus::Failure => failures += 1,
                _ => (),
            }
        }

        let result = if successes >= success_threshold {
            BehaviorResult::Success
        } else if failures >= failure_threshold || num_children - failures < success_threshold {
            BehaviorResult::Fail
        } else {
            return Ok(BehaviorResult::Running);
        };
        ctx.reset_children();
        Ok(result)
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

/// `if` node: a condition, a `then` branch and an optional `else` branch.
#[derive(Default)]
pub struct IfNode {
    condition_result: Option<BehaviorResult>,
}

impl BehaviorNode for IfNode {
    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let condition_result = match self.condition_result {
            Some(result) => result,
            None => ctx.tick_child(0, arg).unwrap_or(BehaviorResult::Fail),
        };
        if condition_result == BehaviorResult::Running {
            return Ok(BehaviorResult::Running);
        }

        // Remember the last conditional result in case the child node returns Running
        self.condition_result = Some(condition_result);

        let branch_result = match condition_result {
            BehaviorResult::Success => ctx.tick_child(1, arg).unwrap_or(BehaviorResult::Fail),
            // Be aware that lack of else clause is not an error, so the result is Success.
            _ => ctx.tick_child(2, arg).unwrap_or(BehaviorResult::Success),
        };

        // Clear the last state if either true or false branch has completed. This node should
        // evaluate condition again if it's ticked later.
        if branch_result != BehaviorResult::Running {
            self.condition_result = None;
            ctx.reset_children();
        }

        Ok(branch_result)
    }

    fn halt(&mut self, _ctx: &mut Context) {
        self.condition_result = None;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(3)
    }

    fn category(&self) -> NodeCategory {
        NodeCategory::Control
    }
}
