use crate::{BehaviorCallback, BehaviorNode, BehaviorResult, Context, PortSpec, TickResult};

/// A long running action split into start, poll and cancel steps.
///
/// None of the methods may block; work that takes time returns `Running`
/// and is polled again on the next tick.
pub trait StatefulAction {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![]
    }

    /// Called on the first tick after the node was idle or completed.
    fn on_start(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    /// Called on every following tick while the action is running.
    fn on_running(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult;

    /// Called once if the action is halted while running.
    fn on_halted(&mut self, _ctx: &mut Context) {}
}

pub struct StatefulActionNode<T> {
    action: T,
    running: bool,
}

impl<T: StatefulAction> StatefulActionNode<T> {
    pub fn new(action: T) -> Self {
        Self {
            action,
            running: false,
        }
    }

    pub fn action(&self) -> &T {
        &self.action
    }
}

impl<T: Default + StatefulAction> Default for StatefulActionNode<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: StatefulAction + 'static> BehaviorNode for StatefulActionNode<T> {
    fn provided_ports(&self) -> Vec<PortSpec> {
        self.action.provided_ports()
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let result = if self.running {
            self.action.on_running(arg, ctx)
        } else {
            self.action.on_start(arg, ctx)
        };
        self.running = matches!(result, Ok(BehaviorResult::Running));
        result
    }

    fn halt(&mut self, ctx: &mut Context) {
        if self.running {
            self.running = false;
            self.action.on_halted(ctx);
        }
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }
}
