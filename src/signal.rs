//! Exchanging signals with code outside of the tree, possibly on other threads.
//!
//! The tree itself is ticked on a single thread. A [`SignalCell`] is the only
//! value shared with other threads: they [`SignalCell::deliver`] a boolean
//! and a [`WaitForSignal`] node picks it up on a later tick. In the other
//! direction, [`PublishState`] hands a string to a [`StatePublisher`].
//!
//! ```
//! # use behavior_tree_engine::{*, signal::*};
//! let (sender, receiver) = std::sync::mpsc::channel();
//! let cell = SignalCell::default();
//! let mut registry = Registry::default();
//! register_signal_nodes(&mut registry, cell.clone(), ChannelPublisher::new(sender));
//!
//! let mut tree = registry
//!     .create_tree_from_text(
//!         r#"tree main = Sequence { PublishState(state <- "waiting") WaitForSignal }"#,
//!         "main",
//!     )
//!     .unwrap();
//! assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Running);
//! assert_eq!(receiver.recv().unwrap(), "waiting");
//!
//! let remote = cell.clone();
//! std::thread::spawn(move || remote.deliver(true)).join().unwrap();
//! assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
//! ```

use std::{
    rc::Rc,
    sync::{mpsc::Sender, Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use crate::{
    boxify, BehaviorCallback, BehaviorNode, BehaviorResult, Context, Lazy, PortSpec, Registry,
    StatefulAction, StatefulActionNode, Symbol, TickError, TickResult,
};

#[derive(Debug, Default)]
struct Signal {
    has_new_value: bool,
    value: bool,
}

/// A boolean handed over from another thread, consumed at most once.
#[derive(Debug, Clone, Default)]
pub struct SignalCell(Arc<Mutex<Signal>>);

impl SignalCell {
    fn lock(&self) -> MutexGuard<Signal> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a value, replacing one that was not taken yet.
    pub fn deliver(&self, value: bool) {
        let mut signal = self.lock();
        signal.has_new_value = true;
        signal.value = value;
    }

    /// The value delivered since the last `take` or `reset`, if any.
    pub fn take(&self) -> Option<bool> {
        let mut signal = self.lock();
        if signal.has_new_value {
            signal.has_new_value = false;
            Some(signal.value)
        } else {
            None
        }
    }

    pub fn reset(&self) {
        *self.lock() = Signal::default();
    }

    pub fn has_new_value(&self) -> bool {
        self.lock().has_new_value
    }
}

/// Where [`PublishState`] sends its strings.
pub trait StatePublisher {
    fn publish(&self, state: &str) -> Result<(), String>;
}

/// Forwards published states to a channel.
pub struct ChannelPublisher {
    sender: Sender<String>,
}

impl ChannelPublisher {
    pub fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }
}

impl StatePublisher for ChannelPublisher {
    fn publish(&self, state: &str) -> Result<(), String> {
        self.sender
            .send(state.to_owned())
            .map_err(|_| "the receiver of published states is gone".to_owned())
    }
}

/// Running until a value is delivered to the cell, then `Success` for `true`
/// and `Fail` for `false`. Values delivered before the node started are
/// discarded.
pub struct WaitForSignal {
    cell: SignalCell,
}

impl WaitForSignal {
    pub fn new(cell: SignalCell) -> Self {
        Self { cell }
    }
}

impl StatefulAction for WaitForSignal {
    fn on_start(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        self.cell.reset();
        Ok(BehaviorResult::Running)
    }

    fn on_running(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(match self.cell.take() {
            Some(true) => BehaviorResult::Success,
            Some(false) => BehaviorResult::Fail,
            None => BehaviorResult::Running,
        })
    }
}

static STATE: Lazy<Symbol> = Lazy::new(|| "state".into());

/// Publishes the string of its `state` port.
pub struct PublishState {
    publisher: Rc<dyn StatePublisher>,
}

impl PublishState {
    pub fn new(publisher: Rc<dyn StatePublisher>) -> Self {
        Self { publisher }
    }
}

impl BehaviorNode for PublishState {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<String>(*STATE)]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let state = ctx.get_input::<String>(*STATE)?;
        debug!("publishing state {state:?}");
        if let Err(err) = self.publisher.publish(&state) {
            warn!("cannot publish state {state:?}: {err}");
            return Err(TickError::Node(err));
        }
        Ok(BehaviorResult::Success)
    }
}

/// Registers `WaitForSignal` and `PublishState` bound to `cell` and
/// `publisher`.
pub fn register_signal_nodes(
    registry: &mut Registry,
    cell: SignalCell,
    publisher: impl StatePublisher + 'static,
) {
    let publisher: Rc<dyn StatePublisher> = Rc::new(publisher);
    registry.register(
        "WaitForSignal",
        boxify(move || StatefulActionNode::new(WaitForSignal::new(cell.clone()))),
    );
    registry.register(
        "PublishState",
        boxify(move || PublishState::new(publisher.clone())),
    );
}

#[cfg(test)]
mod test;
