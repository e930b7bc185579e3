use std::{cell::Cell, rc::Rc, thread, time::Duration};

use ::behavior_tree_engine::{
    BehaviorResult, Lazy, PortSpec, Registry, Symbol, TracingLogger, TreeObserver,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

static DOOR: &str = r#"
# Run with RUST_LOG=debug to see every status change
tree main = Sequence {
    Fallback {
        Inverter { IsDoorClosed }
        DoorClosed
    }
    PassThroughDoor
}

tree DoorClosed = Fallback {
    OpenDoor
    Retry (n <- "5") { PickLock (tool <- "hairpin") }
    SmashDoor
}
"#;

static TOOL: Lazy<Symbol> = Lazy::new(|| "tool".into());

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut registry = Registry::default();
    registry.register_simple_condition("IsDoorClosed", vec![], |_, _| {
        info!("the door is closed");
        Ok(BehaviorResult::Success)
    });
    registry.register_simple_action("OpenDoor", vec![], |_, _| {
        info!("the door is locked");
        Ok(BehaviorResult::Fail)
    });
    let attempts = Rc::new(Cell::new(0));
    registry.register_simple_action(
        "PickLock",
        vec![PortSpec::input::<String>(*TOOL)],
        move |_, ctx| {
            let tool = ctx.get_input::<String>(*TOOL)?;
            attempts.set(attempts.get() + 1);
            info!("picking the lock with a {tool}, attempt {}", attempts.get());
            Ok(if attempts.get() < 3 {
                BehaviorResult::Fail
            } else {
                BehaviorResult::Success
            })
        },
    );
    registry.register_simple_action("SmashDoor", vec![], |_, _| {
        info!("smashing the door");
        Ok(BehaviorResult::Success)
    });
    registry.register_simple_action("PassThroughDoor", vec![], |_, _| {
        info!("passing through the door");
        Ok(BehaviorResult::Success)
    });

    let mut tree = registry.create_tree_from_text(DOOR, "main")?;
    tree.add_listener(Rc::new(TracingLogger));
    let observer = TreeObserver::new(&tree);

    let result = tree.tick_while_running(&mut |_| None, || {
        thread::sleep(Duration::from_millis(100))
    });
    info!("finished with {result:?}");

    for (uid, stats) in observer.all_statistics() {
        let path = &observer.uid_to_path()[&uid];
        println!(
            "{path:<24} transitions {:>2}, success {:>2}, failure {:>2}",
            stats.transitions_count, stats.success_count, stats.failure_count
        );
    }
    Ok(())
}
