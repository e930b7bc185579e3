use ::behavior_tree_engine::{BehaviorResult, Registry};
use tracing::info;
use tracing_subscriber::EnvFilter;

static TREE: &str = r#"
tree main = Sequence {
    Fallback {
        OpenDoor
        PickLock(_onSuccess = "picked := true")
    }
    Walk
}
"#;

/// Replaces the hardware actions, so the tree runs without a robot.
static RULES: &str = r#"{
    "TestNodeConfigs": {
        "SlowPick": {
            "return_status": "SUCCESS",
            "async_delay": 300,
            "post_script": "attempts := 1"
        }
    },
    "SubstitutionRules": {
        "OpenDoor": "AlwaysFailure",
        "PickLock": "SlowPick",
        "Walk": "AlwaysSuccess"
    }
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut registry = Registry::default();
    registry.register_simple_action("OpenDoor", vec![], |_, _| {
        unreachable!("replaced by a substitution rule")
    });
    registry.register_simple_action("PickLock", vec![], |_, _| {
        unreachable!("replaced by a substitution rule")
    });
    registry.register_simple_action("Walk", vec![], |_, _| {
        unreachable!("replaced by a substitution rule")
    });
    registry.load_substitution_rules_json(RULES)?;

    let mut tree = registry.create_tree_from_text(TREE, "main")?;
    let mut ticks = 0;
    let result = tree.tick_while_running(&mut |_| None, || {
        ticks += 1;
        std::thread::sleep(std::time::Duration::from_millis(50));
    });
    assert_eq!(result, BehaviorResult::Success);
    info!("done after {ticks} extra ticks");
    print!("{tree}");
    println!(
        "picked: {:?}",
        tree.blackboard().borrow().get::<bool>("picked")
    );
    Ok(())
}
