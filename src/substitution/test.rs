use std::rc::Rc;

use super::*;
use crate::{
    BehaviorNodeContainer, Blackboard, Converters, ManualClock, StatefulActionNode, TickEnv,
};

#[test]
fn test_first_matching_rule_wins() {
    let mut rules = SubstitutionRules::default();
    rules
        .add("DoorClosed/*", Substitute::NodeKind("AlwaysFailure".to_owned()))
        .unwrap();
    rules
        .add("OpenDoor", Substitute::NodeKind("AlwaysSuccess".to_owned()))
        .unwrap();

    assert_eq!(
        rules.find("OpenDoor", "OpenDoor"),
        Some(("OpenDoor", &Substitute::NodeKind("AlwaysSuccess".to_owned())))
    );
    assert_eq!(
        rules.find("door", "DoorClosed/door").map(|(pattern, _)| pattern),
        Some("DoorClosed/*")
    );
    assert_eq!(rules.find("PickLock", "PickLock"), None);
}

#[test]
fn test_invalid_pattern() {
    let mut rules = SubstitutionRules::default();
    assert!(matches!(
        rules.add("Door/[", Substitute::NodeKind("AlwaysSuccess".to_owned())),
        Err(SubstitutionError::Pattern { .. })
    ));
    assert!(rules.is_empty());
}

const RULES_JSON: &str = r#"{
    "TestNodeConfigs": {
        "QuickSuccess": { "return_status": "SUCCESS", "async_ticks": 2 },
        "SlowFailure": {
            "return_status": "FAILURE",
            "async_delay": 100,
            "failure_script": "failed := true"
        }
    },
    "SubstitutionRules": {
        "Pick*": "SlowFailure",
        "PickLock": "QuickSuccess",
        "Smash*": "AlwaysFailure"
    }
}"#;

#[test]
fn test_rule_file_json() {
    let file = RuleFile::from_json(RULES_JSON).unwrap();
    let rules = file.resolve(|kind| kind == "AlwaysFailure").unwrap();
    let patterns: Vec<_> = rules.iter().map(|(pattern, _)| pattern.as_str()).collect();
    assert_eq!(patterns, vec!["Pick*", "PickLock", "Smash*"]);
    assert_eq!(
        rules[1].1,
        Substitute::Mock(MockConfig::returning(MockStatus::Success).with_async_ticks(2))
    );
    assert_eq!(rules[2].1, Substitute::NodeKind("AlwaysFailure".to_owned()));
}

#[test]
fn test_rule_file_yaml() {
    let file = RuleFile::from_yaml(
        r#"
TestNodeConfigs:
  Quick:
    return_status: FAILURE
    post_script: "count += 1"
SubstitutionRules:
  "DoorClosed/*": Quick
"#,
    )
    .unwrap();
    let rules = file.resolve(|_| false).unwrap();
    assert_eq!(rules.len(), 1);
    let Substitute::Mock(config) = &rules[0].1 else {
        panic!("expected a mock");
    };
    assert_eq!(config.return_status, MockStatus::Failure);
    assert_eq!(config.post_script.as_deref(), Some("count += 1"));
}

#[test]
fn test_rule_file_resolution_errors() {
    let file = RuleFile::from_json(RULES_JSON).unwrap();
    assert!(matches!(
        file.resolve(|_| false),
        Err(SubstitutionError::UnknownReplacement(name)) if name == "AlwaysFailure"
    ));

    let file = RuleFile::from_json(RULES_JSON).unwrap();
    assert!(matches!(
        file.resolve(|_| true),
        Err(SubstitutionError::Ambiguous(name)) if name == "SlowFailure"
    ));

    assert!(matches!(
        RuleFile::from_json("{ \"SubstitutionRules\": [] }"),
        Err(SubstitutionError::Json(_))
    ));
}

fn mock(config: MockConfig) -> BehaviorNodeContainer {
    let node = TestNode::new(&config, &ScriptEnums::default()).unwrap();
    BehaviorNodeContainer::new_node(StatefulActionNode::new(node))
}

#[test]
fn test_mock_async_ticks() {
    let mut node = mock(MockConfig::returning(MockStatus::Success).with_async_ticks(2));
    let mut ctx = Context::default();
    let mut results = vec![];
    for _ in 0..3 {
        results.push(node.tick(&mut |_| None, &mut ctx));
    }
    assert_eq!(
        results,
        vec![
            BehaviorResult::Running,
            BehaviorResult::Running,
            BehaviorResult::Success
        ]
    );
}

#[test]
fn test_mock_async_delay_and_scripts() {
    let clock = ManualClock::new();
    let env = TickEnv::new(Converters::default(), ScriptEnums::default(), Rc::new(clock.clone()));
    let mut ctx = Context::new(Blackboard::create(), Rc::new(env));
    ctx.blackboard().borrow_mut().set("count", 0i64).unwrap();

    let config = MockConfig {
        failure_script: Some("failed := true".to_owned()),
        success_script: Some("succeeded := true".to_owned()),
        ..MockConfig::returning(MockStatus::Failure)
            .with_async_delay(100)
            .with_post_script("count += 1")
    };
    let mut node = mock(config);

    assert_eq!(node.tick(&mut |_| None, &mut ctx), BehaviorResult::Running);
    clock.advance(Duration::from_millis(99));
    assert_eq!(node.tick(&mut |_| None, &mut ctx), BehaviorResult::Running);
    clock.advance(Duration::from_millis(1));
    assert_eq!(node.tick(&mut |_| None, &mut ctx), BehaviorResult::Fail);

    let bb = ctx.blackboard().borrow();
    assert_eq!(bb.get::<bool>("failed"), Ok(true));
    assert!(!bb.contains("succeeded"));
    assert_eq!(bb.get::<i64>("count"), Ok(1));
}

#[test]
fn test_mock_bad_script() {
    let config = MockConfig::returning(MockStatus::Success).with_post_script("a := (");
    assert!(TestNode::new(&config, &ScriptEnums::default()).is_err());
}
