use super::*;
use crate::{AlwaysFailureNode, AlwaysSuccessNode, FallbackNode, Registry, SleepNode};

#[test]
fn test_from_root() {
    let mut root = BehaviorNodeContainer::new_node(FallbackNode::default()).with_name("root");
    root.add_child(BehaviorNodeContainer::new_node(AlwaysFailureNode).with_name("fail"))
        .unwrap();
    root.add_child(BehaviorNodeContainer::new_node(AlwaysSuccessNode).with_name("fail"))
        .unwrap();
    let mut tree = Tree::from_root(root);

    let paths: Vec<_> = tree.uid_to_path().into_values().collect();
    assert_eq!(paths, vec!["root", "fail", "fail::3"]);
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
    assert_eq!(tree.root_status(), NodeStatus::Success);
}

#[test]
fn test_display() {
    let registry = Registry::default();
    let tree = registry
        .create_tree_from_text(
            r#"
tree main = Sequence {
    AlwaysSuccess(name = "first")
    Wait
}

tree Wait = Sleep(msec <- "10")
"#,
            "main",
        )
        .unwrap();
    assert_eq!(
        tree.to_string(),
        "Sequence #1 IDLE\n  first (AlwaysSuccess) #2 IDLE\n  Wait #3 IDLE\n    Sleep #4 IDLE\n"
    );
}

#[test]
fn test_visit_mut() {
    let registry = Registry::default();
    let mut tree = registry
        .create_tree_from_text(
            r#"tree main = Sequence { Sleep(msec <- "10") Sleep(msec <- "20") }"#,
            "main",
        )
        .unwrap();

    let mut sleeps = 0;
    tree.visit_mut(|node| {
        let any = node.node_mut().as_any_mut();
        if any.map_or(false, |any| any.is::<SleepNode>()) {
            sleeps += 1;
        }
    });
    assert_eq!(sleeps, 2);
    assert_eq!(tree.find("Sleep::3").map(|node| node.kind()), Some("Sleep"));
}
