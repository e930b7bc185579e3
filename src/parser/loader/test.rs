use super::*;
use crate::{
    boxify, error::LoadError, parse_file, BehaviorCallback, BehaviorResult, Context, NodeStatus,
    TickResult,
};

struct PrintNode;

impl BehaviorNode for PrintNode {
    fn tick(&mut self, arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        arg(&42);
        Ok(BehaviorResult::Success)
    }
}

struct SendToArg;

impl BehaviorNode for SendToArg {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::input::<i64>("input")]
    }

    fn tick(&mut self, arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let input = ctx.get_input::<i64>("input")?;
        arg(&input);
        Ok(BehaviorResult::Success)
    }
}

struct Double;

impl BehaviorNode for Double {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![
            PortSpec::input::<i64>("input"),
            PortSpec::output::<i64>("output"),
        ]
    }

    fn tick(&mut self, _arg: BehaviorCallback, ctx: &mut Context) -> TickResult {
        let input = ctx.get_input::<i64>("input")?;
        ctx.set_output("output", input * 2)?;
        Ok(BehaviorResult::Success)
    }
}

struct Untyped;

impl BehaviorNode for Untyped {
    fn provided_ports(&self) -> Vec<PortSpec> {
        vec![PortSpec::new_in("input"), PortSpec::new_out("output")]
    }

    fn tick(&mut self, _arg: BehaviorCallback, _ctx: &mut Context) -> TickResult {
        Ok(BehaviorResult::Success)
    }
}

fn registry() -> Registry {
    let mut registry = Registry::default();
    registry.register("PrintNode", boxify(|| PrintNode));
    registry.register("SendToArg", boxify(|| SendToArg));
    registry.register("Double", boxify(|| Double));
    registry.register("Untyped", boxify(|| Untyped));
    registry
}

fn collect_i64(tree: &mut Tree) -> (BehaviorResult, Vec<i64>) {
    let mut values = vec![];
    let result = tree.tick_once(&mut |val| {
        if let Some(val) = val.downcast_ref::<i64>() {
            values.push(*val);
        }
        None
    });
    (result, values)
}

#[test]
fn test_subtree() {
    let source = r#"
tree main = Sequence {
    sub
}

tree sub = Fallback {
    PrintNode
}
    "#;

    let (_, tree_source) = parse_file(source).unwrap();
    let mut tree = load(&tree_source, &registry(), true).unwrap();

    let mut values = vec![];
    let result = tree.tick_once(&mut |val| {
        if let Some(val) = val.downcast_ref::<i32>() {
            values.push(*val);
        }
        None
    });
    assert_eq!(result, BehaviorResult::Success);
    assert_eq!(values, vec![42]);

    assert_eq!(tree.subtrees().len(), 1);
    assert_eq!(tree.subtrees()[0].tree_id, "sub");
    assert_eq!(tree.subtrees()[0].instance_path, "sub");
    let paths: Vec<_> = tree.uid_to_path().into_iter().collect();
    assert_eq!(
        paths,
        vec![
            (1, "Sequence".to_owned()),
            (2, "sub".to_owned()),
            (3, "sub/Fallback".to_owned()),
            (4, "sub/PrintNode".to_owned()),
        ]
    );
}

#[test]
fn test_subtree_map() {
    let source = r#"
tree main = Sequence {
    sub(input <- "96")
}

tree sub(in input: int, out output) = Fallback {
    SendToArg (input <- input)
}
"#;
    let mut tree = registry().create_tree_from_text(source, "main").unwrap();
    assert_eq!(collect_i64(&mut tree), (BehaviorResult::Success, vec![96]));
}

#[test]
fn test_subtree_output_round_trip() {
    let source = r#"
tree main = Sequence {
    sub(input <- "7", output -> doubled)
    SendToArg(input <- doubled)
}

tree sub(in input: int, out output: int) = Double(input <- input, output -> output)
"#;
    let mut tree = registry().create_tree_from_text(source, "main").unwrap();
    assert_eq!(collect_i64(&mut tree), (BehaviorResult::Success, vec![14]));
    assert_eq!(tree.blackboard().borrow().get::<i64>("doubled").unwrap(), 14);

    // The subtree scope does not leak its own keys into the parent
    assert!(!tree.blackboard().borrow().contains("input"));
    let subtree = &tree.subtrees()[0];
    assert_eq!(subtree.blackboard.borrow().get::<i64>("input").unwrap(), 7);
}

#[test]
fn test_subtree_instances_get_distinct_paths() {
    let source = r#"
tree main = Sequence {
    sub
    sub
}

tree sub = PrintNode
"#;
    let tree = registry().create_tree_from_text(source, "main").unwrap();
    let subtrees: Vec<_> = tree
        .subtrees()
        .iter()
        .map(|info| info.instance_path.as_str())
        .collect();
    assert_eq!(subtrees, vec!["sub", "sub::4"]);
    assert!(tree.find("sub/PrintNode").is_some());
    assert!(tree.find("sub::4/PrintNode").is_some());
}

#[test]
fn test_load_tree_by_name() {
    let source = r#"
tree main = AlwaysFailure
tree other = PrintNode
"#;
    let (_, tree_source) = parse_file(source).unwrap();
    let mut tree = load_tree(&tree_source, &registry(), "other", true).unwrap();
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);

    assert!(matches!(
        load_tree(&tree_source, &registry(), "nope", true),
        Err(LoadError::MissingTree(name)) if name == "nope"
    ));
}

#[test]
fn test_condition() {
    let source = r#"
tree main = Sequence {
    var ready = true
    if (ready && !AlwaysFailure) {
        SendToArg(input <- "1")
    } else {
        SendToArg(input <- "2")
    }
    if (!ready || AlwaysFailure) {
        SendToArg(input <- "3")
    } else {
        SendToArg(input <- "4")
    }
}
"#;
    let mut tree = registry().create_tree_from_text(source, "main").unwrap();
    assert_eq!(collect_i64(&mut tree), (BehaviorResult::Success, vec![1, 4]));
    assert_eq!(tree.blackboard().borrow().get::<bool>("ready").unwrap(), true);
}

#[test]
fn test_var_reference_is_a_condition() {
    let source = r#"
tree main = Sequence {
    var flag = false
    flag
    PrintNode
}
"#;
    let mut tree = registry().create_tree_from_text(source, "main").unwrap();
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Fail);
    let flag = tree.find("flag").unwrap();
    assert_eq!(flag.kind(), "IsTrue");
    assert_eq!(flag.blackboard_key("input"), Some(&crate::BlackboardValue::Ref("flag".into(), crate::PortType::Input)));
    assert_eq!(tree.find("PrintNode").unwrap().status(), NodeStatus::Idle);
}

#[test]
fn test_attributes() {
    let source = r#"
tree main = Sequence {
    AlwaysSuccess(name = "Greeter", _onSuccess = "greeted := true")
    AlwaysFailure(_skipIf = "greeted")
}
"#;
    let mut tree = registry().create_tree_from_text(source, "main").unwrap();
    assert_eq!(tree.tick_once(&mut |_| None), BehaviorResult::Success);
    assert_eq!(tree.blackboard().borrow().get::<bool>("greeted").unwrap(), true);

    let greeter = tree.find("Greeter").unwrap();
    assert_eq!(greeter.name(), "Greeter");
    assert_eq!(greeter.kind(), "AlwaysSuccess");
}

fn load_err(source: &str) -> LoadError {
    match registry().create_tree_from_text(source, "main") {
        Ok(_) => panic!("{source} should not load"),
        Err(err) => err,
    }
}

#[test]
fn test_missing_node() {
    assert!(matches!(
        load_err("tree main = Sequence { Nope }"),
        LoadError::MissingNode(name) if name == "Nope"
    ));
}

#[test]
fn test_port_errors() {
    assert!(matches!(
        load_err(r#"tree main = SendToArg(nope <- "1")"#),
        LoadError::PortUnmatch { node, port } if node == "SendToArg" && port == "nope"
    ));
    assert!(matches!(
        load_err("tree main = SendToArg(input -> key)"),
        LoadError::PortIOUnmatch { port, .. } if port == "input"
    ));
    assert!(matches!(
        load_err("tree main = SendToArg"),
        LoadError::MissingPort { port, .. } if port == "input"
    ));
    assert!(matches!(
        load_err(r#"tree main = SendToArg(input <- "many")"#),
        LoadError::Conversion { port, .. } if port == "input"
    ));
}

#[test]
fn test_port_type_conflict() {
    let source = r#"
tree main = Sequence {
    Double(input <- "1", output -> key)
    SetBool(value <- "true", output -> key)
}
"#;
    assert!(matches!(
        load_err(source),
        LoadError::PortTypeConflict { key, first, second }
            if key == "key" && first == "int" && second == "bool"
    ));

    // Untyped ports never conflict
    let source = r#"
tree main = Sequence {
    Untyped(output -> key)
    SetBool(value <- "true", output -> key)
}
"#;
    assert!(registry().create_tree_from_text(source, "main").is_ok());
}

#[test]
fn test_unchecked_ports() {
    let (_, tree_source) = parse_file(r#"tree main = SendToArg(nope <- "1")"#).unwrap();
    assert!(load(&tree_source, &registry(), false).is_ok());
}

#[test]
fn test_infinite_recursion() {
    let source = r#"
tree main = Sequence {
    sub
}

tree sub = Sequence {
    main
}
"#;
    assert!(matches!(
        load_err(source),
        LoadError::InfiniteRecursion { node } if node == "main"
    ));
}

#[test]
fn test_subtree_errors() {
    assert!(matches!(
        load_err("tree main = sub\ntree sub(in x: Pose) = PrintNode"),
        LoadError::UnknownPortType { tree, ty } if tree == "sub" && ty == "Pose"
    ));
    assert!(matches!(
        load_err("tree main = sub\ntree sub(in x) = PrintNode"),
        LoadError::MissingPort { port, .. } if port == "x"
    ));
    assert!(matches!(
        load_err("tree main = sub { PrintNode }\ntree sub = PrintNode"),
        LoadError::ChildCount { got: 1, .. }
    ));
}

#[test]
fn test_child_count() {
    assert!(matches!(
        load_err("tree main = Inverter"),
        LoadError::ChildCount { node, got: 0, .. } if node == "Inverter"
    ));
    assert!(matches!(
        load_err("tree main = Inverter { PrintNode PrintNode }"),
        LoadError::AddChildError(_, node) if node == "Inverter"
    ));
}

#[test]
fn test_attribute_errors() {
    assert!(matches!(
        load_err(r#"tree main = PrintNode(_unknown = "true")"#),
        LoadError::UnknownAttribute { attribute, .. } if attribute == "_unknown"
    ));
    assert!(matches!(
        load_err(r#"tree main = PrintNode(_post = "x := ")"#),
        LoadError::Script { node, .. } if node == "PrintNode"
    ));
}

#[test]
fn test_trailing_garbage() {
    assert!(matches!(
        load_err("tree main = PrintNode\n}"),
        LoadError::Parse(message) if message.contains("line 2")
    ));
}

#[test]
fn test_duplicate_tree() {
    let source = r#"
tree main = AlwaysSuccess
tree other = PrintNode
tree main = AlwaysFailure
"#;
    let (_, tree_source) = parse_file(source).unwrap();
    assert_eq!(tree_source.duplicate_tree(), Some("main"));
    // Even a tree which is defined once is not built from such a source
    assert!(matches!(
        load_tree(&tree_source, &registry(), "other", true),
        Err(LoadError::DuplicateTree(name)) if name == "main"
    ));
    assert!(matches!(load_err(source), LoadError::DuplicateTree(name) if name == "main"));
}
