use super::*;

impl<'src> TreeRootDef<'src> {
    fn new(name: &'src str, root: TreeDef<'src>) -> Self {
        Self {
            name,
            root,
            ports: vec![],
        }
    }
}

fn input<'src>(node_port: &'src str, key: &'src str) -> PortMap<'src> {
    PortMap {
        ty: PortType::Input,
        node_port,
        blackboard_value: BlackboardValue::Ref(key),
    }
}

#[test]
fn test_trees() {
    assert_eq!(
        parse_tree(
            "tree main = Sequence {
        }"
        ),
        Ok(("", TreeRootDef::new("main", TreeDef::new("Sequence"))))
    );

    assert_eq!(
        parse_tree(
            "tree main = Sequence {
                    PrintBodyNode
        }"
        ),
        Ok((
            "",
            TreeRootDef::new(
                "main",
                TreeDef::new_with_child("Sequence", TreeDef::new("PrintBodyNode"))
            )
        ))
    );
}

#[test]
fn test_tree_ports() {
    assert_eq!(
        parse_tree(
            r#"tree main = Sequence {
                PrintBodyNode(in_socket <- in_val, out_socket -> out_val, inout_socket <-> inout_val, lit <- "in_val")
    }"#
        ),
        Ok((
            "",
            TreeRootDef::new(
                "main",
                TreeDef::new_with_child(
                    "Sequence",
                    TreeDef::new_with_ports(
                        "PrintBodyNode",
                        vec![
                            input("in_socket", "in_val"),
                            PortMap {
                                ty: PortType::Output,
                                node_port: "out_socket",
                                blackboard_value: BlackboardValue::Ref("out_val"),
                            },
                            PortMap {
                                ty: PortType::InOut,
                                node_port: "inout_socket",
                                blackboard_value: BlackboardValue::Ref("inout_val"),
                            },
                            PortMap {
                                ty: PortType::Input,
                                node_port: "lit",
                                blackboard_value: BlackboardValue::Literal("in_val".to_string()),
                            },
                        ]
                    )
                )
            )
        ))
    );
}

#[test]
fn test_output_to_literal() {
    assert!(parse_tree(r#"tree main = Node(out -> "literal")"#).is_err());
}

#[test]
fn test_attributes() {
    let (rest, tree) = parse_tree(
        r#"tree main = Door(name = "Front", side <- left, _skipIf = "locked == true", _post = "n += 1")"#,
    )
    .unwrap();
    assert_eq!(rest, "");
    assert_eq!(tree.root.port_maps, vec![input("side", "left")]);
    assert_eq!(
        tree.root.attributes,
        vec![
            AttrDef {
                name: "name",
                value: "Front".to_owned()
            },
            AttrDef {
                name: "_skipIf",
                value: "locked == true".to_owned()
            },
            AttrDef {
                name: "_post",
                value: "n += 1".to_owned()
            },
        ]
    );
}

#[test]
fn test_subtree() {
    let (rest, source) = parse_file(
        "
tree main = Sequence {
    sub(port <- input)
}

tree sub(in port, out result: int) = Sequence {
    PrintBodyNode(in_socket <- in_val)
}
",
    )
    .unwrap();
    assert_eq!(rest, "");
    assert_eq!(source.tree_defs.len(), 2);
    assert_eq!(
        source.tree("main").map(|tree| &tree.root),
        Some(&TreeDef::new_with_child(
            "Sequence",
            TreeDef::new_with_ports("sub", vec![input("port", "input")])
        ))
    );

    let sub = source.tree("sub").unwrap();
    assert_eq!(
        sub.ports,
        vec![
            PortDef {
                direction: PortType::Input,
                name: "port",
                ty: None,
            },
            PortDef {
                direction: PortType::Output,
                name: "result",
                ty: Some("int"),
            }
        ]
    );
    assert!(source.tree("nope").is_none());
}

#[test]
fn test_comments() {
    let (rest, source) = parse_file(
        "# leading comment
tree main = Sequence { # after the brace
    # inside
    A # after a node
    B
}
",
    )
    .unwrap();
    assert_eq!(rest, "");
    assert_eq!(
        source.tree_defs,
        vec![TreeRootDef::new(
            "main",
            TreeDef::new_with_children("Sequence", vec![TreeDef::new("A"), TreeDef::new("B")])
        )]
    );
}

#[test]
fn test_condition() {
    assert_eq!(
        parse_file(
            "
tree main = Sequence {
    if (ConditionNode (input <- here)) {
        Yes
    } else {
        No
    }
}
"
        ),
        Ok((
            "",
            TreeSource {
                tree_defs: vec![TreeRootDef::new(
                    "main",
                    TreeDef::new_with_child(
                        "Sequence",
                        TreeDef::new_with_children(
                            "if",
                            vec![
                                TreeDef::new_with_ports("ConditionNode", vec![input("input", "here")]),
                                TreeDef::new_with_child("Sequence", TreeDef::new("Yes")),
                                TreeDef::new_with_child("Sequence", TreeDef::new("No")),
                            ],
                        )
                    )
                )]
            }
        ))
    );
}

#[test]
fn test_conditional_expr() {
    let (rest, expr) = parse_conditional_expr("!A && (B || C) || D").unwrap();
    assert_eq!(rest, "");
    assert_eq!(
        expr,
        TreeDef::new_with_children(
            "Fallback",
            vec![
                TreeDef::new_with_children(
                    "Sequence",
                    vec![
                        TreeDef::new_with_child("Inverter", TreeDef::new("A")),
                        TreeDef::new_with_children(
                            "Fallback",
                            vec![TreeDef::new("B"), TreeDef::new("C")]
                        ),
                    ]
                ),
                TreeDef::new("D"),
            ]
        )
    );

    let (_, expr) = parse_conditional_expr("A").unwrap();
    assert_eq!(expr, TreeDef::new("A"));
}

#[test]
fn test_keywords_need_a_boundary() {
    let (_, source) = parse_file("tree main = Sequence { iffy variable }").unwrap();
    assert_eq!(
        source.tree_defs[0].root.children,
        vec![TreeDef::new("iffy"), TreeDef::new("variable")]
    );
}

#[test]
fn test_var() {
    let (rest, source) = parse_file(
        "
tree main = Sequence {
    var a = true
    var b
    a
}
",
    )
    .unwrap();
    assert_eq!(rest, "");
    let root = &source.tree_defs[0].root;
    assert_eq!(
        root.vars,
        vec![
            VarDef {
                name: "a",
                init: Some("true")
            },
            VarDef {
                name: "b",
                init: None
            }
        ]
    );
    // Only an initialized variable is assigned
    assert_eq!(
        root.children,
        vec![
            TreeDef::new_with_ports(
                "SetBool",
                vec![
                    PortMap {
                        ty: PortType::Input,
                        node_port: "value",
                        blackboard_value: BlackboardValue::Literal("true".to_owned()),
                    },
                    PortMap {
                        ty: PortType::Output,
                        node_port: "output",
                        blackboard_value: BlackboardValue::Ref("a"),
                    },
                ]
            ),
            TreeDef::new("a"),
        ]
    );
}
