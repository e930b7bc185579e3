use std::{collections::HashSet, rc::Rc};

use tracing::{debug, info};

use super::nom_parser::{BlackboardValue as SourceValue, PortMap, TreeDef, TreeRootDef, TreeSource};
use crate::{
    error::{LoadError, PortError},
    nodes::SubtreeNode,
    script::Script,
    substitution::{Substitute, TestNode},
    tree::{Naming, SubtreeInfo},
    BBMap, BehaviorNode, BehaviorNodeContainer, Blackboard, BlackboardRef, BlackboardValue,
    IsTrueNode, NodeCategory, PortSpec, PortType, Registry, StatefulActionNode, Tree, Value,
    ValueType,
};

/// Instantiate the `main` tree from a AST of a tree source.
///
/// `check_ports` enables static checking of port availability before actually ticking.
/// It is useful to catch errors in a behavior tree source file, but you need to
/// implement [`crate::BehaviorNode::provided_ports`] to use it.
pub fn load(
    tree_source: &TreeSource,
    registry: &Registry,
    check_ports: bool,
) -> Result<Tree, LoadError> {
    load_tree(tree_source, registry, "main", check_ports)
}

/// Instantiate the tree named `name` from a AST of a tree source.
///
/// Nothing is returned unless the whole tree could be built.
pub fn load_tree(
    tree_source: &TreeSource,
    registry: &Registry,
    name: &str,
    check_ports: bool,
) -> Result<Tree, LoadError> {
    if let Some(duplicate) = tree_source.duplicate_tree() {
        return Err(LoadError::DuplicateTree(duplicate.to_owned()));
    }
    let tree = tree_source
        .tree(name)
        .ok_or_else(|| LoadError::MissingTree(name.to_owned()))?;

    let top = TreeStack { name, parent: None };

    let blackboard = Blackboard::create();
    let mut builder = Builder {
        registry,
        tree_source,
        check_ports,
        naming: Naming::default(),
        subtrees: vec![],
    };
    let scope = Scope::new(&blackboard, tree, String::new());
    let root = builder.build_node(&tree.root, &scope, &top)?;
    debug!("loaded tree {name} with {} subtree instances", builder.subtrees.len());

    Ok(Tree::new(
        root,
        blackboard,
        builder.subtrees,
        Rc::new(registry.tick_env()),
    ))
}

/// A mechanism to detect infinite recursion. It is a linked list in call stack.
/// You can traverse the link back to enumerate all the subtree names (which is effectively function names)
/// and check if a subtree name to be inserted is already there.
///
/// Recursive subtrees would need the nodes to be instantiated lazily, when the
/// subtree is actually ticked, so they are an error. Without this check they
/// would overflow the stack.
struct TreeStack<'a, 'src> {
    name: &'src str,
    parent: Option<&'a TreeStack<'a, 'src>>,
}

impl<'a, 'src> TreeStack<'a, 'src> {
    fn find(&self, name: &str) -> bool {
        if self.name == name {
            true
        } else if let Some(parent) = self.parent {
            parent.find(name)
        } else {
            false
        }
    }
}

/// The tree definition being instantiated.
struct Scope<'a, 'src> {
    blackboard: &'a BlackboardRef,
    /// Variables declared with `var` anywhere in the tree definition
    vars: HashSet<&'src str>,
    /// Prefix of the paths of the nodes in this scope
    prefix: String,
}

impl<'a, 'src> Scope<'a, 'src> {
    fn new(blackboard: &'a BlackboardRef, tree: &TreeRootDef<'src>, prefix: String) -> Self {
        fn collect<'src>(node: &TreeDef<'src>, vars: &mut HashSet<&'src str>) {
            vars.extend(node.vars.iter().map(|var| var.name));
            for child in &node.children {
                collect(child, vars);
            }
        }
        let mut vars = HashSet::new();
        collect(&tree.root, &mut vars);
        Self {
            blackboard,
            vars,
            prefix,
        }
    }
}

fn type_conflict(err: PortError) -> LoadError {
    match err {
        PortError::TypeMismatch {
            key,
            expected,
            found,
        } => LoadError::PortTypeConflict {
            key,
            first: expected,
            second: found,
        },
        err => LoadError::Parse(err.to_string()),
    }
}

struct Builder<'a, 'src> {
    registry: &'a Registry,
    tree_source: &'a TreeSource<'src>,
    check_ports: bool,
    naming: Naming,
    subtrees: Vec<SubtreeInfo>,
}

impl<'a, 'src> Builder<'a, 'src> {
    fn build_node(
        &mut self,
        def: &TreeDef<'src>,
        scope: &Scope<'_, 'src>,
        stack: &TreeStack,
    ) -> Result<BehaviorNodeContainer, LoadError> {
        let name = def
            .attributes
            .iter()
            .find(|attr| attr.name == "name")
            .map_or(def.ty, |attr| attr.value.as_str());
        let (uid, path) = self.naming.next(&scope.prefix, name);
        let mut kind = def.ty;

        let mut container = if def.children.is_empty()
            && def.port_maps.is_empty()
            && scope.vars.contains(def.ty)
        {
            // A reference to a variable is a condition on it
            kind = "IsTrue";
            let mut map = BBMap::new();
            map.insert(
                "input".into(),
                BlackboardValue::Ref(def.ty.into(), PortType::Input),
            );
            scope
                .blackboard
                .borrow_mut()
                .declare(def.ty, ValueType::Bool)
                .map_err(type_conflict)?;
            BehaviorNodeContainer::new(Box::new(IsTrueNode), map)
        } else if self.registry.contains(def.ty) {
            let (node, substituted) = self.instantiate(def, name, &path)?;
            let ports = node.provided_ports();
            let map = self.bind_ports(
                &path,
                &def.port_maps,
                &ports,
                scope.blackboard,
                self.check_ports && !substituted,
            )?;
            BehaviorNodeContainer::new(node, map)
        } else if let Some(tree) = self.tree_source.tree(def.ty) {
            self.build_subtree(def, tree, scope, stack, &path)?
        } else {
            return Err(LoadError::MissingNode(def.ty.to_owned()));
        };

        container.kind = kind.to_owned();
        container.name = name.to_owned();
        container.uid = uid;
        container.path = path;

        for attr in def.attributes.iter().filter(|attr| attr.name != "name") {
            let slot = container.conditions.slot(attr.name).ok_or_else(|| {
                LoadError::UnknownAttribute {
                    node: container.path.clone(),
                    attribute: attr.name.to_owned(),
                }
            })?;
            let script = Script::parse(&attr.value, &self.registry.enums).map_err(|source| {
                LoadError::Script {
                    node: container.path.clone(),
                    source,
                }
            })?;
            *slot = Some(script);
        }

        if container.is_subtree() {
            return Ok(container);
        }

        for child in &def.children {
            let child_node = self.build_node(child, scope, stack)?;
            container
                .add_child(child_node)
                .map_err(|e| LoadError::AddChildError(e, def.ty.to_string()))?;
        }

        if container.category() == NodeCategory::Decorator && container.children().len() != 1 {
            return Err(LoadError::ChildCount {
                node: container.path.clone(),
                expected: "exactly 1",
                got: container.children().len(),
            });
        }

        Ok(container)
    }

    /// Builds a registered node kind, or what a substitution rule replaces it
    /// with. Only leaves are substituted.
    fn instantiate(
        &self,
        def: &TreeDef<'src>,
        name: &str,
        path: &str,
    ) -> Result<(Box<dyn BehaviorNode>, bool), LoadError> {
        let substitute = if def.children.is_empty() {
            self.registry.substitutions.find(name, path)
        } else {
            None
        };
        let Some((pattern, substitute)) = substitute else {
            let node = self
                .registry
                .build(def.ty)
                .ok_or_else(|| LoadError::MissingNode(def.ty.to_owned()))?;
            return Ok((node, false));
        };

        let node: Box<dyn BehaviorNode> = match substitute {
            Substitute::NodeKind(kind) => {
                info!("{path}: substituting {} with {kind} (rule {pattern:?})", def.ty);
                self.registry
                    .build(kind)
                    .ok_or_else(|| LoadError::MissingNode(kind.clone()))?
            }
            Substitute::Mock(config) => {
                info!("{path}: substituting {} with a mock (rule {pattern:?})", def.ty);
                let node = TestNode::new(config, &self.registry.enums).map_err(|source| {
                    LoadError::Script {
                        node: path.to_owned(),
                        source,
                    }
                })?;
                Box::new(StatefulActionNode::new(node))
            }
        };
        Ok((node, true))
    }

    /// Checks the port mapping of a node against its declaration and binds
    /// the types of the blackboard keys it refers to.
    fn bind_ports(
        &self,
        node: &str,
        port_maps: &[PortMap<'src>],
        ports: &[PortSpec],
        blackboard: &BlackboardRef,
        check_ports: bool,
    ) -> Result<BBMap, LoadError> {
        let mut bbmap = BBMap::new();
        for entry in port_maps {
            let spec = ports.iter().find(|p| p.key == entry.node_port);
            if check_ports {
                match spec {
                    None => {
                        return Err(LoadError::PortUnmatch {
                            node: node.to_owned(),
                            port: entry.node_port.to_owned(),
                        })
                    }
                    Some(spec) if spec.ty != entry.ty => {
                        return Err(LoadError::PortIOUnmatch {
                            node: node.to_owned(),
                            port: entry.node_port.to_owned(),
                        })
                    }
                    _ => (),
                }
            }
            let value_type = spec.and_then(|spec| spec.value_type);
            let value = match entry.blackboard_value {
                SourceValue::Ref(key) => {
                    if let Some(ty) = value_type {
                        blackboard
                            .borrow_mut()
                            .declare(key, ty)
                            .map_err(type_conflict)?;
                    }
                    BlackboardValue::Ref(key.into(), entry.ty)
                }
                SourceValue::Literal(ref text) => {
                    if let Some(ty) = value_type {
                        self.registry
                            .converters
                            .parse_value(ty, text)
                            .map_err(|source| LoadError::Conversion {
                                node: node.to_owned(),
                                port: entry.node_port.to_owned(),
                                source,
                            })?;
                    }
                    BlackboardValue::Literal(text.clone())
                }
            };
            bbmap.insert(entry.node_port.into(), value);
        }

        if check_ports {
            if let Some(port) = ports
                .iter()
                .find(|port| port.is_mandatory() && !bbmap.contains_key(&port.key))
            {
                return Err(LoadError::MissingPort {
                    node: node.to_owned(),
                    port: port.key.to_string(),
                });
            }
        }
        Ok(bbmap)
    }

    /// Instantiates a subtree with its own blackboard scope.
    ///
    /// Ports mapped to keys of the parent scope are remapped, so that every
    /// access is forwarded to the parent. Ports mapped to literals become
    /// constants of the subtree scope.
    fn build_subtree(
        &mut self,
        def: &TreeDef<'src>,
        tree: &TreeRootDef<'src>,
        scope: &Scope<'_, 'src>,
        stack: &TreeStack,
        path: &str,
    ) -> Result<BehaviorNodeContainer, LoadError> {
        // Prevent infinite recursion
        if stack.find(def.ty) {
            return Err(LoadError::InfiniteRecursion {
                node: def.ty.to_owned(),
            });
        }
        if !def.children.is_empty() {
            return Err(LoadError::ChildCount {
                node: path.to_owned(),
                expected: "no",
                got: def.children.len(),
            });
        }

        let params = tree
            .ports
            .iter()
            .map(|port| {
                let value_type = port
                    .ty
                    .map(|ty| {
                        self.registry
                            .converters
                            .value_type_by_name(ty)
                            .or_else(|| ValueType::from_builtin_name(ty))
                            .ok_or_else(|| LoadError::UnknownPortType {
                                tree: tree.name.to_owned(),
                                ty: ty.to_owned(),
                            })
                    })
                    .transpose()?;
                Ok(PortSpec {
                    ty: port.direction,
                    key: port.name.into(),
                    value_type,
                    default: None,
                    description: None,
                })
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        // Bind the types in the parent scope the same way as for a node
        let bbmap = self.bind_ports(path, &def.port_maps, &params, scope.blackboard, self.check_ports)?;

        let subtree_bb = Blackboard::create_child(scope.blackboard);
        for (port, value) in &bbmap {
            let value_type = params
                .iter()
                .find(|param| param.key == *port)
                .and_then(|param| param.value_type);
            let mut bb = subtree_bb.borrow_mut();
            match value {
                BlackboardValue::Ref(external, _) => bb.add_remapping(*port, *external),
                BlackboardValue::Literal(text) => {
                    let value = match value_type {
                        Some(ty) => self.registry.converters.parse_value(ty, text).map_err(
                            |source| LoadError::Conversion {
                                node: path.to_owned(),
                                port: port.to_string(),
                                source,
                            },
                        )?,
                        None => Value::Str(text.clone()),
                    };
                    bb.set_value(*port, value).map_err(type_conflict)?;
                }
            }
        }
        for param in &params {
            if let (Some(ty), false) = (param.value_type, bbmap.contains_key(&param.key)) {
                subtree_bb
                    .borrow_mut()
                    .declare(param.key, ty)
                    .map_err(type_conflict)?;
            }
        }

        debug!("instantiating subtree {} at {path}", def.ty);
        self.subtrees.push(SubtreeInfo {
            tree_id: def.ty.to_owned(),
            instance_path: path.to_owned(),
            blackboard: subtree_bb.clone(),
        });

        let tree_stack = TreeStack {
            name: def.ty,
            parent: Some(stack),
        };
        let child_scope = Scope::new(&subtree_bb, tree, format!("{path}/"));
        let root = self.build_node(&tree.root, &child_scope, &tree_stack)?;

        let mut container = BehaviorNodeContainer::new(Box::new(SubtreeNode::new(params)), bbmap);
        container.scope = Some(subtree_bb.clone());
        container
            .add_child(root)
            .map_err(|e| LoadError::AddChildError(e, def.ty.to_string()))?;
        Ok(container)
    }
}

#[cfg(test)]
mod test;
