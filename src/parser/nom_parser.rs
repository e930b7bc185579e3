use std::collections::HashSet;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0, newline, none_of, one_of, space0},
    combinator::{not, opt, recognize, value},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::PortType;

#[derive(Debug, PartialEq)]
pub struct PortDef<'src> {
    pub direction: PortType,
    pub name: &'src str,
    pub ty: Option<&'src str>,
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn newlines(i: &str) -> IResult<&str, ()> {
    delimited(space0, many1(one_of("\r\n")), space0)(i).map(|(rest, _)| (rest, ()))
}

fn port_def<'src>(i: &'src str) -> IResult<&'src str, PortDef<'src>> {
    let (i, inout) = delimited(
        multispace0,
        alt((tag("inout"), tag("in"), tag("out"))),
        space0,
    )(i)?;
    let (i, name) = identifier(i)?;
    let (i, ty) = opt(preceded(delimited(space0, char(':'), space0), identifier))(i)?;
    let (i, _) = multispace0(i)?;
    let direction = match inout {
        "in" => PortType::Input,
        "out" => PortType::Output,
        "inout" => PortType::InOut,
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Verify,
            )))
        }
    };
    Ok((
        i,
        PortDef {
            direction,
            name,
            ty,
        },
    ))
}

fn open_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, char('('), multispace0))(i)
}

fn close_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, char(')'), space0))(i)
}

fn open_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('{'), space0))(i)
}

fn close_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, char('}'), space0))(i)
}

/// A node in the tree source, before it is resolved against the registry.
#[derive(Debug, PartialEq, Eq)]
pub struct TreeDef<'src> {
    pub(crate) ty: &'src str,
    pub(crate) port_maps: Vec<PortMap<'src>>,
    pub(crate) attributes: Vec<AttrDef<'src>>,
    pub(crate) children: Vec<TreeDef<'src>>,
    pub(crate) vars: Vec<VarDef<'src>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct VarDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) init: Option<&'src str>,
}

/// `name = "value"` in the port list of a node.
#[derive(Debug, PartialEq, Eq)]
pub struct AttrDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) value: String,
}

impl<'src> TreeDef<'src> {
    fn new(ty: &'src str) -> Self {
        Self::new_with_children(ty, vec![])
    }

    fn new_with_child(ty: &'src str, child: TreeDef<'src>) -> Self {
        Self::new_with_children(ty, vec![child])
    }

    fn new_with_children(ty: &'src str, children: Vec<TreeDef<'src>>) -> Self {
        Self {
            ty,
            port_maps: vec![],
            attributes: vec![],
            children,
            vars: vec![],
        }
    }

    fn new_with_tree_elems(ty: &'src str, children: Vec<TreeElem<'src>>) -> Self {
        Self::new_with_ports_and_tree_elems(ty, vec![], children)
    }

    fn new_with_ports(ty: &'src str, port_maps: Vec<PortMap<'src>>) -> Self {
        Self {
            port_maps,
            ..Self::new(ty)
        }
    }

    fn new_with_ports_and_tree_elems(
        ty: &'src str,
        port_items: Vec<PortItem<'src>>,
        children: Vec<TreeElem<'src>>,
    ) -> Self {
        let (children, vars) = children.into_iter().fold((vec![], vec![]), |mut acc, cur| {
            match cur {
                TreeElem::Node(node) => acc.0.push(node),
                TreeElem::Var(var) => {
                    if let Some(init) = var.init {
                        acc.0.push(TreeDef::new_with_ports(
                            "SetBool",
                            vec![
                                PortMap {
                                    node_port: "value",
                                    blackboard_value: BlackboardValue::Literal(init.to_owned()),
                                    ty: PortType::Input,
                                },
                                PortMap {
                                    node_port: "output",
                                    blackboard_value: BlackboardValue::Ref(var.name),
                                    ty: PortType::Output,
                                },
                            ],
                        ));
                    }
                    acc.1.push(var);
                }
            }
            acc
        });

        let (port_maps, attributes) =
            port_items
                .into_iter()
                .fold((vec![], vec![]), |mut acc, cur| {
                    match cur {
                        PortItem::Map(map) => acc.0.push(map),
                        PortItem::Attr(attr) => acc.1.push(attr),
                    }
                    acc
                });

        Self {
            ty,
            port_maps,
            attributes,
            children,
            vars,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BlackboardValue<'src> {
    /// Litral value could have decoded, so it is an owned string.
    Literal(String),
    Ref(&'src str),
}

#[derive(Debug, PartialEq, Eq)]
pub struct PortMap<'src> {
    pub(crate) ty: PortType,
    pub(crate) node_port: &'src str,
    pub(crate) blackboard_value: BlackboardValue<'src>,
}

fn subtree_ports_def<'src>(i: &'src str) -> IResult<&'src str, Vec<PortDef<'src>>> {
    let (i, ports) = delimited(
        open_paren,
        many0(delimited(space0, port_def, opt(char(',')))),
        close_paren,
    )(i)?;
    Ok((i, ports))
}

#[derive(Debug, PartialEq)]
pub struct TreeRootDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) root: TreeDef<'src>,
    pub(crate) ports: Vec<PortDef<'src>>,
}

fn parse_tree(i: &str) -> IResult<&str, TreeRootDef> {
    let (i, _) = delimited(multispace0, tag("tree"), space0)(i)?;

    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, ports) = opt(subtree_ports_def)(i)?;

    let (i, _) = delimited(space0, tag("="), space0)(i)?;

    let (i, root) = parse_tree_node(i)?;

    Ok((
        i,
        TreeRootDef {
            name,
            root,
            ports: ports.unwrap_or_default(),
        },
    ))
}

fn line_comment<T>(i: &str) -> IResult<&str, Option<T>> {
    let (i, _) = tuple((space0, char('#'), opt(is_not("\n\r"))))(i)?;

    Ok((i, None))
}

fn line_comment_tree_elem(i: &str) -> IResult<&str, Option<TreeElem>> {
    line_comment::<TreeElem>(i)
}

fn some<I, R>(f: impl Fn(I) -> IResult<I, R>) -> impl Fn(I) -> IResult<I, Option<R>> {
    move |i| {
        let (i, res) = f(i)?;
        Ok((i, Some(res)))
    }
}

#[derive(Debug)]
enum TreeElem<'src> {
    Node(TreeDef<'src>),
    Var(VarDef<'src>),
}

fn tree_children(i: &str) -> IResult<&str, Vec<TreeElem>> {
    let (i, _) = many0(newlines)(i)?;

    let (i, v) = many0(delimited(
        space0,
        alt((
            line_comment,
            some(var_decl),
            some(parse_condition_node),
            some(parse_tree_elem),
        )),
        many0(newlines),
    ))(i)?;

    let (i, _) = many0(newlines)(i)?;

    Ok((i, v.into_iter().flatten().collect()))
}

fn parse_tree_node(i: &str) -> IResult<&str, TreeDef> {
    let (i, ty) = delimited(space0, identifier, space0)(i)?;

    let (i, port_items) = opt(delimited(open_paren, port_items, close_paren))(i)?;

    let (i, children) = opt(delimited(open_brace, tree_children, close_brace))(i)?;

    let (i, _) = opt(line_comment_tree_elem)(i)?;

    Ok((
        i,
        TreeDef::new_with_ports_and_tree_elems(
            ty,
            port_items.unwrap_or_default(),
            children.unwrap_or_default(),
        ),
    ))
}

fn parse_tree_elem(i: &str) -> IResult<&str, TreeElem> {
    let (i, elem) = parse_tree_node(i)?;
    Ok((i, TreeElem::Node(elem)))
}

/// Builds a node of `ty` from operands joined by an operator, or returns the
/// only operand as is.
fn join_operands<'src>(ty: &'src str, mut operands: Vec<TreeDef<'src>>) -> TreeDef<'src> {
    if operands.len() == 1 {
        if let Some(operand) = operands.pop() {
            return operand;
        }
    }
    TreeDef::new_with_children(ty, operands)
}

fn conditional_factor(i: &str) -> IResult<&str, TreeDef> {
    let (i, _) = multispace0(i)?;
    if let Ok((i, _)) = char::<_, nom::error::Error<&str>>('!')(i) {
        let (i, res) = conditional_factor(i)?;
        return Ok((i, TreeDef::new_with_child("Inverter", res)));
    }
    alt((
        delimited(open_paren, parse_conditional_expr, close_paren),
        parse_tree_node,
    ))(i)
}

fn conditional_and(i: &str) -> IResult<&str, TreeDef> {
    let (i, operands) = separated_list1(
        delimited(multispace0, tag("&&"), multispace0),
        conditional_factor,
    )(i)?;
    Ok((i, join_operands("Sequence", operands)))
}

/// `!`, `&&`, `||` and parentheses over nodes, desugared to `Inverter`,
/// `Sequence` and `Fallback`.
fn parse_conditional_expr(i: &str) -> IResult<&str, TreeDef> {
    let (i, operands) = separated_list1(
        delimited(multispace0, tag("||"), multispace0),
        conditional_and,
    )(i)?;
    Ok((i, join_operands("Fallback", operands)))
}

fn parse_condition_node(i: &str) -> IResult<&str, TreeElem> {
    let (i, _ty) = delimited(space0, terminated(tag("if"), not(alphanumeric1)), space0)(i)?;

    let (i, condition) = delimited(open_paren, parse_conditional_expr, close_paren)(i)?;

    let (i, then_children) = delimited(open_brace, tree_children, close_brace)(i)?;

    let (i, else_children) = opt(delimited(
        pair(delimited(multispace0, tag("else"), space0), open_brace),
        tree_children,
        close_brace,
    ))(i)?;

    let mut children = vec![
        condition,
        TreeDef::new_with_tree_elems("Sequence", then_children),
    ];

    if let Some(else_children) = else_children {
        children.push(TreeDef::new_with_tree_elems("Sequence", else_children));
    }

    Ok((
        i,
        TreeElem::Node(TreeDef::new_with_children("if", children)),
    ))
}

fn var_decl(i: &str) -> IResult<&str, TreeElem> {
    let (i, _var) = delimited(space0, terminated(tag("var"), not(alphanumeric1)), space0)(i)?;

    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, init) = opt(delimited(
        delimited(space0, char('='), space0),
        alt((tag("true"), tag("false"))),
        space0,
    ))(i)?;

    let (i, _) = opt(line_comment_tree_elem)(i)?;

    Ok((i, TreeElem::Var(VarDef { name, init })))
}

#[derive(Debug)]
enum PortItem<'src> {
    Map(PortMap<'src>),
    Attr(AttrDef<'src>),
}

fn port_items(i: &str) -> IResult<&str, Vec<PortItem>> {
    many0(delimited(
        multispace0,
        alt((
            |i| port_map(i).map(|(i, map)| (i, PortItem::Map(map))),
            |i| attribute(i).map(|(i, attr)| (i, PortItem::Attr(attr))),
        )),
        many0(pair(multispace0, char(','))),
    ))(i)
}

fn attribute(i: &str) -> IResult<&str, AttrDef> {
    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, _) = terminated(char('='), not(char('=')))(i)?;

    let (i, value) = delimited(space0, str_literal, space0)(i)?;

    Ok((i, AttrDef { name, value }))
}

fn port_map(i: &str) -> IResult<&str, PortMap> {
    let (i, node_port) = delimited(space0, identifier, space0)(i)?;

    let (i, inout) = delimited(space0, alt((tag("<->"), tag("<-"), tag("->"))), space0)(i)?;

    let (i, blackboard_name) = delimited(
        space0,
        alt((bb_ref, |i| {
            str_literal(i).map(|(i, s)| (i, BlackboardValue::Literal(s)))
        })),
        space0,
    )(i)?;

    let ty = match inout {
        "<-" => PortType::Input,
        "->" => PortType::Output,
        "<->" => PortType::InOut,
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Alt,
            )))
        }
    };

    // You cannot output to a literal! It is a parse error rather than runtime error.
    if let BlackboardValue::Literal(_) = blackboard_name {
        if !matches!(ty, PortType::Input) {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Verify,
            )));
        }
    }

    Ok((
        i,
        PortMap {
            ty,
            node_port,
            blackboard_value: blackboard_name,
        },
    ))
}

fn bb_ref(i: &str) -> IResult<&str, BlackboardValue> {
    let (i, s) = identifier(i)?;
    Ok((i, BlackboardValue::Ref(s)))
}

fn str_literal(input: &str) -> IResult<&str, String> {
    let (r, val) = delimited(
        preceded(multispace0, char('\"')),
        many0(none_of("\"")),
        terminated(char('"'), multispace0),
    )(input)?;
    Ok((
        r,
        val.iter()
            .collect::<String>()
            .replace("\\\\", "\\")
            .replace("\\n", "\n"),
    ))
}

/// Parses a whole source file. The rest of the input is returned, so a
/// non-empty rest means a syntax error at that position.
pub fn parse_file(i: &str) -> IResult<&str, TreeSource> {
    let (i, stmts) = many0(alt((
        delimited(multispace0, line_comment, newline),
        some(parse_tree),
    )))(i)?;

    // Eat up trailing newlines to indicate that the input was thoroughly consumed
    let (i, _) = multispace0(i)?;

    Ok((
        i,
        TreeSource {
            tree_defs: stmts.into_iter().flatten().collect(),
        },
    ))
}

#[derive(Debug, PartialEq)]
pub struct TreeSource<'src> {
    pub tree_defs: Vec<TreeRootDef<'src>>,
}

impl<'src> TreeSource<'src> {
    pub fn tree(&self, name: &str) -> Option<&TreeRootDef<'src>> {
        self.tree_defs.iter().find(|tree| tree.name == name)
    }

    /// The first tree name defined twice, if any.
    pub fn duplicate_tree(&self) -> Option<&'src str> {
        let mut names = HashSet::new();
        self.tree_defs
            .iter()
            .map(|tree| tree.name)
            .find(|name| !names.insert(*name))
    }
}

#[cfg(test)]
mod test;
