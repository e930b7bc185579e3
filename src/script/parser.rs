use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0},
    combinator::{all_consuming, map, not, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use super::{AssignOp, BinOp, Expr, Statement, UnOp};
use crate::{Symbol, Value};

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn number(i: &str) -> IResult<&str, Expr> {
    let (r, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(i)?;
    let value = if text.contains('.') {
        text.parse().ok().map(Value::Float)
    } else {
        text.parse().ok().map(Value::Int)
    };
    match value {
        Some(value) => Ok((r, Expr::Literal(value))),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn str_literal(i: &str) -> IResult<&str, Expr> {
    let (r, s) = alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))(i)?;
    Ok((r, Expr::Literal(Value::Str(s.to_owned()))))
}

fn ident_expr(i: &str) -> IResult<&str, Expr> {
    let (r, name) = identifier(i)?;
    Ok((
        r,
        match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            _ => Expr::Var(name.into()),
        },
    ))
}

fn primary(i: &str) -> IResult<&str, Expr> {
    let (i, _) = multispace0(i)?;
    alt((
        delimited(
            pair(char('('), multispace0),
            expr,
            pair(multispace0, char(')')),
        ),
        number,
        str_literal,
        ident_expr,
    ))(i)
}

fn unary(i: &str) -> IResult<&str, Expr> {
    let (i, _) = multispace0(i)?;
    alt((
        map(preceded(char('!'), unary), |e| {
            Expr::Unary(UnOp::Not, Box::new(e))
        }),
        map(preceded(char('-'), unary), |e| {
            Expr::Unary(UnOp::Neg, Box::new(e))
        }),
        primary,
    ))(i)
}

/// Parses a left associative chain of `operand`s joined by `operator`.
fn fold_binary<'a>(
    i: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Expr>,
    operator: fn(&'a str) -> IResult<&'a str, BinOp>,
) -> IResult<&'a str, Expr> {
    let (mut i, mut lhs) = operand(i)?;
    loop {
        let (r, _) = multispace0(i)?;
        let (r, op) = match operator(r) {
            Ok(res) => res,
            Err(nom::Err::Error(_)) => return Ok((i, lhs)),
            Err(e) => return Err(e),
        };
        let (r, rhs) = operand(r)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        i = r;
    }
}

fn term_op(i: &str) -> IResult<&str, BinOp> {
    alt((
        value(BinOp::Mul, terminated(char('*'), not(char('=')))),
        value(BinOp::Div, terminated(char('/'), not(char('=')))),
    ))(i)
}

fn term(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, unary, term_op)
}

fn additive_op(i: &str) -> IResult<&str, BinOp> {
    alt((
        value(BinOp::Add, terminated(char('+'), not(char('=')))),
        value(BinOp::Sub, terminated(char('-'), not(char('=')))),
    ))(i)
}

fn additive(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, term, additive_op)
}

fn concat(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, additive, |i| value(BinOp::Concat, tag(".."))(i))
}

fn comparison_op(i: &str) -> IResult<&str, BinOp> {
    alt((
        value(BinOp::Le, tag("<=")),
        value(BinOp::Ge, tag(">=")),
        value(BinOp::Lt, char('<')),
        value(BinOp::Gt, char('>')),
    ))(i)
}

fn comparison(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, concat, comparison_op)
}

fn equality_op(i: &str) -> IResult<&str, BinOp> {
    alt((value(BinOp::Eq, tag("==")), value(BinOp::Ne, tag("!="))))(i)
}

fn equality(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, comparison, equality_op)
}

fn and(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, equality, |i| value(BinOp::And, tag("&&"))(i))
}

fn or(i: &str) -> IResult<&str, Expr> {
    fold_binary(i, and, |i| value(BinOp::Or, tag("||"))(i))
}

pub(super) fn expr(i: &str) -> IResult<&str, Expr> {
    let (i, cond) = or(i)?;
    let (i, branches) = opt(pair(
        preceded(pair(multispace0, char('?')), expr),
        preceded(pair(multispace0, char(':')), expr),
    ))(i)?;
    Ok((
        i,
        match branches {
            Some((then, otherwise)) => {
                Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise))
            }
            None => cond,
        },
    ))
}

fn assign_op(i: &str) -> IResult<&str, AssignOp> {
    alt((
        value(AssignOp::Create, tag(":=")),
        value(AssignOp::Add, tag("+=")),
        value(AssignOp::Sub, tag("-=")),
        value(AssignOp::Mul, tag("*=")),
        value(AssignOp::Div, tag("/=")),
        value(AssignOp::Assign, terminated(char('='), not(char('=')))),
    ))(i)
}

fn assignment(i: &str) -> IResult<&str, Statement> {
    let (i, target) = delimited(multispace0, identifier, multispace0)(i)?;
    let (i, op) = assign_op(i)?;
    let (i, value) = expr(i)?;
    let target: Symbol = target.into();
    Ok((i, Statement::Assign { op, target, value }))
}

fn statement(i: &str) -> IResult<&str, Statement> {
    alt((assignment, map(expr, Statement::Expr)))(i)
}

fn statements(i: &str) -> IResult<&str, Vec<Statement>> {
    terminated(
        separated_list1(preceded(multispace0, char(';')), statement),
        pair(opt(preceded(multispace0, char(';'))), multispace0),
    )(i)
}

pub(super) fn parse_statements(code: &str) -> Result<Vec<Statement>, String> {
    all_consuming(statements)(code)
        .map(|(_, statements)| statements)
        .map_err(|e| e.to_string())
}
