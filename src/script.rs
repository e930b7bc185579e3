//! The scripting language used by `Script` nodes and node attributes.
//!
//! A script is a list of statements separated by `;`, line breaks being
//! plain whitespace. Its value is the value of the last statement.
//!
//! `:=` creates or overwrites a variable, `=` requires it to exist already.
//! Enums registered on the [`crate::Registry`] can be used as constants.
//!
//! ```raw
//! counter := 0;
//! counter = counter + 1;
//! counter += 1; speed *= 2;
//! msg := 'door ' .. state;
//! ok := (counter >= 3) && !failed;
//! color := counter > 2 ? RED : BLUE
//! ```
//!
//! Identifiers are blackboard keys of the scope the script runs in, except
//! for scripting enums which are replaced by their integer value when the
//! script is parsed.

mod parser;

use std::{cmp::Ordering, collections::HashMap};

use crate::{error::ScriptError, Blackboard, BlackboardRef, Symbol, Value};

/// Named integer constants usable in scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptEnums {
    values: HashMap<String, i64>,
}

impl ScriptEnums {
    pub fn register(&mut self, name: impl Into<String>, value: i64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Concat => "..",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignOp {
    /// `:=`
    Create,
    /// `=`
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    fn binary(self) -> Option<BinOp> {
        match self {
            Self::Create | Self::Assign => None,
            Self::Add => Some(BinOp::Add),
            Self::Sub => Some(BinOp::Sub),
            Self::Mul => Some(BinOp::Mul),
            Self::Div => Some(BinOp::Div),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Var(Symbol),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Assign {
        op: AssignOp,
        target: Symbol,
        value: Expr,
    },
    Expr(Expr),
}

/// A parsed script.
#[derive(Debug, Clone)]
pub struct Script {
    source: String,
    statements: Vec<Statement>,
}

impl Script {
    pub fn parse(code: &str, enums: &ScriptEnums) -> Result<Self, ScriptError> {
        let mut statements =
            parser::parse_statements(code).map_err(|message| ScriptError::Parse {
                script: code.to_owned(),
                message,
            })?;
        for statement in &mut statements {
            match statement {
                Statement::Assign { target, value, .. } => {
                    if enums.get(target.as_str()).is_some() {
                        return Err(ScriptError::AssignToEnum(target.to_string()));
                    }
                    value.resolve_enums(enums);
                }
                Statement::Expr(expr) => expr.resolve_enums(enums),
            }
        }
        Ok(Self {
            source: code.to_owned(),
            statements,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs the script against `blackboard`, returning the value of the last
    /// statement.
    pub fn eval(&self, blackboard: &BlackboardRef) -> Result<Value, ScriptError> {
        let mut blackboard = blackboard.borrow_mut();
        let mut last = Value::Bool(true);
        for statement in &self.statements {
            last = statement.exec(&mut blackboard)?;
        }
        Ok(last)
    }

    pub fn eval_bool(&self, blackboard: &BlackboardRef) -> Result<bool, ScriptError> {
        truthy(&self.eval(blackboard)?)
    }
}

fn truthy(value: &Value) -> Result<bool, ScriptError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(i) => Ok(*i != 0),
        _ => Err(ScriptError::NotBoolean(value.type_name().to_owned())),
    }
}

fn mismatch(op: BinOp, lhs: &Value, rhs: &Value) -> ScriptError {
    ScriptError::TypeMismatch {
        op: op.symbol(),
        lhs: lhs.type_name().to_owned(),
        rhs: rhs.type_name().to_owned(),
    }
}

fn arithmetic(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return Ok(Value::Int(match op {
            BinOp::Add => a.wrapping_add(*b),
            BinOp::Sub => a.wrapping_sub(*b),
            BinOp::Mul => a.wrapping_mul(*b),
            _ => {
                if *b == 0 {
                    return Err(ScriptError::DivisionByZero);
                }
                a.wrapping_div(*b)
            }
        }));
    }
    let (a, b) = lhs
        .as_f64()
        .zip(rhs.as_f64())
        .ok_or_else(|| mismatch(op, lhs, rhs))?;
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        _ => {
            if b == 0. {
                return Err(ScriptError::DivisionByZero);
            }
            a / b
        }
    }))
}

/// A string compared with a number is read as a number.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Str(s) => s.trim().parse().ok(),
        _ => value.as_f64(),
    }
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) if matches!(op, BinOp::Eq | BinOp::Ne) => Some(a.cmp(b)),
        (Value::Bool(_), _) | (_, Value::Bool(_)) | (Value::Any(..), _) | (_, Value::Any(..)) => {
            return Err(mismatch(op, lhs, rhs))
        }
        _ => {
            let (a, b) = numeric(lhs)
                .zip(numeric(rhs))
                .ok_or_else(|| mismatch(op, lhs, rhs))?;
            a.partial_cmp(&b)
        }
    };
    let ordering = match ordering {
        Some(ordering) => ordering,
        // NaN compares unequal to anything
        None => return Ok(Value::Bool(op == BinOp::Ne)),
    };
    Ok(Value::Bool(match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    }))
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => arithmetic(op, lhs, rhs),
        BinOp::Concat => match (lhs, rhs) {
            (Value::Any(..), _) | (_, Value::Any(..)) => Err(mismatch(op, lhs, rhs)),
            _ => Ok(Value::Str(format!("{lhs}{rhs}"))),
        },
        BinOp::And | BinOp::Or => unreachable!("logical operators short circuit"),
        _ => compare(op, lhs, rhs),
    }
}

impl Expr {
    fn resolve_enums(&mut self, enums: &ScriptEnums) {
        match self {
            Self::Var(name) => {
                if let Some(value) = enums.get(name.as_str()) {
                    *self = Self::Literal(Value::Int(value));
                }
            }
            Self::Literal(_) => (),
            Self::Unary(_, operand) => operand.resolve_enums(enums),
            Self::Binary(_, lhs, rhs) => {
                lhs.resolve_enums(enums);
                rhs.resolve_enums(enums);
            }
            Self::Ternary(cond, then, otherwise) => {
                cond.resolve_enums(enums);
                then.resolve_enums(enums);
                otherwise.resolve_enums(enums);
            }
        }
    }

    fn eval(&self, bb: &Blackboard) -> Result<Value, ScriptError> {
        Ok(match self {
            Self::Literal(value) => value.clone(),
            Self::Var(name) => bb.get_value(*name).map_err(|err| {
                if err.is_not_found() {
                    ScriptError::UnknownIdentifier(name.to_string())
                } else {
                    err.into()
                }
            })?,
            Self::Unary(UnOp::Not, operand) => Value::Bool(!truthy(&operand.eval(bb)?)?),
            Self::Unary(UnOp::Neg, operand) => match operand.eval(bb)? {
                Value::Int(i) => Value::Int(i.wrapping_neg()),
                Value::Float(f) => Value::Float(-f),
                value => {
                    return Err(ScriptError::TypeMismatch {
                        op: "-",
                        lhs: value.type_name().to_owned(),
                        rhs: value.type_name().to_owned(),
                    })
                }
            },
            Self::Binary(BinOp::And, lhs, rhs) => {
                Value::Bool(truthy(&lhs.eval(bb)?)? && truthy(&rhs.eval(bb)?)?)
            }
            Self::Binary(BinOp::Or, lhs, rhs) => {
                Value::Bool(truthy(&lhs.eval(bb)?)? || truthy(&rhs.eval(bb)?)?)
            }
            Self::Binary(op, lhs, rhs) => binary(*op, &lhs.eval(bb)?, &rhs.eval(bb)?)?,
            Self::Ternary(cond, then, otherwise) => {
                if truthy(&cond.eval(bb)?)? {
                    then.eval(bb)?
                } else {
                    otherwise.eval(bb)?
                }
            }
        })
    }
}

impl Statement {
    fn exec(&self, bb: &mut Blackboard) -> Result<Value, ScriptError> {
        match self {
            Self::Expr(expr) => expr.eval(bb),
            Self::Assign { op, target, value } => {
                let rhs = value.eval(bb)?;
                let new_value = match op.binary() {
                    None if *op == AssignOp::Create => rhs,
                    None => {
                        if bb.entry_type(*target).is_none() {
                            return Err(ScriptError::AssignToMissing(target.to_string()));
                        }
                        rhs
                    }
                    Some(bin_op) => {
                        let current = bb.get_value(*target).map_err(|err| {
                            if err.is_not_found() {
                                ScriptError::AssignToMissing(target.to_string())
                            } else {
                                err.into()
                            }
                        })?;
                        binary(bin_op, &current, &rhs)?
                    }
                };
                bb.set_value(*target, new_value.clone())?;
                Ok(new_value)
            }
        }
    }
}
