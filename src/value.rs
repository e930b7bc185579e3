use std::{
    any::{Any, TypeId},
    fmt::{self, Debug, Display, Formatter},
    rc::Rc,
};

/// Identity of a Rust type, used to tag user defined values.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The type a blackboard entry or a port is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Str,
    Custom(TypeInfo),
}

impl ValueType {
    /// Resolves the type names usable in tree source port declarations.
    pub fn from_builtin_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "string" | "str" => Self::Str,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Custom(info) => info.name(),
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A type erased value stored in a blackboard.
///
/// Scripting enums are plain `Int`s. Anything that is not a primitive lives in
/// `Any`, shared by reference count so that the value can be handed out
/// without requiring `Clone` on the erased type.
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Any(Rc<dyn Any>, TypeInfo),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Str(_) => ValueType::Str,
            Self::Any(_, info) => ValueType::Custom(*info),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn get<T: PortValue>(&self) -> Option<T> {
        T::from_value(self)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Any(_, info) => write!(f, "Any({})", info.name()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
            Self::Any(_, info) => write!(f, "<{}>", info.name()),
        }
    }
}

/// Equality is only defined on primitives; two `Any` values are equal when
/// they share the same allocation.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(lhs), Self::Bool(rhs)) => lhs == rhs,
            (Self::Int(lhs), Self::Int(rhs)) => lhs == rhs,
            (Self::Float(lhs), Self::Float(rhs)) => lhs == rhs,
            (Self::Str(lhs), Self::Str(rhs)) => lhs == rhs,
            (Self::Any(lhs, _), Self::Any(rhs, _)) => Rc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }
}

/// A Rust type that can travel through ports.
///
/// User types opt in with an empty impl and are stored as [`Value::Any`]:
///
/// ```
/// # use behavior_tree_engine::PortValue;
/// #[derive(Clone)]
/// struct Pose2D { x: f64, y: f64, theta: f64 }
///
/// impl PortValue for Pose2D {}
/// ```
pub trait PortValue: Clone + 'static {
    fn value_type() -> ValueType {
        ValueType::Custom(TypeInfo::of::<Self>())
    }

    fn into_value(self) -> Value {
        Value::Any(Rc::new(self), TypeInfo::of::<Self>())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Any(value, _) => value.downcast_ref::<Self>().cloned(),
            _ => None,
        }
    }
}

impl PortValue for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

macro_rules! impl_int_port_value {
    ($($ty:ty),*) => {
        $(
            impl PortValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::Int
                }

                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(*i).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_int_port_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

macro_rules! impl_float_port_value {
    ($($ty:ty),*) => {
        $(
            impl PortValue for $ty {
                fn value_type() -> ValueType {
                    ValueType::Float
                }

                fn into_value(self) -> Value {
                    Value::Float(self as f64)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Float(f) => Some(*f as $ty),
                        Value::Int(i) => Some(*i as $ty),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_float_port_value!(f32, f64);

impl PortValue for String {
    fn value_type() -> ValueType {
        ValueType::Str
    }

    fn into_value(self) -> Value {
        Value::Str(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}
