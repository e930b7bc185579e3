use crate::{PortValue, Symbol, ValueType};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PortType {
    Input,
    Output,
    InOut,
}

impl PortType {
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::InOut)
    }

    pub fn is_output(self) -> bool {
        matches!(self, Self::Output | Self::InOut)
    }
}

/// Declaration of a port a node reads or writes.
///
/// `value_type` is optional; an untyped port accepts whatever is stored in the
/// blackboard and does not bind the type of the key it is mapped to.
#[derive(Debug, PartialEq, Clone)]
pub struct PortSpec {
    pub ty: PortType,
    pub key: Symbol,
    pub value_type: Option<ValueType>,
    pub default: Option<String>,
    pub description: Option<String>,
}

impl PortSpec {
    fn new(ty: PortType, key: Symbol) -> Self {
        Self {
            ty,
            key,
            value_type: None,
            default: None,
            description: None,
        }
    }

    pub fn new_in(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::Input, key.into())
    }

    pub fn new_out(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::Output, key.into())
    }

    pub fn new_inout(key: impl Into<Symbol>) -> Self {
        Self::new(PortType::InOut, key.into())
    }

    /// Typed input port
    pub fn input<T: PortValue>(key: impl Into<Symbol>) -> Self {
        Self::new_in(key).with_type(T::value_type())
    }

    /// Typed output port
    pub fn output<T: PortValue>(key: impl Into<Symbol>) -> Self {
        Self::new_out(key).with_type(T::value_type())
    }

    pub fn inout<T: PortValue>(key: impl Into<Symbol>) -> Self {
        Self::new_inout(key).with_type(T::value_type())
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// The text is parsed like a literal mapping when the port is read.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// An input that must be mapped in the tree source.
    pub fn is_mandatory(&self) -> bool {
        self.ty == PortType::Input && self.default.is_none()
    }
}
