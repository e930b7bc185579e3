use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fmt::Write,
    rc::{Rc, Weak},
};

use crate::{error::PortError, PortValue, Symbol, Value, ValueType};

/// Shared handle to a blackboard scope.
pub type BlackboardRef = Rc<RefCell<Blackboard>>;

#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub value: Option<Value>,
    pub value_type: Option<ValueType>,
}

/// A scope of blackboard variables.
///
/// A subtree gets its own scope whose parent is the scope of the tree that
/// instantiated it. Keys listed in the remapping table are not stored locally
/// at all; every access is forwarded to the parent under the external name.
#[derive(Default)]
pub struct Blackboard {
    entries: BTreeMap<Symbol, Entry>,
    parent: Option<Weak<RefCell<Blackboard>>>,
    remapping: HashMap<Symbol, Symbol>,
}

fn type_mismatch(key: Symbol, expected: ValueType, found: ValueType) -> PortError {
    PortError::TypeMismatch {
        key: key.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Adapts `value` to the type the entry is bound to, if any.
fn coerce(key: Symbol, bound: Option<ValueType>, value: Value) -> Result<Value, PortError> {
    match (bound, value) {
        (None, value) => Ok(value),
        (Some(ValueType::Float), Value::Int(i)) => Ok(Value::Float(i as f64)),
        (Some(ty), value) if ty == value.value_type() => Ok(value),
        (Some(ty), value) => Err(type_mismatch(key, ty, value.value_type())),
    }
}

impl Blackboard {
    pub fn create() -> BlackboardRef {
        Rc::new(RefCell::new(Self::default()))
    }

    /// Creates a scope that can forward remapped keys to `parent`.
    pub fn create_child(parent: &BlackboardRef) -> BlackboardRef {
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::downgrade(parent)),
            ..Self::default()
        }))
    }

    /// Makes `internal` an alias of `external` in the parent scope.
    pub fn add_remapping(&mut self, internal: impl Into<Symbol>, external: impl Into<Symbol>) {
        let internal = internal.into();
        self.entries.remove(&internal);
        self.remapping.insert(internal, external.into());
    }

    fn forward(&self, key: Symbol) -> Option<(BlackboardRef, Symbol)> {
        let external = *self.remapping.get(&key)?;
        let parent = self.parent.as_ref()?.upgrade()?;
        Some((parent, external))
    }

    fn is_remapped(&self, key: Symbol) -> bool {
        self.remapping.contains_key(&key)
    }

    pub fn get_value(&self, key: impl Into<Symbol>) -> Result<Value, PortError> {
        let key = key.into();
        if let Some((parent, external)) = self.forward(key) {
            return parent.borrow().get_value(external);
        }
        if self.is_remapped(key) {
            return Err(PortError::NotFound(key.to_string()));
        }
        self.entries
            .get(&key)
            .and_then(|entry| entry.value.clone())
            .ok_or_else(|| PortError::NotFound(key.to_string()))
    }

    pub fn get<T: PortValue>(&self, key: impl Into<Symbol>) -> Result<T, PortError> {
        let key = key.into();
        let value = self.get_value(key)?;
        T::from_value(&value).ok_or_else(|| type_mismatch(key, T::value_type(), value.value_type()))
    }

    /// Writes a value, binding the entry type on the first write.
    pub fn set_value(&mut self, key: impl Into<Symbol>, value: Value) -> Result<(), PortError> {
        let key = key.into();
        if let Some((parent, external)) = self.forward(key) {
            return parent.borrow_mut().set_value(external, value);
        }
        if self.is_remapped(key) {
            return Err(PortError::NotFound(key.to_string()));
        }
        let entry = self.entries.entry(key).or_default();
        let value = coerce(key, entry.value_type, value)?;
        entry.value_type.get_or_insert(value.value_type());
        entry.value = Some(value);
        Ok(())
    }

    pub fn set<T: PortValue>(&mut self, key: impl Into<Symbol>, value: T) -> Result<(), PortError> {
        self.set_value(key, value.into_value())
    }

    /// Binds the type of a key without giving it a value.
    pub fn declare(&mut self, key: impl Into<Symbol>, ty: ValueType) -> Result<(), PortError> {
        let key = key.into();
        if let Some((parent, external)) = self.forward(key) {
            return parent.borrow_mut().declare(external, ty);
        }
        let entry = self.entries.entry(key).or_default();
        match entry.value_type {
            Some(bound) if bound != ty => Err(type_mismatch(key, bound, ty)),
            _ => {
                if let Some(value) = entry.value.take() {
                    entry.value = Some(coerce(key, Some(ty), value)?);
                }
                entry.value_type = Some(ty);
                Ok(())
            }
        }
    }

    pub fn entry_type(&self, key: impl Into<Symbol>) -> Option<ValueType> {
        let key = key.into();
        if let Some((parent, external)) = self.forward(key) {
            return parent.borrow().entry_type(external);
        }
        self.entries.get(&key).and_then(|entry| entry.value_type)
    }

    pub fn contains(&self, key: impl Into<Symbol>) -> bool {
        self.get_value(key).is_ok()
    }

    /// Removes the value but keeps the type binding.
    pub fn unset(&mut self, key: impl Into<Symbol>) {
        let key = key.into();
        if let Some((parent, external)) = self.forward(key) {
            parent.borrow_mut().unset(external);
        } else if let Some(entry) = self.entries.get_mut(&key) {
            entry.value = None;
        }
    }

    /// Keys stored in this scope, not including remapped ones.
    pub fn keys(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.entries.keys().copied()
    }

    pub fn remapping(&self) -> &HashMap<Symbol, Symbol> {
        &self.remapping
    }

    pub fn debug_message(&self) -> String {
        let mut ret = String::new();
        for (key, entry) in &self.entries {
            let ty = entry.value_type.map_or("?", |ty| ty.name());
            let value = entry
                .value
                .as_ref()
                .map_or_else(|| "<unset>".to_owned(), Value::to_string);
            writeln!(ret, "{key} ({ty}) = {value}").ok();
        }
        let mut remapping: Vec<_> = self.remapping.iter().collect();
        remapping.sort();
        for (internal, external) in remapping {
            writeln!(ret, "{internal} -> {{{external}}}").ok();
        }
        ret
    }
}
