//! Interned strings used as port names and blackboard keys.
//!
//! Equality is a pointer comparison, ordering follows the text so that maps
//! keyed by symbols iterate in a stable, human readable order.

use ::once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Mutex, PoisonError};

static SYMBOL_HEAP: Lazy<Mutex<BTreeSet<&'static str>>> = Lazy::new(|| Mutex::new(BTreeSet::new()));

/// An interned string with O(1) equality.
#[derive(Clone, Copy)]
pub struct Symbol {
    s: &'static str,
}

impl Symbol {
    /// Retrieves the address of the backing string.
    pub fn addr(self) -> usize {
        self.s.as_ptr() as usize
    }

    /// Retrieves the string from the Symbol.
    pub fn as_str(self) -> &'static str {
        self.s
    }

    /// Number of distinct symbols interned so far.
    pub fn count() -> usize {
        SYMBOL_HEAP
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Debug for Symbol {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        Debug::fmt(self.s, fmt)
    }
}

impl Deref for Symbol {
    type Target = str;
    fn deref(&self) -> &str {
        self.s
    }
}

impl Display for Symbol {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        fmt.write_str(self.s)
    }
}

impl<S: AsRef<str>> From<S> for Symbol {
    fn from(s: S) -> Symbol {
        let s = s.as_ref();
        let mut heap = SYMBOL_HEAP.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(interned) = heap.get(s) {
            return Symbol { s: interned };
        }
        let interned: &'static str = Box::leak(s.to_owned().into_boxed_str());
        heap.insert(interned);
        Symbol { s: interned }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            Ordering::Equal
        } else {
            self.s.cmp(other.s)
        }
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.s == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.s == *other
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interned_symbols_share_storage() {
        let a = Symbol::from("interned_symbols_share_storage");
        let b = Symbol::from(String::from("interned_symbols_share_storage"));
        assert_eq!(a, b);
        assert_eq!(a.addr(), b.addr());
        assert_eq!(a, "interned_symbols_share_storage");
    }

    #[test]
    fn ordering_follows_text() {
        let mut symbols = vec![Symbol::from("zeta"), Symbol::from("alpha"), Symbol::from("mu")];
        symbols.sort();
        let names: Vec<_> = symbols.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
    }
}
