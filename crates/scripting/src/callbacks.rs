//! Opaque callback handles
//!
//! Scripts hand the server callbacks (shop buy/sell handlers, event
//! functions); the server only ever holds a [`CallbackRef`] and must release
//! it explicitly once the owning session ends.

use std::collections::HashMap;

/// Handle to a registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackRef(pub i32);

impl CallbackRef {
    pub fn get(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for CallbackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registry mapping handles to callback values
pub struct CallbackRegistry<T> {
    entries: HashMap<i32, T>,
    next: i32,
}

impl<T> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next: 1,
        }
    }

    /// Store a callback and return its handle
    pub fn register(&mut self, callback: T) -> CallbackRef {
        let id = self.next;
        self.next = if self.next == i32::MAX { 1 } else { self.next + 1 };
        self.entries.insert(id, callback);
        CallbackRef(id)
    }

    pub fn get(&self, handle: CallbackRef) -> Option<&T> {
        self.entries.get(&handle.0)
    }

    pub fn get_mut(&mut self, handle: CallbackRef) -> Option<&mut T> {
        self.entries.get_mut(&handle.0)
    }

    /// Drop a handle; returns the callback if it was still live
    pub fn release(&mut self, handle: CallbackRef) -> Option<T> {
        self.entries.remove(&handle.0)
    }

    pub fn contains(&self, handle: CallbackRef) -> bool {
        self.entries.contains_key(&handle.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let mut registry = CallbackRegistry::new();
        let a = registry.register("buy");
        let b = registry.register("sell");
        assert_ne!(a, b);
        assert_eq!(registry.get(a), Some(&"buy"));
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.release(a), Some("buy"));
        assert_eq!(registry.release(a), None);
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
    }

    #[test]
    fn test_handles_are_not_reused_immediately() {
        let mut registry = CallbackRegistry::new();
        let first = registry.register(1);
        registry.release(first);
        let second = registry.register(2);
        assert_ne!(first, second);
    }
}
