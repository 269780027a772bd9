//! Request-scoped attribute storage
//!
//! Attributes live exactly as long as the request that owns them. Plain values
//! are JSON so they can be inspected by any downstream code; extensions are
//! typed values keyed by their Rust type and are used to hand the active
//! repository and the per-request session context across re-dispatches.

use serde_json::Value;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Interior-mutable attribute bag owned by one request
#[derive(Default)]
pub struct RequestAttributes {
    values: RefCell<HashMap<String, Value>>,
    extensions: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl RequestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of an attribute value
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    /// Check whether an attribute is set
    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Set an attribute, returning the previous value
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.borrow_mut().insert(name.into(), value.into())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.borrow_mut().remove(name)
    }

    /// Names of all plain attributes, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Attach a typed extension, replacing any previous one of the same type
    pub fn insert_extension<T: 'static>(&self, value: Rc<T>) -> Option<Rc<T>> {
        self.extensions
            .borrow_mut()
            .insert(TypeId::of::<T>(), value)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    /// Get a typed extension
    pub fn extension<T: 'static>(&self) -> Option<Rc<T>> {
        let extensions = self.extensions.borrow();
        let value = extensions.get(&TypeId::of::<T>())?;
        Rc::clone(value).downcast::<T>().ok()
    }

    pub fn remove_extension<T: 'static>(&self) -> Option<Rc<T>> {
        self.extensions
            .borrow_mut()
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
    }
}

impl std::fmt::Debug for RequestAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAttributes")
            .field("values", &self.values.borrow())
            .field("extensions", &self.extensions.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values() {
        let attributes = RequestAttributes::new();
        assert!(attributes.get("a").is_none());

        assert!(attributes.set("a", true).is_none());
        assert_eq!(attributes.get("a"), Some(Value::Bool(true)));
        assert_eq!(attributes.set("a", "x"), Some(Value::Bool(true)));
        assert!(attributes.contains("a"));
        assert_eq!(attributes.names(), vec!["a".to_string()]);

        assert_eq!(attributes.remove("a"), Some(Value::from("x")));
        assert!(!attributes.contains("a"));
    }

    #[test]
    fn test_extensions_are_keyed_by_type() {
        struct Marker(u32);

        let attributes = RequestAttributes::new();
        attributes.insert_extension(Rc::new(Marker(7)));
        attributes.insert_extension(Rc::new(String::from("other")));

        assert_eq!(attributes.extension::<Marker>().unwrap().0, 7);
        assert_eq!(attributes.extension::<String>().unwrap().as_str(), "other");
        assert!(attributes.extension::<u64>().is_none());

        let previous = attributes.insert_extension(Rc::new(Marker(8))).unwrap();
        assert_eq!(previous.0, 7);
        assert_eq!(attributes.remove_extension::<Marker>().unwrap().0, 8);
        assert!(attributes.extension::<Marker>().is_none());
    }
}
