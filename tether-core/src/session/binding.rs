//! Attribute values and binding listeners

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Event passed to a [`SessionBindingListener`]
#[derive(Debug, Clone, Copy)]
pub struct SessionBindingEvent<'a> {
    /// Id of the session the value is bound to
    pub session_id: &'a str,
    /// Attribute name the value is stored under
    pub name: &'a str,
}

/// An attribute value that wants to know when it enters or leaves a session
///
/// Errors returned from the callbacks are logged and never reach the code
/// that mutated the session.
pub trait SessionBindingListener: Send + Sync {
    fn value_bound(&self, _event: &SessionBindingEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn value_unbound(&self, _event: &SessionBindingEvent<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A listener stored as an attribute, with whether its bind callback succeeded
#[derive(Clone)]
pub struct ListenerSlot {
    listener: Arc<dyn SessionBindingListener>,
    bound: bool,
}

impl ListenerSlot {
    pub fn new(listener: Arc<dyn SessionBindingListener>) -> Self {
        Self { listener, bound: false }
    }

    pub fn listener(&self) -> &Arc<dyn SessionBindingListener> {
        &self.listener
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub(crate) fn set_bound(&mut self, bound: bool) {
        self.bound = bound;
    }

    fn same_listener(&self, other: &ListenerSlot) -> bool {
        Arc::ptr_eq(&self.listener, &other.listener)
    }
}

/// Value stored under a session attribute name
#[derive(Clone)]
pub enum AttributeValue {
    /// Plain data
    Value(Value),
    /// A binding listener
    Listener(ListenerSlot),
}

impl AttributeValue {
    /// Wrap a binding listener
    pub fn listener(listener: Arc<dyn SessionBindingListener>) -> Self {
        AttributeValue::Listener(ListenerSlot::new(listener))
    }

    /// The JSON value, if this is plain data
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            AttributeValue::Value(value) => Some(value),
            AttributeValue::Listener(_) => None,
        }
    }

    pub fn as_listener(&self) -> Option<&ListenerSlot> {
        match self {
            AttributeValue::Listener(slot) => Some(slot),
            AttributeValue::Value(_) => None,
        }
    }

    pub(crate) fn as_listener_mut(&mut self) -> Option<&mut ListenerSlot> {
        match self {
            AttributeValue::Listener(slot) => Some(slot),
            AttributeValue::Value(_) => None,
        }
    }

    /// True when both hold the same listener instance
    pub fn is_same_listener(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Listener(a), AttributeValue::Listener(b)) => a.same_listener(b),
            _ => false,
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        AttributeValue::Value(value)
    }
}

impl From<Arc<dyn SessionBindingListener>> for AttributeValue {
    fn from(listener: Arc<dyn SessionBindingListener>) -> Self {
        AttributeValue::listener(listener)
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::Value(a), AttributeValue::Value(b)) => a == b,
            _ => self.is_same_listener(other),
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            AttributeValue::Listener(slot) => {
                f.debug_struct("Listener").field("bound", &slot.bound).finish_non_exhaustive()
            }
        }
    }
}
