//! Dynamically typed member values.

use std::fmt;

use super::object::GrtObjectRef;

/// A value stored in an object member, list or custom-data slot.
///
/// Objects compare by identity, everything else by value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Int(i64),
    Double(f64),
    String(String),
    Object(GrtObjectRef),
    List(Vec<Value>),
}

impl Value {
    /// Returns `true` for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&GrtObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same_object(b),
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Double(v) => write!(f, "Double({v})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(obj) => write!(f, "Object({} {})", obj.class_name(), obj.id()),
            Value::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<GrtObjectRef> for Value {
    fn from(value: GrtObjectRef) -> Self {
        Value::Object(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grt::GrtObject;

    #[test]
    fn scalar_equality() {
        assert_eq!(Value::from("a"), Value::String("a".into()));
        assert_ne!(Value::Int(1), Value::Double(1.0));
        assert_eq!(Value::None, Value::default());
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = GrtObject::new("db.Table");
        let b = GrtObject::new("db.Table");
        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert!(Value::Int(7).as_str().is_none());
        assert_eq!(
            Value::List(vec![Value::Int(1)]).as_list().map(|l| l.len()),
            Some(1)
        );
    }
}
