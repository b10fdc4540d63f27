//! Runtime values and their static types

use std::fmt;
use std::str::FromStr;

/// A value flowing through a command pipeline
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Void,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    List(Vec<Value>),
}

impl Value {
    /// The static type of this value.
    ///
    /// Lists report their element type when every element agrees, `list<any>` otherwise.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Void => ValueType::Void,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::List(items) => {
                let mut types = items.iter().map(Value::value_type);
                let element = match types.next() {
                    Some(first) if types.all(|t| t == first) => first,
                    _ => ValueType::Any,
                };
                ValueType::list(element)
            }
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::String(s) => write!(f, "{:?}", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Static type of a [`Value`], used to pick command signatures at parse time
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Void,
    Int,
    Float,
    Bool,
    String,
    List(Box<ValueType>),
    /// Accepts every non-void value
    Any,
}

impl ValueType {
    /// Type names accepted by [`ValueType::from_str`], without the `list<..>` form
    pub const NAMES: [&'static str; 6] = ["any", "bool", "float", "int", "string", "void"];

    pub fn list(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    /// Element type of a list type, `None` for everything else
    pub fn element(&self) -> Option<&ValueType> {
        match self {
            ValueType::List(inner) => Some(inner),
            _ => None,
        }
    }

    /// Whether a value of this type may be used where `target` is expected
    pub fn is_assignable_to(&self, target: &ValueType) -> bool {
        match (self, target) {
            (ValueType::Void, ValueType::Void) => true,
            (ValueType::Void, _) => false,
            (_, ValueType::Any) => true,
            (ValueType::List(from), ValueType::List(to)) => from.is_assignable_to(to),
            (from, to) => from == to,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Void => f.write_str("void"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::String => f.write_str("string"),
            ValueType::List(inner) => write!(f, "list<{}>", inner),
            ValueType::Any => f.write_str("any"),
        }
    }
}

/// Returned when a type name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown type '{0}'")]
pub struct UnknownTypeName(pub String);

impl FromStr for ValueType {
    type Err = UnknownTypeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let ty = match lower.as_str() {
            "void" => ValueType::Void,
            "int" | "i64" => ValueType::Int,
            "float" | "f64" => ValueType::Float,
            "bool" => ValueType::Bool,
            "string" | "str" => ValueType::String,
            "any" => ValueType::Any,
            _ => {
                let inner = lower
                    .strip_prefix("list<")
                    .and_then(|rest| rest.strip_suffix('>'))
                    .ok_or_else(|| UnknownTypeName(s.to_string()))?;
                let element: ValueType = inner.parse().map_err(|_| UnknownTypeName(s.to_string()))?;
                if element == ValueType::Void {
                    return Err(UnknownTypeName(s.to_string()));
                }
                ValueType::list(element)
            }
        };
        Ok(ty)
    }
}
