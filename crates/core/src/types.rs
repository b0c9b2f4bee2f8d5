//! Static types of the rule-set expression language.

use std::collections::BTreeMap;
use std::fmt;

use crate::ast::Identifier;
use crate::error::TypeError;
use crate::values::Value;

/// A structural type. `Optional(Optional(T))` is never constructed through
/// [`Type::optional`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    String,
    Boolean,
    Integer,
    Array(Box<Type>),
    Record(BTreeMap<Identifier, Type>),
    Endpoint,
    Any,
    Optional(Box<Type>),
}

impl Type {
    /// Wraps `inner` in `Optional`, collapsing an existing wrapper.
    pub fn optional(inner: Type) -> Type {
        match inner {
            Type::Optional(_) => inner,
            other => Type::Optional(Box::new(other)),
        }
    }

    pub fn array(member: Type) -> Type {
        Type::Array(Box::new(member))
    }

    pub fn record<K: Into<Identifier>>(fields: impl IntoIterator<Item = (K, Type)>) -> Type {
        Type::Record(fields.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    /// The type with any `Optional` wrapper removed.
    pub fn required(&self) -> &Type {
        match self {
            Type::Optional(inner) => inner,
            other => other,
        }
    }

    /// Subtype test: can a value of type `actual` be used where `self` is
    /// expected?
    pub fn is_a(&self, actual: &Type) -> bool {
        match (self, actual) {
            (Type::Any, _) => true,
            (Type::Optional(expected), Type::Optional(inner)) => expected.is_a(inner),
            (Type::Optional(expected), other) => expected.is_a(other),
            (Type::Array(expected), Type::Array(member)) => expected.is_a(member),
            (Type::Record(expected), Type::Record(fields)) => {
                expected.len() == fields.len()
                    && expected.iter().all(|(name, ty)| {
                        fields.get(name).map(|f| ty.is_a(f)).unwrap_or(false)
                    })
            }
            (expected, actual) => expected == actual,
        }
    }

    /// Runtime membership: does `value` inhabit this type?
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Any, _) => true,
            (Type::Optional(_), Value::Empty) => true,
            (Type::Optional(inner), v) => inner.admits(v),
            (Type::String, Value::String(_))
            | (Type::Boolean, Value::Boolean(_))
            | (Type::Integer, Value::Integer(_))
            | (Type::Endpoint, Value::Endpoint(_)) => true,
            (Type::Array(member), Value::Array(items)) => items.iter().all(|i| member.admits(i)),
            (Type::Record(fields), Value::Record(values)) => {
                fields.iter().all(|(name, ty)| match values.get(name) {
                    Some(v) => ty.admits(v),
                    None => ty.admits(&Value::Empty),
                })
            }
            _ => false,
        }
    }

    pub fn expect_array(&self) -> Result<&Type, TypeError> {
        match self {
            Type::Array(member) => Ok(member),
            other => Err(TypeError::new(format!("Expected an array but found {}", other))),
        }
    }

    pub fn expect_record(&self) -> Result<&BTreeMap<Identifier, Type>, TypeError> {
        match self {
            Type::Record(fields) => Ok(fields),
            other => Err(TypeError::new(format!("Expected a record but found {}", other))),
        }
    }

    pub fn expect_optional(&self) -> Result<&Type, TypeError> {
        match self {
            Type::Optional(inner) => Ok(inner),
            other => Err(TypeError::new(format!(
                "Expected an optional but found {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::String => f.write_str("String"),
            Type::Boolean => f.write_str("Boolean"),
            Type::Integer => f.write_str("Integer"),
            Type::Array(member) => write!(f, "Array<{}>", member),
            Type::Record(fields) => {
                let items: Vec<String> = fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty))
                    .collect();
                write!(f, "Record{{{}}}", items.join(", "))
            }
            Type::Endpoint => f.write_str("Endpoint"),
            Type::Any => f.write_str("Any"),
            Type::Optional(inner) => write!(f, "Option<{}>", inner),
        }
    }
}
