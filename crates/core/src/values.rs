//! Runtime values produced by expression evaluation.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::ast::Identifier;
use crate::error::EvalError;
use crate::types::Type;

/// Runtime counterpart of [`Type`]. `Empty` is the only representation of
/// an unset value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Array(Vec<Value>),
    Record(BTreeMap<Identifier, Value>),
    Endpoint(EndpointValue),
    Empty,
}

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct EndpointValue {
    pub url: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl EndpointValue {
    pub fn new(url: impl Into<String>) -> Self {
        EndpointValue {
            url: url.into(),
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
    }
}

impl Value {
    /// Human-readable variant name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Array(_) => "Array",
            Value::Record(_) => "Record",
            Value::Endpoint(_) => "Endpoint",
            Value::Empty => "Empty",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn expect_string(&self) -> Result<&str, EvalError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(EvalError::unexpected("String", other)),
        }
    }

    pub fn expect_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(EvalError::unexpected("Boolean", other)),
        }
    }

    pub fn expect_integer(&self) -> Result<i64, EvalError> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(EvalError::unexpected("Integer", other)),
        }
    }

    pub fn expect_array(&self) -> Result<&[Value], EvalError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(EvalError::unexpected("Array", other)),
        }
    }

    pub fn expect_record(&self) -> Result<&BTreeMap<Identifier, Value>, EvalError> {
        match self {
            Value::Record(fields) => Ok(fields),
            other => Err(EvalError::unexpected("Record", other)),
        }
    }

    pub fn expect_endpoint(&self) -> Result<&EndpointValue, EvalError> {
        match self {
            Value::Endpoint(endpoint) => Ok(endpoint),
            other => Err(EvalError::unexpected("Endpoint", other)),
        }
    }

    /// The static type a literal of this value has, or `None` when an array
    /// mixes element types. An `Empty` element makes the element type
    /// optional; empty arrays are `Array<Any>`.
    pub fn literal_type(&self) -> Option<Type> {
        let ty = match self {
            Value::String(_) => Type::String,
            Value::Boolean(_) => Type::Boolean,
            Value::Integer(_) => Type::Integer,
            Value::Array(items) => {
                let mut element: Option<Type> = None;
                let mut nullable = false;
                for item in items {
                    if item.is_empty() {
                        nullable = true;
                        continue;
                    }
                    let ty = item.literal_type()?;
                    match &element {
                        Some(first) if *first != ty => return None,
                        Some(_) => {}
                        None => element = Some(ty),
                    }
                }
                let element = element.unwrap_or(Type::Any);
                Type::array(if nullable {
                    Type::optional(element)
                } else {
                    element
                })
            }
            Value::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(k, v)| Some((k.clone(), v.literal_type()?)))
                    .collect::<Option<_>>()?,
            ),
            Value::Endpoint(_) => Type::Endpoint,
            Value::Empty => Type::optional(Type::Any),
        };
        Some(ty)
    }

    /// Render as JSON. `Empty` becomes `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::json!(i),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => {
                let mut map = serde_json::Map::new();
                for (k, v) in fields {
                    map.insert(k.to_string(), v.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Endpoint(endpoint) => {
                serde_json::to_value(endpoint).unwrap_or(serde_json::Value::Null)
            }
            Value::Empty => serde_json::Value::Null,
        }
    }

    /// Convert a caller-supplied JSON value according to `ty`.
    /// `null` is accepted only for optional types.
    pub fn from_json(v: &serde_json::Value, ty: &Type) -> Result<Value, EvalError> {
        let mismatch = || EvalError::UnexpectedValue {
            expected: ty.to_string(),
            found: json_kind(v).to_string(),
        };
        match (ty, v) {
            (Type::Optional(_), serde_json::Value::Null) => Ok(Value::Empty),
            (Type::Optional(inner), other) => Value::from_json(other, inner),
            (Type::String, serde_json::Value::String(s)) => Ok(Value::String(s.clone())),
            (Type::Boolean, serde_json::Value::Bool(b)) => Ok(Value::Boolean(*b)),
            (Type::Integer, serde_json::Value::Number(n)) => {
                n.as_i64().map(Value::Integer).ok_or_else(mismatch)
            }
            (Type::Array(member), serde_json::Value::Array(items)) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| Value::from_json(item, member))
                    .collect::<Result<_, _>>()?,
            )),
            (Type::Record(fields), serde_json::Value::Object(obj)) => {
                let mut out = BTreeMap::new();
                for (name, field_ty) in fields {
                    let field = obj.get(name.as_str()).unwrap_or(&serde_json::Value::Null);
                    let value = Value::from_json(field, field_ty)?;
                    if !value.is_empty() {
                        out.insert(name.clone(), value);
                    }
                }
                Ok(Value::Record(out))
            }
            (Type::Any, other) => Ok(untyped_json(other)),
            _ => Err(mismatch()),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn untyped_json(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Empty,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::String(n.to_string()),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(untyped_json).collect()),
        serde_json::Value::Object(obj) => Value::Record(
            obj.iter()
                .map(|(k, v)| (Identifier::from(k.as_str()), untyped_json(v)))
                .collect(),
        ),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k.as_str(), v)?;
                }
                map.end()
            }
            Value::Endpoint(endpoint) => endpoint.serialize(serializer),
            Value::Empty => serializer.serialize_none(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<EndpointValue> for Value {
    fn from(endpoint: EndpointValue) -> Self {
        Value::Endpoint(endpoint)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Record(fields) => {
                let items: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
            Value::Endpoint(endpoint) => write!(f, "endpoint({:?})", endpoint.url),
            Value::Empty => f.write_str("<empty>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_empty_is_empty() {
        assert!(Value::Empty.is_empty());
        assert!(!Value::from("").is_empty());
        assert!(!Value::Boolean(false).is_empty());
        assert!(!Value::Array(vec![]).is_empty());
    }

    #[test]
    fn expect_accessors_fail_fast() {
        assert_eq!(Value::from("a").expect_string().unwrap(), "a");
        assert_eq!(
            Value::Integer(3).expect_string().unwrap_err(),
            EvalError::UnexpectedValue {
                expected: "String".to_string(),
                found: "Integer".to_string(),
            }
        );
        assert!(Value::Empty.expect_bool().is_err());
        assert_eq!(Value::Integer(7).expect_integer().unwrap(), 7);
    }

    #[test]
    fn headers_accumulate_in_order() {
        let mut endpoint = EndpointValue::new("https://example.com");
        endpoint.add_header("x-amz-a", "1");
        endpoint.add_header("x-amz-a", "2");
        assert_eq!(endpoint.headers["x-amz-a"], vec!["1", "2"]);
    }

    #[test]
    fn json_rendering() {
        let mut endpoint = EndpointValue::new("https://example.com");
        endpoint
            .properties
            .insert("signingRegion".to_string(), Value::from("us-west-2"));
        let json = Value::Endpoint(endpoint).to_json();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "https://example.com",
                "properties": { "signingRegion": "us-west-2" }
            })
        );
        assert_eq!(Value::Empty.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn json_conversion_follows_type() {
        let ty = Type::array(Type::String);
        let v = Value::from_json(&serde_json::json!(["a", "b"]), &ty).unwrap();
        assert_eq!(v, Value::Array(vec![Value::from("a"), Value::from("b")]));

        let err = Value::from_json(&serde_json::json!("a"), &Type::Boolean).unwrap_err();
        assert_eq!(
            err,
            EvalError::UnexpectedValue {
                expected: "Boolean".to_string(),
                found: "string".to_string(),
            }
        );

        let opt = Value::from_json(&serde_json::Value::Null, &Type::optional(Type::String));
        assert_eq!(opt.unwrap(), Value::Empty);
        assert!(Value::from_json(&serde_json::Value::Null, &Type::String).is_err());
    }

    #[test]
    fn literal_types() {
        assert_eq!(Value::from("a").literal_type(), Some(Type::String));
        assert_eq!(
            Value::Array(vec![Value::Boolean(true)]).literal_type(),
            Some(Type::array(Type::Boolean))
        );
        assert_eq!(Value::Array(vec![]).literal_type(), Some(Type::array(Type::Any)));
    }

    #[test]
    fn array_literal_types_cover_every_element() {
        let with_empty = Value::Array(vec![Value::from("a"), Value::Empty]);
        let ty = with_empty.literal_type().unwrap();
        assert_eq!(ty, Type::array(Type::optional(Type::String)));
        assert!(ty.admits(&with_empty));

        let mixed = Value::Array(vec![Value::from("a"), Value::Boolean(true)]);
        assert_eq!(mixed.literal_type(), None);

        let nested = Value::Array(vec![
            Value::Array(vec![Value::from("a")]),
            Value::Array(vec![Value::Integer(1)]),
        ]);
        assert_eq!(nested.literal_type(), None);
    }
}
