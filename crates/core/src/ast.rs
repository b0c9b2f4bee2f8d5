//! Expression tree shared by the type checker and the evaluator.
//!
//! Expressions are immutable. Equality and hashing are structural and
//! ignore source locations.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{BuildError, EvalError};
use crate::functions::{FunctionDefinition, Typing};
use crate::values::Value;

// ──────────────────────────────────────────────
// Identifiers and source locations
// ──────────────────────────────────────────────

/// Name of a parameter, a condition result, or a record field.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Identifier(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(name.to_string())
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier(name)
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Identifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Where a syntax element was declared. Empty `file` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
        }
    }

    pub fn none() -> Self {
        SourceLocation::default()
    }

    pub fn is_none(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("N/A")
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExprKind,
    location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Literal(Literal),
    Reference(Identifier),
    GetAttr(GetAttr),
    Call(FunctionCall),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Value(Value),
    Template(Template),
    Tuple(Vec<Expression>),
    Record(BTreeMap<Identifier, Expression>),
}

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Expression {
            kind,
            location: SourceLocation::none(),
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::new(ExprKind::Literal(Literal::Value(value.into())))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::literal(Value::String(value.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::literal(Value::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Expression::literal(Value::Integer(value))
    }

    pub fn reference(name: impl Into<Identifier>) -> Self {
        Expression::new(ExprKind::Reference(name.into()))
    }

    /// A string template such as `"https://{Region}.example.com"`.
    /// Templates without placeholders become plain string literals.
    pub fn template(source: &str) -> Result<Self, BuildError> {
        let template = Template::parse(source)?;
        if template.is_static() {
            return Ok(Expression::string(template.render_static()));
        }
        Ok(Expression::new(ExprKind::Literal(Literal::Template(
            template,
        ))))
    }

    pub fn tuple(elements: Vec<Expression>) -> Self {
        Expression::new(ExprKind::Literal(Literal::Tuple(elements)))
    }

    pub fn record<K: Into<Identifier>>(fields: impl IntoIterator<Item = (K, Expression)>) -> Self {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Expression::new(ExprKind::Literal(Literal::Record(fields)))
    }

    /// Attribute access, e.g. `get_attr(url, "authority")` or
    /// `get_attr(list, "[0]")`.
    pub fn get_attr(target: Expression, path: &str) -> Result<Self, BuildError> {
        let location = target.location.clone();
        let path = parse_path(path)?;
        Ok(Expression::new(ExprKind::GetAttr(GetAttr {
            target: Box::new(target),
            path,
        }))
        .at(location))
    }

    pub fn call(definition: Arc<FunctionDefinition>, arguments: Vec<Expression>) -> Self {
        Expression::new(ExprKind::Call(FunctionCall {
            definition,
            arguments,
            map: None,
        }))
    }

    /// Applies `definition` element-wise over the array produced by `on`.
    /// Each element is passed as the first argument, followed by `arguments`.
    pub fn map(
        definition: Arc<FunctionDefinition>,
        on: Expression,
        arguments: Vec<Expression>,
    ) -> Result<Self, BuildError> {
        if definition.typing() != Typing::Signature {
            return Err(BuildError::UnmappableFunction {
                function: definition.id().to_string(),
            });
        }
        let location = on.location.clone();
        Ok(Expression::new(ExprKind::Call(FunctionCall {
            definition,
            arguments,
            map: Some(Box::new(on)),
        }))
        .at(location))
    }

    /// Returns the string held by a plain string literal.
    pub fn as_string_literal(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Literal(Literal::Value(Value::String(s))) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::string(value)
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::boolean(value)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::integer(value)
    }
}

// ──────────────────────────────────────────────
// Function calls
// ──────────────────────────────────────────────

/// Invocation of a library function, optionally mapped over an array.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub definition: Arc<FunctionDefinition>,
    pub arguments: Vec<Expression>,
    pub map: Option<Box<Expression>>,
}

impl FunctionCall {
    pub fn name(&self) -> &str {
        self.definition.id()
    }
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.definition.id() == other.definition.id()
            && self.arguments == other.arguments
            && self.map == other.map
    }
}

impl Eq for FunctionCall {}

impl Hash for FunctionCall {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.definition.id().hash(state);
        self.arguments.hash(state);
        self.map.hash(state);
    }
}

// ──────────────────────────────────────────────
// Attribute paths
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GetAttr {
    pub target: Box<Expression>,
    pub path: Vec<PathPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathPart {
    Key(Identifier),
    Index(usize),
}

impl fmt::Display for PathPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPart::Key(key) => write!(f, "{}", key),
            PathPart::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Parses a dotted path such as `authSchemes[0].name`.
pub fn parse_path(path: &str) -> Result<Vec<PathPart>, BuildError> {
    let invalid = |message: &str| BuildError::InvalidPath {
        path: path.to_string(),
        message: message.to_string(),
    };
    let mut parts = Vec::new();
    for component in path.split('.') {
        let (key, mut rest) = match component.find('[') {
            Some(pos) => component.split_at(pos),
            None => (component, ""),
        };
        if !key.is_empty() {
            if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(&format!("`{}` is not a valid field name", key)));
            }
            parts.push(PathPart::Key(Identifier::from(key)));
        } else if rest.is_empty() {
            return Err(invalid("empty path segment"));
        }
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| invalid("unclosed index bracket"))?;
            let index = rest[1..close]
                .parse::<usize>()
                .map_err(|_| invalid(&format!("`{}` is not a valid index", &rest[1..close])))?;
            parts.push(PathPart::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(invalid("unexpected characters after index"));
            }
        }
    }
    Ok(parts)
}

pub fn format_path(path: &[PathPart]) -> String {
    let mut out = String::new();
    for part in path {
        if let PathPart::Key(_) = part {
            if !out.is_empty() {
                out.push('.');
            }
        }
        out.push_str(&part.to_string());
    }
    out
}

/// Walks `path` against a concrete value. A missing field, an index past
/// the end, or an empty intermediate value yields `Value::Empty`.
pub fn resolve_path(value: &Value, path: &[PathPart]) -> Result<Value, EvalError> {
    let mut current = value;
    for part in path {
        current = match (part, current) {
            (_, Value::Empty) => return Ok(Value::Empty),
            (PathPart::Key(key), Value::Record(fields)) => match fields.get(key) {
                Some(v) => v,
                None => return Ok(Value::Empty),
            },
            (PathPart::Index(index), Value::Array(items)) => match items.get(*index) {
                Some(v) => v,
                None => return Ok(Value::Empty),
            },
            (PathPart::Key(_), other) => return Err(EvalError::unexpected("Record", other)),
            (PathPart::Index(_), other) => return Err(EvalError::unexpected("Array", other)),
        };
    }
    Ok(current.clone())
}

// ──────────────────────────────────────────────
// String templates
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplatePart {
    Literal(String),
    Dynamic(Expression),
}

impl Template {
    /// Parses `{name}` and `{name#path}` placeholders; `{{` and `}}` escape
    /// literal braces.
    pub fn parse(source: &str) -> Result<Template, BuildError> {
        let invalid = |message: &str| BuildError::InvalidTemplate {
            template: source.to_string(),
            message: message.to_string(),
        };
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched `}`")),
                '{' => {
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => inner.push(ch),
                            None => return Err(invalid("unclosed `{`")),
                        }
                    }
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(TemplatePart::Dynamic(placeholder(&inner).map_err(
                        |e| match e {
                            BuildError::InvalidPath { message, .. } => invalid(&message),
                            other => other,
                        },
                    )?));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Template { parts })
    }

    pub fn is_static(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, TemplatePart::Literal(_)))
    }

    fn render_static(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                TemplatePart::Literal(s) => Some(s.as_str()),
                TemplatePart::Dynamic(_) => None,
            })
            .collect()
    }
}

fn placeholder(inner: &str) -> Result<Expression, BuildError> {
    let valid_name = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    match inner.split_once('#') {
        Some((name, path)) if valid_name(name) => {
            Expression::get_attr(Expression::reference(name), path)
        }
        None if valid_name(inner) => Ok(Expression::reference(inner)),
        _ => Err(BuildError::InvalidPath {
            path: inner.to_string(),
            message: format!("`{}` is not a valid placeholder", inner),
        }),
    }
}

// ──────────────────────────────────────────────
// Printing
// ──────────────────────────────────────────────

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(literal) => write!(f, "{}", literal),
            ExprKind::Reference(name) => write!(f, "{}", name),
            ExprKind::GetAttr(get_attr) => {
                write!(f, "{}#{}", get_attr.target, format_path(&get_attr.path))
            }
            ExprKind::Call(call) => {
                let mut arguments: Vec<String> = Vec::new();
                if call.map.is_some() {
                    arguments.push("e".to_string());
                }
                arguments.extend(call.arguments.iter().map(|a| a.to_string()));
                match &call.map {
                    Some(on) => write!(
                        f,
                        "{}.map((e)->{}({}))",
                        on,
                        call.name(),
                        arguments.join(", ")
                    ),
                    None => write!(f, "{}({})", call.name(), arguments.join(", ")),
                }
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Value(value) => write!(f, "{}", value),
            Literal::Template(template) => {
                f.write_str("\"")?;
                for part in &template.parts {
                    match part {
                        TemplatePart::Literal(s) => {
                            write!(f, "{}", s.replace('{', "{{").replace('}', "}}"))?
                        }
                        TemplatePart::Dynamic(e) => match e.kind() {
                            ExprKind::GetAttr(g) => {
                                write!(f, "{{{}#{}}}", g.target, format_path(&g.path))?
                            }
                            _ => write!(f, "{{{}}}", e)?,
                        },
                    }
                }
                f.write_str("\"")
            }
            Literal::Tuple(elements) => {
                let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Literal::Record(fields) => {
                let items: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}
