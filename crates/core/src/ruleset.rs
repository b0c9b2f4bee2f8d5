//! Rule-set syntax: parameters, conditions, rules and endpoints.
//!
//! All of these are immutable once built. Constructors validate eagerly
//! and fail with [`BuildError`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::ast::{Expression, Identifier, SourceLocation};
use crate::error::{BuildError, TypeError};
use crate::typecheck;
use crate::types::Type;
use crate::values::Value;

// ──────────────────────────────────────────────
// Parameters
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    String,
    Boolean,
    StringArray,
}

impl ParameterType {
    pub fn to_type(self) -> Type {
        match self {
            ParameterType::String => Type::String,
            ParameterType::Boolean => Type::Boolean,
            ParameterType::StringArray => Type::array(Type::String),
        }
    }
}

impl FromStr for ParameterType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("String") {
            Ok(ParameterType::String)
        } else if s.eq_ignore_ascii_case("Boolean") {
            Ok(ParameterType::Boolean)
        } else if s.eq_ignore_ascii_case("StringArray") {
            Ok(ParameterType::StringArray)
        } else {
            Err(BuildError::UnknownParameterType {
                name: s.to_string(),
            })
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::String => f.write_str("String"),
            ParameterType::Boolean => f.write_str("Boolean"),
            ParameterType::StringArray => f.write_str("StringArray"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deprecated {
    pub message: Option<String>,
    pub since: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: Identifier,
    ty: ParameterType,
    required: bool,
    default: Option<Value>,
    pub built_in: Option<String>,
    pub documentation: Option<String>,
    pub deprecated: Option<Deprecated>,
    pub location: SourceLocation,
}

impl Parameter {
    /// An optional parameter with no default.
    pub fn new(name: impl Into<Identifier>, ty: ParameterType) -> Self {
        Parameter {
            name: name.into(),
            ty,
            required: false,
            default: None,
            built_in: None,
            documentation: None,
            deprecated: None,
            location: SourceLocation::none(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the default value. Fails if it does not have the declared type.
    pub fn with_default(mut self, default: impl Into<Value>) -> Result<Self, BuildError> {
        let default = default.into();
        let declared = self.ty.to_type();
        if default.is_empty() || !declared.admits(&default) {
            return Err(BuildError::InvalidDefault {
                name: self.name.to_string(),
                expected: declared.to_string(),
                found: default.type_name().to_string(),
            });
        }
        self.default = Some(default);
        Ok(self)
    }

    pub fn with_built_in(mut self, built_in: impl Into<String>) -> Self {
        self.built_in = Some(built_in.into());
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn deprecated(mut self, deprecated: Deprecated) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The declared type, as seen by callers supplying arguments.
    pub fn declared_type(&self) -> Type {
        self.ty.to_type()
    }

    /// The type rules see: required or defaulted parameters are always set.
    pub fn scope_type(&self) -> Type {
        if self.required || self.default.is_some() {
            self.declared_type()
        } else {
            Type::optional(self.declared_type())
        }
    }

    pub fn to_expression(&self) -> Expression {
        Expression::reference(self.name.clone()).at(self.location.clone())
    }
}

// ──────────────────────────────────────────────
// Conditions
// ──────────────────────────────────────────────

/// A test gating a rule, optionally binding its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub function: Expression,
    pub result: Option<Identifier>,
}

impl Condition {
    pub fn new(function: Expression) -> Self {
        Condition {
            function,
            result: None,
        }
    }

    /// `function` with its non-empty result bound to `result`.
    pub fn assign(function: Expression, result: impl Into<Identifier>) -> Self {
        Condition {
            function,
            result: Some(result.into()),
        }
    }

    /// The bound result as an expression, or the function itself when
    /// nothing is bound.
    pub fn to_expression(&self) -> Expression {
        match &self.result {
            Some(name) => Expression::reference(name.clone()).at(self.function.location().clone()),
            None => self.function.clone(),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        self.function.location()
    }
}

impl From<Expression> for Condition {
    fn from(function: Expression) -> Self {
        Condition::new(function)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Some(result) => write!(f, "{} = {}", result, self.function),
            None => write!(f, "{}", self.function),
        }
    }
}

// ──────────────────────────────────────────────
// Endpoints
// ──────────────────────────────────────────────

/// Endpoint template produced by an endpoint rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Expression,
    pub headers: BTreeMap<String, Vec<Expression>>,
    pub properties: BTreeMap<Identifier, Expression>,
    pub location: SourceLocation,
}

impl Endpoint {
    pub fn new(url: Expression) -> Self {
        let location = url.location().clone();
        Endpoint {
            url,
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
            location,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, values: Vec<Expression>) -> Self {
        self.headers.entry(name.into()).or_default().extend(values);
        self
    }

    pub fn with_property(mut self, name: impl Into<Identifier>, value: Expression) -> Self {
        self.properties.insert(name.into(), value);
        self
    }
}

// ──────────────────────────────────────────────
// Rules
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub conditions: Vec<Condition>,
    pub kind: RuleKind,
    pub documentation: Option<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    Tree(Vec<Rule>),
    Error(Expression),
    Endpoint(Endpoint),
}

impl Rule {
    fn with_kind(conditions: Vec<Condition>, kind: RuleKind) -> Self {
        Rule {
            conditions,
            kind,
            documentation: None,
            location: SourceLocation::none(),
        }
    }

    pub fn tree(conditions: Vec<Condition>, rules: Vec<Rule>) -> Self {
        Rule::with_kind(conditions, RuleKind::Tree(rules))
    }

    pub fn error(conditions: Vec<Condition>, message: impl Into<Expression>) -> Self {
        Rule::with_kind(conditions, RuleKind::Error(message.into()))
    }

    pub fn endpoint(conditions: Vec<Condition>, endpoint: Endpoint) -> Self {
        Rule::with_kind(conditions, RuleKind::Endpoint(endpoint))
    }

    /// When all `conditions` hold, continue with `then`; otherwise fail
    /// with `message`.
    pub fn validate_or_else(
        message: impl Into<Expression>,
        conditions: Vec<Condition>,
        then: Rule,
    ) -> Rule {
        Rule::tree(
            vec![],
            vec![
                Rule::tree(conditions, vec![then]),
                Rule::error(vec![], message),
            ],
        )
    }

    /// When all `conditions` hold, fail with `message`; otherwise continue
    /// with `otherwise`.
    pub fn error_or_else(
        message: impl Into<Expression>,
        conditions: Vec<Condition>,
        otherwise: Rule,
    ) -> Rule {
        Rule::tree(vec![], vec![Rule::error(conditions, message), otherwise])
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = location;
        self
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        if let Some(doc) = &self.documentation {
            writeln!(f, "{}# {}", pad, doc)?;
        }
        if !self.conditions.is_empty() {
            writeln!(f, "{}conditions:", pad)?;
            for condition in &self.conditions {
                writeln!(f, "{}  {}", pad, condition)?;
            }
        }
        match &self.kind {
            RuleKind::Tree(rules) => {
                writeln!(f, "{}tree:", pad)?;
                for rule in rules {
                    rule.write_indented(f, depth + 1)?;
                }
                Ok(())
            }
            RuleKind::Error(message) => writeln!(f, "{}error: {}", pad, message),
            RuleKind::Endpoint(endpoint) => {
                writeln!(f, "{}endpoint: {}", pad, endpoint.url)?;
                for (name, values) in &endpoint.headers {
                    let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    writeln!(f, "{}  header {}: [{}]", pad, name, values.join(", "))?;
                }
                for (name, value) in &endpoint.properties {
                    writeln!(f, "{}  property {}: {}", pad, name, value)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

// ──────────────────────────────────────────────
// Rule-sets
// ──────────────────────────────────────────────

/// Parameters plus the ordered top-level rules of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointRuleSet {
    version: String,
    parameters: Vec<Parameter>,
    rules: Vec<Rule>,
}

impl EndpointRuleSet {
    /// Fails if two parameters share a name.
    pub fn new(
        version: impl Into<String>,
        parameters: Vec<Parameter>,
        rules: Vec<Rule>,
    ) -> Result<Self, BuildError> {
        let mut seen = HashSet::new();
        for parameter in &parameters {
            if !seen.insert(parameter.name().clone()) {
                return Err(BuildError::DuplicateParameter {
                    name: parameter.name().to_string(),
                });
            }
        }
        Ok(EndpointRuleSet {
            version: version.into(),
            parameters,
            rules,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name().as_str() == name)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Statically type-checks every rule. Stops at the first error.
    pub fn type_check(&self) -> Result<(), TypeError> {
        typecheck::check_rule_set(self)
    }
}
