//! First-match rule evaluation.
//!
//! Rules are tried in order, each in its own scope frame. Conditions
//! short-circuit on the first empty or `false` value; the first rule whose
//! conditions all hold decides the outcome. Tree rules recurse into their
//! children with the same algorithm.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, trace};

use endpoint_rules_core::{
    Endpoint, EndpointRuleSet, EndpointValue, EvalError, Identifier, Rule, RuleKind, Scope, Value,
};

use crate::expression::eval_expr;

/// Terminal result of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleOutcome {
    Endpoint(EndpointValue),
    Error { message: String },
}

impl RuleOutcome {
    pub fn endpoint(&self) -> Option<&EndpointValue> {
        match self {
            RuleOutcome::Endpoint(endpoint) => Some(endpoint),
            RuleOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RuleOutcome::Error { message } => Some(message),
            RuleOutcome::Endpoint(_) => None,
        }
    }
}

/// Build the root scope: parameter defaults first, then caller-supplied
/// arguments. Empty arguments leave defaults in place.
pub fn seed_scope(
    rule_set: &EndpointRuleSet,
    arguments: &BTreeMap<Identifier, Value>,
) -> Result<Scope<Value>, EvalError> {
    let mut scope = Scope::new();
    for parameter in rule_set.parameters() {
        if let Some(default) = parameter.default_value() {
            scope.insert(parameter.name().clone(), default.clone());
        }
    }

    for (name, value) in arguments {
        if value.is_empty() {
            continue;
        }
        match rule_set.parameter(name.as_str()) {
            Some(parameter) => {
                let declared = parameter.declared_type();
                if !declared.admits(value) {
                    return Err(EvalError::InvalidParameter {
                        name: name.to_string(),
                        expected: declared.to_string(),
                        found: value.type_name().to_string(),
                    });
                }
            }
            None => trace!(parameter = %name, "argument for undeclared parameter"),
        }
        scope.insert(name.clone(), value.clone());
    }

    for parameter in rule_set.parameters() {
        if parameter.is_required() && scope.resolve(parameter.name().as_str()).is_none() {
            return Err(EvalError::MissingParameter {
                name: parameter.name().to_string(),
            });
        }
    }
    Ok(scope)
}

/// Evaluate a whole rule-set against a seeded scope.
pub fn eval_rule_set(
    rule_set: &EndpointRuleSet,
    scope: &mut Scope<Value>,
) -> Result<RuleOutcome, EvalError> {
    eval_rules(rule_set.rules(), scope)?.ok_or(EvalError::NoRuleMatched)
}

/// First matching rule among `rules`, or `None` if every rule fell through.
pub fn eval_rules(rules: &[Rule], scope: &mut Scope<Value>) -> Result<Option<RuleOutcome>, EvalError> {
    for rule in rules {
        if let Some(outcome) = scope.in_scope(|s| eval_rule(rule, s))? {
            return Ok(Some(outcome));
        }
    }
    Ok(None)
}

/// Evaluate one rule in the current frame. `None` means a condition did
/// not hold and the caller should try the next sibling.
pub fn eval_rule(rule: &Rule, scope: &mut Scope<Value>) -> Result<Option<RuleOutcome>, EvalError> {
    for condition in &rule.conditions {
        let value = eval_expr(&condition.function, scope)?;
        if value.is_empty() || value == Value::Boolean(false) {
            trace!(condition = %condition, "condition not met");
            return Ok(None);
        }
        if let Some(result) = &condition.result {
            scope.insert(result.clone(), value);
        }
    }

    match &rule.kind {
        RuleKind::Tree(children) => match eval_rules(children, scope)? {
            Some(outcome) => Ok(Some(outcome)),
            None => Err(EvalError::ExhaustedTreeRule {
                rule: rule.to_string(),
            }),
        },
        RuleKind::Error(message) => {
            let message = eval_expr(message, scope)?.expect_string()?.to_string();
            debug!(message = %message, "error rule matched");
            Ok(Some(RuleOutcome::Error { message }))
        }
        RuleKind::Endpoint(endpoint) => {
            let endpoint = eval_endpoint(endpoint, scope)?;
            debug!(url = %endpoint.url, "endpoint rule matched");
            Ok(Some(RuleOutcome::Endpoint(endpoint)))
        }
    }
}

fn eval_endpoint(endpoint: &Endpoint, scope: &Scope<Value>) -> Result<EndpointValue, EvalError> {
    let url = eval_expr(&endpoint.url, scope)?.expect_string()?.to_string();
    let mut out = EndpointValue::new(url);
    for (name, values) in &endpoint.headers {
        for value in values {
            out.add_header(name.clone(), eval_expr(value, scope)?.expect_string()?);
        }
    }
    for (name, value) in &endpoint.properties {
        let value = eval_expr(value, scope)?;
        if !value.is_empty() {
            out.properties.insert(name.to_string(), value);
        }
    }
    Ok(out)
}
