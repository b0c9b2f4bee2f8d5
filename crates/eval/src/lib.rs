//! Endpoint rule-set evaluator -- accepts a rule-set plus parameter
//! arguments, produces the resolved endpoint or the matched error.
//!
//! The evaluator walks the same tree the type checker validated: it seeds
//! a scope with parameter defaults and arguments, then runs first-match
//! evaluation over the top-level rules. A rule-set holds no mutable state,
//! so one instance can be evaluated from many threads at once.

pub mod expression;
pub mod rules;

use std::collections::BTreeMap;

use tracing::{instrument, trace};

use endpoint_rules_core::{EndpointRuleSet, EvalError, Identifier, Type, Value};

pub use expression::eval_expr;
pub use rules::RuleOutcome;

/// Evaluate a rule-set against typed arguments.
///
/// # Arguments
/// * `rule_set` - The rule-set to evaluate. It should already have passed
///   [`EndpointRuleSet::type_check`].
/// * `arguments` - Parameter values by name. `Value::Empty` means unset.
///
/// # Returns
/// * The first matching endpoint or error outcome, or an `EvalError` for
///   invalid arguments and exhausted rule trees.
#[instrument(skip_all, fields(version = rule_set.version()))]
pub fn evaluate(
    rule_set: &EndpointRuleSet,
    arguments: &BTreeMap<Identifier, Value>,
) -> Result<RuleOutcome, EvalError> {
    let mut scope = rules::seed_scope(rule_set, arguments)?;
    rules::eval_rule_set(rule_set, &mut scope)
}

/// Evaluate a rule-set against a JSON object of arguments.
///
/// Each member is converted according to its parameter's declared type;
/// `null` means unset. Members naming no declared parameter are ignored.
pub fn evaluate_json(
    rule_set: &EndpointRuleSet,
    arguments: &serde_json::Value,
) -> Result<RuleOutcome, EvalError> {
    let object = arguments
        .as_object()
        .ok_or_else(|| EvalError::UnexpectedValue {
            expected: "object".to_string(),
            found: arguments.to_string(),
        })?;

    let mut converted = BTreeMap::new();
    for (name, json) in object {
        let Some(parameter) = rule_set.parameter(name) else {
            trace!(parameter = %name, "ignoring undeclared argument");
            continue;
        };
        let declared = parameter.declared_type();
        let value = Value::from_json(json, &Type::optional(declared.clone())).map_err(|_| {
            EvalError::InvalidParameter {
                name: name.clone(),
                expected: declared.to_string(),
                found: json.to_string(),
            }
        })?;
        converted.insert(parameter.name().clone(), value);
    }
    evaluate(rule_set, &converted)
}
