//! Static type checking of rule-sets.
//!
//! A single pass over the rule tree. Conditions narrow their bound results
//! from `Optional(T)` to `T`, and `isSet(e)` conditions prove `e` non-empty
//! for the rest of the branch. The first error aborts the pass.

use tracing::debug;

use crate::ast::{ExprKind, Expression, FunctionCall, GetAttr, Literal, PathPart, TemplatePart};
use crate::error::TypeError;
use crate::functions::Typing;
use crate::ruleset::{Condition, Endpoint, EndpointRuleSet, Rule, RuleKind};
use crate::scope::Scope;
use crate::types::Type;

/// Type-checks every top-level rule, each in its own frame seeded with the
/// parameters.
pub fn check_rule_set(rule_set: &EndpointRuleSet) -> Result<(), TypeError> {
    let mut scope = Scope::new();
    for parameter in rule_set.parameters() {
        scope.insert(parameter.name().clone(), parameter.scope_type());
    }
    for rule in rule_set.rules() {
        scope.in_scope(|s| check_rule(rule, s))?;
    }
    debug!(
        version = rule_set.version(),
        parameters = rule_set.parameters().len(),
        rules = rule_set.rules().len(),
        "rule-set type-checked"
    );
    Ok(())
}

// ──────────────────────────────────────────────
// Rules and conditions
// ──────────────────────────────────────────────

/// Checks `rule` in the current frame. Children of tree rules get a nested
/// frame each.
pub fn check_rule(rule: &Rule, scope: &mut Scope<Type>) -> Result<(), TypeError> {
    for condition in &rule.conditions {
        check_condition(condition, scope)?;
    }
    match &rule.kind {
        RuleKind::Tree(rules) => {
            for child in rules {
                scope.in_scope(|s| check_rule(child, s))?;
            }
            Ok(())
        }
        RuleKind::Error(message) => expect_type(message, &Type::String, "the error message", scope)
            .map_err(|e| e.at(&rule.location)),
        RuleKind::Endpoint(endpoint) => check_endpoint(endpoint, scope),
    }
}

/// Checks a condition and records what it proves in the current frame.
pub fn check_condition(condition: &Condition, scope: &mut Scope<Type>) -> Result<Type, TypeError> {
    let ty = check_expression(&condition.function, scope).map_err(|e| {
        e.context(
            format!("while typechecking the condition `{}`", condition),
            condition.location(),
        )
    })?;
    if let ExprKind::Call(call) = condition.function.kind() {
        if call.name() == "isSet" && call.map.is_none() {
            if let Some(argument) = call.arguments.first() {
                scope.set_non_null(argument.clone());
            }
        }
    }
    if let Some(result) = &condition.result {
        if ty.required() != &Type::Any {
            scope.insert(result.clone(), ty.required().clone());
        }
    }
    Ok(ty)
}

fn check_endpoint(endpoint: &Endpoint, scope: &mut Scope<Type>) -> Result<(), TypeError> {
    let in_endpoint = |e: TypeError| e.context("while typechecking the endpoint", &endpoint.location);
    expect_type(&endpoint.url, &Type::String, "the endpoint url", scope).map_err(in_endpoint)?;
    for (name, values) in &endpoint.headers {
        for value in values {
            expect_type(value, &Type::String, &format!("header `{}`", name), scope)
                .map_err(in_endpoint)?;
        }
    }
    for value in endpoint.properties.values() {
        check_expression(value, scope).map_err(in_endpoint)?;
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

/// Static type of `expression` in `scope`. Expressions proven non-empty by
/// an enclosing `isSet` condition have their `Optional` wrapper removed.
pub fn check_expression(expression: &Expression, scope: &mut Scope<Type>) -> Result<Type, TypeError> {
    let ty = match expression.kind() {
        ExprKind::Literal(literal) => check_literal(literal, scope),
        ExprKind::Reference(name) => scope
            .resolve(name.as_str())
            .cloned()
            .ok_or_else(|| TypeError::new(format!("No binding for `{}`", name))),
        ExprKind::GetAttr(GetAttr { target, path }) => {
            let target_ty = check_expression(target, scope)?;
            attribute_type(&target_ty, path)
        }
        ExprKind::Call(call) => check_call(call, scope).map_err(|e| {
            e.at(expression.location()).context(
                format!("while typechecking the invocation of {}", call.name()),
                expression.location(),
            )
        }),
    }
    .map_err(|e| e.at(expression.location()))?;

    if scope.is_non_null(expression) {
        return Ok(ty.required().clone());
    }
    Ok(ty)
}

fn check_literal(literal: &Literal, scope: &mut Scope<Type>) -> Result<Type, TypeError> {
    match literal {
        Literal::Value(value) => value.literal_type().ok_or_else(|| {
            TypeError::new(format!(
                "Array literal elements must share one type: found {}",
                value
            ))
        }),
        Literal::Template(template) => {
            for part in &template.parts {
                if let TemplatePart::Dynamic(expr) = part {
                    expect_type(expr, &Type::String, &format!("template placeholder `{{{}}}`", expr), scope)?;
                }
            }
            Ok(Type::String)
        }
        Literal::Tuple(elements) => {
            let mut element_ty: Option<Type> = None;
            for element in elements {
                let ty = check_expression(element, scope)?;
                if let Some(first) = &element_ty {
                    if *first != ty {
                        return Err(TypeError::new(format!(
                            "Tuple elements must share one type: Expected {} but found {}",
                            first, ty
                        ))
                        .at(element.location()));
                    }
                } else {
                    element_ty = Some(ty);
                }
            }
            Ok(Type::array(element_ty.unwrap_or(Type::Any)))
        }
        Literal::Record(fields) => {
            let mut types = Vec::with_capacity(fields.len());
            for (name, value) in fields {
                types.push((name.clone(), check_expression(value, scope)?));
            }
            Ok(Type::record(types))
        }
    }
}

/// Walks `path` against `target`, passing through intermediate optionals.
/// The result is always optional since any segment may be absent at runtime.
fn attribute_type(target: &Type, path: &[PathPart]) -> Result<Type, TypeError> {
    let mut current = target.clone();
    for part in path {
        current = match (part, current.required()) {
            (_, Type::Any) => return Ok(Type::optional(Type::Any)),
            (PathPart::Key(key), Type::Record(fields)) => match fields.get(key) {
                Some(ty) => ty.clone(),
                None => {
                    return Err(TypeError::new(format!(
                        "{} does not contain field `{}`",
                        current, key
                    )))
                }
            },
            (PathPart::Index(_), Type::Array(member)) => (**member).clone(),
            (PathPart::Key(key), other) => {
                return Err(TypeError::new(format!(
                    "Cannot access field `{}`: Expected a record but found {}",
                    key, other
                )))
            }
            (PathPart::Index(index), other) => {
                return Err(TypeError::new(format!(
                    "Cannot access index {}: Expected an array but found {}",
                    index, other
                )))
            }
        };
    }
    Ok(Type::optional(current))
}

// ──────────────────────────────────────────────
// Function invocations
// ──────────────────────────────────────────────

fn check_call(call: &FunctionCall, scope: &mut Scope<Type>) -> Result<Type, TypeError> {
    let definition = &call.definition;
    match (definition.typing(), &call.map) {
        (Typing::Signature, None) => {
            check_arity(definition.arguments().len(), call.arguments.len())?;
            for (i, (expected, argument)) in definition.arguments().iter().zip(&call.arguments).enumerate() {
                check_argument(i + 1, expected, argument, scope)?;
            }
            Ok(definition.return_type().clone())
        }
        (Typing::Signature, Some(on)) => {
            check_arity(definition.arguments().len(), call.arguments.len() + 1)?;
            let Some((element, rest)) = definition.arguments().split_first() else {
                return Err(TypeError::new(format!(
                    "{} takes no arguments and cannot be mapped",
                    definition.id()
                )));
            };
            check_mapped_source(element, on, scope)?;
            for (i, (expected, argument)) in rest.iter().zip(&call.arguments).enumerate() {
                check_argument(i + 2, expected, argument, scope)?;
            }
            Ok(Type::array(definition.return_type().clone()))
        }
        (Typing::ArrayFilter, None) => {
            check_arity(1, call.arguments.len())?;
            let argument = &call.arguments[0];
            let actual = check_expression(argument, scope)?;
            match &actual {
                Type::Array(member) => Ok(Type::array(member.required().clone())),
                other => Err(TypeError::new(format!(
                    "Unexpected type in the first argument: Expected {} but found {}",
                    definition.arguments()[0], other
                ))
                .at(argument.location())),
            }
        }
        (Typing::Attribute, None) => {
            check_arity(2, call.arguments.len())?;
            let target = check_expression(&call.arguments[0], scope)?;
            let raw = call.arguments[1].as_string_literal().ok_or_else(|| {
                TypeError::new("Unexpected type in the second argument: Expected a literal path string")
                    .at(call.arguments[1].location())
            })?;
            let path = crate::ast::parse_path(raw).map_err(|e| TypeError::new(e.to_string()))?;
            attribute_type(&target, &path)
        }
        (_, Some(_)) => Err(TypeError::new(format!(
            "{} cannot be applied in map mode",
            definition.id()
        ))),
    }
}

fn check_arity(expected: usize, found: usize) -> Result<(), TypeError> {
    if expected != found {
        return Err(TypeError::new(format!(
            "Expected {} arguments but found {}",
            expected, found
        )));
    }
    Ok(())
}

fn check_argument(
    position: usize,
    expected: &Type,
    argument: &Expression,
    scope: &mut Scope<Type>,
) -> Result<(), TypeError> {
    expect_type(argument, expected, &format!("the {} argument", ordinal(position)), scope)
}

/// The source of a mapped call must be an array of the first argument type.
fn check_mapped_source(element: &Type, on: &Expression, scope: &mut Scope<Type>) -> Result<(), TypeError> {
    let expected = Type::array(element.clone());
    let actual = check_expression(on, scope)?;
    if expected.is_a(&actual) {
        return Ok(());
    }
    let mut err = TypeError::new(format!(
        "Unexpected type in function map: Expected {} but found {}",
        expected, actual
    ))
    .at(on.location());
    match &actual {
        Type::Optional(_) => err = err.with_hint(assign_hint(on)),
        Type::Array(member) if member.is_optional() => {
            err = err.with_hint(format!(
                "use `selectSet({})` to prove all element values are non-null",
                on
            ))
        }
        _ => {}
    }
    Err(err)
}

/// Checks that `expression` can be used where `expected` is required.
fn expect_type(
    expression: &Expression,
    expected: &Type,
    what: &str,
    scope: &mut Scope<Type>,
) -> Result<(), TypeError> {
    let actual = check_expression(expression, scope)?;
    if expected.is_a(&actual) {
        return Ok(());
    }
    let err = TypeError::new(format!(
        "Unexpected type in {}: Expected {} but found {}",
        what, expected, actual
    ))
    .at(expression.location());
    match &actual {
        Type::Optional(inner) if **inner == *expected => Err(err.with_hint(assign_hint(expression))),
        _ => Err(err),
    }
}

fn assign_hint(expression: &Expression) -> String {
    format!(
        "use `assign` in a condition or `isSet({})` to prove that this value is non-null",
        expression
    )
}

fn ordinal(position: usize) -> String {
    match position {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        4 => "fourth".to_string(),
        5 => "fifth".to_string(),
        n => n.to_string(),
    }
}
