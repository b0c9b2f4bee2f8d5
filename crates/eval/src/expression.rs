//! Expression evaluator.
//!
//! Evaluates an expression tree against a `Scope<Value>`. Absence is not
//! an error: unbound references, attribute misses and failed conversions
//! all evaluate to `Value::Empty`.

use std::collections::BTreeMap;

use endpoint_rules_core::ast::{resolve_path, ExprKind, FunctionCall, GetAttr, Literal, TemplatePart};
use endpoint_rules_core::{EvalError, Expression, Scope, Value};

/// Evaluate `expr` in `scope`.
pub fn eval_expr(expr: &Expression, scope: &Scope<Value>) -> Result<Value, EvalError> {
    match expr.kind() {
        ExprKind::Literal(literal) => eval_literal(literal, scope),

        ExprKind::Reference(name) => Ok(scope
            .resolve(name.as_str())
            .cloned()
            .unwrap_or(Value::Empty)),

        ExprKind::GetAttr(GetAttr { target, path }) => {
            let target = eval_expr(target, scope)?;
            resolve_path(&target, path)
        }

        ExprKind::Call(call) => eval_call(call, scope),
    }
}

fn eval_literal(literal: &Literal, scope: &Scope<Value>) -> Result<Value, EvalError> {
    match literal {
        Literal::Value(value) => Ok(value.clone()),
        Literal::Template(template) => {
            let mut out = String::new();
            for part in &template.parts {
                match part {
                    TemplatePart::Literal(s) => out.push_str(s),
                    TemplatePart::Dynamic(expr) => out.push_str(eval_expr(expr, scope)?.expect_string()?),
                }
            }
            Ok(Value::String(out))
        }
        Literal::Tuple(elements) => Ok(Value::Array(eval_all(elements, scope)?)),
        Literal::Record(fields) => {
            let mut out = BTreeMap::new();
            for (name, value) in fields {
                out.insert(name.clone(), eval_expr(value, scope)?);
            }
            Ok(Value::Record(out))
        }
    }
}

/// Plain calls pass the evaluated arguments through. Mapped calls run once
/// per source element, with the element prepended to the other arguments.
fn eval_call(call: &FunctionCall, scope: &Scope<Value>) -> Result<Value, EvalError> {
    let arguments = eval_all(&call.arguments, scope)?;
    let Some(on) = &call.map else {
        return call.definition.evaluate(&arguments);
    };

    let source = eval_expr(on, scope)?;
    if source.is_empty() {
        return Ok(Value::Empty);
    }
    let elements = source.expect_array()?;
    let mut results = Vec::with_capacity(elements.len());
    for element in elements {
        let mut mapped = Vec::with_capacity(arguments.len() + 1);
        mapped.push(element.clone());
        mapped.extend(arguments.iter().cloned());
        results.push(call.definition.evaluate(&mapped)?);
    }
    Ok(Value::Array(results))
}

fn eval_all(expressions: &[Expression], scope: &Scope<Value>) -> Result<Vec<Value>, EvalError> {
    expressions.iter().map(|e| eval_expr(e, scope)).collect()
}
