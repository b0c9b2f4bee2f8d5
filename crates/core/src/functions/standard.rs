//! Core built-ins: presence tests, boolean logic, equality, attribute
//! access and array aggregates.

use super::{FunctionDefinition, Typing};
use crate::ast::{parse_path, resolve_path};
use crate::error::{BuildError, EvalError};
use crate::types::Type;
use crate::values::Value;

pub(super) fn definitions() -> Vec<FunctionDefinition> {
    vec![
        FunctionDefinition::new(
            "isSet",
            vec![Type::optional(Type::Any)],
            Type::Boolean,
            |args| Ok(Value::Boolean(!args[0].is_empty())),
        ),
        FunctionDefinition::new("not", vec![Type::Boolean], Type::Boolean, |args| {
            Ok(Value::Boolean(!args[0].expect_bool()?))
        }),
        FunctionDefinition::new(
            "booleanEquals",
            vec![Type::Boolean, Type::Boolean],
            Type::Boolean,
            |args| Ok(Value::Boolean(args[0].expect_bool()? == args[1].expect_bool()?)),
        ),
        FunctionDefinition::new(
            "stringEquals",
            vec![Type::String, Type::String],
            Type::Boolean,
            |args| {
                Ok(Value::Boolean(
                    args[0].expect_string()? == args[1].expect_string()?,
                ))
            },
        ),
        FunctionDefinition::new(
            "getAttr",
            vec![Type::Any, Type::String],
            Type::optional(Type::Any),
            |args| {
                let raw = args[1].expect_string()?;
                let path = parse_path(raw).map_err(|e| match e {
                    BuildError::InvalidPath { path, message } => {
                        EvalError::InvalidPath { path, message }
                    }
                    other => EvalError::InvalidPath {
                        path: raw.to_string(),
                        message: other.to_string(),
                    },
                })?;
                resolve_path(&args[0], &path)
            },
        )
        .with_typing(Typing::Attribute),
        FunctionDefinition::new(
            "all",
            vec![Type::array(Type::Boolean), Type::Boolean],
            Type::Boolean,
            |args| aggregate(args, |items, expected| items.iter().all(|b| *b == expected)),
        ),
        FunctionDefinition::new(
            "any",
            vec![Type::array(Type::Boolean), Type::Boolean],
            Type::Boolean,
            |args| aggregate(args, |items, expected| items.iter().any(|b| *b == expected)),
        ),
        FunctionDefinition::new(
            "selectSet",
            vec![Type::array(Type::optional(Type::Any))],
            Type::array(Type::Any),
            |args| {
                let items = args[0].expect_array()?;
                Ok(Value::Array(
                    items.iter().filter(|v| !v.is_empty()).cloned().collect(),
                ))
            },
        )
        .with_typing(Typing::ArrayFilter),
    ]
}

fn aggregate(
    args: &[Value],
    test: impl FnOnce(&[bool], bool) -> bool,
) -> Result<Value, EvalError> {
    let items = args[0]
        .expect_array()?
        .iter()
        .map(Value::expect_bool)
        .collect::<Result<Vec<bool>, _>>()?;
    let expected = args[1].expect_bool()?;
    Ok(Value::Boolean(test(&items, expected)))
}
