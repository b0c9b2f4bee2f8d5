//! String built-ins: `substring`, `uriEncode`, `isValidHostLabel`.

use std::sync::LazyLock;

use regex::Regex;

use super::FunctionDefinition;
use crate::types::Type;
use crate::values::Value;

static HOST_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z\d][a-zA-Z\d\-]{0,62}$").expect("valid host label regex")
});

pub(super) fn definitions() -> Vec<FunctionDefinition> {
    vec![
        FunctionDefinition::new(
            "substring",
            vec![Type::String, Type::Integer, Type::Integer, Type::Boolean],
            Type::optional(Type::String),
            |args| {
                let value = args[0].expect_string()?;
                let start = args[1].expect_integer()?;
                let stop = args[2].expect_integer()?;
                let reverse = args[3].expect_bool()?;
                Ok(substring(value, start, stop, reverse)
                    .map(|s| Value::String(s.to_string()))
                    .unwrap_or(Value::Empty))
            },
        ),
        FunctionDefinition::new("uriEncode", vec![Type::String], Type::String, |args| {
            Ok(Value::String(uri_encode(args[0].expect_string()?)))
        }),
        FunctionDefinition::new(
            "isValidHostLabel",
            vec![Type::String, Type::Boolean],
            Type::Boolean,
            |args| {
                Ok(Value::Boolean(is_valid_host_label(
                    args[0].expect_string()?,
                    args[1].expect_bool()?,
                )))
            },
        ),
    ]
}

/// ASCII-only slice `value[start..stop]`, or the mirrored slice counted
/// from the end when `reverse` is set. `None` for non-ASCII input or
/// out-of-range indices.
pub fn substring(value: &str, start: i64, stop: i64, reverse: bool) -> Option<&str> {
    if !value.is_ascii() {
        return None;
    }
    let len = value.len() as i64;
    if start < 0 || start >= stop || len < stop {
        return None;
    }
    let (from, to) = if reverse {
        (len - stop, len - start)
    } else {
        (start, stop)
    };
    value.get(from as usize..to as usize)
}

/// Percent-encodes everything except the RFC 3986 unreserved characters.
pub fn uri_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// A single DNS label, or with `allow_dots` a dot-separated sequence of
/// labels.
pub fn is_valid_host_label(value: &str, allow_dots: bool) -> bool {
    if allow_dots {
        value.split('.').all(|label| HOST_LABEL.is_match(label))
    } else {
        HOST_LABEL.is_match(value)
    }
}
