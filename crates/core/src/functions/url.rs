//! `parseUrl`: split an endpoint URL into the record the rules inspect.

use std::collections::BTreeMap;

use url::{Host, Position, Url};

use super::FunctionDefinition;
use crate::ast::Identifier;
use crate::types::Type;
use crate::values::Value;

const SCHEME: &str = "scheme";
const AUTHORITY: &str = "authority";
const PATH: &str = "path";
const NORMALIZED_PATH: &str = "normalizedPath";
const IS_IP: &str = "isIp";

pub(super) fn definition() -> FunctionDefinition {
    FunctionDefinition::new(
        "parseUrl",
        vec![Type::String],
        Type::optional(url_type()),
        |args| {
            Ok(parse_url(args[0].expect_string()?)
                .map(Value::Record)
                .unwrap_or(Value::Empty))
        },
    )
}

fn url_type() -> Type {
    Type::record([
        (SCHEME, Type::String),
        (AUTHORITY, Type::String),
        (PATH, Type::String),
        (NORMALIZED_PATH, Type::String),
        (IS_IP, Type::Boolean),
    ])
}

/// Parses an `http`/`https` URL. Returns `None` when the URL is malformed
/// or carries a query string.
pub fn parse_url(input: &str) -> Option<BTreeMap<Identifier, Value>> {
    let url = Url::parse(input).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.query().is_some() {
        return None;
    }
    let host = url.host()?;
    let authority = &url[Position::BeforeHost..Position::AfterPort];
    let path = if has_explicit_path(input) { url.path() } else { "" };

    let mut record = BTreeMap::new();
    record.insert(Identifier::from(SCHEME), Value::from(url.scheme()));
    record.insert(Identifier::from(AUTHORITY), Value::from(authority));
    record.insert(Identifier::from(PATH), Value::from(path));
    record.insert(
        Identifier::from(NORMALIZED_PATH),
        Value::String(normalize_path(path)),
    );
    record.insert(
        Identifier::from(IS_IP),
        Value::Boolean(matches!(host, Host::Ipv4(_) | Host::Ipv6(_))),
    );
    Some(record)
}

/// `Url` always reports `/` for a bare authority; the rules see `""`.
fn has_explicit_path(input: &str) -> bool {
    let Some((_, rest)) = input.split_once("://") else {
        return false;
    };
    let rest = rest.split('#').next().unwrap_or_default();
    rest.contains('/')
}

fn normalize_path(path: &str) -> String {
    if path.trim().is_empty() {
        return "/".to_string();
    }
    let mut normalized = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !path.ends_with('/') {
        normalized.push('/');
    }
    normalized
}
