//! Function library: definitions and the registry expressions are built
//! against.
//!
//! A definition is data: an id, the argument types, the return type and an
//! evaluation rule over concrete values. A few functions (`selectSet`,
//! `getAttr`) derive their static type from their arguments instead of
//! the fixed signature; their [`Typing`] tells the type checker so.

mod standard;
mod strings;
mod url;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::Expression;
use crate::error::{BuildError, EvalError};
use crate::types::Type;
use crate::values::Value;

pub use self::strings::{is_valid_host_label, substring, uri_encode};
pub use self::url::parse_url;

/// Evaluation rule of a function over already-evaluated arguments.
pub type EvalFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// How the type checker derives a call's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Typing {
    /// Arguments checked against `arguments()`, result is `return_type()`.
    Signature,
    /// `Array<Option<T>>` in, `Array<T>` out.
    ArrayFilter,
    /// Path resolution against the first argument; the second argument is
    /// a literal path string.
    Attribute,
}

#[derive(Clone)]
pub struct FunctionDefinition {
    id: String,
    arguments: Vec<Type>,
    return_type: Type,
    typing: Typing,
    eval: EvalFn,
}

impl FunctionDefinition {
    pub fn new(
        id: impl Into<String>,
        arguments: Vec<Type>,
        return_type: Type,
        eval: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        FunctionDefinition {
            id: id.into(),
            arguments,
            return_type,
            typing: Typing::Signature,
            eval: Arc::new(eval),
        }
    }

    pub(crate) fn with_typing(mut self, typing: Typing) -> Self {
        self.typing = typing;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn arguments(&self) -> &[Type] {
        &self.arguments
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn typing(&self) -> Typing {
        self.typing
    }

    pub fn evaluate(&self, arguments: &[Value]) -> Result<Value, EvalError> {
        if arguments.len() != self.arguments.len() {
            return Err(EvalError::Arity {
                function: self.id.clone(),
                expected: self.arguments.len(),
                found: arguments.len(),
            });
        }
        (self.eval)(arguments)
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("id", &self.id)
            .field("arguments", &self.arguments)
            .field("return_type", &self.return_type)
            .field("typing", &self.typing)
            .finish_non_exhaustive()
    }
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// Table of function definitions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<FunctionDefinition>>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry::default()
    }

    /// The built-in library.
    pub fn standard() -> Self {
        let mut registry = FunctionRegistry::empty();
        for definition in standard::definitions() {
            registry.register(definition);
        }
        for definition in strings::definitions() {
            registry.register(definition);
        }
        registry.register(self::url::definition());
        registry
    }

    /// Adds `definition`, returning the definition it replaced.
    pub fn register(&mut self, definition: FunctionDefinition) -> Option<Arc<FunctionDefinition>> {
        self.functions
            .insert(definition.id.clone(), Arc::new(definition))
    }

    pub fn with(mut self, definition: FunctionDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<FunctionDefinition>> {
        self.functions.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    fn lookup(&self, id: &str) -> Result<Arc<FunctionDefinition>, BuildError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| BuildError::UnknownFunction {
                name: id.to_string(),
            })
    }

    /// Builds a call to the function named `id`.
    pub fn call(&self, id: &str, arguments: Vec<Expression>) -> Result<Expression, BuildError> {
        Ok(Expression::call(self.lookup(id)?, arguments))
    }

    /// Builds a call to `id` mapped element-wise over `on`.
    pub fn map(
        &self,
        id: &str,
        on: Expression,
        arguments: Vec<Expression>,
    ) -> Result<Expression, BuildError> {
        Expression::map(self.lookup(id)?, on, arguments)
    }
}
