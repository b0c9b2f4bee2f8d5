#![allow(clippy::result_large_err)]
//! endpoint-rules-core: the endpoint rule-set language.
//!
//! Provides the structural type system, runtime values, the expression
//! tree and function library, rule-set syntax, and the static type checker.
//! Evaluation lives in `endpoint-rules-eval`.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`Type`] and [`Value`] -- static types and runtime values
//! - [`Expression`] -- expression tree, built through a [`FunctionRegistry`]
//! - [`EndpointRuleSet`], [`Rule`], [`Condition`], [`Parameter`] -- rule-set syntax
//! - [`Scope`] -- nestable binding environment
//! - [`TypeError`], [`BuildError`], [`EvalError`] -- error types

pub mod ast;
pub mod error;
pub mod functions;
pub mod ruleset;
pub mod scope;
pub mod typecheck;
pub mod types;
pub mod values;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Expression, Identifier, SourceLocation};
pub use error::{BuildError, EvalError, TypeError};
pub use functions::{FunctionDefinition, FunctionRegistry};
pub use ruleset::{Condition, Endpoint, EndpointRuleSet, Parameter, ParameterType, Rule, RuleKind};
pub use scope::Scope;
pub use types::Type;
pub use values::{EndpointValue, Value};

// ── Convenience re-exports: type checking ────────────────────────────

pub use typecheck::{check_expression, check_rule_set};
