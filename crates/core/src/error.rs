//! Error types shared by the type checker, the rule-set factories and the
//! evaluator.

use std::fmt;

use crate::ast::SourceLocation;

// ──────────────────────────────────────────────
// Static type errors
// ──────────────────────────────────────────────

/// A static type error. Aborts the whole type-check pass.
///
/// The `context` stack is filled while the error unwinds through function
/// invocations, conditions and rules, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct TypeError {
    pub message: String,
    pub hint: Option<String>,
    pub location: SourceLocation,
    pub context: Vec<(String, SourceLocation)>,
}

impl TypeError {
    pub fn new(message: impl Into<String>) -> Self {
        TypeError {
            message: message.into(),
            hint: None,
            location: SourceLocation::none(),
            context: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Sets the location if none has been recorded yet.
    pub fn at(mut self, location: &SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = location.clone();
        }
        self
    }

    pub fn context(mut self, description: impl Into<String>, location: &SourceLocation) -> Self {
        self.context.push((description.into(), location.clone()));
        self
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.location.is_none() {
            write!(f, " ({})", self.location)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        for (description, location) in &self.context {
            write!(f, "\n  {}", description)?;
            if !location.is_none() {
                write!(f, "\n    at {}", location)?;
            }
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Construction errors
// ──────────────────────────────────────────────

/// Errors raised by the validated factory functions that build expressions,
/// parameters and rule-sets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("`{name}` is not a valid function")]
    UnknownFunction { name: String },

    #[error("invalid attribute path `{path}`: {message}")]
    InvalidPath { path: String, message: String },

    #[error("invalid template `{template}`: {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("duplicate parameter `{name}`")]
    DuplicateParameter { name: String },

    #[error("default value for parameter `{name}` must be {expected}, found {found}")]
    InvalidDefault {
        name: String,
        expected: String,
        found: String,
    },

    #[error("unexpected parameter type `{name}`; expected `String`, `Boolean`, or `StringArray`")]
    UnknownParameterType { name: String },

    #[error("`{function}` cannot be applied in map mode")]
    UnmappableFunction { function: String },
}

// ──────────────────────────────────────────────
// Evaluation errors
// ──────────────────────────────────────────────

/// Errors that terminate an evaluation.
///
/// `ExhaustedTreeRule` and `NoRuleMatched` are rule-set authoring defects;
/// an error rule matching is not an `EvalError` but an ordinary outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("type error: expected {expected} but found {found}")]
    UnexpectedValue { expected: String, found: String },

    #[error("`{function}` expected {expected} arguments but received {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid attribute path `{path}`: {message}")]
    InvalidPath { path: String, message: String },

    #[error("missing required parameter `{name}`")]
    MissingParameter { name: String },

    #[error("invalid value for parameter `{name}`: expected {expected}, found {found}")]
    InvalidParameter {
        name: String,
        expected: String,
        found: String,
    },

    #[error("no rules inside of tree rule matched; invalid rules:\n{rule}")]
    ExhaustedTreeRule { rule: String },

    #[error("no rules in rule-set matched")]
    NoRuleMatched,
}

impl EvalError {
    pub(crate) fn unexpected(expected: impl Into<String>, found: &crate::values::Value) -> Self {
        EvalError::UnexpectedValue {
            expected: expected.into(),
            found: found.type_name().to_string(),
        }
    }
}
