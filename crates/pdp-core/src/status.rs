//! Evaluation-time errors and XACML status codes
//!
//! Everything that can go wrong while deciding a request is an
//! [`IndeterminateError`]. These never abort the decision: the nearest
//! enclosing Rule, Policy or PolicySet turns them into an Indeterminate result.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// XACML status codes carried by Indeterminate decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    pub fn urn(self) -> &'static str {
        match self {
            StatusCode::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            StatusCode::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            StatusCode::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            StatusCode::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn())
    }
}

/// What kind of failure produced an [`IndeterminateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndeterminateKind {
    /// Attribute absent, unresolvable, or required but empty
    MissingAttribute,
    /// Evaluation needs a request context and none was given
    /// (constant folding tries expressions this way)
    ContextRequired,
    /// No Content node for the category of an AttributeSelector
    MissingContent,
    /// Malformed value or expression met at evaluation time
    Syntax,
    /// Any other evaluation failure
    Processing,
}

/// Recoverable evaluation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct IndeterminateError {
    kind: IndeterminateKind,
    message: String,
}

impl IndeterminateError {
    pub fn new(kind: IndeterminateKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn missing_attribute(message: impl Into<String>) -> Self {
        Self::new(IndeterminateKind::MissingAttribute, message)
    }

    pub fn context_required(message: impl Into<String>) -> Self {
        Self::new(IndeterminateKind::ContextRequired, message)
    }

    pub fn missing_content(message: impl Into<String>) -> Self {
        Self::new(IndeterminateKind::MissingContent, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(IndeterminateKind::Syntax, message)
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(IndeterminateKind::Processing, message)
    }

    pub fn kind(&self) -> IndeterminateKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            IndeterminateKind::MissingAttribute | IndeterminateKind::ContextRequired => {
                StatusCode::MissingAttribute
            },
            IndeterminateKind::MissingContent | IndeterminateKind::Syntax => {
                StatusCode::SyntaxError
            },
            IndeterminateKind::Processing => StatusCode::ProcessingError,
        }
    }

    /// Prefix the message with where the error surfaced, keeping the kind
    pub fn within(self, location: impl fmt::Display) -> Self {
        Self { kind: self.kind, message: format!("{}: {}", location, self.message) }
    }
}

impl From<crate::value::TypeError> for IndeterminateError {
    fn from(err: crate::value::TypeError) -> Self {
        // A cast failure after build-time validation is a bug, not a decision outcome
        tracing::error!("Unexpected type error during evaluation: {}", err);
        IndeterminateError::processing(err.to_string())
    }
}

impl From<crate::value::ValueParseError> for IndeterminateError {
    fn from(err: crate::value::ValueParseError) -> Self {
        IndeterminateError::syntax(err.to_string())
    }
}
