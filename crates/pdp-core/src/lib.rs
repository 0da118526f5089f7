//! Core of an XACML 3.0 Policy Decision Point
//!
//! Policies are compiled once from a [`PolicyDocument`](ast::PolicyDocument)
//! into evaluator trees: expressions are type checked and constant folded,
//! functions bound to their arguments and policy references resolved to the
//! matching version. Requests are then evaluated by the [`Pdp`] against an
//! immutable snapshot of that tree.

pub mod ast;
pub mod config;
pub mod engine;
pub mod expression;
pub mod function;
pub mod policy;
pub mod request;
pub mod status;
pub mod value;

// Test doubles shared by unit, integration tests and benches
pub mod testing;

pub use config::PdpConfig;
pub use engine::{Pdp, PdpBuilder};
pub use expression::{EvaluationContext, Expression, ExpressionFactory};
pub use function::FunctionRegistry;
pub use policy::{CombiningAlgRegistry, DecisionKind, DecisionResult, Effect, PolicyRepository};
pub use request::Request;
pub use status::{IndeterminateError, StatusCode};
pub use value::{AttributeValue, Bag, Datatype, PrimitiveType, Value};

use thiserror::Error;
use value::{TypeError, ValueParseError};

/// Load-time errors. Evaluation never fails with these: request-time
/// problems surface as [`IndeterminateError`]s inside decisions.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments to {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("Function already registered: {0}")]
    DuplicateFunction(String),

    #[error("Unknown combining algorithm: {0}")]
    UnknownCombiningAlgorithm(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Variable defined twice: {0}")]
    DuplicateVariable(String),

    #[error("Reference depth exceeds {max}: {}", chain.join(" -> "))]
    ReferenceDepthExceeded { max: usize, chain: Vec<String> },

    #[error("Circular reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Duplicate policy {id} version {version}")]
    DuplicatePolicy { id: String, version: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ValueParseError> for Error {
    fn from(err: ValueParseError) -> Self {
        Error::Syntax(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
