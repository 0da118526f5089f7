//! Expression engine
//!
//! Expressions are built once by the [`ExpressionFactory`] and are immutable
//! afterwards. Evaluation only ever writes to the per-request
//! [`EvaluationContext`].
//!
//! Evaluating with `None` for the context means "no request available". It
//! is how constant folding tries an expression at load time: anything that
//! needs the request fails with a context-required error.

pub mod context;
pub mod designator;
pub mod factory;
pub mod selector;
pub mod variable;
pub mod xpath;

pub use context::{AttributeKey, AttributeProvider, EvaluationContext, SelectorKey, VariableKey};
pub use designator::AttributeDesignator;
pub use factory::ExpressionFactory;
pub use selector::AttributeSelector;
pub use variable::{ReferenceChain, VariableReference, VariableScope};
pub use xpath::{CompiledXPath, NodeKind, XPathCompiler, XdmItem, XdmNode, XmlNode};

use crate::function::{Function, FunctionCall};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Bag, Datatype, Value};
use std::fmt;
use std::sync::Arc;

/// A typed expression
#[derive(Debug, Clone)]
pub enum Expression {
    Constant(Value),
    FunctionCall(Arc<FunctionCall>),
    AttributeDesignator(Arc<AttributeDesignator>),
    AttributeSelector(Arc<AttributeSelector>),
    VariableReference(VariableReference),
    /// A function passed as argument to a higher-order function
    Function(Arc<dyn Function>),
}

impl Expression {
    /// Static return type, known without evaluating
    pub fn return_type(&self) -> Datatype {
        match self {
            Expression::Constant(v) => v.datatype(),
            Expression::FunctionCall(call) => call.return_type(),
            Expression::AttributeDesignator(d) => d.return_type(),
            Expression::AttributeSelector(s) => s.return_type(),
            Expression::VariableReference(v) => v.return_type(),
            Expression::Function(f) => f.return_type(),
        }
    }

    pub fn evaluate(&self, ctx: Option<&mut EvaluationContext>) -> Result<Value, IndeterminateError> {
        match self {
            Expression::Constant(v) => Ok(v.clone()),
            Expression::FunctionCall(call) => call.evaluate(ctx),
            Expression::AttributeDesignator(d) => d.evaluate(ctx).map(Value::Bag),
            Expression::AttributeSelector(s) => s.evaluate(ctx).map(Value::Bag),
            Expression::VariableReference(v) => v.evaluate(ctx),
            Expression::Function(f) => Err(IndeterminateError::processing(format!(
                "function {} used as a value",
                f.id()
            ))),
        }
    }

    pub fn evaluate_bag(&self, ctx: Option<&mut EvaluationContext>) -> Result<Bag, IndeterminateError> {
        Ok(self.evaluate(ctx)?.into_bag()?)
    }

    pub fn evaluate_primitive(
        &self,
        ctx: Option<&mut EvaluationContext>,
    ) -> Result<AttributeValue, IndeterminateError> {
        Ok(self.evaluate(ctx)?.into_primitive()?)
    }

    pub fn evaluate_boolean(&self, ctx: Option<&mut EvaluationContext>) -> Result<bool, IndeterminateError> {
        Ok(*self.evaluate(ctx)?.cast::<bool>()?)
    }

    /// The value of this expression if it can be computed without a request
    pub fn try_evaluate_static(&self) -> Option<Value> {
        match self {
            Expression::Constant(v) => Some(v.clone()),
            Expression::AttributeDesignator(_) | Expression::AttributeSelector(_) | Expression::Function(_) => {
                None
            },
            Expression::VariableReference(v) => v.constant_value().cloned(),
            Expression::FunctionCall(call) => call.evaluate(None).ok(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Constant(_))
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::Constant(v)
    }
}

impl From<AttributeValue> for Expression {
    fn from(v: AttributeValue) -> Self {
        Expression::Constant(Value::Primitive(v))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(v) => write!(f, "{}", v),
            Expression::FunctionCall(call) => write!(f, "{}(..{} args)", call.function_id(), call.args().len()),
            Expression::AttributeDesignator(d) => write!(f, "designator({})", d.key()),
            Expression::AttributeSelector(s) => write!(f, "selector({})", s.path()),
            Expression::VariableReference(v) => write!(f, "var({})", v.id()),
            Expression::Function(func) => write!(f, "function({})", func.id()),
        }
    }
}
