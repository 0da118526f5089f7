//! Function dispatch
//!
//! A [`Function`] validates its arguments once, at policy load time, and
//! returns a [`FunctionCall`] bound to them. Most functions are eager: every
//! argument is evaluated left to right and the body receives the values in
//! one of the [`EagerShape`]s. Short-circuiting connectives and higher-order
//! functions are lazy and drive argument evaluation themselves.

pub mod arithmetic;
pub mod bag;
pub mod comparison;
pub mod higher_order;
pub mod logical;
pub mod registry;
pub mod string;

pub use registry::{FunctionRegistry, GenericFunctionFactory};

use crate::expression::{EvaluationContext, Expression};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Bag, Datatype, PrimitiveType, Value};
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;

/// A function usable in Apply expressions
pub trait Function: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn return_type(&self) -> Datatype;

    /// Bind `args`, leaving trailing arguments of `remaining` types to be
    /// supplied at evaluation time through [`FunctionCall::evaluate_partial`].
    /// Higher-order functions and target matches bind their sub-calls this way.
    fn new_partial_call(&self, args: Vec<Expression>, remaining: &[Datatype]) -> Result<FunctionCall>;

    fn new_call(&self, args: Vec<Expression>) -> Result<FunctionCall> {
        self.new_partial_call(args, &[])
    }
}

/// Declared parameters of a first-order function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub id: String,
    pub return_type: Datatype,
    pub parameter_types: Vec<Datatype>,
    /// The last parameter type repeats zero or more times
    pub variadic: bool,
}

impl FunctionSignature {
    pub fn new(id: impl Into<String>, return_type: Datatype, parameter_types: Vec<Datatype>) -> Self {
        Self { id: id.into(), return_type, parameter_types, variadic: false }
    }

    pub fn variadic(id: impl Into<String>, return_type: Datatype, parameter_types: Vec<Datatype>) -> Self {
        Self { id: id.into(), return_type, parameter_types, variadic: true }
    }

    /// Check argument count and per-position types
    pub fn check_arguments(&self, actual: &[Datatype]) -> Result<()> {
        let declared = self.parameter_types.len();
        if self.variadic {
            let min = declared.saturating_sub(1);
            if actual.len() < min {
                return Err(self.invalid(format!(
                    "expected at least {} argument(s), got {}",
                    min,
                    actual.len()
                )));
            }
        } else if actual.len() != declared {
            return Err(self.invalid(format!(
                "expected {} argument(s), got {}",
                declared,
                actual.len()
            )));
        }

        for (i, actual_type) in actual.iter().enumerate() {
            // past the declared list only when variadic: repeat the last type
            let expected = match self.parameter_types.get(i).or(self.parameter_types.last()) {
                Some(expected) => *expected,
                None => return Err(self.invalid(format!("no parameter type for argument #{}", i))),
            };
            if *actual_type != expected {
                return Err(self.invalid(format!(
                    "argument #{} must be {}, got {}",
                    i, expected, actual_type
                )));
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidArgument { function: self.id.clone(), reason }
    }
}

/// How evaluated arguments are handed to an eager body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EagerShape {
    /// Every argument is a primitive of this one type
    SinglePrimitiveType(PrimitiveType),
    /// Primitives of different types
    MixedPrimitiveTypes,
    AllBags,
    /// `primitive_count` primitives followed by bags
    PrimitivesThenBags { primitive_count: usize },
}

impl EagerShape {
    /// Pick the shape for the given argument types. A bag followed by a
    /// primitive has no shape; functions never declare such signatures.
    pub fn select(function_id: &str, types: &[Datatype]) -> Result<Self> {
        let primitive_count = types.iter().take_while(|t| !t.is_bag()).count();
        if types[primitive_count..].iter().any(|t| !t.is_bag()) {
            return Err(Error::Internal(format!(
                "{}: primitive argument after a bag argument",
                function_id
            )));
        }

        let shape = if primitive_count == types.len() {
            match types.first() {
                Some(first) if types.iter().all(|t| t == first) => {
                    EagerShape::SinglePrimitiveType(first.primitive())
                },
                _ => EagerShape::MixedPrimitiveTypes,
            }
        } else if primitive_count == 0 {
            EagerShape::AllBags
        } else {
            EagerShape::PrimitivesThenBags { primitive_count }
        };
        Ok(shape)
    }
}

/// Evaluated arguments of an eager call
#[derive(Debug, Clone)]
pub enum EagerArgs {
    Primitives(Vec<AttributeValue>),
    Bags(Vec<Bag>),
    PrimitivesThenBags { primitives: Vec<AttributeValue>, bags: Vec<Bag> },
}

impl EagerArgs {
    /// The primitive arguments, or a type error for bag-only shapes
    pub fn into_primitives(self) -> std::result::Result<Vec<AttributeValue>, IndeterminateError> {
        match self {
            EagerArgs::Primitives(values) => Ok(values),
            EagerArgs::PrimitivesThenBags { primitives, .. } => Ok(primitives),
            EagerArgs::Bags(_) => Err(IndeterminateError::processing("expected primitive arguments")),
        }
    }

    pub fn into_bags(self) -> std::result::Result<Vec<Bag>, IndeterminateError> {
        match self {
            EagerArgs::Bags(bags) => Ok(bags),
            EagerArgs::PrimitivesThenBags { bags, .. } => Ok(bags),
            EagerArgs::Primitives(_) => Err(IndeterminateError::processing("expected bag arguments")),
        }
    }
}

pub type EagerBody =
    Arc<dyn Fn(EagerArgs) -> std::result::Result<Value, IndeterminateError> + Send + Sync>;

/// Body of a function that controls its own argument evaluation
pub trait LazyFn: Send + Sync {
    fn apply(
        &self,
        ctx: Option<&mut EvaluationContext>,
        args: &[Expression],
        remaining: &[AttributeValue],
    ) -> std::result::Result<Value, IndeterminateError>;
}

#[derive(Clone)]
pub enum CallBody {
    Eager { shape: EagerShape, body: EagerBody },
    Lazy(Arc<dyn LazyFn>),
}

impl fmt::Debug for CallBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallBody::Eager { shape, .. } => f.debug_struct("Eager").field("shape", shape).finish(),
            CallBody::Lazy(_) => f.write_str("Lazy"),
        }
    }
}

/// A function bound to its argument expressions
#[derive(Debug, Clone)]
pub struct FunctionCall {
    function_id: String,
    return_type: Datatype,
    args: Vec<Expression>,
    remaining_types: Vec<Datatype>,
    body: CallBody,
}

impl FunctionCall {
    /// Bind an eager body, selecting its shape from the argument types
    pub fn eager(
        function_id: impl Into<String>,
        return_type: Datatype,
        args: Vec<Expression>,
        remaining_types: &[Datatype],
        body: EagerBody,
    ) -> Result<Self> {
        let function_id = function_id.into();
        let types: Vec<Datatype> = args
            .iter()
            .map(Expression::return_type)
            .chain(remaining_types.iter().copied())
            .collect();
        let shape = EagerShape::select(&function_id, &types)?;
        Self::bind(function_id, return_type, args, remaining_types, CallBody::Eager { shape, body })
    }

    pub fn lazy(
        function_id: impl Into<String>,
        return_type: Datatype,
        args: Vec<Expression>,
        remaining_types: &[Datatype],
        body: Arc<dyn LazyFn>,
    ) -> Result<Self> {
        Self::bind(function_id.into(), return_type, args, remaining_types, CallBody::Lazy(body))
    }

    fn bind(
        function_id: String,
        return_type: Datatype,
        args: Vec<Expression>,
        remaining_types: &[Datatype],
        body: CallBody,
    ) -> Result<Self> {
        if let Some(bag) = remaining_types.iter().find(|t| t.is_bag()) {
            return Err(Error::Internal(format!(
                "{}: deferred arguments must be primitive, got {}",
                function_id, bag
            )));
        }
        Ok(Self { function_id, return_type, args, remaining_types: remaining_types.to_vec(), body })
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn return_type(&self) -> Datatype {
        self.return_type
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn evaluate(&self, ctx: Option<&mut EvaluationContext>) -> std::result::Result<Value, IndeterminateError> {
        self.evaluate_partial(ctx, &[])
    }

    /// Evaluate with the deferred trailing arguments supplied
    pub fn evaluate_partial(
        &self,
        mut ctx: Option<&mut EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> std::result::Result<Value, IndeterminateError> {
        if remaining.len() != self.remaining_types.len()
            || remaining
                .iter()
                .zip(&self.remaining_types)
                .any(|(v, t)| Datatype::Primitive(v.primitive_type()) != *t)
        {
            return Err(IndeterminateError::processing(format!(
                "{}: deferred arguments do not match the bound signature",
                self.function_id
            )));
        }

        match &self.body {
            CallBody::Lazy(body) => body.apply(ctx, &self.args, remaining),
            CallBody::Eager { shape, body } => {
                let mut values = Vec::with_capacity(self.args.len() + remaining.len());
                for (i, arg) in self.args.iter().enumerate() {
                    let value = arg.evaluate(ctx.as_deref_mut()).map_err(|e| {
                        e.within(format!("{} argument #{}", self.function_id, i))
                    })?;
                    values.push(value);
                }
                values.extend(remaining.iter().cloned().map(Value::Primitive));
                body(Self::shape_args(*shape, values)?)
            },
        }
    }

    fn shape_args(shape: EagerShape, values: Vec<Value>) -> std::result::Result<EagerArgs, IndeterminateError> {
        let args = match shape {
            EagerShape::SinglePrimitiveType(_) | EagerShape::MixedPrimitiveTypes => EagerArgs::Primitives(
                values.into_iter().map(Value::into_primitive).collect::<std::result::Result<_, _>>()?,
            ),
            EagerShape::AllBags => EagerArgs::Bags(
                values.into_iter().map(Value::into_bag).collect::<std::result::Result<_, _>>()?,
            ),
            EagerShape::PrimitivesThenBags { primitive_count } => {
                let mut values = values;
                let bags = values.split_off(primitive_count);
                EagerArgs::PrimitivesThenBags {
                    primitives: values
                        .into_iter()
                        .map(Value::into_primitive)
                        .collect::<std::result::Result<_, _>>()?,
                    bags: bags.into_iter().map(Value::into_bag).collect::<std::result::Result<_, _>>()?,
                }
            },
        };
        Ok(args)
    }
}

/// How a first-order function computes its result
#[derive(Clone)]
pub enum FunctionKind {
    Eager(EagerBody),
    Lazy(Arc<dyn LazyFn>),
}

/// A function with a fixed signature
#[derive(Clone)]
pub struct FirstOrderFunction {
    signature: FunctionSignature,
    kind: FunctionKind,
}

impl FirstOrderFunction {
    pub fn eager<F>(signature: FunctionSignature, body: F) -> Self
    where
        F: Fn(EagerArgs) -> std::result::Result<Value, IndeterminateError> + Send + Sync + 'static,
    {
        Self { signature, kind: FunctionKind::Eager(Arc::new(body)) }
    }

    pub fn lazy(signature: FunctionSignature, body: Arc<dyn LazyFn>) -> Self {
        Self { signature, kind: FunctionKind::Lazy(body) }
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }
}

impl fmt::Debug for FirstOrderFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstOrderFunction").field("signature", &self.signature).finish()
    }
}

impl Function for FirstOrderFunction {
    fn id(&self) -> &str {
        &self.signature.id
    }

    fn return_type(&self) -> Datatype {
        self.signature.return_type
    }

    fn new_partial_call(&self, args: Vec<Expression>, remaining: &[Datatype]) -> Result<FunctionCall> {
        let types: Vec<Datatype> = args
            .iter()
            .map(Expression::return_type)
            .chain(remaining.iter().copied())
            .collect();
        self.signature.check_arguments(&types)?;

        match &self.kind {
            FunctionKind::Eager(body) => FunctionCall::eager(
                self.signature.id.clone(),
                self.signature.return_type,
                args,
                remaining,
                Arc::clone(body),
            ),
            FunctionKind::Lazy(body) => FunctionCall::lazy(
                self.signature.id.clone(),
                self.signature.return_type,
                args,
                remaining,
                Arc::clone(body),
            ),
        }
    }
}
