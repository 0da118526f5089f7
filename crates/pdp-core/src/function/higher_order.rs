//! Higher-order bag functions
//!
//! The first argument of each of these is a function reference. Its call is
//! bound once at load time with the element positions left open, then
//! applied to each bag element at evaluation time.

use super::{Function, FunctionCall, GenericFunctionFactory, LazyFn};
use crate::expression::{EvaluationContext, Expression};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Bag, Datatype, PrimitiveType, Value};
use crate::{Error, Result};
use std::sync::Arc;

pub const ANY_OF: &str = "urn:oasis:names:tc:xacml:3.0:function:any-of";
pub const ALL_OF: &str = "urn:oasis:names:tc:xacml:3.0:function:all-of";
pub const ANY_OF_ANY: &str = "urn:oasis:names:tc:xacml:3.0:function:any-of-any";
pub const MAP: &str = "urn:oasis:names:tc:xacml:3.0:function:map";

fn invalid(function: &str, reason: impl Into<String>) -> Error {
    Error::InvalidArgument { function: function.to_string(), reason: reason.into() }
}

/// Split `(function, primitives..., bag)` arguments, checking their types
fn split_bag_args<'a>(
    id: &str,
    args: &'a [Expression],
    remaining: &[Datatype],
) -> Result<(&'a Arc<dyn Function>, &'a [Expression], PrimitiveType)> {
    if !remaining.is_empty() {
        return Err(invalid(id, "cannot be partially applied"));
    }
    let sub_function = match args.first() {
        Some(Expression::Function(f)) => f,
        _ => return Err(invalid(id, "first argument must be a function")),
    };
    if args.len() < 2 {
        return Err(invalid(id, "expected a function and a bag"));
    }
    let last = &args[args.len() - 1];
    let element_type = match last.return_type() {
        Datatype::Bag(t) => t,
        other => return Err(invalid(id, format!("last argument must be a bag, got {}", other))),
    };
    let middle = &args[1..args.len() - 1];
    if let Some(bag_arg) = middle.iter().find(|a| a.return_type().is_bag()) {
        return Err(invalid(id, format!("only the last argument may be a bag, got {}", bag_arg.return_type())));
    }
    Ok((sub_function, middle, element_type))
}

/// `any-of` and `all-of`
#[derive(Debug)]
pub struct BooleanBagFunction {
    id: &'static str,
    all: bool,
}

struct BooleanBagBody {
    sub_call: FunctionCall,
    all: bool,
}

impl LazyFn for BooleanBagBody {
    fn apply(
        &self,
        mut ctx: Option<&mut EvaluationContext>,
        args: &[Expression],
        _remaining: &[AttributeValue],
    ) -> std::result::Result<Value, IndeterminateError> {
        let bag_arg = args
            .last()
            .ok_or_else(|| IndeterminateError::processing("missing bag argument"))?;
        let bag = bag_arg.evaluate_bag(ctx.as_deref_mut())?;
        for value in bag.iter() {
            let result = self
                .sub_call
                .evaluate_partial(ctx.as_deref_mut(), std::slice::from_ref(value))?;
            if *result.cast::<bool>()? != self.all {
                return Ok(Value::from(!self.all));
            }
        }
        Ok(Value::from(self.all))
    }
}

impl Function for BooleanBagFunction {
    fn id(&self) -> &str {
        self.id
    }

    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn new_partial_call(&self, args: Vec<Expression>, remaining: &[Datatype]) -> Result<FunctionCall> {
        let (sub_function, middle, element_type) = split_bag_args(self.id, &args, remaining)?;
        if sub_function.return_type() != Datatype::BOOLEAN {
            return Err(invalid(self.id, "sub-function must return a boolean"));
        }
        let sub_call =
            sub_function.new_partial_call(middle.to_vec(), &[Datatype::Primitive(element_type)])?;
        FunctionCall::lazy(
            self.id,
            Datatype::BOOLEAN,
            args,
            &[],
            Arc::new(BooleanBagBody { sub_call, all: self.all }),
        )
    }
}

/// `any-of-any`: true if the sub-function holds for any combination of
/// values, each argument being a primitive or a bag
#[derive(Debug)]
pub struct AnyOfAny;

struct AnyOfAnyBody {
    sub_call: FunctionCall,
}

impl LazyFn for AnyOfAnyBody {
    fn apply(
        &self,
        mut ctx: Option<&mut EvaluationContext>,
        args: &[Expression],
        _remaining: &[AttributeValue],
    ) -> std::result::Result<Value, IndeterminateError> {
        let mut columns: Vec<Vec<AttributeValue>> = Vec::with_capacity(args.len().saturating_sub(1));
        for arg in args.iter().skip(1) {
            let column = match arg.evaluate(ctx.as_deref_mut())? {
                Value::Primitive(v) => vec![v],
                Value::Bag(b) => b.into_values(),
            };
            if column.is_empty() {
                return Ok(Value::from(false));
            }
            columns.push(column);
        }

        // odometer over the cartesian product
        let mut indices = vec![0usize; columns.len()];
        loop {
            let row: Vec<AttributeValue> =
                indices.iter().zip(&columns).map(|(i, c)| c[*i].clone()).collect();
            if *self.sub_call.evaluate_partial(ctx.as_deref_mut(), &row)?.cast::<bool>()? {
                return Ok(Value::from(true));
            }
            let mut pos = columns.len();
            loop {
                if pos == 0 {
                    return Ok(Value::from(false));
                }
                pos -= 1;
                indices[pos] += 1;
                if indices[pos] < columns[pos].len() {
                    break;
                }
                indices[pos] = 0;
            }
        }
    }
}

impl Function for AnyOfAny {
    fn id(&self) -> &str {
        ANY_OF_ANY
    }

    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn new_partial_call(&self, args: Vec<Expression>, remaining: &[Datatype]) -> Result<FunctionCall> {
        if !remaining.is_empty() {
            return Err(invalid(ANY_OF_ANY, "cannot be partially applied"));
        }
        let sub_function = match args.first() {
            Some(Expression::Function(f)) => Arc::clone(f),
            _ => return Err(invalid(ANY_OF_ANY, "first argument must be a function")),
        };
        if args.len() < 2 {
            return Err(invalid(ANY_OF_ANY, "expected a function and at least one argument"));
        }
        if sub_function.return_type() != Datatype::BOOLEAN {
            return Err(invalid(ANY_OF_ANY, "sub-function must return a boolean"));
        }
        let element_types: Vec<Datatype> = args[1..]
            .iter()
            .map(|a| Datatype::Primitive(a.return_type().primitive()))
            .collect();
        let sub_call = sub_function.new_partial_call(Vec::new(), &element_types)?;
        FunctionCall::lazy(ANY_OF_ANY, Datatype::BOOLEAN, args, &[], Arc::new(AnyOfAnyBody { sub_call }))
    }
}

/// `map` specialized for one sub-function return type
#[derive(Debug)]
pub struct MapFunction {
    element_type: PrimitiveType,
}

struct MapBody {
    sub_call: FunctionCall,
    element_type: PrimitiveType,
}

impl LazyFn for MapBody {
    fn apply(
        &self,
        mut ctx: Option<&mut EvaluationContext>,
        args: &[Expression],
        _remaining: &[AttributeValue],
    ) -> std::result::Result<Value, IndeterminateError> {
        let bag_arg = args
            .last()
            .ok_or_else(|| IndeterminateError::processing("missing bag argument"))?;
        let bag = bag_arg.evaluate_bag(ctx.as_deref_mut())?;
        let mut mapped = Vec::with_capacity(bag.len());
        for value in bag.iter() {
            let result = self
                .sub_call
                .evaluate_partial(ctx.as_deref_mut(), std::slice::from_ref(value))?;
            mapped.push(result.into_primitive()?);
        }
        Ok(Value::Bag(Bag::new(self.element_type, mapped)?))
    }
}

impl Function for MapFunction {
    fn id(&self) -> &str {
        MAP
    }

    fn return_type(&self) -> Datatype {
        Datatype::Bag(self.element_type)
    }

    fn new_partial_call(&self, args: Vec<Expression>, remaining: &[Datatype]) -> Result<FunctionCall> {
        let (sub_function, middle, element_type) = split_bag_args(MAP, &args, remaining)?;
        if sub_function.return_type() != Datatype::Primitive(self.element_type) {
            return Err(invalid(
                MAP,
                format!(
                    "sub-function returns {}, expected {}",
                    sub_function.return_type(),
                    self.element_type
                ),
            ));
        }
        let sub_call =
            sub_function.new_partial_call(middle.to_vec(), &[Datatype::Primitive(element_type)])?;
        FunctionCall::lazy(
            MAP,
            Datatype::Bag(self.element_type),
            args,
            &[],
            Arc::new(MapBody { sub_call, element_type: self.element_type }),
        )
    }
}

/// Builds `map` once the sub-function return type is known
#[derive(Debug)]
pub struct MapFactory;

impl GenericFunctionFactory for MapFactory {
    fn id(&self) -> &str {
        MAP
    }

    fn specialize(&self, sub_function_return_type: Datatype) -> Result<Arc<dyn Function>> {
        match sub_function_return_type {
            Datatype::Primitive(element_type) => Ok(Arc::new(MapFunction { element_type })),
            Datatype::Bag(_) => Err(invalid(MAP, "sub-function must return a primitive value")),
        }
    }
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(BooleanBagFunction { id: ANY_OF, all: false }),
        Arc::new(BooleanBagFunction { id: ALL_OF, all: true }),
        Arc::new(AnyOfAny),
    ]
}

pub fn generic_functions() -> Vec<Arc<dyn GenericFunctionFactory>> {
    vec![Arc::new(MapFactory)]
}
