//! Bag functions, one set per primitive type

use super::{FirstOrderFunction, Function, FunctionSignature};
use crate::status::IndeterminateError;
use crate::value::{Bag, Datatype, PrimitiveType, Value};
use std::sync::Arc;

fn single_bag(bags: Vec<Bag>) -> Result<Bag, IndeterminateError> {
    bags.into_iter()
        .next()
        .ok_or_else(|| IndeterminateError::processing("expected a bag operand"))
}

pub fn one_and_only(t: PrimitiveType) -> FirstOrderFunction {
    let id = t.function_id("one-and-only");
    let error_id = id.clone();
    FirstOrderFunction::eager(
        FunctionSignature::new(id, Datatype::Primitive(t), vec![Datatype::bag_of(t)]),
        move |args| {
            let bag = single_bag(args.into_bags()?)?;
            let value = bag
                .single_value()
                .map_err(|e| IndeterminateError::processing(format!("{}: {}", error_id, e)))?;
            Ok(Value::Primitive(value.clone()))
        },
    )
}

pub fn bag_size(t: PrimitiveType) -> FirstOrderFunction {
    FirstOrderFunction::eager(
        FunctionSignature::new(t.function_id("bag-size"), Datatype::INTEGER, vec![Datatype::bag_of(t)]),
        |args| {
            let bag = single_bag(args.into_bags()?)?;
            Ok(Value::from(bag.len() as i64))
        },
    )
}

pub fn is_in(t: PrimitiveType) -> FirstOrderFunction {
    FirstOrderFunction::eager(
        FunctionSignature::new(
            t.function_id("is-in"),
            Datatype::BOOLEAN,
            vec![Datatype::Primitive(t), Datatype::bag_of(t)],
        ),
        |args| match args {
            super::EagerArgs::PrimitivesThenBags { primitives, bags } => {
                let needle = primitives
                    .first()
                    .ok_or_else(|| IndeterminateError::processing("is-in: missing value"))?;
                Ok(Value::from(single_bag(bags)?.contains(needle)))
            },
            _ => Err(IndeterminateError::processing("is-in: expected a value and a bag")),
        },
    )
}

pub fn bag(t: PrimitiveType) -> FirstOrderFunction {
    FirstOrderFunction::eager(
        FunctionSignature::variadic(t.function_id("bag"), Datatype::bag_of(t), vec![Datatype::Primitive(t)]),
        move |args| Ok(Value::Bag(Bag::new(t, args.into_primitives()?)?)),
    )
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let mut functions: Vec<Arc<dyn Function>> = Vec::new();
    for t in PrimitiveType::ALL {
        functions.push(Arc::new(one_and_only(t)));
        functions.push(Arc::new(bag_size(t)));
        functions.push(Arc::new(is_in(t)));
        functions.push(Arc::new(bag(t)));
    }
    functions
}
