//! Equality and ordering predicates

use super::{FirstOrderFunction, Function, FunctionSignature};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Datatype, PrimitiveType, Value};
use std::cmp::Ordering;
use std::sync::Arc;

fn pair(values: Vec<AttributeValue>) -> Result<(AttributeValue, AttributeValue), IndeterminateError> {
    let mut it = values.into_iter();
    match (it.next(), it.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(IndeterminateError::processing("expected two operands")),
    }
}

fn partial_order(a: &AttributeValue, b: &AttributeValue) -> Result<Option<Ordering>, IndeterminateError> {
    let ordering = match (a, b) {
        (AttributeValue::Integer(x), AttributeValue::Integer(y)) => Some(x.cmp(y)),
        (AttributeValue::Double(x), AttributeValue::Double(y)) => x.partial_cmp(y),
        (AttributeValue::String(x), AttributeValue::String(y)) => Some(x.cmp(y)),
        _ => {
            return Err(IndeterminateError::processing(format!(
                "cannot order {} and {}",
                a.primitive_type(),
                b.primitive_type()
            )))
        },
    };
    Ok(ordering)
}

/// `<type>-equal` for one primitive type
pub fn equal(t: PrimitiveType) -> FirstOrderFunction {
    let p = Datatype::Primitive(t);
    FirstOrderFunction::eager(
        FunctionSignature::new(t.function_id("equal"), Datatype::BOOLEAN, vec![p, p]),
        |args| {
            let (a, b) = pair(args.into_primitives()?)?;
            Ok(Value::from(a == b))
        },
    )
}

fn ordering(t: PrimitiveType, suffix: &str, accept: fn(Ordering) -> bool) -> FirstOrderFunction {
    let p = Datatype::Primitive(t);
    FirstOrderFunction::eager(
        FunctionSignature::new(t.function_id(suffix), Datatype::BOOLEAN, vec![p, p]),
        move |args| {
            let (a, b) = pair(args.into_primitives()?)?;
            Ok(Value::from(partial_order(&a, &b)?.map_or(false, accept)))
        },
    )
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let mut functions: Vec<Arc<dyn Function>> = PrimitiveType::ALL
        .iter()
        .map(|t| Arc::new(equal(*t)) as Arc<dyn Function>)
        .collect();

    for t in [PrimitiveType::Integer, PrimitiveType::Double, PrimitiveType::String] {
        functions.push(Arc::new(ordering(t, "greater-than", |o| o == Ordering::Greater)));
        functions.push(Arc::new(ordering(t, "greater-than-or-equal", |o| o != Ordering::Less)));
        functions.push(Arc::new(ordering(t, "less-than", |o| o == Ordering::Less)));
        functions.push(Arc::new(ordering(t, "less-than-or-equal", |o| o != Ordering::Greater)));
    }
    functions
}
