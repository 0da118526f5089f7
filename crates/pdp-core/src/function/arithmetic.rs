//! Integer and double arithmetic

use super::{FirstOrderFunction, Function, FunctionSignature};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Datatype, PrimitiveType, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Subtract,
    Multiply,
}

impl Op {
    fn suffix(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Subtract => "subtract",
            Op::Multiply => "multiply",
        }
    }

    fn integers(self, a: i64, b: i64) -> Option<i64> {
        match self {
            Op::Add => a.checked_add(b),
            Op::Subtract => a.checked_sub(b),
            Op::Multiply => a.checked_mul(b),
        }
    }

    fn doubles(self, a: f64, b: f64) -> f64 {
        match self {
            Op::Add => a + b,
            Op::Subtract => a - b,
            Op::Multiply => a * b,
        }
    }
}

fn fold(op: Op, values: Vec<AttributeValue>) -> Result<Value, IndeterminateError> {
    let mut it = values.into_iter();
    let first = it
        .next()
        .ok_or_else(|| IndeterminateError::processing(format!("{}: no operands", op.suffix())))?;
    let mut acc = first;
    for next in it {
        acc = match (&acc, &next) {
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => {
                AttributeValue::Integer(op.integers(*a, *b).ok_or_else(|| {
                    IndeterminateError::processing(format!("integer-{}: overflow", op.suffix()))
                })?)
            },
            (AttributeValue::Double(a), AttributeValue::Double(b)) => AttributeValue::Double(op.doubles(*a, *b)),
            _ => {
                return Err(IndeterminateError::processing(format!(
                    "{}: unsupported operands {} and {}",
                    op.suffix(),
                    acc.primitive_type(),
                    next.primitive_type()
                )))
            },
        };
    }
    Ok(Value::Primitive(acc))
}

fn arithmetic(t: PrimitiveType, op: Op) -> FirstOrderFunction {
    let p = Datatype::Primitive(t);
    let id = t.function_id(op.suffix());
    // add and multiply take two or more operands
    let signature = match op {
        Op::Subtract => FunctionSignature::new(id, p, vec![p, p]),
        Op::Add | Op::Multiply => FunctionSignature::variadic(id, p, vec![p, p, p]),
    };
    FirstOrderFunction::eager(signature, move |args| fold(op, args.into_primitives()?))
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let mut functions: Vec<Arc<dyn Function>> = Vec::new();
    for t in [PrimitiveType::Integer, PrimitiveType::Double] {
        for op in [Op::Add, Op::Subtract, Op::Multiply] {
            functions.push(Arc::new(arithmetic(t, op)));
        }
    }
    functions
}
