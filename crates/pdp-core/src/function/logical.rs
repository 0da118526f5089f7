//! Logical connectives
//!
//! `or`, `and` and `n-of` evaluate their operands strictly in order and stop
//! as soon as the result is known. An Indeterminate operand only surfaces
//! when the remaining operands cannot decide the result without it.

use super::{FirstOrderFunction, Function, FunctionSignature, LazyFn};
use crate::expression::{EvaluationContext, Expression};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Datatype, Value};
use std::sync::Arc;

pub const OR: &str = "urn:oasis:names:tc:xacml:1.0:function:or";
pub const AND: &str = "urn:oasis:names:tc:xacml:1.0:function:and";
pub const N_OF: &str = "urn:oasis:names:tc:xacml:1.0:function:n-of";
pub const NOT: &str = "urn:oasis:names:tc:xacml:1.0:function:not";

/// Operand `i` counting bound arguments first, then deferred values
fn operand(
    ctx: Option<&mut EvaluationContext>,
    args: &[Expression],
    remaining: &[AttributeValue],
    i: usize,
) -> Result<Value, IndeterminateError> {
    match args.get(i) {
        Some(arg) => arg.evaluate(ctx),
        None => remaining
            .get(i - args.len())
            .cloned()
            .map(Value::Primitive)
            .ok_or_else(|| IndeterminateError::processing(format!("no operand #{}", i))),
    }
}

fn boolean_operand(
    ctx: Option<&mut EvaluationContext>,
    args: &[Expression],
    remaining: &[AttributeValue],
    i: usize,
) -> Result<bool, IndeterminateError> {
    Ok(*operand(ctx, args, remaining, i)?.cast::<bool>()?)
}

/// Shared loop of `or` and `and`: `decisive` is the operand value that
/// settles the result on its own
struct Connective {
    decisive: bool,
}

impl LazyFn for Connective {
    fn apply(
        &self,
        mut ctx: Option<&mut EvaluationContext>,
        args: &[Expression],
        remaining: &[AttributeValue],
    ) -> Result<Value, IndeterminateError> {
        let mut first_error = None;
        for i in 0..args.len() + remaining.len() {
            match boolean_operand(ctx.as_deref_mut(), args, remaining, i) {
                Ok(b) if b == self.decisive => return Ok(Value::from(self.decisive)),
                Ok(_) => {},
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(Value::from(!self.decisive)),
        }
    }
}

struct NOf;

impl LazyFn for NOf {
    fn apply(
        &self,
        mut ctx: Option<&mut EvaluationContext>,
        args: &[Expression],
        remaining: &[AttributeValue],
    ) -> Result<Value, IndeterminateError> {
        let total = args.len() + remaining.len();
        let n = *operand(ctx.as_deref_mut(), args, remaining, 0)?.cast::<i64>()?;
        if n < 0 {
            return Err(IndeterminateError::processing(format!("{}: negative count {}", N_OF, n)));
        }
        let n = n as usize;
        if n == 0 {
            return Ok(Value::from(true));
        }
        let candidates = total.saturating_sub(1);
        if n > candidates {
            return Err(IndeterminateError::processing(format!(
                "{}: {} true arguments required but only {} given",
                N_OF, n, candidates
            )));
        }

        let mut count = 0usize;
        let mut errors = 0usize;
        let mut first_error = None;
        for i in 1..total {
            match boolean_operand(ctx.as_deref_mut(), args, remaining, i) {
                Ok(true) => count += 1,
                Ok(false) => {},
                Err(e) => {
                    errors += 1;
                    first_error.get_or_insert(e);
                },
            }
            if count >= n {
                return Ok(Value::from(true));
            }
            let unevaluated = total - 1 - i;
            if count + errors + unevaluated < n {
                return Ok(Value::from(false));
            }
        }
        // only reachable when the errors could have reached n
        match first_error {
            Some(e) => Err(e),
            None => Ok(Value::from(false)),
        }
    }
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(FirstOrderFunction::lazy(
            FunctionSignature::variadic(OR, Datatype::BOOLEAN, vec![Datatype::BOOLEAN]),
            Arc::new(Connective { decisive: true }),
        )),
        Arc::new(FirstOrderFunction::lazy(
            FunctionSignature::variadic(AND, Datatype::BOOLEAN, vec![Datatype::BOOLEAN]),
            Arc::new(Connective { decisive: false }),
        )),
        Arc::new(FirstOrderFunction::lazy(
            FunctionSignature::variadic(N_OF, Datatype::BOOLEAN, vec![Datatype::INTEGER, Datatype::BOOLEAN]),
            Arc::new(NOf),
        )),
        Arc::new(FirstOrderFunction::eager(
            FunctionSignature::new(NOT, Datatype::BOOLEAN, vec![Datatype::BOOLEAN]),
            |args| {
                let values = args.into_primitives()?;
                let b = values
                    .first()
                    .ok_or_else(|| IndeterminateError::processing("not: missing operand"))?
                    .cast::<bool>()?;
                Ok(Value::from(!*b))
            },
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FunctionRegistry;
    use crate::request::category;
    use crate::expression::AttributeDesignator;

    fn t() -> Expression {
        Expression::Constant(Value::from(true))
    }

    fn f() -> Expression {
        Expression::Constant(Value::from(false))
    }

    fn n(i: i64) -> Expression {
        Expression::Constant(Value::from(i))
    }

    /// A boolean operand that fails when evaluated without a request
    fn unknown() -> Expression {
        let designator = AttributeDesignator::new(category::ENVIRONMENT, "flag", crate::value::PrimitiveType::Boolean)
            .must_be_present(true);
        let one_and_only = FunctionRegistry::standard()
            .get("urn:oasis:names:tc:xacml:1.0:function:boolean-one-and-only", None)
            .unwrap();
        Expression::FunctionCall(Arc::new(
            one_and_only
                .new_call(vec![Expression::AttributeDesignator(Arc::new(designator))])
                .unwrap(),
        ))
    }

    fn eval(id: &str, args: Vec<Expression>) -> Result<Value, IndeterminateError> {
        FunctionRegistry::standard()
            .get(id, None)
            .unwrap()
            .new_call(args)
            .unwrap()
            .evaluate(None)
    }

    #[test]
    fn test_empty_connectives() {
        assert_eq!(eval(OR, vec![]).unwrap(), Value::from(false));
        assert_eq!(eval(AND, vec![]).unwrap(), Value::from(true));
    }

    #[test]
    fn test_or_short_circuits_past_errors() {
        assert_eq!(eval(OR, vec![unknown(), t()]).unwrap(), Value::from(true));
        assert_eq!(eval(OR, vec![t(), unknown()]).unwrap(), Value::from(true));
        assert!(eval(OR, vec![f(), unknown()]).is_err());
    }

    #[test]
    fn test_and_short_circuits_past_errors() {
        assert_eq!(eval(AND, vec![unknown(), f()]).unwrap(), Value::from(false));
        assert!(eval(AND, vec![t(), unknown()]).is_err());
        assert_eq!(eval(AND, vec![t(), t()]).unwrap(), Value::from(true));
    }

    #[test]
    fn test_n_of_zero_ignores_operands() {
        assert_eq!(eval(N_OF, vec![n(0), unknown(), unknown()]).unwrap(), Value::from(true));
        assert_eq!(eval(N_OF, vec![n(0)]).unwrap(), Value::from(true));
    }

    #[test]
    fn test_n_of() {
        assert_eq!(eval(N_OF, vec![n(2), t(), f(), t()]).unwrap(), Value::from(true));
        assert_eq!(eval(N_OF, vec![n(2), f(), f(), t()]).unwrap(), Value::from(false));
        // decided before the error is reached
        assert_eq!(eval(N_OF, vec![n(1), t(), unknown()]).unwrap(), Value::from(true));
        // cannot be decided without the error
        assert!(eval(N_OF, vec![n(2), t(), unknown(), f()]).is_err());
        // false regardless of the error
        assert_eq!(eval(N_OF, vec![n(3), f(), unknown(), t()]).unwrap(), Value::from(false));
        assert!(eval(N_OF, vec![n(3), t(), t()]).is_err());
    }

    #[test]
    fn test_not() {
        assert_eq!(eval(NOT, vec![t()]).unwrap(), Value::from(false));
        assert_eq!(eval(NOT, vec![f()]).unwrap(), Value::from(true));
    }
}
