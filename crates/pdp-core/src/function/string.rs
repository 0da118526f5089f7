//! String functions

use super::{FirstOrderFunction, Function, FunctionSignature};
use crate::value::{AttributeValue, Datatype, Value};
use std::sync::Arc;

pub const STRING_CONCATENATE: &str = "urn:oasis:names:tc:xacml:2.0:function:string-concatenate";

pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![Arc::new(FirstOrderFunction::eager(
        FunctionSignature::variadic(
            STRING_CONCATENATE,
            Datatype::STRING,
            vec![Datatype::STRING, Datatype::STRING, Datatype::STRING],
        ),
        |args| {
            let mut out = String::new();
            for v in args.into_primitives()? {
                out.push_str(v.cast::<String>()?);
            }
            Ok(Value::Primitive(AttributeValue::String(out)))
        },
    ))]
}
