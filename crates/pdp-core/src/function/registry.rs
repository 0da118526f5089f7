//! Function registry with two-key lookup
//!
//! Most functions are found by id alone. Generic functions such as `map`
//! only become concrete once the return type of their sub-function is known,
//! so lookups carry that type as a second key.

use super::{arithmetic, bag, comparison, higher_order, logical, string, Function};
use crate::value::Datatype;
use crate::{Error, Result};
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// Produces a concrete function for a given sub-function return type
pub trait GenericFunctionFactory: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn specialize(&self, sub_function_return_type: Datatype) -> Result<Arc<dyn Function>>;
}

#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: AHashMap<String, Arc<dyn Function>>,
    generic: AHashMap<String, Arc<dyn GenericFunctionFactory>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled standard functions
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let all = logical::functions()
            .into_iter()
            .chain(comparison::functions())
            .chain(arithmetic::functions())
            .chain(string::functions())
            .chain(bag::functions())
            .chain(higher_order::functions());
        for function in all {
            // bundled ids are unique
            registry.functions.insert(function.id().to_string(), function);
        }
        for factory in higher_order::generic_functions() {
            registry.generic.insert(factory.id().to_string(), factory);
        }
        registry
    }

    pub fn add(&mut self, function: Arc<dyn Function>) -> Result<()> {
        let id = function.id().to_string();
        if self.functions.contains_key(&id) || self.generic.contains_key(&id) {
            return Err(Error::DuplicateFunction(id));
        }
        self.functions.insert(id, function);
        Ok(())
    }

    pub fn add_generic(&mut self, factory: Arc<dyn GenericFunctionFactory>) -> Result<()> {
        let id = factory.id().to_string();
        if self.functions.contains_key(&id) || self.generic.contains_key(&id) {
            return Err(Error::DuplicateFunction(id));
        }
        self.generic.insert(id, factory);
        Ok(())
    }

    /// Resolve a function by id and, for generic functions, by the return
    /// type of the sub-function passed as first argument
    pub fn get(&self, id: &str, sub_function_return_type: Option<Datatype>) -> Result<Arc<dyn Function>> {
        if let Some(function) = self.functions.get(id) {
            return Ok(Arc::clone(function));
        }
        match (self.generic.get(id), sub_function_return_type) {
            (Some(factory), Some(sub)) => factory.specialize(sub),
            (Some(_), None) => Err(Error::InvalidArgument {
                function: id.to_string(),
                reason: "generic function requires a sub-function as first argument".to_string(),
            }),
            (None, _) => Err(Error::UnknownFunction(id.to_string())),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id) || self.generic.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
