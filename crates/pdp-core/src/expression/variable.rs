//! Variable definitions and references
//!
//! Variables live in the scope of the Policy that defines them. A reference
//! may only name a variable defined earlier in document order, so reference
//! cycles cannot be expressed.

use super::context::{EvaluationContext, VariableKey};
use super::Expression;
use crate::status::IndeterminateError;
use crate::value::{Datatype, Value};
use crate::{Error, Result};
use ahash::AHashMap;
use std::sync::Arc;

/// Ids of the variables an expression reaches through references, outermost first
pub type ReferenceChain = Vec<String>;

#[derive(Debug)]
pub struct ConstantVariable {
    id: String,
    value: Value,
}

#[derive(Debug)]
pub struct DynamicVariable {
    key: VariableKey,
    expression: Expression,
}

#[derive(Debug, Clone)]
pub enum VariableReference {
    /// The definition folded to a constant at load time
    Constant(Arc<ConstantVariable>),
    /// Computed at most once per request, then read from the context
    Dynamic(Arc<DynamicVariable>),
}

impl VariableReference {
    pub fn id(&self) -> &str {
        match self {
            VariableReference::Constant(c) => &c.id,
            VariableReference::Dynamic(d) => &d.key.id,
        }
    }

    pub fn return_type(&self) -> Datatype {
        match self {
            VariableReference::Constant(c) => c.value.datatype(),
            VariableReference::Dynamic(d) => d.expression.return_type(),
        }
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            VariableReference::Constant(c) => Some(&c.value),
            VariableReference::Dynamic(_) => None,
        }
    }

    pub fn evaluate(&self, ctx: Option<&mut EvaluationContext>) -> std::result::Result<Value, IndeterminateError> {
        match self {
            VariableReference::Constant(c) => Ok(c.value.clone()),
            VariableReference::Dynamic(d) => match ctx {
                None => d.expression.evaluate(None),
                Some(ctx) => {
                    if let Some(cached) = ctx.variable(&d.key) {
                        return Ok(cached.clone());
                    }
                    let value = d
                        .expression
                        .evaluate(Some(&mut *ctx))
                        .map_err(|e| e.within(format!("variable '{}'", d.key.id)))?;
                    ctx.cache_variable(d.key.clone(), value.clone());
                    Ok(value)
                },
            },
        }
    }
}

#[derive(Debug, Clone)]
struct VariableEntry {
    reference: VariableReference,
    chain: ReferenceChain,
}

/// Symbol table of one Policy
#[derive(Debug, Clone)]
pub struct VariableScope {
    scope_id: String,
    variables: AHashMap<String, VariableEntry>,
}

impl VariableScope {
    pub fn new(scope_id: impl Into<String>) -> Self {
        Self { scope_id: scope_id.into(), variables: AHashMap::new() }
    }

    /// Scope without variables, for expressions outside any Policy
    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    /// A reference to `id` with its longest reference chain
    pub fn lookup(&self, id: &str) -> Option<(&VariableReference, &ReferenceChain)> {
        self.variables.get(id).map(|e| (&e.reference, &e.chain))
    }

    /// Register a built definition. `chain` is the longest reference chain
    /// found inside the definition's expression.
    pub fn define(
        &mut self,
        id: impl Into<String>,
        expression: Expression,
        chain: ReferenceChain,
    ) -> Result<VariableReference> {
        let id = id.into();
        if self.variables.contains_key(&id) {
            return Err(Error::DuplicateVariable(id));
        }
        let reference = match expression {
            Expression::Constant(value) => VariableReference::Constant(Arc::new(ConstantVariable {
                id: id.clone(),
                value,
            })),
            // alias of a constant variable
            Expression::VariableReference(VariableReference::Constant(c)) => {
                VariableReference::Constant(Arc::new(ConstantVariable { id: id.clone(), value: c.value.clone() }))
            },
            expression => VariableReference::Dynamic(Arc::new(DynamicVariable {
                key: VariableKey { scope: self.scope_id.clone(), id: id.clone() },
                expression,
            })),
        };
        self.variables.insert(id, VariableEntry { reference: reference.clone(), chain });
        Ok(reference)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
