//! AttributeDesignator: bag lookup by category and attribute id

use super::context::{AttributeKey, EvaluationContext};
use crate::status::IndeterminateError;
use crate::value::{Bag, Datatype, PrimitiveType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDesignator {
    key: AttributeKey,
    datatype: PrimitiveType,
    must_be_present: bool,
}

impl AttributeDesignator {
    pub fn new(category: impl Into<String>, attribute_id: impl Into<String>, datatype: PrimitiveType) -> Self {
        Self {
            key: AttributeKey::new(category, attribute_id),
            datatype,
            must_be_present: false,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.key = self.key.with_issuer(issuer);
        self
    }

    pub fn must_be_present(mut self, required: bool) -> Self {
        self.must_be_present = required;
        self
    }

    /// Cache identity; excludes the datatype
    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    pub fn datatype(&self) -> PrimitiveType {
        self.datatype
    }

    pub fn is_required(&self) -> bool {
        self.must_be_present
    }

    pub fn return_type(&self) -> Datatype {
        Datatype::Bag(self.datatype)
    }

    pub fn evaluate(&self, ctx: Option<&mut EvaluationContext>) -> Result<Bag, IndeterminateError> {
        let ctx = ctx.ok_or_else(|| {
            IndeterminateError::context_required(format!(
                "AttributeDesignator {} needs a request context",
                self.key
            ))
        })?;
        let bag = ctx.resolve_attribute(&self.key, self.datatype)?;
        if bag.is_empty() && self.must_be_present {
            return Err(IndeterminateError::missing_attribute(format!(
                "Missing attribute {}: required but absent",
                self.key
            )));
        }
        Ok(bag)
    }
}
