//! Bags: unordered multisets of primitive values of one element type

use super::{AttributeValue, Datatype, PrimitiveType, TypeError};
use crate::status::IndeterminateError;
use std::fmt;
use thiserror::Error;

/// `single_value` on a bag that does not hold exactly one value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Expected a bag with exactly one value, found {size}")]
pub struct EmptyOrMultiValueError {
    pub size: usize,
}

/// Unordered multiset of values sharing one element type.
///
/// An empty bag may carry the error that explains why it is empty, so a
/// later `MustBePresent` check can report the underlying cause.
#[derive(Debug, Clone)]
pub struct Bag {
    element_type: PrimitiveType,
    values: Vec<AttributeValue>,
    cause: Option<IndeterminateError>,
}

impl Bag {
    /// Build a bag, rejecting values of another type
    pub fn new(element_type: PrimitiveType, values: Vec<AttributeValue>) -> Result<Self, TypeError> {
        if let Some(bad) = values.iter().find(|v| v.primitive_type() != element_type) {
            return Err(TypeError::new(element_type, bad.primitive_type()));
        }
        Ok(Self { element_type, values, cause: None })
    }

    pub fn empty(element_type: PrimitiveType) -> Self {
        Self { element_type, values: Vec::new(), cause: None }
    }

    /// Empty bag remembering why no value could be found
    pub fn empty_with_cause(element_type: PrimitiveType, cause: IndeterminateError) -> Self {
        Self { element_type, values: Vec::new(), cause: Some(cause) }
    }

    pub fn singleton(value: AttributeValue) -> Self {
        Self { element_type: value.primitive_type(), values: vec![value], cause: None }
    }

    pub fn element_type(&self) -> PrimitiveType {
        self.element_type
    }

    pub fn datatype(&self) -> Datatype {
        Datatype::Bag(self.element_type)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<AttributeValue> {
        self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.values.iter()
    }

    pub fn cause(&self) -> Option<&IndeterminateError> {
        self.cause.as_ref()
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// The only value of the bag
    pub fn single_value(&self) -> Result<&AttributeValue, EmptyOrMultiValueError> {
        match self.values.as_slice() {
            [only] => Ok(only),
            _ => Err(EmptyOrMultiValueError { size: self.values.len() }),
        }
    }
}

/// Multiset equality; the cause is not part of a bag's value
impl PartialEq for Bag {
    fn eq(&self, other: &Self) -> bool {
        if self.element_type != other.element_type || self.values.len() != other.values.len() {
            return false;
        }
        let mut matched = vec![false; other.values.len()];
        self.values.iter().all(|v| {
            let slot = other
                .values
                .iter()
                .enumerate()
                .position(|(i, o)| !matched[i] && o == v);
            match slot {
                Some(i) => {
                    matched[i] = true;
                    true
                },
                None => false,
            }
        })
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl fmt::Display for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bag[{}](", self.element_type.short_name())?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", v)?;
        }
        f.write_str(")")
    }
}
