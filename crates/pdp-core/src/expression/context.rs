//! Request-scoped evaluation context
//!
//! One [`EvaluationContext`] lives for exactly one decision request. It owns
//! the request and memoizes every attribute designator, attribute selector
//! and dynamic variable result, so a given lookup is computed at most once
//! and reads back identically for the rest of the request.

use crate::request::Request;
use crate::status::IndeterminateError;
use crate::value::{Bag, PrimitiveType, Value};
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

/// Identity of an attribute lookup. The datatype is deliberately not part
/// of it: two designators differing only by datatype share one cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeKey {
    pub category: String,
    pub id: String,
    pub issuer: Option<String>,
}

impl AttributeKey {
    pub fn new(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self { category: category.into(), id: id.into(), issuer: None }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.id)?;
        if let Some(issuer) = &self.issuer {
            write!(f, " (issuer {})", issuer)?;
        }
        Ok(())
    }
}

/// Identity of an attribute selector lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorKey {
    pub category: String,
    pub path: String,
    pub context_selector_id: Option<String>,
    pub datatype: PrimitiveType,
}

/// Identity of a variable: its id within one policy's scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableKey {
    pub scope: String,
    pub id: String,
}

/// Source of attribute values beyond the request itself (a PIP).
///
/// Providers are consulted in order after the request attributes; the first
/// `Some` wins. An `Err` is reported as a missing attribute.
pub trait AttributeProvider: fmt::Debug + Send + Sync {
    fn get(
        &self,
        key: &AttributeKey,
        datatype: PrimitiveType,
        ctx: &EvaluationContext,
    ) -> Result<Option<Bag>, IndeterminateError>;
}

/// Per-request memoization store
#[derive(Debug)]
pub struct EvaluationContext {
    request: Request,
    providers: Arc<[Arc<dyn AttributeProvider>]>,
    strict_issuer: bool,
    attributes: AHashMap<AttributeKey, Bag>,
    selectors: AHashMap<SelectorKey, Bag>,
    variables: AHashMap<VariableKey, Value>,
}

impl EvaluationContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            providers: Arc::from(Vec::<Arc<dyn AttributeProvider>>::new()),
            strict_issuer: false,
            attributes: AHashMap::new(),
            selectors: AHashMap::new(),
            variables: AHashMap::new(),
        }
    }

    pub fn with_providers(mut self, providers: Arc<[Arc<dyn AttributeProvider>]>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_strict_issuer(mut self, strict: bool) -> Self {
        self.strict_issuer = strict;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn return_policy_id_list(&self) -> bool {
        self.request.return_policy_id_list
    }

    /// Resolve the bag for an attribute, from the cache, the request, or the
    /// providers, in that order. The first resolution is memoized, including
    /// provider failures, which are kept as an empty bag carrying the cause.
    pub fn resolve_attribute(
        &mut self,
        key: &AttributeKey,
        datatype: PrimitiveType,
    ) -> Result<Bag, IndeterminateError> {
        if let Some(cached) = self.attributes.get(key) {
            return Self::read_cached(key, datatype, cached);
        }

        let found = self.request.find_values(
            &key.category,
            &key.id,
            key.issuer.as_deref(),
            self.strict_issuer,
        );
        let resolved = match found {
            Some(values) => {
                let bag = Bag::new(datatype, values.into_iter().cloned().collect()).map_err(|e| {
                    IndeterminateError::processing(format!(
                        "Request attribute {} does not match the designator datatype: {}",
                        key, e
                    ))
                })?;
                Ok(bag)
            },
            None => self.query_providers(key, datatype),
        };

        let bag = match resolved {
            Ok(bag) => bag,
            Err(cause) => {
                tracing::debug!("Attribute {} unresolvable: {}", key, cause);
                Bag::empty_with_cause(
                    datatype,
                    IndeterminateError::missing_attribute(format!(
                        "Attribute {} could not be resolved: {}",
                        key,
                        cause.message()
                    )),
                )
            },
        };
        let result = Self::read_cached(key, datatype, &bag);
        self.attributes.insert(key.clone(), bag);
        result
    }

    fn query_providers(&self, key: &AttributeKey, datatype: PrimitiveType) -> Result<Bag, IndeterminateError> {
        let providers = Arc::clone(&self.providers);
        for provider in providers.iter() {
            if let Some(bag) = provider.get(key, datatype, self)? {
                if bag.element_type() != datatype {
                    return Err(IndeterminateError::processing(format!(
                        "Provider returned {} for attribute {}, expected {}",
                        bag.datatype(),
                        key,
                        datatype
                    )));
                }
                return Ok(bag);
            }
        }
        Ok(Bag::empty(datatype))
    }

    fn read_cached(key: &AttributeKey, datatype: PrimitiveType, bag: &Bag) -> Result<Bag, IndeterminateError> {
        if let Some(cause) = bag.cause() {
            return Err(cause.clone());
        }
        if bag.element_type() != datatype {
            return Err(IndeterminateError::processing(format!(
                "Attribute {} already resolved as {}, requested as {}",
                key,
                bag.datatype(),
                datatype
            )));
        }
        Ok(bag.clone())
    }

    pub fn cached_selector(&self, key: &SelectorKey) -> Option<&Bag> {
        self.selectors.get(key)
    }

    /// Memoize a selector result. The first write for a key wins.
    pub fn cache_selector(&mut self, key: SelectorKey, bag: Bag) -> &Bag {
        self.selectors.entry(key).or_insert(bag)
    }

    pub fn variable(&self, key: &VariableKey) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn cache_variable(&mut self, key: VariableKey, value: Value) {
        self.variables.entry(key).or_insert(value);
    }
}
