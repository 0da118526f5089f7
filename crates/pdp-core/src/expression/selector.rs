//! AttributeSelector: bag lookup by XPath over a category's Content
//!
//! A selector's outcome is memoized in the context on first evaluation.
//! Recoverable failures are memoized too, as an empty bag carrying the
//! cause, so a second evaluation within the same request gives the same
//! answer. Only the missing-Content case and unsupported node kinds are
//! reported without being memoized.

use super::context::{EvaluationContext, SelectorKey};
use super::designator::AttributeDesignator;
use super::xpath::{CompiledXPath, NodeKind, XPathCompiler, XdmItem, XdmNode};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Bag, Datatype, PrimitiveType, XPathExpressionValue};
use std::sync::Arc;

/// Why a selection failed
enum SelectError {
    /// Memoized as an empty bag with cause
    Recoverable(IndeterminateError),
    /// Reported as is
    Fatal(IndeterminateError),
}

#[derive(Debug, Clone)]
pub struct AttributeSelector {
    key: SelectorKey,
    compiled: Arc<dyn CompiledXPath>,
    context_selector: Option<AttributeDesignator>,
    compiler: Arc<dyn XPathCompiler>,
    must_be_present: bool,
}

impl AttributeSelector {
    /// Compile the path up front; a path that does not compile rejects the
    /// policy
    pub fn new(
        category: impl Into<String>,
        path: impl Into<String>,
        datatype: PrimitiveType,
        compiler: Arc<dyn XPathCompiler>,
    ) -> crate::Result<Self> {
        let path = path.into();
        let compiled = compiler
            .compile(&path)
            .map_err(|e| crate::Error::Syntax(format!("Invalid XPath '{}': {}", path, e)))?;
        Ok(Self {
            key: SelectorKey {
                category: category.into(),
                path,
                context_selector_id: None,
                datatype,
            },
            compiled,
            context_selector: None,
            compiler,
            must_be_present: false,
        })
    }

    /// Evaluate the path relative to the node selected by the
    /// `xpathExpression` attribute `attribute_id` of the same category
    pub fn with_context_selector(mut self, attribute_id: impl Into<String>) -> Self {
        let attribute_id = attribute_id.into();
        self.context_selector = Some(
            AttributeDesignator::new(
                self.key.category.clone(),
                attribute_id.clone(),
                PrimitiveType::XPathExpression,
            )
            .must_be_present(true),
        );
        self.key.context_selector_id = Some(attribute_id);
        self
    }

    pub fn must_be_present(mut self, required: bool) -> Self {
        self.must_be_present = required;
        self
    }

    pub fn key(&self) -> &SelectorKey {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.key.path
    }

    pub fn category(&self) -> &str {
        &self.key.category
    }

    pub fn return_type(&self) -> Datatype {
        Datatype::Bag(self.key.datatype)
    }

    pub fn evaluate(&self, ctx: Option<&mut EvaluationContext>) -> Result<Bag, IndeterminateError> {
        let ctx = ctx.ok_or_else(|| {
            IndeterminateError::context_required(format!(
                "AttributeSelector '{}' needs a request context",
                self.key.path
            ))
        })?;

        let bag = match ctx.cached_selector(&self.key) {
            Some(cached) => cached.clone(),
            None => {
                let content = ctx.request().content(&self.key.category).cloned().ok_or_else(|| {
                    IndeterminateError::missing_content(format!(
                        "No Content for category {}",
                        self.key.category
                    ))
                })?;
                let bag = match self.select(ctx, &content) {
                    Ok(bag) => bag,
                    Err(SelectError::Recoverable(cause)) => {
                        tracing::debug!("AttributeSelector '{}' failed: {}", self.key.path, cause);
                        Bag::empty_with_cause(self.key.datatype, cause)
                    },
                    Err(SelectError::Fatal(e)) => return Err(e),
                };
                ctx.cache_selector(self.key.clone(), bag).clone()
            },
        };

        if bag.is_empty() && self.must_be_present {
            let reason = match bag.cause() {
                Some(cause) => format!(": {}", cause.message()),
                None => String::new(),
            };
            return Err(IndeterminateError::missing_attribute(format!(
                "AttributeSelector '{}' selected no value: required but absent{}",
                self.key.path, reason
            )));
        }
        Ok(bag)
    }

    fn select(&self, ctx: &mut EvaluationContext, content: &XdmNode) -> Result<Bag, SelectError> {
        let context_node = match &self.context_selector {
            Some(designator) => self.context_node(ctx, designator, content).map_err(SelectError::Recoverable)?,
            None => Arc::clone(content),
        };

        let items = self.compiled.evaluate(&context_node).map_err(SelectError::Recoverable)?;
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let lexical = match item {
                XdmItem::Atomic(s) => s,
                XdmItem::Node(node) => match node.kind() {
                    NodeKind::Text | NodeKind::Attribute => node.string_value(),
                    other => {
                        return Err(SelectError::Fatal(IndeterminateError::processing(format!(
                            "AttributeSelector '{}' selected an unsupported {:?} node",
                            self.key.path, other
                        ))))
                    },
                },
            };
            values.push(self.convert(&lexical).map_err(SelectError::Recoverable)?);
        }
        Bag::new(self.key.datatype, values)
            .map_err(|e| SelectError::Recoverable(IndeterminateError::from(e)))
    }

    fn convert(&self, lexical: &str) -> Result<AttributeValue, IndeterminateError> {
        let parsed = match self.key.datatype {
            PrimitiveType::XPathExpression => {
                AttributeValue::parse_xpath_expression(lexical, &self.key.category)
            },
            datatype => AttributeValue::parse(datatype, lexical),
        };
        parsed.map_err(|e| IndeterminateError::syntax(format!("AttributeSelector '{}': {}", self.key.path, e)))
    }

    /// Resolve the single node the context selector points at
    fn context_node(
        &self,
        ctx: &mut EvaluationContext,
        designator: &AttributeDesignator,
        content: &XdmNode,
    ) -> Result<XdmNode, IndeterminateError> {
        let bag = designator.evaluate(Some(ctx))?;
        let value = bag.single_value().map_err(|e| {
            IndeterminateError::syntax(format!("Context selector {}: {}", designator.key(), e))
        })?;
        let XPathExpressionValue { path, category } = value.cast::<XPathExpressionValue>()?;
        if *category != self.key.category {
            return Err(IndeterminateError::syntax(format!(
                "Context selector {} targets category {}, expected {}",
                designator.key(),
                category,
                self.key.category
            )));
        }

        let compiled = self.compiler.compile(path)?;
        let mut items = compiled.evaluate(content)?;
        match (items.pop(), items.is_empty()) {
            (Some(XdmItem::Node(node)), true) => Ok(node),
            (None, _) => Err(IndeterminateError::syntax(format!(
                "Context selector path '{}' selected nothing",
                path
            ))),
            _ => Err(IndeterminateError::syntax(format!(
                "Context selector path '{}' must select exactly one node",
                path
            ))),
        }
    }
}
