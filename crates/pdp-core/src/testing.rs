//! Test doubles and helpers for PDP tests
//!
//! Shared by the unit tests, the integration suite and the benches: an
//! in-memory attribute provider, decision and combining-algorithm doubles
//! that count their invocations, and a small XPath engine over hand-built
//! node trees.

use crate::ast::{ExpressionNode, MatchNode, TargetNode};
use crate::expression::{
    AttributeKey, AttributeProvider, CompiledXPath, EvaluationContext, NodeKind, XPathCompiler, XdmItem, XdmNode,
    XmlNode,
};
use crate::policy::{CombinedElement, CombinerParameter, CombiningAlgorithm, Decidable, DecisionResult};
use crate::request::{attribute, category, Request};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Bag, PrimitiveType};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Request with string subject-id, resource-id and action-id attributes
pub fn access_request(subject: &str, resource: &str, action: &str) -> Request {
    Request::new()
        .with_attribute(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, AttributeValue::string(subject))
        .with_attribute(category::RESOURCE, attribute::RESOURCE_ID, AttributeValue::string(resource))
        .with_attribute(category::ACTION, attribute::ACTION_ID, AttributeValue::string(action))
}

/// Target matching one string attribute value
pub fn string_target(category: &str, attribute_id: &str, value: &str, must_be_present: bool) -> TargetNode {
    TargetNode::single(MatchNode::new(
        PrimitiveType::String.function_id("equal"),
        ExpressionNode::string(value),
        ExpressionNode::designator(category, attribute_id, "string", must_be_present),
    ))
}

/// Attribute source backed by a map, counting lookups
#[derive(Debug, Default)]
pub struct InMemoryAttributeProvider {
    entries: HashMap<AttributeKey, Result<Bag, IndeterminateError>>,
    calls: AtomicUsize,
}

impl InMemoryAttributeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bag(mut self, key: AttributeKey, bag: Bag) -> Self {
        self.entries.insert(key, Ok(bag));
        self
    }

    /// Lookups of `key` fail with `error`
    pub fn with_failure(mut self, key: AttributeKey, error: IndeterminateError) -> Self {
        self.entries.insert(key, Err(error));
        self
    }

    /// Number of lookups so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AttributeProvider for InMemoryAttributeProvider {
    fn get(
        &self,
        key: &AttributeKey,
        datatype: PrimitiveType,
        _ctx: &EvaluationContext,
    ) -> Result<Option<Bag>, IndeterminateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.entries.get(key) {
            None => Ok(None),
            Some(Err(e)) => Err(e.clone()),
            Some(Ok(bag)) if bag.element_type() == datatype => Ok(Some(bag.clone())),
            Some(Ok(bag)) => Err(IndeterminateError::processing(format!(
                "{} is {}, requested {}",
                key,
                bag.element_type(),
                datatype
            ))),
        }
    }
}

/// Decidable returning a fixed result
#[derive(Debug)]
pub struct FixedDecision {
    id: String,
    result: DecisionResult,
    applicable: Result<bool, IndeterminateError>,
    evaluations: AtomicUsize,
    skipped_targets: AtomicUsize,
}

impl FixedDecision {
    pub fn new(id: impl Into<String>, result: DecisionResult) -> Self {
        Self {
            id: id.into(),
            result,
            applicable: Ok(true),
            evaluations: AtomicUsize::new(0),
            skipped_targets: AtomicUsize::new(0),
        }
    }

    /// Outcome of `is_applicable`, `Ok(true)` by default
    pub fn with_applicable(mut self, applicable: Result<bool, IndeterminateError>) -> Self {
        self.applicable = applicable;
        self
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    /// Evaluations made with the target skipped
    pub fn skipped_targets(&self) -> usize {
        self.skipped_targets.load(Ordering::SeqCst)
    }
}

impl Decidable for FixedDecision {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, _ctx: &mut EvaluationContext, skip_target: bool) -> DecisionResult {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if skip_target {
            self.skipped_targets.fetch_add(1, Ordering::SeqCst);
        }
        self.result.clone()
    }

    fn is_applicable(&self, _ctx: &mut EvaluationContext) -> Result<bool, IndeterminateError> {
        self.applicable.clone()
    }
}

/// Wraps a combining algorithm and counts invocations
#[derive(Debug)]
pub struct CountingAlgorithm {
    inner: Arc<dyn CombiningAlgorithm>,
    invocations: AtomicUsize,
}

impl CountingAlgorithm {
    pub fn new(inner: Arc<dyn CombiningAlgorithm>) -> Self {
        Self { inner, invocations: AtomicUsize::new(0) }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl CombiningAlgorithm for CountingAlgorithm {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn combine(
        &self,
        ctx: &mut EvaluationContext,
        parameters: &[CombinerParameter],
        children: &[CombinedElement],
    ) -> DecisionResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.inner.combine(ctx, parameters, children)
    }
}

/// Node of a hand-built Content tree
#[derive(Debug, Clone)]
pub struct TestNode {
    kind: NodeKind,
    name: String,
    value: String,
    children: Vec<Arc<TestNode>>,
}

impl TestNode {
    pub fn element(name: impl Into<String>) -> Self {
        Self { kind: NodeKind::Element, name: name.into(), value: String::new(), children: Vec::new() }
    }

    pub fn with_child(mut self, child: TestNode) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Arc::new(Self {
            kind: NodeKind::Text,
            name: String::new(),
            value: text.into(),
            children: Vec::new(),
        }));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.children.push(Arc::new(Self {
            kind: NodeKind::Attribute,
            name: name.into(),
            value: value.into(),
            children: Vec::new(),
        }));
        self
    }

    /// Element child with a single text node
    pub fn with_text_element(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_child(TestNode::element(name).with_text(text))
    }

    pub fn into_node(self) -> XdmNode {
        Arc::new(self)
    }

    fn children_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Arc<TestNode>> {
        self.children.iter().filter(move |c| c.kind == kind)
    }
}

impl XmlNode for TestNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn string_value(&self) -> String {
        match self.kind {
            NodeKind::Element | NodeKind::Document => self
                .children
                .iter()
                .filter(|c| c.kind != NodeKind::Attribute)
                .map(|c| c.string_value())
                .collect(),
            _ => self.value.clone(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Element children by name, `*` for any
    Child(String),
    /// `@name`
    Attribute(String),
    /// `text()`
    Text,
    /// `fail()`, always raises an error
    Fail,
}

#[derive(Debug)]
struct TestPath {
    absolute: bool,
    steps: Vec<Step>,
    evaluations: Arc<AtomicUsize>,
}

impl TestPath {
    fn step(nodes: Vec<Arc<TestNode>>, step: &Step) -> Result<Vec<Arc<TestNode>>, IndeterminateError> {
        let mut next = Vec::new();
        for node in nodes {
            match step {
                Step::Child(name) => next.extend(
                    node.children_of_kind(NodeKind::Element)
                        .filter(|c| name == "*" || c.name == *name)
                        .cloned(),
                ),
                Step::Attribute(name) => {
                    next.extend(node.children_of_kind(NodeKind::Attribute).filter(|c| c.name == *name).cloned())
                },
                Step::Text => next.extend(node.children_of_kind(NodeKind::Text).cloned()),
                Step::Fail => return Err(IndeterminateError::processing("fail() evaluated")),
            }
        }
        Ok(next)
    }
}

impl CompiledXPath for TestPath {
    fn evaluate(&self, context_node: &XdmNode) -> Result<Vec<XdmItem>, IndeterminateError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let root = context_node
            .as_any()
            .downcast_ref::<TestNode>()
            .ok_or_else(|| IndeterminateError::processing("Content was not built from TestNode"))?;
        let root = Arc::new(root.clone());

        let mut steps = self.steps.as_slice();
        let mut current = vec![root];
        if self.absolute {
            // the first step names the document element itself
            match steps.split_first() {
                Some((Step::Child(name), rest)) => {
                    current.retain(|n| name == "*" || n.name == *name);
                    steps = rest;
                },
                Some((Step::Fail, _)) => return Err(IndeterminateError::processing("fail() evaluated")),
                _ => {},
            }
        }
        for step in steps {
            current = Self::step(current, step)?;
        }
        Ok(current.into_iter().map(|n| XdmItem::Node(n as XdmNode)).collect())
    }
}

/// Compiles a tiny XPath subset: `/`-separated element names or `*`,
/// optionally ending in `@attr` or `text()`, plus `fail()`
#[derive(Debug, Default)]
pub struct TestXPathCompiler {
    evaluations: Arc<AtomicUsize>,
}

impl TestXPathCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled path evaluations so far
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

impl XPathCompiler for TestXPathCompiler {
    fn compile(&self, xpath: &str) -> Result<Arc<dyn CompiledXPath>, IndeterminateError> {
        let absolute = xpath.starts_with('/');
        let body = xpath.trim_start_matches('/');
        if body.is_empty() {
            return Err(IndeterminateError::syntax(format!("Empty XPath '{}'", xpath)));
        }
        let parts: Vec<&str> = body.split('/').collect();
        let mut steps = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let last = i == parts.len() - 1;
            let step = match *part {
                "text()" if last => Step::Text,
                "fail()" => Step::Fail,
                p if last && p.starts_with('@') && p.len() > 1 => Step::Attribute(p[1..].to_string()),
                p if !p.is_empty() && p.chars().all(|c| c.is_alphanumeric() || c == '*' || c == '-' || c == ':') => {
                    Step::Child(p.to_string())
                },
                _ => return Err(IndeterminateError::syntax(format!("Unsupported XPath '{}'", xpath))),
            };
            steps.push(step);
        }
        Ok(Arc::new(TestPath { absolute, steps, evaluations: Arc::clone(&self.evaluations) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> XdmNode {
        TestNode::element("record")
            .with_child(
                TestNode::element("patient")
                    .with_attribute("id", "p-17")
                    .with_text_element("name", "Ann")
                    .with_text_element("name", "Bo"),
            )
            .into_node()
    }

    fn select(path: &str) -> Vec<String> {
        let compiled = TestXPathCompiler::new().compile(path).unwrap();
        compiled
            .evaluate(&record())
            .unwrap()
            .into_iter()
            .map(|item| match item {
                XdmItem::Node(n) => n.string_value(),
                XdmItem::Atomic(s) => s,
            })
            .collect()
    }

    #[test]
    fn test_absolute_and_relative_paths() {
        assert_eq!(select("/record/patient/name/text()"), vec!["Ann", "Bo"]);
        assert_eq!(select("patient/@id"), vec!["p-17"]);
        assert_eq!(select("/record/*/name"), vec!["Ann", "Bo"]);
        assert!(select("/other/patient").is_empty());
    }

    #[test]
    fn test_compile_errors() {
        let compiler = TestXPathCompiler::new();
        assert!(compiler.compile("/").is_err());
        assert!(compiler.compile("/a[1]").is_err());
        assert!(compiler.compile("text()/a").is_err());
    }

    #[test]
    fn test_provider_counts_calls() {
        let key = AttributeKey::new(category::ENVIRONMENT, "tier");
        let provider =
            InMemoryAttributeProvider::new().with_bag(key.clone(), Bag::singleton(AttributeValue::string("gold")));
        let ctx = EvaluationContext::new(Request::new());
        assert!(provider.get(&key, PrimitiveType::String, &ctx).unwrap().is_some());
        assert!(provider.get(&key, PrimitiveType::Integer, &ctx).is_err());
        assert!(provider.get(&AttributeKey::new(category::ENVIRONMENT, "other"), PrimitiveType::String, &ctx)
            .unwrap()
            .is_none());
        assert_eq!(provider.calls(), 3);
    }
}
