//! Builds [`Expression`]s from policy tree nodes
//!
//! Construction is bottom-up: arguments first, then the function is resolved
//! and bound. Each build also returns the longest chain of variable
//! references reached, which is what the variable depth limit is checked
//! against.

use super::designator::AttributeDesignator;
use super::selector::AttributeSelector;
use super::variable::{ReferenceChain, VariableReference, VariableScope};
use super::xpath::XPathCompiler;
use super::Expression;
use crate::ast::ExpressionNode;
use crate::config::PdpConfig;
use crate::function::{FunctionCall, FunctionRegistry};
use crate::value::{AttributeValue, PrimitiveType};
use crate::{Error, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ExpressionFactory {
    functions: Arc<FunctionRegistry>,
    xpath_compiler: Option<Arc<dyn XPathCompiler>>,
    max_variable_reference_depth: usize,
    constant_folding: bool,
}

impl ExpressionFactory {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        let defaults = PdpConfig::default();
        Self {
            functions,
            xpath_compiler: None,
            max_variable_reference_depth: defaults.max_variable_reference_depth,
            constant_folding: defaults.constant_folding,
        }
    }

    pub fn from_config(config: &PdpConfig, functions: Arc<FunctionRegistry>) -> Self {
        Self {
            functions,
            xpath_compiler: None,
            max_variable_reference_depth: config.max_variable_reference_depth,
            constant_folding: config.constant_folding,
        }
    }

    pub fn with_xpath_compiler(mut self, compiler: Arc<dyn XPathCompiler>) -> Self {
        self.xpath_compiler = Some(compiler);
        self
    }

    pub fn with_max_variable_reference_depth(mut self, max: usize) -> Self {
        self.max_variable_reference_depth = max;
        self
    }

    pub fn with_constant_folding(mut self, enabled: bool) -> Self {
        self.constant_folding = enabled;
        self
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Build an expression, discarding its reference chain
    pub fn build_expression(&self, node: &ExpressionNode, scope: &VariableScope) -> Result<Expression> {
        Ok(self.build(node, scope)?.0)
    }

    /// Build an expression and report the longest variable reference chain
    /// it reaches
    pub fn build(&self, node: &ExpressionNode, scope: &VariableScope) -> Result<(Expression, ReferenceChain)> {
        match node {
            ExpressionNode::Apply { function_id, args } => self.build_apply(function_id, args, scope),

            ExpressionNode::Value { datatype, value, xpath_category } => {
                let value = Self::parse_value(datatype, value, xpath_category.as_deref())?;
                Ok((Expression::from(value), Vec::new()))
            },

            ExpressionNode::Designator { category, attribute_id, datatype, issuer, must_be_present } => {
                let mut designator =
                    AttributeDesignator::new(category.as_str(), attribute_id.as_str(), Self::parse_datatype(datatype)?)
                        .must_be_present(*must_be_present);
                if let Some(issuer) = issuer {
                    designator = designator.with_issuer(issuer.as_str());
                }
                Ok((Expression::AttributeDesignator(Arc::new(designator)), Vec::new()))
            },

            ExpressionNode::Selector { category, path, datatype, context_selector_id, must_be_present } => {
                let compiler = self.xpath_compiler.as_ref().ok_or_else(|| {
                    Error::Syntax(format!("AttributeSelector '{}' used but no XPath compiler is configured", path))
                })?;
                let mut selector = AttributeSelector::new(
                    category.as_str(),
                    path.as_str(),
                    Self::parse_datatype(datatype)?,
                    Arc::clone(compiler),
                )?
                .must_be_present(*must_be_present);
                if let Some(id) = context_selector_id {
                    selector = selector.with_context_selector(id.as_str());
                }
                Ok((Expression::AttributeSelector(Arc::new(selector)), Vec::new()))
            },

            ExpressionNode::VariableReference { variable_id } => {
                let (reference, definition_chain) = scope
                    .lookup(variable_id)
                    .ok_or_else(|| Error::UnknownVariable(variable_id.clone()))?;
                let mut chain = Vec::with_capacity(definition_chain.len() + 1);
                chain.push(variable_id.clone());
                chain.extend(definition_chain.iter().cloned());
                if chain.len() > self.max_variable_reference_depth {
                    return Err(Error::ReferenceDepthExceeded { max: self.max_variable_reference_depth, chain });
                }
                Ok((Expression::VariableReference(reference.clone()), chain))
            },

            ExpressionNode::Function { function_id } => {
                Ok((Expression::Function(self.functions.get(function_id, None)?), Vec::new()))
            },
        }
    }

    fn build_apply(
        &self,
        function_id: &str,
        arg_nodes: &[ExpressionNode],
        scope: &VariableScope,
    ) -> Result<(Expression, ReferenceChain)> {
        let mut args = Vec::with_capacity(arg_nodes.len());
        let mut longest = Vec::new();
        for arg_node in arg_nodes {
            let (arg, chain) = self.build(arg_node, scope)?;
            if chain.len() > longest.len() {
                longest = chain;
            }
            args.push(arg);
        }

        let sub_function_type = match args.first() {
            Some(Expression::Function(f)) => Some(f.return_type()),
            _ => None,
        };
        let function = self.functions.get(function_id, sub_function_type)?;
        let call = function.new_call(args)?;
        Ok((self.fold(call), longest))
    }

    /// Replace a call by its value when it evaluates without a request
    fn fold(&self, call: FunctionCall) -> Expression {
        if !self.constant_folding {
            return Expression::FunctionCall(Arc::new(call));
        }
        match call.evaluate(None) {
            Ok(value) => {
                tracing::trace!("Folded {} into constant {}", call.function_id(), value);
                Expression::Constant(value)
            },
            Err(e) => {
                tracing::trace!("{} kept dynamic: {}", call.function_id(), e);
                Expression::FunctionCall(Arc::new(call))
            },
        }
    }

    /// Build a VariableDefinition and register it in `scope`
    pub fn define_variable(
        &self,
        scope: &mut VariableScope,
        variable_id: &str,
        node: &ExpressionNode,
    ) -> Result<VariableReference> {
        let (expression, chain) = self.build(node, scope)?;
        scope.define(variable_id, expression, chain)
    }

    pub fn parse_datatype(name: &str) -> Result<PrimitiveType> {
        PrimitiveType::from_name(name).ok_or_else(|| Error::Syntax(format!("Unknown datatype '{}'", name)))
    }

    pub fn parse_value(datatype: &str, lexical: &str, xpath_category: Option<&str>) -> Result<AttributeValue> {
        let datatype = Self::parse_datatype(datatype)?;
        let value = match (datatype, xpath_category) {
            (PrimitiveType::XPathExpression, Some(category)) => {
                AttributeValue::parse_xpath_expression(lexical, category)?
            },
            (PrimitiveType::XPathExpression, None) => {
                return Err(Error::Syntax(format!(
                    "xpathExpression value '{}' has no XPath category",
                    lexical
                )))
            },
            (datatype, _) => AttributeValue::parse(datatype, lexical)?,
        };
        Ok(value)
    }
}
