//! Target matching
//!
//! A Target is a conjunction of AnyOf, each a disjunction of AllOf, each a
//! conjunction of Match. Errors only decide the outcome when no other
//! element settles it first.

use crate::ast::{AllOfNode, AnyOfNode, ExpressionNode, MatchNode, TargetNode};
use crate::expression::{EvaluationContext, Expression, ExpressionFactory, VariableScope};
use crate::function::FunctionCall;
use crate::status::IndeterminateError;
use crate::value::Datatype;
use crate::{Error, Result};
use std::slice;

/// Applies a match function to a literal and each value of an attribute bag
#[derive(Debug)]
pub struct Match {
    call: FunctionCall,
    attribute: Expression,
}

impl Match {
    pub fn build(node: &MatchNode, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        if !matches!(node.value, ExpressionNode::Value { .. }) {
            return Err(Error::Syntax(format!("Match {}: first operand must be a literal value", node.match_id)));
        }
        if !matches!(node.attribute, ExpressionNode::Designator { .. } | ExpressionNode::Selector { .. }) {
            return Err(Error::Syntax(format!(
                "Match {}: second operand must be an attribute designator or selector",
                node.match_id
            )));
        }

        let literal = factory.build_expression(&node.value, scope)?;
        let attribute = factory.build_expression(&node.attribute, scope)?;
        let element_type = attribute.return_type().primitive();

        let function = factory.functions().get(&node.match_id, None)?;
        let call = function.new_partial_call(vec![literal], &[Datatype::Primitive(element_type)])?;
        if call.return_type() != Datatype::BOOLEAN {
            return Err(Error::Syntax(format!(
                "Match function {} must return boolean, not {}",
                node.match_id,
                call.return_type()
            )));
        }
        Ok(Self { call, attribute })
    }

    /// True if any bag value matches. Indeterminate if none does and at
    /// least one comparison failed.
    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> std::result::Result<bool, IndeterminateError> {
        let bag = self.attribute.evaluate_bag(Some(&mut *ctx))?;
        let mut first_error = None;
        for value in bag.iter() {
            let outcome = self
                .call
                .evaluate_partial(Some(&mut *ctx), slice::from_ref(value))
                .and_then(|v| Ok(*v.cast::<bool>()?));
            match outcome {
                Ok(true) => return Ok(true),
                Ok(false) => {},
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        first_error.map_or(Ok(false), Err)
    }
}

#[derive(Debug)]
pub struct AllOf {
    matches: Vec<Match>,
}

impl AllOf {
    fn build(node: &AllOfNode, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        if node.matches.is_empty() {
            return Err(Error::Syntax("AllOf must contain at least one Match".to_string()));
        }
        let matches = node
            .matches
            .iter()
            .map(|m| Match::build(m, factory, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { matches })
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> std::result::Result<bool, IndeterminateError> {
        let mut first_error = None;
        for m in &self.matches {
            match m.evaluate(ctx) {
                Ok(true) => {},
                Ok(false) => return Ok(false),
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        first_error.map_or(Ok(true), Err)
    }
}

#[derive(Debug)]
pub struct AnyOf {
    all_of: Vec<AllOf>,
}

impl AnyOf {
    fn build(node: &AnyOfNode, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        if node.all_of.is_empty() {
            return Err(Error::Syntax("AnyOf must contain at least one AllOf".to_string()));
        }
        let all_of = node
            .all_of
            .iter()
            .map(|a| AllOf::build(a, factory, scope))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { all_of })
    }

    pub fn evaluate(&self, ctx: &mut EvaluationContext) -> std::result::Result<bool, IndeterminateError> {
        let mut first_error = None;
        for all_of in &self.all_of {
            match all_of.evaluate(ctx) {
                Ok(true) => return Ok(true),
                Ok(false) => {},
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        first_error.map_or(Ok(false), Err)
    }
}

/// Compiled Target. An empty target matches every request.
#[derive(Debug, Default)]
pub struct Target {
    any_of: Vec<AnyOf>,
}

impl Target {
    pub fn build(node: Option<&TargetNode>, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        let any_of = match node {
            None => Vec::new(),
            Some(node) => node
                .any_of
                .iter()
                .map(|a| AnyOf::build(a, factory, scope))
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(Self { any_of })
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }

    pub fn matches(&self, ctx: &mut EvaluationContext) -> std::result::Result<bool, IndeterminateError> {
        let mut first_error = None;
        for any_of in &self.any_of {
            match any_of.evaluate(ctx) {
                Ok(true) => {},
                Ok(false) => return Ok(false),
                Err(e) => {
                    first_error.get_or_insert(e);
                },
            }
        }
        match first_error {
            Some(e) => Err(e.within("target")),
            None => Ok(true),
        }
    }
}
