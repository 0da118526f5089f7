//! Obligation and advice expressions

use super::decision::{AttributeAssignment, Effect, PepAction, PepActions};
use crate::ast::{AssignmentNode, PepActionNode};
use crate::expression::{EvaluationContext, Expression, ExpressionFactory, VariableScope};
use crate::status::IndeterminateError;
use crate::value::Value;
use crate::Result;

#[derive(Debug)]
struct AssignmentExpression {
    attribute_id: String,
    category: Option<String>,
    issuer: Option<String>,
    expression: Expression,
}

impl AssignmentExpression {
    fn build(node: &AssignmentNode, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        Ok(Self {
            attribute_id: node.attribute_id.clone(),
            category: node.category.clone(),
            issuer: node.issuer.clone(),
            expression: factory.build_expression(&node.expression, scope)?,
        })
    }

    /// One assignment per value; an empty bag yields none
    fn evaluate(
        &self,
        ctx: &mut EvaluationContext,
        out: &mut Vec<AttributeAssignment>,
    ) -> std::result::Result<(), IndeterminateError> {
        let values = match self.expression.evaluate(Some(ctx))? {
            Value::Primitive(v) => vec![v],
            Value::Bag(bag) => bag.into_values(),
        };
        out.extend(values.into_iter().map(|value| AttributeAssignment {
            attribute_id: self.attribute_id.clone(),
            category: self.category.clone(),
            issuer: self.issuer.clone(),
            value,
        }));
        Ok(())
    }
}

#[derive(Debug)]
struct PepActionExpression {
    id: String,
    fulfill_on: Effect,
    assignments: Vec<AssignmentExpression>,
}

impl PepActionExpression {
    fn build(node: &PepActionNode, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        Ok(Self {
            id: node.id.clone(),
            fulfill_on: node.fulfill_on,
            assignments: node
                .assignments
                .iter()
                .map(|a| AssignmentExpression::build(a, factory, scope))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    fn evaluate(&self, ctx: &mut EvaluationContext) -> std::result::Result<PepAction, IndeterminateError> {
        let mut assignments = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            assignment
                .evaluate(ctx, &mut assignments)
                .map_err(|e| e.within(format!("assignment '{}' of '{}'", assignment.attribute_id, self.id)))?;
        }
        Ok(PepAction { id: self.id.clone(), assignments })
    }
}

/// Obligations and advice declared on a Rule, Policy or PolicySet
#[derive(Debug, Default)]
pub struct PepActionExpressions {
    obligations: Vec<PepActionExpression>,
    advice: Vec<PepActionExpression>,
}

impl PepActionExpressions {
    pub fn build(
        obligations: &[PepActionNode],
        advice: &[PepActionNode],
        factory: &ExpressionFactory,
        scope: &VariableScope,
    ) -> Result<Self> {
        let build_all = |nodes: &[PepActionNode]| {
            nodes
                .iter()
                .map(|n| PepActionExpression::build(n, factory, scope))
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self { obligations: build_all(obligations)?, advice: build_all(advice)? })
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    /// Evaluate the actions that apply to `effect`. Any failure fails the
    /// whole set.
    pub fn evaluate(
        &self,
        ctx: &mut EvaluationContext,
        effect: Effect,
    ) -> std::result::Result<PepActions, IndeterminateError> {
        let mut actions = PepActions::default();
        for obligation in self.obligations.iter().filter(|o| o.fulfill_on == effect) {
            actions.obligations.push(obligation.evaluate(ctx)?);
        }
        for advice in self.advice.iter().filter(|a| a.fulfill_on == effect) {
            actions.advice.push(advice.evaluate(ctx)?);
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExpressionNode;
    use crate::function::FunctionRegistry;
    use crate::request::{attribute, category, Request};
    use crate::value::AttributeValue;
    use std::sync::Arc;

    fn action(id: &str, fulfill_on: Effect, expression: ExpressionNode) -> PepActionNode {
        PepActionNode {
            id: id.to_string(),
            fulfill_on,
            assignments: vec![AssignmentNode {
                attribute_id: "message".to_string(),
                category: None,
                issuer: None,
                expression,
            }],
        }
    }

    fn build(obligations: Vec<PepActionNode>) -> PepActionExpressions {
        let factory = ExpressionFactory::new(Arc::new(FunctionRegistry::standard()));
        PepActionExpressions::build(&obligations, &[], &factory, &VariableScope::empty()).unwrap()
    }

    #[test]
    fn test_filters_by_effect() {
        let actions = build(vec![
            action("on-permit", Effect::Permit, ExpressionNode::string("granted")),
            action("on-deny", Effect::Deny, ExpressionNode::string("refused")),
        ]);
        let mut ctx = EvaluationContext::new(Request::new());
        let result = actions.evaluate(&mut ctx, Effect::Deny).unwrap();
        assert_eq!(result.obligations.len(), 1);
        assert_eq!(result.obligations[0].id, "on-deny");
        assert_eq!(result.obligations[0].assignments[0].value, AttributeValue::string("refused"));
    }

    #[test]
    fn test_bag_expands_to_assignments() {
        let actions = build(vec![action(
            "notify",
            Effect::Permit,
            ExpressionNode::designator(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, "string", false),
        )]);
        let request = Request::new().with_attribute_values(
            category::ACCESS_SUBJECT,
            attribute::SUBJECT_ID,
            None,
            vec![AttributeValue::string("alice"), AttributeValue::string("bob")],
        );
        let mut ctx = EvaluationContext::new(request);
        let result = actions.evaluate(&mut ctx, Effect::Permit).unwrap();
        assert_eq!(result.obligations[0].assignments.len(), 2);

        let mut empty = EvaluationContext::new(Request::new());
        let result = actions.evaluate(&mut empty, Effect::Permit).unwrap();
        assert!(result.obligations[0].assignments.is_empty());
    }

    #[test]
    fn test_failure_fails_all() {
        let actions = build(vec![
            action("ok", Effect::Permit, ExpressionNode::string("fine")),
            action(
                "broken",
                Effect::Permit,
                ExpressionNode::designator(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, "string", true),
            ),
        ]);
        let mut ctx = EvaluationContext::new(Request::new());
        assert!(actions.evaluate(&mut ctx, Effect::Permit).is_err());
    }
}
