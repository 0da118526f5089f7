//! Rule evaluation

use super::decision::{DecisionResult, Effect};
use super::pep_action::PepActionExpressions;
use super::target::Target;
use super::Decidable;
use crate::ast::RuleNode;
use crate::expression::{EvaluationContext, Expression, ExpressionFactory, VariableScope};
use crate::status::IndeterminateError;
use crate::value::{AttributeValue, Datatype, Value};
use crate::{Error, Result};

#[derive(Debug)]
pub struct RuleEvaluator {
    id: String,
    effect: Effect,
    target: Target,
    condition: Option<Expression>,
    pep_actions: PepActionExpressions,
}

impl RuleEvaluator {
    pub fn build(node: &RuleNode, factory: &ExpressionFactory, scope: &VariableScope) -> Result<Self> {
        let target = Target::build(node.target.as_ref(), factory, scope)?;
        let condition = match &node.condition {
            None => None,
            Some(c) => {
                let condition = factory.build_expression(c, scope)?;
                if condition.return_type() != Datatype::BOOLEAN {
                    return Err(Error::Syntax(format!(
                        "Condition of rule '{}' returns {}, expected boolean",
                        node.id,
                        condition.return_type()
                    )));
                }
                match condition.try_evaluate_static() {
                    Some(Value::Primitive(AttributeValue::Boolean(true))) => {
                        tracing::debug!("Rule '{}' condition is always true", node.id);
                        None
                    },
                    Some(_) => {
                        tracing::warn!("Rule '{}' condition is always false, the rule never applies", node.id);
                        Some(condition)
                    },
                    None => Some(condition),
                }
            },
        };
        let pep_actions = PepActionExpressions::build(&node.obligations, &node.advice, factory, scope)?;

        Ok(Self { id: node.id.clone(), effect: node.effect, target, condition, pep_actions })
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    fn indeterminate(&self, error: IndeterminateError) -> DecisionResult {
        let error = error.within(format!("rule '{}'", self.id));
        tracing::debug!("Rule evaluation indeterminate: {}", error);
        DecisionResult::indeterminate(self.effect.indeterminate(), &error)
    }
}

impl Decidable for RuleEvaluator {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, ctx: &mut EvaluationContext, skip_target: bool) -> DecisionResult {
        if !skip_target {
            match self.target.matches(ctx) {
                Ok(true) => {},
                Ok(false) => return DecisionResult::not_applicable(),
                Err(e) => return self.indeterminate(e),
            }
        }

        if let Some(condition) = &self.condition {
            match condition.evaluate_boolean(Some(&mut *ctx)) {
                Ok(true) => {},
                Ok(false) => return DecisionResult::not_applicable(),
                Err(e) => return self.indeterminate(e.within("condition")),
            }
        }

        match self.pep_actions.evaluate(ctx, self.effect) {
            Ok(actions) => DecisionResult::from_effect(self.effect).with_pep_actions(actions),
            Err(e) => self.indeterminate(e),
        }
    }

    fn is_applicable(&self, ctx: &mut EvaluationContext) -> std::result::Result<bool, IndeterminateError> {
        self.target.matches(ctx)
    }
}
