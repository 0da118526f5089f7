//! Policy and PolicySet evaluation

use super::combining::{CombinedElement, CombinerParameter, CombiningAlgRegistry, CombiningAlgorithm};
use super::decision::{DecisionKind, DecisionResult, Effect, ExtendedIndeterminate, PolicyKind, PolicyRef};
use super::pep_action::PepActionExpressions;
use super::rule::RuleEvaluator;
use super::target::Target;
use super::version::PolicyVersion;
use super::Decidable;
use crate::ast::{ChildParametersNode, CombinerParameterNode, PolicyElement, PolicyNode};
use crate::expression::{EvaluationContext, ExpressionFactory, VariableScope};
use crate::status::IndeterminateError;
use crate::{Error, Result};
use ahash::AHashSet;
use std::sync::Arc;

/// Parameters of the child with `child_id`
pub(crate) fn child_parameters(nodes: &[ChildParametersNode], child_id: &str) -> Result<Vec<CombinerParameter>> {
    nodes
        .iter()
        .filter(|n| n.child_id == child_id)
        .flat_map(|n| n.parameters.iter())
        .map(CombinerParameter::build)
        .collect()
}

pub(crate) fn combiner_parameters(nodes: &[CombinerParameterNode]) -> Result<Vec<CombinerParameter>> {
    nodes.iter().map(CombinerParameter::build).collect()
}

/// An evaluable Policy or PolicySet
#[derive(Debug)]
pub struct PolicyEvaluator {
    policy_ref: PolicyRef,
    target: Target,
    algorithm: Arc<dyn CombiningAlgorithm>,
    parameters: Vec<CombinerParameter>,
    children: Vec<CombinedElement>,
    pep_actions: PepActionExpressions,
}

impl PolicyEvaluator {
    pub fn new(
        policy_ref: PolicyRef,
        target: Target,
        algorithm: Arc<dyn CombiningAlgorithm>,
        parameters: Vec<CombinerParameter>,
        children: Vec<CombinedElement>,
        pep_actions: PepActionExpressions,
    ) -> Self {
        Self { policy_ref, target, algorithm, parameters, children, pep_actions }
    }

    /// Build a Policy: variable definitions and rules in document order
    pub fn from_policy(
        node: &PolicyNode,
        factory: &ExpressionFactory,
        algorithms: &CombiningAlgRegistry,
    ) -> Result<Self> {
        let version = PolicyVersion::parse(&node.version)?;
        let algorithm = algorithms.rule_algorithm(&node.combining_algorithm)?;
        let mut scope = VariableScope::new(node.id.as_str());
        let target = Target::build(node.target.as_ref(), factory, &scope)?;

        let mut children = Vec::new();
        let mut rule_ids = AHashSet::new();
        for element in &node.elements {
            match element {
                PolicyElement::VariableDefinition { variable_id, expression } => {
                    factory.define_variable(&mut scope, variable_id, expression)?;
                },
                PolicyElement::Rule(rule) => {
                    if !rule_ids.insert(rule.id.as_str()) {
                        return Err(Error::Syntax(format!("Duplicate rule '{}' in policy '{}'", rule.id, node.id)));
                    }
                    let evaluator = RuleEvaluator::build(rule, factory, &scope)?;
                    children.push(
                        CombinedElement::new(Arc::new(evaluator))
                            .with_parameters(child_parameters(&node.child_parameters, &rule.id)?),
                    );
                },
            }
        }

        let pep_actions = PepActionExpressions::build(&node.obligations, &node.advice, factory, &scope)?;
        tracing::debug!(
            "Built policy '{}' v{} with {} rules and {} variables",
            node.id,
            version,
            children.len(),
            scope.len()
        );

        Ok(Self::new(
            PolicyRef { kind: PolicyKind::Policy, id: node.id.clone(), version },
            target,
            algorithm,
            combiner_parameters(&node.combiner_parameters)?,
            children,
            pep_actions,
        ))
    }

    pub fn policy_ref(&self) -> &PolicyRef {
        &self.policy_ref
    }

    pub fn version(&self) -> &PolicyVersion {
        &self.policy_ref.version
    }

    pub fn kind(&self) -> PolicyKind {
        self.policy_ref.kind
    }

    pub fn algorithm_id(&self) -> &str {
        self.algorithm.id()
    }

    pub fn children(&self) -> &[CombinedElement] {
        &self.children
    }

    fn effect_of(decision: DecisionKind) -> Option<Effect> {
        match decision {
            DecisionKind::Permit => Some(Effect::Permit),
            DecisionKind::Deny => Some(Effect::Deny),
            DecisionKind::NotApplicable | DecisionKind::Indeterminate => None,
        }
    }

    /// Combine a target error with the combined children result
    fn indeterminate_target(&self, combined: DecisionResult, error: IndeterminateError) -> DecisionResult {
        let extended = match combined.decision {
            DecisionKind::NotApplicable => return combined,
            DecisionKind::Permit => ExtendedIndeterminate::Permit,
            DecisionKind::Deny => ExtendedIndeterminate::Deny,
            DecisionKind::Indeterminate => {
                combined.extended_indeterminate.unwrap_or(ExtendedIndeterminate::DenyPermit)
            },
        };
        let error = error.within(format!("{} target", self.policy_ref));
        tracing::debug!("Target indeterminate: {}", error);
        DecisionResult::indeterminate(extended, &error)
    }
}

impl Decidable for PolicyEvaluator {
    fn id(&self) -> &str {
        &self.policy_ref.id
    }

    fn evaluate(&self, ctx: &mut EvaluationContext, skip_target: bool) -> DecisionResult {
        let target_error = if skip_target {
            None
        } else {
            match self.target.matches(ctx) {
                Ok(true) => None,
                Ok(false) => return DecisionResult::not_applicable(),
                Err(e) => Some(e),
            }
        };

        let mut combined = self.algorithm.combine(ctx, &self.parameters, &self.children);
        if let Some(error) = target_error {
            return self.indeterminate_target(combined, error);
        }

        let Some(effect) = Self::effect_of(combined.decision) else {
            return combined;
        };
        match self.pep_actions.evaluate(ctx, effect) {
            Ok(actions) => {
                combined.pep_actions.merge(actions);
                if ctx.return_policy_id_list() {
                    combined.applicable_policies.push(self.policy_ref.clone());
                }
                tracing::trace!("{} decided {}", self.policy_ref, combined.decision);
                combined
            },
            Err(e) => {
                let error = e.within(format!("{} obligations", self.policy_ref));
                tracing::debug!("PEP actions failed: {}", error);
                DecisionResult::indeterminate(effect.indeterminate(), &error)
            },
        }
    }

    fn is_applicable(&self, ctx: &mut EvaluationContext) -> std::result::Result<bool, IndeterminateError> {
        self.target.matches(ctx)
    }
}
