//! Statically resolved policy references

use super::decision::{DecisionResult, PolicyKind};
use super::evaluator::PolicyEvaluator;
use super::version::VersionConstraints;
use super::Decidable;
use crate::expression::EvaluationContext;
use crate::status::IndeterminateError;
use std::sync::Arc;

/// PolicyIdReference or PolicySetIdReference bound at load time to the
/// latest version satisfying its constraints
#[derive(Debug)]
pub struct PolicyReferenceEvaluator {
    kind: PolicyKind,
    constraints: VersionConstraints,
    resolved: Arc<PolicyEvaluator>,
}

impl PolicyReferenceEvaluator {
    pub fn new(kind: PolicyKind, constraints: VersionConstraints, resolved: Arc<PolicyEvaluator>) -> Self {
        Self { kind, constraints, resolved }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn constraints(&self) -> &VersionConstraints {
        &self.constraints
    }

    pub fn resolved(&self) -> &Arc<PolicyEvaluator> {
        &self.resolved
    }
}

impl Decidable for PolicyReferenceEvaluator {
    fn id(&self) -> &str {
        self.resolved.id()
    }

    fn evaluate(&self, ctx: &mut EvaluationContext, skip_target: bool) -> DecisionResult {
        self.resolved.evaluate(ctx, skip_target)
    }

    fn is_applicable(&self, ctx: &mut EvaluationContext) -> Result<bool, IndeterminateError> {
        self.resolved.is_applicable(ctx)
    }
}
