//! Combining algorithms
//!
//! An algorithm folds the results of the ordered children of a Policy
//! (Rules) or PolicySet (Policies and PolicySets) into one decision. Only
//! the PEP actions of children whose decision equals the combined decision
//! are kept.

use super::decision::{DecisionKind, DecisionResult, Effect, ExtendedIndeterminate, Status};
use super::Decidable;
use crate::ast::CombinerParameterNode;
use crate::expression::{EvaluationContext, ExpressionFactory};
use crate::status::IndeterminateError;
use crate::value::AttributeValue;
use crate::{Error, Result};
use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

pub mod rule_combining {
    pub const DENY_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-overrides";
    pub const PERMIT_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-overrides";
    pub const ORDERED_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:ordered-deny-overrides";
    pub const ORDERED_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:ordered-permit-overrides";
    pub const FIRST_APPLICABLE: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable";
    pub const DENY_UNLESS_PERMIT: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-unless-permit";
    pub const PERMIT_UNLESS_DENY: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:permit-unless-deny";
}

pub mod policy_combining {
    pub const DENY_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides";
    pub const PERMIT_OVERRIDES: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-overrides";
    pub const ORDERED_DENY_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:ordered-deny-overrides";
    pub const ORDERED_PERMIT_OVERRIDES: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:ordered-permit-overrides";
    pub const FIRST_APPLICABLE: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:first-applicable";
    pub const ONLY_ONE_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable";
    pub const DENY_UNLESS_PERMIT: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-unless-permit";
    pub const PERMIT_UNLESS_DENY: &str =
        "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:permit-unless-deny";
}

/// A CombinerParameter
#[derive(Debug, Clone, PartialEq)]
pub struct CombinerParameter {
    pub name: String,
    pub value: AttributeValue,
}

impl CombinerParameter {
    pub fn build(node: &CombinerParameterNode) -> Result<Self> {
        Ok(Self { name: node.name.clone(), value: ExpressionFactory::parse_value(&node.datatype, &node.value, None)? })
    }
}

/// A child together with its RuleCombinerParameters or
/// PolicyCombinerParameters
#[derive(Debug, Clone)]
pub struct CombinedElement {
    pub element: Arc<dyn Decidable>,
    pub parameters: Vec<CombinerParameter>,
}

impl CombinedElement {
    pub fn new(element: Arc<dyn Decidable>) -> Self {
        Self { element, parameters: Vec::new() }
    }

    pub fn with_parameters(mut self, parameters: Vec<CombinerParameter>) -> Self {
        self.parameters = parameters;
        self
    }
}

pub trait CombiningAlgorithm: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn combine(
        &self,
        ctx: &mut EvaluationContext,
        parameters: &[CombinerParameter],
        children: &[CombinedElement],
    ) -> DecisionResult;
}

/// Running record of child results
#[derive(Default)]
struct Tally {
    permit: Option<DecisionResult>,
    deny: Option<DecisionResult>,
    indeterminate_d: bool,
    indeterminate_p: bool,
    indeterminate_dp: bool,
    status: Option<Status>,
}

impl Tally {
    fn record(&mut self, result: DecisionResult) {
        match result.decision {
            DecisionKind::Permit => Self::absorb(&mut self.permit, result),
            DecisionKind::Deny => Self::absorb(&mut self.deny, result),
            DecisionKind::NotApplicable => {},
            DecisionKind::Indeterminate => {
                match result.extended_indeterminate.unwrap_or(ExtendedIndeterminate::DenyPermit) {
                    ExtendedIndeterminate::Deny => self.indeterminate_d = true,
                    ExtendedIndeterminate::Permit => self.indeterminate_p = true,
                    ExtendedIndeterminate::DenyPermit => self.indeterminate_dp = true,
                }
                if self.status.is_none() {
                    self.status = result.status;
                }
            },
        }
    }

    fn absorb(slot: &mut Option<DecisionResult>, result: DecisionResult) {
        match slot {
            Some(acc) => acc.merge(result),
            None => *slot = Some(result),
        }
    }

    fn take(&mut self, effect: Effect) -> Option<DecisionResult> {
        match effect {
            Effect::Permit => self.permit.take(),
            Effect::Deny => self.deny.take(),
        }
    }

    fn has(&self, effect: Effect) -> bool {
        match effect {
            Effect::Permit => self.permit.is_some(),
            Effect::Deny => self.deny.is_some(),
        }
    }

    fn has_error(&self, effect: Effect) -> bool {
        match effect {
            Effect::Permit => self.indeterminate_p,
            Effect::Deny => self.indeterminate_d,
        }
    }

    fn indeterminate(&self, extended: ExtendedIndeterminate) -> DecisionResult {
        DecisionResult::indeterminate_with_status(extended, self.status.clone())
    }
}

fn opposite(effect: Effect) -> Effect {
    match effect {
        Effect::Permit => Effect::Deny,
        Effect::Deny => Effect::Permit,
    }
}

/// deny-overrides and permit-overrides, plain and ordered. Children are
/// always evaluated in document order so both flavours behave the same.
#[derive(Debug)]
pub struct Overrides {
    id: String,
    overriding: Effect,
}

impl Overrides {
    pub fn new(id: impl Into<String>, overriding: Effect) -> Self {
        Self { id: id.into(), overriding }
    }
}

impl CombiningAlgorithm for Overrides {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &mut EvaluationContext,
        _parameters: &[CombinerParameter],
        children: &[CombinedElement],
    ) -> DecisionResult {
        let winner = self.overriding;
        let loser = opposite(winner);
        let mut tally = Tally::default();
        for child in children {
            let result = child.element.evaluate(ctx, false);
            if result.decision == winner.decision() {
                return result;
            }
            tally.record(result);
        }

        if tally.indeterminate_dp {
            return tally.indeterminate(ExtendedIndeterminate::DenyPermit);
        }
        if tally.has_error(winner) {
            if tally.has_error(loser) || tally.has(loser) {
                return tally.indeterminate(ExtendedIndeterminate::DenyPermit);
            }
            return tally.indeterminate(winner.indeterminate());
        }
        if let Some(result) = tally.take(loser) {
            return result;
        }
        if tally.has_error(loser) {
            return tally.indeterminate(loser.indeterminate());
        }
        DecisionResult::not_applicable()
    }
}

/// The first child that is not NotApplicable decides
#[derive(Debug)]
pub struct FirstApplicable {
    id: String,
}

impl FirstApplicable {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl CombiningAlgorithm for FirstApplicable {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &mut EvaluationContext,
        _parameters: &[CombinerParameter],
        children: &[CombinedElement],
    ) -> DecisionResult {
        for child in children {
            let result = child.element.evaluate(ctx, false);
            if !result.is_not_applicable() {
                return result;
            }
        }
        DecisionResult::not_applicable()
    }
}

/// Exactly one applicable child decides. Policy combining only.
#[derive(Debug)]
pub struct OnlyOneApplicable;

impl CombiningAlgorithm for OnlyOneApplicable {
    fn id(&self) -> &str {
        policy_combining::ONLY_ONE_APPLICABLE
    }

    fn combine(
        &self,
        ctx: &mut EvaluationContext,
        _parameters: &[CombinerParameter],
        children: &[CombinedElement],
    ) -> DecisionResult {
        let mut selected: Option<&CombinedElement> = None;
        for child in children {
            match child.element.is_applicable(ctx) {
                Ok(false) => {},
                Ok(true) => {
                    if let Some(previous) = selected {
                        let error = IndeterminateError::processing(format!(
                            "Both '{}' and '{}' are applicable",
                            previous.element.id(),
                            child.element.id()
                        ));
                        return DecisionResult::indeterminate(ExtendedIndeterminate::DenyPermit, &error);
                    }
                    selected = Some(child);
                },
                Err(e) => {
                    let error = e.within(format!("applicability of '{}'", child.element.id()));
                    return DecisionResult::indeterminate(ExtendedIndeterminate::DenyPermit, &error);
                },
            }
        }
        match selected {
            Some(child) => child.element.evaluate(ctx, true),
            None => DecisionResult::not_applicable(),
        }
    }
}

/// deny-unless-permit and permit-unless-deny: never NotApplicable nor
/// Indeterminate
#[derive(Debug)]
pub struct UnlessEffect {
    id: String,
    winner: Effect,
}

impl UnlessEffect {
    pub fn new(id: impl Into<String>, winner: Effect) -> Self {
        Self { id: id.into(), winner }
    }
}

impl CombiningAlgorithm for UnlessEffect {
    fn id(&self) -> &str {
        &self.id
    }

    fn combine(
        &self,
        ctx: &mut EvaluationContext,
        _parameters: &[CombinerParameter],
        children: &[CombinedElement],
    ) -> DecisionResult {
        let default = opposite(self.winner);
        let mut tally = Tally::default();
        for child in children {
            let result = child.element.evaluate(ctx, false);
            if result.decision == self.winner.decision() {
                return result;
            }
            tally.record(result);
        }
        tally.take(default).unwrap_or_else(|| DecisionResult::from_effect(default))
    }
}

/// Algorithms by id, separately for rule and policy combining
#[derive(Debug, Clone, Default)]
pub struct CombiningAlgRegistry {
    rule_algorithms: AHashMap<String, Arc<dyn CombiningAlgorithm>>,
    policy_algorithms: AHashMap<String, Arc<dyn CombiningAlgorithm>>,
}

impl CombiningAlgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All standard XACML 3.0 combining algorithms
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let rule: Vec<Arc<dyn CombiningAlgorithm>> = vec![
            Arc::new(Overrides::new(rule_combining::DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(rule_combining::PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(Overrides::new(rule_combining::ORDERED_DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(rule_combining::ORDERED_PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(FirstApplicable::new(rule_combining::FIRST_APPLICABLE)),
            Arc::new(UnlessEffect::new(rule_combining::DENY_UNLESS_PERMIT, Effect::Permit)),
            Arc::new(UnlessEffect::new(rule_combining::PERMIT_UNLESS_DENY, Effect::Deny)),
        ];
        let policy: Vec<Arc<dyn CombiningAlgorithm>> = vec![
            Arc::new(Overrides::new(policy_combining::DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(policy_combining::PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(Overrides::new(policy_combining::ORDERED_DENY_OVERRIDES, Effect::Deny)),
            Arc::new(Overrides::new(policy_combining::ORDERED_PERMIT_OVERRIDES, Effect::Permit)),
            Arc::new(FirstApplicable::new(policy_combining::FIRST_APPLICABLE)),
            Arc::new(OnlyOneApplicable),
            Arc::new(UnlessEffect::new(policy_combining::DENY_UNLESS_PERMIT, Effect::Permit)),
            Arc::new(UnlessEffect::new(policy_combining::PERMIT_UNLESS_DENY, Effect::Deny)),
        ];
        for algorithm in rule {
            registry.rule_algorithms.insert(algorithm.id().to_string(), algorithm);
        }
        for algorithm in policy {
            registry.policy_algorithms.insert(algorithm.id().to_string(), algorithm);
        }
        registry
    }

    pub fn add_rule_algorithm(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) {
        self.rule_algorithms.insert(algorithm.id().to_string(), algorithm);
    }

    pub fn add_policy_algorithm(&mut self, algorithm: Arc<dyn CombiningAlgorithm>) {
        self.policy_algorithms.insert(algorithm.id().to_string(), algorithm);
    }

    pub fn rule_algorithm(&self, id: &str) -> Result<Arc<dyn CombiningAlgorithm>> {
        self.rule_algorithms
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownCombiningAlgorithm(id.to_string()))
    }

    pub fn policy_algorithm(&self, id: &str) -> Result<Arc<dyn CombiningAlgorithm>> {
        self.policy_algorithms
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownCombiningAlgorithm(id.to_string()))
    }
}
