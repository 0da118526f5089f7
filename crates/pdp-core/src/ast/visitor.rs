//! Visitor pattern for traversing policy trees

use super::document::PolicyDocument;
use super::nodes::{
    ExpressionNode, MatchNode, PepActionNode, PolicyElement, PolicyNode, PolicySetChild, PolicySetNode,
    ReferenceNode, RuleNode, TargetNode,
};
use std::collections::BTreeSet;

/// Visitor trait for policy tree traversal
pub trait Visitor: Sized {
    fn visit_policy_set(&mut self, policy_set: &PolicySetNode) {
        walk_policy_set(self, policy_set);
    }

    fn visit_policy(&mut self, policy: &PolicyNode) {
        walk_policy(self, policy);
    }

    fn visit_rule(&mut self, rule: &RuleNode) {
        walk_rule(self, rule);
    }

    fn visit_target(&mut self, target: &TargetNode) {
        walk_target(self, target);
    }

    fn visit_match(&mut self, m: &MatchNode) {
        self.visit_expression(&m.value);
        self.visit_expression(&m.attribute);
    }

    fn visit_pep_action(&mut self, action: &PepActionNode) {
        for assignment in &action.assignments {
            self.visit_expression(&assignment.expression);
        }
    }

    fn visit_expression(&mut self, expr: &ExpressionNode) {
        walk_expression(self, expr);
    }

    /// `policy_set` is true for PolicySetIdReference
    fn visit_reference(&mut self, _reference: &ReferenceNode, _policy_set: bool) {
        // Leaf node, no children
    }
}

pub fn walk_document<V: Visitor>(visitor: &mut V, document: &PolicyDocument) {
    for policy in &document.policies {
        visitor.visit_policy(policy);
    }
    for policy_set in &document.policy_sets {
        visitor.visit_policy_set(policy_set);
    }
}

pub fn walk_policy_set<V: Visitor>(visitor: &mut V, policy_set: &PolicySetNode) {
    if let Some(target) = &policy_set.target {
        visitor.visit_target(target);
    }
    for child in &policy_set.children {
        match child {
            PolicySetChild::Policy(policy) => visitor.visit_policy(policy),
            PolicySetChild::PolicySet(nested) => visitor.visit_policy_set(nested),
            PolicySetChild::PolicyReference(reference) => visitor.visit_reference(reference, false),
            PolicySetChild::PolicySetReference(reference) => visitor.visit_reference(reference, true),
        }
    }
    for action in policy_set.obligations.iter().chain(&policy_set.advice) {
        visitor.visit_pep_action(action);
    }
}

pub fn walk_policy<V: Visitor>(visitor: &mut V, policy: &PolicyNode) {
    if let Some(target) = &policy.target {
        visitor.visit_target(target);
    }
    for element in &policy.elements {
        match element {
            PolicyElement::Rule(rule) => visitor.visit_rule(rule),
            PolicyElement::VariableDefinition { expression, .. } => visitor.visit_expression(expression),
        }
    }
    for action in policy.obligations.iter().chain(&policy.advice) {
        visitor.visit_pep_action(action);
    }
}

pub fn walk_rule<V: Visitor>(visitor: &mut V, rule: &RuleNode) {
    if let Some(target) = &rule.target {
        visitor.visit_target(target);
    }
    if let Some(condition) = &rule.condition {
        visitor.visit_expression(condition);
    }
    for action in rule.obligations.iter().chain(&rule.advice) {
        visitor.visit_pep_action(action);
    }
}

pub fn walk_target<V: Visitor>(visitor: &mut V, target: &TargetNode) {
    for any_of in &target.any_of {
        for all_of in &any_of.all_of {
            for m in &all_of.matches {
                visitor.visit_match(m);
            }
        }
    }
}

pub fn walk_expression<V: Visitor>(visitor: &mut V, expr: &ExpressionNode) {
    if let ExpressionNode::Apply { args, .. } = expr {
        for arg in args {
            visitor.visit_expression(arg);
        }
    }
}

/// Collects the ids named by Policy(Set)IdReferences
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    pub policy_refs: BTreeSet<String>,
    pub policy_set_refs: BTreeSet<String>,
}

impl ReferenceCollector {
    pub fn collect(document: &PolicyDocument) -> Self {
        let mut collector = Self::default();
        walk_document(&mut collector, document);
        collector
    }

    /// Top-level PolicySets no other PolicySet references, in document
    /// order. A document with a single candidate has an unambiguous root.
    pub fn root_candidates<'a>(&self, document: &'a PolicyDocument) -> Vec<&'a PolicySetNode> {
        document
            .policy_sets
            .iter()
            .filter(|ps| !self.policy_set_refs.contains(&ps.id))
            .collect()
    }
}

impl Visitor for ReferenceCollector {
    fn visit_reference(&mut self, reference: &ReferenceNode, policy_set: bool) {
        if policy_set {
            self.policy_set_refs.insert(reference.id.clone());
        } else {
            self.policy_refs.insert(reference.id.clone());
        }
    }
}
