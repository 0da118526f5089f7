//! End-to-end decisions through the PDP

use pdp_core::ast::{
    AssignmentNode, ExpressionNode, PepActionNode, PolicyDocument, PolicyNode, PolicySetChild, PolicySetNode,
    ReferenceNode, RuleNode,
};
use pdp_core::expression::AttributeKey;
use pdp_core::function::logical::{AND, N_OF, OR};
use pdp_core::policy::combining::{policy_combining, rule_combining};
use pdp_core::policy::{ExtendedIndeterminate, PolicyKind};
use pdp_core::request::{attribute, category};
use pdp_core::testing::{access_request, string_target, CountingAlgorithm, InMemoryAttributeProvider};
use pdp_core::{AttributeValue, Bag, CombiningAlgRegistry, DecisionKind, Effect, Pdp, PrimitiveType, Request, StatusCode};
use std::sync::Arc;

fn subject_target(name: &str, must_be_present: bool) -> pdp_core::ast::TargetNode {
    string_target(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, name, must_be_present)
}

fn single_policy(policy: PolicyNode) -> Pdp {
    Pdp::builder().build(&PolicyDocument::new().with_policy(policy)).unwrap()
}

fn obligation(id: &str, fulfill_on: Effect, expression: ExpressionNode) -> PepActionNode {
    PepActionNode {
        id: id.to_string(),
        fulfill_on,
        assignments: vec![AssignmentNode {
            attribute_id: format!("{}-value", id),
            category: None,
            issuer: None,
            expression,
        }],
    }
}

fn subject_designator(must_be_present: bool) -> ExpressionNode {
    ExpressionNode::designator(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, "string", must_be_present)
}

fn condition_policy(condition: ExpressionNode) -> PolicyNode {
    PolicyNode::new("conditional", rule_combining::DENY_UNLESS_PERMIT)
        .with_rule(RuleNode::new("allow", Effect::Permit).with_condition(condition))
}

#[test]
fn test_permit_and_deny() {
    let pdp = single_policy(
        PolicyNode::new("alice-only", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("allow-alice", Effect::Permit).with_target(subject_target("alice", false)))
            .with_rule(RuleNode::new("deny-rest", Effect::Deny)),
    );

    assert!(pdp.evaluate(access_request("alice", "doc", "read")).is_permit());
    assert!(pdp.evaluate(access_request("bob", "doc", "read")).is_deny());
}

#[test]
fn test_must_be_present_false_does_not_match() {
    let pdp = single_policy(
        PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("allow-alice", Effect::Permit).with_target(subject_target("alice", false))),
    );

    let result = pdp.evaluate(Request::new());
    assert_eq!(result.decision, DecisionKind::NotApplicable);
    assert!(result.status.is_none());
}

#[test]
fn test_must_be_present_true_is_missing_attribute() {
    let pdp = single_policy(
        PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("allow-alice", Effect::Permit).with_target(subject_target("alice", true))),
    );

    let result = pdp.evaluate(Request::new());
    assert!(result.is_indeterminate());
    assert_eq!(result.extended_indeterminate, Some(ExtendedIndeterminate::Permit));
    assert_eq!(result.status_code(), StatusCode::MissingAttribute);
}

#[test]
fn test_policy_target_error_keeps_algorithm_outcome() {
    // algorithm decides Deny under an Indeterminate target: Indeterminate{D}
    let pdp = single_policy(
        PolicyNode::new("guarded", rule_combining::DENY_OVERRIDES)
            .with_target(subject_target("alice", true))
            .with_rule(RuleNode::new("no", Effect::Deny)),
    );
    let result = pdp.evaluate(Request::new());
    assert!(result.is_indeterminate());
    assert_eq!(result.extended_indeterminate, Some(ExtendedIndeterminate::Deny));

    // algorithm NotApplicable under an Indeterminate target: NotApplicable
    let pdp = single_policy(
        PolicyNode::new("guarded", rule_combining::DENY_OVERRIDES)
            .with_target(subject_target("alice", true))
            .with_rule(RuleNode::new("never", Effect::Deny).with_condition(ExpressionNode::boolean(false))),
    );
    assert!(pdp.evaluate(Request::new()).is_not_applicable());
}

#[test]
fn test_target_mismatch_skips_algorithm() {
    let mut algorithms = CombiningAlgRegistry::standard();
    let counting = Arc::new(CountingAlgorithm::new(
        algorithms.rule_algorithm(rule_combining::PERMIT_OVERRIDES).unwrap(),
    ));
    algorithms.add_rule_algorithm(counting.clone());

    let document = PolicyDocument::new().with_policy(
        PolicyNode::new("bob-policy", rule_combining::PERMIT_OVERRIDES)
            .with_target(subject_target("bob", false))
            .with_rule(RuleNode::new("allow", Effect::Permit)),
    );
    let pdp = Pdp::builder().with_algorithms(algorithms).build(&document).unwrap();

    assert!(pdp.evaluate(access_request("alice", "doc", "read")).is_not_applicable());
    assert_eq!(counting.invocations(), 0);

    assert!(pdp.evaluate(access_request("bob", "doc", "read")).is_permit());
    assert_eq!(counting.invocations(), 1);
}

#[test]
fn test_empty_connectives() {
    let or = single_policy(condition_policy(ExpressionNode::apply(OR, vec![])));
    assert!(or.evaluate(Request::new()).is_deny());

    let and = single_policy(condition_policy(ExpressionNode::apply(AND, vec![])));
    assert!(and.evaluate(Request::new()).is_permit());

    let n_of = single_policy(condition_policy(ExpressionNode::apply(N_OF, vec![ExpressionNode::integer(0)])));
    assert!(n_of.evaluate(Request::new()).is_permit());
}

#[test]
fn test_or_short_circuits_missing_attribute() {
    // the literal decides before the required attribute is looked up
    let condition = ExpressionNode::apply(
        OR,
        vec![
            ExpressionNode::boolean(true),
            ExpressionNode::apply(
                PrimitiveType::String.function_id("is-in"),
                vec![ExpressionNode::string("alice"), subject_designator(true)],
            ),
        ],
    );
    let pdp = single_policy(
        PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("allow", Effect::Permit).with_condition(condition)),
    );
    assert!(pdp.evaluate(Request::new()).is_permit());
}

#[test]
fn test_attribute_resolved_once_per_request() {
    let provider = Arc::new(InMemoryAttributeProvider::new().with_bag(
        AttributeKey::new(category::ACCESS_SUBJECT, attribute::SUBJECT_ID),
        Bag::singleton(AttributeValue::string("carol")),
    ));
    let document = PolicyDocument::new().with_policy(
        PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("alice", Effect::Permit).with_target(subject_target("alice", false)))
            .with_rule(RuleNode::new("bob", Effect::Permit).with_target(subject_target("bob", false)))
            .with_rule(RuleNode::new("carol", Effect::Deny).with_target(subject_target("carol", false))),
    );
    let pdp = Pdp::builder().with_attribute_provider(provider.clone()).build(&document).unwrap();

    assert!(pdp.evaluate(Request::new()).is_deny());
    assert_eq!(provider.calls(), 1);

    // a new request starts with an empty cache
    assert!(pdp.evaluate(Request::new()).is_deny());
    assert_eq!(provider.calls(), 2);
}

#[test]
fn test_provider_failure_is_missing_attribute() {
    let provider = Arc::new(InMemoryAttributeProvider::new().with_failure(
        AttributeKey::new(category::ACCESS_SUBJECT, attribute::SUBJECT_ID),
        pdp_core::IndeterminateError::processing("directory unavailable"),
    ));
    let document = PolicyDocument::new().with_policy(
        PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("allow", Effect::Permit).with_target(subject_target("alice", false))),
    );
    let pdp = Pdp::builder().with_attribute_provider(provider).build(&document).unwrap();

    let result = pdp.evaluate(Request::new());
    assert!(result.is_indeterminate());
    assert_eq!(result.status_code(), StatusCode::MissingAttribute);
}

#[test]
fn test_obligations_returned_with_decision() {
    let pdp = single_policy(
        PolicyNode::new("p", rule_combining::DENY_OVERRIDES)
            .with_rule(
                RuleNode::new("allow", Effect::Permit)
                    .with_obligation(obligation("log-access", Effect::Permit, subject_designator(false)))
                    .with_obligation(obligation("notify-deny", Effect::Deny, ExpressionNode::string("x"))),
            )
            .with_obligation(obligation("audit", Effect::Permit, ExpressionNode::string("audited"))),
    );

    let result = pdp.evaluate(access_request("alice", "doc", "read"));
    assert!(result.is_permit());
    let ids: Vec<_> = result.pep_actions.obligations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["log-access", "audit"]);
    assert_eq!(result.pep_actions.obligations[0].assignments[0].value, AttributeValue::string("alice"));
}

#[test]
fn test_empty_bag_assignment_yields_no_values() {
    let pdp = single_policy(PolicyNode::new("p", rule_combining::DENY_OVERRIDES).with_rule(
        RuleNode::new("allow", Effect::Permit).with_obligation(obligation(
            "log-access",
            Effect::Permit,
            subject_designator(false),
        )),
    ));

    let result = pdp.evaluate(Request::new());
    assert!(result.is_permit());
    assert_eq!(result.pep_actions.obligations.len(), 1);
    assert!(result.pep_actions.obligations[0].assignments.is_empty());
}

#[test]
fn test_failing_obligation_is_indeterminate() {
    let pdp = single_policy(
        PolicyNode::new("p", rule_combining::DENY_OVERRIDES)
            .with_rule(RuleNode::new("allow", Effect::Permit))
            .with_obligation(obligation("log-access", Effect::Permit, subject_designator(true))),
    );

    let result = pdp.evaluate(Request::new());
    assert!(result.is_indeterminate());
    assert_eq!(result.extended_indeterminate, Some(ExtendedIndeterminate::Permit));
    assert_eq!(result.status_code(), StatusCode::MissingAttribute);
    assert!(result.pep_actions.is_empty());
}

#[test]
fn test_only_matching_children_contribute_obligations() {
    let deny = |id: &str| {
        PolicyNode::new(id, rule_combining::DENY_OVERRIDES)
            .with_rule(RuleNode::new("no", Effect::Deny))
            .with_obligation(obligation(&format!("{}-deny", id), Effect::Deny, ExpressionNode::string(id)))
    };
    let permit = PolicyNode::new("permit", rule_combining::DENY_OVERRIDES)
        .with_rule(RuleNode::new("yes", Effect::Permit))
        .with_obligation(obligation("permit-permit", Effect::Permit, ExpressionNode::string("permit")));

    let document = PolicyDocument::new().with_policy_set(
        PolicySetNode::new("root", policy_combining::DENY_OVERRIDES)
            .with_child(PolicySetChild::Policy(permit))
            .with_child(PolicySetChild::Policy(deny("first")))
            .with_child(PolicySetChild::Policy(deny("second"))),
    );
    let pdp = Pdp::builder().build(&document).unwrap();

    let result = pdp.evaluate(Request::new().with_policy_id_list(true));
    assert!(result.is_deny());
    let ids: Vec<_> = result.pep_actions.obligations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["first-deny", "second-deny"]);

    let applicable: Vec<_> = result.applicable_policies.iter().map(|p| p.id.as_str()).collect();
    assert!(applicable.contains(&"first"));
    assert!(applicable.contains(&"second"));
    assert!(applicable.contains(&"root"));
    assert!(!applicable.contains(&"permit"));
}

#[test]
fn test_policy_id_list_off_by_default() {
    let pdp = single_policy(
        PolicyNode::new("p", rule_combining::DENY_OVERRIDES).with_rule(RuleNode::new("yes", Effect::Permit)),
    );
    assert!(pdp.evaluate(Request::new()).applicable_policies.is_empty());

    let result = pdp.evaluate(Request::new().with_policy_id_list(true));
    assert_eq!(result.applicable_policies.len(), 1);
    assert_eq!(result.applicable_policies[0].kind, PolicyKind::Policy);
}

#[test]
fn test_only_one_applicable() {
    let scoped = |id: &str, subject: &str, effect: Effect| {
        PolicyNode::new(id, rule_combining::FIRST_APPLICABLE)
            .with_target(subject_target(subject, false))
            .with_rule(RuleNode::new("r", effect))
    };
    let document = PolicyDocument::new()
        .with_policy(scoped("alice-policy", "alice", Effect::Permit))
        .with_policy(scoped("also-alice", "alice", Effect::Deny))
        .with_policy(scoped("bob-policy", "bob", Effect::Deny))
        .with_policy_set(
            PolicySetNode::new("root", policy_combining::ONLY_ONE_APPLICABLE)
                .with_child(PolicySetChild::PolicyReference(ReferenceNode::new("alice-policy")))
                .with_child(PolicySetChild::PolicyReference(ReferenceNode::new("also-alice")))
                .with_child(PolicySetChild::PolicyReference(ReferenceNode::new("bob-policy"))),
        );
    let pdp = Pdp::builder().build(&document).unwrap();

    assert!(pdp.evaluate(access_request("bob", "doc", "read")).is_deny());
    assert!(pdp.evaluate(access_request("carol", "doc", "read")).is_not_applicable());

    let ambiguous = pdp.evaluate(access_request("alice", "doc", "read"));
    assert!(ambiguous.is_indeterminate());
    assert_eq!(ambiguous.status_code(), StatusCode::ProcessingError);
}

#[test]
fn test_condition_over_request_values() {
    let age_over = ExpressionNode::apply(
        PrimitiveType::Integer.function_id("greater-than-or-equal"),
        vec![
            ExpressionNode::apply(
                PrimitiveType::Integer.function_id("one-and-only"),
                vec![ExpressionNode::designator(category::ACCESS_SUBJECT, "age", "integer", true)],
            ),
            ExpressionNode::integer(18),
        ],
    );
    let pdp = single_policy(condition_policy(age_over));

    let adult = Request::new().with_attribute(category::ACCESS_SUBJECT, "age", AttributeValue::Integer(30));
    assert!(pdp.evaluate(adult).is_permit());

    let minor = Request::new().with_attribute(category::ACCESS_SUBJECT, "age", AttributeValue::Integer(12));
    assert!(pdp.evaluate(minor).is_deny());

    // two values: one-and-only fails, deny-unless-permit still denies
    let twice = Request::new().with_attribute_values(
        category::ACCESS_SUBJECT,
        "age",
        None,
        vec![AttributeValue::Integer(30), AttributeValue::Integer(31)],
    );
    assert!(pdp.evaluate(twice).is_deny());
}
