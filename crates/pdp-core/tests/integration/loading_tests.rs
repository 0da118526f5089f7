//! Loading documents and configuration, and load-time validation

use pdp_core::ast::{ExpressionNode, PolicyDocument, PolicyNode, RuleNode};
use pdp_core::function::logical::AND;
use pdp_core::policy::combining::rule_combining;
use pdp_core::request::{attribute, category};
use pdp_core::testing::{access_request, string_target, TestNode, TestXPathCompiler};
use pdp_core::{AttributeValue, DecisionKind, Effect, Error, Pdp, PdpConfig, PrimitiveType, Request};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const DOCUMENT: &str = r#"{
    "policies": [
        {
            "id": "read-only",
            "version": "1.3",
            "combining_algorithm": "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:deny-unless-permit",
            "elements": [
                {
                    "type": "rule",
                    "id": "allow-read",
                    "effect": "Permit",
                    "target": {"any_of": [{"all_of": [{"matches": [{
                        "match_id": "urn:oasis:names:tc:xacml:1.0:function:string-equal",
                        "value": {"type": "value", "datatype": "string", "value": "read"},
                        "attribute": {
                            "type": "designator",
                            "category": "urn:oasis:names:tc:xacml:3.0:attribute-category:action",
                            "attribute_id": "urn:oasis:names:tc:xacml:1.0:action:action-id",
                            "datatype": "string"
                        }
                    }]}]}]},
                    "advice": [{
                        "id": "audit",
                        "fulfill_on": "Permit",
                        "assignments": [{
                            "attribute_id": "reason",
                            "expression": {"type": "value", "datatype": "string", "value": "read access"}
                        }]
                    }]
                }
            ]
        }
    ],
    "policy_sets": [
        {
            "id": "root",
            "combining_algorithm": "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:deny-overrides",
            "children": [{"type": "policy_reference", "id": "read-only", "version": "1.*"}]
        }
    ]
}"#;

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Policy whose only rule's condition references `v{depth}`, each variable
/// referencing the one before it
fn variable_chain(depth: usize) -> PolicyNode {
    let mut policy = PolicyNode::new("chained", rule_combining::DENY_UNLESS_PERMIT)
        .with_variable("v1", ExpressionNode::boolean(true));
    for i in 2..=depth {
        policy = policy.with_variable(format!("v{}", i), ExpressionNode::variable(format!("v{}", i - 1)));
    }
    policy.with_rule(RuleNode::new("allow", Effect::Permit).with_condition(ExpressionNode::variable(format!("v{}", depth))))
}

fn build_with_variable_depth(policy: PolicyNode, max: usize) -> pdp_core::Result<Pdp> {
    Pdp::builder()
        .with_config(PdpConfig::default().with_max_variable_reference_depth(max))
        .build(&PolicyDocument::new().with_policy(policy))
}

#[test]
fn test_document_and_config_from_files() {
    let document_file = temp_file(DOCUMENT);
    let config_file = temp_file(r#"{"max_policy_reference_depth": 1, "constant_folding": false}"#);

    let document = PolicyDocument::from_path(document_file.path()).unwrap();
    let config = PdpConfig::from_path(config_file.path()).unwrap();
    assert_eq!(config.max_policy_reference_depth, 1);
    assert_eq!(config.max_variable_reference_depth, PdpConfig::default().max_variable_reference_depth);

    let pdp = Pdp::builder().with_config(config).build(&document).unwrap();
    let result = pdp.evaluate(access_request("alice", "doc", "read"));
    assert!(result.is_permit());
    assert_eq!(result.pep_actions.advice.len(), 1);
    assert_eq!(result.pep_actions.advice[0].assignments[0].value, AttributeValue::string("read access"));

    assert!(pdp.evaluate(access_request("alice", "doc", "write")).is_deny());
}

#[test]
fn test_invalid_config_file() {
    let config_file = temp_file(r#"{"max_variable_reference_depth": 0}"#);
    assert!(matches!(PdpConfig::from_path(config_file.path()), Err(Error::Config(_))));

    let malformed = temp_file("{not json");
    assert!(matches!(PdpConfig::from_path(malformed.path()), Err(Error::Json(_))));
    assert!(matches!(PdpConfig::from_path("/nonexistent/pdp.json"), Err(Error::IoError(_))));
}

#[test]
fn test_variable_depth_boundary() {
    let pdp = build_with_variable_depth(variable_chain(4), 4).unwrap();
    assert!(pdp.evaluate(Request::new()).is_permit());

    match build_with_variable_depth(variable_chain(5), 4) {
        Err(Error::ReferenceDepthExceeded { max, chain }) => {
            assert_eq!(max, 4);
            assert_eq!(chain, vec!["v5", "v4", "v3", "v2", "v1"]);
        },
        Err(other) => panic!("expected depth error, got {}", other),
        Ok(_) => panic!("expected depth error"),
    }
}

#[test]
fn test_constant_folding_preserves_decisions() {
    let subject = ExpressionNode::apply(
        PrimitiveType::String.function_id("one-and-only"),
        vec![ExpressionNode::designator(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, "string", true)],
    );
    let condition = ExpressionNode::apply(
        AND,
        vec![
            ExpressionNode::apply(
                PrimitiveType::Integer.function_id("greater-than"),
                vec![
                    ExpressionNode::apply(
                        PrimitiveType::Integer.function_id("add"),
                        vec![ExpressionNode::integer(2), ExpressionNode::integer(3)],
                    ),
                    ExpressionNode::integer(4),
                ],
            ),
            ExpressionNode::apply(
                PrimitiveType::String.function_id("equal"),
                vec![
                    subject,
                    ExpressionNode::apply(
                        pdp_core::function::string::STRING_CONCATENATE,
                        vec![ExpressionNode::string("ali"), ExpressionNode::string("ce")],
                    ),
                ],
            ),
        ],
    );
    let document = PolicyDocument::new().with_policy(
        PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
            .with_rule(RuleNode::new("allow", Effect::Permit).with_condition(condition)),
    );

    let folded = Pdp::builder().with_config(PdpConfig::default().with_constant_folding(true)).build(&document).unwrap();
    let unfolded =
        Pdp::builder().with_config(PdpConfig::default().with_constant_folding(false)).build(&document).unwrap();

    let requests = [
        access_request("alice", "doc", "read"),
        access_request("bob", "doc", "read"),
        Request::new(),
    ];
    let expected = [DecisionKind::Permit, DecisionKind::NotApplicable, DecisionKind::Indeterminate];
    for (request, expected) in requests.into_iter().zip(expected) {
        let a = folded.evaluate(request.clone());
        let b = unfolded.evaluate(request);
        assert_eq!(a.decision, expected);
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.status_code(), b.status_code());
    }
}

#[test]
fn test_non_boolean_condition_rejected() {
    let policy = PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
        .with_rule(RuleNode::new("allow", Effect::Permit).with_condition(ExpressionNode::integer(1)));
    assert!(matches!(
        Pdp::builder().build(&PolicyDocument::new().with_policy(policy)),
        Err(Error::Syntax(_))
    ));
}

#[test]
fn test_unknown_identifiers_rejected() {
    let unknown_algorithm = PolicyNode::new("p", "urn:example:no-such-algorithm");
    assert!(matches!(
        Pdp::builder().build(&PolicyDocument::new().with_policy(unknown_algorithm)),
        Err(Error::UnknownCombiningAlgorithm(_))
    ));

    let unknown_function = PolicyNode::new("p", rule_combining::FIRST_APPLICABLE).with_rule(
        RuleNode::new("r", Effect::Permit)
            .with_condition(ExpressionNode::apply("urn:example:function:no-such-function", vec![])),
    );
    assert!(matches!(
        Pdp::builder().build(&PolicyDocument::new().with_policy(unknown_function)),
        Err(Error::UnknownFunction(_))
    ));

    let unknown_variable = PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
        .with_rule(RuleNode::new("r", Effect::Permit).with_condition(ExpressionNode::variable("undefined")));
    assert!(matches!(
        Pdp::builder().build(&PolicyDocument::new().with_policy(unknown_variable)),
        Err(Error::UnknownVariable(_))
    ));
}

#[test]
fn test_duplicate_rule_rejected() {
    let policy = PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
        .with_rule(RuleNode::new("r", Effect::Permit))
        .with_rule(RuleNode::new("r", Effect::Deny));
    assert!(matches!(Pdp::builder().build(&PolicyDocument::new().with_policy(policy)), Err(Error::Syntax(_))));
}

#[test]
fn test_selector_without_compiler_rejected() {
    let policy = PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
        .with_rule(RuleNode::new("r", Effect::Permit).with_target(ward_target()));
    assert!(matches!(Pdp::builder().build(&PolicyDocument::new().with_policy(policy)), Err(Error::Syntax(_))));
}

fn ward_target() -> pdp_core::ast::TargetNode {
    pdp_core::ast::TargetNode::single(pdp_core::ast::MatchNode::new(
        PrimitiveType::String.function_id("equal"),
        ExpressionNode::string("icu"),
        ExpressionNode::Selector {
            category: category::RESOURCE.to_string(),
            path: "/record/ward/text()".to_string(),
            datatype: "string".to_string(),
            context_selector_id: None,
            must_be_present: false,
        },
    ))
}

#[test]
fn test_selector_evaluated_once_across_rules() {
    let compiler = Arc::new(TestXPathCompiler::new());
    let policy = PolicyNode::new("p", rule_combining::FIRST_APPLICABLE)
        .with_rule(
            RuleNode::new("icu-staff", Effect::Permit)
                .with_target(ward_target())
                .with_condition(ExpressionNode::boolean(false)),
        )
        .with_rule(
            RuleNode::new("icu-alice", Effect::Permit)
                .with_target(ward_target())
                .with_condition(ExpressionNode::apply(
                    PrimitiveType::String.function_id("is-in"),
                    vec![
                        ExpressionNode::string("alice"),
                        ExpressionNode::designator(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, "string", false),
                    ],
                )),
        )
        .with_rule(RuleNode::new("otherwise", Effect::Deny).with_target(string_target(
            category::ACTION,
            attribute::ACTION_ID,
            "read",
            false,
        )));
    let pdp = Pdp::builder()
        .with_xpath_compiler(compiler.clone())
        .build(&PolicyDocument::new().with_policy(policy))
        .unwrap();

    let record = TestNode::element("record").with_text_element("ward", "icu").into_node();
    let request = access_request("alice", "chart", "read").with_content(category::RESOURCE, record);
    assert!(pdp.evaluate(request).is_permit());
    assert_eq!(compiler.evaluations(), 1);

    let record = TestNode::element("record").with_text_element("ward", "er").into_node();
    let request = access_request("alice", "chart", "read").with_content(category::RESOURCE, record);
    assert!(pdp.evaluate(request).is_deny());
    assert_eq!(compiler.evaluations(), 2);
}
