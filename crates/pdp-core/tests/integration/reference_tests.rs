//! Policy references, versions and snapshot reloads through the PDP

use pdp_core::ast::{PolicyDocument, PolicyNode, PolicySetChild, PolicySetNode, ReferenceNode, RuleNode};
use pdp_core::engine::RootPolicy;
use pdp_core::policy::combining::{policy_combining, rule_combining};
use pdp_core::policy::{PolicyKind, VersionConstraints};
use pdp_core::testing::access_request;
use pdp_core::{Effect, Error, Pdp, PdpConfig, Request};
use std::sync::Arc;
use std::thread;

fn policy(id: &str, version: &str, effect: Effect) -> PolicyNode {
    PolicyNode::new(id, rule_combining::FIRST_APPLICABLE)
        .with_version(version)
        .with_rule(RuleNode::new("r", effect))
}

fn root_referencing(reference: ReferenceNode) -> PolicySetNode {
    PolicySetNode::new("root", policy_combining::FIRST_APPLICABLE)
        .with_child(PolicySetChild::PolicyReference(reference))
}

fn versioned_document(reference: ReferenceNode) -> PolicyDocument {
    ["1.0", "1.2", "1.2.1", "2.0"]
        .iter()
        .fold(PolicyDocument::new(), |doc, v| doc.with_policy(policy("versioned", v, Effect::Permit)))
        .with_policy_set(root_referencing(reference))
}

fn decided_version(pdp: &Pdp) -> String {
    let result = pdp.evaluate(Request::new().with_policy_id_list(true));
    assert!(result.is_permit());
    result
        .applicable_policies
        .iter()
        .find(|p| p.kind == PolicyKind::Policy)
        .map(|p| p.version.to_string())
        .unwrap()
}

/// root -> s1 -> ... -> s{n} -> policy p
fn chain_document(n: usize) -> PolicyDocument {
    let mut document = PolicyDocument::new().with_policy(policy("p", "1.0", Effect::Permit));
    for i in 0..=n {
        let id = if i == 0 { "root".to_string() } else { format!("s{}", i) };
        let child = if i == n {
            PolicySetChild::PolicyReference(ReferenceNode::new("p"))
        } else {
            PolicySetChild::PolicySetReference(ReferenceNode::new(format!("s{}", i + 1)))
        };
        document = document
            .with_policy_set(PolicySetNode::new(id, policy_combining::FIRST_APPLICABLE).with_child(child));
    }
    document
}

fn build_with_depth(document: &PolicyDocument, max: usize) -> pdp_core::Result<Pdp> {
    Pdp::builder()
        .with_config(PdpConfig::default().with_max_policy_reference_depth(max))
        .build(document)
}

#[test]
fn test_wildcard_picks_latest_matching() {
    let pdp = Pdp::builder()
        .build(&versioned_document(ReferenceNode::new("versioned").with_version("1.*")))
        .unwrap();
    assert_eq!(decided_version(&pdp), "1.2");

    let pdp = Pdp::builder()
        .build(&versioned_document(ReferenceNode::new("versioned").with_version("1.+")))
        .unwrap();
    assert_eq!(decided_version(&pdp), "1.2.1");
}

#[test]
fn test_unconstrained_reference_picks_latest() {
    let pdp = Pdp::builder().build(&versioned_document(ReferenceNode::new("versioned"))).unwrap();
    assert_eq!(decided_version(&pdp), "2.0");
}

#[test]
fn test_earliest_and_latest_bounds() {
    let reference = ReferenceNode::new("versioned").with_earliest("1.1").with_latest("1.2");
    let pdp = Pdp::builder().build(&versioned_document(reference)).unwrap();
    assert_eq!(decided_version(&pdp), "1.2");

    let reference = ReferenceNode::new("versioned").with_latest("1.*");
    let pdp = Pdp::builder().build(&versioned_document(reference)).unwrap();
    assert_eq!(decided_version(&pdp), "1.2.1");
}

#[test]
fn test_no_matching_version() {
    let reference = ReferenceNode::new("versioned").with_earliest("3.0");
    assert!(matches!(Pdp::builder().build(&versioned_document(reference)), Err(Error::PolicyNotFound(_))));
}

#[test]
fn test_invalid_version_pattern() {
    let reference = ReferenceNode::new("versioned").with_version("1.+.2");
    assert!(matches!(Pdp::builder().build(&versioned_document(reference)), Err(Error::Syntax(_))));
}

#[test]
fn test_reference_depth_boundary() {
    // root -> s1 -> s2 -> p is three hops
    let document = chain_document(2);
    let pdp = build_with_depth(&document, 3).unwrap();
    assert!(pdp.evaluate(Request::new()).is_permit());

    match build_with_depth(&document, 2) {
        Err(Error::ReferenceDepthExceeded { max, chain }) => {
            assert_eq!(max, 2);
            assert_eq!(chain, vec!["root", "s1", "s2", "p"]);
        },
        Err(other) => panic!("expected depth error, got {}", other),
        Ok(_) => panic!("expected depth error"),
    }
}

#[test]
fn test_circular_reference_rejected() {
    let document = PolicyDocument::new()
        .with_policy_set(
            PolicySetNode::new("a", policy_combining::DENY_OVERRIDES)
                .with_child(PolicySetChild::PolicySetReference(ReferenceNode::new("b"))),
        )
        .with_policy_set(
            PolicySetNode::new("b", policy_combining::DENY_OVERRIDES)
                .with_child(PolicySetChild::PolicySetReference(ReferenceNode::new("a"))),
        );
    assert!(matches!(
        Pdp::builder().with_root(RootPolicy::policy_set("a")).build(&document),
        Err(Error::CircularReference { .. })
    ));
}

#[test]
fn test_explicit_root_version() {
    let document = PolicyDocument::new()
        .with_policy(policy("p", "1.0", Effect::Deny))
        .with_policy(policy("p", "2.0", Effect::Permit));

    let latest = Pdp::builder().with_root(RootPolicy::policy("p")).build(&document).unwrap();
    assert!(latest.evaluate(Request::new()).is_permit());

    let constraints = VersionConstraints::parse(Some("1.0"), None, None).unwrap();
    let pinned = Pdp::builder()
        .with_root(RootPolicy::policy("p").with_constraints(constraints))
        .build(&document)
        .unwrap();
    assert!(pinned.evaluate(Request::new()).is_deny());
}

#[test]
fn test_reload_swaps_snapshot() {
    let document = PolicyDocument::new().with_policy(policy("p", "1.0", Effect::Deny));
    let pdp = Pdp::builder().with_root(RootPolicy::policy("p")).build(&document).unwrap();
    let before = pdp.snapshot();

    let next = PolicyDocument::new().with_policy(policy("p", "1.1", Effect::Permit));
    assert_eq!(pdp.reload(&next).unwrap(), 2);

    // the old snapshot is still usable by whoever holds it
    assert_eq!(before.version, 1);
    assert_eq!(before.root().version().to_string(), "1.0");
    assert_eq!(pdp.snapshot().root().version().to_string(), "1.1");
    assert!(pdp.evaluate(Request::new()).is_permit());
}

#[test]
fn test_concurrent_evaluation_during_reload() {
    let permit = PolicyDocument::new().with_policy(policy("p", "1.0", Effect::Permit));
    let also_permit = PolicyDocument::new().with_policy(policy("p", "2.0", Effect::Permit));
    let pdp = Arc::new(Pdp::builder().with_root(RootPolicy::policy("p")).build(&permit).unwrap());

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let pdp = Arc::clone(&pdp);
            thread::spawn(move || {
                (0..200).all(|_| pdp.evaluate(access_request(&format!("user{}", i), "doc", "read")).is_permit())
            })
        })
        .collect();
    for _ in 0..20 {
        pdp.reload(&also_permit).unwrap();
        pdp.reload(&permit).unwrap();
    }

    for worker in workers {
        assert!(worker.join().unwrap());
    }
    let stats = pdp.stats();
    assert_eq!(stats.evaluations, 800);
    assert_eq!(stats.current_version, 41);
}
