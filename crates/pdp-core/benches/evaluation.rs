// Criterion benchmarks for PDP evaluation
// - Single request against a small policy set
// - Root policy sets with growing numbers of policies
// - Document loading (repository build, reference resolution)
// - Concurrent evaluation against a shared snapshot

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pdp_core::ast::{ExpressionNode, PolicyDocument, PolicyNode, PolicySetChild, PolicySetNode, ReferenceNode, RuleNode};
use pdp_core::policy::combining::{policy_combining, rule_combining};
use pdp_core::request::{attribute, category};
use pdp_core::testing::{access_request, string_target};
use pdp_core::{Effect, Pdp, PrimitiveType};
use std::time::Duration;

/// Policy permitting `subject` to read, with an age condition
fn create_policy(id: &str, subject: &str) -> PolicyNode {
    let adult = ExpressionNode::apply(
        PrimitiveType::Integer.function_id("greater-than-or-equal"),
        vec![
            ExpressionNode::apply(
                PrimitiveType::Integer.function_id("one-and-only"),
                vec![ExpressionNode::designator(category::ACCESS_SUBJECT, "age", "integer", false)],
            ),
            ExpressionNode::integer(18),
        ],
    );
    PolicyNode::new(id, rule_combining::DENY_OVERRIDES)
        .with_target(string_target(category::ACCESS_SUBJECT, attribute::SUBJECT_ID, subject, false))
        .with_rule(
            RuleNode::new("read", Effect::Permit)
                .with_target(string_target(category::ACTION, attribute::ACTION_ID, "read", false))
                .with_condition(adult),
        )
        .with_rule(
            RuleNode::new("no-write", Effect::Deny)
                .with_target(string_target(category::ACTION, attribute::ACTION_ID, "write", false)),
        )
}

/// Root set referencing `count` per-user policies
fn create_document(count: usize) -> PolicyDocument {
    let mut root = PolicySetNode::new("root", policy_combining::DENY_OVERRIDES);
    let mut document = PolicyDocument::new();
    for i in 0..count {
        let id = format!("user{}-policy", i);
        document = document.with_policy(create_policy(&id, &format!("user{}", i)));
        root = root.with_child(PolicySetChild::PolicyReference(ReferenceNode::new(id)));
    }
    document.with_policy_set(root)
}

fn create_request(subject: &str) -> pdp_core::Request {
    access_request(subject, "doc", "read").with_attribute(
        category::ACCESS_SUBJECT,
        "age",
        pdp_core::AttributeValue::Integer(30),
    )
}

/// Benchmark: one request against a small policy set
fn bench_single_request(c: &mut Criterion) {
    let pdp = Pdp::builder().build(&create_document(3)).unwrap();

    c.bench_function("single_request", |b| {
        b.iter(|| black_box(pdp.evaluate(create_request("user1"))))
    });
}

/// Benchmark: growing number of policies under the root
fn bench_policy_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("policy_count");
    for count in [10u64, 100, 1000] {
        let pdp = Pdp::builder().build(&create_document(count as usize)).unwrap();
        let last = format!("user{}", count - 1);

        group.throughput(Throughput::Elements(count));
        group.bench_with_input(BenchmarkId::from_parameter(count), &last, |b, subject| {
            b.iter(|| black_box(pdp.evaluate(create_request(subject))))
        });
    }
    group.finish();
}

/// Benchmark: building a snapshot from a document
fn bench_document_loading(c: &mut Criterion) {
    let document = create_document(100);

    c.bench_function("document_loading_100", |b| {
        b.iter(|| black_box(Pdp::builder().build(&document).unwrap()))
    });
}

/// Benchmark: concurrent evaluation (8 threads)
fn bench_concurrent_evaluation(c: &mut Criterion) {
    use std::sync::Arc;
    use std::thread;

    let pdp = Arc::new(Pdp::builder().build(&create_document(100)).unwrap());

    c.bench_function("concurrent_evaluation_8threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let pdp = Arc::clone(&pdp);
                    thread::spawn(move || {
                        let subject = format!("user{}", t * 10);
                        for _ in 0..100 {
                            black_box(pdp.evaluate(create_request(&subject)));
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }
        })
    });
}

// Configure Criterion
fn configure_criterion() -> Criterion {
    Criterion::default()
        .sample_size(100)
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3))
        .with_plots()
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets =
        bench_single_request,
        bench_policy_count,
        bench_document_loading,
        bench_concurrent_evaluation,
}

criterion_main!(benches);
