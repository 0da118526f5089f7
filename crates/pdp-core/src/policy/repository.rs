//! Policy repository and static reference resolution
//!
//! Every Policy of a document is built first. PolicySets are built on
//! demand, following references depth first, and memoized by id and
//! version so a PolicySet referenced from several places is built once.
//! Reference cycles and chains longer than the configured limit are load
//! errors.

use super::combining::{CombinedElement, CombiningAlgRegistry};
use super::decision::{PolicyKind, PolicyRef};
use super::evaluator::{child_parameters, combiner_parameters, PolicyEvaluator};
use super::pep_action::PepActionExpressions;
use super::reference::PolicyReferenceEvaluator;
use super::target::Target;
use super::version::{PolicyVersion, PolicyVersions, VersionConstraints};
use super::Decidable;
use crate::ast::{PolicyDocument, PolicySetChild, PolicySetNode, ReferenceNode};
use crate::expression::{ExpressionFactory, VariableScope};
use crate::{Error, Result};
use ahash::AHashMap;
use std::sync::Arc;

type Versions = AHashMap<String, PolicyVersions<Arc<PolicyEvaluator>>>;

/// Ids of the PolicySets traversed through references, starting with the
/// top-level one
type RefChain = Vec<String>;

/// Loaded Policies and PolicySets, all references resolved
#[derive(Debug, Default)]
pub struct PolicyRepository {
    policies: Versions,
    policy_sets: Versions,
}

impl PolicyRepository {
    /// Build every Policy and PolicySet of `document`
    pub fn load(
        document: &PolicyDocument,
        factory: &ExpressionFactory,
        algorithms: &CombiningAlgRegistry,
        max_reference_depth: usize,
    ) -> Result<Self> {
        let mut loader = Loader {
            factory,
            algorithms,
            max_depth: max_reference_depth,
            policies: Versions::new(),
            set_nodes: AHashMap::new(),
            built: AHashMap::new(),
        };

        for node in &document.policies {
            let evaluator = PolicyEvaluator::from_policy(node, factory, algorithms)?;
            let version = evaluator.version().clone();
            let previous = loader
                .policies
                .entry(node.id.clone())
                .or_default()
                .insert(version.clone(), Arc::new(evaluator));
            if previous.is_some() {
                return Err(Error::DuplicatePolicy { id: node.id.clone(), version: version.to_string() });
            }
        }

        for node in &document.policy_sets {
            let version = PolicyVersion::parse(&node.version)?;
            let previous = loader.set_nodes.entry(node.id.as_str()).or_default().insert(version.clone(), node);
            if previous.is_some() {
                return Err(Error::DuplicatePolicy { id: node.id.clone(), version: version.to_string() });
            }
        }

        for node in &document.policy_sets {
            let version = PolicyVersion::parse(&node.version)?;
            loader.resolve_policy_set(node, version, &[node.id.clone()])?;
        }

        let mut policy_sets = Versions::new();
        for ((id, version), (evaluator, _)) in loader.built {
            policy_sets.entry(id).or_default().insert(version, evaluator);
        }

        let repository = Self { policies: loader.policies, policy_sets };
        tracing::info!(
            "Loaded {} policies and {} policy sets",
            repository.count(PolicyKind::Policy),
            repository.count(PolicyKind::PolicySet)
        );
        Ok(repository)
    }

    fn versions(&self, kind: PolicyKind) -> &Versions {
        match kind {
            PolicyKind::Policy => &self.policies,
            PolicyKind::PolicySet => &self.policy_sets,
        }
    }

    /// Latest version of `id` satisfying `constraints`
    pub fn find_policy(
        &self,
        id: &str,
        kind: PolicyKind,
        constraints: &VersionConstraints,
    ) -> Option<Arc<PolicyEvaluator>> {
        self.versions(kind)
            .get(id)
            .and_then(|versions| versions.get_latest(constraints))
            .map(|(_, evaluator)| Arc::clone(evaluator))
    }

    /// Number of loaded versions of the given kind
    pub fn count(&self, kind: PolicyKind) -> usize {
        self.versions(kind).values().map(PolicyVersions::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.policy_sets.is_empty()
    }

    /// Every loaded Policy and PolicySet
    pub fn policy_refs(&self) -> impl Iterator<Item = &PolicyRef> {
        self.policies
            .values()
            .chain(self.policy_sets.values())
            .flat_map(|versions| versions.iter().map(|(_, evaluator)| evaluator.policy_ref()))
    }
}

struct Loader<'a> {
    factory: &'a ExpressionFactory,
    algorithms: &'a CombiningAlgRegistry,
    max_depth: usize,
    policies: Versions,
    set_nodes: AHashMap<&'a str, PolicyVersions<&'a PolicySetNode>>,
    /// Top-level PolicySets built so far, with the longest reference
    /// chain below each
    built: AHashMap<(String, PolicyVersion), (Arc<PolicyEvaluator>, usize)>,
}

impl<'a> Loader<'a> {
    fn resolve_policy_set(
        &mut self,
        node: &'a PolicySetNode,
        version: PolicyVersion,
        chain: &[String],
    ) -> Result<(Arc<PolicyEvaluator>, usize)> {
        let key = (node.id.clone(), version);
        if let Some((evaluator, depth)) = self.built.get(&key) {
            return Ok((Arc::clone(evaluator), *depth));
        }
        let (evaluator, depth) = self.build_policy_set(node, chain)?;
        let evaluator = Arc::new(evaluator);
        self.built.insert(key, (Arc::clone(&evaluator), depth));
        Ok((evaluator, depth))
    }

    /// Build a PolicySet. Returns it with the number of reference hops of
    /// its longest chain.
    fn build_policy_set(&mut self, node: &'a PolicySetNode, chain: &[String]) -> Result<(PolicyEvaluator, usize)> {
        let version = PolicyVersion::parse(&node.version)?;
        let algorithm = self.algorithms.policy_algorithm(&node.combining_algorithm)?;
        let scope = VariableScope::empty();
        let target = Target::build(node.target.as_ref(), self.factory, &scope)?;

        let mut children = Vec::with_capacity(node.children.len());
        let mut depth = 0;
        for child in &node.children {
            let (element, child_id, child_depth): (Arc<dyn Decidable>, &str, usize) = match child {
                PolicySetChild::Policy(policy) => {
                    let evaluator = PolicyEvaluator::from_policy(policy, self.factory, self.algorithms)?;
                    (Arc::new(evaluator) as Arc<dyn Decidable>, policy.id.as_str(), 0)
                },
                PolicySetChild::PolicySet(inline) => {
                    let (evaluator, below) = self.build_policy_set(inline, chain)?;
                    (Arc::new(evaluator) as Arc<dyn Decidable>, inline.id.as_str(), below)
                },
                PolicySetChild::PolicyReference(reference) => {
                    let (evaluator, hops) = self.resolve_reference(reference, PolicyKind::Policy, chain)?;
                    (evaluator, reference.id.as_str(), hops)
                },
                PolicySetChild::PolicySetReference(reference) => {
                    let (evaluator, hops) = self.resolve_reference(reference, PolicyKind::PolicySet, chain)?;
                    (evaluator, reference.id.as_str(), hops)
                },
            };
            depth = depth.max(child_depth);
            children.push(
                CombinedElement::new(element).with_parameters(child_parameters(&node.child_parameters, child_id)?),
            );
        }

        let pep_actions = PepActionExpressions::build(&node.obligations, &node.advice, self.factory, &scope)?;
        tracing::debug!("Built policy set '{}' v{} with {} children", node.id, version, children.len());

        let evaluator = PolicyEvaluator::new(
            PolicyRef { kind: PolicyKind::PolicySet, id: node.id.clone(), version },
            target,
            algorithm,
            combiner_parameters(&node.combiner_parameters)?,
            children,
            pep_actions,
        );
        Ok((evaluator, depth))
    }

    /// Resolve one reference hop. Returns the bound reference and the
    /// number of hops from it down to the deepest leaf.
    fn resolve_reference(
        &mut self,
        reference: &ReferenceNode,
        kind: PolicyKind,
        chain: &[String],
    ) -> Result<(Arc<dyn Decidable>, usize)> {
        let constraints = VersionConstraints::parse(
            reference.version.as_deref(),
            reference.earliest_version.as_deref(),
            reference.latest_version.as_deref(),
        )?;

        let mut extended: RefChain = chain.to_vec();
        extended.push(reference.id.clone());
        if kind == PolicyKind::PolicySet && chain.contains(&reference.id) {
            return Err(Error::CircularReference { chain: extended });
        }
        let hops = extended.len() - 1;
        if hops > self.max_depth {
            return Err(Error::ReferenceDepthExceeded { max: self.max_depth, chain: extended });
        }

        let not_found = || Error::PolicyNotFound(format!("{:?} '{}' ({})", kind, reference.id, constraints));
        let (resolved, below) = match kind {
            PolicyKind::Policy => {
                let evaluator = self
                    .policies
                    .get(&reference.id)
                    .and_then(|versions| versions.get_latest(&constraints))
                    .map(|(_, evaluator)| Arc::clone(evaluator))
                    .ok_or_else(not_found)?;
                (evaluator, 0)
            },
            PolicyKind::PolicySet => {
                let (version, node) = self
                    .set_nodes
                    .get(reference.id.as_str())
                    .and_then(|versions| versions.get_latest(&constraints))
                    .map(|(version, node)| (version.clone(), *node))
                    .ok_or_else(not_found)?;
                let (evaluator, below) = self.resolve_policy_set(node, version, &extended)?;
                if hops + below > self.max_depth {
                    return Err(Error::ReferenceDepthExceeded { max: self.max_depth, chain: extended });
                }
                (evaluator, below)
            },
        };

        tracing::trace!("Resolved {:?} reference '{}' to {}", kind, reference.id, resolved.policy_ref());
        Ok((Arc::new(PolicyReferenceEvaluator::new(kind, constraints, resolved)), below + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{PolicyNode, RuleNode};
    use crate::expression::EvaluationContext;
    use crate::function::FunctionRegistry;
    use crate::policy::combining::{policy_combining, rule_combining};
    use crate::policy::decision::Effect;
    use crate::request::Request;

    fn load(document: &PolicyDocument, max_depth: usize) -> Result<PolicyRepository> {
        let factory = ExpressionFactory::new(Arc::new(FunctionRegistry::standard()));
        PolicyRepository::load(document, &factory, &CombiningAlgRegistry::standard(), max_depth)
    }

    fn policy(id: &str, version: &str, effect: Effect) -> PolicyNode {
        PolicyNode::new(id, rule_combining::FIRST_APPLICABLE)
            .with_version(version)
            .with_rule(RuleNode::new("r", effect))
    }

    fn set(id: &str) -> PolicySetNode {
        PolicySetNode::new(id, policy_combining::FIRST_APPLICABLE)
    }

    fn set_ref(id: &str) -> PolicySetChild {
        PolicySetChild::PolicySetReference(ReferenceNode::new(id))
    }

    /// root -> s1 -> s2 -> ... -> s{n} -> policy p
    fn chain_document(n: usize) -> PolicyDocument {
        let mut document = PolicyDocument::new().with_policy(policy("p", "1.0", Effect::Permit));
        document = document.with_policy_set(set("root").with_child(set_ref("s1")));
        for i in 1..=n {
            let child = if i == n {
                PolicySetChild::PolicyReference(ReferenceNode::new("p"))
            } else {
                set_ref(&format!("s{}", i + 1))
            };
            document = document.with_policy_set(set(&format!("s{}", i)).with_child(child));
        }
        document
    }

    #[test]
    fn test_reference_picks_latest_matching_version() {
        let document = PolicyDocument::new()
            .with_policy(policy("p", "1.0", Effect::Deny))
            .with_policy(policy("p", "1.2", Effect::Permit))
            .with_policy(policy("p", "2.0", Effect::Deny))
            .with_policy_set(
                set("root").with_child(PolicySetChild::PolicyReference(ReferenceNode::new("p").with_latest("1.*"))),
            );
        let repository = load(&document, 10).unwrap();
        let root = repository.find_policy("root", PolicyKind::PolicySet, &VersionConstraints::any()).unwrap();
        let result = root.evaluate(&mut EvaluationContext::new(Request::new()), false);
        assert!(result.is_permit());
    }

    #[test]
    fn test_find_policy() {
        let document = PolicyDocument::new()
            .with_policy(policy("p", "1.0", Effect::Deny))
            .with_policy(policy("p", "1.1", Effect::Deny));
        let repository = load(&document, 10).unwrap();
        let found = repository.find_policy("p", PolicyKind::Policy, &VersionConstraints::any()).unwrap();
        assert_eq!(found.version().to_string(), "1.1");
        assert!(repository.find_policy("p", PolicyKind::PolicySet, &VersionConstraints::any()).is_none());
        assert!(repository.find_policy("q", PolicyKind::Policy, &VersionConstraints::any()).is_none());
        assert_eq!(repository.count(PolicyKind::Policy), 2);
        assert_eq!(repository.policy_refs().count(), 2);
    }

    #[test]
    fn test_reference_depth_limit() {
        // root -> s1 -> s2 -> s3 -> p: four hops
        assert!(load(&chain_document(3), 4).is_ok());
        match load(&chain_document(3), 3) {
            Err(Error::ReferenceDepthExceeded { max, chain }) => {
                assert_eq!(max, 3);
                assert_eq!(chain.first().map(String::as_str), Some("root"));
            },
            other => panic!("expected depth error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_depth_checked_for_memoized_sets() {
        // s1 is built from its own top-level entry first, then referenced
        // from a deeper position
        let document = PolicyDocument::new()
            .with_policy(policy("p", "1.0", Effect::Permit))
            .with_policy_set(set("s1").with_child(PolicySetChild::PolicyReference(ReferenceNode::new("p"))))
            .with_policy_set(set("a").with_child(set_ref("b")))
            .with_policy_set(set("b").with_child(set_ref("s1")));
        assert!(load(&document, 3).is_ok());
        assert!(matches!(load(&document, 2), Err(Error::ReferenceDepthExceeded { .. })));
    }

    #[test]
    fn test_circular_reference() {
        let document = PolicyDocument::new()
            .with_policy_set(set("a").with_child(set_ref("b")))
            .with_policy_set(set("b").with_child(set_ref("a")));
        match load(&document, 10) {
            Err(Error::CircularReference { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected cycle error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_self_reference() {
        let document = PolicyDocument::new().with_policy_set(set("a").with_child(set_ref("a")));
        assert!(matches!(load(&document, 10), Err(Error::CircularReference { .. })));
    }

    #[test]
    fn test_unresolved_reference() {
        let document = PolicyDocument::new().with_policy_set(
            set("root").with_child(PolicySetChild::PolicyReference(ReferenceNode::new("p").with_version("3.0"))),
        );
        assert!(matches!(load(&document, 10), Err(Error::PolicyNotFound(_))));
    }

    #[test]
    fn test_duplicate_version() {
        let document = PolicyDocument::new()
            .with_policy(policy("p", "1.0", Effect::Deny))
            .with_policy(policy("p", "1.0", Effect::Permit));
        assert!(matches!(load(&document, 10), Err(Error::DuplicatePolicy { .. })));
    }

    #[test]
    fn test_shared_set_built_once() {
        let document = PolicyDocument::new()
            .with_policy(policy("p", "1.0", Effect::Permit))
            .with_policy_set(set("shared").with_child(PolicySetChild::PolicyReference(ReferenceNode::new("p"))))
            .with_policy_set(set("x").with_child(set_ref("shared")))
            .with_policy_set(set("y").with_child(set_ref("shared")));
        let repository = load(&document, 10).unwrap();
        assert_eq!(repository.count(PolicyKind::PolicySet), 3);

        // held by the repository and by the two references
        let shared = repository.find_policy("shared", PolicyKind::PolicySet, &VersionConstraints::any()).unwrap();
        assert_eq!(Arc::strong_count(&shared), 4);
    }
}
