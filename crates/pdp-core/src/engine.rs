//! Policy Decision Point
//!
//! The PDP evaluates requests against an immutable [`PolicySnapshot`].
//! Reloading builds a complete new snapshot first and swaps it in
//! atomically, so concurrent evaluations never see a partially loaded
//! policy tree and a failed reload leaves the previous snapshot in place.

use crate::ast::{PolicyDocument, ReferenceCollector};
use crate::config::PdpConfig;
use crate::expression::{AttributeProvider, EvaluationContext, ExpressionFactory, XPathCompiler};
use crate::function::FunctionRegistry;
use crate::policy::{
    CombiningAlgRegistry, Decidable, DecisionResult, PolicyEvaluator, PolicyKind, PolicyRepository,
    VersionConstraints, VersionPattern,
};
use crate::request::Request;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which Policy or PolicySet requests are evaluated against
#[derive(Debug, Clone, Default)]
pub enum RootPolicy {
    /// The single top-level element of the document nothing references
    #[default]
    Auto,
    Reference { kind: PolicyKind, id: String, constraints: VersionConstraints },
}

impl RootPolicy {
    pub fn policy_set(id: impl Into<String>) -> Self {
        RootPolicy::Reference { kind: PolicyKind::PolicySet, id: id.into(), constraints: VersionConstraints::any() }
    }

    pub fn policy(id: impl Into<String>) -> Self {
        RootPolicy::Reference { kind: PolicyKind::Policy, id: id.into(), constraints: VersionConstraints::any() }
    }

    pub fn with_constraints(self, constraints: VersionConstraints) -> Self {
        match self {
            RootPolicy::Auto => RootPolicy::Auto,
            RootPolicy::Reference { kind, id, .. } => RootPolicy::Reference { kind, id, constraints },
        }
    }

    fn select(&self, document: &PolicyDocument, repository: &PolicyRepository) -> Result<Arc<PolicyEvaluator>> {
        let (kind, id, constraints) = match self {
            RootPolicy::Reference { kind, id, constraints } => (*kind, id.clone(), constraints.clone()),
            RootPolicy::Auto => Self::auto_select(document)?,
        };
        repository
            .find_policy(&id, kind, &constraints)
            .ok_or_else(|| Error::PolicyNotFound(format!("root {:?} '{}' ({})", kind, id, constraints)))
    }

    fn auto_select(document: &PolicyDocument) -> Result<(PolicyKind, String, VersionConstraints)> {
        let references = ReferenceCollector::collect(document);
        let exact = |version: &str| -> Result<VersionConstraints> {
            Ok(VersionConstraints { version: Some(VersionPattern::parse(version)?), ..VersionConstraints::any() })
        };

        let sets = references.root_candidates(document);
        if let [root] = sets.as_slice() {
            return Ok((PolicyKind::PolicySet, root.id.clone(), exact(&root.version)?));
        }
        if sets.is_empty() && document.policy_sets.is_empty() {
            let policies: Vec<_> =
                document.policies.iter().filter(|p| !references.policy_refs.contains(&p.id)).collect();
            if let [root] = policies.as_slice() {
                return Ok((PolicyKind::Policy, root.id.clone(), exact(&root.version)?));
            }
        }
        Err(Error::Config(
            "Cannot pick a root policy: the document needs exactly one unreferenced top-level element".to_string(),
        ))
    }
}

/// Immutable state requests are evaluated against
#[derive(Debug)]
pub struct PolicySnapshot {
    /// Version number (monotonically increasing)
    pub version: u64,
    repository: PolicyRepository,
    root: Arc<PolicyEvaluator>,
}

impl PolicySnapshot {
    pub fn repository(&self) -> &PolicyRepository {
        &self.repository
    }

    pub fn root(&self) -> &Arc<PolicyEvaluator> {
        &self.root
    }
}

#[derive(Debug, Default)]
struct PdpStats {
    evaluations: AtomicU64,
    reloads: AtomicU64,
    reload_failures: AtomicU64,
}

/// Snapshot of PDP statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdpStatSnapshot {
    pub evaluations: u64,
    pub reloads: u64,
    pub reload_failures: u64,
    pub current_version: u64,
}

pub struct PdpBuilder {
    config: PdpConfig,
    functions: Option<FunctionRegistry>,
    algorithms: Option<CombiningAlgRegistry>,
    xpath_compiler: Option<Arc<dyn XPathCompiler>>,
    providers: Vec<Arc<dyn AttributeProvider>>,
    root: RootPolicy,
}

impl PdpBuilder {
    pub fn new() -> Self {
        Self {
            config: PdpConfig::default(),
            functions: None,
            algorithms: None,
            xpath_compiler: None,
            providers: Vec::new(),
            root: RootPolicy::Auto,
        }
    }

    pub fn with_config(mut self, config: PdpConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard function set
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Some(functions);
        self
    }

    /// Replace the standard combining algorithms
    pub fn with_algorithms(mut self, algorithms: CombiningAlgRegistry) -> Self {
        self.algorithms = Some(algorithms);
        self
    }

    pub fn with_xpath_compiler(mut self, compiler: Arc<dyn XPathCompiler>) -> Self {
        self.xpath_compiler = Some(compiler);
        self
    }

    /// Providers are queried in registration order for attributes the
    /// request does not carry
    pub fn with_attribute_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_root(mut self, root: RootPolicy) -> Self {
        self.root = root;
        self
    }

    pub fn build(self, document: &PolicyDocument) -> Result<Pdp> {
        self.config.validate()?;
        let functions = Arc::new(self.functions.unwrap_or_else(FunctionRegistry::standard));
        let mut factory = ExpressionFactory::from_config(&self.config, functions);
        if let Some(compiler) = self.xpath_compiler {
            factory = factory.with_xpath_compiler(compiler);
        }

        let algorithms = self.algorithms.unwrap_or_else(CombiningAlgRegistry::standard);
        let snapshot = Pdp::load_snapshot(&self.config, &factory, &algorithms, &self.root, document, 1)?;

        Ok(Pdp {
            config: self.config,
            factory,
            algorithms,
            providers: Arc::from(self.providers),
            root: self.root,
            snapshot: ArcSwap::from_pointee(snapshot),
            stats: PdpStats::default(),
        })
    }
}

impl Default for PdpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Pdp {
    config: PdpConfig,
    factory: ExpressionFactory,
    algorithms: CombiningAlgRegistry,
    providers: Arc<[Arc<dyn AttributeProvider>]>,
    root: RootPolicy,
    snapshot: ArcSwap<PolicySnapshot>,
    stats: PdpStats,
}

impl Pdp {
    pub fn builder() -> PdpBuilder {
        PdpBuilder::new()
    }

    pub fn config(&self) -> &PdpConfig {
        &self.config
    }

    /// Current snapshot
    #[inline]
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot.load_full()
    }

    /// Evaluate one request. Every failure is reported inside the result as
    /// an Indeterminate decision.
    pub fn evaluate(&self, request: Request) -> DecisionResult {
        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        let snapshot = self.snapshot.load();
        let mut ctx = EvaluationContext::new(request)
            .with_providers(Arc::clone(&self.providers))
            .with_strict_issuer(self.config.strict_attribute_issuer_match);
        let result = snapshot.root.evaluate(&mut ctx, false);
        tracing::debug!(
            "Decision {} from {} (snapshot v{})",
            result.decision,
            snapshot.root.policy_ref(),
            snapshot.version
        );
        result
    }

    /// Load a new document and swap it in. On error the current snapshot
    /// stays active.
    pub fn reload(&self, document: &PolicyDocument) -> Result<u64> {
        self.stats.reloads.fetch_add(1, Ordering::Relaxed);
        let version = self.snapshot.load().version + 1;
        match Self::load_snapshot(&self.config, &self.factory, &self.algorithms, &self.root, document, version) {
            Ok(snapshot) => {
                self.snapshot.store(Arc::new(snapshot));
                tracing::info!("Policy snapshot v{} active", version);
                Ok(version)
            },
            Err(e) => {
                self.stats.reload_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Policy reload failed, keeping current snapshot: {}", e);
                Err(e)
            },
        }
    }

    fn load_snapshot(
        config: &PdpConfig,
        factory: &ExpressionFactory,
        algorithms: &CombiningAlgRegistry,
        root: &RootPolicy,
        document: &PolicyDocument,
        version: u64,
    ) -> Result<PolicySnapshot> {
        let repository = PolicyRepository::load(document, factory, algorithms, config.max_policy_reference_depth)?;
        let root = root.select(document, &repository)?;
        tracing::debug!("Root policy is {}", root.policy_ref());
        Ok(PolicySnapshot { version, repository, root })
    }

    pub fn stats(&self) -> PdpStatSnapshot {
        PdpStatSnapshot {
            evaluations: self.stats.evaluations.load(Ordering::Relaxed),
            reloads: self.stats.reloads.load(Ordering::Relaxed),
            reload_failures: self.stats.reload_failures.load(Ordering::Relaxed),
            current_version: self.snapshot.load().version,
        }
    }
}
