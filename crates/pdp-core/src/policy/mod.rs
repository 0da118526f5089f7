//! Policy evaluation engine
//!
//! Rules, Policies and PolicySets are compiled once from the policy tree into
//! [`Decidable`] evaluators. References between PolicySets are resolved at
//! load time by the [`PolicyRepository`].

pub mod combining;
pub mod decision;
pub mod evaluator;
pub mod pep_action;
pub mod reference;
pub mod repository;
pub mod rule;
pub mod target;
pub mod version;

pub use combining::{CombinedElement, CombinerParameter, CombiningAlgRegistry, CombiningAlgorithm};
pub use decision::{
    AttributeAssignment, DecisionKind, DecisionResult, Effect, ExtendedIndeterminate, PepAction, PepActions,
    PolicyKind, PolicyRef, Status,
};
pub use evaluator::PolicyEvaluator;
pub use reference::PolicyReferenceEvaluator;
pub use repository::PolicyRepository;
pub use rule::RuleEvaluator;
pub use target::Target;
pub use version::{PolicyVersion, PolicyVersions, VersionConstraints, VersionPattern};

use crate::expression::EvaluationContext;
use crate::status::IndeterminateError;
use std::fmt;

/// Something a combining algorithm can combine: a Rule, Policy, PolicySet
/// or reference to one
pub trait Decidable: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    /// Evaluate against the request in `ctx`. With `skip_target` the Target
    /// is assumed to match, as after a successful [`Decidable::is_applicable`].
    fn evaluate(&self, ctx: &mut EvaluationContext, skip_target: bool) -> DecisionResult;

    /// Evaluate the Target only
    fn is_applicable(&self, ctx: &mut EvaluationContext) -> Result<bool, IndeterminateError>;
}
