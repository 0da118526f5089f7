//! Decision results and PEP actions

use super::version::PolicyVersion;
use crate::status::{IndeterminateError, StatusCode};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Effect of a Rule, and the trigger of an obligation or advice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    pub fn decision(self) -> DecisionKind {
        match self {
            Effect::Permit => DecisionKind::Permit,
            Effect::Deny => DecisionKind::Deny,
        }
    }

    /// The extended Indeterminate a failure of this effect produces
    pub fn indeterminate(self) -> ExtendedIndeterminate {
        match self {
            Effect::Permit => ExtendedIndeterminate::Permit,
            Effect::Deny => ExtendedIndeterminate::Deny,
        }
    }
}

/// Decision kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionKind {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionKind::Permit => "Permit",
            DecisionKind::Deny => "Deny",
            DecisionKind::NotApplicable => "NotApplicable",
            DecisionKind::Indeterminate => "Indeterminate",
        };
        f.write_str(s)
    }
}

/// Which effects an Indeterminate result could have had
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedIndeterminate {
    /// Indeterminate{D}
    Deny,
    /// Indeterminate{P}
    Permit,
    /// Indeterminate{DP}
    DenyPermit,
}

/// Status attached to Indeterminate results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&IndeterminateError> for Status {
    fn from(err: &IndeterminateError) -> Self {
        Self { code: err.status_code(), message: Some(err.message().to_string()) }
    }
}

/// One evaluated AttributeAssignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeAssignment {
    pub attribute_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub value: AttributeValue,
}

/// An obligation or advice ready for the PEP
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PepAction {
    pub id: String,
    pub assignments: Vec<AttributeAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PepActions {
    pub obligations: Vec<PepAction>,
    pub advice: Vec<PepAction>,
}

impl PepActions {
    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    pub fn merge(&mut self, other: PepActions) {
        self.obligations.extend(other.obligations);
        self.advice.extend(other.advice);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PolicyKind {
    Policy,
    PolicySet,
}

/// Identity of a Policy or PolicySet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PolicyRef {
    pub kind: PolicyKind,
    pub id: String,
    pub version: PolicyVersion,
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {} v{}", self.kind, self.id, self.version)
    }
}

/// Result of evaluating a Rule, Policy, PolicySet or the whole PDP
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionResult {
    pub decision: DecisionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_indeterminate: Option<ExtendedIndeterminate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub pep_actions: PepActions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applicable_policies: Vec<PolicyRef>,
}

impl DecisionResult {
    fn new(decision: DecisionKind) -> Self {
        Self {
            decision,
            extended_indeterminate: None,
            status: None,
            pep_actions: PepActions::default(),
            applicable_policies: Vec::new(),
        }
    }

    pub fn permit() -> Self {
        Self::new(DecisionKind::Permit)
    }

    pub fn deny() -> Self {
        Self::new(DecisionKind::Deny)
    }

    pub fn not_applicable() -> Self {
        Self::new(DecisionKind::NotApplicable)
    }

    pub fn from_effect(effect: Effect) -> Self {
        Self::new(effect.decision())
    }

    pub fn indeterminate(extended: ExtendedIndeterminate, error: &IndeterminateError) -> Self {
        Self::indeterminate_with_status(extended, Some(Status::from(error)))
    }

    pub fn indeterminate_with_status(extended: ExtendedIndeterminate, status: Option<Status>) -> Self {
        Self {
            extended_indeterminate: Some(extended),
            status,
            ..Self::new(DecisionKind::Indeterminate)
        }
    }

    pub fn with_pep_actions(mut self, actions: PepActions) -> Self {
        self.pep_actions.merge(actions);
        self
    }

    pub fn is_permit(&self) -> bool {
        self.decision == DecisionKind::Permit
    }

    pub fn is_deny(&self) -> bool {
        self.decision == DecisionKind::Deny
    }

    pub fn is_not_applicable(&self) -> bool {
        self.decision == DecisionKind::NotApplicable
    }

    pub fn is_indeterminate(&self) -> bool {
        self.decision == DecisionKind::Indeterminate
    }

    /// Status code, `ok` unless Indeterminate
    pub fn status_code(&self) -> StatusCode {
        self.status.as_ref().map(|s| s.code).unwrap_or(StatusCode::Ok)
    }

    /// Absorb the PEP actions and applicable policies of another result
    /// with the same decision
    pub fn merge(&mut self, other: DecisionResult) {
        self.pep_actions.merge(other.pep_actions);
        self.applicable_policies.extend(other.applicable_policies);
    }
}
