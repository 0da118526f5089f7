//! JSON policy documents

use super::nodes::{PolicyNode, PolicySetNode};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Every top-level Policy and PolicySet available to the repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: Vec<PolicyNode>,
    #[serde(default)]
    pub policy_sets: Vec<PolicySetNode>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let document = Self::from_reader(std::io::BufReader::new(file))?;
        tracing::debug!(
            "Loaded policy document {}: {} policies, {} policy sets",
            path.as_ref().display(),
            document.policies.len(),
            document.policy_sets.len()
        );
        Ok(document)
    }

    pub fn with_policy(mut self, policy: PolicyNode) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_policy_set(mut self, policy_set: PolicySetNode) -> Self {
        self.policy_sets.push(policy_set);
        self
    }

    /// Merge another document into this one
    pub fn extend(&mut self, other: PolicyDocument) {
        self.policies.extend(other.policies);
        self.policy_sets.extend(other.policy_sets);
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.policy_sets.is_empty()
    }
}
