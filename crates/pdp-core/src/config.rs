//! PDP configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Limits and switches applied while loading and evaluating policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdpConfig {
    /// Longest chain of VariableReferences allowed inside one Policy
    pub max_variable_reference_depth: usize,
    /// Longest chain of Policy(Set)IdReferences allowed from the root
    pub max_policy_reference_depth: usize,
    /// When set, a designator without issuer only matches attributes
    /// without issuer
    pub strict_attribute_issuer_match: bool,
    pub constant_folding: bool,
}

impl Default for PdpConfig {
    fn default() -> Self {
        Self {
            max_variable_reference_depth: 10,
            max_policy_reference_depth: 10,
            strict_attribute_issuer_match: false,
            constant_folding: true,
        }
    }
}

impl PdpConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_variable_reference_depth == 0 {
            return Err(Error::Config("max_variable_reference_depth must be at least 1".to_string()));
        }
        if self.max_policy_reference_depth == 0 {
            return Err(Error::Config("max_policy_reference_depth must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_max_variable_reference_depth(mut self, max: usize) -> Self {
        self.max_variable_reference_depth = max;
        self
    }

    pub fn with_max_policy_reference_depth(mut self, max: usize) -> Self {
        self.max_policy_reference_depth = max;
        self
    }

    pub fn with_strict_issuer_match(mut self, strict: bool) -> Self {
        self.strict_attribute_issuer_match = strict;
        self
    }

    pub fn with_constant_folding(mut self, enabled: bool) -> Self {
        self.constant_folding = enabled;
        self
    }
}
