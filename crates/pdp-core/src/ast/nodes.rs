//! Policy tree node definitions
//!
//! These are the already-validated nodes an external parser hands to the
//! core. They carry lexical forms and identifiers only; the expression
//! factory and the repository turn them into evaluators.

use crate::policy::Effect;
use serde::{Deserialize, Serialize};

fn default_version() -> String {
    "1.0".to_string()
}

/// An expression in the policy tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpressionNode {
    /// Function application
    Apply {
        function_id: String,
        #[serde(default)]
        args: Vec<ExpressionNode>,
    },

    /// Literal attribute value
    Value {
        datatype: String,
        value: String,
        /// Category an `xpathExpression` literal is bound to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        xpath_category: Option<String>,
    },

    /// Lookup by category and attribute id
    Designator {
        category: String,
        attribute_id: String,
        datatype: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issuer: Option<String>,
        #[serde(default)]
        must_be_present: bool,
    },

    /// Lookup by XPath over the category's Content
    Selector {
        category: String,
        path: String,
        datatype: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_selector_id: Option<String>,
        #[serde(default)]
        must_be_present: bool,
    },

    VariableReference { variable_id: String },

    /// Function passed to a higher-order function
    Function { function_id: String },
}

impl ExpressionNode {
    pub fn apply(function_id: impl Into<String>, args: Vec<ExpressionNode>) -> Self {
        Self::Apply { function_id: function_id.into(), args }
    }

    pub fn value(datatype: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Value { datatype: datatype.into(), value: value.into(), xpath_category: None }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::value("string", value)
    }

    pub fn boolean(value: bool) -> Self {
        Self::value("boolean", value.to_string())
    }

    pub fn integer(value: i64) -> Self {
        Self::value("integer", value.to_string())
    }

    pub fn designator(
        category: impl Into<String>,
        attribute_id: impl Into<String>,
        datatype: impl Into<String>,
        must_be_present: bool,
    ) -> Self {
        Self::Designator {
            category: category.into(),
            attribute_id: attribute_id.into(),
            datatype: datatype.into(),
            issuer: None,
            must_be_present,
        }
    }

    pub fn variable(variable_id: impl Into<String>) -> Self {
        Self::VariableReference { variable_id: variable_id.into() }
    }

    pub fn function(function_id: impl Into<String>) -> Self {
        Self::Function { function_id: function_id.into() }
    }
}

/// Target: conjunction of AnyOf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetNode {
    #[serde(default)]
    pub any_of: Vec<AnyOfNode>,
}

/// Disjunction of AllOf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnyOfNode {
    pub all_of: Vec<AllOfNode>,
}

/// Conjunction of Match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllOfNode {
    pub matches: Vec<MatchNode>,
}

/// Compares a literal against every value of a designator or selector bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNode {
    pub match_id: String,
    /// Must be a `value` expression
    pub value: ExpressionNode,
    /// Must be a `designator` or `selector` expression
    pub attribute: ExpressionNode,
}

impl MatchNode {
    pub fn new(match_id: impl Into<String>, value: ExpressionNode, attribute: ExpressionNode) -> Self {
        Self { match_id: match_id.into(), value, attribute }
    }
}

impl TargetNode {
    /// Target made of a single Match
    pub fn single(m: MatchNode) -> Self {
        Self { any_of: vec![AnyOfNode { all_of: vec![AllOfNode { matches: vec![m] }] }] }
    }

    pub fn is_empty(&self) -> bool {
        self.any_of.is_empty()
    }
}

/// Obligation or advice expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepActionNode {
    pub id: String,
    #[serde(alias = "applies_to")]
    pub fulfill_on: Effect,
    #[serde(default)]
    pub assignments: Vec<AssignmentNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentNode {
    pub attribute_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub expression: ExpressionNode,
}

/// Named combiner parameter with a literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinerParameterNode {
    pub name: String,
    pub datatype: String,
    pub value: String,
}

/// Combiner parameters attached to one child (rule, policy or policy set)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildParametersNode {
    pub child_id: String,
    pub parameters: Vec<CombinerParameterNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleNode {
    pub id: String,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ExpressionNode>,
    #[serde(default)]
    pub obligations: Vec<PepActionNode>,
    #[serde(default)]
    pub advice: Vec<PepActionNode>,
}

impl RuleNode {
    pub fn new(id: impl Into<String>, effect: Effect) -> Self {
        Self {
            id: id.into(),
            effect,
            description: None,
            target: None,
            condition: None,
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: TargetNode) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_condition(mut self, condition: ExpressionNode) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_obligation(mut self, obligation: PepActionNode) -> Self {
        self.obligations.push(obligation);
        self
    }
}

/// Child of a Policy, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyElement {
    Rule(RuleNode),
    VariableDefinition { variable_id: String, expression: ExpressionNode },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyNode {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetNode>,
    pub combining_algorithm: String,
    #[serde(default)]
    pub combiner_parameters: Vec<CombinerParameterNode>,
    #[serde(default)]
    pub child_parameters: Vec<ChildParametersNode>,
    #[serde(default)]
    pub elements: Vec<PolicyElement>,
    #[serde(default)]
    pub obligations: Vec<PepActionNode>,
    #[serde(default)]
    pub advice: Vec<PepActionNode>,
}

impl PolicyNode {
    pub fn new(id: impl Into<String>, combining_algorithm: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            description: None,
            target: None,
            combining_algorithm: combining_algorithm.into(),
            combiner_parameters: Vec::new(),
            child_parameters: Vec::new(),
            elements: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_target(mut self, target: TargetNode) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_rule(mut self, rule: RuleNode) -> Self {
        self.elements.push(PolicyElement::Rule(rule));
        self
    }

    pub fn with_variable(mut self, variable_id: impl Into<String>, expression: ExpressionNode) -> Self {
        self.elements.push(PolicyElement::VariableDefinition { variable_id: variable_id.into(), expression });
        self
    }

    pub fn with_obligation(mut self, obligation: PepActionNode) -> Self {
        self.obligations.push(obligation);
        self
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleNode> {
        self.elements.iter().filter_map(|e| match e {
            PolicyElement::Rule(rule) => Some(rule),
            PolicyElement::VariableDefinition { .. } => None,
        })
    }
}

/// Reference to a Policy or PolicySet by id and version constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

impl ReferenceNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), version: None, earliest_version: None, latest_version: None }
    }

    pub fn with_version(mut self, pattern: impl Into<String>) -> Self {
        self.version = Some(pattern.into());
        self
    }

    pub fn with_earliest(mut self, pattern: impl Into<String>) -> Self {
        self.earliest_version = Some(pattern.into());
        self
    }

    pub fn with_latest(mut self, pattern: impl Into<String>) -> Self {
        self.latest_version = Some(pattern.into());
        self
    }
}

/// Child of a PolicySet, in document order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicySetChild {
    Policy(PolicyNode),
    PolicySet(PolicySetNode),
    PolicyReference(ReferenceNode),
    PolicySetReference(ReferenceNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySetNode {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetNode>,
    pub combining_algorithm: String,
    #[serde(default)]
    pub combiner_parameters: Vec<CombinerParameterNode>,
    #[serde(default)]
    pub child_parameters: Vec<ChildParametersNode>,
    #[serde(default)]
    pub children: Vec<PolicySetChild>,
    #[serde(default)]
    pub obligations: Vec<PepActionNode>,
    #[serde(default)]
    pub advice: Vec<PepActionNode>,
}

impl PolicySetNode {
    pub fn new(id: impl Into<String>, combining_algorithm: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            description: None,
            target: None,
            combining_algorithm: combining_algorithm.into(),
            combiner_parameters: Vec::new(),
            child_parameters: Vec::new(),
            children: Vec::new(),
            obligations: Vec::new(),
            advice: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_target(mut self, target: TargetNode) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_child(mut self, child: PolicySetChild) -> Self {
        self.children.push(child);
        self
    }
}
