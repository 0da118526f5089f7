//! Policy tree builder interface
//!
//! Plain node types describing Policies, PolicySets, Rules, Targets and
//! expressions, as handed over by an external parser. The bundled loader
//! reads them from JSON.

pub mod document;
pub mod nodes;
pub mod visitor;

pub use document::PolicyDocument;
pub use nodes::{
    AllOfNode, AnyOfNode, AssignmentNode, ChildParametersNode, CombinerParameterNode, ExpressionNode,
    MatchNode, PepActionNode, PolicyElement, PolicyNode, PolicySetChild, PolicySetNode, ReferenceNode,
    RuleNode, TargetNode,
};
pub use visitor::{walk_expression, walk_policy, walk_policy_set, ReferenceCollector, Visitor};
