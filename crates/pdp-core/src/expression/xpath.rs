//! XPath capability used by attribute selectors
//!
//! The core never parses XML or XPath itself. Content nodes arrive in the
//! request as opaque [`XdmNode`] handles and paths are compiled by an
//! injected [`XPathCompiler`].

use crate::status::IndeterminateError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Kind of a node in the XPath data model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// A node of a Content tree
pub trait XmlNode: fmt::Debug + Send + Sync {
    fn kind(&self) -> NodeKind;

    /// XPath string-value of the node
    fn string_value(&self) -> String;

    /// Downcast support for compiler implementations
    fn as_any(&self) -> &dyn Any;
}

pub type XdmNode = Arc<dyn XmlNode>;

/// One item of an XPath result sequence
#[derive(Debug, Clone)]
pub enum XdmItem {
    /// An atomic value in its lexical form
    Atomic(String),
    Node(XdmNode),
}

/// A compiled XPath expression, reusable across requests
pub trait CompiledXPath: fmt::Debug + Send + Sync {
    fn evaluate(&self, context_node: &XdmNode) -> Result<Vec<XdmItem>, IndeterminateError>;
}

/// Compiles XPath strings
pub trait XPathCompiler: fmt::Debug + Send + Sync {
    fn compile(&self, xpath: &str) -> Result<Arc<dyn CompiledXPath>, IndeterminateError>;
}
