//! Decision request model
//!
//! A [`Request`] carries the attributes a PEP sends, grouped by category,
//! plus optional per-category Content nodes for attribute selectors.

use crate::expression::xpath::XdmNode;
use crate::value::AttributeValue;
use std::collections::HashMap;

/// Standard XACML 3.0 attribute categories
pub mod category {
    pub const ACCESS_SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    pub const RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    pub const ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    pub const ENVIRONMENT: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";
}

/// Standard attribute identifiers used by the bundled helpers
pub mod attribute {
    pub const SUBJECT_ID: &str = "urn:oasis:names:tc:xacml:1.0:subject:subject-id";
    pub const RESOURCE_ID: &str = "urn:oasis:names:tc:xacml:1.0:resource:resource-id";
    pub const ACTION_ID: &str = "urn:oasis:names:tc:xacml:1.0:action:action-id";
}

/// One named attribute with its values
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAttribute {
    pub id: String,
    pub issuer: Option<String>,
    pub values: Vec<AttributeValue>,
}

/// Complete decision request
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// category -> attributes
    attributes: HashMap<String, Vec<RequestAttribute>>,
    /// category -> Content node
    content: HashMap<String, XdmNode>,
    /// Whether the result should list the applicable policies
    pub return_policy_id_list: bool,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one attribute value with no issuer
    pub fn with_attribute(
        self,
        category: impl Into<String>,
        id: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        self.with_attribute_values(category, id, None, vec![value])
    }

    /// Add one attribute value stamped with an issuer
    pub fn with_issued_attribute(
        self,
        category: impl Into<String>,
        id: impl Into<String>,
        issuer: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        self.with_attribute_values(category, id, Some(issuer.into()), vec![value])
    }

    /// Add values for an attribute; repeated calls for the same
    /// (id, issuer) append to the existing values
    pub fn with_attribute_values(
        mut self,
        category: impl Into<String>,
        id: impl Into<String>,
        issuer: Option<String>,
        values: Vec<AttributeValue>,
    ) -> Self {
        self.add_attribute(category, id, issuer, values);
        self
    }

    pub fn add_attribute(
        &mut self,
        category: impl Into<String>,
        id: impl Into<String>,
        issuer: Option<String>,
        values: Vec<AttributeValue>,
    ) {
        let id = id.into();
        let attrs = self.attributes.entry(category.into()).or_default();
        match attrs.iter_mut().find(|a| a.id == id && a.issuer == issuer) {
            Some(existing) => existing.values.extend(values),
            None => attrs.push(RequestAttribute { id, issuer, values }),
        }
    }

    /// Attach the Content node for a category
    pub fn with_content(mut self, category: impl Into<String>, node: XdmNode) -> Self {
        self.content.insert(category.into(), node);
        self
    }

    pub fn with_policy_id_list(mut self, enabled: bool) -> Self {
        self.return_policy_id_list = enabled;
        self
    }

    pub fn attributes(&self, category: &str) -> &[RequestAttribute] {
        self.attributes.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn content(&self, category: &str) -> Option<&XdmNode> {
        self.content.get(category)
    }

    /// Values of every attribute matching `category`/`id`/`issuer`.
    ///
    /// With `issuer = None`, attributes from any issuer match unless
    /// `strict_issuer` is set, in which case only unissued attributes do.
    /// Returns `None` when no attribute with that identity exists.
    pub fn find_values(
        &self,
        category: &str,
        id: &str,
        issuer: Option<&str>,
        strict_issuer: bool,
    ) -> Option<Vec<&AttributeValue>> {
        let mut found = false;
        let mut values = Vec::new();
        for attr in self.attributes(category).iter().filter(|a| a.id == id) {
            let issuer_ok = match (issuer, attr.issuer.as_deref()) {
                (Some(wanted), Some(actual)) => wanted == actual,
                (Some(_), None) => false,
                (None, Some(_)) => !strict_issuer,
                (None, None) => true,
            };
            if issuer_ok {
                found = true;
                values.extend(attr.values.iter());
            }
        }
        found.then_some(values)
    }
}
