//! Datatype identifiers
//!
//! A [`Datatype`] is either a primitive kind or a bag of one primitive kind.
//! Bags are never nested, so `Bag(PrimitiveType)` is the only composite form.

use serde::{Deserialize, Serialize};
use std::fmt;

/// XML Schema namespace used by most standard datatype identifiers
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveType {
    String,
    Boolean,
    Integer,
    Double,
    Date,
    Time,
    DateTime,
    AnyUri,
    HexBinary,
    Base64Binary,
    X500Name,
    Rfc822Name,
    IpAddress,
    DnsName,
    DayTimeDuration,
    YearMonthDuration,
    XPathExpression,
}

impl PrimitiveType {
    /// Every primitive type, in registration order
    pub const ALL: [PrimitiveType; 17] = [
        PrimitiveType::String,
        PrimitiveType::Boolean,
        PrimitiveType::Integer,
        PrimitiveType::Double,
        PrimitiveType::Date,
        PrimitiveType::Time,
        PrimitiveType::DateTime,
        PrimitiveType::AnyUri,
        PrimitiveType::HexBinary,
        PrimitiveType::Base64Binary,
        PrimitiveType::X500Name,
        PrimitiveType::Rfc822Name,
        PrimitiveType::IpAddress,
        PrimitiveType::DnsName,
        PrimitiveType::DayTimeDuration,
        PrimitiveType::YearMonthDuration,
        PrimitiveType::XPathExpression,
    ];

    /// Global identifier of the datatype
    pub fn id(self) -> &'static str {
        match self {
            PrimitiveType::String => "http://www.w3.org/2001/XMLSchema#string",
            PrimitiveType::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            PrimitiveType::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            PrimitiveType::Double => "http://www.w3.org/2001/XMLSchema#double",
            PrimitiveType::Date => "http://www.w3.org/2001/XMLSchema#date",
            PrimitiveType::Time => "http://www.w3.org/2001/XMLSchema#time",
            PrimitiveType::DateTime => "http://www.w3.org/2001/XMLSchema#dateTime",
            PrimitiveType::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            PrimitiveType::HexBinary => "http://www.w3.org/2001/XMLSchema#hexBinary",
            PrimitiveType::Base64Binary => "http://www.w3.org/2001/XMLSchema#base64Binary",
            PrimitiveType::X500Name => "urn:oasis:names:tc:xacml:1.0:data-type:x500Name",
            PrimitiveType::Rfc822Name => "urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name",
            PrimitiveType::IpAddress => "urn:oasis:names:tc:xacml:2.0:data-type:ipAddress",
            PrimitiveType::DnsName => "urn:oasis:names:tc:xacml:2.0:data-type:dnsName",
            PrimitiveType::DayTimeDuration => "http://www.w3.org/2001/XMLSchema#dayTimeDuration",
            PrimitiveType::YearMonthDuration => {
                "http://www.w3.org/2001/XMLSchema#yearMonthDuration"
            },
            PrimitiveType::XPathExpression => {
                "urn:oasis:names:tc:xacml:3.0:data-type:xpathExpression"
            },
        }
    }

    /// Look up a primitive type by its global identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() == id)
    }

    /// Look up by full identifier or by short name (`string`, `dateTime`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::from_id(name).or_else(|| Self::ALL.iter().copied().find(|t| t.short_name() == name))
    }

    /// Short name used to build standard function identifiers (`string-equal`, ...)
    pub fn short_name(self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Double => "double",
            PrimitiveType::Date => "date",
            PrimitiveType::Time => "time",
            PrimitiveType::DateTime => "dateTime",
            PrimitiveType::AnyUri => "anyURI",
            PrimitiveType::HexBinary => "hexBinary",
            PrimitiveType::Base64Binary => "base64Binary",
            PrimitiveType::X500Name => "x500Name",
            PrimitiveType::Rfc822Name => "rfc822Name",
            PrimitiveType::IpAddress => "ipAddress",
            PrimitiveType::DnsName => "dnsName",
            PrimitiveType::DayTimeDuration => "dayTimeDuration",
            PrimitiveType::YearMonthDuration => "yearMonthDuration",
            PrimitiveType::XPathExpression => "xpathExpression",
        }
    }

    /// Namespace prefix of the standard functions operating on this type
    pub fn function_namespace(self) -> &'static str {
        match self {
            PrimitiveType::IpAddress | PrimitiveType::DnsName => {
                "urn:oasis:names:tc:xacml:2.0:function:"
            },
            PrimitiveType::DayTimeDuration
            | PrimitiveType::YearMonthDuration
            | PrimitiveType::XPathExpression => "urn:oasis:names:tc:xacml:3.0:function:",
            _ => "urn:oasis:names:tc:xacml:1.0:function:",
        }
    }

    /// Standard function identifier `<namespace><short-name>-<suffix>`
    pub fn function_id(self, suffix: &str) -> String {
        format!("{}{}-{}", self.function_namespace(), self.short_name(), suffix)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Static type of an expression: a primitive value or a bag of primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Datatype {
    Primitive(PrimitiveType),
    Bag(PrimitiveType),
}

impl Datatype {
    pub const STRING: Datatype = Datatype::Primitive(PrimitiveType::String);
    pub const BOOLEAN: Datatype = Datatype::Primitive(PrimitiveType::Boolean);
    pub const INTEGER: Datatype = Datatype::Primitive(PrimitiveType::Integer);
    pub const DOUBLE: Datatype = Datatype::Primitive(PrimitiveType::Double);

    /// Bag of the given element type
    pub const fn bag_of(element: PrimitiveType) -> Self {
        Datatype::Bag(element)
    }

    pub fn is_bag(self) -> bool {
        matches!(self, Datatype::Bag(_))
    }

    /// The primitive type, or the element type for bags
    pub fn primitive(self) -> PrimitiveType {
        match self {
            Datatype::Primitive(t) | Datatype::Bag(t) => t,
        }
    }
}

impl From<PrimitiveType> for Datatype {
    fn from(t: PrimitiveType) -> Self {
        Datatype::Primitive(t)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datatype::Primitive(t) => write!(f, "{}", t),
            Datatype::Bag(t) => write!(f, "bag<{}>", t),
        }
    }
}
