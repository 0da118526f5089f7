//! Typed values and bags
//!
//! Every value an expression produces is a [`Value`]: either a single
//! [`AttributeValue`] of one [`PrimitiveType`], or a [`Bag`] of them.

pub mod bag;
pub mod datatype;
pub mod network;
pub mod temporal;

pub use bag::{Bag, EmptyOrMultiValueError};
pub use datatype::{Datatype, PrimitiveType, XSD_NS};
pub use network::{DnsNameValue, IpAddressValue, PortRange, Rfc822Name, X500Name};
pub use temporal::{DayTimeDuration, XacmlDate, XacmlDateTime, XacmlTime, YearMonthDuration};

use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Narrowing a value to a concrete type failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Type error: expected {expected}, got {actual}")]
pub struct TypeError {
    pub expected: Datatype,
    pub actual: Datatype,
}

impl TypeError {
    pub fn new(expected: impl Into<Datatype>, actual: impl Into<Datatype>) -> Self {
        Self { expected: expected.into(), actual: actual.into() }
    }
}

/// A lexical form could not be parsed as the requested datatype
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {datatype} value '{lexical}': {reason}")]
pub struct ValueParseError {
    pub datatype: PrimitiveType,
    pub lexical: String,
    pub reason: String,
}

/// `xs:anyURI`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnyUri(pub String);

/// `xs:hexBinary`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexBinary(pub Vec<u8>);

/// `xs:base64Binary`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Base64Binary(pub Vec<u8>);

/// `xpathExpression`: an XPath string bound to the category whose Content it addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XPathExpressionValue {
    pub path: String,
    pub category: String,
}

/// A single primitive value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Date(XacmlDate),
    Time(XacmlTime),
    DateTime(XacmlDateTime),
    AnyUri(AnyUri),
    HexBinary(HexBinary),
    Base64Binary(Base64Binary),
    X500Name(X500Name),
    Rfc822Name(Rfc822Name),
    IpAddress(IpAddressValue),
    DnsName(DnsNameValue),
    DayTimeDuration(DayTimeDuration),
    YearMonthDuration(YearMonthDuration),
    XPathExpression(XPathExpressionValue),
}

impl AttributeValue {
    /// Parse a lexical form. `xpathExpression` values need their category,
    /// use [`AttributeValue::parse_xpath_expression`] for those.
    pub fn parse(datatype: PrimitiveType, lexical: &str) -> Result<Self, ValueParseError> {
        let fail = |reason: String| ValueParseError {
            datatype,
            lexical: lexical.to_string(),
            reason,
        };
        let value = match datatype {
            PrimitiveType::String => AttributeValue::String(lexical.to_string()),
            PrimitiveType::Boolean => match lexical.trim() {
                "true" | "1" => AttributeValue::Boolean(true),
                "false" | "0" => AttributeValue::Boolean(false),
                _ => return Err(fail("expected true, false, 1 or 0".to_string())),
            },
            PrimitiveType::Integer => {
                let trimmed = lexical.trim();
                let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
                AttributeValue::Integer(digits.parse::<i64>().map_err(|e| fail(e.to_string()))?)
            },
            PrimitiveType::Double => {
                let parsed = match lexical.trim() {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NaN" => f64::NAN,
                    other => other.parse::<f64>().map_err(|e| fail(e.to_string()))?,
                };
                AttributeValue::Double(parsed)
            },
            PrimitiveType::Date => AttributeValue::Date(XacmlDate::parse(lexical.trim()).map_err(fail)?),
            PrimitiveType::Time => AttributeValue::Time(XacmlTime::parse(lexical.trim()).map_err(fail)?),
            PrimitiveType::DateTime => {
                AttributeValue::DateTime(XacmlDateTime::parse(lexical.trim()).map_err(fail)?)
            },
            PrimitiveType::AnyUri => {
                let trimmed = lexical.trim();
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(fail("whitespace in URI".to_string()));
                }
                AttributeValue::AnyUri(AnyUri(trimmed.to_string()))
            },
            PrimitiveType::HexBinary => AttributeValue::HexBinary(HexBinary(
                hex::decode(lexical.trim()).map_err(|e| fail(e.to_string()))?,
            )),
            PrimitiveType::Base64Binary => AttributeValue::Base64Binary(Base64Binary(
                base64::engine::general_purpose::STANDARD
                    .decode(lexical.trim())
                    .map_err(|e| fail(e.to_string()))?,
            )),
            PrimitiveType::X500Name => AttributeValue::X500Name(X500Name::parse(lexical).map_err(fail)?),
            PrimitiveType::Rfc822Name => {
                AttributeValue::Rfc822Name(Rfc822Name::parse(lexical.trim()).map_err(fail)?)
            },
            PrimitiveType::IpAddress => {
                AttributeValue::IpAddress(IpAddressValue::parse(lexical.trim()).map_err(fail)?)
            },
            PrimitiveType::DnsName => {
                AttributeValue::DnsName(DnsNameValue::parse(lexical.trim()).map_err(fail)?)
            },
            PrimitiveType::DayTimeDuration => AttributeValue::DayTimeDuration(
                DayTimeDuration::parse(lexical.trim()).map_err(fail)?,
            ),
            PrimitiveType::YearMonthDuration => AttributeValue::YearMonthDuration(
                YearMonthDuration::parse(lexical.trim()).map_err(fail)?,
            ),
            PrimitiveType::XPathExpression => {
                return Err(fail("xpathExpression values require an XPath category".to_string()))
            },
        };
        Ok(value)
    }

    /// Parse an `xpathExpression` bound to `category`
    pub fn parse_xpath_expression(lexical: &str, category: &str) -> Result<Self, ValueParseError> {
        if lexical.trim().is_empty() || category.is_empty() {
            return Err(ValueParseError {
                datatype: PrimitiveType::XPathExpression,
                lexical: lexical.to_string(),
                reason: "empty path or category".to_string(),
            });
        }
        Ok(AttributeValue::XPathExpression(XPathExpressionValue {
            path: lexical.trim().to_string(),
            category: category.to_string(),
        }))
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        match self {
            AttributeValue::String(_) => PrimitiveType::String,
            AttributeValue::Boolean(_) => PrimitiveType::Boolean,
            AttributeValue::Integer(_) => PrimitiveType::Integer,
            AttributeValue::Double(_) => PrimitiveType::Double,
            AttributeValue::Date(_) => PrimitiveType::Date,
            AttributeValue::Time(_) => PrimitiveType::Time,
            AttributeValue::DateTime(_) => PrimitiveType::DateTime,
            AttributeValue::AnyUri(_) => PrimitiveType::AnyUri,
            AttributeValue::HexBinary(_) => PrimitiveType::HexBinary,
            AttributeValue::Base64Binary(_) => PrimitiveType::Base64Binary,
            AttributeValue::X500Name(_) => PrimitiveType::X500Name,
            AttributeValue::Rfc822Name(_) => PrimitiveType::Rfc822Name,
            AttributeValue::IpAddress(_) => PrimitiveType::IpAddress,
            AttributeValue::DnsName(_) => PrimitiveType::DnsName,
            AttributeValue::DayTimeDuration(_) => PrimitiveType::DayTimeDuration,
            AttributeValue::YearMonthDuration(_) => PrimitiveType::YearMonthDuration,
            AttributeValue::XPathExpression(_) => PrimitiveType::XPathExpression,
        }
    }

    /// Narrow to a concrete primitive representation
    pub fn cast<T: PrimitiveValue>(&self) -> Result<&T, TypeError> {
        T::cast(self)
    }

    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::String(s.into())
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Double(d) if d.is_infinite() => {
                f.write_str(if *d > 0.0 { "INF" } else { "-INF" })
            },
            AttributeValue::Double(d) if d.is_nan() => f.write_str("NaN"),
            AttributeValue::Double(d) => write!(f, "{}", d),
            AttributeValue::Date(d) => write!(f, "{}", d),
            AttributeValue::Time(t) => write!(f, "{}", t),
            AttributeValue::DateTime(dt) => write!(f, "{}", dt),
            AttributeValue::AnyUri(u) => f.write_str(&u.0),
            AttributeValue::HexBinary(h) => f.write_str(&hex::encode_upper(&h.0)),
            AttributeValue::Base64Binary(b) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(&b.0))
            },
            AttributeValue::X500Name(n) => write!(f, "{}", n),
            AttributeValue::Rfc822Name(n) => write!(f, "{}", n),
            AttributeValue::IpAddress(ip) => write!(f, "{}", ip),
            AttributeValue::DnsName(dns) => write!(f, "{}", dns),
            AttributeValue::DayTimeDuration(d) => write!(f, "{}", d),
            AttributeValue::YearMonthDuration(d) => write!(f, "{}", d),
            AttributeValue::XPathExpression(x) => f.write_str(&x.path),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("datatype", self.primitive_type().id())?;
        map.serialize_entry("value", &self.to_string())?;
        map.end()
    }
}

/// Concrete Rust representation of one primitive datatype
pub trait PrimitiveValue: Sized {
    const TYPE: PrimitiveType;

    fn cast(value: &AttributeValue) -> Result<&Self, TypeError>;

    fn into_value(self) -> AttributeValue;
}

macro_rules! primitive_value {
    ($ty:ty, $variant:ident) => {
        impl PrimitiveValue for $ty {
            const TYPE: PrimitiveType = PrimitiveType::$variant;

            fn cast(value: &AttributeValue) -> Result<&Self, TypeError> {
                match value {
                    AttributeValue::$variant(v) => Ok(v),
                    other => Err(TypeError::new(Self::TYPE, other.primitive_type())),
                }
            }

            fn into_value(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }
        }
    };
}

primitive_value!(String, String);
primitive_value!(bool, Boolean);
primitive_value!(i64, Integer);
primitive_value!(f64, Double);
primitive_value!(XacmlDate, Date);
primitive_value!(XacmlTime, Time);
primitive_value!(XacmlDateTime, DateTime);
primitive_value!(AnyUri, AnyUri);
primitive_value!(HexBinary, HexBinary);
primitive_value!(Base64Binary, Base64Binary);
primitive_value!(X500Name, X500Name);
primitive_value!(Rfc822Name, Rfc822Name);
primitive_value!(IpAddressValue, IpAddress);
primitive_value!(DnsNameValue, DnsName);
primitive_value!(DayTimeDuration, DayTimeDuration);
primitive_value!(YearMonthDuration, YearMonthDuration);
primitive_value!(XPathExpressionValue, XPathExpression);

/// Result of evaluating any expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Primitive(AttributeValue),
    Bag(Bag),
}

impl Value {
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::Primitive(v) => Datatype::Primitive(v.primitive_type()),
            Value::Bag(b) => b.datatype(),
        }
    }

    pub fn as_primitive(&self) -> Result<&AttributeValue, TypeError> {
        match self {
            Value::Primitive(v) => Ok(v),
            Value::Bag(b) => Err(TypeError::new(Datatype::Primitive(b.element_type()), b.datatype())),
        }
    }

    pub fn into_primitive(self) -> Result<AttributeValue, TypeError> {
        match self {
            Value::Primitive(v) => Ok(v),
            Value::Bag(b) => Err(TypeError::new(Datatype::Primitive(b.element_type()), b.datatype())),
        }
    }

    pub fn into_bag(self) -> Result<Bag, TypeError> {
        match self {
            Value::Bag(b) => Ok(b),
            Value::Primitive(v) => {
                Err(TypeError::new(Datatype::Bag(v.primitive_type()), v.primitive_type()))
            },
        }
    }

    /// Narrow a primitive value to its concrete representation
    pub fn cast<T: PrimitiveValue>(&self) -> Result<&T, TypeError> {
        match self {
            Value::Primitive(v) => T::cast(v),
            Value::Bag(b) => Err(TypeError::new(T::TYPE, b.datatype())),
        }
    }
}

impl From<AttributeValue> for Value {
    fn from(v: AttributeValue) -> Self {
        Value::Primitive(v)
    }
}

impl From<Bag> for Value {
    fn from(b: Bag) -> Self {
        Value::Bag(b)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Primitive(AttributeValue::Boolean(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Primitive(AttributeValue::Integer(i))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Primitive(v) => write!(f, "{}", v),
            Value::Bag(b) => write!(f, "{}", b),
        }
    }
}
