//! Policy versions and version matching
//!
//! A version is a dot-separated sequence of non-negative integers, ordered
//! component by component. References constrain the version they accept
//! with patterns where `*` stands for any single component and a trailing
//! `+` for any number of further components.

use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyVersion(Vec<u32>);

impl PolicyVersion {
    pub fn parse(s: &str) -> Result<Self> {
        let components = s
            .split('.')
            .map(|c| {
                if c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::Syntax(format!("Invalid policy version '{}'", s)));
                }
                c.parse::<u32>()
                    .map_err(|_| Error::Syntax(format!("Version component out of range in '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(components))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl Default for PolicyVersion {
    fn default() -> Self {
        Self(vec![1, 0])
    }
}

impl FromStr for PolicyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PolicyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl Serialize for PolicyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternComponent {
    Number(u32),
    /// `*`
    Any,
    /// `+`, last component only
    Rest,
}

/// VersionMatch pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPattern {
    source: String,
    components: Vec<PatternComponent>,
}

impl VersionPattern {
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        let mut components = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let component = match *part {
                "*" => PatternComponent::Any,
                "+" if i == parts.len() - 1 => PatternComponent::Rest,
                p if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => PatternComponent::Number(
                    p.parse()
                        .map_err(|_| Error::Syntax(format!("Version component out of range in pattern '{}'", s)))?,
                ),
                _ => return Err(Error::Syntax(format!("Invalid version pattern '{}'", s))),
            };
            components.push(component);
        }
        Ok(Self { source: s.to_string(), components })
    }

    /// Exact match
    pub fn matches(&self, version: &PolicyVersion) -> bool {
        let v = version.components();
        for (i, component) in self.components.iter().enumerate() {
            match component {
                PatternComponent::Rest => return true,
                _ if i >= v.len() => return false,
                PatternComponent::Any => {},
                PatternComponent::Number(n) => {
                    if *n != v[i] {
                        return false;
                    }
                },
            }
        }
        v.len() == self.components.len()
    }

    /// Whether some version matched by this pattern is equal to or later
    /// than `version`
    pub fn is_later_or_matches(&self, version: &PolicyVersion) -> bool {
        let v = version.components();
        for (i, component) in self.components.iter().enumerate() {
            match component {
                PatternComponent::Rest => return true,
                // longer than the version: later
                _ if i >= v.len() => return true,
                PatternComponent::Any => return true,
                PatternComponent::Number(n) => {
                    if *n != v[i] {
                        return *n > v[i];
                    }
                },
            }
        }
        v.len() == self.components.len()
    }

    /// Whether some version matched by this pattern is equal to or earlier
    /// than `version`
    pub fn is_earlier_or_matches(&self, version: &PolicyVersion) -> bool {
        let v = version.components();
        for (i, component) in self.components.iter().enumerate() {
            match component {
                PatternComponent::Rest => return true,
                _ if i >= v.len() => return false,
                // smallest match for `*` is 0
                PatternComponent::Any => {
                    if v[i] > 0 {
                        return true;
                    }
                },
                PatternComponent::Number(n) => {
                    if *n != v[i] {
                        return *n < v[i];
                    }
                },
            }
        }
        true
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Version, EarliestVersion and LatestVersion of a reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionConstraints {
    pub version: Option<VersionPattern>,
    pub earliest: Option<VersionPattern>,
    pub latest: Option<VersionPattern>,
}

impl VersionConstraints {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn parse(version: Option<&str>, earliest: Option<&str>, latest: Option<&str>) -> Result<Self> {
        Ok(Self {
            version: version.map(VersionPattern::parse).transpose()?,
            earliest: earliest.map(VersionPattern::parse).transpose()?,
            latest: latest.map(VersionPattern::parse).transpose()?,
        })
    }

    pub fn accepts(&self, version: &PolicyVersion) -> bool {
        self.version.as_ref().map_or(true, |p| p.matches(version))
            && self.earliest.as_ref().map_or(true, |p| p.is_earlier_or_matches(version))
            && self.latest.as_ref().map_or(true, |p| p.is_later_or_matches(version))
    }
}

impl fmt::Display for VersionConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(v) = &self.version {
            parts.push(format!("Version={}", v));
        }
        if let Some(v) = &self.earliest {
            parts.push(format!("EarliestVersion={}", v));
        }
        if let Some(v) = &self.latest {
            parts.push(format!("LatestVersion={}", v));
        }
        if parts.is_empty() {
            f.write_str("any version")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// All versions of one policy id, latest first
#[derive(Debug, Clone)]
pub struct PolicyVersions<P> {
    versions: BTreeMap<Reverse<PolicyVersion>, P>,
}

impl<P> Default for PolicyVersions<P> {
    fn default() -> Self {
        Self { versions: BTreeMap::new() }
    }
}

impl<P> PolicyVersions<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a version, returning the previous entry for it if any
    pub fn insert(&mut self, version: PolicyVersion, policy: P) -> Option<P> {
        self.versions.insert(Reverse(version), policy)
    }

    pub fn get(&self, version: &PolicyVersion) -> Option<&P> {
        self.versions.get(&Reverse(version.clone()))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Versions from latest to earliest
    pub fn iter(&self) -> impl Iterator<Item = (&PolicyVersion, &P)> {
        self.versions.iter().map(|(Reverse(v), p)| (v, p))
    }

    /// Latest version satisfying all constraints. The scan stops at the
    /// first version earlier than the EarliestVersion bound.
    pub fn get_latest(&self, constraints: &VersionConstraints) -> Option<(&PolicyVersion, &P)> {
        for (version, policy) in self.iter() {
            if let Some(latest) = &constraints.latest {
                if !latest.is_later_or_matches(version) {
                    continue;
                }
            }
            if let Some(earliest) = &constraints.earliest {
                if !earliest.is_earlier_or_matches(version) {
                    return None;
                }
            }
            if let Some(pattern) = &constraints.version {
                if !pattern.matches(version) {
                    continue;
                }
            }
            return Some((version, policy));
        }
        None
    }
}
