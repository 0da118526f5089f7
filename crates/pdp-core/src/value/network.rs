//! Name and network address values

use std::fmt;
use std::net::IpAddr;

/// `x500Name`; equality uses a normalized form (case and spacing around separators ignored)
#[derive(Debug, Clone)]
pub struct X500Name {
    lexical: String,
    normalized: String,
}

impl X500Name {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let trimmed = lexical.trim();
        if trimmed.is_empty() {
            return Err("empty x500Name".to_string());
        }
        let mut rdns = Vec::new();
        for rdn in trimmed.split(',') {
            let (attr, value) = rdn
                .split_once('=')
                .ok_or_else(|| format!("invalid RDN '{}' in x500Name", rdn.trim()))?;
            let (attr, value) = (attr.trim(), value.trim());
            if attr.is_empty() || value.is_empty() {
                return Err(format!("invalid RDN '{}' in x500Name", rdn.trim()));
            }
            rdns.push(format!("{}={}", attr.to_ascii_lowercase(), value.to_lowercase()));
        }
        Ok(Self { lexical: trimmed.to_string(), normalized: rdns.join(",") })
    }

    /// Whether `self` ends with the RDN sequence of `suffix` (x500Name-match)
    pub fn ends_with(&self, suffix: &X500Name) -> bool {
        self.normalized == suffix.normalized
            || self.normalized.ends_with(&format!(",{}", suffix.normalized))
    }
}

impl PartialEq for X500Name {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl fmt::Display for X500Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical)
    }
}

/// `rfc822Name`: local part is case-sensitive, domain part is not
#[derive(Debug, Clone)]
pub struct Rfc822Name {
    local_part: String,
    domain: String,
}

impl Rfc822Name {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (local_part, domain) = lexical
            .split_once('@')
            .ok_or_else(|| format!("rfc822Name without '@': '{}'", lexical))?;
        if local_part.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(format!("invalid rfc822Name '{}'", lexical));
        }
        Ok(Self { local_part: local_part.to_string(), domain: domain.to_string() })
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl PartialEq for Rfc822Name {
    fn eq(&self, other: &Self) -> bool {
        self.local_part == other.local_part && self.domain.eq_ignore_ascii_case(&other.domain)
    }
}

impl fmt::Display for Rfc822Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

/// Optional port range `lower-upper`, either bound may be open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortRange {
    pub lower: Option<u16>,
    pub upper: Option<u16>,
}

impl PortRange {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let parse_port = |s: &str| -> Result<Option<u16>, String> {
            if s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u16>().map(Some).map_err(|_| format!("invalid port '{}'", s))
            }
        };
        let range = match lexical.split_once('-') {
            Some((lower, upper)) => Self { lower: parse_port(lower)?, upper: parse_port(upper)? },
            None => {
                let port = parse_port(lexical)?;
                Self { lower: port, upper: port }
            },
        };
        if let (Some(lower), Some(upper)) = (range.lower, range.upper) {
            if lower > upper {
                return Err(format!("empty port range '{}'", lexical));
            }
        }
        Ok(range)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.lower.map_or(true, |l| port >= l) && self.upper.map_or(true, |u| port <= u)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l == u => write!(f, "{}", l),
            (l, u) => {
                if let Some(l) = l {
                    write!(f, "{}", l)?;
                }
                f.write_str("-")?;
                if let Some(u) = u {
                    write!(f, "{}", u)?;
                }
                Ok(())
            },
        }
    }
}

/// `ipAddress`: `address[/mask][:portrange]`, IPv6 parts in brackets
#[derive(Debug, Clone, PartialEq)]
pub struct IpAddressValue {
    pub address: IpAddr,
    pub mask: Option<IpAddr>,
    pub ports: Option<PortRange>,
}

fn parse_ip(lexical: &str, bracketed: bool) -> Result<(IpAddr, &str), String> {
    if bracketed {
        let inner = lexical.strip_prefix('[').ok_or_else(|| format!("expected '[' in '{}'", lexical))?;
        let end = inner.find(']').ok_or_else(|| format!("unterminated '[' in '{}'", lexical))?;
        let addr = inner[..end].parse::<IpAddr>().map_err(|e| format!("{}: '{}'", e, &inner[..end]))?;
        Ok((addr, &inner[end + 1..]))
    } else {
        let end = lexical.find(['/', ':']).unwrap_or(lexical.len());
        let addr = lexical[..end].parse::<IpAddr>().map_err(|e| format!("{}: '{}'", e, &lexical[..end]))?;
        Ok((addr, &lexical[end..]))
    }
}

impl IpAddressValue {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let ipv6 = lexical.starts_with('[');
        let (address, mut rest) = parse_ip(lexical, ipv6)?;
        let mut mask = None;
        if let Some(after) = rest.strip_prefix('/') {
            let (m, r) = parse_ip(after, ipv6)?;
            if m.is_ipv4() != address.is_ipv4() {
                return Err(format!("mask family differs from address in '{}'", lexical));
            }
            mask = Some(m);
            rest = r;
        }
        let ports = match rest.strip_prefix(':') {
            Some(p) => Some(PortRange::parse(p)?),
            None if rest.is_empty() => None,
            None => return Err(format!("trailing characters in ipAddress '{}'", lexical)),
        };
        Ok(Self { address, mask, ports })
    }
}

impl fmt::Display for IpAddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_addr = |f: &mut fmt::Formatter<'_>, a: &IpAddr| match a {
            IpAddr::V4(v4) => write!(f, "{}", v4),
            IpAddr::V6(v6) => write!(f, "[{}]", v6),
        };
        write_addr(f, &self.address)?;
        if let Some(mask) = &self.mask {
            f.write_str("/")?;
            write_addr(f, mask)?;
        }
        if let Some(ports) = &self.ports {
            write!(f, ":{}", ports)?;
        }
        Ok(())
    }
}

/// `dnsName`: `hostname[:portrange]`, hostname may start with a `*.` wildcard
#[derive(Debug, Clone, PartialEq)]
pub struct DnsNameValue {
    pub host: String,
    pub ports: Option<PortRange>,
}

impl DnsNameValue {
    pub fn parse(lexical: &str) -> Result<Self, String> {
        let (host, ports) = match lexical.split_once(':') {
            Some((h, p)) => (h, Some(PortRange::parse(p)?)),
            None => (lexical, None),
        };
        let labels = host.strip_prefix("*.").unwrap_or(host);
        let valid = !labels.is_empty()
            && labels.split('.').all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !valid && host != "*" {
            return Err(format!("invalid hostname '{}'", host));
        }
        Ok(Self { host: host.to_ascii_lowercase(), ports })
    }
}

impl fmt::Display for DnsNameValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)?;
        if let Some(ports) = &self.ports {
            write!(f, ":{}", ports)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x500_name_normalized_equality() {
        let a = X500Name::parse("CN=Alice, O=Example,C=US").unwrap();
        let b = X500Name::parse("cn=alice,o=example, c=us").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "CN=Alice, O=Example,C=US");

        let org = X500Name::parse("O=Example,C=US").unwrap();
        assert!(a.ends_with(&org));
        assert!(!org.ends_with(&a));
        assert!(X500Name::parse("not-a-name").is_err());
    }

    #[test]
    fn test_rfc822_domain_case_insensitive() {
        let a = Rfc822Name::parse("Anderson@SUN.COM").unwrap();
        let b = Rfc822Name::parse("Anderson@sun.com").unwrap();
        let c = Rfc822Name::parse("anderson@sun.com").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Rfc822Name::parse("no-at-sign").is_err());
    }

    #[test]
    fn test_ipv4_with_mask_and_ports() {
        let ip = IpAddressValue::parse("10.0.0.1/255.255.255.0:80-90").unwrap();
        assert_eq!(ip.address, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert!(ip.mask.is_some());
        let ports = ip.ports.unwrap();
        assert!(ports.contains(85));
        assert!(!ports.contains(91));
        assert_eq!(ip.to_string(), "10.0.0.1/255.255.255.0:80-90");
    }

    #[test]
    fn test_ipv6_bracketed() {
        let ip = IpAddressValue::parse("[::1]:8080").unwrap();
        assert!(ip.address.is_ipv6());
        assert_eq!(ip.ports, Some(PortRange { lower: Some(8080), upper: Some(8080) }));
        assert!(IpAddressValue::parse("::1").is_err());
    }

    #[test]
    fn test_dns_name() {
        let dns = DnsNameValue::parse("*.Example.com:443").unwrap();
        assert_eq!(dns.host, "*.example.com");
        assert_eq!(dns.to_string(), "*.example.com:443");
        assert!(DnsNameValue::parse("bad..host").is_err());
    }

    #[test]
    fn test_open_port_ranges() {
        let r = PortRange::parse("1024-").unwrap();
        assert!(r.contains(65535));
        assert!(!r.contains(80));
        assert_eq!(r.to_string(), "1024-");
        assert!(PortRange::parse("90-80").is_err());
    }
}
