// ── Transport protocol and port specifications ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ── Protocol ────────────────────────────────────────────────────────

/// Transport protocol of a port forward or published container port.
///
/// `TcpUdp` occupies both the tcp and udp port spaces; `Any` occupies
/// every protocol. Anything else the appliance reports is kept verbatim
/// and only overlaps with itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Protocol {
    Tcp,
    Udp,
    TcpUdp,
    Any,
    Other(String),
}

impl Protocol {
    /// Whether two protocols claim a common port space.
    pub fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::TcpUdp, Self::Tcp | Self::Udp | Self::TcpUdp)
            | (Self::Tcp | Self::Udp, Self::TcpUdp) => true,
            (a, b) => a == b,
        }
    }

    /// Wire spelling used by the appliance's NAT rules.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::TcpUdp => "tcp/udp",
            Self::Any => "any",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for Protocol {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Ok(match lower.as_str() {
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            "tcp/udp" | "tcp_udp" | "tcpudp" | "both" => Self::TcpUdp,
            "any" | "" => Self::Any,
            other if other.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                Self::Other(other.to_owned())
            }
            other => {
                return Err(CoreError::validation(
                    "protocol",
                    format!("'{other}' is not a protocol name"),
                ));
            }
        })
    }
}

impl TryFrom<String> for Protocol {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Protocol> for String {
    fn from(p: Protocol) -> Self {
        p.as_wire().to_owned()
    }
}

// ── PortSpec ────────────────────────────────────────────────────────

/// A port, an inclusive port range, an alias name, or "any".
///
/// The appliance accepts aliases in port fields; they are kept as-is and
/// only collide with the same alias name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortSpec {
    Range { start: u16, end: u16 },
    Alias(String),
    Any,
}

impl PortSpec {
    pub fn single(port: u16) -> Result<Self, CoreError> {
        Self::range(port, port)
    }

    pub fn range(start: u16, end: u16) -> Result<Self, CoreError> {
        if start == 0 || end == 0 {
            return Err(CoreError::validation("port", "ports must be 1-65535"));
        }
        if start > end {
            return Err(CoreError::validation(
                "port",
                format!("range {start}-{end} is reversed"),
            ));
        }
        Ok(Self::Range { start, end })
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => true,
            (Self::Range { start: a0, end: a1 }, Self::Range { start: b0, end: b1 }) => {
                a0 <= b1 && b0 <= a1
            }
            (Self::Alias(a), Self::Alias(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { start, end } if start == end => write!(f, "{start}"),
            Self::Range { start, end } => write!(f, "{start}-{end}"),
            Self::Alias(name) => f.write_str(name),
            Self::Any => f.write_str("any"),
        }
    }
}

impl FromStr for PortSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }
        if !s.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(Self::Alias(s.to_owned()));
        }

        let parse = |part: &str| {
            part.trim().parse::<u16>().map_err(|_| {
                CoreError::validation("port", format!("'{s}' is not a port or port range"))
            })
        };
        match s.split_once(['-', ':']) {
            Some((lo, hi)) => Self::range(parse(lo)?, parse(hi)?),
            None => Self::single(parse(s)?),
        }
    }
}

impl TryFrom<String> for PortSpec {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortSpec> for String {
    fn from(p: PortSpec) -> Self {
        p.to_string()
    }
}
