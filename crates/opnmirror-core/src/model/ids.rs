// ── Identity and validated scalar types ──
//
// ServerId, MacAddress, and VlanTag are the building blocks of natural
// keys. Each validates on construction so a value in the mirror is
// always well-formed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

// ── ServerId ────────────────────────────────────────────────────────

/// Stable identifier for a registered appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(Uuid);

impl ServerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::validation("server id", e.to_string()))
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format
/// (`aa:bb:cc:dd:ee:ff`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Parse colon-separated, dash-separated, or bare 12-digit hex.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let raw = raw.as_ref().trim();
        let hex: String = raw
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        let separated = raw.contains(':') || raw.contains('-');
        let groups_ok = !separated || raw.split([':', '-']).all(|g| g.len() == 2);

        if hex.len() != 12 || !groups_ok || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::validation(
                "mac_address",
                format!("'{raw}' is not a MAC address (expected xx:xx:xx:xx:xx:xx)"),
            ));
        }

        let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
        Ok(Self(octets.join(":")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

// ── VlanTag ─────────────────────────────────────────────────────────

/// 802.1Q VLAN identifier, 1-4094.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanTag(u16);

impl VlanTag {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;

    pub fn new(tag: u16) -> Result<Self, CoreError> {
        if (Self::MIN..=Self::MAX).contains(&tag) {
            Ok(Self(tag))
        } else {
            Err(CoreError::validation(
                "vlan_tag",
                format!("{tag} is outside {}-{}", Self::MIN, Self::MAX),
            ))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for VlanTag {
    type Error = CoreError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VlanTag> for u16 {
    fn from(tag: VlanTag) -> Self {
        tag.0
    }
}
