//! Allow/deny address lists.
//!
//! This module provides the building blocks for list-based gating:
//! - [`ListKind`]: which of the two lists an operation targets.
//! - [`Cidr`]: a validated `(ip, mask)` pair; the identity of a list entry.
//! - [`AddressEntry`]: a stored subnet plus its insertion id.
//! - [`store::ListStore`]: exact-pair persistence, in memory or in a database.
//! - [`subnet`]: CIDR containment of an address against a list snapshot.
//!
//! Lookups by the store are always exact-pair; containment is computed by the
//! caller over an ordered snapshot so every backend answers the same way.

use crate::error::ValidationError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod store;
pub mod subnet;

pub use store::{InMemoryListStore, ListStore};

/// Smallest accepted mask.
pub const MIN_MASK: u8 = 1;
/// Largest accepted mask.
pub const MAX_MASK: u8 = 31;

/// The two address lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ListKind {
    /// Addresses that bypass rate limiting.
    #[cfg_attr(feature = "serde", serde(alias = "whitelist"))]
    Allow,
    /// Addresses that are always rejected.
    #[cfg_attr(feature = "serde", serde(alias = "blacklist"))]
    Deny,
}

impl ListKind {
    /// Both lists, allow first.
    pub const ALL: [ListKind; 2] = [ListKind::Allow, ListKind::Deny];

    /// Short lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ListKind::Allow => "allow",
            ListKind::Deny => "deny",
        }
    }

    /// The list an entry must not also appear in.
    pub fn opposite(self) -> Self {
        match self {
            ListKind::Allow => ListKind::Deny,
            ListKind::Deny => ListKind::Allow,
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for list names that are neither allow nor deny.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("bad list type: {0:?}")]
pub struct UnknownList(pub String);

impl FromStr for ListKind {
    type Err = UnknownList;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "whitelist" => Ok(ListKind::Allow),
            "deny" | "blacklist" => Ok(ListKind::Deny),
            _ => Err(UnknownList(s.to_string())),
        }
    }
}

/// Parse a dotted-decimal IPv4 address.
pub fn parse_address(address: &str) -> Result<Ipv4Addr, ValidationError> {
    if address.is_empty() {
        return Err(ValidationError::EmptyAddress);
    }
    address.parse().map_err(|_| ValidationError::MalformedAddress(address.to_string()))
}

/// A validated `(ip, mask)` pair.
///
/// Equality is on the exact pair: `10.0.0.0/8` and `10.1.0.0/8` are different
/// entries even though they describe the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "CidrRepr", into = "CidrRepr"))]
pub struct Cidr {
    ip: Ipv4Addr,
    mask: u8,
}

impl Cidr {
    /// Validate a textual address and mask.
    pub fn new(ip: &str, mask: u8) -> Result<Self, ValidationError> {
        Self::from_parts(parse_address(ip)?, mask)
    }

    /// Validate an already parsed address and mask.
    pub fn from_parts(ip: Ipv4Addr, mask: u8) -> Result<Self, ValidationError> {
        match mask {
            0 => Err(ValidationError::MissingMask),
            MIN_MASK..=MAX_MASK => Ok(Self { ip, mask }),
            provided => Err(ValidationError::MaskOutOfRange { provided }),
        }
    }

    /// Address as stored (not necessarily the network address).
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Prefix length.
    pub fn mask(&self) -> u8 {
        self.mask
    }

    fn netmask(&self) -> u32 {
        u32::MAX.checked_shl(32 - u32::from(self.mask)).unwrap_or(0)
    }

    /// First address of the block.
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) & self.netmask())
    }

    /// CIDR containment.
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        let mask = self.netmask();
        u32::from(address) & mask == u32::from(self.ip) & mask
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.mask)
    }
}

impl FromStr for Cidr {
    type Err = ValidationError;

    /// Parse `ip/mask`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, mask) = s.split_once('/').ok_or(ValidationError::MissingMask)?;
        let mask: u8 =
            mask.trim().parse().map_err(|_| ValidationError::MalformedAddress(s.to_string()))?;
        Self::new(ip.trim(), mask)
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct CidrRepr {
    ip: Ipv4Addr,
    mask: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<CidrRepr> for Cidr {
    type Error = ValidationError;

    fn try_from(raw: CidrRepr) -> Result<Self, Self::Error> {
        Cidr::from_parts(raw.ip, raw.mask)
    }
}

#[cfg(feature = "serde")]
impl From<Cidr> for CidrRepr {
    fn from(cidr: Cidr) -> Self {
        CidrRepr { ip: cidr.ip, mask: cidr.mask }
    }
}

/// A subnet stored in one of the lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AddressEntry {
    /// The exact pair that was added.
    pub subnet: Cidr,
    /// Insertion id, unique within its list and never reused.
    pub id: u64,
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ID: {}, IP: {}]", self.id, self.subnet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_rejects_bad_masks() {
        assert_eq!(Cidr::new("10.0.0.0", 0), Err(ValidationError::MissingMask));
        assert_eq!(
            Cidr::new("10.0.0.0", 32),
            Err(ValidationError::MaskOutOfRange { provided: 32 })
        );
        assert!(Cidr::new("10.0.0.0", 1).is_ok());
        assert!(Cidr::new("10.0.0.0", 31).is_ok());
    }

    #[test]
    fn cidr_rejects_bad_addresses() {
        assert_eq!(Cidr::new("", 8), Err(ValidationError::EmptyAddress));
        assert!(matches!(Cidr::new("10.0.0", 8), Err(ValidationError::MalformedAddress(_))));
        assert!(matches!(Cidr::new("10.0.0.256", 8), Err(ValidationError::MalformedAddress(_))));
        assert!(matches!(Cidr::new("a.b.c.d", 8), Err(ValidationError::MalformedAddress(_))));
    }

    #[test]
    fn containment_uses_prefix_bits() {
        let cidr = Cidr::new("192.168.64.0", 24).unwrap();
        assert!(cidr.contains("192.168.64.0".parse().unwrap()));
        assert!(cidr.contains("192.168.64.255".parse().unwrap()));
        assert!(!cidr.contains("192.168.65.1".parse().unwrap()));

        // host bits in the stored address are ignored
        let cidr = Cidr::new("192.168.64.77", 24).unwrap();
        assert!(cidr.contains("192.168.64.1".parse().unwrap()));
        assert_eq!(cidr.network(), Ipv4Addr::new(192, 168, 64, 0));

        let wide = Cidr::new("128.0.0.0", 1).unwrap();
        assert!(wide.contains("200.1.2.3".parse().unwrap()));
        assert!(!wide.contains("127.255.255.255".parse().unwrap()));
    }

    #[test]
    fn exact_identity_is_not_cidr_equivalence() {
        let a = Cidr::new("10.1.0.0", 8).unwrap();
        let b = Cidr::new("10.0.0.0", 8).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.network(), b.network());
    }

    #[test]
    fn parses_text_forms() {
        let cidr: Cidr = "10.0.0.0/8".parse().unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.0/8");
        assert_eq!("10.0.0.0".parse::<Cidr>(), Err(ValidationError::MissingMask));
        assert!("10.0.0.0/x".parse::<Cidr>().is_err());

        assert_eq!("whitelist".parse::<ListKind>(), Ok(ListKind::Allow));
        assert_eq!("Deny".parse::<ListKind>(), Ok(ListKind::Deny));
        assert!("greylist".parse::<ListKind>().is_err());
        assert_eq!(ListKind::Allow.opposite(), ListKind::Deny);
    }
}
