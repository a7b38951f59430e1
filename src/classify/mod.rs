//! Primary and secondary interface classification
//!
//! The primary interface carries the namespace's effective default route. The
//! secondary is the first other eligible interface that can be made reachable
//! on its own, see [`secondary::resolve_secondary`].

use crate::netops::Route;
use ipnetwork::Ipv4Network;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

pub mod primary;
pub mod secondary;

pub use primary::resolve_primary;
pub use secondary::resolve_secondary;

/// How a candidate's address is compared with the primary's for the
/// shared-subnet fallback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubnetMatch {
    /// Equal prefix lengths match, whatever the network bits
    #[default]
    PrefixLength,
    /// Prefix length and network address must both be equal
    Network,
}

impl SubnetMatch {
    pub fn matches(self, primary: Ipv4Network, candidate: Ipv4Network) -> bool {
        match self {
            SubnetMatch::PrefixLength => primary.prefix() == candidate.prefix(),
            SubnetMatch::Network => {
                primary.prefix() == candidate.prefix() && primary.network() == candidate.network()
            }
        }
    }
}

impl FromStr for SubnetMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefix-length" => Ok(SubnetMatch::PrefixLength),
            "network" => Ok(SubnetMatch::Network),
            other => Err(format!(
                "unknown subnet match '{}', expected 'prefix-length' or 'network'",
                other
            )),
        }
    }
}

impl fmt::Display for SubnetMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetMatch::PrefixLength => f.write_str("prefix-length"),
            SubnetMatch::Network => f.write_str("network"),
        }
    }
}

/// Why the secondary interface qualified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualification {
    /// It has an IPv4 address and its own default route
    OwnRoute,
    /// It has an IPv4 address matching the primary's subnet; the primary's
    /// default route is reused for it
    SharedSubnet,
}

/// Result of classifying a namespace. Goes stale if the namespace changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub primary: String,
    pub secondary: String,
    pub address: Ipv4Network,
    pub route: Route,
    pub qualification: Qualification,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn test_prefix_length_match_ignores_network_bits() {
        let rule = SubnetMatch::PrefixLength;
        assert!(rule.matches(v4("10.0.0.5/24"), v4("10.0.1.7/24")));
        assert!(rule.matches(v4("10.0.0.5/24"), v4("192.168.9.9/24")));
        assert!(!rule.matches(v4("10.0.0.5/24"), v4("10.0.0.7/16")));
    }

    #[test]
    fn test_network_match() {
        let rule = SubnetMatch::Network;
        assert!(rule.matches(v4("10.0.0.5/24"), v4("10.0.0.7/24")));
        assert!(!rule.matches(v4("10.0.0.5/24"), v4("10.0.1.7/24")));
        assert!(!rule.matches(v4("10.0.0.5/24"), v4("10.0.0.7/16")));
    }

    #[test]
    fn test_subnet_match_parse() {
        assert_eq!("prefix-length".parse::<SubnetMatch>(), Ok(SubnetMatch::PrefixLength));
        assert_eq!("network".parse::<SubnetMatch>(), Ok(SubnetMatch::Network));
        assert!("subnet".parse::<SubnetMatch>().is_err());
        assert_eq!(SubnetMatch::default().to_string(), "prefix-length");
    }
}
