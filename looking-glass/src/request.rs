//! Command requests and their local validation.
//!
//! Everything here runs before a session is opened: a request that fails
//! validation never touches the network.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Name of the default routing table.
pub const GLOBAL_VRF: &str = "global";

/// Default per-command timeout.
pub const DEFAULT_RUNTIME: Duration = Duration::from_secs(30);

/// One of the read-only diagnostic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "traceroute")]
    Traceroute,
    #[serde(rename = "show route")]
    ShowRoute,
    #[serde(rename = "show bgp")]
    ShowBgp,
    #[serde(rename = "show bgp neighbors")]
    ShowBgpNeighbors,
    #[serde(rename = "show bgp summary")]
    ShowBgpSummary,
}

impl Operation {
    /// Every operation, in the order they are listed to users.
    pub const ALL: [Operation; 6] = [
        Operation::Ping,
        Operation::Traceroute,
        Operation::ShowRoute,
        Operation::ShowBgp,
        Operation::ShowBgpNeighbors,
        Operation::ShowBgpSummary,
    ];

    /// User-facing command name.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Ping => "ping",
            Operation::Traceroute => "traceroute",
            Operation::ShowRoute => "show route",
            Operation::ShowBgp => "show bgp",
            Operation::ShowBgpNeighbors => "show bgp neighbors",
            Operation::ShowBgpSummary => "show bgp summary",
        }
    }

    /// Whether the operation takes a target address.
    pub fn requires_address(self) -> bool {
        !matches!(self, Operation::ShowBgpSummary)
    }

    /// Whether the operation sends packets that can be sourced from a loopback.
    pub fn sources_traffic(self) -> bool {
        matches!(self, Operation::Ping | Operation::Traceroute)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = ValidationError;

    /// Accepts the user-facing name (`show bgp summary`) or its
    /// snake_case form (`show_bgp_summary`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', " ");
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == normalized)
            .ok_or_else(|| ValidationError::UnknownCommand {
                command: s.to_string(),
            })
    }
}

/// BGP address family identifiers (AFI/SAFI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressFamily {
    pub afi: u32,
    pub safi: u32,
}

impl AddressFamily {
    /// IPv4 unicast (AFI 1, SAFI 1).
    pub const IPV4_UNICAST: AddressFamily = AddressFamily { afi: 1, safi: 1 };

    /// IPv6 unicast (AFI 2, SAFI 1).
    pub const IPV6_UNICAST: AddressFamily = AddressFamily { afi: 2, safi: 1 };

    pub fn new(afi: u32, safi: u32) -> Self {
        Self { afi, safi }
    }

    /// The "Protocol not running" error for this family.
    pub fn unsupported(self) -> ValidationError {
        ValidationError::UnsupportedProtocol {
            afi: self.afi,
            safi: self.safi,
        }
    }
}

impl Default for AddressFamily {
    fn default() -> Self {
        Self::IPV4_UNICAST
    }
}

/// Per-request knobs shared by every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    /// VRF name; [`GLOBAL_VRF`] selects the default table.
    pub vrf: String,

    /// Address family of the lookup or probe.
    pub family: AddressFamily,

    /// Source ping/traceroute from the VRF's loopback interface.
    pub loopback: bool,

    /// Deadline for each device interaction. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            vrf: GLOBAL_VRF.to_string(),
            family: AddressFamily::default(),
            loopback: false,
            timeout: Some(DEFAULT_RUNTIME),
        }
    }
}

impl CommandOptions {
    pub fn with_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.vrf = vrf.into();
        self
    }

    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the default routing table is selected.
    pub fn is_global(&self) -> bool {
        self.vrf == GLOBAL_VRF
    }

    /// The VRF to qualify commands with, `None` for the global table.
    pub fn vrf_name(&self) -> Option<&str> {
        if self.is_global() {
            None
        } else {
            Some(&self.vrf)
        }
    }
}

/// An operation with its target and options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub operation: Operation,
    pub address: Option<String>,
    pub options: CommandOptions,
}

impl CommandRequest {
    pub fn new(operation: Operation, address: Option<String>) -> Self {
        Self {
            operation,
            address,
            options: CommandOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CommandOptions) -> Self {
        self.options = options;
        self
    }

    /// Check address and VRF syntax.
    ///
    /// `show bgp summary` ignores any address it is given.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_target(self.operation, self.address.as_deref(), &self.options.vrf)
    }
}

/// Check the address and VRF an operation is about to be built with.
pub fn validate_target(
    operation: Operation,
    address: Option<&str>,
    vrf: &str,
) -> Result<(), ValidationError> {
    validate_vrf(vrf)?;

    if !operation.requires_address() {
        return Ok(());
    }

    match address {
        Some(address) => validate_address(address),
        None => Err(ValidationError::MissingAddress {
            operation: operation.name().to_string(),
        }),
    }
}

/// Accept an IP address, an IP prefix (no host bits set) or a DNS hostname.
///
/// Nothing is resolved; this is a syntax check that keeps anything but a
/// single well-formed token out of the command line.
pub fn validate_address(address: &str) -> Result<(), ValidationError> {
    let valid = is_ip_or_prefix(address) || is_hostname(address);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress {
            address: address.to_string(),
        })
    }
}

/// VRF names are a single token of `[A-Za-z0-9_.:-]`.
pub fn validate_vrf(vrf: &str) -> Result<(), ValidationError> {
    let valid = !vrf.is_empty()
        && vrf
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidVrf {
            vrf: vrf.to_string(),
        })
    }
}

fn is_ip_or_prefix(s: &str) -> bool {
    match s.split_once('/') {
        None => s.parse::<IpAddr>().is_ok(),
        Some((addr, len)) => {
            let Ok(addr) = addr.parse::<IpAddr>() else {
                return false;
            };
            let max = if addr.is_ipv4() { 32 } else { 128 };
            if len.starts_with('+') {
                return false;
            }
            len.parse::<u8>()
                .is_ok_and(|len| len <= max && host_bits_clear(addr, len))
        }
    }
}

/// Whether `addr` is the network address of its `/len` prefix.
fn host_bits_clear(addr: IpAddr, len: u8) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            let host = u32::MAX.checked_shr(u32::from(len)).unwrap_or(0);
            u32::from(v4) & host == 0
        }
        IpAddr::V6(v6) => {
            let host = u128::MAX.checked_shr(u32::from(len)).unwrap_or(0);
            u128::from(v6) & host == 0
        }
    }
}

/// RFC 1123 hostname. The last label must not be all digits, which keeps
/// malformed dotted quads like `300.1.1.1` from passing as names.
fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    let labels_ok = s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    });

    labels_ok
        && s.rsplit('.')
            .next()
            .is_some_and(|tld| !tld.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        assert_eq!("show bgp summary".parse::<Operation>().unwrap(), Operation::ShowBgpSummary);
        assert_eq!("show_bgp_neighbors".parse::<Operation>().unwrap(), Operation::ShowBgpNeighbors);
        assert_eq!(Operation::ShowRoute.to_string(), "show route");
        assert!(matches!(
            "reload".parse::<Operation>(),
            Err(ValidationError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn test_operation_serde_names() {
        let ops: Vec<Operation> = serde_yaml::from_str("[ping, show bgp summary]").unwrap();
        assert_eq!(ops, vec![Operation::Ping, Operation::ShowBgpSummary]);
    }

    #[test]
    fn test_default_options() {
        let options = CommandOptions::default();
        assert_eq!(options.vrf, "global");
        assert_eq!(options.family, AddressFamily::new(1, 1));
        assert!(!options.loopback);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert!(options.is_global());
        assert_eq!(options.vrf_name(), None);
        assert_eq!(options.with_vrf("CUSTOMER").vrf_name(), Some("CUSTOMER"));
    }

    #[test]
    fn test_addresses() {
        for ok in [
            "192.0.2.1",
            "2001:db8::1",
            "192.0.2.0/24",
            "192.0.2.1/32",
            "0.0.0.0/0",
            "2001:db8::/32",
            "2001:db8::1/128",
            "example.net",
            "router-1.example.net.",
            "summary",
        ] {
            assert!(validate_address(ok).is_ok(), "{ok} should be accepted");
        }

        for bad in [
            "",
            "192.0.2.0/33",
            "2001:db8::/129",
            "192.0.2.0/+8",
            "192.0.2.1/24",
            "10.1.0.0/8",
            "2001:db8::1/32",
            "300.1.1.1",
            "-bad.example",
            "1.1.1.1; reload",
            "host name",
            "a..b",
        ] {
            assert!(
                matches!(validate_address(bad), Err(ValidationError::InvalidAddress { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_vrf_names() {
        assert!(validate_vrf("global").is_ok());
        assert!(validate_vrf("CUST-A_1:2.3").is_ok());
        assert!(validate_vrf("").is_err());
        assert!(validate_vrf("A B").is_err());
        assert!(validate_vrf("A\nshow run").is_err());
    }

    #[test]
    fn test_request_requires_address() {
        let request = CommandRequest::new(Operation::Ping, None);
        assert_eq!(
            request.validate(),
            Err(ValidationError::MissingAddress {
                operation: "ping".into()
            })
        );

        let summary = CommandRequest::new(Operation::ShowBgpSummary, None);
        assert!(summary.validate().is_ok());

        let bad_vrf = CommandRequest::new(Operation::ShowBgpSummary, None)
            .with_options(CommandOptions::default().with_vrf("a b"));
        assert!(matches!(bad_vrf.validate(), Err(ValidationError::InvalidVrf { .. })));
    }
}
