//! Cisco IOS-XR.
//!
//! # Prompt Examples
//!
//! ```text
//! RP/0/RSP0/CPU0:router#
//! RP/0/RP0/CPU0:pe1.lab(config)#
//! router#
//! ```
//!
//! IOS-XR only takes an IP address as a ping/traceroute source, so the
//! loopback interface is looked up first:
//!
//! ```text
//! RP/0/RSP0/CPU0:router#show ipv4 interface Loopback10
//! Loopback10 is Up, ipv4 protocol is Up
//!   Vrf is CUSTOMER (vrfid 0x60000001)
//!   Internet address is 198.51.100.1/32
//!
//! RP/0/RSP0/CPU0:router#show ipv6 interface Loopback10
//! Loopback10 is Up, ipv6 protocol is Up, Vrfid is CUSTOMER (0x60000001)
//!   IPv6 is enabled, link-local address is fe80::1
//!   Global unicast address(es):
//!     2001:db8::1, subnet is 2001:db8::1/128
//! ```

use crate::error::ValidationError;
use crate::platform::syntax::{CommandSyntax, bgp_family};
use crate::platform::{PlatformDefinition, Vendor};
use crate::request::AddressFamily;

/// Exec prompt, with or without the `RP/<rack>/<slot>/CPU<n>:` location.
pub const PROMPT: &str = r"^(?:RP/\d+/(?:RS?P)?\d+/CPU\d+:)?[\w\-+.:/@]+(?:\([^)]+\))?#\s?$";

/// Device errors, in evaluation order.
pub const ERROR_PATTERNS: &[&str] = &[
    r"%Error",
    r"(?i)invalid input",
    r"(?i)(?:incomplete|ambiguous) command",
    r"(?i)connection timed out",
    r"(?i)[^\r\n]+ not found",
    r"(?im)^% Un",
    r"(?i)bad hostname or protocol",
    r"(?i)unknown getaddrinfo",
];

/// Create the IOS-XR platform definition.
pub fn platform() -> PlatformDefinition {
    ERROR_PATTERNS
        .iter()
        .fold(PlatformDefinition::new(Vendor::IosXr, PROMPT).unwrap(), |p, pattern| {
            p.with_error_pattern(pattern).unwrap()
        })
        .with_on_open_command("terminal exec prompt no-timestamp")
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 0")
}

/// IOS-XR command builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct IosXrSyntax;

impl IosXrSyntax {
    fn family(family: AddressFamily) -> Result<&'static str, ValidationError> {
        match (family.afi, family.safi) {
            (1, 1) => Ok("ipv4"),
            (2, 1) => Ok("ipv6"),
            _ => Err(family.unsupported()),
        }
    }

    fn probe(
        verb: &str,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        let family = Self::family(family)?;
        Ok(match vrf {
            None => format!("{verb} {family} {address}"),
            Some(vrf) => format!("{verb} vrf {vrf} {family} {address}"),
        })
    }
}

impl CommandSyntax for IosXrSyntax {
    fn ping(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        Self::probe("ping", address, vrf, family)
    }

    fn traceroute(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        Self::probe("traceroute", address, vrf, family)
    }

    fn show_route(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        let family = Self::family(family)?;
        Ok(match vrf {
            None => format!("show route {family} {address}"),
            Some(vrf) => format!("show route vrf {vrf} {family} {address}"),
        })
    }

    fn show_bgp(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        let family = bgp_family(vrf.is_none(), family)?;
        Ok(match vrf {
            None => format!("show bgp {family} {address}"),
            Some(vrf) => format!("show bgp {family} vrf {vrf} {address}"),
        })
    }

    fn show_bgp_neighbors(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        let family = bgp_family(vrf.is_none(), family)?;
        Ok(match vrf {
            None => format!("show bgp {family} neighbors {address}"),
            Some(vrf) => format!("show bgp {family} vrf {vrf} neighbors {address}"),
        })
    }

    fn source_lookup_command(&self, interface: &str, family: AddressFamily) -> Option<String> {
        // anything but IPv4 is looked up as IPv6; the family was already
        // checked when the main command was built
        let keyword = if family.afi == 1 { "ipv4" } else { "ipv6" };
        Some(format!("show {keyword} interface {interface}"))
    }

    fn parse_source_address(&self, output: &str, family: AddressFamily) -> Option<String> {
        if family.afi == 1 {
            output.lines().find_map(|line| {
                let prefix = line.trim_start().strip_prefix("Internet address is ")?;
                let addr = prefix.split_whitespace().next()?;
                let addr = addr.split('/').next()?;
                (!addr.is_empty()).then(|| addr.to_string())
            })
        } else {
            output
                .lines()
                .filter(|line| line.contains("subnet is"))
                .find_map(|line| {
                    let addr = line.split(',').next()?.trim();
                    (!addr.is_empty()).then(|| addr.to_string())
                })
        }
    }
}
