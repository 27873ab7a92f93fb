//! Cisco IOS / IOS-XE.
//!
//! # Prompt Examples
//!
//! ```text
//! router>                 # user exec
//! router#                 # privileged exec
//! core-1.fra(config)#     # configuration (never entered)
//! ```
//!
//! Ping and traceroute accept the loopback interface name as `source`
//! directly.

use crate::error::ValidationError;
use crate::platform::syntax::{CommandSyntax, bgp_family};
use crate::platform::{PlatformDefinition, Vendor};
use crate::request::AddressFamily;

/// IOS exec prompt, user or privileged.
pub const PROMPT: &str = r"^[\w\-+.:/@]+(?:\([^)]+\))?[>#]\s?$";

/// Device errors, in evaluation order.
pub const ERROR_PATTERNS: &[&str] = &[
    r"%Error",
    r"(?i)invalid input",
    r"(?i)(?:incomplete|ambiguous) command",
    r"(?i)connection timed out",
    r"(?i)[^\r\n]+ not found",
    r"(?im)^% Un",
];

/// Create the IOS platform definition.
pub fn platform() -> PlatformDefinition {
    ERROR_PATTERNS
        .iter()
        .fold(PlatformDefinition::new(Vendor::Ios, PROMPT).unwrap(), |p, pattern| {
            p.with_error_pattern(pattern).unwrap()
        })
        .with_on_open_command("terminal length 0")
        .with_on_open_command("terminal width 0")
}

/// IOS command builders.
#[derive(Debug, Clone, Copy, Default)]
pub struct IosSyntax;

impl IosSyntax {
    fn family(family: AddressFamily) -> Result<&'static str, ValidationError> {
        match (family.afi, family.safi) {
            (1, 1) => Ok("ip"),
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

impl CommandSyntax for IosSyntax {
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
            None => format!("show {family} route {address}"),
            Some(vrf) => format!("show {family} route vrf {vrf} {address}"),
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
}
