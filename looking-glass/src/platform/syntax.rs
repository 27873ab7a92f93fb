//! Vendor command syntax.
//!
//! A [`CommandSyntax`] turns an abstract operation into the literal command
//! line a device expects. Building is pure: nothing here performs I/O. When
//! a vendor needs device state to finish a command (the address bound to a
//! loopback interface), the resulting [`CommandPlan`] says which command to
//! run first and the driver completes it on the same session.

use crate::error::ValidationError;
use crate::request::{AddressFamily, Operation};

/// Command text plus any lookup needed before it can be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    /// Command to run, complete unless `source_lookup` is set.
    pub command: String,

    /// Preliminary step resolving the loopback source address.
    pub source_lookup: Option<SourceLookup>,
}

/// Run `command`, parse the source address out of its reply, then append
/// it to the main command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLookup {
    /// Loopback interface being resolved.
    pub interface: String,

    /// Interface status command.
    pub command: String,

    /// Family of the address to extract.
    pub family: AddressFamily,
}

impl CommandPlan {
    fn ready(command: String) -> Self {
        Self {
            command,
            source_lookup: None,
        }
    }

    /// Main command with a resolved source address appended.
    pub fn with_source(&self, source: &str) -> String {
        format!("{} source {}", self.command, source)
    }
}

/// Per-vendor command builders.
///
/// `vrf` is `None` for the global table. Addresses and VRF names are
/// validated before they reach a builder.
pub trait CommandSyntax: Send + Sync {
    fn ping(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError>;

    fn traceroute(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError>;

    fn show_route(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError>;

    fn show_bgp(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError>;

    fn show_bgp_neighbors(
        &self,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError>;

    fn show_bgp_summary(
        &self,
        vrf: Option<&str>,
        family: AddressFamily,
    ) -> Result<String, ValidationError> {
        self.show_bgp("summary", vrf, family)
    }

    /// Command revealing the address bound to `interface`. `None` means the
    /// device accepts the interface name as a source directly.
    fn source_lookup_command(&self, _interface: &str, _family: AddressFamily) -> Option<String> {
        None
    }

    /// Extract the source address from the reply to
    /// [`source_lookup_command`](Self::source_lookup_command).
    fn parse_source_address(&self, _output: &str, _family: AddressFamily) -> Option<String> {
        None
    }

    /// Build the plan for one operation.
    ///
    /// `loopback` is the VRF's loopback interface when the caller asked for
    /// a loopback source; it only affects operations that source traffic.
    fn build(
        &self,
        operation: Operation,
        address: &str,
        vrf: Option<&str>,
        family: AddressFamily,
        loopback: Option<&str>,
    ) -> Result<CommandPlan, ValidationError> {
        let command = match operation {
            Operation::Ping => self.ping(address, vrf, family)?,
            Operation::Traceroute => self.traceroute(address, vrf, family)?,
            Operation::ShowRoute => return self.show_route(address, vrf, family).map(CommandPlan::ready),
            Operation::ShowBgp => return self.show_bgp(address, vrf, family).map(CommandPlan::ready),
            Operation::ShowBgpNeighbors => {
                return self
                    .show_bgp_neighbors(address, vrf, family)
                    .map(CommandPlan::ready);
            }
            Operation::ShowBgpSummary => {
                return self.show_bgp_summary(vrf, family).map(CommandPlan::ready);
            }
        };

        let Some(interface) = loopback else {
            return Ok(CommandPlan::ready(command));
        };

        let plan = match self.source_lookup_command(interface, family) {
            None => CommandPlan::ready(format!("{command} source {interface}")),
            Some(lookup) => CommandPlan {
                command,
                source_lookup: Some(SourceLookup {
                    interface: interface.to_string(),
                    command: lookup,
                    family,
                }),
            },
        };
        Ok(plan)
    }
}

/// BGP address family keywords shared by the Cisco variants.
pub(crate) fn bgp_family(global: bool, family: AddressFamily) -> Result<&'static str, ValidationError> {
    match (global, family.afi, family.safi) {
        (true, 1, 1) => Ok("ipv4 unicast"),
        (true, 2, 1) => Ok("ipv6 unicast"),
        (false, 1, 1) => Ok("vpnv4 unicast"),
        (false, 2, 1) => Ok("vpnv6 unicast"),
        _ => Err(family.unsupported()),
    }
}
