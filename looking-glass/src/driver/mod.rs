//! High-level driver for querying routers.
//!
//! A driver is bound to one router and one vendor. Every operation opens
//! its own [`Session`](crate::session::Session), runs the command and closes
//! the session again, so a single driver can serve concurrent requests.

mod builder;
mod result;
mod router;

pub use builder::DriverBuilder;
pub use result::CommandResult;
pub use router::RouterDriver;

use std::future::Future;

use crate::error::{Result, ValidationError};
use crate::request::{CommandOptions, CommandRequest, Operation};

/// Trait for looking glass drivers.
pub trait Driver: Send + Sync {
    /// Ping `address`, optionally sourced from the VRF's loopback.
    fn ping(
        &self,
        address: &str,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<CommandResult>> + Send;

    /// Trace the path to `address`.
    fn traceroute(
        &self,
        address: &str,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<CommandResult>> + Send;

    /// Show the routing table entry for `address`.
    fn show_route(
        &self,
        address: &str,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<CommandResult>> + Send;

    /// Show the BGP table entry for `address`.
    fn show_bgp(
        &self,
        address: &str,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<CommandResult>> + Send;

    /// Show BGP session details for the neighbor at `address`.
    fn show_bgp_neighbors(
        &self,
        address: &str,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<CommandResult>> + Send;

    /// Show the BGP summary table.
    fn show_bgp_summary(
        &self,
        options: &CommandOptions,
    ) -> impl Future<Output = Result<CommandResult>> + Send {
        self.show_bgp("summary", options)
    }

    /// Dispatch a request to the matching operation.
    fn execute(
        &self,
        request: &CommandRequest,
    ) -> impl Future<Output = Result<CommandResult>> + Send {
        async move {
            let options = &request.options;
            if request.operation == Operation::ShowBgpSummary {
                return self.show_bgp_summary(options).await;
            }

            let address = request.address.as_deref().ok_or_else(|| {
                ValidationError::MissingAddress {
                    operation: request.operation.name().to_string(),
                }
            })?;

            match request.operation {
                Operation::Ping => self.ping(address, options).await,
                Operation::Traceroute => self.traceroute(address, options).await,
                Operation::ShowRoute => self.show_route(address, options).await,
                Operation::ShowBgp => self.show_bgp(address, options).await,
                Operation::ShowBgpNeighbors => self.show_bgp_neighbors(address, options).await,
                Operation::ShowBgpSummary => self.show_bgp_summary(options).await,
            }
        }
    }

    /// Router this driver talks to.
    fn router(&self) -> &str;

    /// Media type of the output.
    fn format(&self) -> &str;
}
