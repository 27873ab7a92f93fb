//! Driver bound to one configured router.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use super::result::CommandResult;
use super::Driver;
use crate::config::Vrf;
use crate::error::{CommandError, CommandFailure, Error, Result, ValidationError};
use crate::platform::{CommandPlan, PlatformDefinition, SourceLookup, Vendor};
use crate::request::{CommandOptions, Operation, validate_target};
use crate::sanitize::OutputSanitizer;
use crate::session::Session;
use crate::transport::TransportConfig;

/// Runs diagnostic operations against one router.
///
/// Holds no connection: each operation opens a fresh session and closes it
/// before returning, whatever the outcome. Use
/// [`DriverBuilder`](super::DriverBuilder) to create one.
pub struct RouterDriver {
    /// Router name used in results, errors and logs.
    name: String,

    transport: TransportConfig,
    vendor: Vendor,
    platform: PlatformDefinition,
    format: String,
    vrfs: Vec<Vrf>,
    sanitizer: Arc<OutputSanitizer>,
    max_output: usize,
}

impl RouterDriver {
    pub(super) fn new(
        name: String,
        transport: TransportConfig,
        vendor: Vendor,
        format: String,
        vrfs: Vec<Vrf>,
        sanitizer: Arc<OutputSanitizer>,
        max_output: usize,
    ) -> Self {
        Self {
            name,
            transport,
            platform: vendor.platform(),
            vendor,
            format,
            vrfs,
            sanitizer,
            max_output,
        }
    }

    /// Vendor whose syntax this driver speaks.
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// VRFs configured on the router.
    pub fn vrfs(&self) -> &[Vrf] {
        &self.vrfs
    }

    /// Connection settings.
    pub fn transport_config(&self) -> &TransportConfig {
        &self.transport
    }

    /// Build the command for `operation` without running it.
    ///
    /// Fails with the same validation errors [`run`](Self::run) would,
    /// and never touches the network.
    pub fn plan(
        &self,
        operation: Operation,
        address: Option<&str>,
        options: &CommandOptions,
    ) -> std::result::Result<CommandPlan, ValidationError> {
        self.prepare(operation, address, options).map(|(plan, _)| plan)
    }

    /// Run one operation on a fresh session.
    pub async fn run(
        &self,
        operation: Operation,
        address: Option<&str>,
        options: &CommandOptions,
    ) -> Result<CommandResult> {
        let (plan, loopback) = self.prepare(operation, address, options)?;

        let started = Instant::now();
        let mut session = Session::open(
            self.name.as_str(),
            &self.transport,
            self.platform.clone(),
            options.timeout,
            self.max_output,
        )
        .await?;

        let outcome = self.run_plan(&mut session, &plan).await;
        session.close().await;
        let (command, output) = outcome?;

        let elapsed = started.elapsed();
        info!(
            "{}: {operation} {:?} ({} bytes in {:.2}s)",
            self.name,
            command,
            output.len(),
            elapsed.as_secs_f64()
        );

        Ok(CommandResult {
            router: self.name.clone(),
            format: self.format.clone(),
            command,
            output: self.sanitizer.apply(&output),
            elapsed,
            loopback: loopback.map(str::to_string),
        })
    }

    fn prepare(
        &self,
        operation: Operation,
        address: Option<&str>,
        options: &CommandOptions,
    ) -> std::result::Result<(CommandPlan, Option<&str>), ValidationError> {
        validate_target(operation, address, &options.vrf)?;
        let loopback = self.loopback_for(operation, options)?;
        let plan = self.vendor.syntax().build(
            operation,
            address.unwrap_or_default(),
            options.vrf_name(),
            options.family,
            loopback,
        )?;
        Ok((plan, loopback))
    }

    /// Loopback interface to source from, when the operation sends probes
    /// and the caller asked for one.
    fn loopback_for(
        &self,
        operation: Operation,
        options: &CommandOptions,
    ) -> std::result::Result<Option<&str>, ValidationError> {
        if !(operation.sources_traffic() && options.loopback) {
            return Ok(None);
        }
        self.vrfs
            .iter()
            .find(|vrf| vrf.name == options.vrf)
            .map(|vrf| Some(vrf.loopback.as_str()))
            .ok_or_else(|| ValidationError::UnknownVrf {
                vrf: options.vrf.clone(),
            })
    }

    /// Send the planned command, resolving the source address first when
    /// the plan needs it. Returns the command actually sent and its output.
    async fn run_plan(&self, session: &mut Session, plan: &CommandPlan) -> Result<(String, String)> {
        let command = match &plan.source_lookup {
            None => plan.command.clone(),
            Some(lookup) => {
                let source = self.resolve_source(session, lookup).await?;
                plan.with_source(&source)
            }
        };

        let output = session.execute(&command).await?;
        Ok((command, output))
    }

    async fn resolve_source(&self, session: &mut Session, lookup: &SourceLookup) -> Result<String> {
        let output = match session.execute(&lookup.command).await {
            Ok(output) => output,
            Err(Error::Command(CommandError {
                output,
                kind: CommandFailure::DeviceError { .. },
                ..
            })) => return Err(self.unresolved(lookup, output)),
            Err(e) => return Err(e),
        };

        match self.vendor.syntax().parse_source_address(&output, lookup.family) {
            Some(address) => {
                debug!("{}: {} has address {address}", self.name, lookup.interface);
                Ok(address)
            }
            None => Err(self.unresolved(lookup, output)),
        }
    }

    fn unresolved(&self, lookup: &SourceLookup, output: String) -> Error {
        CommandError {
            router: self.name.clone(),
            output,
            kind: CommandFailure::LoopbackUnresolved {
                interface: lookup.interface.clone(),
            },
        }
        .into()
    }
}

impl Driver for RouterDriver {
    async fn ping(&self, address: &str, options: &CommandOptions) -> Result<CommandResult> {
        self.run(Operation::Ping, Some(address), options).await
    }

    async fn traceroute(&self, address: &str, options: &CommandOptions) -> Result<CommandResult> {
        self.run(Operation::Traceroute, Some(address), options).await
    }

    async fn show_route(&self, address: &str, options: &CommandOptions) -> Result<CommandResult> {
        self.run(Operation::ShowRoute, Some(address), options).await
    }

    async fn show_bgp(&self, address: &str, options: &CommandOptions) -> Result<CommandResult> {
        self.run(Operation::ShowBgp, Some(address), options).await
    }

    async fn show_bgp_neighbors(
        &self,
        address: &str,
        options: &CommandOptions,
    ) -> Result<CommandResult> {
        self.run(Operation::ShowBgpNeighbors, Some(address), options).await
    }

    async fn show_bgp_summary(&self, options: &CommandOptions) -> Result<CommandResult> {
        self.run(Operation::ShowBgpSummary, None, options).await
    }

    fn router(&self) -> &str {
        &self.name
    }

    fn format(&self) -> &str {
        &self.format
    }
}

impl std::fmt::Debug for RouterDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterDriver")
            .field("name", &self.name)
            .field("transport", &self.transport)
            .field("vendor", &self.vendor)
            .field("format", &self.format)
            .field("vrfs", &self.vrfs)
            .finish()
    }
}
