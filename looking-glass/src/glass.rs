//! Request entry point tying configuration to drivers.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use secrecy::ExposeSecret;

use crate::config::{Config, Router};
use crate::driver::{CommandResult, Driver, DriverBuilder, RouterDriver};
use crate::error::{Result, ValidationError};
use crate::platform::{DriverRegistry, TEXT_PLAIN};
use crate::request::{AddressFamily, CommandOptions, GLOBAL_VRF, Operation, validate_target};
use crate::sanitize::OutputSanitizer;

/// One user query, as it arrives from the outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// 1-based router id.
    pub router: usize,
    pub operation: Operation,
    pub address: Option<String>,
    pub vrf: String,
    pub family: AddressFamily,
    pub loopback: bool,
    /// Requested timeout in seconds, checked against the configured bounds.
    pub runtime: u64,
    pub format: String,
}

impl Query {
    pub fn new(router: usize, operation: Operation) -> Self {
        Self {
            router,
            operation,
            address: None,
            vrf: GLOBAL_VRF.to_string(),
            family: AddressFamily::default(),
            loopback: false,
            runtime: 30,
            format: TEXT_PLAIN.to_string(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

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

    pub fn with_runtime(mut self, runtime: u64) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    fn options(&self, timeout: Option<Duration>) -> CommandOptions {
        CommandOptions::default()
            .with_vrf(self.vrf.clone())
            .with_family(self.family)
            .with_loopback(self.loopback)
            .with_timeout(timeout)
    }
}

/// A configured looking glass.
///
/// Cheap to share behind an `Arc`: it holds no connections, and every
/// [`run`](Self::run) builds a driver that opens its own session.
pub struct LookingGlass {
    config: Config,
    registry: DriverRegistry,
    sanitizer: Arc<OutputSanitizer>,
}

impl LookingGlass {
    /// Wrap a configuration using the built-in drivers.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, DriverRegistry::builtin())
    }

    /// Wrap a configuration, resolving driver names against `registry`.
    pub fn with_registry(config: Config, registry: DriverRegistry) -> Result<Self> {
        config.validate(&registry)?;
        let sanitizer = Arc::new(OutputSanitizer::new(&config.findreplace));
        Ok(Self {
            config,
            registry,
            sanitizer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Router by 1-based id.
    pub fn router(&self, id: usize) -> Result<&Router> {
        Ok(self.config.router(id)?)
    }

    /// Driver for router `id` producing `format`.
    pub fn driver(&self, id: usize, format: &str) -> Result<RouterDriver> {
        let router = self.router(id)?;
        if router.driver_for(format).is_none() {
            return Err(ValidationError::UnknownFormat {
                router: router.name.clone(),
                format: format.to_string(),
            }
            .into());
        }

        let mut builder = DriverBuilder::for_router(router)
            .username(self.config.username.clone())
            .password(self.config.password.expose_secret())
            .format(format)
            .sanitizer(self.sanitizer.clone())
            .host_key_verification(self.config.ssh.host_key_verification)
            .registry(self.registry.clone());
        if let Some(path) = &self.config.ssh.known_hosts {
            builder = builder.known_hosts(path.clone());
        }
        builder.build()
    }

    /// Validate a query and run it.
    ///
    /// Everything that can be checked locally is checked before the router
    /// is contacted.
    pub async fn run(&self, query: &Query) -> Result<CommandResult> {
        if !self.config.is_enabled(query.operation) {
            return Err(ValidationError::CommandDisabled {
                command: query.operation.name().to_string(),
            }
            .into());
        }

        validate_target(query.operation, query.address.as_deref(), &query.vrf)?;
        let timeout = self.config.runtime.timeout_for(query.runtime)?;
        let driver = self.driver(query.router, &query.format)?;

        debug!(
            "query on {}: {} {:?} vrf {}",
            driver.router(),
            query.operation,
            query.address,
            query.vrf
        );

        driver
            .run(query.operation, query.address.as_deref(), &query.options(timeout))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{FakeRouter, PASSWORD, Script, USERNAME};

    fn config(port: u16, extra: &str) -> Config {
        let yaml = format!(
            "
username: {USERNAME}
password: {PASSWORD}
runtime: {{min: 1, max: 10}}
{extra}
routers:
  - name: lab-r1
    address: 127.0.0.1
    transport: telnet
    port: {port}
    location: Lab
    asn: 64496
    vrfs:
      - {{name: global, loopback: Loopback0}}
      - {{name: CUSTOMER, loopback: Lo10}}
    formats:
      - {{format: text/plain, driver: ios}}
"
        );
        Config::from_yaml_str(&yaml).unwrap()
    }

    fn ping() -> Query {
        Query::new(1, Operation::Ping)
            .with_address("192.0.2.1")
            .with_runtime(5)
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let router = FakeRouter::start(
            Script::new("lab-r1#").reply("ping vrf CUSTOMER ip 192.0.2.1 source Lo10", "!!!!!"),
        )
        .await;
        let glass = LookingGlass::new(config(router.port(), "")).unwrap();

        let result = glass
            .run(&ping().with_vrf("CUSTOMER").with_loopback(true))
            .await
            .unwrap();

        assert_eq!(result.router, "lab-r1");
        assert_eq!(result.command, "ping vrf CUSTOMER ip 192.0.2.1 source Lo10");
        assert_eq!(result.output, "!!!!!");
        assert_eq!(result.loopback.as_deref(), Some("Lo10"));
    }

    #[tokio::test]
    async fn test_find_replace_from_config() {
        let router = FakeRouter::start(
            Script::new("lab-r1#").reply("show ip route 192.0.2.1", "Known via \"bgp 64496\""),
        )
        .await;
        let extra = "findreplace:\n  - {find: 'bgp \\d+', replace: 'bgp AS'}";
        let glass = LookingGlass::new(config(router.port(), extra)).unwrap();

        let query = Query::new(1, Operation::ShowRoute)
            .with_address("192.0.2.1")
            .with_runtime(5);
        let result = glass.run(&query).await.unwrap();
        assert_eq!(result.output, "Known via \"bgp AS\"");
    }

    #[tokio::test]
    async fn test_runtime_out_of_range_never_connects() {
        let router = FakeRouter::start(Script::new("lab-r1#")).await;
        let glass = LookingGlass::new(config(router.port(), "")).unwrap();

        let err = glass.run(&ping().with_runtime(11)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::RuntimeOutOfRange { runtime: 11, min: 1, max: 10 })
        ));
        assert_eq!(err.status_code(), 400);
        assert_eq!(router.connections(), 0);
    }

    #[tokio::test]
    async fn test_disabled_command() {
        let router = FakeRouter::start(Script::new("lab-r1#")).await;
        let glass = LookingGlass::new(config(router.port(), "commands: [ping]")).unwrap();

        let query = Query::new(1, Operation::Traceroute)
            .with_address("192.0.2.1")
            .with_runtime(5);
        let err = glass.run(&query).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(router.connections(), 0);
    }

    #[tokio::test]
    async fn test_unknown_router_and_format() {
        let router = FakeRouter::start(Script::new("lab-r1#")).await;
        let glass = LookingGlass::new(config(router.port(), "")).unwrap();

        let err = glass.run(&Query { router: 2, ..ping() }).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownRouter { id: 2 })
        ));

        let err = glass
            .run(&ping().with_format("application/json"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownFormat { .. })
        ));
        assert_eq!(router.connections(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_queries() {
        let router = FakeRouter::start(
            Script::new("lab-r1#")
                .reply("ping ip 192.0.2.1", "!!!!!")
                .reply("traceroute ip 192.0.2.1", " 1 192.0.2.1 1 msec"),
        )
        .await;
        let glass = LookingGlass::new(config(router.port(), "")).unwrap();

        let trace = Query::new(1, Operation::Traceroute)
            .with_address("192.0.2.1")
            .with_runtime(5);
        let ping = ping();
        let (ping, trace) = tokio::join!(glass.run(&ping), glass.run(&trace));

        assert_eq!(ping.unwrap().output, "!!!!!");
        assert_eq!(trace.unwrap().output, " 1 192.0.2.1 1 msec");
        assert_eq!(router.connections(), 2);
    }
}
