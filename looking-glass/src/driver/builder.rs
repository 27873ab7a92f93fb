//! Builder for creating router drivers.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use super::router::RouterDriver;
use crate::channel::DEFAULT_MAX_OUTPUT;
use crate::config::{FormatBinding, Router, Vrf};
use crate::error::{Result, ValidationError};
use crate::platform::{DriverRegistry, TEXT_PLAIN};
use crate::sanitize::{FindReplaceRule, OutputSanitizer};
use crate::transport::{HostKeyVerification, TransportConfig, TransportKind};

/// Builder for constructing router drivers.
///
/// # Example
///
/// ```rust,no_run
/// use looking_glass::driver::{Driver, DriverBuilder};
/// use looking_glass::request::CommandOptions;
///
/// # async fn example() -> Result<(), looking_glass::Error> {
/// let driver = DriverBuilder::new("192.0.2.10")
///     .username("lg")
///     .password("secret")
///     .driver("ios")
///     .build()?;
///
/// let result = driver.ping("198.51.100.1", &CommandOptions::default()).await?;
/// println!("{result}");
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    name: Option<String>,
    port: Option<u16>,
    transport: TransportKind,
    username: Option<String>,
    password: Option<SecretString>,
    driver: Option<String>,
    format: String,
    bindings: Vec<FormatBinding>,
    vrfs: Vec<Vrf>,
    sanitizer: Arc<OutputSanitizer>,
    host_key_verification: HostKeyVerification,
    known_hosts: Option<PathBuf>,
    max_output: usize,
    registry: Option<DriverRegistry>,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            name: None,
            port: None,
            transport: TransportKind::default(),
            username: None,
            password: None,
            driver: None,
            format: TEXT_PLAIN.to_string(),
            bindings: Vec::new(),
            vrfs: Vec::new(),
            sanitizer: Arc::default(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts: None,
            max_output: DEFAULT_MAX_OUTPUT,
            registry: None,
        }
    }

    /// Start from a configured router: address, transport, port, VRFs and
    /// format bindings. The driver is picked from the bindings at build
    /// time unless [`driver`](Self::driver) overrides it.
    pub fn for_router(router: &Router) -> Self {
        let mut builder = Self::new(router.address.clone())
            .name(router.name.clone())
            .transport(router.transport)
            .vrfs(router.vrfs.clone());
        builder.port = router.port;
        builder.bindings = router.formats.clone();
        builder
    }

    /// Name used in results and errors (default: the host).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the TCP port (default: the transport's well-known port).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the transport (default: SSH).
    pub fn transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password for authentication.
    pub fn password(mut self, password: impl Into<SecretString>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the driver name (e.g., "ios", "ios_xr").
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the output format (default: `text/plain`).
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// VRFs the router carries, with their loopbacks.
    pub fn vrfs(mut self, vrfs: Vec<Vrf>) -> Self {
        self.vrfs = vrfs;
        self
    }

    /// Compile find/replace rules for the output. Unusable rules are
    /// skipped with a warning.
    pub fn find_replace(mut self, rules: &[FindReplaceRule]) -> Self {
        self.sanitizer = Arc::new(OutputSanitizer::new(rules));
        self
    }

    /// Share an already compiled sanitizer.
    pub fn sanitizer(mut self, sanitizer: Arc<OutputSanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Set the SSH host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set a custom known_hosts file path.
    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    /// Largest reply accepted from one command, in bytes.
    pub fn max_output(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Resolve driver names against `registry` instead of the built-ins.
    pub fn registry(mut self, registry: DriverRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the driver.
    ///
    /// Nothing is connected here; each operation opens its own session.
    pub fn build(self) -> Result<RouterDriver> {
        let name = self.name.unwrap_or_else(|| self.host.clone());

        let username = self.username.ok_or_else(|| missing("username"))?;
        let password = self.password.ok_or_else(|| missing("password"))?;

        let driver = match self.driver {
            Some(driver) => driver,
            None if self.bindings.is_empty() => return Err(missing("driver").into()),
            None => self
                .bindings
                .iter()
                .find(|binding| binding.format == self.format)
                .map(|binding| binding.driver.clone())
                .ok_or_else(|| ValidationError::UnknownFormat {
                    router: name.clone(),
                    format: self.format.clone(),
                })?,
        };

        let vendor = match &self.registry {
            Some(registry) => registry.resolve(&driver, &self.format)?,
            None => DriverRegistry::builtin().resolve(&driver, &self.format)?,
        };

        let mut transport = TransportConfig::new(self.transport, self.host, username, password);
        if let Some(port) = self.port {
            transport.port = port;
        }
        transport.host_key_verification = self.host_key_verification;
        transport.known_hosts_path = self.known_hosts;

        Ok(RouterDriver::new(
            name,
            transport,
            vendor,
            self.format,
            self.vrfs,
            self.sanitizer,
            self.max_output,
        ))
    }
}

fn missing(setting: &str) -> ValidationError {
    ValidationError::InvalidSettings {
        message: format!("{setting} is required"),
    }
}
