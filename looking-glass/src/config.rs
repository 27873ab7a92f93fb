//! YAML configuration: credentials, routers and request limits.
//!
//! ```yaml
//! username: lg
//! password: secret
//! runtime: {min: 5, max: 120}
//! commands: [ping, traceroute, show bgp summary]
//! findreplace:
//!   - find: '(?P<pre>\d+\.\d+)\.\d+\.\d+'
//!     replace: '%(pre)s.x.x'
//! routers:
//!   - name: edge1.fra
//!     address: 192.0.2.10
//!     transport: telnet
//!     location: Frankfurt
//!     asn: 64496
//!     vrfs:
//!       - {name: global, loopback: Loopback0}
//!     formats:
//!       - {format: text/plain, driver: ios}
//! ```
//!
//! The configuration is loaded once and shared read-only between requests.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ConfigError, ValidationError};
use crate::platform::DriverRegistry;
use crate::request::{GLOBAL_VRF, Operation, validate_vrf};
use crate::sanitize::FindReplaceRule;
use crate::transport::{HostKeyVerification, TransportKind};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Login used on every router.
    pub username: String,

    #[serde(deserialize_with = "secret_string")]
    pub password: SecretString,

    pub routers: Vec<Router>,

    #[serde(default)]
    pub runtime: RuntimeBounds,

    /// Enabled operations.
    #[serde(default = "all_operations")]
    pub commands: Vec<Operation>,

    /// Output rewriting rules, applied in order.
    #[serde(default)]
    pub findreplace: Vec<FindReplaceRule>,

    #[serde(default)]
    pub ssh: SshSettings,
}

/// One router that can be queried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Router {
    /// User friendly name.
    pub name: String,

    /// Management hostname or address.
    pub address: String,

    #[serde(default)]
    pub transport: TransportKind,

    /// TCP port; the transport's well-known port when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    pub vrfs: Vec<Vrf>,

    /// Output format to driver bindings.
    pub formats: Vec<FormatBinding>,

    /// Physical location, shown to users.
    pub location: String,

    pub asn: u32,
}

impl Router {
    /// Port to connect to.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.transport.default_port())
    }

    /// Look up a VRF by name.
    pub fn vrf(&self, name: &str) -> Option<&Vrf> {
        self.vrfs.iter().find(|vrf| vrf.name == name)
    }

    /// Driver bound to `format`.
    pub fn driver_for(&self, format: &str) -> Option<&str> {
        self.formats
            .iter()
            .find(|binding| binding.format == format)
            .map(|binding| binding.driver.as_str())
    }
}

/// A routing table and the loopback used to source probes from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Vrf {
    pub name: String,
    pub loopback: String,
}

impl Vrf {
    pub fn new(name: impl Into<String>, loopback: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loopback: loopback.into(),
        }
    }
}

/// Media type served by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormatBinding {
    pub format: String,
    pub driver: String,
}

/// Allowed `runtime` values, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeBounds {
    pub min: u64,
    pub max: u64,
}

impl Default for RuntimeBounds {
    fn default() -> Self {
        Self { min: 30, max: 120 }
    }
}

impl RuntimeBounds {
    /// Timeout for a requested runtime.
    ///
    /// `0` means no timeout, and is only reachable when `min` is `0`.
    pub fn timeout_for(&self, runtime: u64) -> Result<Option<Duration>, ValidationError> {
        if runtime < self.min || runtime > self.max {
            return Err(ValidationError::RuntimeOutOfRange {
                runtime,
                min: self.min,
                max: self.max,
            });
        }
        Ok((runtime > 0).then(|| Duration::from_secs(runtime)))
    }
}

/// SSH host key handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshSettings {
    pub host_key_verification: HostKeyVerification,

    /// known_hosts file; `~/.ssh/known_hosts` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<PathBuf>,
}

impl Config {
    /// Read and validate a configuration file against the built-in drivers.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate YAML text against the built-in drivers.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate(&DriverRegistry::builtin())?;
        Ok(config)
    }

    /// Check everything serde cannot: cross-field constraints and that
    /// every driver binding resolves.
    pub fn validate(&self, registry: &DriverRegistry) -> Result<(), ConfigError> {
        if self.routers.is_empty() {
            return Err(invalid("at least one router is required"));
        }
        if self.runtime.min > self.runtime.max {
            return Err(invalid(format!(
                "runtime.min ({}) is greater than runtime.max ({})",
                self.runtime.min, self.runtime.max
            )));
        }

        for (i, router) in self.routers.iter().enumerate() {
            let id = i + 1;
            if router.name.trim().is_empty() {
                return Err(invalid(format!("router #{id} has no name")));
            }
            if router.address.trim().is_empty() {
                return Err(invalid(format!("router '{}' has no address", router.name)));
            }
            if router.asn == 0 {
                return Err(invalid(format!("router '{}': asn must be at least 1", router.name)));
            }
            if router.vrfs.is_empty() {
                return Err(invalid(format!("router '{}' has no vrfs", router.name)));
            }
            if router.formats.is_empty() {
                return Err(invalid(format!("router '{}' has no formats", router.name)));
            }

            if router.vrf(GLOBAL_VRF).is_none() {
                return Err(invalid(format!("router '{}' has no '{GLOBAL_VRF}' vrf", router.name)));
            }

            let mut seen = HashSet::new();
            for vrf in &router.vrfs {
                validate_vrf(&vrf.name)
                    .map_err(|e| invalid(format!("router '{}': {e}", router.name)))?;
                if !seen.insert(vrf.name.as_str()) {
                    return Err(invalid(format!(
                        "router '{}': duplicate vrf '{}'",
                        router.name, vrf.name
                    )));
                }
            }

            for binding in &router.formats {
                registry
                    .resolve(&binding.driver, &binding.format)
                    .map_err(|e| invalid(format!("router '{}': {e}", router.name)))?;
            }
        }

        Ok(())
    }

    /// Router by 1-based id.
    pub fn router(&self, id: usize) -> Result<&Router, ValidationError> {
        id.checked_sub(1)
            .and_then(|index| self.routers.get(index))
            .ok_or(ValidationError::UnknownRouter { id })
    }

    /// Whether an operation is enabled.
    pub fn is_enabled(&self, operation: Operation) -> bool {
        self.commands.contains(&operation)
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

fn all_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const MINIMAL: &str = "
username: lg
password: secret
routers:
  - name: edge1.fra
    address: 192.0.2.10
    location: Frankfurt
    asn: 64496
    vrfs:
      - {name: global, loopback: Loopback0}
    formats:
      - {format: text/plain, driver: ios}
";

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.username, "lg");
        assert_eq!(config.password.expose_secret(), "secret");
        assert_eq!(config.runtime, RuntimeBounds { min: 30, max: 120 });
        assert_eq!(config.commands, Operation::ALL);
        assert!(config.findreplace.is_empty());
        assert_eq!(config.ssh.host_key_verification, HostKeyVerification::AcceptNew);

        let router = config.router(1).unwrap();
        assert_eq!(router.transport, TransportKind::Ssh);
        assert_eq!(router.port(), 22);
        assert_eq!(router.vrf("global").unwrap().loopback, "Loopback0");
        assert_eq!(router.driver_for("text/plain"), Some("ios"));
        assert_eq!(router.driver_for("application/json"), None);
    }

    #[test]
    fn test_full() {
        let yaml = "
username: lg
password: secret
runtime: {min: 0, max: 60}
commands: [ping, show bgp summary]
findreplace:
  - {find: 'secret', replace: '***'}
ssh:
  host_key_verification: strict
  known_hosts: /etc/lg/known_hosts
routers:
  - name: pe1
    address: pe1.example.net
    transport: telnet
    port: 2323
    location: Lab
    asn: 4200000000
    vrfs:
      - {name: global, loopback: Loopback0}
      - {name: CUSTOMER, loopback: Loopback10}
    formats:
      - {format: text/plain, driver: ios_xr}
";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert!(config.is_enabled(Operation::Ping));
        assert!(!config.is_enabled(Operation::Traceroute));
        assert_eq!(config.findreplace.len(), 1);
        assert_eq!(config.ssh.host_key_verification, HostKeyVerification::Strict);

        let router = &config.routers[0];
        assert_eq!(router.transport, TransportKind::Telnet);
        assert_eq!(router.port(), 2323);
        assert_eq!(router.asn, 4_200_000_000);
        assert_eq!(router.vrf("CUSTOMER").unwrap().loopback, "Loopback10");
    }

    #[test]
    fn test_router_ids_are_one_based() {
        let config = Config::from_yaml_str(MINIMAL).unwrap();
        assert!(config.router(1).is_ok());
        assert_eq!(
            config.router(0).unwrap_err(),
            ValidationError::UnknownRouter { id: 0 }
        );
        assert_eq!(
            config.router(2).unwrap_err(),
            ValidationError::UnknownRouter { id: 2 }
        );
    }

    #[test]
    fn test_unknown_driver_rejected_at_load() {
        let yaml = MINIMAL.replace("driver: ios", "driver: junos");
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("junos"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let yaml = format!("{MINIMAL}webpage: html/beagle.html\n");
        assert!(matches!(
            Config::from_yaml_str(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_duplicate_vrf() {
        let yaml = MINIMAL.replace(
            "      - {name: global, loopback: Loopback0}\n",
            "      - {name: global, loopback: Loopback0}\n      - {name: global, loopback: Loopback1}\n",
        );
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate vrf"));
    }

    #[test]
    fn test_global_vrf_required() {
        let yaml = MINIMAL.replace(
            "{name: global, loopback: Loopback0}",
            "{name: CUSTOMER, loopback: Lo10}",
        );
        let err = Config::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("no 'global' vrf"));
    }

    #[test]
    fn test_runtime_bounds() {
        let bounds = RuntimeBounds::default();
        assert_eq!(bounds.timeout_for(30).unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(bounds.timeout_for(120).unwrap(), Some(Duration::from_secs(120)));
        assert_eq!(
            bounds.timeout_for(121),
            Err(ValidationError::RuntimeOutOfRange {
                runtime: 121,
                min: 30,
                max: 120
            })
        );
        assert!(bounds.timeout_for(0).is_err());

        let unbounded = RuntimeBounds { min: 0, max: 60 };
        assert_eq!(unbounded.timeout_for(0).unwrap(), None);

        let yaml = MINIMAL.replace("routers:", "runtime: {min: 60, max: 30}\nrouters:");
        assert!(Config::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_example_file() {
        let config = Config::from_yaml_str(include_str!("../looking-glass.example.yaml")).unwrap();
        assert_eq!(config.routers.len(), 2);
        assert_eq!(config.routers[1].port(), 23);
        assert_eq!(config.routers[1].driver_for("text/plain"), Some("ios_xr"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/looking-glass.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
