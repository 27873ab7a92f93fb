//! Error types for looking-glass.
//!
//! Every failure a request can hit falls in one of four families:
//! validation (local, never touches the network), connection, login and
//! device-reported command failures. Configuration loading has its own
//! family since it happens before any request exists.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for looking-glass operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unsupported request parameters
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The device could not be reached or the session could not be set up
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The device rejected our credentials
    #[error(transparent)]
    Login(#[from] LoginError),

    /// The device accepted the session but failed the command
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The configuration file is unusable
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Status code a boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(ValidationError::CommandDisabled { .. }) => 404,
            Error::Validation(_) => 400,
            Error::Connection(_) | Error::Login(_) | Error::Config(_) => 500,
            Error::Command(_) => 502,
        }
    }

    /// Name of the router involved, if the failure happened on one.
    pub fn router(&self) -> Option<&str> {
        match self {
            Error::Connection(e) => Some(&e.router),
            Error::Login(e) => Some(&e.router),
            Error::Command(e) => Some(&e.router),
            Error::Validation(_) | Error::Config(_) => None,
        }
    }
}

/// Request parameter errors. Always raised before a session is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The vendor has no syntax for this address family
    #[error("Protocol not running: AFI={afi} SAFI={safi}")]
    UnsupportedProtocol { afi: u32, safi: u32 },

    /// The VRF is not configured on the router
    #[error("Invalid vrf table name: {vrf}")]
    UnknownVrf { vrf: String },

    /// The VRF name is not a single safe token
    #[error("Invalid vrf name: {vrf:?}")]
    InvalidVrf { vrf: String },

    /// Requested runtime outside the configured bounds
    #[error("Invalid runtime value: {runtime} (allowed {min}..={max})")]
    RuntimeOutOfRange { runtime: u64, min: u64, max: u64 },

    /// Address is neither an IP, a prefix nor a hostname
    #[error("Unrecognized host or address: {address:?}")]
    InvalidAddress { address: String },

    /// The operation needs an address and none was given
    #[error("Operation '{operation}' requires an address")]
    MissingAddress { operation: String },

    /// Router id does not exist
    #[error("Invalid router id: {id}")]
    UnknownRouter { id: usize },

    /// Router has no driver bound for this format
    #[error("Router '{router}' does not provide format '{format}'")]
    UnknownFormat { router: String, format: String },

    /// No driver registered under this name
    #[error("Unknown driver '{name}'")]
    UnknownDriver { name: String },

    /// The driver exists but cannot produce this format
    #[error("Driver '{driver}' does not support format '{format}'")]
    UnsupportedFormat { driver: String, format: String },

    /// The operation is disabled in configuration
    #[error("Command disabled: {command}")]
    CommandDisabled { command: String },

    /// Unknown operation name
    #[error("Unknown command '{command}'")]
    UnknownCommand { command: String },

    /// A driver was built without a required setting
    #[error("Invalid driver settings: {message}")]
    InvalidSettings { message: String },
}

/// Failure to reach the device or to establish a session with it.
#[derive(Error, Debug)]
#[error("Unable to connect to remote host {router}: {source}")]
pub struct ConnectionError {
    /// Router name (or address when no name is known).
    pub router: String,
    #[source]
    pub source: TransportError,
}

/// Authentication rejected by the device.
#[derive(Error, Debug)]
#[error("Unable to login on remote host {router} as '{user}'")]
pub struct LoginError {
    pub router: String,
    pub user: String,
    /// Device text that revealed the rejection, when there was any.
    pub output: Option<String>,
}

/// The device reported an error for the command, or never finished it.
#[derive(Error, Debug)]
#[error("Command failed on {router}: {kind}")]
pub struct CommandError {
    pub router: String,
    /// Raw device reply (or what was captured before the failure).
    pub output: String,
    pub kind: CommandFailure,
}

/// Why a command was classified as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    /// A vendor error pattern matched the reply
    DeviceError { pattern: String },

    /// No prompt came back within the deadline
    Timeout(Duration),

    /// The reply grew past the configured limit
    OutputLimit(usize),

    /// The loopback interface address could not be read from the device
    LoopbackUnresolved { interface: String },
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandFailure::DeviceError { pattern } => {
                write!(f, "device reported an error (matched {pattern:?})")
            }
            CommandFailure::Timeout(d) => write!(f, "no prompt within {d:?}"),
            CommandFailure::OutputLimit(n) => write!(f, "output exceeded {n} bytes"),
            CommandFailure::LoopbackUnresolved { interface } => {
                write!(f, "no address found on interface {interface}")
            }
        }
    }
}

/// Transport layer errors (TCP, SSH, Telnet).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key is not in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Unable to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    /// YAML syntax or schema mismatch
    #[error("Error while parsing configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Values parse but make no sense together
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Result type alias using looking-glass's Error.
pub type Result<T> = std::result::Result<T, Error>;
