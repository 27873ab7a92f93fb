//! # Looking Glass
//!
//! Async multi-vendor router command driver for network looking glasses.
//!
//! A looking glass lets outside users run a fixed set of read-only
//! diagnostics on an operator's routers. This crate turns those requests
//! into vendor CLI commands, runs them over SSH or Telnet and hands back
//! the sanitized output.
//!
//! ## Features
//!
//! - Async SSH (via russh) and Telnet sessions with prompt detection
//! - Cisco IOS and IOS-XR command syntax
//! - Per-VRF loopback sourcing for ping and traceroute
//! - Device error classification by vendor pattern
//! - Regex find/replace on output before it leaves the crate
//! - YAML configuration of routers, credentials and limits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use looking_glass::{Config, LookingGlass, Operation, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), looking_glass::Error> {
//!     let glass = LookingGlass::new(Config::load("looking-glass.yaml")?)?;
//!
//!     let query = Query::new(1, Operation::Ping).with_address("192.0.2.1");
//!     let result = glass.run(&query).await?;
//!     println!("{}", result.output);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod glass;
pub mod platform;
pub mod request;
pub mod sanitize;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{Config, Router, Vrf};
pub use driver::{CommandResult, Driver, DriverBuilder, RouterDriver};
pub use error::Error;
pub use glass::{LookingGlass, Query};
pub use platform::{DriverRegistry, Vendor};
pub use request::{AddressFamily, CommandOptions, CommandRequest, Operation};
pub use sanitize::{FindReplaceRule, OutputSanitizer};
