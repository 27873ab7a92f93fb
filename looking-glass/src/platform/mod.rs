//! Platform definitions for multi-vendor support.
//!
//! This module holds everything that differs between router operating
//! systems: prompt and login patterns, device error patterns, terminal
//! setup, and the syntax of every diagnostic command. Vendors form a
//! closed set ([`Vendor`]); the [`DriverRegistry`] maps configured driver
//! names onto it.

mod classify;
mod definition;
mod registry;
mod syntax;
pub mod vendors;

pub use classify::ErrorClassifier;
pub use definition::{
    DEFAULT_LOGIN_FAILURES, DEFAULT_PASSWORD_PROMPT, DEFAULT_USERNAME_PROMPT, PlatformDefinition,
};
pub use registry::{DriverRegistry, TEXT_PLAIN};
pub use syntax::{CommandPlan, CommandSyntax, SourceLookup};

use std::fmt;

use vendors::ios::IosSyntax;
use vendors::ios_xr::IosXrSyntax;

/// A supported router operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// Cisco IOS and IOS-XE.
    Ios,
    /// Cisco IOS-XR.
    IosXr,
}

impl Vendor {
    pub const ALL: [Vendor; 2] = [Vendor::Ios, Vendor::IosXr];

    /// Driver name used in configuration.
    pub fn name(self) -> &'static str {
        match self {
            Vendor::Ios => "ios",
            Vendor::IosXr => "ios_xr",
        }
    }

    /// Session behaviour for this vendor.
    pub fn platform(self) -> PlatformDefinition {
        match self {
            Vendor::Ios => vendors::ios::platform(),
            Vendor::IosXr => vendors::ios_xr::platform(),
        }
    }

    /// Command builders for this vendor.
    pub fn syntax(self) -> &'static dyn CommandSyntax {
        match self {
            Vendor::Ios => &IosSyntax,
            Vendor::IosXr => &IosXrSyntax,
        }
    }

    /// Output formats the vendor's driver can produce.
    pub fn formats(self) -> &'static [&'static str] {
        &[TEXT_PLAIN]
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
