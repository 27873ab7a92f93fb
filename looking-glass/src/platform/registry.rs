//! Registry mapping configured driver names to vendors.

use indexmap::IndexMap;

use super::Vendor;
use crate::error::ValidationError;

/// The plain text media type, the one format every built-in vendor speaks.
pub const TEXT_PLAIN: &str = "text/plain";

/// Registry for driver names.
///
/// Resolution failures are configuration mistakes: they are meant to be
/// hit while loading configuration, long before a request is served.
#[derive(Debug, Clone)]
pub struct DriverRegistry {
    drivers: IndexMap<String, Vendor>,
}

impl DriverRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            drivers: IndexMap::new(),
        }
    }

    /// Registry holding every built-in vendor under its own name.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for vendor in Vendor::ALL {
            registry.register(vendor.name(), vendor);
        }
        registry
    }

    /// Register `vendor` under `name`, returning the vendor it replaces.
    pub fn register(&mut self, name: impl Into<String>, vendor: Vendor) -> Option<Vendor> {
        self.drivers.insert(name.into(), vendor)
    }

    /// Look up a driver name.
    pub fn get(&self, name: &str) -> Option<Vendor> {
        self.drivers.get(name).copied()
    }

    /// Resolve a driver name and check it can produce `format`.
    pub fn resolve(&self, name: &str, format: &str) -> Result<Vendor, ValidationError> {
        let vendor = self.get(name).ok_or_else(|| ValidationError::UnknownDriver {
            name: name.to_string(),
        })?;

        if !vendor.formats().contains(&format) {
            return Err(ValidationError::UnsupportedFormat {
                driver: name.to_string(),
                format: format.to_string(),
            });
        }

        Ok(vendor)
    }

    /// Check if a driver name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
