//! Vendor-specific platform definitions and command syntax.
//!
//! | Name     | Platform       | Loopback source          |
//! |----------|----------------|--------------------------|
//! | `ios`    | Cisco IOS/XE   | interface name           |
//! | `ios_xr` | Cisco IOS-XR   | address read from device |

pub mod ios;
pub mod ios_xr;
