//! Scan configuration: which devices and methods to use, in which order.

use alloc::{string::String, vec::Vec};

use serde::{Deserialize, Serialize};

use crate::IterFlags;

#[cfg(feature = "simple_config")]
pub mod simple;

/// Configuration applied to a [`crate::BootStd`] with [`crate::BootStd::apply_config`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Labels of the devices to scan, in order. Each is a device name or a class name such as
    /// `mmc`, the latter selecting every device of the class by priority.
    ///
    /// If not set, all devices are scanned by priority.
    pub bootdev_order: Option<Vec<String>>,

    /// Names of the methods to try, in order.
    ///
    /// If not set, all methods are tried in registration order.
    pub bootmeth_order: Option<Vec<String>>,

    /// Flags to scan with.
    pub flags: IterFlags,
}
