//! Execution of loaded images.
use core::convert::Infallible;

use crate::Error;

#[cfg(feature = "cortex_m")]
pub mod cortex_m;

/// Bootload mechanism that at the least jumps into a loaded image.
///
/// Optionally could drop TrustZone privileges or mask memory access.
pub trait Boot {
    /// Transfer control to `image`, typically starting with the vector table.
    ///
    /// Only returns when the image cannot be booted.
    unsafe fn boot(image: &[u8]) -> Result<Infallible, Error>;
}

/// Refuses to execute anything, for methods that only discover bootflows.
pub struct DiscoverOnly;

impl Boot for DiscoverOnly {
    unsafe fn boot(_image: &[u8]) -> Result<Infallible, Error> {
        Err(Error::Unsupported)
    }
}
