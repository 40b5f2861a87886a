use core::convert::Infallible;

use crate::{Error, boot::Boot};

/// Simple bootload mechanism for Cortex-M without support for TrustZone.
///
/// The image must start with its vector table, aligned to a word.
pub struct SimpleCortexM;

impl Boot for SimpleCortexM {
    unsafe fn boot(image: &[u8]) -> Result<Infallible, Error> {
        // Initial stack pointer and reset vector.
        if image.len() < 8 || image.as_ptr().align_offset(4) != 0 {
            return Err(Error::CannotBoot);
        }
        unsafe { cortex_m::asm::bootload(image.as_ptr() as *const u32) }
    }
}
