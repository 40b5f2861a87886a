//! Boot source discovery, tailored to firmware that has to find something to boot.
//!
//! A scan walks the cross product of boot devices, partitions and boot methods, trying one
//! combination at a time until a [`Bootflow`] is ready to be executed.
//! Methods vary fastest, then partitions, then devices. Global methods, which are not tied to any
//! device, are tried first and exactly once.
#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

/// Progress line, shown when the scan asked for it.
macro_rules! progress {
    ($flags:expr, $($arg:tt)+) => {
        if $flags.contains($crate::IterFlags::SHOW) {
            log::info!($($arg)+)
        } else {
            log::debug!($($arg)+)
        }
    };
}

pub mod boot;
pub mod bootdev;
pub mod bootflow;
pub mod bootmeth;
pub mod bootstd;
pub mod cmdline;
pub mod config;
pub mod iter;
pub mod scan;

#[cfg(test)]
mod mock;

pub use crate::{
    bootdev::{BootDev, Class, DevId, Priority},
    bootflow::{Bootflow, BootflowState},
    bootmeth::{BootMeth, MethId},
    bootstd::BootStd,
    iter::{BootflowIter, IterFlags},
};

/// Failure classification shared by the device, method and scan layers.
///
/// Some variants are not failures at all but signals steering the scan:
/// [`Error::PartitionsExhausted`] and [`Error::DevicesExhausted`] are consumed by the iterator,
/// and [`Error::Unsupported`] is always skipped silently during discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Error {
    /// The device/method pairing does not apply, or the method cannot execute a bootflow.
    Unsupported,
    /// The device has no further partitions to offer.
    PartitionsExhausted,
    /// No device is left to scan.
    DevicesExhausted,
    /// The bootflow was not fully loaded.
    NotLoaded,
    /// The method tried to boot but cannot boot this particular bootflow.
    CannotBoot,
    /// A handle or argument was not acceptable.
    InvalidArgument,
    /// The requested file, argument or name does not exist.
    NotFound,
    /// The media carries no usable partition table.
    NoPartitionTable,
    /// Media or transport failure.
    Io,
    /// The value contains characters that cannot be represented.
    BadValue,
    /// The file exceeds the size the method accepts.
    TooBig,
    /// Any other failure, with its error number.
    Other(i32),
}

impl Error {
    /// Error number of this error, for diagnostics.
    pub const fn errno(&self) -> i32 {
        match self {
            Self::Unsupported => -38,
            Self::PartitionsExhausted => -108,
            Self::DevicesExhausted => -19,
            Self::NotLoaded => -71,
            Self::CannotBoot => -524,
            Self::InvalidArgument => -22,
            Self::NotFound => -2,
            Self::NoPartitionTable => -93,
            Self::Io => -5,
            Self::BadValue => -9,
            Self::TooBig => -7,
            Self::Other(errno) => *errno,
        }
    }

    /// Whether a failed attempt with this error is worth reporting to a caller asking for all
    /// bootflows. Exhaustion and non-applicability are not.
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::Unsupported | Self::PartitionsExhausted)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unsupported => write!(f, "Function not implemented"),
            Self::PartitionsExhausted => write!(f, "No more partitions"),
            Self::DevicesExhausted => write!(f, "No more bootdevs"),
            Self::NotLoaded => write!(f, "Bootflow not loaded"),
            Self::CannotBoot => write!(f, "Cannot boot this bootflow"),
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::NotFound => write!(f, "No such file or directory"),
            Self::NoPartitionTable => write!(f, "Protocol not supported"),
            Self::Io => write!(f, "I/O error"),
            Self::BadValue => write!(f, "Bad value"),
            Self::TooBig => write!(f, "File too large"),
            Self::Other(errno) => write!(f, "Error {errno}"),
        }
    }
}

/// Tags an error with the call site it passes through, then hands it back.
pub(crate) fn log_ret(tag: &'static str, err: Error) -> Error {
    log::debug!("{tag}: returning err={}", err.errno());
    err
}
