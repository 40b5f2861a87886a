//! The bootflow record: one discovered or attempted boot candidate.

use alloc::{format, string::String, vec::Vec};

use serde::{Deserialize, Serialize};

use crate::{
    DevId, Error, MethId,
    cmdline::{self, ArgValue},
};

/// Progress of a bootflow, in increasing order of completeness.
///
/// Anything short of [`BootflowState::Ready`] handed back to a caller is a partial attempt, and the
/// state tells how far it got.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BootflowState {
    /// Just created.
    #[default]
    Base,
    /// The owning device is present.
    Media,
    /// Partition selected and valid.
    Part,
    /// Filesystem recognised on that partition.
    Fs,
    /// Boot file located and its size is known.
    File,
    /// File contents loaded into the buffer, ready to execute.
    Ready,
}

impl BootflowState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Media => "media",
            Self::Part => "part",
            Self::Fs => "fs",
            Self::File => "file",
            Self::Ready => "ready",
        }
    }
}

impl core::fmt::Display for BootflowState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A boot candidate: device, partition and method, plus whatever was located on the way.
///
/// The device and method are handles into the [`crate::BootStd`] registry; a bootflow never
/// owns them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bootflow {
    /// Name, derived from the device and partition.
    pub name: String,
    /// Device this was found on, `None` for global methods.
    pub dev: Option<DevId>,
    /// Method that produced it.
    pub method: Option<MethId>,
    /// Partition number, 0 for the whole device.
    pub part: u32,
    /// Directory prefix the boot file was found in.
    pub subdir: Option<String>,
    /// Full path of the boot file.
    pub fname: Option<String>,
    /// Contents of the boot file, once loaded.
    pub buf: Option<Vec<u8>>,
    /// Size of the boot file.
    pub size: usize,
    /// Error of a failed attempt.
    pub err: Option<Error>,
    /// Name of the operating system, if the method could tell.
    pub os_name: Option<String>,
    /// Kernel command line.
    pub cmdline: Option<String>,
    state: BootflowState,
}

impl Bootflow {
    /// Fresh record for an attempt of `method` on `dev`.
    pub fn new(dev: Option<DevId>, method: Option<MethId>) -> Self {
        Self {
            dev,
            method,
            ..Self::default()
        }
    }

    /// Name of a bootflow found on partition `part` of a device.
    ///
    /// Partition 0 is the whole device.
    pub fn part_name(dev_name: &str, part: u32) -> String {
        if part == 0 {
            format!("{dev_name}.whole")
        } else {
            format!("{dev_name}.part_{part:x}")
        }
    }

    pub fn state(&self) -> BootflowState {
        self.state
    }

    /// Record that the bootflow got as far as `state`.
    ///
    /// The state never moves backwards; an earlier state is ignored.
    pub fn advance(&mut self, state: BootflowState) {
        if state > self.state {
            self.state = state;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == BootflowState::Ready
    }

    /// Mark this record as a failed attempt.
    ///
    /// A failed record is never ready, whatever the backend claimed.
    pub(crate) fn fail(&mut self, err: Error) {
        self.err = Some(err);
        if self.state == BootflowState::Ready {
            log::warn!("Bootflow '{}' failed (err={}) after loading", self.name, err.errno());
            self.state = BootflowState::File;
        }
    }

    /// Release everything the bootflow located, returning it to a freshly created record for the
    /// same device and method.
    pub fn free(&mut self) {
        *self = Self::new(self.dev, self.method);
    }

    /// Set, clear or delete an argument of the command line.
    ///
    /// `None` deletes the argument. An empty command line afterwards is dropped entirely.
    pub fn cmdline_set_arg(&mut self, arg: &str, val: Option<ArgValue<'_>>) -> Result<(), Error> {
        let cmdline = cmdline::set_arg(self.cmdline.as_deref(), arg, val)?;
        self.cmdline = (!cmdline.is_empty()).then_some(cmdline);
        Ok(())
    }

    /// Value of an argument of the command line.
    pub fn cmdline_get_arg(&self, arg: &str) -> Result<&str, Error> {
        let cmdline = self.cmdline.as_deref().ok_or(Error::NotFound)?;
        cmdline::get_arg(cmdline, arg).map(|(_, value)| value)
    }
}
