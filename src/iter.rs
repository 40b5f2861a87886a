//! The bootflow iterator: a cursor over global methods, then device × partition × method.

use alloc::vec::Vec;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{BootStd, DevId, Error, MethId, log_ret};

bitflags! {
    /// Options for a scan.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct IterFlags: u32 {
        /// Report progress as devices and global methods are scanned.
        const SHOW = 1 << 0;
        /// Hand back every attempt, including failed ones.
        const ALL = 1 << 1;
        /// Do not try global methods.
        const SKIP_GLOBAL = 1 << 2;
        /// Only scan the first device of the order.
        const SINGLE_DEV = 1 << 3;
    }
}

/// Position of a scan.
///
/// Global methods, if any are in play, come first with no device selected. After that methods
/// vary fastest, then partitions, then devices. The method order holds the ordinary methods
/// followed by the global ones, starting at [`BootflowIter::first_glob_method`].
#[derive(Debug, Default)]
pub struct BootflowIter {
    flags: IterFlags,
    dev: Option<DevId>,
    part: u32,
    max_part: u32,
    dev_order: Vec<DevId>,
    cur_dev: usize,
    method_order: Vec<MethId>,
    num_methods: usize,
    cur_method: usize,
    first_glob_method: usize,
    doing_global: bool,
    method: Option<MethId>,
    err: Option<Error>,
    dropped: bool,
}

impl BootflowIter {
    pub fn new(flags: IterFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Release the orders and return to a fresh state with no flags.
    pub fn uninit(&mut self) {
        *self = Self::default();
    }

    pub fn flags(&self) -> IterFlags {
        self.flags
    }

    pub(crate) fn add_flags(&mut self, flags: IterFlags) {
        self.flags |= flags;
    }

    /// Current device, `None` while global methods are tried or once the scan is over.
    pub fn dev(&self) -> Option<DevId> {
        self.dev
    }

    pub fn part(&self) -> u32 {
        self.part
    }

    /// Highest partition to scan on the current device.
    pub fn max_part(&self) -> u32 {
        self.max_part
    }

    /// Raise or lower the highest partition to scan on the current device.
    pub fn set_max_part(&mut self, max_part: u32) {
        self.max_part = max_part;
    }

    pub fn dev_order(&self) -> &[DevId] {
        &self.dev_order
    }

    pub fn num_devs(&self) -> usize {
        self.dev_order.len()
    }

    /// Index of the current device in [`BootflowIter::dev_order`].
    pub fn cur_dev(&self) -> usize {
        self.cur_dev
    }

    pub(crate) fn set_dev_order(&mut self, order: Vec<DevId>) {
        self.dev_order = order;
        self.cur_dev = 0;
        self.dev = None;
    }

    /// Methods still in play. Dropped methods are gone from here.
    pub fn methods(&self) -> &[MethId] {
        &self.method_order[..self.num_methods]
    }

    pub fn num_methods(&self) -> usize {
        self.num_methods
    }

    pub fn cur_method(&self) -> usize {
        self.cur_method
    }

    pub fn first_glob_method(&self) -> usize {
        self.first_glob_method
    }

    pub fn doing_global(&self) -> bool {
        self.doing_global
    }

    /// Current method.
    pub fn method(&self) -> Option<MethId> {
        self.method
    }

    pub(crate) fn set_method_order(&mut self, order: Vec<MethId>, first_glob_method: usize) {
        self.num_methods = order.len();
        self.first_glob_method = first_glob_method;
        self.doing_global = first_glob_method < order.len();
        self.cur_method = if self.doing_global {
            first_glob_method
        } else {
            0
        };
        self.method = order.get(self.cur_method).copied();
        self.method_order = order;
        self.dropped = false;
    }

    /// Outcome of the last attempt, or [`Error::DevicesExhausted`] once the scan is over.
    pub fn err(&self) -> Option<Error> {
        self.err
    }

    pub(crate) fn set_err(&mut self, err: Option<Error>) {
        self.err = err;
    }

    pub fn is_done(&self) -> bool {
        self.err == Some(Error::DevicesExhausted)
    }

    /// Remove the current method from the order, so no later position uses it.
    ///
    /// The next step moves on to the method which took its place.
    pub fn drop_bootmeth(&mut self, meth: MethId) -> Result<(), Error> {
        if self.method != Some(meth) || self.methods().get(self.cur_method) != Some(&meth) {
            return Err(Error::InvalidArgument);
        }

        self.method_order.remove(self.cur_method);
        self.num_methods -= 1;
        if !self.doing_global {
            self.first_glob_method -= 1;
        }
        self.dropped = true;

        Ok(())
    }

    /// Select the first device, unless global methods go first.
    pub(crate) fn start(&mut self, std: &mut BootStd) -> Result<(), Error> {
        if self.doing_global {
            return Ok(());
        }
        self.select_dev(std, false)
    }

    /// Move to the next position.
    ///
    /// Partitions are skipped when the last attempt reported [`Error::PartitionsExhausted`]. Once
    /// the devices run out this keeps returning [`Error::DevicesExhausted`].
    pub(crate) fn incr(&mut self, std: &mut BootStd) -> Result<(), Error> {
        if self.is_done() {
            return Err(Error::DevicesExhausted);
        }

        // Global methods have no partitions, so for them this is just a failed attempt.
        let parts_done = !self.doing_global && self.err == Some(Error::PartitionsExhausted);
        let mut inc_dev = true;

        if !parts_done {
            let next = if self.dropped {
                self.cur_method
            } else {
                self.cur_method + 1
            };
            self.dropped = false;
            if next < self.num_methods {
                self.cur_method = next;
                self.method = Some(self.method_order[next]);
                return Ok(());
            }

            // Globals are done: stay on the first device rather than moving past it.
            if self.doing_global {
                self.num_methods = self.first_glob_method;
                self.doing_global = false;
                inc_dev = false;
            }
        }
        self.dropped = false;

        self.cur_method = 0;
        if self.num_methods == 0 {
            return self.finish(std);
        }
        self.method = Some(self.method_order[0]);

        if !parts_done && inc_dev {
            self.part += 1;
            if self.part <= self.max_part {
                return Ok(());
            }
        }

        // The next device tells its own partition count once scanned.
        self.part = 0;
        self.max_part = 0;

        if inc_dev && self.flags.contains(IterFlags::SINGLE_DEV) {
            return self.finish(std);
        }
        self.select_dev(std, inc_dev)
    }

    /// Bring up the current device, or the next one when `advance` is set.
    ///
    /// A device whose [`BootDev::probe`](crate::BootDev::probe) fails is skipped for the rest
    /// of the scan and the one after it is tried. With [`IterFlags::SINGLE_DEV`] there is no
    /// other device, so the scan ends instead.
    fn select_dev(&mut self, std: &mut BootStd, mut advance: bool) -> Result<(), Error> {
        loop {
            if advance {
                self.cur_dev += 1;
            }
            let Some(&dev) = self.dev_order.get(self.cur_dev) else {
                return self.finish(std);
            };

            match std.probe_dev(dev) {
                Ok(()) => {
                    self.set_dev(std, Some(dev));
                    return Ok(());
                }
                Err(err) => {
                    log::warn!(
                        "Bootdev '{}' failed to probe (err={}), skipping",
                        std.dev_name(dev),
                        err.errno()
                    );
                    if self.flags.contains(IterFlags::SINGLE_DEV) {
                        return self.finish(std);
                    }
                    advance = true;
                }
            }
        }
    }

    fn set_dev(&mut self, std: &BootStd, dev: Option<DevId>) {
        self.dev = dev;
        match dev {
            Some(dev) => progress!(self.flags, "Scanning bootdev '{}':", std.dev_name(dev)),
            None => progress!(self.flags, "No more bootdevs"),
        }
    }

    fn finish(&mut self, std: &BootStd) -> Result<(), Error> {
        self.set_dev(std, None);
        self.err = Some(Error::DevicesExhausted);
        Err(log_ret("incr", Error::DevicesExhausted))
    }
}
