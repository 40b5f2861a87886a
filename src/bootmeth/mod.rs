//! Boot methods: strategies for locating and loading a bootable image.

use alloc::vec::Vec;
use core::convert::Infallible;

use crate::{BootDev, BootStd, Bootflow, BootflowIter, Class, Error};

pub mod file;

/// Handle of a boot method registered with [`BootStd`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct MethId(pub(crate) usize);

/// A strategy for finding a bootflow, either on a device or independent of any device (global).
pub trait BootMeth {
    fn name(&self) -> &str;

    /// Global methods are not tied to a device and are tried once, before any device.
    fn is_global(&self) -> bool {
        false
    }

    /// Check whether this method can be used with a device of `class`.
    ///
    /// Returns [`Error::Unsupported`] when it cannot, which skips the combination silently.
    fn check(&self, class: Class) -> Result<(), Error> {
        let _ = class;
        Ok(())
    }

    /// Locate and load a bootflow on `dev`, whose partition and filesystem are already set up
    /// as recorded in `bflow`.
    fn read_bootflow(&mut self, dev: &mut dyn BootDev, bflow: &mut Bootflow) -> Result<(), Error>;

    /// Produce a bootflow without any device. Only used for global methods.
    fn get_bootflow(&mut self, bflow: &mut Bootflow) -> Result<(), Error> {
        let _ = bflow;
        Err(Error::Unsupported)
    }

    /// Execute a ready bootflow. Does not return on success.
    fn boot(&mut self, bflow: &mut Bootflow) -> Result<Infallible, Error> {
        let _ = bflow;
        Err(Error::Unsupported)
    }
}

/// Fill in the method order of `iter`.
///
/// Ordinary methods come first, followed by global ones when `include_global` is set. If any
/// global method is included the iterator starts with those.
pub fn setup_iter_order(
    std: &BootStd,
    iter: &mut BootflowIter,
    include_global: bool,
) -> Result<(), Error> {
    let candidates: Vec<MethId> = match std.bootmeth_order() {
        Some(order) => order.to_vec(),
        None => std.meth_ids().collect(),
    };

    let is_global = |id: &MethId| std.meth(*id).is_some_and(|meth| meth.is_global());
    let mut order: Vec<MethId> = candidates.iter().copied().filter(|id| !is_global(id)).collect();
    let first_glob_method = order.len();
    if include_global {
        order.extend(candidates.iter().copied().filter(is_global));
    }

    if order.is_empty() {
        return Err(Error::NotFound);
    }

    log::debug!(
        "bootmeth order: {} methods, {} global",
        order.len(),
        order.len() - first_glob_method
    );
    iter.set_method_order(order, first_glob_method);

    Ok(())
}
