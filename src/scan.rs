//! Driving a scan: turning iterator positions into bootflows, and booting them.

use alloc::string::String;
use core::{convert::Infallible, fmt, mem};

use crate::{
    BootStd, Bootflow, BootflowIter, DevId, Error, IterFlags, bootdev, bootmeth, log_ret,
};

/// Start scanning all devices, returning the first bootflow found.
///
/// Without [`IterFlags::ALL`] only ready bootflows are returned, otherwise every failed attempt is
/// returned as well, along with its error. Returns [`Error::DevicesExhausted`] when there is
/// nothing (more) to find, leaving `bflow` untouched.
pub fn scan_first(
    std: &mut BootStd,
    iter: &mut BootflowIter,
    flags: IterFlags,
    bflow: &mut Bootflow,
) -> Result<(), Error> {
    scan_bootdev(std, None, iter, flags, bflow)
}

/// Start scanning, either a single device or all devices.
///
/// `iter` is set up from scratch. Scanning a single device never tries global methods.
pub fn scan_bootdev(
    std: &mut BootStd,
    dev: Option<DevId>,
    iter: &mut BootflowIter,
    mut flags: IterFlags,
    bflow: &mut Bootflow,
) -> Result<(), Error> {
    if dev.is_some() || flags.contains(IterFlags::SINGLE_DEV) {
        flags |= IterFlags::SKIP_GLOBAL;
    }
    *iter = BootflowIter::new(flags);

    if let Err(err) = setup(std, dev, iter) {
        iter.set_err(Some(Error::DevicesExhausted));
        return Err(log_ret("setup", err));
    }
    iter.start(std)?;

    match attempt(std, iter, bflow) {
        Some(result) => result,
        None => scan_next(std, iter, bflow),
    }
}

fn setup(std: &BootStd, dev: Option<DevId>, iter: &mut BootflowIter) -> Result<(), Error> {
    bootdev::setup_iter_order(std, iter, dev)?;

    let include_global = !iter.flags().contains(IterFlags::SKIP_GLOBAL);
    bootmeth::setup_iter_order(std, iter, include_global).map_err(|_| Error::DevicesExhausted)
}

/// Continue a scan, returning the next bootflow found.
pub fn scan_next(
    std: &mut BootStd,
    iter: &mut BootflowIter,
    bflow: &mut Bootflow,
) -> Result<(), Error> {
    loop {
        iter.incr(std)?;
        if let Some(result) = attempt(std, iter, bflow) {
            return result;
        }
    }
}

/// Try the current position on a scratch record, handing it over if it is worth returning.
fn attempt(
    std: &mut BootStd,
    iter: &mut BootflowIter,
    bflow: &mut Bootflow,
) -> Option<Result<(), Error>> {
    let mut scratch = Bootflow::default();

    match check(std, iter, &mut scratch) {
        Ok(()) => {
            *bflow = scratch;
            Some(Ok(()))
        }
        Err(err) if iter.flags().contains(IterFlags::ALL) && err.is_reportable() => {
            *bflow = scratch;
            Some(Err(err))
        }
        Err(_) => None,
    }
}

/// Ask the current device, or the current global method, for a bootflow.
fn check(std: &mut BootStd, iter: &mut BootflowIter, bflow: &mut Bootflow) -> Result<(), Error> {
    let result = get_bootflow(std, iter, bflow);
    iter.set_err(result.err());
    if let Err(err) = result {
        bflow.fail(err);
    }
    result
}

fn get_bootflow(
    std: &mut BootStd,
    iter: &mut BootflowIter,
    bflow: &mut Bootflow,
) -> Result<(), Error> {
    let meth = iter.method().ok_or(Error::InvalidArgument)?;
    *bflow = Bootflow::new(iter.dev(), Some(meth));

    if iter.doing_global() {
        progress!(
            iter.flags(),
            "Scanning global bootmeth '{}':",
            std.meth_name(meth)
        );
        let meth = std.meth_mut(meth).ok_or(Error::InvalidArgument)?;
        return meth.get_bootflow(bflow);
    }

    let dev = iter.dev().ok_or(Error::InvalidArgument)?;
    let (dev, meth) = std.pair_mut(dev, meth).ok_or(Error::InvalidArgument)?;
    dev.get_bootflow(iter, meth, bflow)
}

/// Execute a ready bootflow with the method that found it. Does not return on success.
///
/// A bootflow which is not ready fails with [`Error::NotLoaded`] before the method is involved.
pub fn boot(std: &mut BootStd, bflow: &mut Bootflow) -> Result<Infallible, Error> {
    if !bflow.is_ready() {
        return Err(Error::NotLoaded);
    }

    let meth = bflow.method.ok_or(Error::InvalidArgument)?;
    let meth = std.meth_mut(meth).ok_or(Error::InvalidArgument)?;
    meth.boot(bflow)
}

/// Boot a bootflow, reporting why it failed.
///
/// If the method cannot boot this bootflow, it is dropped from `iter` so that the rest of the
/// scan does not offer it again.
pub fn run_boot(
    std: &mut BootStd,
    iter: Option<&mut BootflowIter>,
    bflow: &mut Bootflow,
) -> Result<Infallible, Error> {
    let meth_name: String = bflow
        .method
        .map_or("", |meth| std.meth_name(meth))
        .into();
    log::info!("** Booting bootflow '{}' with {meth_name}", bflow.name);

    let Err(err) = boot(std, bflow);
    match err {
        Error::NotLoaded => log::info!("Bootflow not loaded (state '{}')", bflow.state()),
        Error::Unsupported => log::info!("Boot method '{meth_name}' not supported"),
        Error::CannotBoot => {
            if let (Some(iter), Some(meth)) = (iter, bflow.method) {
                if let Err(err) = iter.drop_bootmeth(meth) {
                    log::debug!("Cannot drop '{meth_name}' (err={})", err.errno());
                }
            }
            log::info!("Boot method '{meth_name}' failed and will not be retried");
        }
        _ => log::info!("Boot failed (err={})", err.errno()),
    }

    Err(err)
}

/// Boot the bootflow selected in the global list.
pub fn boot_selected(std: &mut BootStd) -> Result<Infallible, Error> {
    let mut bflow = std.selected_bootflow().cloned().ok_or(Error::NotFound)?;
    run_boot(std, None, &mut bflow)
}

/// Outcome of [`scan_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Bootflows added to the list, including failed attempts when scanning with
    /// [`IterFlags::ALL`].
    pub found: usize,
    /// Bootflows ready to boot.
    pub valid: usize,
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.found == 1 { "" } else { "s" };
        write!(f, "({} bootflow{plural}, {} valid)", self.found, self.valid)
    }
}

/// Scan to the end, adding every bootflow returned to the global list of `std`.
///
/// `flags` add to the configured [`BootStd::flags`].
pub fn scan_all(
    std: &mut BootStd,
    dev: Option<DevId>,
    flags: IterFlags,
) -> Result<ScanSummary, Error> {
    if let Some(dev) = dev {
        std.dev(dev).ok_or(Error::InvalidArgument)?;
    }

    let flags = flags | std.flags();
    let mut iter = BootflowIter::new(flags);
    let mut bflow = Bootflow::default();
    let mut summary = ScanSummary::default();

    let mut result = scan_bootdev(std, dev, &mut iter, flags, &mut bflow);
    while !iter.is_done() {
        if result.is_ok() {
            summary.valid += 1;
        }
        summary.found += 1;
        std.add_bootflow(mem::take(&mut bflow));

        result = scan_next(std, &mut iter, &mut bflow);
    }
    iter.uninit();

    log::info!("Scan complete {summary}");
    Ok(summary)
}

/// Scan all devices and boot the first bootflow that can be booted.
///
/// Returns the error of the last boot attempt, or [`Error::DevicesExhausted`] if nothing was
/// found to boot. `flags` add to the configured [`BootStd::flags`].
pub fn scan_and_boot(std: &mut BootStd, flags: IterFlags) -> Result<Infallible, Error> {
    let flags = flags | std.flags();
    let mut iter = BootflowIter::new(flags);
    let mut bflow = Bootflow::default();
    let mut last = Error::DevicesExhausted;

    let mut result = scan_first(std, &mut iter, flags, &mut bflow);
    while !iter.is_done() {
        if result.is_ok() {
            let Err(err) = run_boot(std, Some(&mut iter), &mut bflow);
            last = err;
        }
        result = scan_next(std, &mut iter, &mut bflow);
    }

    Err(last)
}
