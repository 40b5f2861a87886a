//! Boot devices: enumerable, hardware-backed sources of bootflows.

use alloc::{string::String, vec::Vec};

use serde::{Deserialize, Serialize};

use crate::{BootMeth, BootStd, Bootflow, BootflowIter, Error, IterFlags};

pub mod blk;
pub mod net;

/// Handle of a boot device registered with [`BootStd`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DevId(pub(crate) usize);

/// Kind of hardware behind a boot device.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Class {
    Mmc,
    Usb,
    Ide,
    Scsi,
    Nvme,
    Virtio,
    Spi,
    Ethernet,
    Host,
}

impl Class {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mmc => "mmc",
            Self::Usb => "usb",
            Self::Ide => "ide",
            Self::Scsi => "scsi",
            Self::Nvme => "nvme",
            Self::Virtio => "virtio",
            Self::Spi => "spi_flash",
            Self::Ethernet => "ethernet",
            Self::Host => "host",
        }
    }

    /// Whether devices of this class hold block storage with partitions and filesystems.
    pub const fn is_block(self) -> bool {
        !matches!(self, Self::Spi | Self::Ethernet)
    }
}

/// Scan priority of a device when no explicit order is configured. Earlier variants go first.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Priority {
    /// Needs to be looked at before anything else is scanned.
    PreScan,
    /// Internal storage which is quick to access.
    InternalFast,
    /// Internal storage which takes a while to come up.
    InternalSlow,
    /// Removable or external storage which is quick to scan.
    #[default]
    ScanFast,
    /// Storage that requires a slow bus scan, e.g. USB.
    ScanSlow,
    /// Network, tried last.
    Net,
}

/// A device which can be probed and asked for bootflows.
pub trait BootDev {
    fn name(&self) -> &str;

    fn class(&self) -> Class;

    fn priority(&self) -> Priority {
        Priority::ScanFast
    }

    /// Make the device ready for I/O. Must be cheap to call again once it succeeded.
    fn probe(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Try to produce a bootflow for the partition the iterator points at, using `meth`.
    ///
    /// `bflow` is freshly created for this attempt and should be advanced through its states as
    /// the attempt progresses, even when it fails. A device discovering its partition table sets
    /// [`BootflowIter::set_max_part`]. Returns [`Error::PartitionsExhausted`] when the iterator
    /// points past the last partition.
    fn get_bootflow(
        &mut self,
        iter: &mut BootflowIter,
        meth: &mut dyn BootMeth,
        bflow: &mut Bootflow,
    ) -> Result<(), Error>;

    /// Size in bytes of a file on partition `part`, without reading it.
    fn file_size(&mut self, part: u32, path: &str) -> Result<usize, Error> {
        let _ = (part, path);
        Err(Error::Unsupported)
    }

    /// Read a whole file from partition `part`.
    fn read_file(&mut self, part: u32, path: &str) -> Result<Vec<u8>, Error> {
        let _ = (part, path);
        Err(Error::Unsupported)
    }
}

/// Fill in the device order of `iter`.
///
/// With `dev` given, only that device is scanned and the iterator is restricted to a single
/// device. Otherwise the configured bootdev order is used, falling back to all devices sorted by
/// priority.
pub fn setup_iter_order(
    std: &BootStd,
    iter: &mut BootflowIter,
    dev: Option<DevId>,
) -> Result<(), Error> {
    let order = match (dev, std.bootdev_order()) {
        (Some(dev), _) => {
            std.dev(dev).ok_or(Error::InvalidArgument)?;
            iter.add_flags(IterFlags::SINGLE_DEV);
            alloc::vec![dev]
        }
        (None, Some(labels)) => order_from_labels(std, labels),
        (None, None) => {
            let mut order: Vec<DevId> = std.dev_ids().collect();
            order.sort_by_key(|&id| std.dev(id).map(|dev| dev.priority()));
            order
        }
    };

    log::debug!("bootdev order: {} devices", order.len());
    iter.set_dev_order(order);

    Ok(())
}

/// Resolve labels to devices: a device name selects that device, a class name selects every
/// device of the class in priority order.
fn order_from_labels(std: &BootStd, labels: &[String]) -> Vec<DevId> {
    let mut order = Vec::new();

    for label in labels {
        if let Some(dev) = std.find_dev(label) {
            if !order.contains(&dev) {
                order.push(dev);
            }
            continue;
        }

        let mut class_devs: Vec<DevId> = std
            .dev_ids()
            .filter(|&id| std.dev(id).is_some_and(|dev| dev.class().name() == label.as_str()))
            .filter(|id| !order.contains(id))
            .collect();
        if class_devs.is_empty() {
            log::warn!("Unknown bootdev label '{label}'");
            continue;
        }
        class_devs.sort_by_key(|&id| std.dev(id).map(|dev| dev.priority()));
        order.extend(class_devs);
    }

    order
}
