//! Registry of boot devices and methods, along with the configured scan orders and the bootflows
//! found so far.

use alloc::{boxed::Box, string::String, vec::Vec};

use crate::{
    BootDev, BootMeth, Bootflow, DevId, Error, MethId, config::ScanConfig, iter::IterFlags,
};

/// Owner of every boot device and method.
///
/// Devices and methods are referred to by [`DevId`] and [`MethId`] handles, which stay valid for
/// the lifetime of the registry.
#[derive(Default)]
pub struct BootStd {
    devs: Vec<Box<dyn BootDev>>,
    meths: Vec<Box<dyn BootMeth>>,
    bootdev_order: Option<Vec<String>>,
    bootmeth_order: Option<Vec<MethId>>,
    flags: IterFlags,
    glob: Vec<Bootflow>,
    selected: Option<usize>,
}

impl BootStd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bootdev(&mut self, dev: Box<dyn BootDev>) -> DevId {
        log::debug!("Adding bootdev '{}'", dev.name());
        self.devs.push(dev);
        DevId(self.devs.len() - 1)
    }

    pub fn add_bootmeth(&mut self, meth: Box<dyn BootMeth>) -> MethId {
        log::debug!("Adding bootmeth '{}'", meth.name());
        self.meths.push(meth);
        MethId(self.meths.len() - 1)
    }

    pub fn dev(&self, id: DevId) -> Option<&dyn BootDev> {
        self.devs.get(id.0).map(|dev| &**dev)
    }

    pub fn dev_mut(&mut self, id: DevId) -> Option<&mut dyn BootDev> {
        let dev = self.devs.get_mut(id.0)?;
        Some(dev.as_mut())
    }

    pub fn meth(&self, id: MethId) -> Option<&dyn BootMeth> {
        self.meths.get(id.0).map(|meth| &**meth)
    }

    pub fn meth_mut(&mut self, id: MethId) -> Option<&mut dyn BootMeth> {
        let meth = self.meths.get_mut(id.0)?;
        Some(meth.as_mut())
    }

    /// Both a device and a method, borrowed at once.
    pub(crate) fn pair_mut(
        &mut self,
        dev: DevId,
        meth: MethId,
    ) -> Option<(&mut dyn BootDev, &mut dyn BootMeth)> {
        let dev = self.devs.get_mut(dev.0)?;
        let meth = self.meths.get_mut(meth.0)?;
        Some((&mut **dev, &mut **meth))
    }

    /// Handles of all devices, in registration order.
    pub fn dev_ids(&self) -> impl Iterator<Item = DevId> + use<> {
        (0..self.devs.len()).map(DevId)
    }

    /// Handles of all methods, in registration order.
    pub fn meth_ids(&self) -> impl Iterator<Item = MethId> + use<> {
        (0..self.meths.len()).map(MethId)
    }

    pub fn find_dev(&self, name: &str) -> Option<DevId> {
        self.devs.iter().position(|dev| dev.name() == name).map(DevId)
    }

    pub fn find_meth(&self, name: &str) -> Option<MethId> {
        self.meths.iter().position(|meth| meth.name() == name).map(MethId)
    }

    /// Name of a device, empty for an unknown handle.
    pub fn dev_name(&self, id: DevId) -> &str {
        self.dev(id).map_or("", |dev| dev.name())
    }

    /// Name of a method, empty for an unknown handle.
    pub fn meth_name(&self, id: MethId) -> &str {
        self.meth(id).map_or("", |meth| meth.name())
    }

    pub(crate) fn probe_dev(&mut self, id: DevId) -> Result<(), Error> {
        self.dev_mut(id).ok_or(Error::InvalidArgument)?.probe()
    }

    /// Labels the devices are scanned in, if configured.
    pub fn bootdev_order(&self) -> Option<&[String]> {
        self.bootdev_order.as_deref()
    }

    /// Set the device order as a list of device or class names. `None` scans by priority.
    pub fn set_bootdev_order(&mut self, order: Option<Vec<String>>) {
        self.bootdev_order = order;
    }

    pub fn bootmeth_order(&self) -> Option<&[MethId]> {
        self.bootmeth_order.as_deref()
    }

    /// Set the method order by name. `None` uses every method in registration order.
    pub fn set_bootmeth_order(&mut self, names: Option<&[impl AsRef<str>]>) -> Result<(), Error> {
        let Some(names) = names else {
            self.bootmeth_order = None;
            return Ok(());
        };

        let order = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.find_meth(name).ok_or_else(|| {
                    log::warn!("Unknown bootmeth '{name}'");
                    Error::NotFound
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.bootmeth_order = Some(order);

        Ok(())
    }

    /// Flags to scan with by default.
    pub fn flags(&self) -> IterFlags {
        self.flags
    }

    /// Install the orders and flags of a stored configuration.
    pub fn apply_config(&mut self, config: &ScanConfig) -> Result<(), Error> {
        self.set_bootmeth_order(config.bootmeth_order.as_deref())?;
        self.set_bootdev_order(config.bootdev_order.clone());
        self.flags = config.flags;
        Ok(())
    }

    /// Append a bootflow to the global list, returning its sequence number.
    pub fn add_bootflow(&mut self, bflow: Bootflow) -> usize {
        self.glob.push(bflow);
        self.glob.len() - 1
    }

    /// Every bootflow found, in the order found.
    pub fn bootflows(&self) -> &[Bootflow] {
        &self.glob
    }

    /// Bootflows found on one device.
    pub fn bootflows_for(&self, dev: DevId) -> impl Iterator<Item = &Bootflow> {
        self.glob.iter().filter(move |bflow| bflow.dev == Some(dev))
    }

    /// Remove a bootflow from the list. Later ones move down by one.
    pub fn remove_bootflow(&mut self, seq: usize) -> Result<Bootflow, Error> {
        if seq >= self.glob.len() {
            return Err(Error::NotFound);
        }
        self.selected = match self.selected {
            Some(sel) if sel == seq => None,
            Some(sel) if sel > seq => Some(sel - 1),
            sel => sel,
        };
        Ok(self.glob.remove(seq))
    }

    pub fn clear_bootflows(&mut self) {
        self.glob.clear();
        self.selected = None;
    }

    pub fn select_bootflow(&mut self, seq: usize) -> Result<&Bootflow, Error> {
        let bflow = self.glob.get(seq).ok_or(Error::NotFound)?;
        self.selected = Some(seq);
        Ok(bflow)
    }

    pub fn selected_bootflow(&self) -> Option<&Bootflow> {
        self.selected.and_then(|seq| self.glob.get(seq))
    }

    pub fn selected_bootflow_mut(&mut self) -> Option<&mut Bootflow> {
        self.selected.and_then(|seq| self.glob.get_mut(seq))
    }
}
