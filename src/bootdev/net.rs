//! Boot devices fetching files over the network.

use alloc::{string::String, vec::Vec};

use crate::{BootDev, BootMeth, Bootflow, BootflowIter, BootflowState, Class, Error, Priority};

/// File transfer over a network interface.
pub trait Transport {
    /// Bring the link up and obtain an address.
    fn link_up(&mut self) -> Result<(), Error>;

    /// Size of a file on the server.
    fn size(&mut self, path: &str) -> Result<usize, Error>;

    /// Fetch a whole file.
    fn fetch(&mut self, path: &str) -> Result<Vec<u8>, Error>;
}

/// A boot device offering whatever can be fetched through a [`Transport`].
///
/// There are no partitions, so only partition 0 is ever scanned.
pub struct NetBootDev<T: Transport> {
    name: String,
    transport: T,
}

impl<T: Transport> NetBootDev<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }
}

impl<T: Transport> BootDev for NetBootDev<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> Class {
        Class::Ethernet
    }

    fn priority(&self) -> Priority {
        Priority::Net
    }

    fn get_bootflow(
        &mut self,
        iter: &mut BootflowIter,
        meth: &mut dyn BootMeth,
        bflow: &mut Bootflow,
    ) -> Result<(), Error> {
        if iter.part() != 0 {
            return Err(Error::PartitionsExhausted);
        }
        meth.check(Class::Ethernet)?;

        bflow.name.clone_from(&self.name);
        self.transport.link_up()?;
        bflow.advance(BootflowState::Media);

        meth.read_bootflow(self, bflow)
    }

    fn file_size(&mut self, part: u32, path: &str) -> Result<usize, Error> {
        if part != 0 {
            return Err(Error::InvalidArgument);
        }
        self.transport.size(path)
    }

    fn read_file(&mut self, part: u32, path: &str) -> Result<Vec<u8>, Error> {
        if part != 0 {
            return Err(Error::InvalidArgument);
        }
        self.transport.fetch(path)
    }
}
