//! Boot devices backed by partitioned block media (MMC, USB sticks, disks).

use alloc::{string::String, vec::Vec};

use crate::{
    BootDev, BootMeth, Bootflow, BootflowIter, BootflowState, Class, Error, Priority, log_ret,
};

/// Upper bound of partitions scanned on a device with a partition table.
///
/// The scan stops earlier once the media reports the partition table has run out.
pub const MAX_PART_PER_BOOTDEV: u32 = 30;

/// Block media as seen by [`BlkBootDev`].
pub trait Media {
    /// Bring the media up.
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Whether there is media in the device at all.
    fn present(&mut self) -> bool {
        true
    }

    /// Number of partitions in the partition table, or `None` when there is no table and the
    /// whole device holds a filesystem.
    fn partitions(&mut self) -> Result<Option<u32>, Error>;

    /// Recognise the filesystem on `part` (0 for the whole device).
    fn mount(&mut self, part: u32) -> Result<(), Error>;

    /// Size of a file in the filesystem on `part`.
    fn file_size(&mut self, part: u32, path: &str) -> Result<usize, Error>;

    /// Read a whole file from the filesystem on `part`.
    fn read_file(&mut self, part: u32, path: &str) -> Result<Vec<u8>, Error>;
}

/// A boot device scanning the partitions of block media.
///
/// Partition 0 stands for the whole device. When the media has a partition table the whole
/// device is not used, and partitions `1..` are tried instead.
pub struct BlkBootDev<M: Media> {
    name: String,
    class: Class,
    priority: Priority,
    media: M,
    probed: bool,
}

impl<M: Media> BlkBootDev<M> {
    pub fn new(name: impl Into<String>, class: Class, media: M) -> Self {
        Self {
            name: name.into(),
            class,
            priority: Priority::ScanFast,
            media,
            probed: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn media(&self) -> &M {
        &self.media
    }
}

impl<M: Media> BootDev for BlkBootDev<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> Class {
        self.class
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn probe(&mut self) -> Result<(), Error> {
        if !self.probed {
            self.media.init()?;
            self.probed = true;
        }
        Ok(())
    }

    fn get_bootflow(
        &mut self,
        iter: &mut BootflowIter,
        meth: &mut dyn BootMeth,
        bflow: &mut Bootflow,
    ) -> Result<(), Error> {
        meth.check(self.class)?;

        let part = iter.part();
        bflow.part = part;
        bflow.name = Bootflow::part_name(&self.name, part);

        if !self.media.present() {
            return Err(log_ret("media", Error::NotFound));
        }
        bflow.advance(BootflowState::Media);

        let partitions = self.media.partitions();
        if part == 0 {
            match partitions {
                // Use the partitions, not the whole device.
                Ok(Some(_)) => {
                    iter.set_max_part(MAX_PART_PER_BOOTDEV);
                    return Err(log_ret("whole", Error::NotFound));
                }
                Ok(None) => {}
                Err(err) => return Err(log_ret("table", err)),
            }
        } else {
            match partitions {
                Ok(Some(count)) if part > count => {
                    return Err(Error::PartitionsExhausted);
                }
                Ok(Some(_)) => {}
                Ok(None) => return Err(Error::PartitionsExhausted),
                Err(err) => return Err(log_ret("table", err)),
            }
        }
        bflow.advance(BootflowState::Part);

        self.media.mount(part).map_err(|err| log_ret("mount", err))?;
        bflow.advance(BootflowState::Fs);

        meth.read_bootflow(self, bflow)
    }

    fn file_size(&mut self, part: u32, path: &str) -> Result<usize, Error> {
        self.media.file_size(part, path)
    }

    fn read_file(&mut self, part: u32, path: &str) -> Result<Vec<u8>, Error> {
        self.media.read_file(part, path)
    }
}
