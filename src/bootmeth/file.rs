//! Method loading a boot file from a list of well-known directories.
//!
//! This covers the common distro layouts, e.g. `extlinux.conf` in `/` or `/extlinux/`, a boot
//! script in `/boot/`, or an EFI application in `/EFI/BOOT/`.

use alloc::{format, string::String, vec::Vec};
use core::{convert::Infallible, marker::PhantomData};

use crate::{
    BootDev, BootMeth, Bootflow, BootflowState, Class, Error,
    boot::{Boot, DiscoverOnly},
    log_ret,
};

/// Largest boot file accepted unless configured otherwise.
pub const DEFAULT_MAX_SIZE: usize = 16 << 20;

const BLOCK_CLASSES: &[Class] = &[
    Class::Mmc,
    Class::Usb,
    Class::Ide,
    Class::Scsi,
    Class::Nvme,
    Class::Virtio,
    Class::Host,
];

/// Looks for `fname` in each prefix directory in turn and loads the first match.
///
/// Booting hands the loaded file to `B`.
pub struct FileBootMeth<B: Boot = DiscoverOnly> {
    name: String,
    fname: String,
    prefixes: Vec<String>,
    classes: Vec<Class>,
    max_size: usize,
    _boot: PhantomData<B>,
}

impl FileBootMeth {
    pub fn new(name: impl Into<String>, fname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fname: fname.into(),
            prefixes: alloc::vec!["/".into()],
            classes: BLOCK_CLASSES.to_vec(),
            max_size: DEFAULT_MAX_SIZE,
            _boot: PhantomData,
        }
    }
}

impl<B: Boot> FileBootMeth<B> {
    /// Execute loaded images with `C` instead.
    pub fn booting_with<C: Boot>(self) -> FileBootMeth<C> {
        FileBootMeth {
            name: self.name,
            fname: self.fname,
            prefixes: self.prefixes,
            classes: self.classes,
            max_size: self.max_size,
            _boot: PhantomData,
        }
    }

    /// Directories to search, each ending in `/`.
    pub fn with_prefixes(mut self, prefixes: &[&str]) -> Self {
        self.prefixes = prefixes.iter().map(|&prefix| prefix.into()).collect();
        self
    }

    /// Device classes this method applies to.
    pub fn with_classes(mut self, classes: &[Class]) -> Self {
        self.classes = classes.to_vec();
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

impl<B: Boot> BootMeth for FileBootMeth<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, class: Class) -> Result<(), Error> {
        if self.classes.contains(&class) {
            Ok(())
        } else {
            Err(Error::Unsupported)
        }
    }

    fn read_bootflow(&mut self, dev: &mut dyn BootDev, bflow: &mut Bootflow) -> Result<(), Error> {
        for prefix in &self.prefixes {
            let path = format!("{prefix}{}", self.fname);
            let size = match dev.file_size(bflow.part, &path) {
                Ok(size) => size,
                Err(Error::NotFound) => continue,
                Err(err) => return Err(log_ret("size", err)),
            };

            bflow.subdir = Some(prefix.clone());
            bflow.fname = Some(path.clone());
            bflow.size = size;
            bflow.advance(BootflowState::File);
            if size > self.max_size {
                return Err(log_ret("size", Error::TooBig));
            }

            let data = dev
                .read_file(bflow.part, &path)
                .map_err(|err| log_ret("read", err))?;
            bflow.size = data.len();
            bflow.buf = Some(data);
            bflow.advance(BootflowState::Ready);
            return Ok(());
        }

        Err(Error::NotFound)
    }

    fn boot(&mut self, bflow: &mut Bootflow) -> Result<Infallible, Error> {
        let image = bflow.buf.as_deref().ok_or(Error::NotLoaded)?;
        // SAFETY: the image was loaded by this method and is handed over as a whole.
        unsafe { B::boot(image) }
    }
}
