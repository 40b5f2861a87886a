use alloc::{
    collections::BTreeMap,
    format,
    rc::Rc,
    string::{String, ToString},
    vec::Vec,
};
use core::{
    cell::RefCell,
    convert::Infallible,
    sync::atomic::{AtomicUsize, Ordering},
};

use embedded_storage_async::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

use crate::{
    BootDev, BootMeth, Bootflow, BootflowIter, BootflowState, Class, Error, Priority,
    boot::Boot,
    bootdev::{blk::Media, net::Transport},
};

/// Shared record of what devices and methods were asked to do, in order.
#[derive(Clone, Debug, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    fn push(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Entries other than probes.
    pub fn attempts(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter(|entry| !entry.starts_with("probe:"))
            .cloned()
            .collect()
    }

    pub fn take(&self) -> Vec<String> {
        core::mem::take(&mut *self.0.borrow_mut())
    }
}

/// How far an attempt gets, and how it ends.
#[derive(Clone, Copy, Debug)]
pub struct Outcome {
    state: BootflowState,
    result: Result<(), Error>,
}

impl Outcome {
    pub const fn ready() -> Self {
        Self {
            state: BootflowState::Ready,
            result: Ok(()),
        }
    }

    pub const fn fail(state: BootflowState, err: Error) -> Self {
        Self {
            state,
            result: Err(err),
        }
    }

    fn apply(self, bflow: &mut Bootflow) -> Result<(), Error> {
        bflow.advance(self.state);
        if self.state == BootflowState::Ready {
            bflow.fname = Some("/boot.img".into());
            bflow.buf = Some(alloc::vec![0xaa; 16]);
            bflow.size = 16;
        }
        self.result
    }
}

/// A device answering every attempt from a script, and recording it as `<dev>:<part>:<meth>`.
pub struct ScriptedDev {
    name: String,
    class: Class,
    priority: Priority,
    parts: u32,
    probe: Result<(), Error>,
    outcomes: BTreeMap<(u32, String), Outcome>,
    otherwise: Outcome,
    trace: Trace,
}

impl ScriptedDev {
    pub fn new(name: &str, trace: &Trace) -> Self {
        Self {
            name: name.into(),
            class: Class::Mmc,
            priority: Priority::ScanFast,
            parts: 1,
            probe: Ok(()),
            outcomes: BTreeMap::new(),
            otherwise: Outcome::fail(BootflowState::Media, Error::NotFound),
            trace: trace.clone(),
        }
    }

    pub fn class(mut self, class: Class) -> Self {
        self.class = class;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Number of partitions scanned, including the whole device.
    pub fn parts(mut self, parts: u32) -> Self {
        self.parts = parts;
        self
    }

    pub fn probe_fails(mut self, err: Error) -> Self {
        self.probe = Err(err);
        self
    }

    /// Outcome of trying method `meth` on partition `part`.
    pub fn on(mut self, part: u32, meth: &str, outcome: Outcome) -> Self {
        self.outcomes.insert((part, meth.into()), outcome);
        self
    }

    /// Outcome of every attempt not scripted with [`ScriptedDev::on`].
    pub fn otherwise(mut self, outcome: Outcome) -> Self {
        self.otherwise = outcome;
        self
    }
}

impl BootDev for ScriptedDev {
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
        self.trace.push(format!("probe:{}", self.name));
        self.probe
    }

    fn get_bootflow(
        &mut self,
        iter: &mut BootflowIter,
        meth: &mut dyn BootMeth,
        bflow: &mut Bootflow,
    ) -> Result<(), Error> {
        let part = iter.part();
        if part == 0 {
            iter.set_max_part(self.parts.saturating_sub(1));
        }
        meth.check(self.class)?;

        self.trace
            .push(format!("{}:{part}:{}", self.name, meth.name()));
        bflow.part = part;
        bflow.name = Bootflow::part_name(&self.name, part);

        let outcome = self
            .outcomes
            .get(&(part, meth.name().to_string()))
            .copied()
            .unwrap_or(self.otherwise);
        outcome.apply(bflow)
    }
}

/// A method whose device-side work is done by [`ScriptedDev`].
///
/// As a global method it records `glob:<name>`, and booting records `boot:<name>`.
pub struct ScriptedMeth {
    name: String,
    global: bool,
    finds: Outcome,
    boot: Error,
    trace: Trace,
}

impl ScriptedMeth {
    pub fn new(name: &str, trace: &Trace) -> Self {
        Self {
            name: name.into(),
            global: false,
            finds: Outcome::fail(BootflowState::Base, Error::NotFound),
            boot: Error::Unsupported,
            trace: trace.clone(),
        }
    }

    pub fn global(name: &str, trace: &Trace) -> Self {
        Self {
            global: true,
            ..Self::new(name, trace)
        }
    }

    /// Outcome of asking this global method for a bootflow.
    pub fn finds(mut self, outcome: Outcome) -> Self {
        self.finds = outcome;
        self
    }

    pub fn boot_fails(mut self, err: Error) -> Self {
        self.boot = err;
        self
    }
}

impl BootMeth for ScriptedMeth {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_global(&self) -> bool {
        self.global
    }

    fn read_bootflow(&mut self, _dev: &mut dyn BootDev, _bflow: &mut Bootflow) -> Result<(), Error> {
        Err(Error::NotFound)
    }

    fn get_bootflow(&mut self, bflow: &mut Bootflow) -> Result<(), Error> {
        self.trace.push(format!("glob:{}", self.name));
        bflow.name.clone_from(&self.name);
        self.finds.apply(bflow)
    }

    fn boot(&mut self, _bflow: &mut Bootflow) -> Result<Infallible, Error> {
        self.trace.push(format!("boot:{}", self.name));
        Err(self.boot)
    }
}

/// Block media with an optional partition table and files on some of its partitions.
pub struct MockMedia {
    present: bool,
    table: Result<Option<u32>, Error>,
    filesystems: Vec<u32>,
    files: BTreeMap<(u32, String), Vec<u8>>,
    huge: BTreeMap<(u32, String), usize>,
}

impl MockMedia {
    /// Media without a partition table.
    pub fn whole() -> Self {
        Self {
            present: true,
            table: Ok(None),
            filesystems: Vec::new(),
            files: BTreeMap::new(),
            huge: BTreeMap::new(),
        }
    }

    pub fn with_partitions(count: u32) -> Self {
        Self {
            table: Ok(Some(count)),
            ..Self::whole()
        }
    }

    /// Media whose partition table cannot be read.
    pub fn broken(err: Error) -> Self {
        Self {
            table: Err(err),
            ..Self::whole()
        }
    }

    pub fn absent(mut self) -> Self {
        self.present = false;
        self
    }

    /// Put a filesystem on `part`.
    pub fn fs(mut self, part: u32) -> Self {
        self.filesystems.push(part);
        self
    }

    pub fn file(mut self, part: u32, path: &str, data: &[u8]) -> Self {
        self.files.insert((part, path.into()), data.to_vec());
        self
    }

    /// A file of `size` bytes whose contents cannot be read.
    pub fn huge(mut self, part: u32, path: &str, size: usize) -> Self {
        self.huge.insert((part, path.into()), size);
        self
    }
}

impl Media for MockMedia {
    fn present(&mut self) -> bool {
        self.present
    }

    fn partitions(&mut self) -> Result<Option<u32>, Error> {
        self.table
    }

    fn mount(&mut self, part: u32) -> Result<(), Error> {
        if self.filesystems.contains(&part) {
            Ok(())
        } else {
            Err(Error::InvalidArgument)
        }
    }

    fn file_size(&mut self, part: u32, path: &str) -> Result<usize, Error> {
        let key = (part, path.to_string());
        match (self.files.get(&key), self.huge.get(&key)) {
            (Some(data), _) => Ok(data.len()),
            (None, Some(&size)) => Ok(size),
            (None, None) => Err(Error::NotFound),
        }
    }

    fn read_file(&mut self, part: u32, path: &str) -> Result<Vec<u8>, Error> {
        let key = (part, path.to_string());
        if self.huge.contains_key(&key) {
            return Err(Error::Io);
        }
        self.files.get(&key).cloned().ok_or(Error::NotFound)
    }
}

/// A network serving a fixed set of files.
pub struct MockTransport {
    up: bool,
    files: BTreeMap<String, Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            up: true,
            files: BTreeMap::new(),
        }
    }

    /// A network whose link never comes up.
    pub fn down() -> Self {
        Self {
            up: false,
            ..Self::new()
        }
    }

    pub fn file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(path.into(), data.to_vec());
        self
    }
}

impl Transport for MockTransport {
    fn link_up(&mut self) -> Result<(), Error> {
        if self.up { Ok(()) } else { Err(Error::Io) }
    }

    fn size(&mut self, path: &str) -> Result<usize, Error> {
        self.files.get(path).map(Vec::len).ok_or(Error::NotFound)
    }

    fn fetch(&mut self, path: &str) -> Result<Vec<u8>, Error> {
        self.files.get(path).cloned().ok_or(Error::NotFound)
    }
}

static LAST_BOOT_LEN: AtomicUsize = AtomicUsize::new(0);

/// Execution which remembers the length of the image, then refuses it.
pub struct RefusingBoot;

impl RefusingBoot {
    pub fn last_len() -> usize {
        LAST_BOOT_LEN.load(Ordering::Relaxed)
    }
}

impl Boot for RefusingBoot {
    unsafe fn boot(image: &[u8]) -> Result<Infallible, Error> {
        LAST_BOOT_LEN.store(image.len(), Ordering::Relaxed);
        Err(Error::CannotBoot)
    }
}

/// NOR flash in memory: erasing sets bits, writing can only clear them.
pub struct MockFlash {
    data: Vec<u8>,
}

impl MockFlash {
    pub const PAGE_SIZE: usize = 1024;

    /// Four erased pages.
    pub fn new() -> Self {
        Self::with_pages(4)
    }

    pub fn with_pages(pages: usize) -> Self {
        Self {
            data: alloc::vec![0xff; Self::PAGE_SIZE * pages],
        }
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, NorFlashErrorKind> {
        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for MockFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = Self::PAGE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from as usize % Self::ERASE_SIZE != 0 || to as usize % Self::ERASE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let range = self.range(from, (to - from) as usize)?;
        self.data[range].fill(0xff);
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let range = self.range(offset, bytes.len())?;
        for (cell, byte) in self.data[range].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }
}

impl MultiwriteNorFlash for MockFlash {}
