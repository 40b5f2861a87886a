//! Simple straightforward implementation of keeping the scan configuration.
//!
//! Leverages `sequential-storage` and `postcard` to store and serialize/deserialize the
//! configuration in NOR flash.

use core::ops::Range;

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::{
    cache::KeyPointerCache,
    map::{SerializationError, Value},
};

use crate::{Error, config::ScanConfig};

/// Room reserved for a serialized configuration.
pub const MAX_CONFIG_SIZE: usize = 256;

/// Pages the map API needs at the least: one to write to, one to migrate into.
const MIN_PAGES: usize = 2;

fn serialization_error(err: postcard::Error) -> SerializationError {
    use postcard::Error as E;

    match err {
        E::SerializeBufferFull | E::DeserializeUnexpectedEnd => SerializationError::BufferTooSmall,
        E::DeserializeBadVarint
        | E::DeserializeBadBool
        | E::DeserializeBadChar
        | E::DeserializeBadUtf8
        | E::DeserializeBadOption
        | E::DeserializeBadEnum
        | E::DeserializeBadEncoding => SerializationError::InvalidFormat,
        _ => SerializationError::Custom(0),
    }
}

impl<'a> Value<'a> for ScanConfig {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        postcard::to_slice(self, buffer)
            .map(|used| used.len())
            .map_err(serialization_error)
    }

    fn deserialize_from(buffer: &'a [u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        postcard::from_bytes(buffer).map_err(serialization_error)
    }
}

fn storage_error<E>(err: sequential_storage::Error<E>) -> Error {
    match err {
        sequential_storage::Error::Storage { .. } | sequential_storage::Error::FullStorage => {
            Error::Io
        }
        _ => Error::BadValue,
    }
}

/// A [`ScanConfig`] kept in NOR flash, using up to `PAGES` erase pages.
pub struct PersistentConfig<NVM: NorFlash, const PAGES: usize = 2> {
    config: ScanConfig,
    nvm: NVM,
    range: Range<u32>,
    nvm_cache: KeyPointerCache<PAGES, (), 1>,
}

impl<NVM: NorFlash, const PAGES: usize> PersistentConfig<NVM, PAGES> {
    /// Load the configuration from all of `nvm`, or the default one if nothing was stored yet.
    ///
    /// `nvm` must not hold more than `PAGES` erase pages.
    pub async fn new(nvm: NVM) -> Result<Self, Error> {
        let range = 0..nvm.capacity() as u32;
        Self::with_range(nvm, range).await
    }

    /// Load the configuration from `range` of `nvm`.
    ///
    /// The range must be aligned to erase pages and span between 2 and `PAGES` of them.
    pub async fn with_range(mut nvm: NVM, range: Range<u32>) -> Result<Self, Error> {
        let len = range.end.checked_sub(range.start).ok_or(Error::InvalidArgument)? as usize;
        let pages = len / NVM::ERASE_SIZE;
        if range.start as usize % NVM::ERASE_SIZE != 0
            || len % NVM::ERASE_SIZE != 0
            || !(MIN_PAGES..=PAGES).contains(&pages)
        {
            log::warn!("Config NVM range {range:?} does not fit {PAGES} pages");
            return Err(Error::InvalidArgument);
        }

        let mut nvm_cache: KeyPointerCache<PAGES, (), 1> = KeyPointerCache::new();
        let mut data_buffer = [0u8; MAX_CONFIG_SIZE];

        let config = sequential_storage::map::fetch_item::<(), ScanConfig, _>(
            &mut nvm,
            range.clone(),
            &mut nvm_cache,
            &mut data_buffer,
            &(),
        )
        .await
        .map_err(storage_error)?;

        let config = config.unwrap_or_else(|| {
            log::debug!("Config NVM does not contain value");
            ScanConfig::default()
        });

        Ok(Self {
            config,
            nvm,
            range,
            nvm_cache,
        })
    }

    pub fn get(&self) -> &ScanConfig {
        &self.config
    }

    /// Write `config` to flash. The current configuration is only replaced once that succeeded.
    pub async fn store(&mut self, config: ScanConfig) -> Result<(), Error> {
        let mut data_buffer = [0u8; MAX_CONFIG_SIZE];

        log::debug!("Storing {config:?}");

        sequential_storage::map::store_item::<(), ScanConfig, _>(
            &mut self.nvm,
            self.range.clone(),
            &mut self.nvm_cache,
            &mut data_buffer,
            &(),
            &config,
        )
        .await
        .map_err(storage_error)?;
        self.config = config;

        Ok(())
    }

    pub fn into_inner(self) -> NVM {
        self.nvm
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::String, vec};

    use embassy_futures::block_on;

    use super::*;
    use crate::{IterFlags, mock::MockFlash};

    type Config = PersistentConfig<MockFlash, 4>;

    fn config() -> ScanConfig {
        ScanConfig {
            bootdev_order: Some(vec!["mmc1".into(), "usb".into()]),
            bootmeth_order: None,
            flags: IterFlags::SHOW | IterFlags::SKIP_GLOBAL,
        }
    }

    #[test]
    fn empty_flash() {
        let nvm = block_on(Config::new(MockFlash::new())).unwrap();
        assert_eq!(nvm.get(), &ScanConfig::default());
    }

    #[test]
    fn store_and_reload() {
        let mut nvm = block_on(Config::new(MockFlash::new())).unwrap();
        block_on(nvm.store(config())).unwrap();
        assert_eq!(nvm.get(), &config());

        let latest = ScanConfig {
            bootmeth_order: Some(vec!["extlinux".into()]),
            ..config()
        };
        block_on(nvm.store(latest.clone())).unwrap();

        let nvm = block_on(Config::new(nvm.into_inner())).unwrap();
        assert_eq!(nvm.get(), &latest);
    }

    #[test]
    fn too_large() {
        let mut nvm = block_on(Config::new(MockFlash::new())).unwrap();
        let huge = ScanConfig {
            bootdev_order: Some(vec![String::from("x").repeat(MAX_CONFIG_SIZE)]),
            ..ScanConfig::default()
        };
        assert_eq!(block_on(nvm.store(huge)), Err(Error::BadValue));
        assert_eq!(nvm.get(), &ScanConfig::default());
    }

    #[test]
    fn more_pages_than_cached() {
        let nvm = block_on(PersistentConfig::<_, 2>::new(MockFlash::new()));
        assert_eq!(nvm.err(), Some(Error::InvalidArgument));

        let nvm = block_on(PersistentConfig::<_, 4>::new(MockFlash::with_pages(8)));
        assert_eq!(nvm.err(), Some(Error::InvalidArgument));

        // A part of the flash which does fit.
        let page = MockFlash::PAGE_SIZE as u32;
        let range = 4 * page..6 * page;
        let flash = MockFlash::with_pages(8);
        let mut nvm =
            block_on(PersistentConfig::<_, 2>::with_range(flash, range.clone())).unwrap();
        block_on(nvm.store(config())).unwrap();

        let nvm = block_on(PersistentConfig::<_, 2>::with_range(nvm.into_inner(), range)).unwrap();
        assert_eq!(nvm.get(), &config());
    }

    #[test]
    fn bad_range() {
        let page = MockFlash::PAGE_SIZE as u32;
        for range in [0..page, 1..2 * page + 1, 0..page + 4, 2 * page..page] {
            let nvm = block_on(Config::with_range(MockFlash::new(), range));
            assert_eq!(nvm.err(), Some(Error::InvalidArgument));
        }
    }
}
