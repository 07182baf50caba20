use core::ops::Range;

use embedded_storage::nor_flash::NorFlash;

use crate::page::HEADER_LEN;
use crate::store::{RECORD_HEADER_LEN, RECORD_TRAILER_LEN};
use crate::{Error, Result};

pub const PAGE_COUNT: usize = 2;

/// Write granularity used for every flash write.
pub(crate) const WORD: usize = 4;

/// Placement of the NVRAM pages inside the flash device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Flash address of page 0. Page 1 follows directly.
    pub base: u32,
    pub page_size: u32,
    /// Free space (in bytes) below which `needs_compaction` reports true.
    pub compaction_threshold: u32,
}

impl Layout {
    pub const fn new(base: u32, page_size: u32) -> Self {
        Self {
            base,
            page_size,
            compaction_threshold: page_size / 8,
        }
    }

    pub const fn with_compaction_threshold(self, compaction_threshold: u32) -> Self {
        Self {
            compaction_threshold,
            ..self
        }
    }

    /// Absolute flash range covered by `page`.
    pub const fn page_range(&self, page: u8) -> Range<u32> {
        let start = self.base + self.page_size * page as u32;
        start..start + self.page_size
    }

    pub const fn end(&self) -> u32 {
        self.base + self.page_size * PAGE_COUNT as u32
    }

    /// Largest payload a single record can carry in this layout.
    pub const fn max_payload(&self) -> usize {
        let overhead =
            HEADER_LEN as usize + RECORD_HEADER_LEN as usize + RECORD_TRAILER_LEN as usize;
        let room = (self.page_size as usize).saturating_sub(overhead);
        let room = room - room % WORD;
        if room > u16::MAX as usize {
            u16::MAX as usize
        } else {
            room
        }
    }

    pub(crate) fn validate<F: NorFlash>(&self, flash: &F) -> Result<()> {
        let min_page = HEADER_LEN + RECORD_HEADER_LEN + RECORD_TRAILER_LEN + WORD as u32;

        if F::WRITE_SIZE == 0 || WORD % F::WRITE_SIZE != 0 {
            error!("unsupported write size {}", F::WRITE_SIZE);
            return Err(Error::InvalidLayout);
        }
        if F::READ_SIZE == 0 || WORD % F::READ_SIZE != 0 {
            error!("unsupported read size {}", F::READ_SIZE);
            return Err(Error::InvalidLayout);
        }
        if self.page_size < min_page
            || self.page_size as usize % F::ERASE_SIZE != 0
            || self.base as usize % F::ERASE_SIZE != 0
        {
            error!("page size {} / base {:x} do not fit the erase size", self.page_size, self.base);
            return Err(Error::InvalidLayout);
        }
        let end = (self.page_size as u64) * PAGE_COUNT as u64 + self.base as u64;
        if end > flash.capacity() as u64 {
            error!("layout ends at {:x}, beyond flash capacity", end);
            return Err(Error::InvalidLayout);
        }
        Ok(())
    }
}
