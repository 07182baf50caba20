#![no_std]

//! Paged, log-structured NVRAM on top of a NOR flash region.
//!
//! The store keeps [`PAGE_COUNT`] pages. Exactly one page is *current* and
//! receives appends; the other one is the compaction target. Datasets are
//! identified by a [`DatasetId`] and every write of a dataset appends a new
//! record, so the latest record for an id is authoritative. The
//! [`Directory`] maps ids to record positions and is rebuilt from flash by
//! scanning at mount time.
//!
//! The flash itself is an external service implementing
//! [`embedded_storage::nor_flash::NorFlash`]. Its `WRITE_SIZE` and
//! `READ_SIZE` must divide 4: every write this crate issues is a whole,
//! aligned 32-bit word.
//!
//! # Page Layout
//! ```text
//! PageHeader | Record1 | Record2 | … | 0xFF…
//! ```
//! With `PageHeader` being (little-endian words):
//!
//! | bytes   | content                                              |
//! |---------|------------------------------------------------------|
//! |  0 - 3  | magic `0x4E56_524D`                                  |
//! |  4 - 7  | page sequence (version tag, newer wins)              |
//! |  8 - 11 | commit mark, `0` once the page is authoritative      |
//! | 12 - 15 | peer erase started                                   |
//! | 16 - 19 | peer erase done                                      |
//!
//! And `RecordX` being:
//!
//! | bytes         | content                                         |
//! |---------------|-------------------------------------------------|
//! |  0 - 1        | dataset id                                      |
//! |  2 - 3        | dataset version                                 |
//! |  4 - 5        | payload length `n`                              |
//! |  6 - 7        | record flags (bit 0 cleared: tombstone)         |
//! |  8 - 8+n      | payload, padded with `0xFF` to a word boundary  |
//! |  last 4 bytes | CRC-32/ISCSI over header and payload            |
//!
//! # Important Implementation Details
//! * The space of a record is reserved before its first byte is written. An
//!   interrupted write leaves a *torn* record (CRC word still erased) which
//!   scanning skips.
//! * The CRC is accumulated while the payload streams in, so a record can be
//!   written in arbitrary slices without buffering it.
//! * Compaction copies the live records into the alternate page, commits
//!   that page and only then erases the old one. A page that was never
//!   committed is discarded at the next mount.

#[macro_use]
extern crate delog;
generate_macros!();

mod directory;
mod layout;
mod nvram;
mod page;
mod ram;
mod store;
mod types;

pub use crate::directory::{Directory, Entry, RebuildStats, MAX_DATASETS};
pub use crate::layout::{Layout, PAGE_COUNT};
pub use crate::nvram::{DatasetWriter, Nvram, MAX_TYPED_DATASET_LEN};
pub use crate::page::{PageHeader, PageState};
pub use crate::ram::RamFlash;
pub use crate::store::{
    LogStore, RecordHeader, RecordInfo, RecordReader, RecordStatus, RecordWriter, Scan,
};
pub use crate::types::{DatasetId, Position};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The current page cannot hold the record; compact and retry.
    NoSpace,
    WriteFailure,
    ReadFailure,
    /// Erasing a page failed. The erase stays pending and is retried.
    EraseFailure,
    /// A record failed its CRC check or has an implausible header.
    Corrupt,
    /// The position does not point into a readable part of the log.
    OutOfRange,
    /// The payload is larger than a record or the caller's buffer can hold.
    TooLarge,
    NotFound,
    NotMounted,
    DirectoryFull,
    InvalidLayout,
    /// A streamed record received more or fewer bytes than announced.
    LengthMismatch,
    Serialize,
    Deserialize,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;


#[cfg(test)]
#[macro_use]
extern crate std;
