#![no_std]

//! Trust Center swap-out: streaming backup and restore of the Trust Center
//! security database.
//!
//! A backup is produced by [`SwapState::begin_backup`] followed by
//! [`SwapState::get_chunk`] calls until one returns `0`. Each call fills the
//! caller's buffer with as much of the stream as fits. Records are packed
//! back to back and may span calls. A restore is fed through
//! [`SwapState::begin_restore`], [`SwapState::put_chunk`] and
//! [`SwapState::finish`]. Nothing reaches the live tables before `finish`
//! has verified the MIC, and then everything is replaced in one
//! [`TcTablesMut::replace`] call.
//!
//! Only one record is materialized at a time (in a scratch buffer sized to
//! the largest record), independent of the number of devices.
//!
//! # Stream Layout
//! ```text
//! GlobalSection | DeviceRecord × device_count | [BindingCount | BindingRecord × n]
//! ```
//!
//! `GlobalSection` (23 bytes):
//!
//! | bytes   | content                                             |
//! |---------|-----------------------------------------------------|
//! |  0      | flags: big-endian, has-devices, has-bindings        |
//! |  1      | database format version (`1`)                       |
//! |  2      | device count                                        |
//! |  3 - 10 | Trust Center IEEE address                           |
//! | 11 - 18 | extended PAN id                                     |
//! | 19 - 22 | MIC over bytes 0 - 18 and everything after byte 22  |
//!
//! `DeviceRecord` (79 bytes, fixed width, absent fields are zero-filled):
//!
//! | bytes   | content                                             |
//! |---------|-----------------------------------------------------|
//! |  0 - 7  | IEEE address                                        |
//! |  8      | flags: install code, hashed key, auth token, previous hashed key |
//! |  9      | key attribute                                       |
//! | 10      | initial join authentication                         |
//! | 11      | post-join key update method                         |
//! | 12      | install code type                                   |
//! | 13 - 28 | hashed TCLK                                         |
//! | 29 - 44 | previous hashed TCLK                                |
//! | 45 - 60 | passphrase                                          |
//! | 61 - 78 | install code (including its CRC)                    |
//!
//! `BindingRecord` (13 bytes): source endpoint, cluster id, destination
//! address mode, 8 address bytes, destination endpoint.
//!
//! # Byte Order
//! Flag bits are numbered from the least significant bit. A big-endian
//! producer writes its flag bytes mirrored (the big-endian marker lands in
//! bit 7) and its integers big-endian. The consumer recognizes the marker
//! and converts back. Keys and install codes are byte strings and are never
//! reordered.

#[macro_use]
extern crate delog;
generate_macros!();

mod backup;
mod format;
mod mic;
mod restore;
mod state;
mod storage;
mod table;

pub use crate::format::{
    stream_len, ByteOrder, DeviceFlags, GlobalFlags, GlobalSection, BINDING_LEN, DB_VERSION,
    DEVICE_LEN, GLOBAL_LEN, MIC_LEN,
};
pub use crate::mic::{Crc32Mic, Mic};
pub use crate::state::{DirtyFlags, Stage, SwapConfig, SwapState};
pub use crate::storage::{
    backup_to_nvram, load_bookkeeping, restore_from_nvram, save_bookkeeping, Bookkeeping,
    TC_BACKUP_DATASET, TC_SWAP_BOOKKEEPING,
};
pub use crate::table::{
    BindingDestination, BindingEntry, DeviceEntry, ExtendedAddress, ExtendedPanId,
    InitialJoinAuth, InstallCode, InstallCodeType, Key, KeyAttribute, KeyUpdateMethod,
    TcDatabase, TcIdentity, TcTables, TcTablesMut, TryFromU8Error, KEY_LEN, MAX_BINDINGS,
    MAX_DEVICES,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A record holds values this implementation cannot accept.
    BadFormat,
    /// Bytes beyond the declared payload.
    UnexpectedLength,
    /// The stream ended before the declared payload was complete.
    Incomplete,
    MicMismatch,
    /// The output buffer cannot hold a single byte.
    BufferTooSmall,
    /// Another backup or restore is in progress.
    Busy,
    /// No transaction of the required kind is in progress.
    NotStarted,
    /// More devices or bindings than the tables can hold.
    TableFull,
    /// The live tables changed while a backup was being produced.
    TableChanged,
    Nvram(nvram::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or truncated stream, fatal to the transaction.
    Format,
    /// MIC mismatch, fatal, staged state is discarded.
    Integrity,
    /// Recoverable with a larger buffer or larger tables.
    Capacity,
    /// Wait until [`SwapState::is_busy`] returns false.
    Busy,
    /// Calls made out of order.
    Usage,
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadFormat | Self::UnexpectedLength | Self::Incomplete => ErrorKind::Format,
            Self::MicMismatch => ErrorKind::Integrity,
            Self::BufferTooSmall | Self::TableFull => ErrorKind::Capacity,
            Self::Busy => ErrorKind::Busy,
            Self::NotStarted | Self::TableChanged => ErrorKind::Usage,
            Self::Nvram(_) => ErrorKind::Storage,
        }
    }
}

impl From<nvram::Error> for Error {
    fn from(error: nvram::Error) -> Self {
        Self::Nvram(error)
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests;

#[cfg(test)]
#[macro_use]
extern crate std;
