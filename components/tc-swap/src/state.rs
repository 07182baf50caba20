use bitflags::bitflags;
use heapless::Vec;

use crate::format::{
    ByteOrder, GlobalSection, BINDING_COUNT_LEN, BINDING_LEN, DEVICE_LEN, GLOBAL_LEN, MIC_OFFSET,
    SCRATCH_LEN,
};
use crate::mic::{Crc32Mic, Mic};
use crate::storage::Bookkeeping;
use crate::table::{BindingEntry, DeviceEntry, MAX_BINDINGS, MAX_DEVICES};
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    NotStarted,
    Global,
    Devices,
    Bindings,
    Done,
}

bitflags! {
    /// Parts of the Trust Center database changed since the last backup.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const DEVICES = 1 << 0;
        const BINDINGS = 1 << 1;
        const INSTALL_CODES = 1 << 2;
        const TC_IDENTITY = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapConfig {
    /// Append the binding section to backups.
    pub include_bindings: bool,
    /// When false, passphrases are left out of backups.
    pub backup_passphrases: bool,
    /// Byte order backups are produced in.
    pub byte_order: ByteOrder,
}

impl SwapConfig {
    pub const DEFAULT: Self = Self {
        include_bindings: true,
        backup_passphrases: true,
        byte_order: ByteOrder::LittleEndian,
    };
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Idle,
    Backup,
    Restore,
    /// The last transaction failed; its error is returned until a new one
    /// starts or it is aborted.
    Failed(Error),
}

/// Context of the backup or restore in progress.
///
/// At most one transaction is active at a time. The record being streamed
/// lives in a scratch buffer, staged restore data in bounded tables of
/// `DEVICES` and `BINDINGS` entries.
pub struct SwapState<
    const DEVICES: usize = MAX_DEVICES,
    const BINDINGS: usize = MAX_BINDINGS,
    M: Mic = Crc32Mic,
> {
    pub(crate) config: SwapConfig,
    pub(crate) mode: Mode,
    pub(crate) stage: Stage,
    pub(crate) index: usize,
    /// Byte offset within the record held in `scratch`.
    pub(crate) offset: usize,
    pub(crate) record_len: usize,
    pub(crate) scratch: [u8; SCRATCH_LEN],
    pub(crate) global: GlobalSection,
    pub(crate) order: ByteOrder,
    pub(crate) device_count: usize,
    pub(crate) binding_count: usize,
    pub(crate) bindings_included: bool,
    pub(crate) total_len: usize,
    pub(crate) transferred: usize,
    pub(crate) mic: M,
    pub(crate) dirty: DirtyFlags,
    pub(crate) captured: DirtyFlags,
    pub(crate) completed_backups: u32,
    pub(crate) change_address: bool,
    /// First semantic fault of a restore, reported once the MIC verified.
    pub(crate) fault: Option<Error>,
    pub(crate) devices: Vec<DeviceEntry, DEVICES>,
    pub(crate) bindings: Vec<BindingEntry, BINDINGS>,
}

impl<const DEVICES: usize, const BINDINGS: usize, M: Mic> Default
    for SwapState<DEVICES, BINDINGS, M>
{
    fn default() -> Self {
        Self::new(SwapConfig::DEFAULT)
    }
}

impl<const DEVICES: usize, const BINDINGS: usize, M: Mic> SwapState<DEVICES, BINDINGS, M> {
    pub fn new(config: SwapConfig) -> Self {
        Self {
            config,
            mode: Mode::Idle,
            stage: Stage::NotStarted,
            index: 0,
            offset: 0,
            record_len: 0,
            scratch: [0; SCRATCH_LEN],
            global: GlobalSection::default(),
            order: config.byte_order,
            device_count: 0,
            binding_count: 0,
            bindings_included: false,
            total_len: 0,
            transferred: 0,
            mic: M::default(),
            dirty: DirtyFlags::empty(),
            captured: DirtyFlags::empty(),
            completed_backups: 0,
            change_address: false,
            fault: None,
            devices: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SwapConfig) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        self.config = config;
        Ok(())
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.mode, Mode::Backup | Mode::Restore)
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Error that ended the last transaction, if any.
    pub fn failure(&self) -> Option<Error> {
        match self.mode {
            Mode::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Length of the backup being produced, `0` outside of a backup.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Bytes produced or consumed so far.
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// Drop the transaction in progress, without touching the live tables.
    pub fn abort(&mut self) {
        if self.is_busy() {
            info!("{:?} aborted at {:?}", self.mode, self.stage);
        }
        self.reset();
        self.mode = Mode::Idle;
        self.stage = Stage::NotStarted;
    }

    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// The database changed since the last completed backup or restore.
    pub fn backup_required(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn completed_backups(&self) -> u32 {
        self.completed_backups
    }

    pub fn bookkeeping(&self) -> Bookkeeping {
        Bookkeeping {
            dirty: self.dirty.bits(),
            completed_backups: self.completed_backups,
        }
    }

    pub fn apply_bookkeeping(&mut self, bookkeeping: &Bookkeeping) {
        self.dirty = DirtyFlags::from_bits_truncate(bookkeeping.dirty);
        self.completed_backups = bookkeeping.completed_backups;
    }

    pub(crate) fn start(&mut self, mode: Mode) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        self.reset();
        self.mode = mode;
        self.stage = Stage::Global;
        self.record_len = GLOBAL_LEN;
        Ok(())
    }

    /// End the transaction with `error`, dropping everything staged.
    pub(crate) fn fail(&mut self, error: Error) -> Error {
        warn!("{:?} failed at {:?} #{}: {:?}", self.mode, self.stage, self.index, error);
        self.reset();
        self.mode = Mode::Failed(error);
        error
    }

    /// End a successful transaction.
    pub(crate) fn close(&mut self) {
        self.reset();
        self.mode = Mode::Idle;
        self.stage = Stage::Done;
    }

    fn reset(&mut self) {
        self.index = 0;
        self.offset = 0;
        self.record_len = 0;
        self.global = GlobalSection::default();
        self.order = self.config.byte_order;
        self.device_count = 0;
        self.binding_count = 0;
        self.bindings_included = false;
        self.total_len = 0;
        self.transferred = 0;
        self.mic = M::default();
        self.captured = DirtyFlags::empty();
        self.change_address = false;
        self.fault = None;
        self.devices.clear();
        self.bindings.clear();
    }

    /// Record following `index` of `stage`, `None` at the end of the stream.
    ///
    /// Index 0 of the binding stage is the binding count byte, binding
    /// records follow at 1..=count.
    pub(crate) fn next_record(&self, stage: Stage, index: usize) -> Option<(Stage, usize)> {
        match stage {
            Stage::NotStarted => Some((Stage::Global, 0)),
            Stage::Global if self.device_count > 0 => Some((Stage::Devices, 0)),
            Stage::Devices if index + 1 < self.device_count => Some((Stage::Devices, index + 1)),
            Stage::Global | Stage::Devices if self.bindings_included => Some((Stage::Bindings, 0)),
            Stage::Bindings if index < self.binding_count => Some((Stage::Bindings, index + 1)),
            Stage::Global | Stage::Devices | Stage::Bindings | Stage::Done => None,
        }
    }
}

pub(crate) fn record_len(stage: Stage, index: usize) -> usize {
    match stage {
        Stage::Global => GLOBAL_LEN,
        Stage::Devices => DEVICE_LEN,
        Stage::Bindings if index == 0 => BINDING_COUNT_LEN,
        Stage::Bindings => BINDING_LEN,
        Stage::NotStarted | Stage::Done => 0,
    }
}

/// Part of a record covered by the MIC: all of it, except the MIC field of
/// the global section.
pub(crate) fn mic_range(stage: Stage, start: usize, len: usize) -> core::ops::Range<usize> {
    match stage {
        Stage::Global => {
            let end = (start + len).min(MIC_OFFSET);
            start.min(end)..end
        }
        _ => start..start + len,
    }
}
