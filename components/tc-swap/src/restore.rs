use core::cmp::min;

use crate::format::{decode_binding, decode_device, GlobalFlags, GlobalSection, GLOBAL_LEN};
use crate::mic::Mic;
use crate::state::{mic_range, record_len, DirtyFlags, Mode, Stage, SwapState};
use crate::table::{TcIdentity, TcTablesMut};
use crate::{Error, Result};

impl<const DEVICES: usize, const BINDINGS: usize, M: Mic> SwapState<DEVICES, BINDINGS, M> {
    /// Start a restore.
    ///
    /// With `change_address` the Trust Center adopts the IEEE address stored
    /// in the backup, otherwise it keeps its own.
    pub fn begin_restore(&mut self, change_address: bool) -> Result<()> {
        self.start(Mode::Restore)?;
        self.change_address = change_address;
        info!("restore started, change address: {}", change_address);
        Ok(())
    }

    /// Consume the next part of a backup stream.
    ///
    /// Records are staged, the live tables are untouched until
    /// [`Self::finish`].
    pub fn put_chunk(&mut self, data: &[u8]) -> Result<()> {
        match self.mode {
            Mode::Restore => {}
            Mode::Failed(error) => return Err(error),
            Mode::Idle | Mode::Backup => return Err(Error::NotStarted),
        }

        let mut consumed = 0;
        while consumed < data.len() {
            if self.stage == Stage::Done {
                return Err(self.fail(Error::UnexpectedLength));
            }
            let n = min(data.len() - consumed, self.record_len - self.offset);
            let start = self.offset;
            self.scratch[start..start + n].copy_from_slice(&data[consumed..consumed + n]);
            self.mic.update(&self.scratch[mic_range(self.stage, start, n)]);
            consumed += n;
            self.offset += n;
            self.transferred += n;

            if self.offset == self.record_len {
                self.accept_record();
                if let Err(error) = self.advance_restore() {
                    return Err(self.fail(error));
                }
            }
        }
        Ok(())
    }

    /// Commit the staged database to `tables`.
    pub fn finish<T: TcTablesMut>(&mut self, tables: &mut T) -> Result<()> {
        match self.mode {
            Mode::Restore => {}
            Mode::Failed(error) => return Err(error),
            Mode::Idle | Mode::Backup => return Err(Error::NotStarted),
        }

        if self.stage != Stage::Done {
            let error = if self.stage == Stage::Global {
                Error::Incomplete
            } else if self.mic.finalize() != self.global.mic {
                Error::MicMismatch
            } else {
                Error::Incomplete
            };
            return Err(self.fail(error));
        }

        let current = tables.identity();
        let identity = TcIdentity {
            address: if self.change_address {
                self.global.identity.address
            } else {
                current.address
            },
            extended_pan_id: self.global.identity.extended_pan_id,
        };
        let bindings = self.bindings_included.then(|| self.bindings.as_slice());
        if let Err(error) = tables.replace(identity, &self.devices, bindings) {
            return Err(self.fail(error));
        }

        info!(
            "restored {} devices, {} bindings",
            self.devices.len(),
            self.bindings.len()
        );
        self.dirty = DirtyFlags::empty();
        self.close();
        Ok(())
    }

    /// Decode the record completed in the scratch buffer and stage it.
    fn accept_record(&mut self) {
        match self.stage {
            Stage::Global => {
                let (global, order) = GlobalSection::decode(&self.scratch[..GLOBAL_LEN]);
                if let Err(error) = global.check(order) {
                    self.note(error);
                }
                self.order = order;
                self.device_count = global.device_count as usize;
                self.bindings_included = global.flags.contains(GlobalFlags::HAS_BINDINGS);
                self.global = global;
                if self.device_count > DEVICES {
                    self.note(Error::TableFull);
                }
                debug!(
                    "global: {} devices, bindings: {}, {:?}",
                    self.device_count, self.bindings_included, order
                );
            }
            Stage::Devices => match decode_device(&self.scratch, self.order) {
                Ok(device) => {
                    if self.fault.is_none() && self.devices.push(device).is_err() {
                        self.note(Error::TableFull);
                    }
                }
                Err(error) => self.note(error),
            },
            Stage::Bindings if self.index == 0 => {
                self.binding_count = self.scratch[0] as usize;
                if self.binding_count > BINDINGS {
                    self.note(Error::TableFull);
                }
            }
            Stage::Bindings => match decode_binding(&self.scratch, self.order) {
                Ok(binding) => {
                    if self.fault.is_none() && self.bindings.push(binding).is_err() {
                        self.note(Error::TableFull);
                    }
                }
                Err(error) => self.note(error),
            },
            Stage::NotStarted | Stage::Done => {}
        }
    }

    fn advance_restore(&mut self) -> Result<()> {
        match self.next_record(self.stage, self.index) {
            Some((stage, index)) => {
                self.stage = stage;
                self.index = index;
                self.offset = 0;
                self.record_len = record_len(stage, index);
                Ok(())
            }
            None => self.verify_payload(),
        }
    }

    /// The declared payload is complete: integrity first, then whatever
    /// was wrong with the content.
    fn verify_payload(&mut self) -> Result<()> {
        if self.mic.finalize() != self.global.mic {
            return Err(Error::MicMismatch);
        }
        if let Some(error) = self.fault {
            return Err(error);
        }
        trace!("payload of {} bytes verified", self.transferred);
        self.stage = Stage::Done;
        Ok(())
    }

    /// Keep the first semantic fault.
    fn note(&mut self, error: Error) {
        if self.fault.is_none() {
            debug!("{:?} at {:?} #{}", error, self.stage, self.index);
            self.fault = Some(error);
        }
    }
}
