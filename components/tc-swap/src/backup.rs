use core::cmp::min;

use crate::format::{
    encode_binding, encode_device, stream_len, ByteOrder, GlobalFlags, GlobalSection, DB_VERSION,
    MIC_LEN,
};
use crate::mic::Mic;
use crate::state::{mic_range, record_len, Mode, Stage, SwapState};
use crate::table::TcTables;
use crate::{Error, Result};

impl<const DEVICES: usize, const BINDINGS: usize, M: Mic> SwapState<DEVICES, BINDINGS, M> {
    /// Start a backup of `tables`, returning the length of the stream.
    ///
    /// The tables are walked once up front to compute the MIC; the stream
    /// itself is produced by [`Self::get_chunk`].
    pub fn begin_backup<T: TcTables>(&mut self, tables: &T) -> Result<usize> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        let include_bindings = self.config.include_bindings;
        let device_count = tables.device_count();
        let binding_count = if include_bindings {
            tables.binding_count()
        } else {
            0
        };
        if device_count > u8::MAX as usize || binding_count > u8::MAX as usize {
            return Err(Error::TableFull);
        }

        self.start(Mode::Backup)?;
        self.order = self.config.byte_order;
        self.device_count = device_count;
        self.binding_count = binding_count;
        self.bindings_included = include_bindings;
        self.total_len = stream_len(device_count, include_bindings.then_some(binding_count));

        let mut flags = GlobalFlags::empty();
        flags.set(GlobalFlags::BIG_ENDIAN, self.order == ByteOrder::BigEndian);
        flags.set(GlobalFlags::HAS_DEVICES, device_count > 0);
        flags.set(GlobalFlags::HAS_BINDINGS, include_bindings);
        self.global = GlobalSection {
            flags,
            db_version: DB_VERSION,
            device_count: device_count as u8,
            identity: tables.identity(),
            mic: [0; MIC_LEN],
        };

        let mut mic = M::default();
        let mut next = Some((Stage::Global, 0));
        while let Some((stage, index)) = next {
            let len = match self.encode_record(tables, stage, index) {
                Ok(len) => len,
                Err(error) => return Err(self.fail(error)),
            };
            mic.update(&self.scratch[mic_range(stage, 0, len)]);
            next = self.next_record(stage, index);
        }
        self.global.mic = mic.finalize();

        self.record_len = self.encode_record(tables, Stage::Global, 0)?;
        self.mic
            .update(&self.scratch[mic_range(Stage::Global, 0, self.record_len)]);
        self.captured = self.dirty;

        info!(
            "backup: {} devices, {} bindings, {} bytes",
            device_count, binding_count, self.total_len
        );
        Ok(self.total_len)
    }

    /// Fill `buf` with the next part of the stream.
    ///
    /// Returns the number of bytes written. `0` means the stream is complete
    /// and ends the transaction.
    pub fn get_chunk<T: TcTables>(&mut self, tables: &T, buf: &mut [u8]) -> Result<usize> {
        match self.mode {
            Mode::Backup => {}
            Mode::Failed(error) => return Err(error),
            Mode::Idle | Mode::Restore => return Err(Error::NotStarted),
        }
        if self.stage == Stage::Done {
            self.complete_backup();
            return Ok(0);
        }
        if buf.is_empty() {
            return Err(Error::BufferTooSmall);
        }
        if tables.device_count() != self.device_count
            || (self.bindings_included && tables.binding_count() != self.binding_count)
        {
            return Err(self.fail(Error::TableChanged));
        }

        let mut written = 0;
        while written < buf.len() && self.stage != Stage::Done {
            let n = min(buf.len() - written, self.record_len - self.offset);
            buf[written..written + n].copy_from_slice(&self.scratch[self.offset..self.offset + n]);
            written += n;
            self.offset += n;

            if self.offset == self.record_len {
                if let Err(error) = self.advance_backup(tables) {
                    return Err(self.fail(error));
                }
            }
        }

        self.transferred += written;
        trace!("chunk of {} bytes, {}/{}", written, self.transferred, self.total_len);
        Ok(written)
    }

    fn advance_backup<T: TcTables>(&mut self, tables: &T) -> Result<()> {
        let Some((stage, index)) = self.next_record(self.stage, self.index) else {
            self.stage = Stage::Done;
            return Ok(());
        };

        let len = self.encode_record(tables, stage, index)?;
        self.mic.update(&self.scratch[mic_range(stage, 0, len)]);
        self.stage = stage;
        self.index = index;
        self.offset = 0;
        self.record_len = len;

        // the content must still be what the MIC was computed over
        if self.next_record(stage, index).is_none() && self.mic.finalize() != self.global.mic {
            return Err(Error::TableChanged);
        }
        Ok(())
    }

    /// Materialize a record into the scratch buffer, returning its length.
    fn encode_record<T: TcTables>(&mut self, tables: &T, stage: Stage, index: usize) -> Result<usize> {
        let order = self.order;
        match stage {
            Stage::Global => {
                self.global.encode(order, &mut self.scratch);
            }
            Stage::Devices => {
                let device = tables.device(index).ok_or(Error::TableChanged)?;
                encode_device(&device, order, self.config.backup_passphrases, &mut self.scratch);
            }
            Stage::Bindings if index == 0 => {
                self.scratch[0] = self.binding_count as u8;
            }
            Stage::Bindings => {
                let binding = tables.binding(index - 1).ok_or(Error::TableChanged)?;
                encode_binding(&binding, order, &mut self.scratch);
            }
            Stage::NotStarted | Stage::Done => return Ok(0),
        }
        Ok(record_len(stage, index))
    }

    fn complete_backup(&mut self) {
        info!("backup complete, {} bytes", self.transferred);
        self.dirty.remove(self.captured);
        self.completed_backups = self.completed_backups.wrapping_add(1);
        self.close();
    }
}
