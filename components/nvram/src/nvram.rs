use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;
use heapless_bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::directory::{Directory, Entry, RebuildStats, MAX_DATASETS};
use crate::layout::Layout;
use crate::store::{LogStore, RecordReader, RecordWriter};
use crate::{DatasetId, Error, Position, Result};

/// Largest postcard encoding accepted by [`Nvram::write_dataset`].
pub const MAX_TYPED_DATASET_LEN: usize = 512;

/// Dataset-level access to the log: a [`LogStore`] plus its [`Directory`].
pub struct Nvram<F: NorFlash> {
    store: LogStore<F>,
    directory: Directory,
}

impl<F: NorFlash> Nvram<F> {
    pub fn new(flash: F, layout: Layout) -> Result<Self> {
        Ok(Self {
            store: LogStore::new(flash, layout)?,
            directory: Directory::new(),
        })
    }

    /// Mount the log and index it. Must be called before any other access.
    pub fn mount(&mut self) -> Result<RebuildStats> {
        self.store.mount()?;
        self.directory.rebuild(&mut self.store)
    }

    pub fn store(&self) -> &LogStore<F> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LogStore<F> {
        &mut self.store
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn release(self) -> F {
        self.store.release()
    }

    pub fn locate(&self, id: DatasetId) -> Result<Entry> {
        self.directory.locate(id)
    }

    pub fn contains(&self, id: DatasetId) -> bool {
        self.directory.contains(id)
    }

    pub fn datasets(&self) -> Vec<DatasetId, MAX_DATASETS> {
        self.directory.ids()
    }

    pub fn free_space(&self) -> u32 {
        self.store.free_space()
    }

    pub fn needs_compaction(&self) -> bool {
        self.store.is_mounted() && self.free_space() < self.store.layout().compaction_threshold
    }

    pub fn write(&mut self, id: DatasetId, version: u16, payload: &[u8]) -> Result<Position> {
        let mut writer = self.begin_write(id, version, payload.len())?;
        writer.write(payload)?;
        writer.finish()
    }

    /// Start a streamed write of exactly `length` bytes.
    ///
    /// The previous record of `id` stays authoritative until
    /// [`DatasetWriter::finish`] succeeds.
    pub fn begin_write(
        &mut self,
        id: DatasetId,
        version: u16,
        length: usize,
    ) -> Result<DatasetWriter<'_, F>> {
        if !self.directory.has_room_for(id) {
            warn!("no directory slot for dataset {:04x}", id.0);
            return Err(Error::DirectoryFull);
        }
        let record = self.store.begin_record(id, version, length)?;
        Ok(DatasetWriter {
            record,
            directory: &mut self.directory,
            id,
            version,
            length: length as u16,
        })
    }

    pub fn open(&mut self, id: DatasetId) -> Result<RecordReader<'_, F>> {
        let entry = self.directory.locate(id)?;
        self.store.open(entry.position)
    }

    pub fn read<const N: usize>(&mut self, id: DatasetId) -> Result<Bytes<N>> {
        let entry = self.directory.locate(id)?;
        self.store.read(entry.position)
    }

    /// Append a tombstone for `id` and drop it from the directory.
    pub fn remove(&mut self, id: DatasetId) -> Result<()> {
        if !self.directory.contains(id) {
            return Err(Error::NotFound);
        }
        self.store.append_tombstone(id)?;
        self.directory.forget(id);
        debug!("removed dataset {:04x}", id.0);
        Ok(())
    }

    /// Move the live datasets into the alternate page and erase the old one.
    ///
    /// An `EraseFailure` means the datasets were moved but the old page is
    /// still waiting for its erase.
    pub fn compact(&mut self) -> Result<()> {
        let live = self.directory.positions();
        let rotated = self.store.rotate(&live);
        self.directory.rebuild(&mut self.store)?;
        rotated
    }

    pub fn write_dataset<T: Serialize>(
        &mut self,
        id: DatasetId,
        version: u16,
        value: &T,
    ) -> Result<Position> {
        let raw: Vec<u8, MAX_TYPED_DATASET_LEN> =
            postcard::to_vec(value).map_err(|_| Error::Serialize)?;
        self.write(id, version, &raw)
    }

    /// Read a typed dataset together with the version it was written with.
    pub fn read_dataset<T: DeserializeOwned>(&mut self, id: DatasetId) -> Result<(u16, T)> {
        let version = self.directory.locate(id)?.version;
        let raw: Bytes<MAX_TYPED_DATASET_LEN> = self.read(id)?;
        let value = postcard::from_bytes(raw.as_slice()).map_err(|_| Error::Deserialize)?;
        Ok((version, value))
    }
}

/// Streamed dataset write, indexed once [`DatasetWriter::finish`] returns.
pub struct DatasetWriter<'a, F: NorFlash> {
    record: RecordWriter<'a, F>,
    directory: &'a mut Directory,
    id: DatasetId,
    version: u16,
    length: u16,
}

impl<'a, F: NorFlash> DatasetWriter<'a, F> {
    pub fn remaining(&self) -> usize {
        self.record.remaining()
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.record.write(data)
    }

    pub fn finish(self) -> Result<Position> {
        let position = self.record.finish()?;
        self.directory.update(
            self.id,
            Entry {
                position,
                version: self.version,
                length: self.length,
            },
        )?;
        trace!("dataset {:04x} now at {}:{}", self.id.0, position.page, position.offset);
        Ok(position)
    }
}
