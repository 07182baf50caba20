use embedded_storage::nor_flash::NorFlash;
use heapless::{LinearMap, Vec};

use crate::page::HEADER_LEN;
use crate::store::{LogStore, RecordStatus, Scan};
use crate::{DatasetId, Error, Position, Result};

pub const MAX_DATASETS: usize = 32;

/// Latest record of a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub position: Position,
    pub version: u16,
    pub length: u16,
}

/// What a [`Directory::rebuild`] found on the current page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RebuildStats {
    pub records: usize,
    pub tombstones: usize,
    pub torn: usize,
    pub corrupt: usize,
    /// Valid records for new ids that did not fit into the directory.
    pub dropped: usize,
    /// Scanning stopped at an unreadable record header.
    pub broken: bool,
}

/// In-RAM index from dataset id to its latest record, last writer wins.
#[derive(Default)]
pub struct Directory {
    entries: LinearMap<DatasetId, Entry, MAX_DATASETS>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locate(&self, id: DatasetId) -> Result<Entry> {
        self.entries.get(&id).copied().ok_or(Error::NotFound)
    }

    pub fn get(&self, id: DatasetId) -> Option<&Entry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: DatasetId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DatasetId, &Entry)> + '_ {
        self.entries.iter()
    }

    /// Dataset ids in ascending order.
    pub fn ids(&self) -> Vec<DatasetId, MAX_DATASETS> {
        let mut ids: Vec<DatasetId, MAX_DATASETS> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Record positions in log order.
    pub fn positions(&self) -> Vec<Position, MAX_DATASETS> {
        let mut positions: Vec<Position, MAX_DATASETS> =
            self.entries.values().map(|entry| entry.position).collect();
        positions.sort_unstable_by_key(|position| (position.page, position.offset));
        positions
    }

    /// Whether a record for `id` can be indexed.
    pub fn has_room_for(&self, id: DatasetId) -> bool {
        self.contains(id) || self.entries.len() < MAX_DATASETS
    }

    pub(crate) fn update(&mut self, id: DatasetId, entry: Entry) -> Result<()> {
        self.entries
            .insert(id, entry)
            .map(|_| ())
            .map_err(|_| Error::DirectoryFull)
    }

    pub(crate) fn forget(&mut self, id: DatasetId) -> Option<Entry> {
        self.entries.remove(&id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rebuild the index by scanning the current page front to back.
    pub fn rebuild<F: NorFlash>(&mut self, store: &mut LogStore<F>) -> Result<RebuildStats> {
        self.clear();
        let page = store.current_page()?;
        let end = store.write_offset();
        let mut stats = RebuildStats::default();

        let mut offset = HEADER_LEN;
        while offset < end {
            let (info, next) = match store.scan(page, offset)? {
                Scan::Record { info, next } => (info, next),
                Scan::End => break,
                Scan::Broken => {
                    stats.broken = true;
                    break;
                }
            };
            offset = next;

            match info.status {
                RecordStatus::Torn => {
                    stats.torn += 1;
                    continue;
                }
                RecordStatus::Corrupt => {
                    stats.corrupt += 1;
                    continue;
                }
                RecordStatus::Valid => {}
            }

            let header = info.header;
            if header.is_tombstone() {
                stats.tombstones += 1;
                self.forget(header.id);
                continue;
            }

            stats.records += 1;
            let entry = Entry {
                position: info.position,
                version: header.version,
                length: header.length,
            };
            if self.update(header.id, entry).is_err() {
                warn!("directory full, dataset {:04x} not indexed", header.id.0);
                stats.dropped += 1;
            }
        }

        info!(
            "indexed {} datasets ({} records, {} torn, {} corrupt)",
            self.len(),
            stats.records,
            stats.torn,
            stats.corrupt
        );
        Ok(stats)
    }
}
