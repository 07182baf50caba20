use core::cmp::min;
use core::mem;

use crc::{Crc, Digest, CRC_32_ISCSI};
use embedded_storage::nor_flash::NorFlash;
use heapless::Vec;
use heapless_bytes::Bytes;

use crate::layout::{Layout, PAGE_COUNT, WORD};
use crate::page::{
    self, PageHeader, PageState, BLANK, COMMIT_OFFSET, HEADER_LEN, MAGIC, MAGIC_OFFSET, MARK,
    PEER_ERASE_DONE_OFFSET, PEER_ERASE_STARTED_OFFSET,
};
use crate::{DatasetId, Error, Position, Result};

pub(crate) const RECORD_HEADER_LEN: u32 = 8;
pub(crate) const RECORD_TRAILER_LEN: u32 = 4;

const FLAG_LIVE: u16 = 0x0001;
const CHUNK: usize = 32;

pub(crate) static CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const fn align_up(len: usize) -> usize {
    (len + WORD - 1) / WORD * WORD
}

/// Bytes occupied on flash by a record carrying `length` payload bytes.
pub(crate) const fn record_span(length: usize) -> u32 {
    RECORD_HEADER_LEN + align_up(length) as u32 + RECORD_TRAILER_LEN
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub id: DatasetId,
    pub version: u16,
    pub length: u16,
    pub flags: u16,
}

impl RecordHeader {
    fn new(id: DatasetId, version: u16, length: u16) -> Self {
        Self {
            id,
            version,
            length,
            flags: 0xFFFF,
        }
    }

    fn tombstone(id: DatasetId) -> Self {
        Self {
            flags: !FLAG_LIVE,
            ..Self::new(id, 0, 0)
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.flags & FLAG_LIVE == 0
    }

    /// Bytes this record occupies on flash.
    pub fn span(&self) -> u32 {
        record_span(self.length as usize)
    }

    fn encode(&self) -> [u8; RECORD_HEADER_LEN as usize] {
        let mut raw = [0u8; RECORD_HEADER_LEN as usize];
        raw[0..2].copy_from_slice(&self.id.0.to_le_bytes());
        raw[2..4].copy_from_slice(&self.version.to_le_bytes());
        raw[4..6].copy_from_slice(&self.length.to_le_bytes());
        raw[6..8].copy_from_slice(&self.flags.to_le_bytes());
        raw
    }

    fn decode(raw: &[u8; RECORD_HEADER_LEN as usize]) -> Self {
        Self {
            id: DatasetId(u16::from_le_bytes([raw[0], raw[1]])),
            version: u16::from_le_bytes([raw[2], raw[3]]),
            length: u16::from_le_bytes([raw[4], raw[5]]),
            flags: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Valid,
    /// The CRC word was never written: the write was interrupted.
    Torn,
    /// CRC mismatch.
    Corrupt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordInfo {
    pub position: Position,
    pub header: RecordHeader,
    pub status: RecordStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scan {
    /// A record header was found; `next` is the offset right after it.
    Record { info: RecordInfo, next: u32 },
    /// Blank flash, the log ends here.
    End,
    /// Implausible record header, nothing after it can be trusted.
    Broken,
}

/// Append-only record log over [`PAGE_COUNT`] flash pages.
pub struct LogStore<F: NorFlash> {
    flash: F,
    layout: Layout,
    pages: [PageHeader; PAGE_COUNT],
    current: Option<u8>,
    write_offset: u32,
    erasing: Option<u8>,
}

impl<F: NorFlash> LogStore<F> {
    pub fn new(flash: F, layout: Layout) -> Result<Self> {
        layout.validate(&flash)?;
        Ok(Self {
            flash,
            layout,
            pages: [PageHeader::ERASED; PAGE_COUNT],
            current: None,
            write_offset: HEADER_LEN,
            erasing: None,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Give the flash back, e.g. to mount it again after a simulated reset.
    pub fn release(self) -> F {
        self.flash
    }

    pub fn is_mounted(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_page(&self) -> Result<u8> {
        self.current.ok_or(Error::NotMounted)
    }

    pub fn page_header(&self, page: u8) -> Option<&PageHeader> {
        self.pages.get(page as usize)
    }

    /// Offset (relative to the current page) where the next record goes.
    pub fn write_offset(&self) -> u32 {
        self.write_offset
    }

    pub fn free_space(&self) -> u32 {
        match self.current {
            Some(_) => self.layout.page_size - self.write_offset,
            None => 0,
        }
    }

    /// Page whose erase failed and still has to be retried.
    pub fn erase_pending(&self) -> Option<u8> {
        self.erasing
    }

    /// Committed pages, oldest first.
    pub fn active_pages(&self) -> Vec<u8, PAGE_COUNT> {
        let mut active: Vec<u8, PAGE_COUNT> = (0..PAGE_COUNT as u8)
            .filter(|page| self.pages[*page as usize].state == PageState::Active)
            .collect();
        active.sort_unstable_by(|a, b| {
            let (a, b) = (self.pages[*a as usize].sequence, self.pages[*b as usize].sequence);
            if a == b {
                core::cmp::Ordering::Equal
            } else if page::newer(a, b) {
                core::cmp::Ordering::Greater
            } else {
                core::cmp::Ordering::Less
            }
        });
        active
    }

    /// Read the page headers, pick the current page, finish interrupted
    /// erases and compactions, and find the end of the log.
    pub fn mount(&mut self) -> Result<()> {
        for page in 0..PAGE_COUNT as u8 {
            self.pages[page as usize] = self.read_header(page)?;
        }
        self.erasing = None;

        self.current = None;
        for page in 0..PAGE_COUNT as u8 {
            let header = self.pages[page as usize];
            if header.state != PageState::Active {
                continue;
            }
            match self.current {
                Some(current)
                    if !page::newer(header.sequence, self.pages[current as usize].sequence) => {}
                _ => self.current = Some(page),
            }
        }

        match self.current {
            Some(current) => {
                let pending = self.pages[current as usize].peer_erase_pending();
                for page in (0..PAGE_COUNT as u8).filter(|page| *page != current) {
                    let stale = match self.pages[page as usize].state {
                        PageState::Erased => pending,
                        PageState::Active | PageState::Filling | PageState::Invalid => true,
                    };
                    if stale {
                        info!("page {} is stale, erasing", page);
                        // the log is usable without it; a failed erase stays pending
                        if let Err(_e) = self.erase(page) {
                            warn!("erase of page {} failed: {:?}", page, _e);
                        }
                    }
                }
            }
            None => self.format()?,
        }

        let current = self.current_page()?;
        self.write_offset = self.find_end(current)?;
        info!(
            "mounted page {} seq {} ({} bytes free)",
            current,
            self.pages[current as usize].sequence,
            self.free_space()
        );
        Ok(())
    }

    fn format(&mut self) -> Result<()> {
        info!("no active page, formatting");
        for page in 1..PAGE_COUNT as u8 {
            if self.pages[page as usize].state != PageState::Erased {
                if let Err(_e) = self.erase(page) {
                    warn!("erase of page {} failed: {:?}", page, _e);
                }
            }
        }
        self.ensure_blank(0)?;
        self.open_page(0, 1)?;
        self.commit_page(0)?;
        self.current = Some(0);
        Ok(())
    }

    fn find_end(&mut self, page: u8) -> Result<u32> {
        let mut offset = HEADER_LEN;
        loop {
            match self.scan(page, offset)? {
                Scan::Record { info, next } => {
                    if info.status != RecordStatus::Valid {
                        warn!("{:?} record at {}:{}", info.status, page, offset);
                    }
                    offset = next;
                }
                Scan::End => return Ok(offset),
                Scan::Broken => {
                    warn!("broken record header at {}:{}, page closed", page, offset);
                    return Ok(self.layout.page_size);
                }
            }
        }
    }

    /// Inspect the record starting at `offset` of `page`.
    pub fn scan(&mut self, page: u8, offset: u32) -> Result<Scan> {
        if page as usize >= PAGE_COUNT || offset < HEADER_LEN || offset % WORD as u32 != 0 {
            return Err(Error::OutOfRange);
        }
        let page_size = self.layout.page_size;
        if offset + RECORD_HEADER_LEN + RECORD_TRAILER_LEN > page_size {
            return Ok(Scan::End);
        }

        let base = self.address(page, offset);
        let mut raw = [0u8; RECORD_HEADER_LEN as usize];
        self.read_raw(base, &mut raw)?;
        if raw.iter().all(|b| *b == 0xFF) {
            return Ok(Scan::End);
        }

        let header = RecordHeader::decode(&raw);
        if !header.id.is_valid()
            || header.length as usize > self.layout.max_payload()
            || offset + header.span() > page_size
        {
            return Ok(Scan::Broken);
        }

        let status = self.check_record(base, &raw, header.length as usize)?;
        Ok(Scan::Record {
            info: RecordInfo {
                position: Position::new(page, offset),
                header,
                status,
            },
            next: offset + header.span(),
        })
    }

    fn check_record(
        &mut self,
        base: u32,
        raw: &[u8; RECORD_HEADER_LEN as usize],
        length: usize,
    ) -> Result<RecordStatus> {
        let stored = self.read_word(base + RECORD_HEADER_LEN + align_up(length) as u32)?;
        if stored == BLANK {
            return Ok(RecordStatus::Torn);
        }

        let mut digest = CASTAGNOLI.digest();
        digest.update(raw);
        let mut buf = [0u8; CHUNK];
        let mut addr = base + RECORD_HEADER_LEN;
        let mut remaining = length;
        while remaining > 0 {
            let n = min(CHUNK, remaining);
            self.read_raw(addr, &mut buf[..n])?;
            digest.update(&buf[..n]);
            addr += n as u32;
            remaining -= n;
        }

        if digest.finalize() == stored {
            Ok(RecordStatus::Valid)
        } else {
            Ok(RecordStatus::Corrupt)
        }
    }

    /// Start a streamed record of exactly `length` payload bytes.
    pub fn begin_record(
        &mut self,
        id: DatasetId,
        version: u16,
        length: usize,
    ) -> Result<RecordWriter<'_, F>> {
        if !id.is_valid() {
            return Err(Error::OutOfRange);
        }
        if length > self.layout.max_payload() {
            return Err(Error::TooLarge);
        }
        self.start_record(RecordHeader::new(id, version, length as u16))
    }

    pub fn append(&mut self, id: DatasetId, version: u16, payload: &[u8]) -> Result<Position> {
        let mut writer = self.begin_record(id, version, payload.len())?;
        writer.write(payload)?;
        writer.finish()
    }

    /// Append a record marking `id` as removed.
    pub fn append_tombstone(&mut self, id: DatasetId) -> Result<Position> {
        if !id.is_valid() {
            return Err(Error::OutOfRange);
        }
        self.start_record(RecordHeader::tombstone(id))?.finish()
    }

    fn start_record(&mut self, header: RecordHeader) -> Result<RecordWriter<'_, F>> {
        let page = self.current_page()?;
        if header.span() > self.free_space() {
            return Err(Error::NoSpace);
        }

        let position = Position::new(page, self.write_offset);
        let base = self.address(page, self.write_offset);
        // reserve first, a failed write below must not be overwritten later
        self.write_offset += header.span();

        let raw = header.encode();
        self.write_raw(base, &raw)?;
        let mut digest = CASTAGNOLI.digest();
        digest.update(&raw);

        trace!(
            "record {:04x} v{} len {} at {}:{}",
            header.id.0,
            header.version,
            header.length,
            position.page,
            position.offset
        );

        Ok(RecordWriter {
            store: self,
            position,
            cursor: base + RECORD_HEADER_LEN,
            remaining: header.length as usize,
            pending: [0xFF; WORD],
            pending_len: 0,
            digest,
        })
    }

    /// Open the record at `position` for streamed reading.
    pub fn open(&mut self, position: Position) -> Result<RecordReader<'_, F>> {
        let limit = self.readable_limit(position.page)?;
        if position.offset < HEADER_LEN
            || position.offset % WORD as u32 != 0
            || position.offset + RECORD_HEADER_LEN > limit
        {
            return Err(Error::OutOfRange);
        }

        let base = self.address(position.page, position.offset);
        let mut raw = [0u8; RECORD_HEADER_LEN as usize];
        self.read_raw(base, &mut raw)?;
        let header = RecordHeader::decode(&raw);
        if !header.id.is_valid()
            || header.length as usize > self.layout.max_payload()
            || position.offset + header.span() > limit
        {
            return Err(Error::Corrupt);
        }

        let mut digest = CASTAGNOLI.digest();
        digest.update(&raw);
        let mut reader = RecordReader {
            store: self,
            header,
            position,
            cursor: base + RECORD_HEADER_LEN,
            remaining: header.length as usize,
            trailer: base + RECORD_HEADER_LEN + align_up(header.length as usize) as u32,
            digest,
        };
        if reader.remaining == 0 {
            reader.verify()?;
        }
        Ok(reader)
    }

    /// Read a whole record payload, verifying its CRC.
    pub fn read<const N: usize>(&mut self, position: Position) -> Result<Bytes<N>> {
        let mut reader = self.open(position)?;
        if reader.len() > N {
            return Err(Error::TooLarge);
        }

        let mut payload = Bytes::<N>::new();
        let mut buf = [0u8; CHUNK];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            payload
                .extend_from_slice(&buf[..n])
                .map_err(|_| Error::TooLarge)?;
        }
        Ok(payload)
    }

    fn readable_limit(&self, page: u8) -> Result<u32> {
        let current = self.current_page()?;
        match self.pages.get(page as usize) {
            Some(_) if page == current => Ok(self.write_offset),
            Some(header) if header.state == PageState::Active => Ok(self.layout.page_size),
            _ => Err(Error::OutOfRange),
        }
    }

    /// Erase a page that is not the current one.
    ///
    /// The erase is flagged in the current page header before it starts and
    /// stays pending (see [`Self::erase_pending`]) if the flash reports a
    /// failure.
    pub fn erase(&mut self, page: u8) -> Result<()> {
        if page as usize >= PAGE_COUNT || Some(page) == self.current {
            return Err(Error::OutOfRange);
        }

        let current = self.current;
        if let Some(current) = current {
            if !self.pages[current as usize].peer_erase_started {
                self.write_word(current, PEER_ERASE_STARTED_OFFSET, MARK)?;
                self.pages[current as usize].peer_erase_started = true;
            }
        }

        self.erasing = Some(page);
        let range = self.layout.page_range(page);
        debug!("erasing page {} ({:x}..{:x})", page, range.start, range.end);
        self.flash.erase(range.start, range.end).map_err(|_e| {
            error!("erase of page {} failed: {:?}", page, _e);
            Error::EraseFailure
        })?;
        self.erasing = None;
        self.pages[page as usize] = PageHeader::ERASED;

        if let Some(current) = current {
            if self.pages[current as usize].peer_erase_pending() {
                self.write_word(current, PEER_ERASE_DONE_OFFSET, MARK)?;
                self.pages[current as usize].peer_erase_done = true;
            }
        }
        Ok(())
    }

    pub fn retry_erase(&mut self) -> Result<()> {
        match self.erasing {
            Some(page) => self.erase(page),
            None => Ok(()),
        }
    }

    /// Copy the records at `live` into the alternate page, make it current and
    /// erase the old page.
    ///
    /// Once the copy is committed the rotation is complete: an
    /// `EraseFailure` afterwards only means the old page is still pending.
    pub fn rotate(&mut self, live: &[Position]) -> Result<()> {
        let old = self.current_page()?;
        let target = (old + 1) % PAGE_COUNT as u8;
        let sequence = self.pages[old as usize].sequence.wrapping_add(1);
        info!("rotating page {} -> {} ({} records)", old, target, live.len());

        self.ensure_blank(target)?;
        self.open_page(target, sequence)?;

        let mut offset = HEADER_LEN;
        for position in live {
            offset = self.copy_record(*position, target, offset)?;
        }

        self.commit_page(target)?;
        self.current = Some(target);
        self.write_offset = offset;
        info!("page {} committed, {} bytes free", target, self.free_space());

        self.erase(old)
    }

    fn copy_record(&mut self, source: Position, page: u8, offset: u32) -> Result<u32> {
        let header = self.open(source)?.header();
        let span = header.span();
        if offset + span > self.layout.page_size {
            return Err(Error::NoSpace);
        }

        let from = self.address(source.page, source.offset);
        let to = self.address(page, offset);
        let mut buf = [0u8; CHUNK];
        let mut done = 0;
        while done < span {
            let n = min(CHUNK as u32, span - done);
            self.read_raw(from + done, &mut buf[..n as usize])?;
            self.write_raw(to + done, &buf[..n as usize])?;
            done += n;
        }
        Ok(offset + span)
    }

    fn ensure_blank(&mut self, page: u8) -> Result<()> {
        if !self.is_blank(page)? {
            self.erase(page)?;
        }
        Ok(())
    }

    fn is_blank(&mut self, page: u8) -> Result<bool> {
        let range = self.layout.page_range(page);
        let mut buf = [0u8; CHUNK];
        let mut addr = range.start;
        while addr < range.end {
            let n = min(CHUNK as u32, range.end - addr) as usize;
            self.read_raw(addr, &mut buf[..n])?;
            if buf[..n].iter().any(|b| *b != 0xFF) {
                return Ok(false);
            }
            addr += n as u32;
        }
        Ok(true)
    }

    fn open_page(&mut self, page: u8, sequence: u32) -> Result<()> {
        let mut raw = [0u8; 8];
        raw[..4].copy_from_slice(&MAGIC.to_le_bytes());
        raw[4..].copy_from_slice(&sequence.to_le_bytes());
        self.write_raw(self.address(page, MAGIC_OFFSET), &raw)?;
        self.pages[page as usize] = PageHeader::filling(sequence);
        Ok(())
    }

    fn commit_page(&mut self, page: u8) -> Result<()> {
        self.write_word(page, COMMIT_OFFSET, MARK)?;
        self.pages[page as usize].state = PageState::Active;
        Ok(())
    }

    fn read_header(&mut self, page: u8) -> Result<PageHeader> {
        let mut raw = [0u8; HEADER_LEN as usize];
        self.read_raw(self.address(page, 0), &mut raw)?;
        Ok(PageHeader::parse(&raw))
    }

    fn address(&self, page: u8, offset: u32) -> u32 {
        self.layout.page_range(page).start + offset
    }

    fn read_word(&mut self, addr: u32) -> Result<u32> {
        let mut raw = [0u8; WORD];
        self.read_raw(addr, &mut raw)?;
        Ok(page::word(&raw, 0))
    }

    fn write_word(&mut self, page: u8, offset: u32, value: u32) -> Result<()> {
        self.write_raw(self.address(page, offset), &value.to_le_bytes())
    }

    /// Read at any address, going through aligned words where needed.
    fn read_raw(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let mut done = 0;
        while done < buf.len() {
            let at = addr + done as u32;
            let skip = at as usize % WORD;
            let left = buf.len() - done;
            if skip == 0 && left >= WORD {
                let n = left - left % WORD;
                self.flash
                    .read(at, &mut buf[done..done + n])
                    .map_err(|_e| {
                        error!("flash read at {:x} failed: {:?}", at, _e);
                        Error::ReadFailure
                    })?;
                done += n;
            } else {
                let mut word = [0u8; WORD];
                self.flash
                    .read(at - skip as u32, &mut word)
                    .map_err(|_e| {
                        error!("flash read at {:x} failed: {:?}", at, _e);
                        Error::ReadFailure
                    })?;
                let n = min(WORD - skip, left);
                buf[done..done + n].copy_from_slice(&word[skip..skip + n]);
                done += n;
            }
        }
        Ok(())
    }

    fn write_raw(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        debug_assert!(addr as usize % WORD == 0 && data.len() % WORD == 0);
        self.flash.write(addr, data).map_err(|_e| {
            error!("flash write at {:x} failed: {:?}", addr, _e);
            Error::WriteFailure
        })
    }
}

/// Streams the payload of one record into flash.
///
/// Dropping the writer before [`RecordWriter::finish`] leaves a torn record.
pub struct RecordWriter<'a, F: NorFlash> {
    store: &'a mut LogStore<F>,
    position: Position,
    cursor: u32,
    remaining: usize,
    pending: [u8; WORD],
    pending_len: usize,
    digest: Digest<'static, u32>,
}

impl<'a, F: NorFlash> RecordWriter<'a, F> {
    pub fn position(&self) -> Position {
        self.position
    }

    /// Payload bytes still expected.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.remaining {
            return Err(Error::LengthMismatch);
        }
        self.digest.update(data);
        self.remaining -= data.len();

        let mut data = data;
        if self.pending_len > 0 {
            let n = min(WORD - self.pending_len, data.len());
            self.pending[self.pending_len..self.pending_len + n].copy_from_slice(&data[..n]);
            self.pending_len += n;
            data = &data[n..];
            if self.pending_len < WORD {
                // data is used up, the word is still open
                return Ok(());
            }
            self.flush_pending()?;
        }

        let whole = data.len() - data.len() % WORD;
        if whole > 0 {
            self.store.write_raw(self.cursor, &data[..whole])?;
            self.cursor += whole as u32;
        }

        let rest = &data[whole..];
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        let word = self.pending;
        self.store.write_raw(self.cursor, &word)?;
        self.cursor += WORD as u32;
        self.pending = [0xFF; WORD];
        self.pending_len = 0;
        Ok(())
    }

    /// Pad the payload and write the CRC, closing the record.
    pub fn finish(mut self) -> Result<Position> {
        if self.remaining != 0 {
            return Err(Error::LengthMismatch);
        }
        if self.pending_len > 0 {
            self.pending[self.pending_len..].fill(0xFF);
            self.flush_pending()?;
        }
        let crc = self.digest.finalize();
        self.store.write_raw(self.cursor, &crc.to_le_bytes())?;
        Ok(self.position)
    }
}

/// Streams the payload of one record out of flash.
///
/// The CRC is checked when the last payload byte has been read.
pub struct RecordReader<'a, F: NorFlash> {
    store: &'a mut LogStore<F>,
    header: RecordHeader,
    position: Position,
    cursor: u32,
    remaining: usize,
    trailer: u32,
    digest: Digest<'static, u32>,
}

impl<'a, F: NorFlash> RecordReader<'a, F> {
    pub fn header(&self) -> RecordHeader {
        self.header
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Payload length.
    pub fn len(&self) -> usize {
        self.header.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.length == 0
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Read the next payload bytes into `buf`, returning 0 at the end.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = min(buf.len(), self.remaining);
        if n == 0 {
            return Ok(0);
        }
        self.store.read_raw(self.cursor, &mut buf[..n])?;
        self.digest.update(&buf[..n]);
        self.cursor += n as u32;
        self.remaining -= n;
        if self.remaining == 0 {
            self.verify()?;
        }
        Ok(n)
    }

    fn verify(&mut self) -> Result<()> {
        let stored = self.store.read_word(self.trailer)?;
        let digest = mem::replace(&mut self.digest, CASTAGNOLI.digest());
        if digest.finalize() != stored {
            warn!(
                "crc mismatch in record {:04x} at {}:{}",
                self.header.id.0, self.position.page, self.position.offset
            );
            return Err(Error::Corrupt);
        }
        Ok(())
    }
}
