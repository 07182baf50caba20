pub(crate) const HEADER_LEN: u32 = 20;

pub(crate) const MAGIC: u32 = 0x4E56_524D;
pub(crate) const BLANK: u32 = 0xFFFF_FFFF;
pub(crate) const MARK: u32 = 0;

pub(crate) const MAGIC_OFFSET: u32 = 0;
pub(crate) const COMMIT_OFFSET: u32 = 8;
pub(crate) const PEER_ERASE_STARTED_OFFSET: u32 = 12;
pub(crate) const PEER_ERASE_DONE_OFFSET: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageState {
    /// Header is blank.
    Erased,
    /// Committed page holding a valid log.
    Active,
    /// Header written but never committed: an interrupted compaction.
    Filling,
    /// Neither blank nor a recognizable header.
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageHeader {
    pub state: PageState,
    pub sequence: u32,
    pub peer_erase_started: bool,
    pub peer_erase_done: bool,
}

impl PageHeader {
    pub(crate) const ERASED: Self = Self {
        state: PageState::Erased,
        sequence: 0,
        peer_erase_started: false,
        peer_erase_done: false,
    };

    pub(crate) fn filling(sequence: u32) -> Self {
        Self {
            state: PageState::Filling,
            sequence,
            ..Self::ERASED
        }
    }

    pub(crate) fn parse(raw: &[u8; HEADER_LEN as usize]) -> Self {
        let magic = word(raw, 0);
        let sequence = word(raw, 4);
        let commit = word(raw, 8);
        let started = word(raw, 12);
        let done = word(raw, 16);

        let state = if raw.iter().all(|b| *b == 0xFF) {
            PageState::Erased
        } else if magic == MAGIC && commit == MARK {
            PageState::Active
        } else if magic == MAGIC && commit == BLANK {
            PageState::Filling
        } else {
            PageState::Invalid
        };

        Self {
            state,
            sequence,
            peer_erase_started: started == MARK,
            peer_erase_done: done == MARK,
        }
    }

    /// The alternate page still has to be erased, as recorded in this header.
    pub fn peer_erase_pending(&self) -> bool {
        self.peer_erase_started && !self.peer_erase_done
    }
}

/// Sequence comparison that survives wrap-around.
pub(crate) fn newer(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) > 0
}

pub(crate) fn word(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}
