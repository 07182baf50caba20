use serde::{Deserialize, Serialize};

/// Identifier of a logical dataset.
///
/// Ids below [`DatasetId::APPLICATION_BASE`] belong to the stack, ids at or
/// above it to the application. `0xFFFF` reads as erased flash and can never
/// be stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub u16);

impl DatasetId {
    pub const APPLICATION_BASE: u16 = 0x8000;
    pub const RESERVED: Self = Self(0xFFFF);

    pub const fn application(offset: u16) -> Self {
        Self(Self::APPLICATION_BASE | (offset & 0x7FFF))
    }

    pub const fn is_application(&self) -> bool {
        self.0 >= Self::APPLICATION_BASE && self.0 != Self::RESERVED.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != Self::RESERVED.0
    }
}

/// Location of a record: page index and byte offset of the record header
/// relative to the page start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub page: u8,
    pub offset: u32,
}

impl Position {
    pub const fn new(page: u8, offset: u32) -> Self {
        Self { page, offset }
    }
}
