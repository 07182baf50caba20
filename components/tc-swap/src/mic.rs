use core::mem;

use crc::{Crc, Digest, CRC_32_ISCSI};

use crate::format::MIC_LEN;

/// Integrity code computed over a backup stream.
pub trait Mic: Default {
    fn update(&mut self, data: &[u8]);

    /// Code over everything passed to `update` since the last call; the
    /// state starts over afterwards.
    fn finalize(&mut self) -> [u8; MIC_LEN];
}

static CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// CRC-32/ISCSI, emitted little-endian.
pub struct Crc32Mic {
    digest: Digest<'static, u32>,
}

impl Default for Crc32Mic {
    fn default() -> Self {
        Self {
            digest: CASTAGNOLI.digest(),
        }
    }
}

impl Mic for Crc32Mic {
    fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    fn finalize(&mut self) -> [u8; MIC_LEN] {
        mem::replace(&mut self.digest, CASTAGNOLI.digest())
            .finalize()
            .to_le_bytes()
    }
}
