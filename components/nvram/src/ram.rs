use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};

const ERASED: u8 = 0xFF;

/// RAM-backed NOR flash for tests and host simulations.
///
/// Writes may only clear bits, erases set whole sectors back to `0xFF`.
/// Faults can be injected to simulate a failing erase or a power cut.
pub struct RamFlash<const SIZE: usize> {
    memory: [u8; SIZE],
    erases: usize,
    fail_next_erase: bool,
    write_budget: Option<usize>,
}

impl<const SIZE: usize> RamFlash<SIZE> {
    pub const fn new() -> Self {
        Self {
            memory: [ERASED; SIZE],
            erases: 0,
            fail_next_erase: false,
            write_budget: None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.memory
    }

    /// Raw access, bypassing the NOR rules (e.g. to flip bits).
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    /// Number of sectors erased so far.
    pub fn erase_count(&self) -> usize {
        self.erases
    }

    /// Let the next erase clear only the first sector of its range and fail.
    pub fn fail_next_erase(&mut self) {
        self.fail_next_erase = true;
    }

    /// Accept `words` more word writes, then fail every write until
    /// [`Self::restore_power`].
    pub fn cut_power_after(&mut self, words: usize) {
        self.write_budget = Some(words);
    }

    pub fn restore_power(&mut self) {
        self.write_budget = None;
    }

    fn check(&self, offset: u32, length: usize, align: usize) -> Result<(), NorFlashErrorKind> {
        if offset as usize % align != 0 || length % align != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if offset as usize + length > SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(())
    }
}

impl<const SIZE: usize> Default for RamFlash<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> ErrorType for RamFlash<SIZE> {
    type Error = NorFlashErrorKind;
}

impl<const SIZE: usize> ReadNorFlash for RamFlash<SIZE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len(), Self::READ_SIZE)?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.memory[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl<const SIZE: usize> NorFlash for RamFlash<SIZE> {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 256;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from > to {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.check(from, (to - from) as usize, Self::ERASE_SIZE)?;

        let (from, to) = (from as usize, to as usize);
        if self.fail_next_erase {
            self.fail_next_erase = false;
            let end = (from + Self::ERASE_SIZE).min(to);
            self.memory[from..end].fill(ERASED);
            self.erases += 1;
            return Err(NorFlashErrorKind::Other);
        }

        self.memory[from..to].fill(ERASED);
        self.erases += (to - from) / Self::ERASE_SIZE;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check(offset, bytes.len(), Self::WRITE_SIZE)?;

        let start = offset as usize;
        for (chunk, at) in bytes
            .chunks(Self::WRITE_SIZE)
            .zip((start..).step_by(Self::WRITE_SIZE))
        {
            if let Some(budget) = self.write_budget.as_mut() {
                if *budget == 0 {
                    return Err(NorFlashErrorKind::Other);
                }
                *budget -= 1;
            }
            let target = &mut self.memory[at..at + chunk.len()];
            if target.iter().zip(chunk).any(|(old, new)| !old & new != 0) {
                return Err(NorFlashErrorKind::Other);
            }
            target.copy_from_slice(chunk);
        }
        Ok(())
    }
}
