//! Keeping backups and swap bookkeeping in NVRAM.

use embedded_storage::nor_flash::NorFlash;
use nvram::{DatasetId, Nvram, Position};
use serde::{Deserialize, Serialize};

use crate::format::DB_VERSION;
use crate::mic::Mic;
use crate::state::SwapState;
use crate::table::{TcTables, TcTablesMut};
use crate::{Error, Result};

pub const TC_BACKUP_DATASET: DatasetId = DatasetId(0x0030);
pub const TC_SWAP_BOOKKEEPING: DatasetId = DatasetId(0x0031);

const BOOKKEEPING_VERSION: u16 = 1;
const CHUNK: usize = 32;

/// Swap state that outlives a reboot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookkeeping {
    pub dirty: u8,
    pub completed_backups: u32,
}

/// Stream a backup of `tables` into the NVRAM dataset `id`.
///
/// The previous backup stays readable until the new one is complete.
pub fn backup_to_nvram<const D: usize, const B: usize, M, T, F>(
    swap: &mut SwapState<D, B, M>,
    tables: &T,
    nvram: &mut Nvram<F>,
    id: DatasetId,
) -> Result<Position>
where
    M: Mic,
    T: TcTables,
    F: NorFlash,
{
    let total = swap.begin_backup(tables)?;
    let result = stream_backup(swap, tables, nvram, id, total);
    if result.is_err() {
        swap.abort();
    }
    result
}

fn stream_backup<const D: usize, const B: usize, M, T, F>(
    swap: &mut SwapState<D, B, M>,
    tables: &T,
    nvram: &mut Nvram<F>,
    id: DatasetId,
    total: usize,
) -> Result<Position>
where
    M: Mic,
    T: TcTables,
    F: NorFlash,
{
    let mut writer = nvram.begin_write(id, DB_VERSION as u16, total)?;
    let mut chunk = [0u8; CHUNK];
    loop {
        let n = swap.get_chunk(tables, &mut chunk)?;
        if n == 0 {
            break;
        }
        writer.write(&chunk[..n])?;
    }
    let position = writer.finish()?;
    debug!("backup stored at {}:{}", position.page, position.offset);
    Ok(position)
}

/// Restore `tables` from the backup held in NVRAM dataset `id`.
pub fn restore_from_nvram<const D: usize, const B: usize, M, T, F>(
    swap: &mut SwapState<D, B, M>,
    nvram: &mut Nvram<F>,
    id: DatasetId,
    tables: &mut T,
    change_address: bool,
) -> Result<()>
where
    M: Mic,
    T: TcTablesMut,
    F: NorFlash,
{
    swap.begin_restore(change_address)?;
    let result = stream_restore(swap, nvram, id).and_then(|_| swap.finish(tables));
    if result.is_err() {
        swap.abort();
    }
    result
}

fn stream_restore<const D: usize, const B: usize, M, F>(
    swap: &mut SwapState<D, B, M>,
    nvram: &mut Nvram<F>,
    id: DatasetId,
) -> Result<()>
where
    M: Mic,
    F: NorFlash,
{
    let mut reader = nvram.open(id)?;
    let mut chunk = [0u8; CHUNK];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        swap.put_chunk(&chunk[..n])?;
    }
}

pub fn save_bookkeeping<const D: usize, const B: usize, M, F>(
    swap: &SwapState<D, B, M>,
    nvram: &mut Nvram<F>,
) -> Result<()>
where
    M: Mic,
    F: NorFlash,
{
    nvram.write_dataset(TC_SWAP_BOOKKEEPING, BOOKKEEPING_VERSION, &swap.bookkeeping())?;
    Ok(())
}

/// Load the bookkeeping into `swap`; a device without any keeps the
/// defaults.
pub fn load_bookkeeping<const D: usize, const B: usize, M, F>(
    swap: &mut SwapState<D, B, M>,
    nvram: &mut Nvram<F>,
) -> Result<()>
where
    M: Mic,
    F: NorFlash,
{
    match nvram.read_dataset::<Bookkeeping>(TC_SWAP_BOOKKEEPING) {
        Ok((_version, bookkeeping)) => {
            swap.apply_bookkeeping(&bookkeeping);
            Ok(())
        }
        Err(nvram::Error::NotFound) => Ok(()),
        Err(error) => Err(Error::Nvram(error)),
    }
}
