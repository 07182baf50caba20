use nvram::{Layout, Nvram, RamFlash};
use tc_swap::{
    backup_to_nvram, load_bookkeeping, restore_from_nvram, save_bookkeeping, BindingDestination,
    BindingEntry, DeviceEntry, DirtyFlags, Error, ExtendedAddress, ExtendedPanId, SwapState,
    TcDatabase, TcIdentity, DB_VERSION, TC_BACKUP_DATASET, TC_SWAP_BOOKKEEPING,
};

const PAGE: u32 = 2048;
type Flash = RamFlash<{ 2 * PAGE as usize }>;

const TC: TcIdentity = TcIdentity {
    address: ExtendedAddress(0x0011_2233_4455_6677),
    extended_pan_id: ExtendedPanId(0x0102_0304_0506_0708),
};

fn mounted(flash: Flash) -> Nvram<Flash> {
    let mut nvram = Nvram::new(flash, Layout::new(0, PAGE)).unwrap();
    nvram.mount().unwrap();
    nvram
}

fn database(devices: u8) -> TcDatabase {
    let mut db = TcDatabase::new(TC);
    for n in 0..devices {
        let entry = DeviceEntry::new(ExtendedAddress(0xA000 + n as u64)).with_hashed_key([n; 16]);
        db.upsert_device(entry).unwrap();
    }
    db.add_binding(BindingEntry {
        source_endpoint: 1,
        cluster_id: 0x0500,
        destination: BindingDestination::Group(0x0042),
    })
    .unwrap();
    db
}

#[test]
fn backup_survives_a_reboot() {
    let db = database(3);
    let mut swap: SwapState = SwapState::default();
    let mut nvram = mounted(Flash::new());

    backup_to_nvram(&mut swap, &db, &mut nvram, TC_BACKUP_DATASET).unwrap();
    assert!(!swap.is_busy());
    let entry = nvram.locate(TC_BACKUP_DATASET).unwrap();
    assert_eq!(entry.version, DB_VERSION as u16);
    assert_eq!(entry.length as usize, tc_swap::stream_len(3, Some(1)));

    let mut nvram = mounted(nvram.release());
    let mut swap: SwapState = SwapState::default();
    let mut target: TcDatabase = TcDatabase::new(TcIdentity::default());
    restore_from_nvram(&mut swap, &mut nvram, TC_BACKUP_DATASET, &mut target, true).unwrap();
    assert_eq!(target, db);
    assert!(!swap.is_busy());
}

#[test]
fn newest_backup_wins_across_compactions() {
    let mut swap: SwapState = SwapState::default();
    let mut nvram = mounted(Flash::new());

    for devices in 1..=12 {
        // record header, trailer and padding come on top of the stream
        let needed = tc_swap::stream_len(devices as usize, Some(1)) + 16;
        if nvram.needs_compaction() || (nvram.free_space() as usize) < needed {
            nvram.compact().unwrap();
        }
        backup_to_nvram(&mut swap, &database(devices), &mut nvram, TC_BACKUP_DATASET).unwrap();
    }
    assert!(nvram.store().flash().erase_count() > 0);

    let mut nvram = mounted(nvram.release());
    let mut target: TcDatabase = TcDatabase::new(TC);
    restore_from_nvram(&mut swap, &mut nvram, TC_BACKUP_DATASET, &mut target, false).unwrap();
    assert_eq!(target, database(12));
}

#[test]
fn damaged_record_is_rejected() {
    let db = database(2);
    let mut swap: SwapState = SwapState::default();
    let mut nvram = mounted(Flash::new());
    let position = backup_to_nvram(&mut swap, &db, &mut nvram, TC_BACKUP_DATASET).unwrap();

    // a device address inside the payload
    let at = Layout::new(0, PAGE).page_range(position.page).start + position.offset + 8 + 25;
    nvram.store_mut().flash_mut().as_bytes_mut()[at as usize] ^= 0x10;

    let live: TcDatabase = TcDatabase::new(TC);
    let mut target = live.clone();
    assert_eq!(
        restore_from_nvram(&mut swap, &mut nvram, TC_BACKUP_DATASET, &mut target, true),
        Err(Error::Nvram(nvram::Error::Corrupt))
    );
    assert_eq!(target, live);
    assert!(!swap.is_busy());
}

#[test]
fn nothing_to_restore() {
    let mut swap: SwapState = SwapState::default();
    let mut nvram = mounted(Flash::new());
    let mut target: TcDatabase = TcDatabase::new(TC);
    assert_eq!(
        restore_from_nvram(&mut swap, &mut nvram, TC_BACKUP_DATASET, &mut target, true),
        Err(Error::Nvram(nvram::Error::NotFound))
    );
    assert!(!swap.is_busy());
    assert!(swap.begin_restore(false).is_ok());
}

#[test]
fn backup_too_large_for_a_page() {
    let mut nvram = Nvram::new(Flash::new(), Layout::new(0, 512)).unwrap();
    nvram.mount().unwrap();
    let mut swap: SwapState = SwapState::default();
    swap.mark_dirty(DirtyFlags::DEVICES);

    assert_eq!(
        backup_to_nvram(&mut swap, &database(8), &mut nvram, TC_BACKUP_DATASET),
        Err(Error::Nvram(nvram::Error::TooLarge))
    );
    assert!(!swap.is_busy());
    assert!(!nvram.contains(TC_BACKUP_DATASET));
    // the failed attempt does not count
    assert_eq!(swap.dirty(), DirtyFlags::DEVICES);
    assert_eq!(swap.completed_backups(), 0);
}

#[test]
fn bookkeeping_persists() {
    let mut nvram = mounted(Flash::new());
    let mut swap: SwapState = SwapState::default();

    // nothing stored yet
    load_bookkeeping(&mut swap, &mut nvram).unwrap();
    assert_eq!(swap.completed_backups(), 0);
    assert!(!swap.backup_required());

    backup_to_nvram(&mut swap, &database(1), &mut nvram, TC_BACKUP_DATASET).unwrap();
    swap.mark_dirty(DirtyFlags::BINDINGS | DirtyFlags::TC_IDENTITY);
    save_bookkeeping(&swap, &mut nvram).unwrap();
    assert!(nvram.contains(TC_SWAP_BOOKKEEPING));

    let mut nvram = mounted(nvram.release());
    let mut restarted: SwapState = SwapState::default();
    load_bookkeeping(&mut restarted, &mut nvram).unwrap();
    assert_eq!(restarted.completed_backups(), 1);
    assert_eq!(restarted.dirty(), DirtyFlags::BINDINGS | DirtyFlags::TC_IDENTITY);
    assert_eq!(restarted.bookkeeping(), swap.bookkeeping());
}
