use std::vec::Vec;

use rand::{thread_rng, Rng};

use crate::{
    BindingDestination, BindingEntry, ByteOrder, Crc32Mic, DeviceEntry, DirtyFlags, Error,
    ErrorKind, ExtendedAddress, ExtendedPanId, InitialJoinAuth, InstallCode, InstallCodeType,
    KeyAttribute, KeyUpdateMethod, Mic, Stage, SwapConfig, SwapState, TcDatabase, TcIdentity,
    TcTables, DEVICE_LEN, GLOBAL_LEN,
};

const TC: TcIdentity = TcIdentity {
    address: ExtendedAddress(0x0011_2233_4455_6677),
    extended_pan_id: ExtendedPanId(0xDEAD_BEEF_0000_0001),
};

const REPLACEMENT: TcIdentity = TcIdentity {
    address: ExtendedAddress(0x8899_AABB_CCDD_EEFF),
    extended_pan_id: ExtendedPanId(0),
};

fn key(seed: u8) -> [u8; 16] {
    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = seed.wrapping_add(i as u8);
    }
    key
}

fn device(n: u8) -> DeviceEntry {
    DeviceEntry::new(ExtendedAddress(0x00_0D6F_0000_0000 + n as u64)).with_hashed_key(key(n))
}

fn full_device() -> DeviceEntry {
    let mut raw = [0u8; 18];
    raw[..16].copy_from_slice(&key(0x40));
    raw[16..].copy_from_slice(&[0xC3, 0x3C]);
    DeviceEntry {
        key_attribute: KeyAttribute::Verified,
        initial_join_auth: InitialJoinAuth::InstallCodeKey,
        key_update_method: KeyUpdateMethod::HashedTclk,
        ..device(0xF0)
    }
    .with_previous_hashed_key(key(0x20))
    .with_passphrase(key(0x30))
    .with_install_code(InstallCode::new(InstallCodeType::Bits128, &raw).unwrap())
}

fn database() -> TcDatabase {
    let mut db: TcDatabase = TcDatabase::new(TC);
    db.upsert_device(device(1)).unwrap();
    db.upsert_device(device(2)).unwrap();
    db.upsert_device(full_device()).unwrap();
    db.add_binding(BindingEntry {
        source_endpoint: 1,
        cluster_id: 0x0006,
        destination: BindingDestination::Group(0x1234),
    })
    .unwrap();
    db.add_binding(BindingEntry {
        source_endpoint: 2,
        cluster_id: 0x0402,
        destination: BindingDestination::Device {
            address: ExtendedAddress(0x00_0D6F_0000_0001),
            endpoint: 8,
        },
    })
    .unwrap();
    db
}

fn backup<T: TcTables>(swap: &mut SwapState, tables: &T, chunk: usize) -> Vec<u8> {
    let total = swap.begin_backup(tables).unwrap();
    let mut stream = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = swap.get_chunk(tables, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        assert!(swap.is_busy());
        stream.extend_from_slice(&buf[..n]);
    }
    assert_eq!(stream.len(), total);
    assert!(!swap.is_busy());
    stream
}

fn restore(
    swap: &mut SwapState,
    stream: &[u8],
    tables: &mut TcDatabase,
    chunk: usize,
    change_address: bool,
) -> Result<(), Error> {
    swap.begin_restore(change_address)?;
    for part in stream.chunks(chunk) {
        swap.put_chunk(part)?;
    }
    swap.finish(tables)
}

/// Recompute the MIC of a hand-edited stream.
fn reseal(stream: &mut [u8]) {
    let mut mic = Crc32Mic::default();
    mic.update(&stream[..19]);
    mic.update(&stream[GLOBAL_LEN..]);
    let code = mic.finalize();
    stream[19..GLOBAL_LEN].copy_from_slice(&code);
}

#[test]
fn round_trip() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 16);
    assert_eq!(stream.len(), 23 + 3 * 79 + 1 + 2 * 13);
    assert_eq!(swap.stage(), Stage::Done);

    let mut target: TcDatabase = TcDatabase::new(REPLACEMENT);
    restore(&mut swap, &stream, &mut target, 16, true).unwrap();
    assert_eq!(target, db);
    assert_eq!(swap.stage(), Stage::Done);
    assert!(!swap.is_busy());
}

#[test]
fn three_devices_without_bindings() {
    let mut db: TcDatabase = TcDatabase::new(TC);
    for n in 1..=3 {
        db.upsert_device(device(n)).unwrap();
    }
    let mut swap: SwapState = SwapState::new(SwapConfig {
        include_bindings: false,
        ..SwapConfig::DEFAULT
    });
    assert_eq!(swap.begin_backup(&db), Ok(260));
    swap.abort();

    let stream = backup(&mut swap, &db, 64);
    assert_eq!(stream.len(), 260);
    // little-endian producer, devices present, no bindings
    assert_eq!(stream[0], 0b010);
    assert_eq!(stream[1], 1);
    assert_eq!(stream[2], 3);
    assert_eq!(&stream[3..11], &TC.address.0.to_le_bytes()[..]);
    assert_eq!(&stream[23..31], &device(1).address.0.to_le_bytes()[..]);
    assert_eq!(&stream[23 + 13..23 + 29], &key(1)[..]);

    let mut target: TcDatabase = TcDatabase::new(TC);
    restore(&mut swap, &stream, &mut target, 260, false).unwrap();
    assert_eq!(target, db);
}

#[test]
fn chunk_size_does_not_matter() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let reference = backup(&mut swap, &db, 1);
    for chunk in [2, 7, 13, 22, 23, 24, 78, 79, 80, 500] {
        assert_eq!(backup(&mut swap, &db, chunk), reference, "chunk {}", chunk);

        let mut target: TcDatabase = TcDatabase::new(TC);
        restore(&mut swap, &reference, &mut target, chunk, false).unwrap();
        assert_eq!(target, db, "chunk {}", chunk);
    }
}

#[test]
fn any_corrupted_byte_is_a_mic_mismatch() {
    let mut db: TcDatabase = TcDatabase::new(TC);
    db.upsert_device(full_device()).unwrap();
    db.add_binding(BindingEntry {
        source_endpoint: 1,
        cluster_id: 6,
        destination: BindingDestination::Group(7),
    })
    .unwrap();

    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 32);

    let live = database();
    for at in 0..stream.len() {
        for bit in [0x01u8, 0x80] {
            let mut corrupted = stream.clone();
            corrupted[at] ^= bit;

            let mut target = live.clone();
            let result = restore(&mut swap, &corrupted, &mut target, 10, true);
            assert_eq!(result, Err(Error::MicMismatch), "byte {} bit {:02x}", at, bit);
            assert_eq!(target, live);
            assert_eq!(swap.failure(), Some(Error::MicMismatch));
            swap.abort();
        }
    }
}

#[test]
fn empty_trust_center() {
    let db = TcDatabase::<4, 4>::new(TC);
    let mut swap: SwapState = SwapState::new(SwapConfig {
        include_bindings: false,
        ..SwapConfig::DEFAULT
    });
    let stream = backup(&mut swap, &db, 100);
    assert_eq!(stream.len(), GLOBAL_LEN);
    assert_eq!(stream[0], 0);

    let mut target = database();
    swap.begin_restore(true).unwrap();
    swap.put_chunk(&stream).unwrap();
    // nothing follows the global section
    assert_eq!(swap.stage(), Stage::Done);
    swap.finish(&mut target).unwrap();
    assert!(target.devices().is_empty());
    // no binding section, the live bindings stay
    assert_eq!(target.bindings(), database().bindings());
    assert_eq!(target.identity(), TC);
}

#[test]
fn second_transaction_is_rejected() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let total = swap.begin_backup(&db).unwrap();

    let mut buf = [0u8; 40];
    assert_eq!(swap.get_chunk(&db, &mut buf), Ok(40));
    assert_eq!(swap.begin_restore(false), Err(Error::Busy));
    assert_eq!(swap.begin_backup(&db), Err(Error::Busy));
    assert_eq!(swap.set_config(SwapConfig::DEFAULT), Err(Error::Busy));
    assert_eq!(Error::Busy.kind(), ErrorKind::Busy);

    // the running backup is untouched
    let mut produced = 40;
    loop {
        match swap.get_chunk(&db, &mut buf).unwrap() {
            0 => break,
            n => produced += n,
        }
    }
    assert_eq!(produced, total);
    assert!(swap.begin_restore(false).is_ok());
}

#[test]
fn calls_out_of_order() {
    let db = database();
    let mut target = database();
    let mut swap: SwapState = SwapState::default();
    let mut buf = [0u8; 8];

    assert_eq!(swap.get_chunk(&db, &mut buf), Err(Error::NotStarted));
    assert_eq!(swap.put_chunk(&[0]), Err(Error::NotStarted));
    assert_eq!(swap.finish(&mut target), Err(Error::NotStarted));

    swap.begin_restore(false).unwrap();
    assert_eq!(swap.get_chunk(&db, &mut buf), Err(Error::NotStarted));
    swap.abort();

    swap.begin_backup(&db).unwrap();
    assert_eq!(swap.put_chunk(&[0]), Err(Error::NotStarted));
    assert_eq!(swap.finish(&mut target), Err(Error::NotStarted));
    assert_eq!(Error::NotStarted.kind(), ErrorKind::Usage);
}

#[test]
fn empty_output_buffer() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    swap.begin_backup(&db).unwrap();
    assert_eq!(swap.get_chunk(&db, &mut [0u8; 0]), Err(Error::BufferTooSmall));
    assert_eq!(Error::BufferTooSmall.kind(), ErrorKind::Capacity);

    // recoverable
    let mut buf = [0u8; 512];
    assert_eq!(swap.get_chunk(&db, &mut buf), Ok(swap.total_len()));
    assert_eq!(swap.get_chunk(&db, &mut buf), Ok(0));
}

#[test]
fn table_changes_during_backup() {
    let mut db = database();
    let mut swap: SwapState = SwapState::default();
    swap.begin_backup(&db).unwrap();

    let mut buf = [0u8; 30];
    swap.get_chunk(&db, &mut buf).unwrap();
    db.remove_device(device(2).address);
    assert_eq!(swap.get_chunk(&db, &mut buf), Err(Error::TableChanged));
    assert!(!swap.is_busy());
    assert_eq!(swap.get_chunk(&db, &mut buf), Err(Error::TableChanged));

    // same count, different content
    let mut db = database();
    swap.begin_backup(&db).unwrap();
    swap.get_chunk(&db, &mut buf).unwrap();
    db.upsert_device(device(2).with_passphrase(key(9))).unwrap();
    let mut result = Ok(1);
    while let Ok(n) = result {
        if n == 0 {
            break;
        }
        result = swap.get_chunk(&db, &mut buf);
    }
    assert_eq!(result, Err(Error::TableChanged));
}

#[test]
fn big_endian_producer() {
    let db = database();
    let mut producer: SwapState = SwapState::new(SwapConfig {
        byte_order: ByteOrder::BigEndian,
        ..SwapConfig::DEFAULT
    });
    let stream = backup(&mut producer, &db, 50);
    // flags mirrored: big-endian, devices, bindings
    assert_eq!(stream[0], 0b1110_0000);
    assert_eq!(&stream[3..11], &TC.address.0.to_be_bytes()[..]);
    assert_eq!(&stream[23..31], &device(1).address.0.to_be_bytes()[..]);
    // keys are byte strings
    assert_eq!(&stream[23 + 13..23 + 29], &key(1)[..]);

    let mut consumer: SwapState = SwapState::default();
    let mut target: TcDatabase = TcDatabase::new(REPLACEMENT);
    restore(&mut consumer, &stream, &mut target, 9, true).unwrap();
    assert_eq!(target, db);

    let little = backup(&mut consumer, &db, 50);
    assert_ne!(little, stream);
    assert_eq!(little.len(), stream.len());
}

#[test]
fn passphrases_left_out() {
    let db = database();
    let mut swap: SwapState = SwapState::new(SwapConfig {
        backup_passphrases: false,
        ..SwapConfig::DEFAULT
    });
    let stream = backup(&mut swap, &db, 64);
    let record = &stream[GLOBAL_LEN + 2 * DEVICE_LEN..][..DEVICE_LEN];
    assert_eq!(&record[45..61], &[0u8; 16][..]);
    assert_eq!(record[8] & 0b100, 0);

    let mut target: TcDatabase = TcDatabase::new(TC);
    restore(&mut swap, &stream, &mut target, 64, false).unwrap();
    let restored = target.find_device(full_device().address).unwrap();
    assert_eq!(restored.passphrase, None);
    assert_eq!(restored.hashed_key, full_device().hashed_key);
    assert_eq!(restored.install_code, full_device().install_code);
}

#[test]
fn address_kept_unless_asked() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 64);

    let mut target: TcDatabase = TcDatabase::new(REPLACEMENT);
    restore(&mut swap, &stream, &mut target, 64, false).unwrap();
    assert_eq!(target.identity().address, REPLACEMENT.address);
    assert_eq!(target.identity().extended_pan_id, TC.extended_pan_id);
    assert_eq!(target.devices(), db.devices());

    restore(&mut swap, &stream, &mut target, 64, true).unwrap();
    assert_eq!(target.identity(), TC);
}

#[test]
fn dirty_flags() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    assert!(!swap.backup_required());

    swap.mark_dirty(DirtyFlags::DEVICES | DirtyFlags::INSTALL_CODES);
    assert!(swap.backup_required());

    swap.begin_backup(&db).unwrap();
    let mut buf = [0u8; 64];
    swap.get_chunk(&db, &mut buf).unwrap();
    swap.mark_dirty(DirtyFlags::BINDINGS);
    while swap.get_chunk(&db, &mut buf).unwrap() != 0 {}

    // changes made while the backup ran still need one
    assert_eq!(swap.dirty(), DirtyFlags::BINDINGS);
    assert_eq!(swap.completed_backups(), 1);

    // an aborted backup clears nothing
    swap.begin_backup(&db).unwrap();
    swap.abort();
    assert_eq!(swap.dirty(), DirtyFlags::BINDINGS);
    assert_eq!(swap.completed_backups(), 1);

    let stream = backup(&mut swap, &db, 64);
    assert!(!swap.backup_required());
    swap.mark_dirty(DirtyFlags::TC_IDENTITY);
    let mut target: TcDatabase = TcDatabase::new(TC);
    restore(&mut swap, &stream, &mut target, 64, false).unwrap();
    assert!(!swap.backup_required());

    let bookkeeping = swap.bookkeeping();
    let mut fresh = SwapState::<4, 4>::default();
    fresh.apply_bookkeeping(&bookkeeping);
    assert_eq!(fresh.completed_backups(), 2);
}

#[test]
fn bytes_beyond_the_payload() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let mut stream = backup(&mut swap, &db, 64);
    stream.push(0);

    let mut target: TcDatabase = TcDatabase::new(TC);
    assert_eq!(
        restore(&mut swap, &stream, &mut target, 1000, false),
        Err(Error::UnexpectedLength)
    );
    assert_eq!(target, TcDatabase::new(TC));
    assert_eq!(Error::UnexpectedLength.kind(), ErrorKind::Format);

    // also when the extra byte arrives alone
    let mut target: TcDatabase = TcDatabase::new(TC);
    swap.begin_restore(false).unwrap();
    swap.put_chunk(&stream[..stream.len() - 1]).unwrap();
    assert_eq!(swap.put_chunk(&[0]), Err(Error::UnexpectedLength));
    assert_eq!(swap.finish(&mut target), Err(Error::UnexpectedLength));
    assert_eq!(target, TcDatabase::new(TC));
}

#[test]
fn truncated_stream() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 64);
    let mut target: TcDatabase = TcDatabase::new(REPLACEMENT);

    swap.begin_restore(true).unwrap();
    assert_eq!(swap.finish(&mut target), Err(Error::Incomplete));

    swap.begin_restore(true).unwrap();
    swap.put_chunk(&stream[..GLOBAL_LEN - 1]).unwrap();
    assert_eq!(swap.finish(&mut target), Err(Error::Incomplete));

    swap.begin_restore(true).unwrap();
    swap.put_chunk(&stream[..stream.len() - 1]).unwrap();
    assert_eq!(swap.stage(), Stage::Bindings);
    assert_eq!(swap.finish(&mut target), Err(Error::MicMismatch));
    // sticky
    assert_eq!(swap.finish(&mut target), Err(Error::MicMismatch));
    assert_eq!(swap.put_chunk(&[0]), Err(Error::MicMismatch));

    assert_eq!(target, TcDatabase::new(REPLACEMENT));
}

#[test]
fn abandoned_restore_commits_nothing() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 64);

    let mut target: TcDatabase = TcDatabase::new(REPLACEMENT);
    swap.begin_restore(true).unwrap();
    swap.put_chunk(&stream[..GLOBAL_LEN + 2 * DEVICE_LEN]).unwrap();
    swap.abort();
    assert!(!swap.is_busy());
    assert_eq!(swap.stage(), Stage::NotStarted);
    assert_eq!(swap.finish(&mut target), Err(Error::NotStarted));
    assert_eq!(target, TcDatabase::new(REPLACEMENT));
}

#[test]
fn semantic_faults_after_a_good_mic() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 64);
    let live: TcDatabase = TcDatabase::new(REPLACEMENT);

    let cases: [(usize, u8, Error); 5] = [
        // unsupported version
        (1, 2, Error::BadFormat),
        // unknown flag bit
        (0, stream[0] | 0b1000, Error::BadFormat),
        // key attribute out of range
        (GLOBAL_LEN + 9, 4, Error::BadFormat),
        // install code type out of range
        (GLOBAL_LEN + 2 * DEVICE_LEN + 12, 9, Error::BadFormat),
        // address mode of the first binding
        (GLOBAL_LEN + 3 * DEVICE_LEN + 1 + 3, 0x02, Error::BadFormat),
    ];
    for (at, value, error) in cases {
        let mut edited = stream.clone();
        edited[at] = value;
        reseal(&mut edited);

        let mut target = live.clone();
        assert_eq!(
            restore(&mut swap, &edited, &mut target, 17, false),
            Err(error),
            "byte {}",
            at
        );
        assert_eq!(target, live);
    }
}

#[test]
fn more_devices_than_staging_holds() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 64);

    let mut small = SwapState::<2, 4>::default();
    let mut target = TcDatabase::<2, 4>::new(REPLACEMENT);
    small.begin_restore(false).unwrap();
    assert_eq!(small.put_chunk(&stream), Err(Error::TableFull));
    assert_eq!(small.finish(&mut target), Err(Error::TableFull));
    assert_eq!(target, TcDatabase::new(REPLACEMENT));
    assert_eq!(Error::TableFull.kind(), ErrorKind::Capacity);
}

#[test]
fn has_devices_bit_must_match_the_count() {
    let db = TcDatabase::<4, 4>::new(TC);
    let mut swap: SwapState = SwapState::new(SwapConfig {
        include_bindings: false,
        ..SwapConfig::DEFAULT
    });
    let mut stream = backup(&mut swap, &db, 64);
    stream[0] |= 0b010;
    reseal(&mut stream);

    let mut target: TcDatabase = TcDatabase::new(TC);
    assert_eq!(
        restore(&mut swap, &stream, &mut target, 64, false),
        Err(Error::BadFormat)
    );
}

#[test]
fn every_device_field_survives() {
    let mut db: TcDatabase = TcDatabase::new(TC);
    let methods = [
        KeyUpdateMethod::NotUpdated,
        KeyUpdateMethod::KeyRequest,
        KeyUpdateMethod::UnauthenticatedKeyNegotiation,
        KeyUpdateMethod::AuthenticatedKeyNegotiation,
        KeyUpdateMethod::CertificateBased,
        KeyUpdateMethod::HashedTclk,
    ];
    let kinds = [
        InstallCodeType::Bits48,
        InstallCodeType::Bits64,
        InstallCodeType::Bits96,
        InstallCodeType::Bits128,
        InstallCodeType::Passcode,
        InstallCodeType::Hashed128,
    ];
    for (n, (method, kind)) in methods.iter().zip(kinds.iter()).enumerate() {
        let code: Vec<u8> = (0..kind.len() as u8).map(|b| b ^ n as u8).collect();
        let entry = DeviceEntry {
            key_attribute: KeyAttribute::try_from(n as u8 % 4).unwrap(),
            initial_join_auth: InitialJoinAuth::try_from(3 - n as u8 % 4).unwrap(),
            key_update_method: *method,
            ..DeviceEntry::new(ExtendedAddress(n as u64))
        }
        .with_install_code(InstallCode::new(*kind, &code).unwrap());
        db.upsert_device(entry).unwrap();
    }

    for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        let mut swap: SwapState = SwapState::new(SwapConfig {
            byte_order: order,
            ..SwapConfig::DEFAULT
        });
        let stream = backup(&mut swap, &db, 33);
        let mut target: TcDatabase = TcDatabase::new(TC);
        restore(&mut swap, &stream, &mut target, 33, false).unwrap();
        assert_eq!(target, db);
    }
}

#[test]
fn failed_commit_leaves_tables_alone() {
    let db = database();
    let mut swap: SwapState = SwapState::default();
    let stream = backup(&mut swap, &db, 64);

    // staging holds three devices, the target only two
    let mut target = TcDatabase::<2, 4>::new(REPLACEMENT);
    swap.begin_restore(true).unwrap();
    swap.put_chunk(&stream).unwrap();
    assert_eq!(swap.finish(&mut target), Err(Error::TableFull));
    assert_eq!(target, TcDatabase::new(REPLACEMENT));
    assert!(!swap.is_busy());
}

#[test]
fn format_helpers() {
    assert_eq!(ByteOrder::detect(0x80), ByteOrder::BigEndian);
    assert_eq!(ByteOrder::detect(0x07), ByteOrder::LittleEndian);
    assert_eq!(crate::stream_len(0, None), 23);
    assert_eq!(crate::stream_len(3, None), 260);
    assert_eq!(crate::stream_len(1, Some(2)), 23 + 79 + 1 + 26);
    assert_eq!(KeyUpdateMethod::try_from(8), Err(crate::TryFromU8Error));
    assert_eq!(
        InstallCode::new(InstallCodeType::Bits128, &key(0x40)).map(|_| ()),
        Err(Error::BadFormat)
    );
    assert_eq!(u8::from(KeyUpdateMethod::HashedTclk), 7);
    assert_eq!(Error::MicMismatch.kind(), ErrorKind::Integrity);
    assert_eq!(
        Error::Nvram(nvram::Error::Corrupt).kind(),
        ErrorKind::Storage
    );
}

#[test]
fn random_tables_and_corruptions() {
    let mut rng = thread_rng();
    let mut swap: SwapState = SwapState::default();

    for _ in 0..50 {
        let mut db: TcDatabase = TcDatabase::new(TcIdentity {
            address: ExtendedAddress(rng.gen()),
            extended_pan_id: ExtendedPanId(rng.gen()),
        });
        for _ in 0..rng.gen_range(0..10) {
            let mut entry = DeviceEntry::new(ExtendedAddress(rng.gen()));
            if rng.gen_bool(0.8) {
                entry = entry.with_hashed_key(rng.gen());
            }
            if rng.gen_bool(0.3) {
                entry = entry.with_previous_hashed_key(rng.gen());
            }
            if rng.gen_bool(0.3) {
                entry = entry.with_passphrase(rng.gen());
            }
            if rng.gen_bool(0.3) {
                let code: [u8; 14] = rng.gen();
                let code = InstallCode::new(InstallCodeType::Bits96, &code).unwrap();
                entry = entry.with_install_code(code);
            }
            db.upsert_device(entry).unwrap();
        }
        for _ in 0..rng.gen_range(0..5) {
            let destination = if rng.gen_bool(0.5) {
                BindingDestination::Group(rng.gen())
            } else {
                BindingDestination::Device {
                    address: ExtendedAddress(rng.gen()),
                    endpoint: rng.gen(),
                }
            };
            db.add_binding(BindingEntry {
                source_endpoint: rng.gen(),
                cluster_id: rng.gen(),
                destination,
            })
            .unwrap();
        }

        let order = if rng.gen_bool(0.5) {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        swap.set_config(SwapConfig {
            byte_order: order,
            ..SwapConfig::DEFAULT
        })
        .unwrap();
        let stream = backup(&mut swap, &db, rng.gen_range(1..100));

        let mut target: TcDatabase = TcDatabase::new(REPLACEMENT);
        restore(&mut swap, &stream, &mut target, rng.gen_range(1..100), true).unwrap();
        assert_eq!(target, db);

        let mut corrupted = stream.clone();
        let at = rng.gen_range(0..corrupted.len());
        corrupted[at] ^= rng.gen_range(1..=u8::MAX);
        let live = target.clone();
        assert_eq!(
            restore(&mut swap, &corrupted, &mut target, rng.gen_range(1..100), true),
            Err(Error::MicMismatch),
            "byte {}",
            at
        );
        assert_eq!(target, live);
        swap.abort();
    }
}

quickcheck::quickcheck! {
    fn restore_inverts_backup(addresses: Vec<u64>, groups: Vec<u16>, chunk: u8, big: bool) -> bool {
        let mut db = TcDatabase::<8, 8>::new(TC);
        for (n, address) in addresses.iter().take(8).enumerate() {
            let mut entry = DeviceEntry::new(ExtendedAddress(*address)).with_hashed_key(key(n as u8));
            if n % 2 == 1 {
                entry = entry.with_passphrase(key(!(n as u8)));
            }
            db.upsert_device(entry).unwrap();
        }
        for group in groups.iter().take(8) {
            db.add_binding(BindingEntry {
                source_endpoint: 1,
                cluster_id: *group,
                destination: BindingDestination::Group(*group),
            })
            .unwrap();
        }

        let order = if big { ByteOrder::BigEndian } else { ByteOrder::LittleEndian };
        let mut swap = SwapState::<8, 8>::new(SwapConfig { byte_order: order, ..SwapConfig::DEFAULT });
        let chunk = chunk as usize + 1;

        let total = swap.begin_backup(&db).unwrap();
        let mut stream = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            match swap.get_chunk(&db, &mut buf).unwrap() {
                0 => break,
                n => stream.extend_from_slice(&buf[..n]),
            }
        }

        let mut target = TcDatabase::<8, 8>::new(REPLACEMENT);
        swap.begin_restore(true).unwrap();
        for part in stream.chunks(chunk) {
            swap.put_chunk(part).unwrap();
        }
        swap.finish(&mut target).unwrap();
        stream.len() == total && target == db
    }
}
