use bitflags::bitflags;

use crate::table::{
    BindingDestination, BindingEntry, DeviceEntry, ExtendedAddress, ExtendedPanId,
    InitialJoinAuth, InstallCode, InstallCodeType, Key, KeyAttribute, KeyUpdateMethod,
    TcIdentity, KEY_LEN,
};
use crate::{Error, Result};

pub const GLOBAL_LEN: usize = 23;
pub const DEVICE_LEN: usize = 79;
pub const BINDING_LEN: usize = 13;
pub(crate) const BINDING_COUNT_LEN: usize = 1;
pub const MIC_LEN: usize = 4;
pub(crate) const MIC_OFFSET: usize = 19;
pub(crate) const SCRATCH_LEN: usize = DEVICE_LEN;

pub const DB_VERSION: u8 = 1;

const HASHED_KEY_OFFSET: usize = 13;
const PREVIOUS_HASHED_KEY_OFFSET: usize = 29;
const PASSPHRASE_OFFSET: usize = 45;
const INSTALL_CODE_OFFSET: usize = 61;

const ADDR_MODE_GROUP: u8 = 0x01;
const ADDR_MODE_EXTENDED: u8 = 0x03;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct GlobalFlags: u8 {
        const BIG_ENDIAN = 1 << 0;
        const HAS_DEVICES = 1 << 1;
        const HAS_BINDINGS = 1 << 2;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DeviceFlags: u8 {
        const INSTALL_CODE = 1 << 0;
        const HASHED_KEY = 1 << 1;
        const AUTH_TOKEN = 1 << 2;
        const PREVIOUS_HASHED_KEY = 1 << 3;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the producer, judged from the raw flags byte of the
    /// global section.
    pub fn detect(raw_flags: u8) -> Self {
        if raw_flags & 0x80 != 0 {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    fn flags_to_wire(self, bits: u8) -> u8 {
        match self {
            Self::LittleEndian => bits,
            Self::BigEndian => bits.reverse_bits(),
        }
    }

    fn flags_from_wire(self, raw: u8) -> u8 {
        // mirroring is its own inverse
        self.flags_to_wire(raw)
    }

    fn put_u16(self, out: &mut [u8], value: u16) {
        let raw = match self {
            Self::LittleEndian => value.to_le_bytes(),
            Self::BigEndian => value.to_be_bytes(),
        };
        out[..2].copy_from_slice(&raw);
    }

    fn get_u16(self, raw: &[u8]) -> u16 {
        let bytes = [raw[0], raw[1]];
        match self {
            Self::LittleEndian => u16::from_le_bytes(bytes),
            Self::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    fn put_u64(self, out: &mut [u8], value: u64) {
        let raw = match self {
            Self::LittleEndian => value.to_le_bytes(),
            Self::BigEndian => value.to_be_bytes(),
        };
        out[..8].copy_from_slice(&raw);
    }

    fn get_u64(self, raw: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&raw[..8]);
        match self {
            Self::LittleEndian => u64::from_le_bytes(bytes),
            Self::BigEndian => u64::from_be_bytes(bytes),
        }
    }
}

/// Length of a backup stream.
///
/// `bindings` is `None` when the binding section is left out.
pub const fn stream_len(devices: usize, bindings: Option<usize>) -> usize {
    let bindings = match bindings {
        Some(count) => BINDING_COUNT_LEN + count * BINDING_LEN,
        None => 0,
    };
    GLOBAL_LEN + devices * DEVICE_LEN + bindings
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalSection {
    pub flags: GlobalFlags,
    pub db_version: u8,
    pub device_count: u8,
    pub identity: TcIdentity,
    pub mic: [u8; MIC_LEN],
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            flags: GlobalFlags::empty(),
            db_version: DB_VERSION,
            device_count: 0,
            identity: TcIdentity::default(),
            mic: [0; MIC_LEN],
        }
    }
}

impl GlobalSection {
    pub fn encode(&self, order: ByteOrder, out: &mut [u8]) {
        out[0] = order.flags_to_wire(self.flags.bits());
        out[1] = self.db_version;
        out[2] = self.device_count;
        order.put_u64(&mut out[3..11], self.identity.address.0);
        order.put_u64(&mut out[11..19], self.identity.extended_pan_id.0);
        out[MIC_OFFSET..GLOBAL_LEN].copy_from_slice(&self.mic);
    }

    /// Decode without judging the content; unknown flag bits are kept.
    pub fn decode(raw: &[u8]) -> (Self, ByteOrder) {
        let order = ByteOrder::detect(raw[0]);
        let mut mic = [0u8; MIC_LEN];
        mic.copy_from_slice(&raw[MIC_OFFSET..GLOBAL_LEN]);
        let section = Self {
            flags: GlobalFlags::from_bits_retain(order.flags_from_wire(raw[0])),
            db_version: raw[1],
            device_count: raw[2],
            identity: TcIdentity {
                address: ExtendedAddress(order.get_u64(&raw[3..11])),
                extended_pan_id: ExtendedPanId(order.get_u64(&raw[11..19])),
            },
            mic,
        };
        (section, order)
    }

    pub(crate) fn check(&self, order: ByteOrder) -> Result<()> {
        if self.flags.bits() & !GlobalFlags::all().bits() != 0 {
            return Err(Error::BadFormat);
        }
        if self.flags.contains(GlobalFlags::BIG_ENDIAN) != (order == ByteOrder::BigEndian) {
            return Err(Error::BadFormat);
        }
        if self.db_version != DB_VERSION {
            return Err(Error::BadFormat);
        }
        if self.flags.contains(GlobalFlags::HAS_DEVICES) != (self.device_count > 0) {
            return Err(Error::BadFormat);
        }
        Ok(())
    }
}

pub(crate) fn encode_device(
    device: &DeviceEntry,
    order: ByteOrder,
    with_passphrase: bool,
    out: &mut [u8],
) {
    let out = &mut out[..DEVICE_LEN];
    out.fill(0);
    order.put_u64(&mut out[0..8], device.address.0);

    let mut flags = DeviceFlags::empty();
    if let Some(key) = &device.hashed_key {
        flags |= DeviceFlags::HASHED_KEY;
        out[HASHED_KEY_OFFSET..][..KEY_LEN].copy_from_slice(key);
    }
    if let Some(key) = &device.previous_hashed_key {
        flags |= DeviceFlags::PREVIOUS_HASHED_KEY;
        out[PREVIOUS_HASHED_KEY_OFFSET..][..KEY_LEN].copy_from_slice(key);
    }
    if let (true, Some(passphrase)) = (with_passphrase, &device.passphrase) {
        flags |= DeviceFlags::AUTH_TOKEN;
        out[PASSPHRASE_OFFSET..][..KEY_LEN].copy_from_slice(passphrase);
    }
    if let Some(install_code) = &device.install_code {
        flags |= DeviceFlags::INSTALL_CODE;
        out[12] = install_code.kind().into();
        let code = install_code.as_bytes();
        out[INSTALL_CODE_OFFSET..][..code.len()].copy_from_slice(code);
    }

    out[8] = order.flags_to_wire(flags.bits());
    out[9] = device.key_attribute.into();
    out[10] = device.initial_join_auth.into();
    out[11] = device.key_update_method.into();
}

pub(crate) fn decode_device(raw: &[u8], order: ByteOrder) -> Result<DeviceEntry> {
    let flags = DeviceFlags::from_bits(order.flags_from_wire(raw[8])).ok_or(Error::BadFormat)?;

    let key = |at: usize| -> Key {
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&raw[at..at + KEY_LEN]);
        key
    };

    let install_code = if flags.contains(DeviceFlags::INSTALL_CODE) {
        let kind = InstallCodeType::try_from(raw[12]).map_err(|_| Error::BadFormat)?;
        let start = INSTALL_CODE_OFFSET;
        Some(InstallCode::new(kind, &raw[start..start + kind.len()])?)
    } else {
        None
    };

    Ok(DeviceEntry {
        address: ExtendedAddress(order.get_u64(&raw[0..8])),
        key_attribute: KeyAttribute::try_from(raw[9]).map_err(|_| Error::BadFormat)?,
        initial_join_auth: InitialJoinAuth::try_from(raw[10]).map_err(|_| Error::BadFormat)?,
        key_update_method: KeyUpdateMethod::try_from(raw[11]).map_err(|_| Error::BadFormat)?,
        hashed_key: flags
            .contains(DeviceFlags::HASHED_KEY)
            .then(|| key(HASHED_KEY_OFFSET)),
        previous_hashed_key: flags
            .contains(DeviceFlags::PREVIOUS_HASHED_KEY)
            .then(|| key(PREVIOUS_HASHED_KEY_OFFSET)),
        passphrase: flags
            .contains(DeviceFlags::AUTH_TOKEN)
            .then(|| key(PASSPHRASE_OFFSET)),
        install_code,
    })
}

pub(crate) fn encode_binding(binding: &BindingEntry, order: ByteOrder, out: &mut [u8]) {
    let out = &mut out[..BINDING_LEN];
    out.fill(0);
    out[0] = binding.source_endpoint;
    order.put_u16(&mut out[1..3], binding.cluster_id);
    match binding.destination {
        BindingDestination::Group(group) => {
            out[3] = ADDR_MODE_GROUP;
            order.put_u16(&mut out[4..6], group);
        }
        BindingDestination::Device { address, endpoint } => {
            out[3] = ADDR_MODE_EXTENDED;
            order.put_u64(&mut out[4..12], address.0);
            out[12] = endpoint;
        }
    }
}

pub(crate) fn decode_binding(raw: &[u8], order: ByteOrder) -> Result<BindingEntry> {
    let destination = match raw[3] {
        ADDR_MODE_GROUP => BindingDestination::Group(order.get_u16(&raw[4..6])),
        ADDR_MODE_EXTENDED => BindingDestination::Device {
            address: ExtendedAddress(order.get_u64(&raw[4..12])),
            endpoint: raw[12],
        },
        _ => return Err(Error::BadFormat),
    };
    Ok(BindingEntry {
        source_endpoint: raw[0],
        cluster_id: order.get_u16(&raw[1..3]),
        destination,
    })
}
