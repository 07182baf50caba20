use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MAX_DEVICES: usize = 64;
pub const MAX_BINDINGS: usize = 32;

pub const KEY_LEN: usize = 16;
pub type Key = [u8; KEY_LEN];

pub(crate) const INSTALL_CODE_MAX: usize = 18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TryFromU8Error;

macro_rules! enum_u8 {
    (
        $(#[$outer:meta])*
        $vis:vis enum $name:ident {

            $($(#[doc = $doc:literal])* $var:ident = $num:literal),+
            $(,)*
        }
    ) => {
        $(#[$outer])*
        #[repr(u8)]
        $vis enum $name {
            $(
                $(#[doc = $doc])*
                $var = $num,
            )*
        }

        impl TryFrom<u8> for $name {
            type Error = TryFromU8Error;
            fn try_from(val: u8) -> ::core::result::Result<Self, TryFromU8Error> {
                match val {
                    $(
                        $num => Ok($name::$var),
                    )*
                    _ => Err(TryFromU8Error)
                }
            }
        }

        impl From<$name> for u8 {
            fn from(val: $name) -> u8 {
                match val {
                    $(
                        $name::$var => $num,
                    )*
                }
            }
        }
    }
}

/// 64-bit IEEE (EUI-64) address.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ExtendedAddress(pub u64);

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ExtendedPanId(pub u64);

enum_u8! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum KeyAttribute {
        Provisional = 0,
        Unverified = 1,
        Verified = 2,
        Application = 3,
    }
}

enum_u8! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum InitialJoinAuth {
        NoAuthentication = 0,
        InstallCodeKey = 1,
        AnonymousKeyNegotiation = 2,
        AuthenticatedKeyNegotiation = 3,
    }
}

enum_u8! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum KeyUpdateMethod {
        NotUpdated = 0,
        KeyRequest = 1,
        UnauthenticatedKeyNegotiation = 2,
        AuthenticatedKeyNegotiation = 3,
        /// Certificate-based mutual authentication (CBKE).
        CertificateBased = 4,
        Reserved5 = 5,
        Reserved6 = 6,
        /// The hashed TCLK was restored from a backup.
        HashedTclk = 7,
    }
}

enum_u8! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub enum InstallCodeType {
        Bits48 = 0,
        Bits64 = 1,
        Bits96 = 2,
        Bits128 = 3,
        Passcode = 4,
        Hashed128 = 5,
    }
}

impl InstallCodeType {
    /// Length of the code, including the trailing CRC for the types that
    /// carry one.
    pub const fn len(self) -> usize {
        match self {
            Self::Bits48 => 8,
            Self::Bits64 => 10,
            Self::Bits96 => 14,
            Self::Bits128 => 18,
            Self::Passcode => 4,
            Self::Hashed128 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallCode {
    kind: InstallCodeType,
    code: [u8; INSTALL_CODE_MAX],
}

impl InstallCode {
    pub fn new(kind: InstallCodeType, code: &[u8]) -> Result<Self> {
        if code.len() != kind.len() {
            return Err(Error::BadFormat);
        }
        let mut slot = [0u8; INSTALL_CODE_MAX];
        slot[..code.len()].copy_from_slice(code);
        Ok(Self { kind, code: slot })
    }

    pub fn kind(&self) -> InstallCodeType {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code[..self.kind.len()]
    }
}

/// Security material the Trust Center keeps for one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub address: ExtendedAddress,
    pub key_attribute: KeyAttribute,
    pub initial_join_auth: InitialJoinAuth,
    pub key_update_method: KeyUpdateMethod,
    pub hashed_key: Option<Key>,
    pub previous_hashed_key: Option<Key>,
    pub passphrase: Option<Key>,
    pub install_code: Option<InstallCode>,
}

impl DeviceEntry {
    pub fn new(address: ExtendedAddress) -> Self {
        Self {
            address,
            key_attribute: KeyAttribute::Provisional,
            initial_join_auth: InitialJoinAuth::NoAuthentication,
            key_update_method: KeyUpdateMethod::NotUpdated,
            hashed_key: None,
            previous_hashed_key: None,
            passphrase: None,
            install_code: None,
        }
    }

    pub fn with_hashed_key(self, key: Key) -> Self {
        Self {
            hashed_key: Some(key),
            ..self
        }
    }

    pub fn with_previous_hashed_key(self, key: Key) -> Self {
        Self {
            previous_hashed_key: Some(key),
            ..self
        }
    }

    pub fn with_passphrase(self, passphrase: Key) -> Self {
        Self {
            passphrase: Some(passphrase),
            ..self
        }
    }

    pub fn with_install_code(self, install_code: InstallCode) -> Self {
        Self {
            install_code: Some(install_code),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingDestination {
    Group(u16),
    Device {
        address: ExtendedAddress,
        endpoint: u8,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    pub source_endpoint: u8,
    pub cluster_id: u16,
    pub destination: BindingDestination,
}

/// Network identity of the Trust Center.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcIdentity {
    pub address: ExtendedAddress,
    pub extended_pan_id: ExtendedPanId,
}

/// Read access to the live Trust Center tables.
pub trait TcTables {
    fn identity(&self) -> TcIdentity;
    fn device_count(&self) -> usize;
    fn device(&self, index: usize) -> Option<DeviceEntry>;
    fn binding_count(&self) -> usize;
    fn binding(&self, index: usize) -> Option<BindingEntry>;
}

pub trait TcTablesMut: TcTables {
    /// Replace the whole database in one step. On error nothing may have
    /// changed.
    ///
    /// `bindings` is `None` when the backup carried no binding section, the
    /// live bindings are kept then.
    fn replace(
        &mut self,
        identity: TcIdentity,
        devices: &[DeviceEntry],
        bindings: Option<&[BindingEntry]>,
    ) -> Result<()>;
}

/// In-memory Trust Center database.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcDatabase<const DEVICES: usize = MAX_DEVICES, const BINDINGS: usize = MAX_BINDINGS> {
    identity: TcIdentity,
    devices: Vec<DeviceEntry, DEVICES>,
    bindings: Vec<BindingEntry, BINDINGS>,
}

impl<const DEVICES: usize, const BINDINGS: usize> TcDatabase<DEVICES, BINDINGS> {
    pub fn new(identity: TcIdentity) -> Self {
        Self {
            identity,
            devices: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn set_identity(&mut self, identity: TcIdentity) {
        self.identity = identity;
    }

    pub fn devices(&self) -> &[DeviceEntry] {
        &self.devices
    }

    pub fn bindings(&self) -> &[BindingEntry] {
        &self.bindings
    }

    pub fn find_device(&self, address: ExtendedAddress) -> Option<&DeviceEntry> {
        self.devices.iter().find(|device| device.address == address)
    }

    /// Insert a device or replace the entry with the same address.
    pub fn upsert_device(&mut self, device: DeviceEntry) -> Result<()> {
        match self.devices.iter_mut().find(|d| d.address == device.address) {
            Some(existing) => *existing = device,
            None => self.devices.push(device).map_err(|_| Error::TableFull)?,
        }
        Ok(())
    }

    pub fn remove_device(&mut self, address: ExtendedAddress) -> Option<DeviceEntry> {
        let index = self.devices.iter().position(|d| d.address == address)?;
        Some(self.devices.remove(index))
    }

    pub fn add_binding(&mut self, binding: BindingEntry) -> Result<()> {
        if self.bindings.contains(&binding) {
            return Ok(());
        }
        self.bindings.push(binding).map_err(|_| Error::TableFull)
    }

    pub fn remove_binding(&mut self, binding: &BindingEntry) -> bool {
        match self.bindings.iter().position(|b| b == binding) {
            Some(index) => {
                self.bindings.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<const DEVICES: usize, const BINDINGS: usize> TcTables for TcDatabase<DEVICES, BINDINGS> {
    fn identity(&self) -> TcIdentity {
        self.identity
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device(&self, index: usize) -> Option<DeviceEntry> {
        self.devices.get(index).copied()
    }

    fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    fn binding(&self, index: usize) -> Option<BindingEntry> {
        self.bindings.get(index).copied()
    }
}

impl<const DEVICES: usize, const BINDINGS: usize> TcTablesMut for TcDatabase<DEVICES, BINDINGS> {
    fn replace(
        &mut self,
        identity: TcIdentity,
        devices: &[DeviceEntry],
        bindings: Option<&[BindingEntry]>,
    ) -> Result<()> {
        let devices = Vec::from_slice(devices).map_err(|_| Error::TableFull)?;
        let bindings = match bindings {
            Some(bindings) => Vec::from_slice(bindings).map_err(|_| Error::TableFull)?,
            None => self.bindings.clone(),
        };

        self.identity = identity;
        self.devices = devices;
        self.bindings = bindings;
        Ok(())
    }
}
