//! This module defines range-checked types for OWEN device addresses and
//! parameter name hashes, meant to simplify correct usage of the API.

use snafu::{ensure, Snafu};

use core::fmt;
use core::ops::Deref;

use crate::crc::name_hash;

/// Error type for this module
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The address doesn't fit in the configured address length.
    #[snafu(display("Invalid address {} for {:?}", address, len))]
    InvalidAddress { address: u16, len: AddressLen },
    /// The string isn't a valid parameter name.
    #[snafu(display("Illegal parameter name {:?}", name))]
    InvalidName { name: String },
}

/// Width of the network address field in a frame.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum AddressLen {
    /// 8-bit addresses, 0..=255
    Bits8,
    /// 11-bit addresses, 0..=2047
    Bits11,
}

impl AddressLen {
    /// The largest address representable with this width.
    pub const fn max_address(self) -> u16 {
        match self {
            Self::Bits8 => 0xff,
            Self::Bits11 => 0x7ff,
        }
    }

    /// The number of address bits.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits8 => 8,
            Self::Bits11 => 11,
        }
    }
}

impl Default for AddressLen {
    fn default() -> Self {
        Self::Bits8
    }
}

/// A device network address together with its on-wire width.
///
/// ## Example
/// ```
/// use owen_proto::{Address, AddressLen};
/// let addr = Address::new(16, AddressLen::Bits8).unwrap();
/// assert_eq!(*addr, 16);
/// assert!(Address::new(300, AddressLen::Bits8).is_err());
/// assert!(Address::new(300, AddressLen::Bits11).is_ok());
/// ```
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub struct Address {
    value: u16,
    len: AddressLen,
}

impl Address {
    /// Create a new address, checking that it fits in `len`.
    /// # Errors
    /// Returns [`Error::InvalidAddress`] if `address` is out of range.
    pub fn new(address: u16, len: AddressLen) -> Result<Self, Error> {
        ensure!(
            address <= len.max_address(),
            InvalidAddressSnafu { address, len }
        );
        Ok(Self {
            value: address,
            len,
        })
    }

    /// The address width.
    pub const fn len(self) -> AddressLen {
        self.len
    }

    /// The two leading frame bytes, before the flags are or:ed into the second.
    pub(crate) const fn to_bytes(self) -> [u8; 2] {
        match self.len {
            AddressLen::Bits8 => [self.value as u8, 0],
            AddressLen::Bits11 => [(self.value >> 3) as u8, ((self.value & 0x07) << 5) as u8],
        }
    }

    /// Inverse of [`to_bytes`](Self::to_bytes). The flag bits of `b1` are ignored.
    pub(crate) const fn from_bytes(b0: u8, b1: u8, len: AddressLen) -> Self {
        let value = match len {
            AddressLen::Bits8 => b0 as u16,
            AddressLen::Bits11 => (b0 as u16) << 3 | (b1 >> 5) as u16,
        };
        Self { value, len }
    }
}

impl Deref for Address {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}


/// Number of symbol slots in a parameter name.
const NAME_SLOTS: usize = 4;
/// Code of an unused slot.
const EMPTY_SLOT: u8 = 78;

/// `NameHash` is the 16-bit on-wire identifier of a named device parameter.
///
/// Different names may map to the same hash, the protocol has no way of
/// telling them apart.
///
/// ## Example
/// ```
/// use owen_proto::NameHash;
/// let sp = NameHash::from_name("SP").unwrap();
/// assert_eq!(*sp, 0x9107);
/// assert_eq!(sp, NameHash::from_name("sp").unwrap());
/// assert!(NameHash::from_name("S+P").is_err());
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct NameHash(u16);

impl NameHash {
    /// Hash a parameter name.
    /// # Errors
    /// Returns [`Error::InvalidName`] on illegal symbols, a leading `.`
    /// or more than four symbols.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        Ok(Self(name_hash(&name_codes(name)?)))
    }

    /// Wrap a hash received on the wire.
    pub const fn from_raw(hash: u16) -> Self {
        Self(hash)
    }

    pub(crate) const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl Deref for NameHash {
    type Target = u16;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Convert a name into the four slot codes fed to the hash function.
fn name_codes(name: &str) -> Result<[u8; NAME_SLOTS], Error> {
    let invalid = || InvalidNameSnafu { name }.build();
    let mut codes = [EMPTY_SLOT; NAME_SLOTS];
    let mut slot: usize = 0;
    for ch in name.chars() {
        let code = match ch {
            '0'..='9' => (ch as u8 - b'0') * 2,
            'a'..='z' => (10 + ch as u8 - b'a') * 2,
            'A'..='Z' => (10 + ch as u8 - b'A') * 2,
            '-' => 36 * 2,
            '_' => 37 * 2,
            '/' => 38 * 2,
            '.' => {
                // marks the previous symbol, doesn't take a slot. A leading
                // dot wraps around to the last slot.
                let prev = slot.checked_sub(1).unwrap_or(NAME_SLOTS - 1);
                codes[prev] = codes[prev].wrapping_add(1);
                continue;
            }
            ' ' => break,
            _ => return Err(invalid()),
        };
        *codes.get_mut(slot).ok_or_else(invalid)? = code;
        slot += 1;
    }
    Ok(codes)
}
