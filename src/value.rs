//! Typed parameter values and their payload encodings.
//!
//! Unpacking never fails with an error directly. It returns a [`Decoded`]
//! so that device fault codes, which arrive in place of a value, can be
//! told apart from malformed payloads without error handling.

use arrayvec::ArrayVec;
use core::fmt;
use std::error::Error as StdError;

use crate::frame::MAX_PAYLOAD;

/// Single byte fault code a device sends instead of a measurement
/// when its sensor is broken or disconnected.
pub const SENSOR_FAULT: u8 = 0xfd;

pub type PayloadBuf = ArrayVec<u8, MAX_PAYLOAD>;

/// Outcome of decoding a response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// The payload held a value of the requested type.
    Value(T),
    /// The device answered with a single byte error code, see [`SENSOR_FAULT`].
    Fault(u8),
    /// The payload doesn't match the requested type.
    Malformed(Vec<u8>),
}

impl<T> Decoded<T> {
    /// Classify a payload that didn't decode as the requested type.
    fn failed(data: &[u8]) -> Self {
        match data {
            [code] => Self::Fault(*code),
            _ => Self::Malformed(data.to_vec()),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Decoded<U> {
        match self {
            Self::Value(v) => Decoded::Value(f(v)),
            Self::Fault(code) => Decoded::Fault(code),
            Self::Malformed(data) => Decoded::Malformed(data),
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// True for the broken sensor fault code.
    pub fn is_sensor_fault(&self) -> bool {
        matches!(self, Self::Fault(SENSOR_FAULT))
    }

    /// Convert into a `Result`, for callers that treat any failure alike.
    /// # Errors
    /// Returns [`UnpackError`] holding the raw payload for faults and malformed data.
    pub fn into_result(self) -> Result<T, UnpackError> {
        match self {
            Self::Value(v) => Ok(v),
            Self::Fault(code) => Err(UnpackError { data: vec![code] }),
            Self::Malformed(data) => Err(UnpackError { data }),
        }
    }
}

/// A payload that couldn't be decoded as the requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackError {
    pub data: Vec<u8>,
}

impl StdError for UnpackError {}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unable to unpack payload {:02x?}", self.data)
    }
}

impl UnpackError {
    /// The device fault code, if the payload was a single byte.
    pub fn fault_code(&self) -> Option<u8> {
        match self.data.as_slice() {
            [code] => Some(*code),
            _ => None,
        }
    }
}

/// A value that can be written to a device.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value {
    Char(i8),
    Int16(i16),
    Float24(f32),
    Ieee32(f32),
}

impl Value {
    /// The payload for a write frame.
    pub fn pack(&self) -> PayloadBuf {
        let mut buf = PayloadBuf::new();
        match *self {
            Self::Char(v) => buf.push(pack_char(v)),
            Self::Int16(v) => buf.extend(pack_int16(v).iter().copied()),
            Self::Float24(v) => buf.extend(pack_float24(v).iter().copied()),
            Self::Ieee32(v) => buf.extend(pack_ieee32(v).iter().copied()),
        }
        buf
    }

    /// Decode an echoed payload as the same type as `self`.
    pub fn unpack_like(&self, data: &[u8]) -> Decoded<Value> {
        match self {
            Self::Char(_) => unpack_char(data).map(Self::Char),
            Self::Int16(_) => unpack_int16(data).map(Self::Int16),
            Self::Float24(_) => unpack_float24(data).map(Self::Float24),
            Self::Ieee32(_) => unpack_ieee32(data, false, false).map(|v| Self::Ieee32(v.value)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::Float24(v) | Self::Ieee32(v) => write!(f, "{:.2}", v),
        }
    }
}

/// An IEEE754 value with its optional time stamp and index fields.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ieee32 {
    pub value: f32,
    pub time: Option<u16>,
    pub index: Option<u16>,
}

pub fn pack_char(value: i8) -> u8 {
    value as u8
}

pub fn pack_int16(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn pack_uint16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn pack_ieee32(value: f32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Pack an IEEE754 value followed by the optional time and index fields.
pub fn pack_ieee32_with(value: f32, time: Option<u16>, index: Option<u16>) -> PayloadBuf {
    let mut buf = PayloadBuf::new();
    buf.extend(value.to_be_bytes().iter().copied());
    for field in time.iter().chain(index.iter()) {
        buf.extend(field.to_be_bytes().iter().copied());
    }
    buf
}

/// The three most significant bytes of the big-endian IEEE754 value.
/// The low mantissa byte is dropped, not rounded.
pub fn pack_float24(value: f32) -> [u8; 3] {
    let [b0, b1, b2, _] = value.to_be_bytes();
    [b0, b1, b2]
}

/// Strings are transmitted with their bytes in reverse order.
pub fn pack_string(value: &[u8]) -> Vec<u8> {
    value.iter().rev().copied().collect()
}

fn int16_bytes(data: &[u8]) -> Option<[u8; 2]> {
    match data {
        [] => None,
        [low] => Some([0, *low]),
        [high, low, ..] => Some([*high, *low]),
    }
}

pub fn unpack_int16(data: &[u8]) -> Decoded<i16> {
    match int16_bytes(data) {
        Some(bytes) => Decoded::Value(i16::from_be_bytes(bytes)),
        None => Decoded::failed(data),
    }
}

pub fn unpack_uint16(data: &[u8]) -> Decoded<u16> {
    match int16_bytes(data) {
        Some(bytes) => Decoded::Value(u16::from_be_bytes(bytes)),
        None => Decoded::failed(data),
    }
}

pub fn unpack_char(data: &[u8]) -> Decoded<i8> {
    unpack_uchar(data).map(|b| b as i8)
}

pub fn unpack_uchar(data: &[u8]) -> Decoded<u8> {
    match data {
        [b] => Decoded::Value(*b),
        _ => Decoded::failed(data),
    }
}

pub fn unpack_ieee32(data: &[u8], with_time: bool, with_index: bool) -> Decoded<Ieee32> {
    let expected = 4 + 2 * with_time as usize + 2 * with_index as usize;
    if data.len() != expected {
        return Decoded::failed(data);
    }
    let field = |pos: usize| u16::from_be_bytes([data[pos], data[pos + 1]]);
    let value = f32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let time = if with_time { Some(field(4)) } else { None };
    let index = if with_index {
        Some(field(4 + 2 * with_time as usize))
    } else {
        None
    };
    Decoded::Value(Ieee32 { value, time, index })
}

pub fn unpack_float24(data: &[u8]) -> Decoded<f32> {
    match data {
        [b0, b1, b2] => Decoded::Value(f32::from_be_bytes([*b0, *b1, *b2, 0])),
        _ => Decoded::failed(data),
    }
}

/// Reverse the byte order and decode as Windows-1251 text.
pub fn unpack_string(data: &[u8]) -> String {
    data.iter().rev().map(|&b| cp1251_char(b)).collect()
}

/// Windows-1251 code points for 0x80..=0xBF, 0x98 is unassigned.
const CP1251_HIGH: [char; 64] = [
    'Ђ', 'Ѓ', '‚', 'ѓ', '„', '…', '†', '‡', '€', '‰', 'Љ', '‹', 'Њ', 'Ќ', 'Ћ', 'Џ', //
    'ђ', '‘', '’', '“', '”', '•', '–', '—', '\u{fffd}', '™', 'љ', '›', 'њ', 'ќ', 'ћ', 'џ', //
    '\u{a0}', 'Ў', 'ў', 'Ј', '¤', 'Ґ', '¦', '§', 'Ё', '©', 'Є', '«', '¬', '\u{ad}', '®', 'Ї', //
    '°', '±', 'І', 'і', 'ґ', 'µ', '¶', '·', 'ё', '№', 'є', '»', 'ј', 'Ѕ', 'ѕ', 'ї', //
];

fn cp1251_char(b: u8) -> char {
    match b {
        0x00..=0x7f => b as char,
        0x80..=0xbf => CP1251_HIGH[(b - 0x80) as usize],
        // А..я are contiguous
        _ => core::char::from_u32(0x0410 + (b - 0xc0) as u32).unwrap_or('\u{fffd}'),
    }
}
