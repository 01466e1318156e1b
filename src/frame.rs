//! Binary frames and their nibble encoded on-wire form.
//!
//! A frame is laid out as
//!
//! | bytes | content |
//! |---|---|
//! | 2 | address, request flag (`0x10`) or payload size (low nibble) |
//! | 2 | parameter name hash, big-endian |
//! | 0..=15 | payload |
//! | 2 | CRC of the preceding bytes, big-endian |
//!
//! On the wire every frame byte is sent as two bytes `0x47 + nibble`, high
//! nibble first, between a `#` start marker and a `\r` stop marker.

use arrayvec::ArrayVec;
use core::convert::TryFrom;
use snafu::{ensure, Snafu};

use crate::crc::crc16;
use crate::nom_parser::{frame_fields, raw_frame_body};
use crate::types::{Address, AddressLen, NameHash};

/// Largest payload the size nibble can describe.
pub const MAX_PAYLOAD: usize = 15;
/// Address, hash and CRC.
pub const OVERHEAD: usize = 6;
/// Longest binary frame.
pub const MAX_FRAME_LEN: usize = OVERHEAD + MAX_PAYLOAD;
/// Longest raw frame including markers.
pub const MAX_RAW_LEN: usize = 2 * MAX_FRAME_LEN + 2;

pub const START_MARKER: u8 = b'#';
pub const STOP_MARKER: u8 = b'\r';
pub(crate) const NIBBLE_BASE: u8 = 0x47;

const REQUEST_FLAG: u8 = 0x10;
const SIZE_MASK: u8 = 0x0f;

pub type Payload = ArrayVec<u8, MAX_PAYLOAD>;
pub type FrameBytes = ArrayVec<u8, MAX_FRAME_LEN>;
pub type RawFrameBytes = ArrayVec<u8, MAX_RAW_LEN>;

/// Frame level protocol errors.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Frame too short ({} bytes)", len))]
    TooShort { len: usize },
    #[snafu(display("Raw frame too long ({} bytes)", len))]
    TooLong { len: usize },
    #[snafu(display("CRC mismatch, computed {:#06x}, received {:#06x}", computed, received))]
    CrcMismatch { computed: u16, received: u16 },
    #[snafu(display("Size field {} doesn't match payload length {}", size, actual))]
    SizeMismatch { size: usize, actual: usize },
    #[snafu(display("Payload of {} bytes doesn't fit in a frame", len))]
    PayloadTooLarge { len: usize },
    #[snafu(display("Raw frame is missing start or stop marker"))]
    MissingMarkers,
    #[snafu(display("Raw frame contains invalid nibble data"))]
    InvalidNibble,
}

/// Request frames carry no data, all other frames carry a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Ask the device for the value of a parameter.
    Request,
    /// A value written to, or returned from, a device.
    Data(Payload),
}

/// A decoded binary frame. The CRC is computed by [`pack`](Self::pack) and
/// checked by [`unpack`](Self::unpack), so it isn't stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: Address,
    pub hash: NameHash,
    pub kind: FrameKind,
}

impl Frame {
    pub fn request(address: Address, hash: NameHash) -> Self {
        Self {
            address,
            hash,
            kind: FrameKind::Request,
        }
    }

    /// Create a data frame.
    /// # Errors
    /// Returns [`Error::PayloadTooLarge`] for payloads longer than [`MAX_PAYLOAD`].
    pub fn data(address: Address, hash: NameHash, payload: &[u8]) -> Result<Self, Error> {
        let payload = Payload::try_from(payload).map_err(|_| Error::PayloadTooLarge {
            len: payload.len(),
        })?;
        Ok(Self {
            address,
            hash,
            kind: FrameKind::Data(payload),
        })
    }

    pub fn is_request(&self) -> bool {
        self.kind == FrameKind::Request
    }

    /// The payload bytes, empty for requests.
    pub fn payload(&self) -> &[u8] {
        match &self.kind {
            FrameKind::Request => &[],
            FrameKind::Data(payload) => payload,
        }
    }

    /// Encode the frame, appending the CRC.
    pub fn pack(&self) -> FrameBytes {
        let [b0, b1] = self.address.to_bytes();
        let flags = match &self.kind {
            FrameKind::Request => REQUEST_FLAG,
            FrameKind::Data(payload) => payload.len() as u8,
        };

        let mut frame = FrameBytes::new();
        frame.push(b0);
        frame.push(b1 | flags);
        frame.extend(self.hash.to_bytes().iter().copied());
        frame.extend(self.payload().iter().copied());
        let crc = crc16(&frame);
        frame.extend(crc.to_be_bytes().iter().copied());
        frame
    }

    /// Decode and verify a binary frame.
    ///
    /// The address width can't be recovered from the frame itself, it has
    /// to be known by the caller.
    pub fn unpack(bytes: &[u8], addr_len: AddressLen) -> Result<Self, Error> {
        ensure!(bytes.len() >= OVERHEAD, TooShortSnafu { len: bytes.len() });

        let (_, (b0, b1, hash, payload, received)) =
            frame_fields(bytes).map_err(|_| Error::TooShort { len: bytes.len() })?;
        let computed = crc16(&bytes[..bytes.len() - 2]);
        ensure!(computed == received, CrcMismatchSnafu { computed, received });

        let size = (b1 & SIZE_MASK) as usize;
        ensure!(
            size == payload.len(),
            SizeMismatchSnafu {
                size,
                actual: payload.len()
            }
        );

        let address = Address::from_bytes(b0, b1, addr_len);
        let hash = NameHash::from_raw(hash);
        if b1 & REQUEST_FLAG != 0 {
            Ok(Self::request(address, hash))
        } else {
            Self::data(address, hash, payload)
        }
    }

    /// Encode the frame in its on-wire form.
    pub fn to_raw(&self) -> RawFrameBytes {
        raw::pack(&self.pack())
    }

    /// Decode a frame from its on-wire form.
    pub fn from_raw(raw: &[u8], addr_len: AddressLen) -> Result<Self, Error> {
        Self::unpack(&raw::unpack(raw)?, addr_len)
    }
}

/// The nibble encoding of binary frames.
pub mod raw {
    use super::*;

    /// Encode binary frame bytes, adding the start and stop markers.
    pub fn pack(frame: &FrameBytes) -> RawFrameBytes {
        let mut raw = RawFrameBytes::new();
        raw.push(START_MARKER);
        for byte in frame {
            raw.push(NIBBLE_BASE + (byte >> 4));
            raw.push(NIBBLE_BASE + (byte & 0x0f));
        }
        raw.push(STOP_MARKER);
        raw
    }

    /// Strip the markers and recombine the nibble pairs.
    pub fn unpack(raw: &[u8]) -> Result<FrameBytes, Error> {
        ensure!(
            raw.len() >= 2 && raw[0] == START_MARKER && raw[raw.len() - 1] == STOP_MARKER,
            MissingMarkersSnafu
        );
        ensure!(raw.len() <= MAX_RAW_LEN, TooLongSnafu { len: raw.len() });
        let (_, frame) = raw_frame_body(&raw[1..raw.len() - 1]).map_err(|_| Error::InvalidNibble)?;
        Ok(frame)
    }
}
