use nom::bytes::complete::take;
use nom::combinator::{all_consuming, map, verify};
use nom::multi::fold_many_m_n;
use nom::number::complete::{be_u16, u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::frame::{FrameBytes, MAX_FRAME_LEN, NIBBLE_BASE};

type Buf = [u8];

/// Fields of a binary frame: the two address/flag bytes, hash, payload and CRC.
pub(crate) type FrameFields<'a> = (u8, u8, u16, &'a Buf, u16);

/// Parses the nibble encoded body of a raw frame, without the start and stop markers.
pub(crate) fn raw_frame_body(buf: &Buf) -> IResult<&Buf, FrameBytes> {
    all_consuming(fold_many_m_n(
        0,
        MAX_FRAME_LEN,
        nibble_pair,
        FrameBytes::new,
        |mut frame, byte| {
            frame.push(byte); // can't overflow, bounded by fold_many_m_n
            frame
        },
    ))(buf)
}

fn nibble_pair(buf: &Buf) -> IResult<&Buf, u8> {
    map(tuple((nibble, nibble)), |(high, low)| high << 4 | low)(buf)
}

fn nibble(buf: &Buf) -> IResult<&Buf, u8> {
    map(
        verify(u8, |c: &u8| (NIBBLE_BASE..=NIBBLE_BASE + 0x0f).contains(c)),
        |c| c - NIBBLE_BASE,
    )(buf)
}

/// Splits a binary frame into its fields. The caller checks the minimum length.
pub(crate) fn frame_fields(buf: &Buf) -> IResult<&Buf, FrameFields<'_>> {
    let payload_len = buf.len().saturating_sub(6);
    all_consuming(tuple((u8, u8, be_u16, take(payload_len), be_u16)))(buf)
}
