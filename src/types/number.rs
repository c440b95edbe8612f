// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Byte-level numeric decoders used by the DV record parser. Generalised
//! to return the bare primitive rather than a `DataType` directly, so
//! `record.rs` can decide which `DataType` variant wraps it.

use winnow::binary;
use winnow::combinator::repeat;
use winnow::error::{ErrMode, ErrorKind, StrContext};
use winnow::prelude::*;
use winnow::Bytes;

use crate::codec::bcd2bin;
use crate::error::MBusError;

pub fn parse_bcd<'a>(len: usize) -> impl Parser<&'a Bytes, i64, MBusError> {
	move |input: &mut &'a Bytes| {
		let checkpoint = *input;
		let bytes: Vec<u8> = repeat(len, binary::u8).parse_next(input)?;
		let negative = bytes.last().map(|b| b >> 4 == 0xF).unwrap_or(false);
		let mut bytes = bytes;
		if negative {
			if let Some(last) = bytes.last_mut() {
				*last &= 0x0F;
			}
		}
		match bcd2bin(&bytes) {
			Some(v) => Ok(if negative { -(v as i64) } else { v as i64 }),
			None => {
				*input = checkpoint;
				Err(ErrMode::Backtrack(MBusError::kind(input, ErrorKind::Verify)))
			}
		}
	}
}

/// Lenient BCD decode for the "invalid BCD" alt-branch: zeroes out
/// non-decimal nibbles instead of failing, so a corrupt field still
/// surfaces as a (wrong but present) `ErrorValue` rather than aborting
/// the whole record.
pub fn parse_invalid_bcd<'a>(len: usize) -> impl Parser<&'a Bytes, i64, MBusError> {
	move |input: &mut &'a Bytes| {
		let bytes: Vec<u8> = repeat(len, binary::u8).parse_next(input)?;
		let mut ret: i64 = 0;
		for byte in bytes.iter().rev() {
			let hi = (byte >> 4).min(9);
			let lo = (byte & 0x0F).min(9);
			ret = ret * 10 + hi as i64;
			ret = ret * 10 + lo as i64;
		}
		Ok(ret)
	}
}

const TWOS_COMPLEMENT_MASK: u8 = 0b1000_0000;

pub fn parse_binary_signed<'a>(len: usize) -> impl Parser<&'a Bytes, i64, MBusError> {
	move |input: &mut &'a Bytes| {
		let mut data: Vec<u8> = repeat(len, binary::u8).parse_next(input)?;
		Ok(match data.len() {
			1 => i8::from_le_bytes(data.try_into().unwrap()) as i64,
			2 => i16::from_le_bytes(data.try_into().unwrap()) as i64,
			4 => i32::from_le_bytes(data.try_into().unwrap()) as i64,
			8 => i64::from_le_bytes(data.try_into().unwrap()),
			n @ (3 | 6) => {
				let is_negative = data.last().unwrap() & TWOS_COMPLEMENT_MASK != 0;
				let filler = if is_negative { 0xFF } else { 0x00 };
				data.extend((0..(8 - n)).map(|_| filler));
				i64::from_le_bytes(data.try_into().unwrap())
			}
			_ => return Err(ErrMode::Backtrack(MBusError::kind(input, ErrorKind::Verify))),
		})
	}
}

pub fn parse_binary_unsigned<'a>(len: usize) -> impl Parser<&'a Bytes, u64, MBusError> {
	move |input: &mut &'a Bytes| {
		let mut data: Vec<u8> = repeat(len, binary::u8).parse_next(input)?;
		Ok(match data.len() {
			1 => data[0] as u64,
			2 => u16::from_le_bytes(data.try_into().unwrap()) as u64,
			4 => u32::from_le_bytes(data.try_into().unwrap()) as u64,
			8 => u64::from_le_bytes(data.try_into().unwrap()),
			n @ (3 | 6) => {
				data.extend((0..(8 - n)).map(|_| 0x00));
				u64::from_le_bytes(data.try_into().unwrap())
			}
			_ => return Err(ErrMode::Backtrack(MBusError::kind(input, ErrorKind::Verify))),
		})
	}
}

pub fn parse_real(input: &mut &Bytes) -> winnow::PResult<f32, MBusError> {
	binary::f32(binary::Endianness::Little)
		.context(StrContext::Label("real (type H)"))
		.parse_next(input)
}

#[cfg(test)]
mod tests {
	use super::*;
	use winnow::Bytes;

	#[test]
	fn bcd_two_bytes() {
		let data = Bytes::new(&[0x34, 0x12]);
		let mut input = data;
		assert_eq!(parse_bcd(2).parse_next(&mut input).unwrap(), 1234);
	}

	#[test]
	fn bcd_negative() {
		let data = Bytes::new(&[0xF1]);
		let mut input = data;
		assert_eq!(parse_bcd(1).parse_next(&mut input).unwrap(), -1);
	}

	#[test]
	fn binary_signed_i16() {
		let data = Bytes::new(&(-5i16).to_le_bytes());
		let mut input = data;
		assert_eq!(parse_binary_signed(2).parse_next(&mut input).unwrap(), -5);
	}

	#[test]
	fn binary_unsigned_u24() {
		let data = Bytes::new(&[0x01, 0x00, 0x01]);
		let mut input = data;
		assert_eq!(parse_binary_unsigned(3).parse_next(&mut input).unwrap(), 0x010001);
	}
}
