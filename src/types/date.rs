// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Date/time value types. Type F and type G are defined in [`crate::codec`]
//! since the frame-codec layer needs them independently of the DV parser;
//! re-exported here so `crate::types::date::{TypeFDateTime, TypeGDate}`
//! reads naturally alongside their less common siblings.
//!
//! Types I (compound datetime, CP48), J (time) and K (DST info) are not
//! named in the field-matching spec this crate implements and have no
//! surviving reference in the retrieved original sources; they're kept
//! here at EN 13757-3 Annex A's documented bit layout so the VIF table's
//! less common date codes still decode into *something* rather than
//! failing the whole telegram.

pub use crate::codec::{TypeFDateTime, TypeGDate};

use winnow::binary::bits;
use winnow::error::StrContext;
use winnow::prelude::*;
use winnow::Bytes;

use crate::error::MBResult;
use crate::types::BitsInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeIDateTime {
	pub second: u8,
	pub minute: u8,
	pub hour: u8,
	pub day: u8,
	pub month: u8,
	pub year: u16,
	pub day_of_week: u8,
	pub week: u8,
	pub invalid: bool,
	pub dst: bool,
}

impl TypeIDateTime {
	pub fn parse(input: &mut &Bytes) -> MBResult<Self> {
		bits::bits::<_, _, crate::error::MBusError, _, _>(Self::parse_bits)
			.context(StrContext::Label("type I date-time"))
			.parse_next(input)
	}

	fn parse_bits(input: &mut BitsInput<'_>) -> MBResult<Self> {
		let (invalid, _res, second): (bool, u8, u8) =
			(bits::bool, bits::take(1_usize), bits::take(6_usize)).parse_next(input)?;
		let (_res2, minute): (u8, u8) = (bits::take(2_usize), bits::take(6_usize)).parse_next(input)?;
		let (_res3, dst, hour): (u8, bool, u8) =
			(bits::take(2_usize), bits::bool, bits::take(5_usize)).parse_next(input)?;
		let (year_low, day): (u8, u8) = (bits::take(3_usize), bits::take(5_usize)).parse_next(input)?;
		let (year_high, month): (u8, u8) = (bits::take(4_usize), bits::take(4_usize)).parse_next(input)?;
		let (day_of_week, week): (u8, u8) = (bits::take(3_usize), bits::take(5_usize)).parse_next(input)?;
		let year = 2000 + ((year_high << 3) | year_low) as u16;
		Ok(TypeIDateTime {
			second,
			minute,
			hour,
			day,
			month,
			year,
			day_of_week,
			week,
			invalid,
			dst,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeJTime {
	pub second: u8,
	pub minute: u8,
	pub hour: u8,
	pub invalid: bool,
}

impl TypeJTime {
	pub fn parse(input: &mut &Bytes) -> MBResult<Self> {
		bits::bits::<_, _, crate::error::MBusError, _, _>(Self::parse_bits)
			.context(StrContext::Label("type J time"))
			.parse_next(input)
	}

	fn parse_bits(input: &mut BitsInput<'_>) -> MBResult<Self> {
		let (invalid, _res, second): (bool, u8, u8) =
			(bits::bool, bits::take(1_usize), bits::take(6_usize)).parse_next(input)?;
		let (_res2, minute): (u8, u8) = (bits::take(2_usize), bits::take(6_usize)).parse_next(input)?;
		let (_res3, hour): (u8, u8) = (bits::take(3_usize), bits::take(5_usize)).parse_next(input)?;
		Ok(TypeJTime {
			second,
			minute,
			hour,
			invalid,
		})
	}
}

/// Daylight-savings-change info (VIF "DST to K"): a signed offset in
/// minutes applied at the next DST transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeKDST {
	pub delta_minutes: i16,
}

impl TypeKDST {
	pub fn parse(input: &mut &Bytes) -> MBResult<Self> {
		winnow::binary::le_i16
			.map(|delta_minutes| TypeKDST { delta_minutes })
			.context(StrContext::Label("type K DST"))
			.parse_next(input)
	}
}
