// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2
#![allow(dead_code)]

use crate::error::{MBResult, MBusError};
use crate::types::BitsInput;
use winnow::binary::bits;
use winnow::error::StrContext;
use winnow::Parser;

#[derive(Debug, Clone, Copy)]
pub enum RawDataType {
	None,
	Binary(usize),
	Real,
	BCD(usize),
	LVAR,
}

impl RawDataType {
	fn parse(input: &mut BitsInput<'_>) -> MBResult<Self> {
		bits::take(4_usize)
			.verify_map(|value: u8| match value {
				0b0000 => Some(Self::None),
				0b0001..=0b0100 | 0b0110 => Some(Self::Binary(value.into())),
				0b0111 => Some(Self::Binary(8)),
				0b1001 | 0b1010 | 0b1011 | 0b1100 | 0b1110 => Some(Self::BCD((value - 0b1000) as usize)),
				0b0101 => Some(Self::Real),
				0b1101 => Some(Self::LVAR),
				0b1000 => None, // "Selection for readout" — not a stored value
				0b1111 => None, // global readout request; never a valid record here
				_ => unreachable!(),
			})
			.parse_next(input)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFunction {
	InstantaneousValue,
	MaximumValue,
	MinimumValue,
	ValueDuringErrorState,
}

impl DataFunction {
	fn parse(input: &mut BitsInput<'_>) -> MBResult<Self> {
		bits::take(2_usize)
			.map(|value: u8| match value {
				0b00 => Self::InstantaneousValue,
				0b01 => Self::MaximumValue,
				0b10 => Self::MinimumValue,
				0b11 => Self::ValueDuringErrorState,
				_ => unreachable!(),
			})
			.parse_next(input)
	}
}

#[derive(Debug)]
pub struct DataInfoBlock {
	pub raw_type: RawDataType,
	pub function: DataFunction,
	pub storage: u64,
	pub tariff: u32,
	pub device: u16,
	/// EN 13757-3:2018 6.3.5: some meters use the storage number to carry
	/// an OBIS value-group F register number instead of a plain history
	/// index; flagged here so the field extractor can decide whether to
	/// treat it as such.
	pub is_obis: bool,
}

impl DataInfoBlock {
	pub fn parse(input: &mut BitsInput<'_>) -> MBResult<Self> {
		let (mut extension, mut storage, function, raw_type): (bool, u64, _, _) = (
			bits::bool,
			bits::take(1_usize),
			DataFunction::parse,
			RawDataType::parse.context(StrContext::Label("raw data type")),
		)
			.context(StrContext::Label("DIF byte"))
			.parse_next(input)?;

		let mut is_obis = false;
		let mut tariff = 0;
		let mut device = 0;

		let mut i = 1;
		while extension {
			if i > 10 {
				return Err(MBusError::assert(input, "Packet has more than 10 DIFEs!"));
			}

			let dife_device: u16;
			let dife_tariff: u32;
			let dife_storage: u64;

			(extension, dife_device, dife_tariff, dife_storage) = (
				bits::bool,
				bits::take(1_usize),
				bits::take(2_usize),
				bits::take(4_usize),
			)
				.context(StrContext::Label("DIFE byte"))
				.parse_next(input)?;

			if !extension && dife_device == 0 && dife_tariff == 0 && dife_storage == 0 {
				is_obis = true;
				break;
			}

			storage <<= 4;
			storage += dife_storage;
			device = (device << 1) + dife_device;
			tariff = (tariff << 2) + dife_tariff;
			i += 1;
		}

		Ok(Self {
			raw_type,
			function,
			storage,
			tariff,
			device,
			is_obis,
		})
	}
}
