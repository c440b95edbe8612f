// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2
#![allow(dead_code)]
use winnow::binary;
use winnow::combinator::peek;
use winnow::error::StrContext;
use winnow::prelude::*;
use winnow::Bytes;

use crate::error::{MBResult, MBusError};
use crate::manufacturer::{device_name, unpack_manufacturer_code};
use crate::types::number::parse_bcd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationError {
	None,
	Busy,
	/// Shall be used to communicate a failure during the interpretation or the
	/// execution of a received command, e.g. if a non-decipherable message was
	/// received.
	Error,
	/// Shall be used if a correct working application detects an abnormal
	/// behaviour like a permanent flow of water by a water meter.
	Alarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeterStatus {
	pub manufacturer_2: bool,
	pub manufacturer_1: bool,
	pub manufacturer_0: bool,
	/// Warning — the "temporary error" bit is set only if the meter signals
	/// a slight error condition that doesn't immediately require service
	/// and may later disappear.
	pub temporary_error: bool,
	/// Failure — the "permanent error" bit is set only if the meter
	/// signals a fatal device error requiring service; cleared only by
	/// that service action.
	pub permanent_error: bool,
	/// Warning — set to signal interruption of external power or end of
	/// battery life.
	pub power_low: bool,
	pub application: ApplicationError,
}

impl MeterStatus {
	/// Packed back into a single byte, in the wire bit order, for the
	/// lookup/translate engine to run against.
	pub fn bits(&self) -> u64 {
		let application = match self.application {
			ApplicationError::None => 0,
			ApplicationError::Busy => 1,
			ApplicationError::Error => 2,
			ApplicationError::Alarm => 3,
		};
		((self.manufacturer_2 as u64) << 7)
			| ((self.manufacturer_1 as u64) << 6)
			| ((self.manufacturer_0 as u64) << 5)
			| ((self.temporary_error as u64) << 4)
			| ((self.permanent_error as u64) << 3)
			| ((self.power_low as u64) << 2)
			| application
	}

	fn parse(input: &mut &Bytes) -> MBResult<MeterStatus> {
		binary::bits::bits::<_, _, MBusError, _, _>((
			binary::bits::bool,
			binary::bits::bool,
			binary::bits::bool,
			binary::bits::bool,
			binary::bits::bool,
			binary::bits::bool,
			binary::bits::take(2_usize),
		))
		.map(
			|(manufacturer_2, manufacturer_1, manufacturer_0, temporary_error, permanent_error, power_low, application)| {
				MeterStatus {
					manufacturer_2,
					manufacturer_1,
					manufacturer_0,
					temporary_error,
					permanent_error,
					power_low,
					application: match application {
						0b00 => ApplicationError::None,
						0b01 => ApplicationError::Busy,
						0b10 => ApplicationError::Error,
						0b11 => ApplicationError::Alarm,
						_ => unreachable!(),
					},
				}
			},
		)
		.parse_next(input)
	}
}

/// Placeholder for the AFL (Authentication and Fragmentation Layer, EN
/// 13757-7 §7.6.2/§7.6.3) header that can precede the TPL body. None of
/// the supplied drivers exercise AFL, so parsing stops at recognising its
/// absence; a telegram that needs it is reported via `CICode::Afl`
/// instead of being misread as a TPL header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraHeader;

/// The EN 13757-7 security mode selecting how the payload that follows
/// the TPL header is encrypted, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
	None,
	/// Mode 5: AES-128-CBC, static key, IV built from M-field|A-field|access
	/// number ×8. See [`crate::crypto::decrypt_mode5`].
	Mode5,
	/// Mode 7: AES-128-CBC, key derived per telegram via EN 13757-7 §9.5.2.
	/// See [`crate::crypto::decrypt_mode7`].
	Mode7,
	/// Mode 9: TLS 1.2 transport (out of scope for this crate: TLS runs
	/// below the telegram boundary, not within it). Recognised so the
	/// orchestrator can report it distinctly rather than misreading the
	/// payload as ciphertext.
	Mode9,
	/// Mode 13: AES-128-CTR keyed from the ELL header. See
	/// [`crate::crypto::decrypt_mode13`].
	Mode13,
	/// A value the standard reserves outright (libmbus's test corpus uses
	/// some of these anyway, hence keeping the raw value around).
	Reserved(u8),
	/// A defined-but-unimplemented security mode.
	Unsupported(u8),
}

impl SecurityMode {
	fn parse(input: &mut &Bytes) -> MBResult<SecurityMode> {
		let raw_value = peek(binary::le_u16)
			.context(StrContext::Label("Raw value peek"))
			.parse_next(input)?;
		(binary::bits::bits::<_, _, MBusError, _, _>((
			binary::bits::take(8_usize).context(StrContext::Label("Security mode info low")),
			binary::bits::take(5_usize).context(StrContext::Label("Security mode")),
			binary::bits::take(3_usize).context(StrContext::Label("Security mode info high")),
		)))
		.verify_map(|(info_low, security_mode, info_high): (u8, u8, u8)| {
			match security_mode {
				0 => {
					if info_high == 0 && info_low == 0 {
						Some(SecurityMode::None)
					} else {
						None
					}
				}
				5 => Some(SecurityMode::Mode5),
				7 => Some(SecurityMode::Mode7),
				9 => Some(SecurityMode::Mode9),
				13 => Some(SecurityMode::Mode13),
				// libmbus strikes again
				6 | 11 | 12 | 14 | 16..=31 => Some(SecurityMode::Reserved(raw_value as u8)),
				other => Some(SecurityMode::Unsupported(other)),
			}
		})
		.parse_next(input)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortHeader {
	pub access_number: u8,
	pub status: MeterStatus,
	pub configuration_field: SecurityMode,
	pub extra_header: Option<ExtraHeader>,
}

impl ShortHeader {
	pub fn parse(input: &mut &Bytes) -> MBResult<TPLHeader> {
		Self::parse_raw.map(TPLHeader::Short).parse_next(input)
	}

	fn parse_raw(input: &mut &Bytes) -> MBResult<ShortHeader> {
		(
			binary::u8.context(StrContext::Label("access number")),
			MeterStatus::parse.context(StrContext::Label("status")),
			SecurityMode::parse.context(StrContext::Label("tpl configuration field")),
		)
			.map(|(access_number, status, configuration_field)| ShortHeader {
				access_number,
				status,
				configuration_field,
				// AFL isn't parsed yet (see `ExtraHeader`), so this is
				// always `None` regardless of `configuration_field`.
				extra_header: None,
			})
			.parse_next(input)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterMeterType {
	Potable,      // temperature unspecified
	Irrigation,   // (unpotable)
	Cold,         // (potable)
	Warm,         // 30°C..90°C
	Hot,          // >=90°C
	DualRegister, // (potable)
	Waste,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalMeterType {
	OutletHeat,
	InletHeat,
	OutletCooling,
	InletCooling,
	Combined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
	Other,
	OilMeter,
	ElectricityMeter,
	GasMeter,
	ThermalEnergyMeter(ThermalMeterType),
	SteamMeter,
	WaterMeter(WaterMeterType),
	HeatCostAllocator,
	CompressedAir,
	BusOrSystemComponent,
	Unknown, // Different to "other" apparently
	WaterDataLogger,
	GasDataLogger,
	GasConverter,
	CalorificValue,
	PressureMeter,
	ADConverter,
	SmokeDetector,
	RoomSensor, // "e.g. temperature or humidity"
	GasDetector,
	ReservedSensor,
	ElectricalBreaker,
	Valve, // Gas or water
	ReservedSwitchingDevice,
	CustomerUnit, // Display device
	ReservedCustomerUnit,
	Garbage,
	ReservedCO2,
	ReservedEnvironmental,
	ServiceTool,
	CommunicationController, // "Gateway"
	UnidirectionalRepeater,
	BidirectionalRepeater,
	ReservedSystemDevice,
	RadioConverterSystemSide,
	RadioConverterMeterSide,
	BusConverterMeterSide,
	Reserved, // Just in general
	Wildcard,
}

impl DeviceType {
	pub fn as_media_code(self) -> u8 {
		match self {
			Self::Other => 0x00,
			Self::OilMeter => 0x01,
			Self::ElectricityMeter => 0x02,
			Self::GasMeter => 0x03,
			Self::ThermalEnergyMeter(ThermalMeterType::OutletHeat) => 0x04,
			Self::SteamMeter => 0x05,
			Self::WaterMeter(WaterMeterType::Warm) => 0x06,
			Self::WaterMeter(WaterMeterType::Potable) => 0x07,
			Self::HeatCostAllocator => 0x08,
			Self::CompressedAir => 0x09,
			Self::ThermalEnergyMeter(ThermalMeterType::OutletCooling) => 0x0A,
			Self::ThermalEnergyMeter(ThermalMeterType::InletCooling) => 0x0B,
			Self::ThermalEnergyMeter(ThermalMeterType::InletHeat) => 0x0C,
			Self::ThermalEnergyMeter(ThermalMeterType::Combined) => 0x0D,
			Self::BusOrSystemComponent => 0x0E,
			Self::Unknown => 0x0F,
			Self::WaterMeter(WaterMeterType::Irrigation) => 0x10,
			Self::WaterDataLogger => 0x11,
			Self::GasDataLogger => 0x12,
			Self::GasConverter => 0x13,
			Self::CalorificValue => 0x14,
			Self::WaterMeter(WaterMeterType::Hot) => 0x15,
			Self::WaterMeter(WaterMeterType::Cold) => 0x16,
			Self::WaterMeter(WaterMeterType::DualRegister) => 0x17,
			Self::PressureMeter => 0x18,
			Self::ADConverter => 0x19,
			Self::SmokeDetector => 0x1A,
			Self::RoomSensor => 0x1B,
			Self::GasDetector => 0x1C,
			Self::ReservedSensor => 0x1D,
			Self::ElectricalBreaker => 0x20,
			Self::Valve => 0x21,
			Self::ReservedSwitchingDevice => 0x22,
			Self::CustomerUnit => 0x25,
			Self::ReservedCustomerUnit => 0x26,
			Self::WaterMeter(WaterMeterType::Waste) => 0x28,
			Self::Garbage => 0x29,
			Self::ReservedCO2 => 0x2A,
			Self::ReservedEnvironmental => 0x2B,
			Self::ServiceTool => 0x30,
			Self::CommunicationController => 0x31,
			Self::UnidirectionalRepeater => 0x32,
			Self::BidirectionalRepeater => 0x33,
			Self::ReservedSystemDevice => 0x34,
			Self::RadioConverterSystemSide => 0x36,
			Self::RadioConverterMeterSide => 0x37,
			Self::BusConverterMeterSide => 0x38,
			Self::Reserved => 0x40,
			Self::Wildcard => 0xFF,
		}
	}

	/// The output record's `media` string. Not an exhaustive prose
	/// rendering of every variant, just the ones the shipped drivers
	/// actually dispatch on; anything else falls back to a generic label
	/// derived from the variant name.
	pub fn media_name(self) -> &'static str {
		match self {
			Self::ElectricityMeter => "electricity",
			Self::WaterMeter(WaterMeterType::Cold) => "cold water",
			Self::WaterMeter(WaterMeterType::Warm) => "warm water",
			Self::WaterMeter(WaterMeterType::Hot) => "hot water",
			Self::WaterMeter(WaterMeterType::Potable) | Self::WaterMeter(WaterMeterType::DualRegister) => "water",
			Self::WaterMeter(WaterMeterType::Irrigation) => "irrigation water",
			Self::WaterMeter(WaterMeterType::Waste) => "waste water",
			Self::ThermalEnergyMeter(_) => "heat",
			Self::GasMeter => "gas",
			Self::HeatCostAllocator => "heat cost allocation",
			Self::RoomSensor => "room sensor",
			Self::SmokeDetector => "smoke detector",
			Self::Other => "other",
			Self::Unknown => "unknown",
			_ => "other",
		}
	}

	/// The inverse of [`Self::as_media_code`], usable outside a parser
	/// context (e.g. from a DLL A-field media byte, which carries no
	/// surrounding TPL bytes to parse against).
	pub fn from_media_code(v: u8) -> Self {
		match v {
			0x00 => Self::Other,
			0x01 => Self::OilMeter,
			0x02 => Self::ElectricityMeter,
			0x03 => Self::GasMeter,
			0x04 => Self::ThermalEnergyMeter(ThermalMeterType::OutletHeat),
			0x05 => Self::SteamMeter,
			0x06 => Self::WaterMeter(WaterMeterType::Warm),
			0x07 => Self::WaterMeter(WaterMeterType::Potable),
			0x08 => Self::HeatCostAllocator,
			0x09 => Self::CompressedAir,
			0x0A => Self::ThermalEnergyMeter(ThermalMeterType::OutletCooling),
			0x0B => Self::ThermalEnergyMeter(ThermalMeterType::InletCooling),
			0x0C => Self::ThermalEnergyMeter(ThermalMeterType::InletHeat),
			0x0D => Self::ThermalEnergyMeter(ThermalMeterType::Combined),
			0x0E => Self::BusOrSystemComponent,
			0x0F => Self::Unknown,
			0x10 => Self::WaterMeter(WaterMeterType::Irrigation),
			0x11 => Self::WaterDataLogger,
			0x12 => Self::GasDataLogger,
			0x13 => Self::GasConverter,
			0x14 => Self::CalorificValue,
			0x15 => Self::WaterMeter(WaterMeterType::Hot),
			0x16 => Self::WaterMeter(WaterMeterType::Cold),
			0x17 => Self::WaterMeter(WaterMeterType::DualRegister),
			0x18 => Self::PressureMeter,
			0x19 => Self::ADConverter,
			0x1A => Self::SmokeDetector,
			0x1B => Self::RoomSensor,
			0x1C => Self::GasDetector,
			0x1D..=0x1F => Self::ReservedSensor,
			0x20 => Self::ElectricalBreaker,
			0x21 => Self::Valve,
			0x22..=0x24 => Self::ReservedSwitchingDevice,
			0x25 => Self::CustomerUnit,
			0x26 | 0x27 => Self::ReservedCustomerUnit,
			0x28 => Self::WaterMeter(WaterMeterType::Waste),
			0x29 => Self::Garbage,
			0x2A => Self::ReservedCO2,
			0x2B..=0x2F => Self::ReservedEnvironmental,
			0x30 => Self::ServiceTool,
			0x31 => Self::CommunicationController,
			0x32 => Self::UnidirectionalRepeater,
			0x33 => Self::BidirectionalRepeater,
			0x34 | 0x35 => Self::ReservedSystemDevice,
			0x36 => Self::RadioConverterSystemSide,
			0x37 => Self::RadioConverterMeterSide,
			0x38 => Self::BusConverterMeterSide,
			0x39..=0x3F => Self::ReservedSystemDevice,
			0x40..=0xFE => Self::Reserved,
			0xFF => Self::Wildcard,
		}
	}

	fn parse(input: &mut &Bytes) -> MBResult<Self> {
		binary::u8.map(Self::from_media_code).parse_next(input)
	}
}

#[derive(Debug, Clone)]
pub struct LongHeader {
	pub identifier: u32,
	pub manufacturer: String,
	pub manufacturer_code: u16,
	pub device_name: Option<&'static str>,
	pub version: u8,
	pub device_type: DeviceType,
	pub access_number: u8,
	pub status: MeterStatus,
	pub configuration_field: SecurityMode,
	pub extra_header: Option<ExtraHeader>,
}

impl LongHeader {
	pub fn parse(input: &mut &Bytes) -> MBResult<TPLHeader> {
		(
			parse_bcd(4)
				.try_map(u32::try_from)
				.with_recognized()
				.context(StrContext::Label("device identifier")),
			binary::le_u16
				.verify_map(|raw| {
					unpack_manufacturer_code(raw)
						.ok()
						.filter(|parsed| parsed.chars().all(|c| c.is_ascii_uppercase()))
						.map(|parsed| (parsed, raw))
				})
				.context(StrContext::Label("manufacturer")),
			binary::u8.context(StrContext::Label("version")),
			DeviceType::parse.context(StrContext::Label("device type")),
			// The rest of the long header is simply the short header, so use that parser
			ShortHeader::parse_raw,
		)
			.map(
				|((identifier, raw_identifier), (manufacturer, raw_manufacturer), version, device_type, short_header)| LongHeader {
					identifier,
					manufacturer,
					manufacturer_code: raw_manufacturer,
					device_name: device_name(raw_identifier, raw_manufacturer, version, device_type.as_media_code()),
					version,
					device_type,
					access_number: short_header.access_number,
					status: short_header.status,
					configuration_field: short_header.configuration_field,
					extra_header: short_header.extra_header,
				},
			)
			.map(TPLHeader::Long)
			.parse_next(input)
	}
}

#[derive(Debug, Clone)]
pub enum TPLHeader {
	None,
	Short(ShortHeader),
	Long(LongHeader),
}

impl TPLHeader {
	pub fn configuration_field(&self) -> SecurityMode {
		match self {
			TPLHeader::None => SecurityMode::None,
			TPLHeader::Short(h) => h.configuration_field,
			TPLHeader::Long(h) => h.configuration_field,
		}
	}

	pub fn access_number(&self) -> Option<u8> {
		match self {
			TPLHeader::None => None,
			TPLHeader::Short(h) => Some(h.access_number),
			TPLHeader::Long(h) => Some(h.access_number),
		}
	}

	pub fn status(&self) -> Option<MeterStatus> {
		match self {
			TPLHeader::None => None,
			TPLHeader::Short(h) => Some(h.status),
			TPLHeader::Long(h) => Some(h.status),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use winnow::Bytes;

	#[test]
	fn security_mode_none_requires_zeroed_info() {
		let data = [0x00u8, 0x00];
		let mut input: &Bytes = Bytes::new(&data);
		let mode = SecurityMode::parse(&mut input).unwrap();
		assert_eq!(mode, SecurityMode::None);
	}

	#[test]
	fn security_mode_5_is_recognised() {
		// info_low=0, security_mode=5 (0b00101) in the top 5 bits, info_high=0 in the bottom 3
		let byte1 = 0b0010_1000u8;
		let data = [0x00u8, byte1];
		let mut input: &Bytes = Bytes::new(&data);
		let mode = SecurityMode::parse(&mut input).unwrap();
		assert_eq!(mode, SecurityMode::Mode5);
	}

	#[test]
	fn short_header_parses_access_status_and_mode() {
		let data = [0x2Au8, 0x00, 0x00, 0x00];
		let mut input: &Bytes = Bytes::new(&data);
		let header = ShortHeader::parse(&mut input).unwrap();
		match header {
			TPLHeader::Short(h) => {
				assert_eq!(h.access_number, 0x2A);
				assert_eq!(h.configuration_field, SecurityMode::None);
			}
			other => panic!("expected Short, got {other:?}"),
		}
	}
}
