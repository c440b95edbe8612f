// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Apator at-wmbus-16-2: a water meter whose payload is "mostly a
//! proprietary protocol simply wrapped inside a wmbus telegram" — there's
//! no declared DIF/VIF for the total, so its byte offset is guessed from
//! three header bytes.
//!
//! Grounded in `meter_apator162.cc`'s `processContent`,
//! ported verbatim: the `guess10`/`guess11`/`guess12` bit-pattern cascade
//! choosing offset 9, 12, 20 or 23, then four little-endian bytes scaled
//! by VIF `0x13` (volume, `10^(3-6)` m3, i.e. `/1000`).

use std::sync::OnceLock;

use crate::driver::field::{FieldInfo, FieldMatcher};
use crate::driver::registry::Triple;
use crate::driver::Driver;
use crate::dvparser::{DvEntry, MeasurementType};
use crate::error::WmbusError;
use crate::manufacturer::MANUFACTURER_APA;
use crate::telegram::Telegram;
use crate::types::DataType;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

/// Mirrors `MeterApator162::processContent`'s offset cascade exactly,
/// byte for byte.
fn guess_total_offset(content: &[u8]) -> Option<usize> {
	let guess10 = *content.get(10)?;
	let guess11 = *content.get(11)?;

	if guess11 & 0x84 == 0x84 {
		Some(23)
	} else if guess11 & 0x83 == 0x83 {
		Some(23)
	} else if guess11 & 0x81 == 0x81 {
		Some(if guess10 == 0x02 { 23 } else { 20 })
	} else if guess11 & 0x40 == 0x40 {
		Some(20)
	} else if guess11 & 0x10 == 0x10 {
		Some(12)
	} else if guess11 & 0x01 == 0x01 {
		Some(9)
	} else {
		None
	}
}

fn consumption_m3(content: &[u8]) -> Option<f64> {
	let offset = guess_total_offset(content)?;
	let bytes: [u8; 4] = content.get(offset..offset + 4)?.try_into().ok()?;
	Some(u32::from_le_bytes(bytes) as f64 / 1000.0)
}

pub struct Apator162 {
	triples: Vec<Triple>,
	fields: Vec<FieldInfo>,
}

impl Apator162 {
	pub fn new() -> Self {
		Apator162 {
			triples: vec![Triple::exact(MANUFACTURER_APA, 0x06, 0x05), Triple::exact(MANUFACTURER_APA, 0x07, 0x05)],
			fields: vec![FieldInfo::new("total", Quantity::Volume, Unit::M3, FieldMatcher::key("total"))],
		}
	}
}

impl Default for Apator162 {
	fn default() -> Self {
		Self::new()
	}
}

impl Driver for Apator162 {
	fn name(&self) -> &'static str {
		"apator162"
	}

	fn triples(&self) -> &[Triple] {
		&self.triples
	}

	fn fields(&self) -> &[FieldInfo] {
		&self.fields
	}

	fn process_content(&self, telegram: &mut Telegram) -> Option<Result<(), WmbusError>> {
		let content = telegram.content.as_ref()?;
		let Some(m3) = consumption_m3(content) else {
			return Some(Err(WmbusError::Parse {
				offset: 11,
				message: "unrecognised apator162 proprietary offset marker".into(),
			}));
		};
		telegram.entries.insert(
			"total".into(),
			DvEntry {
				offset: 0,
				key: "total".into(),
				measurement: MeasurementType::Instantaneous,
				vif_range: VifRange::Volume,
				storage_nr: 0,
				tariff_nr: 0,
				subunit_nr: 0,
				is_obis: false,
				combinable: Vec::new(),
				value: DataType::None,
				numeric: Some((m3, Unit::M3)),
			},
		);
		Some(Ok(()))
	}
}

static INSTANCE: OnceLock<Apator162> = OnceLock::new();

pub fn driver() -> &'static Apator162 {
	INSTANCE.get_or_init(Apator162::new)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::extractor::extract;
	use crate::output::FieldValue;

	fn content_with_marker_at(offset: usize, marker_byte11: u8, consumption_raw: u32) -> Vec<u8> {
		let mut content = vec![0u8; 27];
		content[11] = marker_byte11;
		content[offset..offset + 4].copy_from_slice(&consumption_raw.to_le_bytes());
		content
	}

	#[test]
	fn bit_0x10_picks_offset_12() {
		let content = content_with_marker_at(12, 0x10, 54321);
		assert_eq!(consumption_m3(&content), Some(54.321));
	}

	#[test]
	fn bit_0x01_picks_offset_9() {
		let content = content_with_marker_at(9, 0x01, 1000);
		assert_eq!(consumption_m3(&content), Some(1.0));
	}

	#[test]
	fn bit_0x40_picks_offset_20() {
		let content = content_with_marker_at(20, 0x40, 2000);
		assert_eq!(consumption_m3(&content), Some(2.0));
	}

	#[test]
	fn no_recognised_bit_is_reported_as_an_error() {
		let mut telegram = Telegram::new(vec![]);
		telegram.content = Some(vec![0u8; 27]);
		let outcome = driver().process_content(&mut telegram);
		assert!(matches!(outcome, Some(Err(_))));
	}

	#[test]
	fn extracted_total_matches_decoded_consumption() {
		let mut telegram = Telegram::new(vec![]);
		telegram.content = Some(content_with_marker_at(9, 0x01, 1000));
		driver().process_content(&mut telegram).unwrap().unwrap();
		let result = extract(driver(), &telegram);
		assert!(result.errors.is_empty());
		assert_eq!(result.fields, vec![("total_m3".to_string(), FieldValue::Number(1.0))]);
	}
}
