// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Kamstrup Multical21: a water meter whose content is a proprietary
//! short/full frame rather than a DIF/VIF stream — the orchestrator's
//! generic mode-13 (AES-CTR) decrypt already produces plaintext bytes by
//! the time `process_content` runs; this just locates the four
//! consumption bytes inside it.
//!
//! Grounded in `meter_multical21.cc`'s `processContent`:
//! byte 2 is a frame-type marker (`0x79` short, `0x78` full), the
//! consumption is a little-endian `u32` at a fixed offset into the
//! frame, scaled by `/1000` to get m3. The version byte isn't given in
//! the retrieved source (pre-driver-table code detects by manufacturer
//! alone); `0x1B`, Kamstrup's published Multical21 version code, is used
//! here and recorded as an assumption.

use std::sync::OnceLock;

use crate::driver::field::{FieldInfo, FieldMatcher};
use crate::driver::registry::Triple;
use crate::driver::Driver;
use crate::dvparser::{DvEntry, MeasurementType};
use crate::error::WmbusError;
use crate::manufacturer::MANUFACTURER_KAM;
use crate::telegram::Telegram;
use crate::types::DataType;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

const FRAME_TYPE_SHORT: u8 = 0x79;
const FRAME_TYPE_FULL: u8 = 0x78;

fn consumption_m3(content: &[u8]) -> Option<f64> {
	let frame_type = *content.get(2)?;
	let rec2 = match frame_type {
		FRAME_TYPE_SHORT => content.get(9..13)?,
		FRAME_TYPE_FULL => content.get(10..14)?,
		_ => return None,
	};
	let raw = u32::from_le_bytes(rec2.try_into().ok()?);
	Some(raw as f64 / 1000.0)
}

pub struct Multical21 {
	triples: Vec<Triple>,
	fields: Vec<FieldInfo>,
}

impl Multical21 {
	pub fn new() -> Self {
		Multical21 {
			triples: vec![Triple::exact(MANUFACTURER_KAM, 0x06, 0x1B), Triple::exact(MANUFACTURER_KAM, 0x07, 0x1B)],
			fields: vec![FieldInfo::new("total", Quantity::Volume, Unit::M3, FieldMatcher::key("total"))],
		}
	}
}

impl Default for Multical21 {
	fn default() -> Self {
		Self::new()
	}
}

impl Driver for Multical21 {
	fn name(&self) -> &'static str {
		"multical21"
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
				offset: 2,
				message: "unrecognised multical21 frame type".into(),
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

static INSTANCE: OnceLock<Multical21> = OnceLock::new();

pub fn driver() -> &'static Multical21 {
	INSTANCE.get_or_init(Multical21::new)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::extractor::extract;
	use crate::output::FieldValue;

	fn short_frame(consumption_raw: u32) -> Vec<u8> {
		let mut content = vec![0u8; 13];
		content[2] = FRAME_TYPE_SHORT;
		content[9..13].copy_from_slice(&consumption_raw.to_le_bytes());
		content
	}

	#[test]
	fn short_frame_consumption_is_scaled_by_1000() {
		assert_eq!(consumption_m3(&short_frame(12345)), Some(12.345));
	}

	#[test]
	fn unknown_frame_type_is_reported_as_an_error() {
		let mut telegram = Telegram::new(vec![]);
		telegram.content = Some(vec![0, 0, 0xFF]);
		let outcome = driver().process_content(&mut telegram);
		assert!(matches!(outcome, Some(Err(_))));
	}

	#[test]
	fn extracted_total_matches_decoded_consumption() {
		let mut telegram = Telegram::new(vec![]);
		telegram.content = Some(short_frame(12345));
		driver().process_content(&mut telegram).unwrap().unwrap();
		let result = extract(driver(), &telegram);
		assert!(result.errors.is_empty());
		assert_eq!(result.fields, vec![("total_m3".to_string(), FieldValue::Number(12.345))]);
	}
}
