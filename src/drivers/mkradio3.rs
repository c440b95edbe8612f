// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Techem MK Radio 3: a water meter whose CI field (`0xA2`) marks the
//! entire payload as manufacturer-specific, so there is no DIF/VIF stream
//! to walk — `process_content` decodes it directly.
//!
//! Grounded in `driver_mkradio3.cc`'s `processContent`:
//! two packed BCD-ish dates and two one-decimal consumption readings.

use std::sync::OnceLock;

use chrono::{Datelike, Utc};

use crate::driver::field::{FieldInfo, FieldMatcher};
use crate::driver::registry::Triple;
use crate::driver::Driver;
use crate::dvparser::{DvEntry, MeasurementType};
use crate::error::WmbusError;
use crate::manufacturer::MANUFACTURER_TCH;
use crate::telegram::Telegram;
use crate::types::DataType;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

struct Decoded {
	prev_date: String,
	prev_m3: f64,
	current_date: String,
	current_m3: f64,
}

/// `content` is the application-layer payload, indexed the same way the
/// original indexes its `vector<uchar> content` (byte 0 is the
/// manufacturer-specific sub-type marker, unread here).
fn decode(content: &[u8], current_year: i32) -> Option<Decoded> {
	if content.len() < 9 {
		return None;
	}
	let prev_date = ((content[2] as u16) << 8) | content[1] as u16;
	let prev_day = prev_date & 0x1F;
	let prev_month = (prev_date >> 5) & 0x0F;
	let prev_year = (prev_date >> 9) & 0x3F;
	let prev_m3 = (256.0 * content[4] as f64 + content[3] as f64) / 10.0;

	let current_date = ((content[6] as u16) << 8) | content[5] as u16;
	let current_day = (current_date >> 4) & 0x1F;
	let current_month = (current_date >> 9) & 0x0F;
	let current_m3 = (256.0 * content[8] as f64 + content[7] as f64) / 10.0;

	Some(Decoded {
		prev_date: format!("{:04}-{:02}-{:02}T02:00:00Z", prev_year as i32 + 2000, prev_month, prev_day),
		prev_m3,
		current_date: format!("{:04}-{:02}-{:02}T02:00:00Z", current_year, current_month, current_day),
		current_m3,
	})
}

fn text_entry(key: &str, text: String) -> DvEntry {
	DvEntry {
		offset: 0,
		key: key.to_string(),
		measurement: MeasurementType::Instantaneous,
		vif_range: VifRange::DateTime,
		storage_nr: 0,
		tariff_nr: 0,
		subunit_nr: 0,
		is_obis: false,
		combinable: Vec::new(),
		value: DataType::String(text),
		numeric: None,
	}
}

fn numeric_entry(key: &str, value: f64) -> DvEntry {
	DvEntry {
		offset: 0,
		key: key.to_string(),
		measurement: MeasurementType::Instantaneous,
		vif_range: VifRange::Volume,
		storage_nr: 0,
		tariff_nr: 0,
		subunit_nr: 0,
		is_obis: false,
		combinable: Vec::new(),
		value: DataType::None,
		numeric: Some((value, Unit::M3)),
	}
}

pub struct MkRadio3 {
	triples: Vec<Triple>,
	fields: Vec<FieldInfo>,
}

impl MkRadio3 {
	pub fn new() -> Self {
		MkRadio3 {
			triples: vec![Triple::exact(MANUFACTURER_TCH, 0x62, 0x74), Triple::exact(MANUFACTURER_TCH, 0x72, 0x74)],
			fields: vec![
				FieldInfo::new("total", Quantity::Volume, Unit::M3, FieldMatcher::key("total")),
				FieldInfo::new("target", Quantity::Volume, Unit::M3, FieldMatcher::key("target")),
				FieldInfo::text("current_date", FieldMatcher::key("current_date")),
				FieldInfo::text("prev_date", FieldMatcher::key("prev_date")),
			],
		}
	}
}

impl Default for MkRadio3 {
	fn default() -> Self {
		Self::new()
	}
}

impl Driver for MkRadio3 {
	fn name(&self) -> &'static str {
		"mkradio3"
	}

	fn triples(&self) -> &[Triple] {
		&self.triples
	}

	fn fields(&self) -> &[FieldInfo] {
		&self.fields
	}

	fn process_content(&self, telegram: &mut Telegram) -> Option<Result<(), WmbusError>> {
		let decoded = decode(&telegram.payload, Utc::now().year())?;
		telegram.entries.insert("total".into(), numeric_entry("total", decoded.prev_m3 + decoded.current_m3));
		telegram.entries.insert("target".into(), numeric_entry("target", decoded.prev_m3));
		telegram.entries.insert("current_date".into(), text_entry("current_date", decoded.current_date));
		telegram.entries.insert("prev_date".into(), text_entry("prev_date", decoded.prev_date));
		Some(Ok(()))
	}
}

static INSTANCE: OnceLock<MkRadio3> = OnceLock::new();

pub fn driver() -> &'static MkRadio3 {
	INSTANCE.get_or_init(MkRadio3::new)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::extractor::extract;
	use crate::output::FieldValue;

	/// `driver_mkradio3.cc`'s embedded test vector;
	/// application-layer content starting right after the CI byte:
	/// `069F255900B029310000000306060906030609070606050509050505050407040605070500`
	#[test]
	fn decodes_the_embedded_test_vector() {
		let hex = "069F255900B029310000000306060906030609070606050509050505050407040605070500";
		let content: Vec<u8> = (0..hex.len()).step_by(2).map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap()).collect();
		let decoded = decode(&content, 2025).unwrap();
		assert_eq!(decoded.prev_m3, 8.9);
		assert_eq!(decoded.current_m3, 4.9);
		assert_eq!(decoded.prev_date, "2018-12-31T02:00:00Z");
		assert_eq!(decoded.current_date, "2025-04-27T02:00:00Z");
	}

	#[test]
	fn process_content_populates_total_and_target() {
		let hex = "069F255900B029310000000306060906030609070606050509050505050407040605070500";
		let payload: Vec<u8> = (0..hex.len()).step_by(2).map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap()).collect();
		let mut telegram = Telegram::new(vec![]);
		telegram.payload = payload;
		driver().process_content(&mut telegram).unwrap().unwrap();

		let result = extract(driver(), &telegram);
		assert!(result.errors.is_empty(), "{:?}", result.errors);
		let get = |name: &str| result.fields.iter().find(|(n, _)| n == name).unwrap().1.clone();
		assert_eq!(get("total_m3"), FieldValue::Number(13.8));
		assert_eq!(get("target_m3"), FieldValue::Number(8.9));
		assert_eq!(get("current_date"), FieldValue::Text("2025-04-27T02:00:00Z".to_string()));
	}
}
