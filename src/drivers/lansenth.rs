// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Lansen TH: a temperature/humidity sensor with current and two rolling
//! averages (1h, 24h), each stored under a distinct storage number.
//!
//! Grounded in `driver_lansenth.cc`'s field declarations
//! (`ExternalTemperature`/`RelativeHumidity` VIF ranges, `StorageNr(1)`/
//! `StorageNr(2)` for the averages), its `INCLUDE_TPL_STATUS` status
//! field, and its `setMfctTPLStatusBits` call (mask `0xe0`, bit `0x40` →
//! `SABOTAGE_ENCLOSURE`) for the manufacturer-specific status bits.

use std::sync::OnceLock;

use crate::driver::field::{FieldInfo, FieldMatcher};
use crate::driver::registry::Triple;
use crate::driver::Driver;
use crate::lookup::{Lookup, Map, Rule, RuleType};
use crate::manufacturer::MANUFACTURER_LAS;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

pub struct LansenTh {
	triples: Vec<Triple>,
	fields: Vec<FieldInfo>,
}

impl LansenTh {
	pub fn new() -> Self {
		let mut status = FieldInfo::text("status", FieldMatcher::vif_range(VifRange::Unknown));
		status.print.status = true;
		status.print.include_tpl_status = true;
		status.print.join_tpl_status = true;

		LansenTh {
			triples: vec![Triple::exact(MANUFACTURER_LAS, 0x1b, 0x07)],
			fields: vec![
				status,
				FieldInfo::new(
					"current_temperature",
					Quantity::Temperature,
					Unit::C,
					FieldMatcher::vif_range(VifRange::ExternalTemperature),
				),
				FieldInfo::new(
					"current_relative_humidity",
					Quantity::RelativeHumidity,
					Unit::Rh,
					FieldMatcher::vif_range(VifRange::RelativeHumidity),
				),
				FieldInfo::new(
					"average_temperature_1h",
					Quantity::Temperature,
					Unit::C,
					FieldMatcher::vif_range(VifRange::ExternalTemperature).with_storage_range(1, 1),
				),
				FieldInfo::new(
					"average_relative_humidity_1h",
					Quantity::RelativeHumidity,
					Unit::Rh,
					FieldMatcher::vif_range(VifRange::RelativeHumidity).with_storage_range(1, 1),
				),
				FieldInfo::new(
					"average_temperature_24h",
					Quantity::Temperature,
					Unit::C,
					FieldMatcher::vif_range(VifRange::ExternalTemperature).with_storage_range(2, 2),
				),
				FieldInfo::new(
					"average_relative_humidity_24h",
					Quantity::RelativeHumidity,
					Unit::Rh,
					FieldMatcher::vif_range(VifRange::RelativeHumidity).with_storage_range(2, 2),
				),
			],
		}
	}
}

impl Default for LansenTh {
	fn default() -> Self {
		Self::new()
	}
}

impl Driver for LansenTh {
	fn name(&self) -> &'static str {
		"lansenth"
	}

	fn triples(&self) -> &[Triple] {
		&self.triples
	}

	fn fields(&self) -> &[FieldInfo] {
		&self.fields
	}

	fn status_translator(&self) -> Option<&Lookup> {
		static STATUS_TRANSLATOR: OnceLock<Lookup> = OnceLock::new();
		Some(STATUS_TRANSLATOR.get_or_init(|| {
			// No default message here: the common translator already
			// falls back to "OK" once every rule's tokens are combined,
			// so adding one here would just duplicate it.
			Lookup::new().add(Rule::new("TPL_STS", RuleType::BitToString, 0xe0).add(Map::set(0x40, "SABOTAGE_ENCLOSURE")))
		}))
	}
}

static INSTANCE: OnceLock<LansenTh> = OnceLock::new();

pub fn driver() -> &'static LansenTh {
	INSTANCE.get_or_init(LansenTh::new)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::extractor::extract;
	use crate::dvparser::dib::{DataFunction, DataInfoBlock, RawDataType};
	use crate::dvparser::record::Record;
	use crate::dvparser::vib::ValueInfoBlock;
	use crate::dvparser::DvEntry;
	use crate::output::FieldValue;
	use crate::telegram::Telegram;
	use crate::transport_layer::header::{ApplicationError, MeterStatus, SecurityMode, ShortHeader, TPLHeader};
	use crate::types::DataType;

	fn temperature_record(storage: u64, tenths_c: i64) -> Record {
		Record {
			dib: DataInfoBlock {
				raw_type: RawDataType::Binary(2),
				function: DataFunction::InstantaneousValue,
				storage,
				tariff: 0,
				device: 0,
				is_obis: false,
			},
			vib: ValueInfoBlock {
				value_type: crate::dvparser::vib::ValueType::ExternalTemperature(-1),
				extra_vifes: None,
			},
			dib_vib_bytes: vec![0x02, 0x65, storage as u8],
			data: DataType::Signed(tenths_c),
		}
	}

	fn humidity_record(storage: u64, tenths_percent: u64) -> Record {
		Record {
			dib: DataInfoBlock {
				raw_type: RawDataType::Binary(2),
				function: DataFunction::InstantaneousValue,
				storage,
				tariff: 0,
				device: 0,
				is_obis: false,
			},
			vib: ValueInfoBlock {
				value_type: crate::dvparser::vib::ValueType::RelativeHumidity(-1),
				extra_vifes: None,
			},
			dib_vib_bytes: vec![0x02, 0xFD, 0x11, storage as u8],
			data: DataType::Unsigned(tenths_percent),
		}
	}

	fn telegram_with_status(permanent_error: bool) -> Telegram {
		telegram_with_full_status(permanent_error, false)
	}

	fn telegram_with_full_status(permanent_error: bool, sabotage: bool) -> Telegram {
		let records = vec![
			temperature_record(0, 218),
			humidity_record(0, 430),
			temperature_record(1, 217),
			humidity_record(1, 430),
			temperature_record(2, 219),
			humidity_record(2, 425),
		];
		let mut telegram = Telegram::new(vec![]);
		for entry in DvEntry::from_records(records) {
			telegram.entries.insert(entry.key.clone(), entry);
		}
		telegram.tpl_header = Some(TPLHeader::Short(ShortHeader {
			access_number: 0,
			status: MeterStatus {
				manufacturer_2: false,
				manufacturer_1: sabotage,
				manufacturer_0: false,
				temporary_error: false,
				permanent_error,
				power_low: false,
				application: ApplicationError::None,
			},
			configuration_field: SecurityMode::None,
			extra_header: None,
		}));
		telegram
	}

	#[test]
	fn reports_current_and_rolling_averages() {
		let telegram = telegram_with_status(true);
		let result = extract(driver(), &telegram);
		assert!(result.errors.is_empty(), "{:?}", result.errors);

		let get = |name: &str| result.fields.iter().find(|(n, _)| n == name).unwrap().1.clone();
		assert_eq!(get("current_temperature_c"), FieldValue::Number(21.8));
		assert_eq!(get("current_relative_humidity_rh"), FieldValue::Number(43.0));
		assert_eq!(get("average_temperature_1h_c"), FieldValue::Number(21.7));
		assert_eq!(get("average_temperature_24h_c"), FieldValue::Number(21.9));
		assert_eq!(get("status"), FieldValue::Text("PERMANENT_ERROR".to_string()));
	}

	#[test]
	fn status_is_ok_with_no_flags_set() {
		let telegram = telegram_with_status(false);
		let result = extract(driver(), &telegram);
		let status = result.fields.iter().find(|(n, _)| n == "status").unwrap();
		assert_eq!(status.1, FieldValue::Text("OK".to_string()));
	}

	#[test]
	fn sabotage_bit_is_translated_alongside_the_common_status() {
		let telegram = telegram_with_full_status(true, true);
		let result = extract(driver(), &telegram);
		let status = result.fields.iter().find(|(n, _)| n == "status").unwrap();
		assert_eq!(status.1, FieldValue::Text("PERMANENT_ERROR SABOTAGE_ENCLOSURE".to_string()));
	}
}
