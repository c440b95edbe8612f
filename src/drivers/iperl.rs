// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Sensus iPERL: a single-field cold/warm water meter.
//!
//! Grounded in `meter_iperl.cc`'s `processContent`, which
//! extracts exactly one value via `extractDVdouble(&values, "0413", ...)`
//! and reports it as `total_m3`.

use std::sync::OnceLock;

use crate::driver::field::{FieldInfo, FieldMatcher};
use crate::driver::registry::Triple;
use crate::driver::Driver;
use crate::manufacturer::MANUFACTURER_SEN;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

/// DIF/VIF `0413`: 4-byte binary instantaneous volume, decilitres.
const VERSION: u8 = 0x68;
const MEDIA_COLD_WATER: u8 = 0x07;
const MEDIA_WARM_WATER: u8 = 0x06;

pub struct Iperl {
	triples: Vec<Triple>,
	fields: Vec<FieldInfo>,
}

impl Iperl {
	pub fn new() -> Self {
		Iperl {
			triples: vec![
				Triple::exact(MANUFACTURER_SEN, MEDIA_COLD_WATER, VERSION),
				Triple::exact(MANUFACTURER_SEN, MEDIA_WARM_WATER, VERSION),
			],
			fields: vec![FieldInfo::new(
				"total",
				Quantity::Volume,
				Unit::M3,
				FieldMatcher::vif_range(VifRange::Volume),
			)],
		}
	}
}

impl Default for Iperl {
	fn default() -> Self {
		Self::new()
	}
}

impl Driver for Iperl {
	fn name(&self) -> &'static str {
		"iperl"
	}

	fn triples(&self) -> &[Triple] {
		&self.triples
	}

	fn fields(&self) -> &[FieldInfo] {
		&self.fields
	}
}

static INSTANCE: OnceLock<Iperl> = OnceLock::new();

pub fn driver() -> &'static Iperl {
	INSTANCE.get_or_init(Iperl::new)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::extractor::extract;
	use crate::dvparser::dib::{DataFunction, DataInfoBlock, RawDataType};
	use crate::dvparser::record::Record;
	use crate::dvparser::vib::{ValueInfoBlock, ValueType, VolumeUnit};
	use crate::dvparser::DvEntry;
	use crate::output::FieldValue;
	use crate::telegram::Telegram;
	use crate::types::DataType;

	fn volume_record(decilitres: u64) -> Record {
		Record {
			dib: DataInfoBlock {
				raw_type: RawDataType::Binary(4),
				function: DataFunction::InstantaneousValue,
				storage: 0,
				tariff: 0,
				device: 0,
				is_obis: false,
			},
			vib: ValueInfoBlock {
				value_type: ValueType::Volume(VolumeUnit::M3, -1),
				extra_vifes: None,
			},
			dib_vib_bytes: vec![0x04, 0x13],
			data: DataType::Unsigned(decilitres),
		}
	}

	#[test]
	fn reports_total_consumption_in_cubic_metres() {
		let entries = DvEntry::from_records(vec![volume_record(12345)]);
		let mut telegram = Telegram::new(vec![]);
		for entry in entries {
			telegram.entries.insert(entry.key.clone(), entry);
		}

		let result = extract(driver(), &telegram);
		assert!(result.errors.is_empty(), "{:?}", result.errors);
		assert_eq!(result.fields, vec![("total_m3".to_string(), FieldValue::Number(1234.5))]);
	}

	#[test]
	fn claims_both_cold_and_warm_water_media() {
		assert_eq!(driver().triples().len(), 2);
	}
}
