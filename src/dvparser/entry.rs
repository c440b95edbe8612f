// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! [`DvEntry`]: the flattened, matcher-friendly view of a parsed
//! [`super::record::Record`] the field extractor actually walks.
//!
//! `application_layer/frame.rs`/`record.rs` produce `Record`s but stop
//! short of the key-string/dedup step a driver needs; that step is added
//! here, modelled on `dvparser.cc`'s `DifVifKey` string building and
//! duplicate-counter handling.

use std::collections::HashMap;

use crate::dvparser::dib::{DataFunction, DataInfoBlock, RawDataType};
use crate::dvparser::record::Record;
use crate::dvparser::vib::ValueInfoBlock;
use crate::types::DataType;
use crate::units::Unit;
use crate::vif_tables::{wire_value, VifRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementType {
	Instantaneous,
	Maximum,
	Minimum,
	AtError,
}

impl From<DataFunction> for MeasurementType {
	fn from(f: DataFunction) -> Self {
		match f {
			DataFunction::InstantaneousValue => MeasurementType::Instantaneous,
			DataFunction::MaximumValue => MeasurementType::Maximum,
			DataFunction::MinimumValue => MeasurementType::Minimum,
			DataFunction::ValueDuringErrorState => MeasurementType::AtError,
		}
	}
}

#[derive(Debug)]
pub struct DvEntry {
	/// Index of this entry within the telegram's data-record sequence.
	pub offset: usize,
	/// DIF+DIFEs+VIF+VIFEs rendered as an upper-case hex string, with a
	/// `_N` suffix appended for the second and subsequent occurrence of an
	/// identical key within one telegram.
	pub key: String,
	pub measurement: MeasurementType,
	pub vif_range: VifRange,
	pub storage_nr: u64,
	pub tariff_nr: u32,
	pub subunit_nr: u16,
	pub is_obis: bool,
	pub combinable: Vec<u8>,
	pub value: DataType,
	/// The value scaled into one of this crate's [`Unit`]s, wherever the
	/// VIF describes a numeric wire unit (`None` for dates, identifiers,
	/// plain text, ...).
	pub numeric: Option<(f64, Unit)>,
}

impl DvEntry {
	/// DIF + DIFEs + VIF + VIFEs, rendered as the upper-case hex string
	/// they appeared as on the wire, exactly the bytes a literal
	/// `FieldMatcher::key("...")` is written against.
	fn key_for(bytes: &[u8]) -> String {
		let mut key = String::with_capacity(bytes.len() * 2);
		for b in bytes {
			key.push_str(&format!("{b:02X}"));
		}
		key
	}

	pub fn from_records(records: Vec<Record>) -> Vec<DvEntry> {
		let mut seen: HashMap<String, u32> = HashMap::new();
		let mut out = Vec::with_capacity(records.len());
		for (offset, record) in records.into_iter().enumerate() {
			let base_key = Self::key_for(&record.dib_vib_bytes);
			let count = seen.entry(base_key.clone()).or_insert(0);
			*count += 1;
			let key = if *count > 1 {
				format!("{base_key}_{count}")
			} else {
				base_key
			};

			let numeric = record.data.as_f64().and_then(|raw| wire_value(&record.vib.value_type, raw));

			out.push(DvEntry {
				offset,
				key,
				measurement: record.dib.function.into(),
				vif_range: VifRange::from(&record.vib.value_type),
				storage_nr: record.dib.storage,
				tariff_nr: record.dib.tariff,
				subunit_nr: record.dib.device,
				is_obis: record.dib.is_obis,
				combinable: record.vib.extra_vifes.unwrap_or_default(),
				value: record.data,
				numeric,
			});
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn duplicate_keys_get_n_suffix() {
		let dib = DataInfoBlock {
			raw_type: RawDataType::Binary(2),
			function: DataFunction::InstantaneousValue,
			storage: 0,
			tariff: 0,
			device: 0,
			is_obis: false,
		};
		let vib1 = ValueInfoBlock {
			value_type: crate::dvparser::vib::ValueType::Dimensionless,
			extra_vifes: None,
		};
		let vib2 = ValueInfoBlock {
			value_type: crate::dvparser::vib::ValueType::Dimensionless,
			extra_vifes: None,
		};
		let records = vec![
			Record {
				dib,
				vib: vib1,
				dib_vib_bytes: vec![0x02, 0x13],
				data: DataType::Unsigned(1),
			},
			Record {
				dib: DataInfoBlock {
					raw_type: RawDataType::Binary(2),
					function: DataFunction::InstantaneousValue,
					storage: 0,
					tariff: 0,
					device: 0,
					is_obis: false,
				},
				vib: vib2,
				dib_vib_bytes: vec![0x02, 0x13],
				data: DataType::Unsigned(2),
			},
		];
		let entries = DvEntry::from_records(records);
		assert_eq!(entries.len(), 2);
		assert!(!entries[0].key.contains('_'));
		assert!(entries[1].key.ends_with("_2"));
	}
}
