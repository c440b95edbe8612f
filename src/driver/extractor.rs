// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The field extractor: walks a driver's declared [`FieldInfo`] list
//! against a telegram's [`DvEntry`] map and produces the output record's
//! field rows.
//!
//! Modelled on `driver_omnipower.cc`'s `addNumericFieldWithExtractor`
//! call sites (each one declares a field and the predicate that finds
//! its value), re-expressed as a pure function over borrowed data rather
//! than mutating a shared meter object.

use std::collections::HashMap;

use crate::driver::field::FieldInfo;
use crate::driver::Driver;
use crate::dvparser::DvEntry;
use crate::error::WmbusError;
use crate::formula::{eval, parse_formula};
use crate::output::FieldValue;
use crate::telegram::Telegram;
use crate::transport_layer::ApplicationError;
use crate::units::convert;

#[derive(Debug, Default)]
pub struct ExtractionResult {
	pub fields: Vec<(String, FieldValue)>,
	/// Status tokens accumulated from missing required fields, unit
	/// errors, or formula failures — merged into the output record's
	/// `status` by the orchestrator, alongside the telegram's own status.
	pub errors: Vec<String>,
}

fn raw_bits(entry: &DvEntry) -> Option<u64> {
	match entry.value {
		crate::types::DataType::Unsigned(v) => Some(v),
		crate::types::DataType::Signed(v) => Some(v as u64),
		_ => None,
	}
}

/// Common status tokens plus, if `driver` declares one, its
/// manufacturer-specific translation of the status byte's top three
/// bits (step 5: "the driver's manufacturer-specific status translator,
/// if any, and the common translator").
fn tpl_status_tokens(driver: &dyn Driver, telegram: &Telegram) -> Vec<String> {
	let Some(tpl) = &telegram.tpl_header else {
		return Vec::new();
	};
	let Some(status) = tpl.status() else {
		return Vec::new();
	};
	let mut tokens = Vec::new();
	if status.power_low {
		tokens.push("POWER_LOW".to_string());
	}
	if status.permanent_error {
		tokens.push("PERMANENT_ERROR".to_string());
	}
	if status.temporary_error {
		tokens.push("TEMPORARY_ERROR".to_string());
	}
	match status.application {
		ApplicationError::Busy => tokens.push("BUSY".to_string()),
		ApplicationError::Error => tokens.push("ERROR".to_string()),
		ApplicationError::Alarm => tokens.push("ALARM".to_string()),
		ApplicationError::None => {}
	}
	if let Some(translator) = driver.status_translator() {
		let mfct = translator.translate(status.bits());
		tokens.extend(mfct.split(' ').filter(|s| !s.is_empty()).map(String::from));
	}
	tokens
}

fn dedup_join(tokens: Vec<String>) -> String {
	let mut seen = Vec::new();
	for t in tokens {
		if !t.is_empty() && !seen.contains(&t) {
			seen.push(t);
		}
	}
	if seen.is_empty() {
		"OK".to_string()
	} else {
		seen.join(" ")
	}
}

/// Converts one matched entry into this field's value, honouring a
/// lookup table when the field declares one (step 4) and folding in the
/// TPL status byte when the field asks for it (step 5).
fn field_value(driver: &dyn Driver, info: &FieldInfo, entry: &DvEntry, telegram: &Telegram) -> Result<FieldValue, WmbusError> {
	if let Some(lookup) = &info.lookup {
		let bits = raw_bits(entry).ok_or_else(|| WmbusError::Field(info.name.to_string()))?;
		let mut token = lookup.translate(bits);
		if info.print.include_tpl_status || info.print.join_tpl_status {
			let mut tokens: Vec<String> = token.split(' ').map(String::from).collect();
			tokens.extend(tpl_status_tokens(driver, telegram));
			token = dedup_join(tokens);
		}
		return Ok(FieldValue::Text(token));
	}

	if info.print.include_tpl_status || info.print.join_tpl_status {
		return Ok(FieldValue::Text(dedup_join(tpl_status_tokens(driver, telegram))));
	}

	if let crate::types::DataType::String(s) = &entry.value {
		return Ok(FieldValue::Text(s.clone()));
	}

	let (raw, unit) = entry.numeric.ok_or_else(|| WmbusError::Field(info.name.to_string()))?;
	let value = convert(raw, unit, info.default_unit)?;
	Ok(FieldValue::Number(value))
}

/// Runs every non-calculated field of `driver` against `telegram`,
/// followed by calculated fields (step 6), in declaration order.
pub fn extract(driver: &dyn Driver, telegram: &Telegram) -> ExtractionResult {
	let mut result = ExtractionResult::default();
	let mut ctx: HashMap<String, (f64, crate::units::Unit)> = HashMap::new();

	for info in driver.fields() {
		if info.calculator.is_some() {
			continue;
		}

		let matched = info.matcher.matches(telegram.entries.values());
		let expands_by_storage = info.name.contains("{storage_counter}");

		if matched.is_empty() {
			if !info.print.optional && !(info.print.include_tpl_status || info.print.join_tpl_status) {
				result.errors.push(format!("field \"{}\" not present in telegram", info.output_name(None)));
			} else if info.print.include_tpl_status || info.print.join_tpl_status {
				let name = info.output_name(None);
				match field_value(driver, info, &PLACEHOLDER, telegram) {
					Ok(value) => result.fields.push((name, value)),
					Err(e) => result.errors.push(e.to_string()),
				}
			}
			continue;
		}

		if expands_by_storage {
			for entry in matched {
				let name = info.output_name(Some(entry.storage_nr));
				match field_value(driver, info, entry, telegram) {
					Ok(value) => {
						if let FieldValue::Number(n) = &value {
							ctx.insert(name.clone(), (*n, info.default_unit));
						}
						result.fields.push((name, value));
					}
					Err(e) => result.errors.push(e.to_string()),
				}
			}
		} else {
			let entry = matched[0];
			let name = info.output_name(None);
			match field_value(driver, info, entry, telegram) {
				Ok(value) => {
					if let FieldValue::Number(n) = &value {
						ctx.insert(name.clone(), (*n, info.default_unit));
					}
					result.fields.push((name, value));
				}
				Err(e) => result.errors.push(e.to_string()),
			}
		}
	}

	for info in driver.fields() {
		let Some(formula) = info.calculator else { continue };
		let name = info.output_name(None);
		match parse_formula(formula).and_then(|expr| eval(&expr, &ctx)) {
			Ok((value, unit)) => match convert(value, unit, info.default_unit) {
				Ok(converted) => result.fields.push((name, FieldValue::Number(converted))),
				Err(e) => result.errors.push(e.to_string()),
			},
			Err(e) => result.errors.push(format!("calculated field \"{name}\": {e}")),
		}
	}

	result
}

/// A tpl-status-only field has no matching `DvEntry`; this lets
/// [`field_value`] run uniformly without special-casing the no-entry
/// case inside it. Never dereferenced for its data fields.
const PLACEHOLDER: DvEntry = DvEntry {
	offset: 0,
	key: String::new(),
	measurement: crate::dvparser::MeasurementType::Instantaneous,
	vif_range: crate::vif_tables::VifRange::Unknown,
	storage_nr: 0,
	tariff_nr: 0,
	subunit_nr: 0,
	is_obis: false,
	combinable: Vec::new(),
	value: crate::types::DataType::None,
	numeric: None,
};

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::field::{FieldMatcher, PrintProperties};
	use crate::driver::registry::Triple;
	use crate::dvparser::dib::{DataFunction, RawDataType};
	use crate::lookup::{Lookup, Map, Rule, RuleType};
	use crate::types::DataType;
	use crate::units::{Quantity, Unit};
	use crate::vif_tables::VifRange;

	fn entry(key: &str, vif_range: VifRange, value: DataType, numeric: Option<(f64, Unit)>) -> DvEntry {
		DvEntry {
			offset: 0,
			key: key.to_string(),
			measurement: crate::dvparser::MeasurementType::Instantaneous,
			vif_range,
			storage_nr: 0,
			tariff_nr: 0,
			subunit_nr: 0,
			is_obis: false,
			combinable: Vec::new(),
			value,
			numeric,
		}
	}

	struct TestDriver {
		fields: Vec<FieldInfo>,
	}

	impl Driver for TestDriver {
		fn name(&self) -> &'static str {
			"test"
		}
		fn triples(&self) -> &[Triple] {
			&[]
		}
		fn fields(&self) -> &[FieldInfo] {
			&self.fields
		}
	}

	#[test]
	fn extracts_and_converts_volume_field() {
		let mut telegram = Telegram::new(vec![]);
		telegram
			.entries
			.insert("0413".into(), entry("0413", VifRange::Volume, DataType::Unsigned(12345), Some((12.345, Unit::M3))));

		let driver = TestDriver {
			fields: vec![FieldInfo::new("total", Quantity::Volume, Unit::M3, FieldMatcher::key("0413"))],
		};

		let result = extract(&driver, &telegram);
		assert!(result.errors.is_empty());
		assert_eq!(result.fields, vec![("total_m3".to_string(), FieldValue::Number(12.345))]);
	}

	#[test]
	fn missing_required_field_is_reported_as_an_error() {
		let telegram = Telegram::new(vec![]);
		let driver = TestDriver {
			fields: vec![FieldInfo::new("total", Quantity::Volume, Unit::M3, FieldMatcher::key("missing"))],
		};
		let result = extract(&driver, &telegram);
		assert!(result.fields.is_empty());
		assert_eq!(result.errors.len(), 1);
	}

	#[test]
	fn lookup_field_translates_raw_bits() {
		let mut telegram = Telegram::new(vec![]);
		telegram.entries.insert(
			"02FD17".into(),
			entry("02FD17", VifRange::ErrorFlags, DataType::Unsigned(0x01), None),
		);
		let lookup = Lookup::new().add(
			Rule::new("ERR", RuleType::BitToString, 0xFF)
				.with_default("OK")
				.add(Map::set(0x01, "DRY")),
		);
		let driver = TestDriver {
			fields: vec![FieldInfo::new("error", Quantity::Dimensionless, Unit::None, FieldMatcher::key("02FD17")).with_lookup(lookup)],
		};
		let result = extract(&driver, &telegram);
		assert_eq!(result.fields[0].1, FieldValue::Text("DRY".to_string()));
	}

	#[test]
	fn calculated_field_evaluates_after_raw_fields() {
		let mut telegram = Telegram::new(vec![]);
		telegram
			.entries
			.insert("0413".into(), entry("0413", VifRange::Volume, DataType::Unsigned(1000), Some((1.0, Unit::M3))));

		let driver = TestDriver {
			fields: vec![
				FieldInfo::new("total", Quantity::Volume, Unit::M3, FieldMatcher::key("0413")),
				FieldInfo::calculated("double_total", Quantity::Volume, Unit::M3, "total_m3 * 2"),
			],
		};
		let result = extract(&driver, &telegram);
		let double = result.fields.iter().find(|(n, _)| n == "double_total_m3").unwrap();
		assert_eq!(double.1, FieldValue::Number(2.0));
	}

	#[test]
	fn print_properties_default_has_no_storage_or_tpl_flags() {
		assert!(!PrintProperties::default_visible().include_tpl_status);
	}
}
