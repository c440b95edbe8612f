// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! [`FieldInfo`]/[`FieldMatcher`]: a driver's static declaration of one
//! output field and the predicate over [`DvEntry`] values that supplies
//! it.
//!
//! Grounded in `driver_omnipower.cc`'s `addNumericFieldWithExtractor` /
//! `FieldMatcher::build()` fluent API, translated into an idiomatic Rust
//! builder over borrowed data.

use crate::dvparser::{DvEntry, MeasurementType};
use crate::lookup::Lookup;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

/// Output-record visibility/role flags for one field (`PrintProperties`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintProperties {
	pub field: bool,
	pub json: bool,
	pub important: bool,
	pub status: bool,
	pub hidden: bool,
	pub optional: bool,
	pub deprecated: bool,
	pub include_tpl_status: bool,
	pub join_tpl_status: bool,
}

impl PrintProperties {
	pub const fn default_visible() -> Self {
		PrintProperties {
			field: true,
			json: true,
			important: false,
			status: false,
			hidden: false,
			optional: false,
			deprecated: false,
			include_tpl_status: false,
			join_tpl_status: false,
		}
	}
}

/// Which DV entries satisfy a [`FieldInfo`].
#[derive(Debug, Clone)]
pub enum FieldMatcher {
	/// Exact `DifVifKey` string, as built by [`DvEntry::key_for`]-style hex.
	Key(String),
	/// Conjunction of the optional constraints; `None` means "don't care".
	Conjunction {
		measurement: Option<MeasurementType>,
		vif_range: Option<VifRange>,
		storage_range: Option<(u64, u64)>,
		tariff: Option<u32>,
		subunit: Option<u16>,
		/// A raw (7-bit, extension-stripped) VIFE byte that must be present
		/// among the entry's combinable VIFEs, e.g. the backward-flow
		/// marker.
		combinable: Option<u8>,
	},
}

impl FieldMatcher {
	pub fn key(k: impl Into<String>) -> Self {
		FieldMatcher::Key(k.into())
	}

	pub fn vif_range(range: VifRange) -> Self {
		FieldMatcher::Conjunction {
			measurement: None,
			vif_range: Some(range),
			storage_range: None,
			tariff: None,
			subunit: None,
			combinable: None,
		}
	}

	pub fn with_measurement(mut self, m: MeasurementType) -> Self {
		if let FieldMatcher::Conjunction { measurement, .. } = &mut self {
			*measurement = Some(m);
		}
		self
	}

	pub fn with_storage_range(mut self, lo: u64, hi: u64) -> Self {
		if let FieldMatcher::Conjunction { storage_range, .. } = &mut self {
			*storage_range = Some((lo, hi));
		}
		self
	}

	pub fn with_tariff(mut self, tariff: u32) -> Self {
		if let FieldMatcher::Conjunction { tariff: t, .. } = &mut self {
			*t = Some(tariff);
		}
		self
	}

	pub fn with_subunit(mut self, subunit: u16) -> Self {
		if let FieldMatcher::Conjunction { subunit: s, .. } = &mut self {
			*s = Some(subunit);
		}
		self
	}

	pub fn with_combinable(mut self, vife: u8) -> Self {
		if let FieldMatcher::Conjunction { combinable, .. } = &mut self {
			*combinable = Some(vife);
		}
		self
	}

	/// Returns every entry this matcher accepts, in DV-entry order. For a
	/// `Key` matcher that's at most one entry; for a conjunction it may be
	/// several (used by `{storage_counter}` field-name expansion).
	pub fn matches<'a>(&self, entries: impl IntoIterator<Item = &'a DvEntry>) -> Vec<&'a DvEntry> {
		match self {
			FieldMatcher::Key(key) => entries.into_iter().filter(|e| &e.key == key).collect(),
			FieldMatcher::Conjunction {
				measurement,
				vif_range,
				storage_range,
				tariff,
				subunit,
				combinable,
			} => entries
				.into_iter()
				.filter(|e| measurement.map_or(true, |m| e.measurement == m))
				.filter(|e| vif_range.map_or(true, |r| e.vif_range == r))
				.filter(|e| storage_range.map_or(true, |(lo, hi)| e.storage_nr >= lo && e.storage_nr <= hi))
				.filter(|e| tariff.map_or(true, |t| e.tariff_nr == t))
				.filter(|e| subunit.map_or(true, |s| e.subunit_nr == s))
				.filter(|e| combinable.map_or(true, |c| e.combinable.contains(&c)))
				.collect(),
		}
	}
}

/// A driver's static declaration of one output field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
	/// May contain a `{storage_counter}` placeholder for per-storage
	/// expansion.
	pub name: &'static str,
	pub quantity: Quantity,
	pub default_unit: Unit,
	pub print: PrintProperties,
	pub matcher: FieldMatcher,
	pub lookup: Option<Lookup>,
	/// A formula source string evaluated after raw fields, if this is a
	/// calculated field rather than one extracted directly from a
	/// [`DvEntry`].
	pub calculator: Option<&'static str>,
}

impl FieldInfo {
	pub fn new(name: &'static str, quantity: Quantity, default_unit: Unit, matcher: FieldMatcher) -> Self {
		FieldInfo {
			name,
			quantity,
			default_unit,
			print: PrintProperties::default_visible(),
			matcher,
			lookup: None,
			calculator: None,
		}
	}

	/// A plain string field (`addStringField` in the original source), e.g.
	/// a formatted date. Carries no unit suffix.
	pub fn text(name: &'static str, matcher: FieldMatcher) -> Self {
		FieldInfo::new(name, Quantity::Text, Unit::None, matcher)
	}

	pub fn with_lookup(mut self, lookup: Lookup) -> Self {
		self.lookup = Some(lookup);
		self
	}

	pub fn calculated(name: &'static str, quantity: Quantity, default_unit: Unit, formula: &'static str) -> Self {
		FieldInfo {
			name,
			quantity,
			default_unit,
			print: PrintProperties::default_visible(),
			matcher: FieldMatcher::Conjunction {
				measurement: None,
				vif_range: None,
				storage_range: None,
				tariff: None,
				subunit: None,
				combinable: None,
			},
			lookup: None,
			calculator: Some(formula),
		}
	}

	/// The field's output-record name, with its unit suffix appended
	/// (e.g. `total_energy_consumption_kwh`).
	pub fn output_name(&self, storage_counter: Option<u64>) -> String {
		let base = if let Some(n) = storage_counter {
			self.name.replace("{storage_counter}", &n.to_string())
		} else {
			self.name.to_string()
		};
		let suffix = self.default_unit.field_suffix();
		if suffix.is_empty() {
			base
		} else {
			format!("{base}_{suffix}")
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dvparser::dib::{DataFunction, DataInfoBlock, RawDataType};
	use crate::types::DataType;

	fn entry(vif_range: VifRange, storage_nr: u64) -> DvEntry {
		DvEntry {
			offset: 0,
			key: "0413".into(),
			measurement: MeasurementType::Instantaneous,
			vif_range,
			storage_nr,
			tariff_nr: 0,
			subunit_nr: 0,
			is_obis: false,
			combinable: Vec::new(),
			value: DataType::Unsigned(1000),
			numeric: Some((1.0, crate::units::Unit::M3)),
		}
	}

	#[test]
	fn key_matcher_finds_exact_entry() {
		let entries = vec![entry(VifRange::Volume, 0)];
		let matcher = FieldMatcher::key("0413");
		assert_eq!(matcher.matches(&entries).len(), 1);
	}

	#[test]
	fn conjunction_filters_by_storage_range() {
		let entries = vec![entry(VifRange::Volume, 0), entry(VifRange::Volume, 5)];
		let matcher = FieldMatcher::vif_range(VifRange::Volume).with_storage_range(1, 10);
		assert_eq!(matcher.matches(&entries).len(), 1);
	}

	#[test]
	fn output_name_expands_storage_placeholder_and_unit_suffix() {
		let field = FieldInfo::new(
			"storage_{storage_counter}_consumption",
			Quantity::Volume,
			Unit::M3,
			FieldMatcher::vif_range(VifRange::Volume),
		);
		assert_eq!(field.output_name(Some(3)), "storage_3_consumption_m3");
	}
}
