// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Kamstrup OmniPower: a wM-Bus electricity meter exposing four
//! instantaneous fields, forward and backward flow for both energy and
//! power.
//!
//! Grounded in `driver_omnipower.cc`'s
//! `addMVT(MANUFACTURER_KAM, 0x02, 0x30)` registration and its four
//! `addNumericFieldWithExtractor` declarations (`AnyEnergyVIF`/
//! `AnyPowerVIF`, backward flow marked with `VIFCombinable::BackwardFlow`).

use std::sync::OnceLock;

use crate::driver::field::{FieldInfo, FieldMatcher};
use crate::driver::registry::Triple;
use crate::driver::Driver;
use crate::manufacturer::MANUFACTURER_KAM;
use crate::units::{Quantity, Unit};
use crate::vif_tables::VifRange;

/// The raw VIFE byte `driver_omnipower.cc` uses to tell forward flow
/// (energy/power consumption) from backward flow (production).
const BACKWARD_FLOW: u8 = 0x3C;

pub struct OmniPower {
	triples: Vec<Triple>,
	fields: Vec<FieldInfo>,
}

impl OmniPower {
	pub fn new() -> Self {
		OmniPower {
			triples: vec![Triple::exact(MANUFACTURER_KAM, 0x02, 0x30)],
			fields: vec![
				FieldInfo::new(
					"total_energy_consumption",
					Quantity::Energy,
					Unit::KWh,
					FieldMatcher::vif_range(VifRange::EnergyWh),
				),
				FieldInfo::new(
					"total_energy_production",
					Quantity::Energy,
					Unit::KWh,
					FieldMatcher::vif_range(VifRange::EnergyWh).with_combinable(BACKWARD_FLOW),
				),
				FieldInfo::new(
					"current_power_consumption",
					Quantity::Power,
					Unit::KW,
					FieldMatcher::vif_range(VifRange::Power),
				),
				FieldInfo::new(
					"current_power_production",
					Quantity::Power,
					Unit::KW,
					FieldMatcher::vif_range(VifRange::Power).with_combinable(BACKWARD_FLOW),
				),
			],
		}
	}
}

impl Default for OmniPower {
	fn default() -> Self {
		Self::new()
	}
}

impl Driver for OmniPower {
	fn name(&self) -> &'static str {
		"omnipower"
	}

	fn triples(&self) -> &[Triple] {
		&self.triples
	}

	fn fields(&self) -> &[FieldInfo] {
		&self.fields
	}
}

static INSTANCE: OnceLock<OmniPower> = OnceLock::new();

pub fn driver() -> &'static OmniPower {
	INSTANCE.get_or_init(OmniPower::new)
}

#[cfg(test)]
mod tests {
	use winnow::Bytes;

	use super::*;
	use crate::driver::extractor::extract;
	use crate::dvparser::frame::Frame;
	use crate::output::FieldValue;
	use crate::telegram::Telegram;

	fn telegram_from_content_hex(hex: &str) -> Telegram {
		let bytes: Vec<u8> = (0..hex.len())
			.step_by(2)
			.map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
			.collect();
		let mut input: &Bytes = Bytes::new(&bytes);
		let frame = Frame::parse(&mut input).unwrap();
		let mut telegram = Telegram::new(bytes);
		for entry in frame.entries {
			telegram.entries.insert(entry.key.clone(), entry);
		}
		telegram
	}

	/// `driver_omnipower.cc`'s embedded test vector:
	/// `telegram=|2D442D2C5768663230028D20E4E2C81C20878C78_04041A03000004843C00000000042B0300000004AB3C00000000|`
	#[test]
	fn decodes_the_embedded_test_vector() {
		let telegram = telegram_from_content_hex("04041A03000004843C00000000042B0300000004AB3C00000000");
		let result = extract(driver(), &telegram);
		assert!(result.errors.is_empty(), "{:?}", result.errors);

		let get = |name: &str| result.fields.iter().find(|(n, _)| n == name).unwrap().1.clone();
		assert_eq!(get("total_energy_consumption_kwh"), FieldValue::Number(7.94));
		assert_eq!(get("total_energy_production_kwh"), FieldValue::Number(0.0));
		assert_eq!(get("current_power_consumption_kw"), FieldValue::Number(0.003));
		assert_eq!(get("current_power_production_kw"), FieldValue::Number(0.0));
	}

	#[test]
	fn claims_the_kamstrup_omnipower_triple() {
		assert_eq!(driver().triples(), &[Triple::exact(MANUFACTURER_KAM, 0x02, 0x30)]);
	}
}
