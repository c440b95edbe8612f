// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! VIF ranges: the semantic categories field matchers key off, collapsing
//! the ~150 concrete [`crate::dvparser::vib::ValueType`] variants (one per
//! VIF code point) down to the handful of families a driver's
//! `FieldMatcher` actually needs to distinguish.
//!
//! Grounded in `application_layer/vib.rs`'s `ValueType` enum (enumerates
//! the ranges) and `dvparser.cc`'s `toVifRange`-style dispatch (the table
//! grouping itself).

use crate::dvparser::vib::{DurationType, EnergyUnit, MassUnit, PowerUnit, ValueType, VolumeUnit};
use crate::units::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VifRange {
	Volume,
	EnergyWh,
	EnergyJ,
	Mass,
	Power,
	VolumeFlow,
	MassFlow,
	FlowTemperature,
	ReturnTemperature,
	ExternalTemperature,
	TemperatureDifference,
	Pressure,
	DateTime,
	Date,
	HeatCostAllocation,
	Voltage,
	Amperage,
	Dimensionless,
	FabricationNumber,
	EnhancedIdentification,
	Manufacturer,
	ModelVersion,
	ParameterSet,
	Customer,
	CustomerLocation,
	ErrorFlags,
	DigitalInput,
	DigitalOutput,
	AccessNumber,
	RelativeHumidity,
	Any,
	PlainText,
	ManufacturerSpecific,
	Unknown,
}

impl From<&ValueType> for VifRange {
	fn from(vt: &ValueType) -> Self {
		use ValueType::*;
		match vt {
			Volume(..) => VifRange::Volume,
			Energy(crate::dvparser::vib::EnergyUnit::Wh | crate::dvparser::vib::EnergyUnit::MWh, _) => {
				VifRange::EnergyWh
			}
			Energy(..) => VifRange::EnergyJ,
			Mass(..) => VifRange::Mass,
			Power(..) => VifRange::Power,
			VolumeFlow(..) => VifRange::VolumeFlow,
			MassFlow(..) => VifRange::MassFlow,
			FlowTemperature(_) => VifRange::FlowTemperature,
			ReturnTemperature(_) => VifRange::ReturnTemperature,
			ExternalTemperature(_) => VifRange::ExternalTemperature,
			TemperatureDifference(_) => VifRange::TemperatureDifference,
			Pressure(_) => VifRange::Pressure,
			TypeGDate => VifRange::Date,
			VariableDateTime | TypeFDateTimeMarker | TypeIDateTimeMarker | TypeJTimeMarker => VifRange::DateTime,
			HCA => VifRange::HeatCostAllocation,
			Volts(_) => VifRange::Voltage,
			Amperes(_) => VifRange::Amperage,
			Dimensionless => VifRange::Dimensionless,
			FabricationNumber => VifRange::FabricationNumber,
			EnhancedIdentification => VifRange::EnhancedIdentification,
			Manufacturer => VifRange::Manufacturer,
			ModelVersion => VifRange::ModelVersion,
			ParameterSetIdentification => VifRange::ParameterSet,
			Customer => VifRange::Customer,
			CustomerLocation => VifRange::CustomerLocation,
			ErrorFlags => VifRange::ErrorFlags,
			DigitalInput => VifRange::DigitalInput,
			DigitalOutput => VifRange::DigitalOutput,
			UniqueMessageIdentification => VifRange::AccessNumber,
			RelativeHumidity(_) => VifRange::RelativeHumidity,
			Any => VifRange::Any,
			PlainText(_) => VifRange::PlainText,
			ManufacturerSpecific | ManufacturerSpecificContainer => VifRange::ManufacturerSpecific,
			_ => VifRange::Unknown,
		}
	}
}

/// A matcher may require specific VIFE-combinable modifiers (e.g. "back
/// flow", "at-error") to be present alongside the base VIF range. Only the
/// handful the supplied drivers need are modelled; anything else is
/// treated as a don't-care by [`crate::driver::field::FieldMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VifCombinable {
	None,
	BackFlow,
	AtHistoricValue,
}

/// Scale a raw wire value (already widened to `f64`, exponent still
/// applied per the VIF's own `exp()` offset) into one of this crate's
/// [`Unit`]s. Returns `None` for VIF types with no numeric wire unit
/// (dates, identifiers, plain text, ...).
///
/// Picks a single fixed target unit per wire VIF rather than a
/// runtime-selectable one, since [`crate::units::convert`] handles any
/// further conversion the driver's field declares.
pub fn wire_value(vt: &ValueType, raw: f64) -> Option<(f64, Unit)> {
	use ValueType::*;
	Some(match vt {
		Energy(EnergyUnit::Wh, e) => (raw * 10f64.powi(*e as i32 - 3), Unit::KWh),
		Energy(EnergyUnit::J, e) => (raw * 10f64.powi(*e as i32 - 6), Unit::MJ),
		Energy(EnergyUnit::MWh, e) => (raw * 10f64.powi(*e as i32 + 3), Unit::KWh),
		Energy(EnergyUnit::GJ, e) => (raw * 10f64.powi(*e as i32), Unit::GJ),
		Energy(EnergyUnit::MCal, e) => (raw * 10f64.powi(*e as i32) * 0.004184, Unit::GJ),
		Volume(VolumeUnit::M3, e) => (raw * 10f64.powi(*e as i32), Unit::M3),
		Volume(VolumeUnit::Feet3, e) => (raw * 10f64.powi(*e as i32) * 0.028_316_8, Unit::M3),
		Mass(MassUnit::Kg, e) => (raw * 10f64.powi(*e as i32), Unit::Kg),
		Mass(MassUnit::T, e) => (raw * 10f64.powi(*e as i32), Unit::Tonne),
		Power(PowerUnit::W, e) => (raw * 10f64.powi(*e as i32 - 3), Unit::KW),
		Power(PowerUnit::MW, e) => (raw * 10f64.powi(*e as i32 + 3), Unit::KW),
		VolumeFlow(DurationType::Hours, e) => (raw * 10f64.powi(*e as i32), Unit::M3h),
		VolumeFlow(DurationType::Minutes, e) => (raw * 10f64.powi(*e as i32) * 60.0, Unit::M3h),
		VolumeFlow(DurationType::Seconds, e) => (raw * 10f64.powi(*e as i32) * 3600.0, Unit::M3h),
		MassFlow(DurationType::Hours, e) => (raw * 10f64.powi(*e as i32), Unit::KgH),
		FlowTemperature(e) | ReturnTemperature(e) | ExternalTemperature(e) => (raw * 10f64.powi(*e as i32), Unit::C),
		TemperatureDifference(e) | ColdWarmTemperatureLimit(e) => (raw * 10f64.powi(*e as i32), Unit::DeltaC),
		RelativeHumidity(e) => (raw * 10f64.powi(*e as i32), Unit::Rh),
		Volts(e) => (raw * 10f64.powi(*e as i32), Unit::Volt),
		Amperes(e) => (raw * 10f64.powi(*e as i32), Unit::Ampere),
		HCA => (raw, Unit::Hca),
		OnTime(d) | OperatingTime(d) => (raw, duration_unit(*d)),
		Dimensionless => (raw, Unit::None),
		_ => return None,
	})
}

fn duration_unit(d: DurationType) -> Unit {
	match d {
		DurationType::Seconds => Unit::Second,
		DurationType::Minutes => Unit::Minute,
		DurationType::Hours => Unit::Hour,
		DurationType::Days => Unit::Day,
		DurationType::Months | DurationType::Years => Unit::Year,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dvparser::vib::{EnergyUnit, VolumeUnit};

	#[test]
	fn volume_maps_to_volume_range() {
		let vt = ValueType::Volume(VolumeUnit::M3, -6);
		assert_eq!(VifRange::from(&vt), VifRange::Volume);
	}

	#[test]
	fn energy_wh_and_joule_are_distinct_ranges() {
		assert_eq!(VifRange::from(&ValueType::Energy(EnergyUnit::Wh, -3)), VifRange::EnergyWh);
		assert_eq!(VifRange::from(&ValueType::Energy(EnergyUnit::J, 0)), VifRange::EnergyJ);
	}

	#[test]
	fn wire_value_scales_wh_to_kwh() {
		// exp(-3) is what `exp(MASK_NNN, value, -3)` yields for a VIF nnn=0,
		// i.e. the raw count is already in Wh.
		let (value, unit) = wire_value(&ValueType::Energy(EnergyUnit::Wh, -3), 7940.0).unwrap();
		assert_eq!(unit, Unit::KWh);
		assert!((value - 7.94).abs() < 1e-9);
	}

	#[test]
	fn wire_value_scales_volume_flow_minutes_to_m3h() {
		let (value, unit) = wire_value(&ValueType::VolumeFlow(DurationType::Minutes, -7), 1_000_000.0).unwrap();
		assert_eq!(unit, Unit::M3h);
		assert!((value - 6.0).abs() < 1e-9);
	}
}
