// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Units and the quantities they measure. Each [`Unit`] belongs to exactly
//! one [`Quantity`]; [`convert`] is total within a quantity and a hard
//! error across quantities — the kind of programmer mistake that should
//! surface immediately rather than silently produce a nonsense number.
//!
//! Expressed as a closed Rust enum with a static conversion table rather
//! than a runtime-registered unit system: the set of units this crate
//! needs is fixed at compile time, so there's no need to pay for
//! dynamic lookup or open-ended registration.

use crate::error::WmbusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
	Energy,
	Power,
	Volume,
	VolumeFlow,
	Mass,
	MassFlow,
	Temperature,
	TemperatureDifference,
	Time,
	HeatCostAllocation,
	Voltage,
	Amperage,
	RelativeHumidity,
	PointInTime,
	Dimensionless,
	Text,
	Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
	// Energy
	KWh,
	MWh,
	GJ,
	MJ,
	// Power
	KW,
	W,
	// Volume
	M3,
	L,
	// Volume flow
	M3h,
	Lh,
	// Mass
	Kg,
	Tonne,
	// Mass flow
	KgH,
	// Temperature
	C,
	K,
	// Temperature difference
	DeltaC,
	// Time
	Hour,
	Minute,
	Second,
	Day,
	Year,
	// Heat cost allocation
	Hca,
	// Electrical
	Volt,
	Ampere,
	// Relative humidity
	Rh,
	// Misc
	PointInTime,
	Counter,
	None,
	Text,
}

impl Unit {
	pub fn quantity(self) -> Quantity {
		use Unit::*;
		match self {
			KWh | MWh | GJ | MJ => Quantity::Energy,
			KW | W => Quantity::Power,
			M3 | L => Quantity::Volume,
			M3h | Lh => Quantity::VolumeFlow,
			Kg | Tonne => Quantity::Mass,
			KgH => Quantity::MassFlow,
			C | K => Quantity::Temperature,
			DeltaC => Quantity::TemperatureDifference,
			Hour | Minute | Second | Day | Year => Quantity::Time,
			Hca => Quantity::HeatCostAllocation,
			Volt => Quantity::Voltage,
			Ampere => Quantity::Amperage,
			Rh => Quantity::RelativeHumidity,
			PointInTime => Quantity::PointInTime,
			Counter => Quantity::Counter,
			None => Quantity::Dimensionless,
			Text => Quantity::Text,
		}
	}

	/// The multiplier taking a value in `self` to the quantity's canonical
	/// SI-ish base unit (kWh, kW, m³, m³/h, kg, kg/h, °C, hour).
	fn to_base_factor(self) -> f64 {
		use Unit::*;
		match self {
			KWh => 1.0,
			MWh => 1000.0,
			GJ => 1000.0 / 3.6,
			MJ => 1.0 / 3.6,
			KW => 1.0,
			W => 0.001,
			M3 => 1.0,
			L => 0.001,
			M3h => 1.0,
			Lh => 0.001,
			Kg => 1.0,
			Tonne => 1000.0,
			KgH => 1.0,
			C | DeltaC => 1.0, // additive offset handled separately in `convert`
			K => 1.0,
			Hour => 1.0,
			Minute => 1.0 / 60.0,
			Second => 1.0 / 3600.0,
			Day => 24.0,
			Year => 24.0 * 365.25,
			Hca => 1.0,
			Volt => 1.0,
			Ampere => 1.0,
			Rh => 1.0,
			PointInTime | Counter | None | Text => 1.0,
		}
	}

	/// The machine-readable suffix used for output-record field names
	/// (`_kwh`, `_m3`, `_c`, `_m3h`, `_v`, `_h`, `_y`, `_hca`, …).
	pub fn field_suffix(self) -> &'static str {
		use Unit::*;
		match self {
			KWh => "kwh",
			MWh => "mwh",
			GJ => "gj",
			MJ => "mj",
			KW => "kw",
			W => "w",
			M3 => "m3",
			L => "l",
			M3h => "m3h",
			Lh => "lh",
			Kg => "kg",
			Tonne => "t",
			KgH => "kgh",
			C => "c",
			K => "k",
			DeltaC => "deltac",
			Hour => "h",
			Minute => "min",
			Second => "s",
			Day => "d",
			Year => "y",
			Hca => "hca",
			Volt => "v",
			Ampere => "a",
			Rh => "rh",
			PointInTime => "date",
			Counter => "counter",
			None => "",
			Text => "txt",
		}
	}
}

/// Convert `value`, expressed in `from`, into `to`. Fails if the two units
/// don't share a quantity — a caller bug, not a data error.
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, WmbusError> {
	if from.quantity() != to.quantity() {
		return Err(WmbusError::Unit {
			from: format!("{from:?}"),
			to: format!("{to:?}"),
		});
	}
	if from.quantity() == Quantity::Temperature {
		// Only C <-> K carry an additive offset; DeltaC is handled via the
		// ordinary multiplicative path since it's a distinct quantity.
		return Ok(match (from, to) {
			(Unit::C, Unit::K) => value + 273.15,
			(Unit::K, Unit::C) => value - 273.15,
			_ => value,
		});
	}
	let base = value * from.to_base_factor();
	Ok(base / to.to_base_factor())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_quantity_round_trips() {
		let v = 12.345;
		let base = convert(v, Unit::L, Unit::M3).unwrap();
		let back = convert(base, Unit::M3, Unit::L).unwrap();
		assert!((back - v).abs() < 1e-9);
	}

	#[test]
	fn cross_quantity_conversion_fails() {
		assert!(convert(1.0, Unit::M3, Unit::KWh).is_err());
	}

	#[test]
	fn celsius_kelvin_offset() {
		let k = convert(0.0, Unit::C, Unit::K).unwrap();
		assert!((k - 273.15).abs() < 1e-9);
	}
}
