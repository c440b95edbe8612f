// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The built-in driver set. [`register_all`] builds a
//! [`DriverRegistry`] with every driver this crate ships, the way the
//! orchestrator expects to construct it once at startup.

pub mod apator162;
pub mod iperl;
pub mod lansenth;
pub mod mkradio3;
pub mod multical21;
pub mod omnipower;
pub mod unknown;

use std::sync::Arc;

use crate::driver::registry::DriverRegistry;
use crate::error::WmbusError;

pub fn register_all() -> Result<DriverRegistry, WmbusError> {
	let mut registry = DriverRegistry::new();
	registry.register(Arc::new(omnipower::OmniPower::new()))?;
	registry.register(Arc::new(iperl::Iperl::new()))?;
	registry.register(Arc::new(lansenth::LansenTh::new()))?;
	registry.register(Arc::new(mkradio3::MkRadio3::new()))?;
	registry.register(Arc::new(multical21::Multical21::new()))?;
	registry.register(Arc::new(apator162::Apator162::new()))?;
	registry.register(Arc::new(unknown::Unknown))?;
	Ok(registry)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_all_succeeds_with_no_triple_conflicts() {
		register_all().unwrap();
	}

	#[test]
	fn registry_resolves_omnipower_by_its_triple() {
		let registry = register_all().unwrap();
		let driver = registry.resolve(crate::manufacturer::MANUFACTURER_KAM, 0x02, 0x30, None).unwrap();
		assert_eq!(driver.name(), "omnipower");
	}

	#[test]
	fn registry_falls_back_to_unknown() {
		let registry = register_all().unwrap();
		let driver = registry.resolve(0xFFFE, 0x00, 0x00, None).unwrap();
		assert_eq!(driver.name(), "unknown");
	}
}
