// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The driver registry: `(manufacturer, media, version)` dispatch over
//! registered [`Driver`]s.
//!
//! Grounded in wmbusmeters' `DriverManager`/`registerDriver` global
//! registration pattern, adapted to a lookup table owned by the caller
//! rather than a process-wide singleton.

use std::collections::HashMap;
use std::sync::Arc;

use crate::driver::Driver;
use crate::error::WmbusError;

/// `0xFFFF` in any position means "matches anything".
pub const WILDCARD: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triple {
	pub mfct: u16,
	pub media: u16,
	pub version: u16,
}

impl Triple {
	pub fn exact(mfct: u16, media: u8, version: u8) -> Self {
		Triple {
			mfct,
			media: media as u16,
			version: version as u16,
		}
	}

	fn matches(&self, mfct: u16, media: u8, version: u8) -> bool {
		(self.mfct == WILDCARD || self.mfct == mfct)
			&& (self.media == WILDCARD || self.media == media as u16)
			&& (self.version == WILDCARD || self.version == version as u16)
	}

	/// Number of non-wildcard fields; higher is more specific.
	fn specificity(&self) -> u8 {
		[self.mfct, self.media, self.version].iter().filter(|&&v| v != WILDCARD).count() as u8
	}

	/// Whether some `(mfct, media, version)` exists that both triples
	/// would match — field by field, either side is a wildcard or they
	/// carry the same value.
	fn overlaps(&self, other: &Triple) -> bool {
		fn field_overlaps(a: u16, b: u16) -> bool {
			a == WILDCARD || b == WILDCARD || a == b
		}
		field_overlaps(self.mfct, other.mfct) && field_overlaps(self.media, other.media) && field_overlaps(self.version, other.version)
	}
}

pub struct DriverRegistry {
	by_name: HashMap<String, Arc<dyn Driver>>,
	by_triple: Vec<(Triple, Arc<dyn Driver>)>,
}

impl Default for DriverRegistry {
	fn default() -> Self {
		DriverRegistry {
			by_name: HashMap::new(),
			by_triple: Vec::new(),
		}
	}
}

impl DriverRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `driver` under its name and under each of its declared
	/// triples. Registration is idempotent within a name (re-registering
	/// the same name is a no-op replace); two equally specific triples
	/// belonging to *different* names that overlap (some input would
	/// match both) are a registration error, since `resolve` would then
	/// have no principled way to break the tie — this covers exact
	/// duplicates as the specificity-3, fully-overlapping case, but also
	/// catches e.g. two different equally-wildcarded triples that both
	/// match the same input.
	pub fn register(&mut self, driver: Arc<dyn Driver>) -> Result<(), WmbusError> {
		for (existing, owner) in &self.by_triple {
			if owner.name() != driver.name() {
				for triple in driver.triples() {
					if existing.specificity() == triple.specificity() && existing.overlaps(triple) {
						return Err(WmbusError::Config(format!(
							"drivers \"{}\" and \"{}\" both claim equally specific, overlapping triples {:?} and {:?}",
							owner.name(),
							driver.name(),
							existing,
							triple
						)));
					}
				}
			}
		}

		self.by_name.retain(|_, d| d.name() != driver.name());
		self.by_triple.retain(|(_, d)| d.name() != driver.name());

		for triple in driver.triples() {
			self.by_triple.push((*triple, driver.clone()));
		}
		self.by_name.insert(driver.name().to_string(), driver);
		Ok(())
	}

	/// Lookup order: a configured name override always takes precedence;
	/// otherwise exact/wildcard triple match, most specific wins; falls
	/// back to a driver named `"unknown"` if nothing else matches.
	pub fn resolve(&self, mfct: u16, media: u8, version: u8, name_override: Option<&str>) -> Option<Arc<dyn Driver>> {
		if let Some(name) = name_override {
			if let Some(d) = self.by_name.get(name) {
				return Some(d.clone());
			}
		}

		let best = self
			.by_triple
			.iter()
			.filter(|(triple, _)| triple.matches(mfct, media, version))
			.max_by_key(|(triple, _)| triple.specificity());

		if let Some((_, driver)) = best {
			return Some(driver.clone());
		}

		self.by_name.get("unknown").cloned()
	}

	pub fn by_name(&self, name: &str) -> Option<Arc<dyn Driver>> {
		self.by_name.get(name).cloned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::field::FieldInfo;

	struct StubDriver {
		name: &'static str,
		triples: Vec<Triple>,
	}

	impl Driver for StubDriver {
		fn name(&self) -> &'static str {
			self.name
		}

		fn triples(&self) -> &[Triple] {
			&self.triples
		}

		fn fields(&self) -> &[FieldInfo] {
			&[]
		}
	}

	#[test]
	fn exact_triple_beats_wildcard() {
		let mut reg = DriverRegistry::new();
		reg.register(Arc::new(StubDriver {
			name: "exact",
			triples: vec![Triple::exact(0x1234, 0x06, 0x01)],
		}))
		.unwrap();
		reg.register(Arc::new(StubDriver {
			name: "wild",
			triples: vec![Triple {
				mfct: 0x1234,
				media: WILDCARD,
				version: WILDCARD,
			}],
		}))
		.unwrap();

		let resolved = reg.resolve(0x1234, 0x06, 0x01, None).unwrap();
		assert_eq!(resolved.name(), "exact");
	}

	#[test]
	fn falls_back_to_unknown() {
		let mut reg = DriverRegistry::new();
		reg.register(Arc::new(StubDriver {
			name: "unknown",
			triples: vec![],
		}))
		.unwrap();
		let resolved = reg.resolve(0xAAAA, 0x00, 0x00, None).unwrap();
		assert_eq!(resolved.name(), "unknown");
	}

	#[test]
	fn conflicting_exact_triples_are_a_registration_error() {
		let mut reg = DriverRegistry::new();
		reg.register(Arc::new(StubDriver {
			name: "a",
			triples: vec![Triple::exact(0x1234, 0x06, 0x01)],
		}))
		.unwrap();
		let err = reg.register(Arc::new(StubDriver {
			name: "b",
			triples: vec![Triple::exact(0x1234, 0x06, 0x01)],
		}));
		assert!(err.is_err());
	}

	#[test]
	fn overlapping_equal_specificity_triples_are_a_registration_error() {
		let mut reg = DriverRegistry::new();
		reg.register(Arc::new(StubDriver {
			name: "a",
			triples: vec![Triple {
				mfct: 0x1234,
				media: 0x06,
				version: WILDCARD,
			}],
		}))
		.unwrap();
		let err = reg.register(Arc::new(StubDriver {
			name: "b",
			triples: vec![Triple {
				mfct: 0x1234,
				media: WILDCARD,
				version: 0x01,
			}],
		}));
		assert!(err.is_err());
	}

	#[test]
	fn name_override_takes_precedence_over_triple_match() {
		let mut reg = DriverRegistry::new();
		reg.register(Arc::new(StubDriver {
			name: "a",
			triples: vec![Triple::exact(0x1234, 0x06, 0x01)],
		}))
		.unwrap();
		reg.register(Arc::new(StubDriver {
			name: "b",
			triples: vec![],
		}))
		.unwrap();
		let resolved = reg.resolve(0x1234, 0x06, 0x01, Some("b")).unwrap();
		assert_eq!(resolved.name(), "b");
	}
}
