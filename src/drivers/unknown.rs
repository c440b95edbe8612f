// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The fallback driver: claims no triples, declares no fields, used when
//! [`crate::driver::registry::DriverRegistry::resolve`] can't find a
//! better match. An output record built from it still carries its
//! identifying header fields, just no meter-specific data.

use std::sync::OnceLock;

use crate::driver::field::FieldInfo;
use crate::driver::registry::Triple;
use crate::driver::Driver;

pub struct Unknown;

impl Driver for Unknown {
	fn name(&self) -> &'static str {
		"unknown"
	}

	fn triples(&self) -> &[Triple] {
		&[]
	}

	fn fields(&self) -> &[FieldInfo] {
		&[]
	}
}

static INSTANCE: OnceLock<Unknown> = OnceLock::new();

pub fn driver() -> &'static Unknown {
	INSTANCE.get_or_init(|| Unknown)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::driver::extractor::extract;
	use crate::telegram::Telegram;

	#[test]
	fn produces_no_fields_and_no_errors() {
		let telegram = Telegram::new(vec![]);
		let result = extract(driver(), &telegram);
		assert!(result.fields.is_empty());
		assert!(result.errors.is_empty());
	}
}
