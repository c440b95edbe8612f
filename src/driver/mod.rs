// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The driver abstraction: one meter family's field declarations plus
//! optional proprietary-payload handling.
//!
//! The original C++ driver hierarchy (a base `MeterCommonImplementation`
//! plus virtual overrides per meter family) maps here to a single trait
//! exposing a triple-based `detect`, an optional `process_content`
//! override, and a declarative list of `FieldInfo`.

pub mod extractor;
pub mod field;
pub mod registry;

use crate::error::WmbusError;
use crate::lookup::Lookup;
use crate::telegram::Telegram;
use field::FieldInfo;
use registry::Triple;

/// A meter family. Implementations are typically zero-sized units backed
/// entirely by `'static` data (see `src/drivers/*.rs`).
pub trait Driver: Send + Sync {
	fn name(&self) -> &'static str;

	/// `(mfct, media, version)` triples this driver claims, `0xFFFF`
	/// standing in for a wildcard in any position.
	fn triples(&self) -> &[Triple];

	fn fields(&self) -> &[FieldInfo];

	/// Hook for meters whose payload isn't a standard DIF/VIF record
	/// stream. Returning `None` means "use the ordinary DV parser
	/// output"; `Some(Err(_))` aborts extraction with that error recorded
	/// on the telegram's status.
	fn process_content(&self, _telegram: &mut Telegram) -> Option<Result<(), WmbusError>> {
		None
	}

	/// Manufacturer-specific translation for the top three (manufacturer)
	/// bits of the TPL status byte, e.g. `driver_lansenth.cc`'s
	/// `setMfctTPLStatusBits`. Applied alongside the common status
	/// translator wherever a field asks for TPL status inclusion.
	fn status_translator(&self) -> Option<&Lookup> {
		None
	}
}
