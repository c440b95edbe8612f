// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! [`Telegram`]: one inbound message and everything the pipeline learned
//! about it on the way to an [`crate::output::OutputRecord`].
//!
//! There's no equivalent type upstream of link-layer `Packet` parsing;
//! this is a new accumulator type that carries every intermediate result
//! the pipeline stages produce on the way to an output record.

use indexmap::IndexMap;

use crate::dvparser::DvEntry;
use crate::link_layer::DllFields;
use crate::transport_layer::{EllHeader, TPLHeader};

/// An annotation tied to a byte range of the original telegram, used for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
	pub offset: usize,
	pub length: usize,
	pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelegramFlags {
	pub encrypted: bool,
	pub simulated: bool,
	pub handled: bool,
}

#[derive(Debug, Clone)]
pub struct Telegram {
	pub raw: Vec<u8>,
	pub dll: Option<DllFields>,
	pub ci_field: u8,
	pub tpl_header: Option<TPLHeader>,
	pub ell_header: Option<EllHeader>,
	/// The (possibly still encrypted) application-layer payload.
	pub payload: Vec<u8>,
	/// The decrypted/plaintext application-layer content, once the crypto
	/// stage has run. After that stage, either this is populated or
	/// `status` records a terminal error.
	pub content: Option<Vec<u8>>,
	pub explanations: Vec<Explanation>,
	pub entries: IndexMap<String, DvEntry>,
	pub flags: TelegramFlags,
	/// Status token accumulated by the orchestrator.
	pub status: String,
}

impl Telegram {
	pub fn new(raw: Vec<u8>) -> Self {
		Telegram {
			raw,
			dll: None,
			ci_field: 0,
			tpl_header: None,
			ell_header: None,
			payload: Vec::new(),
			content: None,
			explanations: Vec::new(),
			entries: IndexMap::new(),
			flags: TelegramFlags::default(),
			status: String::from("OK"),
		}
	}

	pub fn explain(&mut self, offset: usize, length: usize, text: impl Into<String>) {
		self.explanations.push(Explanation {
			offset,
			length,
			text: text.into(),
		});
	}

	pub fn manufacturer(&self) -> Option<u16> {
		match (&self.dll, &self.tpl_header) {
			(_, Some(TPLHeader::Long(h))) => Some(h.manufacturer_code),
			(Some(dll), _) => Some(dll.manufacturer),
			_ => None,
		}
	}

	pub fn device_type(&self) -> Option<u8> {
		match (&self.dll, &self.tpl_header) {
			(_, Some(TPLHeader::Long(h))) => Some(h.device_type.as_media_code()),
			(Some(dll), _) => Some(dll.device_type),
			_ => None,
		}
	}

	pub fn version(&self) -> Option<u8> {
		match (&self.dll, &self.tpl_header) {
			(_, Some(TPLHeader::Long(h))) => Some(h.version),
			(Some(dll), _) => Some(dll.version),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_telegram_starts_ok_and_unhandled() {
		let t = Telegram::new(vec![0x01, 0x02]);
		assert_eq!(t.status, "OK");
		assert!(!t.flags.handled);
		assert!(t.content.is_none());
	}

	#[test]
	fn explanations_accumulate_in_order() {
		let mut t = Telegram::new(vec![]);
		t.explain(0, 1, "L field");
		t.explain(1, 1, "C field");
		assert_eq!(t.explanations.len(), 2);
		assert_eq!(t.explanations[0].text, "L field");
	}
}
