// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The Extended Link Layer header (EN 13757-4 §9), carried by CI codes in
//! the `0x90..=0x97` "Wireless" range. Supplies the communication-control
//! (CC) byte and session number [`crate::crypto::decrypt_mode13`] and
//! [`crate::crypto::decrypt_kamstrup_c1`] need to build their AES-CTR IV.
//!
//! Grounded directly in EN 13757-4 §9.4's field layout and `telegram.cc`'s
//! ELL-II handling.

use winnow::binary;
use winnow::prelude::*;
use winnow::Bytes;

use crate::error::MBResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EllHeader {
	pub cc_field: u8,
	pub access_number: u8,
	pub session_number: u32,
}

impl EllHeader {
	/// Parses the short ELL-II form: `CC AN SN(4)`. The full form also
	/// carries a repeated manufacturer/address pair for addressing through
	/// a relay, which none of the supplied drivers need, so it is not
	/// modelled here.
	pub fn parse(input: &mut &Bytes) -> MBResult<Self> {
		(binary::u8, binary::u8, binary::le_u32)
			.map(|(cc_field, access_number, session_number)| EllHeader {
				cc_field,
				access_number,
				session_number,
			})
			.parse_next(input)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_short_form() {
		let data = [0x80u8, 0x2A, 0x01, 0x00, 0x00, 0x00];
		let mut input: &Bytes = Bytes::new(&data);
		let ell = EllHeader::parse(&mut input).unwrap();
		assert_eq!(ell.cc_field, 0x80);
		assert_eq!(ell.access_number, 0x2A);
		assert_eq!(ell.session_number, 1);
	}
}
