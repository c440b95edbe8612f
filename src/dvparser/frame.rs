// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

use super::entry::DvEntry;
use super::record::Record;
use crate::error::MBResult;
use winnow::combinator::{alt, eof, repeat, repeat_till};
use winnow::error::StrContext;
use winnow::prelude::*;
use winnow::Bytes;

const IDLE_FILLER: u8 = 0x2F;

#[derive(Debug)]
pub struct Frame {
	pub entries: Vec<DvEntry>,
	pub more_data_follows: bool,
	pub manufacturer_specific: Vec<u8>,
}

impl Frame {
	pub fn parse(input: &mut &Bytes) -> MBResult<Self> {
		let (records, more_data_follows) = repeat_till(
			1..,
			(
				repeat::<_, _, (), _, _>(0.., IDLE_FILLER),
				Record::parse.context(StrContext::Label("frame record")),
			)
				.map(|(_, record)| record),
			alt((
				eof.map(|_| false),
				0x1F.map(|_| true),
				0x0F.map(|_| false),
			)),
		)
		.parse_next(input)?;

		let entries = DvEntry::from_records(records);

		Ok(Self {
			entries,
			more_data_follows,
			manufacturer_specific: input.iter().copied().collect(),
		})
	}
}
