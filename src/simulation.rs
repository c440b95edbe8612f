// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Simulation file replay: the `telegram=` line format used to feed
//! recorded wM-Bus frames through the decoder without a radio attached.
//!
//! Grounded in `wmbus_simulator.cc`'s `loadFile`/
//! `simulate` pair: a line-oriented text file where `telegram=`-prefixed
//! lines carry a `|`-segmented hex frame and an optional `+<seconds>`
//! relative-delay suffix, everything else ignored.

use std::time::Duration;

use crate::codec::hex2bin;

/// One recorded telegram from a simulation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTelegram {
	pub payload: Vec<u8>,
	/// Seconds after the start of playback at which this telegram should
	/// fire, if the line carried a `+<seconds>` suffix.
	pub relative_time: Option<u64>,
}

/// A parsed simulation file, ready to replay.
#[derive(Debug, Clone, Default)]
pub struct SimulationFile {
	pub telegrams: Vec<SimulatedTelegram>,
}

impl SimulationFile {
	/// Parses the line format described on [`SimulationFile`]. Lines that
	/// don't start with `telegram=`, and lines whose hex doesn't decode,
	/// are skipped (the latter logged, not a hard error — one bad line
	/// shouldn't abort an otherwise-good simulation file).
	pub fn parse(text: &str) -> Self {
		let mut telegrams = Vec::new();
		for line in text.lines() {
			let Some(rest) = line.strip_prefix("telegram=") else {
				continue;
			};

			let (hex_part, relative_time) = match rest.split_once('+') {
				Some((hex, secs)) => (hex, secs.trim().parse::<u64>().ok()),
				None => (rest, None),
			};
			let hex: String = hex_part.chars().filter(|&c| c != '|').collect();

			match hex2bin(&hex) {
				Some(payload) => telegrams.push(SimulatedTelegram { payload, relative_time }),
				None => log::warn!("simulation file: not a valid string of hex bytes: \"{line}\""),
			}
		}
		SimulationFile { telegrams }
	}

	/// Replays every telegram in file order, calling `on_telegram` for
	/// each one. Telegrams carrying a `relative_time` are delayed (via
	/// [`std::thread::sleep`]) until that many seconds have elapsed since
	/// the first call to this method; telegrams without one fire
	/// immediately in sequence.
	pub fn replay(&self, start: std::time::Instant, mut on_telegram: impl FnMut(&[u8])) {
		for telegram in &self.telegrams {
			if let Some(rel) = telegram.relative_time {
				let target = start + Duration::from_secs(rel);
				let now = std::time::Instant::now();
				if let Some(remaining) = target.checked_duration_since(now) {
					std::thread::sleep(remaining);
				}
			}
			on_telegram(&telegram.payload);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_plain_telegram_line() {
		let file = SimulationFile::parse("telegram=4E4401\n");
		assert_eq!(file.telegrams.len(), 1);
		assert_eq!(file.telegrams[0].payload, vec![0x4E, 0x44, 0x01]);
		assert_eq!(file.telegrams[0].relative_time, None);
	}

	#[test]
	fn strips_pipe_separators() {
		let file = SimulationFile::parse("telegram=4E|44|01\n");
		assert_eq!(file.telegrams[0].payload, vec![0x4E, 0x44, 0x01]);
	}

	#[test]
	fn parses_the_relative_delay_suffix() {
		let file = SimulationFile::parse("telegram=4E4401+30\n");
		assert_eq!(file.telegrams[0].relative_time, Some(30));
		assert_eq!(file.telegrams[0].payload, vec![0x4E, 0x44, 0x01]);
	}

	#[test]
	fn ignores_non_telegram_lines() {
		let file = SimulationFile::parse("# a comment\n\ntelegram=4E4401\nsomething=else\n");
		assert_eq!(file.telegrams.len(), 1);
	}

	#[test]
	fn skips_invalid_hex_without_aborting() {
		let file = SimulationFile::parse("telegram=ZZZZ\ntelegram=4E4401\n");
		assert_eq!(file.telegrams.len(), 1);
		assert_eq!(file.telegrams[0].payload, vec![0x4E, 0x44, 0x01]);
	}

	#[test]
	fn replay_invokes_callback_for_every_telegram_in_order() {
		let file = SimulationFile::parse("telegram=01\ntelegram=02\ntelegram=03\n");
		let mut seen = Vec::new();
		file.replay(std::time::Instant::now(), |payload| seen.push(payload.to_vec()));
		assert_eq!(seen, vec![vec![0x01], vec![0x02], vec![0x03]]);
	}
}
