// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The embedded test-vector format: driver files carry self-test data as
//! plain text of the form
//!
//! ```text
//! Test: <meter-name> <driver-name> <id> <key-or-NOKEY>
//! telegram=|<hex>|
//! {<expected json>}
//! ```
//!
//! [`run_test_vector`] parses one such block and replays it through
//! [`crate::orchestrator::decode_telegram`], checking that the decoded
//! record's driver, id and fields match what the vector expects.
//!
//! Grounded in wmbusmeters' own embedded `// Test:` vectors (seen called
//! out by name against `driver_omnipower.cc`/`meter_iperl.cc` in the
//! driver sources) and in `src/bin/test_parse.rs`'s self-test-binary
//! pattern for the general idea of executable, in-source test data.

use serde_json::Value;

use crate::config::MeterConfig;
use crate::driver::registry::DriverRegistry;
use crate::orchestrator::decode_telegram;

/// One parsed `Test:` block.
#[derive(Debug, Clone)]
pub struct TestVector {
	pub meter_name: String,
	pub driver_name: String,
	pub id: String,
	pub key: Option<String>,
	pub telegram_hex: String,
	pub expected: Value,
}

impl TestVector {
	/// Parses the block format described on the module. `text` may carry
	/// leading `// ` comment markers (stripped line by line) since driver
	/// files embed these as doc/line comments.
	pub fn parse(text: &str) -> Result<Self, String> {
		let lines: Vec<&str> = text.lines().map(strip_comment_marker).collect();

		let header = lines
			.iter()
			.find_map(|l| l.strip_prefix("Test:"))
			.ok_or_else(|| "missing \"Test:\" header line".to_string())?;
		let fields: Vec<&str> = header.split_whitespace().collect();
		let [meter_name, driver_name, id, key] = fields[..] else {
			return Err(format!("expected 4 fields after \"Test:\", got {}", fields.len()));
		};

		let telegram_line = lines
			.iter()
			.find_map(|l| l.strip_prefix("telegram="))
			.ok_or_else(|| "missing \"telegram=\" line".to_string())?;
		let telegram_hex: String = telegram_line.chars().filter(|&c| c != '|').collect();

		let json_text: String = lines
			.iter()
			.skip_while(|l| !l.trim_start().starts_with('{'))
			.take_while(|l| !l.trim_start().starts_with('|') || l.trim_start().starts_with('{'))
			.cloned()
			.collect::<Vec<_>>()
			.join("\n");
		let expected: Value = serde_json::from_str(json_text.trim()).map_err(|e| format!("invalid expected json: {e}"))?;

		Ok(TestVector {
			meter_name: meter_name.to_string(),
			driver_name: driver_name.to_string(),
			id: id.to_string(),
			key: (!key.eq_ignore_ascii_case("NOKEY")).then(|| key.to_string()),
			telegram_hex,
			expected,
		})
	}
}

fn strip_comment_marker(line: &str) -> &str {
	line.trim_start().strip_prefix("///").or_else(|| line.trim_start().strip_prefix("//")).unwrap_or(line).trim_start()
}

/// Parses and runs one embedded test vector, returning `Err` with a
/// human-readable mismatch description on failure. Compares every key in
/// the expected JSON except `timestamp` (non-deterministic) and
/// `raw_hex` (redundant with the input telegram).
pub fn run_test_vector(text: &str, registry: &DriverRegistry) -> Result<(), String> {
	let vector = TestVector::parse(text)?;

	let config = MeterConfig {
		name: vector.meter_name.clone(),
		id: vector.id.clone(),
		driver: Some(vector.driver_name.clone()),
		key: vector.key.clone(),
	};

	let bytes = crate::codec::hex2bin(&vector.telegram_hex).ok_or_else(|| format!("invalid telegram hex: \"{}\"", vector.telegram_hex))?;

	let record = decode_telegram(&bytes, Some(&config), registry).ok_or_else(|| "decode_telegram returned no record".to_string())?;
	let actual = serde_json::to_value(&record).map_err(|e| format!("failed to serialize decoded record: {e}"))?;

	let Value::Object(expected_map) = &vector.expected else {
		return Err("expected json must be an object".to_string());
	};
	let Value::Object(actual_map) = &actual else {
		unreachable!("OutputRecord always serializes to an object")
	};

	for (key, expected_value) in expected_map {
		if key == "timestamp" || key == "raw_hex" {
			continue;
		}
		let actual_value = actual_map.get(key).ok_or_else(|| format!("missing key \"{key}\" in decoded output"))?;
		if actual_value != expected_value {
			return Err(format!("field \"{key}\": expected {expected_value}, got {actual_value}"));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_a_minimal_vector() {
		let text = "Test: MyMeter omnipower 11223344 NOKEY\ntelegram=|4E4401|\n{\"meter\": \"omnipower\"}\n";
		let vector = TestVector::parse(text).unwrap();
		assert_eq!(vector.meter_name, "MyMeter");
		assert_eq!(vector.driver_name, "omnipower");
		assert_eq!(vector.id, "11223344");
		assert_eq!(vector.key, None);
		assert_eq!(vector.telegram_hex, "4E4401");
		assert_eq!(vector.expected["meter"], "omnipower");
	}

	#[test]
	fn strips_leading_comment_markers() {
		let text = "// Test: MyMeter omnipower 11223344 NOKEY\n// telegram=|4E4401|\n// {\"meter\": \"omnipower\"}\n";
		let vector = TestVector::parse(text).unwrap();
		assert_eq!(vector.telegram_hex, "4E4401");
	}

	#[test]
	fn keeps_a_real_key_when_present() {
		let text = "Test: MyMeter iperl 11223344 00112233445566778899AABBCCDDEEFF\ntelegram=|01|\n{}\n";
		let vector = TestVector::parse(text).unwrap();
		assert_eq!(vector.key.as_deref(), Some("00112233445566778899AABBCCDDEEFF"));
	}

	#[test]
	fn run_test_vector_passes_for_the_known_good_omnipower_telegram() {
		let registry = crate::drivers::register_all().unwrap();

		let dv_content = crate::codec::hex2bin("04041A03000004843C00000000042B0300000004AB3C00000000").unwrap();
		let mut data = vec![0x44u8]; // C field
		data.extend_from_slice(&crate::manufacturer::MANUFACTURER_KAM.to_le_bytes());
		data.extend_from_slice(&[0x44, 0x33, 0x22, 0x11]); // A-field id
		data.push(0x30); // version
		data.push(0x02); // device type (electricity)
		data.push(0x7A); // CI: response from device, short TPL header
		data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // short TPL, security mode none
		data.extend_from_slice(&dv_content);
		let mut frame = vec![data.len() as u8];
		frame.extend_from_slice(&data);
		let hex = crate::codec::bin2hex(&frame);

		let text = format!(
			"Test: MyElectricityMeter omnipower 11223344 NOKEY\ntelegram=|{hex}|\n{{\"meter\": \"omnipower\", \"status\": \"OK\", \"total_energy_consumption_kwh\": 7.94}}\n"
		);
		run_test_vector(&text, &registry).unwrap();
	}
}
