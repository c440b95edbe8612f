// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Per-meter configuration: name, id pattern, optional driver override,
//! optional AES key. A thin `serde`/`serde_yml` wrapper, not a CLI/daemon
//! config system.
//!
//! Grounded in `energy2mqtt`'s `config::OmsConfig { name, id, key }` — the
//! only pack sibling with a structured per-meter config record for an OMS/
//! wM-Bus style device — extended with a `driver` override field so a
//! configured meter can force a specific driver by name.

use serde::Deserialize;

use crate::error::WmbusError;

/// One configured meter. `id` may be a literal 8-digit BCD id or contain
/// `*` wildcards, following wmbusmeters' own convention of treating `*`
/// as "any digit(s) from here on".
#[derive(Debug, Clone, Deserialize)]
pub struct MeterConfig {
	pub name: String,
	pub id: String,
	#[serde(default)]
	pub driver: Option<String>,
	#[serde(default)]
	pub key: Option<String>,
}

impl MeterConfig {
	/// Matches `id` against this config's id pattern. A `*` truncates the
	/// pattern; everything before it must match as a literal prefix.
	pub fn matches_id(&self, id: &str) -> bool {
		match self.id.find('*') {
			Some(pos) => id.len() >= pos && id[..pos].eq_ignore_ascii_case(&self.id[..pos]),
			None => self.id.eq_ignore_ascii_case(id),
		}
	}

	/// Decodes `key` (hex-encoded) into a 16-byte AES key, if present.
	pub fn aes_key(&self) -> Result<Option<[u8; 16]>, WmbusError> {
		let Some(hex) = &self.key else { return Ok(None) };
		if hex.eq_ignore_ascii_case("NOKEY") {
			return Ok(None);
		}
		let bytes = crate::codec::hex2bin(hex).ok_or_else(|| WmbusError::Config(format!("invalid key hex in meter \"{}\"", self.name)))?;
		let key: [u8; 16] = bytes
			.try_into()
			.map_err(|_| WmbusError::Config(format!("key for meter \"{}\" is not 16 bytes", self.name)))?;
		Ok(Some(key))
	}
}

/// The meter list loaded from a config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub meters: Vec<MeterConfig>,
}

impl Config {
	pub fn from_yaml(text: &str) -> Result<Self, WmbusError> {
		serde_yml::from_str(text).map_err(|e| WmbusError::Config(format!("invalid config: {e}")))
	}

	/// The first configured meter whose id pattern matches, if any.
	pub fn find_for_id(&self, id: &str) -> Option<&MeterConfig> {
		self.meters.iter().find(|m| m.matches_id(id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wildcard_id_matches_any_suffix() {
		let config = MeterConfig {
			name: "my_meter".into(),
			id: "332255*".into(),
			driver: None,
			key: None,
		};
		assert!(config.matches_id("33225544"));
		assert!(!config.matches_id("11225544"));
	}

	#[test]
	fn literal_id_requires_exact_match() {
		let config = MeterConfig {
			name: "my_meter".into(),
			id: "33225544".into(),
			driver: None,
			key: None,
		};
		assert!(config.matches_id("33225544"));
		assert!(!config.matches_id("33225545"));
	}

	#[test]
	fn nokey_is_treated_as_no_key() {
		let config = MeterConfig {
			name: "my_meter".into(),
			id: "33225544".into(),
			driver: None,
			key: Some("NOKEY".into()),
		};
		assert_eq!(config.aes_key().unwrap(), None);
	}

	#[test]
	fn bad_key_length_is_a_config_error() {
		let config = MeterConfig {
			name: "my_meter".into(),
			id: "33225544".into(),
			driver: None,
			key: Some("AABB".into()),
		};
		assert!(config.aes_key().is_err());
	}

	#[test]
	fn parses_a_meter_list_from_yaml() {
		let yaml = "meters:\n  - name: my_meter\n    id: \"33225544\"\n    driver: iperl\n    key: NOKEY\n";
		let config = Config::from_yaml(yaml).unwrap();
		assert_eq!(config.meters.len(), 1);
		assert_eq!(config.meters[0].name, "my_meter");
		assert_eq!(config.meters[0].driver.as_deref(), Some("iperl"));
	}
}
