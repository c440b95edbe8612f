// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The output record: the JSON (and tabular) shape the decoding pipeline
//! ultimately produces for one telegram.
//!
//! Modelled on `energy2mqtt`'s `serde`/`serde_json` usage for structured
//! meter readings, with a fixed set of top-level keys (`media`, `meter`,
//! `name`, `id`, `timestamp`, unit-suffixed numeric fields, `status`,
//! `raw_hex`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	Number(f64),
	Text(String),
}

impl FieldValue {
	fn to_json(&self) -> Value {
		match self {
			FieldValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
			FieldValue::Text(s) => Value::String(s.clone()),
		}
	}
}

#[derive(Debug, Clone)]
pub struct OutputRecord {
	pub media: String,
	pub meter: String,
	pub name: String,
	pub id: String,
	pub timestamp: DateTime<Utc>,
	pub fields: Vec<(String, FieldValue)>,
	pub status: String,
	pub raw_hex: String,
}

impl OutputRecord {
	pub fn new(media: impl Into<String>, meter: impl Into<String>, name: impl Into<String>, id: impl Into<String>) -> Self {
		OutputRecord {
			media: media.into(),
			meter: meter.into(),
			name: name.into(),
			id: id.into(),
			timestamp: Utc::now(),
			fields: Vec::new(),
			status: String::from("OK"),
			raw_hex: String::new(),
		}
	}

	pub fn push_field(&mut self, key: impl Into<String>, value: FieldValue) {
		self.fields.push((key.into(), value));
	}

	/// Render as tabular (`key=value`, space separated), in the driver's
	/// `default_fields` order.
	pub fn to_tabular(&self) -> String {
		let mut parts = vec![format!("name={}", self.name), format!("id={}", self.id)];
		for (key, value) in &self.fields {
			let rendered = match value {
				FieldValue::Number(n) => format!("{n}"),
				FieldValue::Text(s) => s.clone(),
			};
			parts.push(format!("{key}={rendered}"));
		}
		parts.join(" ")
	}
}

impl Serialize for OutputRecord {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		let mut map = Map::new();
		map.insert("media".into(), Value::String(self.media.clone()));
		map.insert("meter".into(), Value::String(self.meter.clone()));
		map.insert("name".into(), Value::String(self.name.clone()));
		map.insert("id".into(), Value::String(self.id.clone()));
		map.insert(
			"timestamp".into(),
			Value::String(self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
		);
		for (key, value) in &self.fields {
			map.insert(key.clone(), value.to_json());
		}
		map.insert("status".into(), Value::String(self.status.clone()));
		map.insert("raw_hex".into(), Value::String(self.raw_hex.clone()));
		Value::Object(map).serialize(serializer)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serializes_required_keys() {
		let mut record = OutputRecord::new("water", "iperl", "my_meter", "33225544");
		record.push_field("total_m3", FieldValue::Number(12.345));
		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["media"], "water");
		assert_eq!(json["meter"], "iperl");
		assert_eq!(json["id"], "33225544");
		assert_eq!(json["total_m3"], 12.345);
		assert!(json["timestamp"].is_string());
	}

	#[test]
	fn tabular_includes_all_fields_in_order() {
		let mut record = OutputRecord::new("water", "iperl", "my_meter", "1");
		record.push_field("total_m3", FieldValue::Number(1.0));
		record.push_field("target_m3", FieldValue::Number(2.0));
		let tabular = record.to_tabular();
		assert!(tabular.find("total_m3").unwrap() < tabular.find("target_m3").unwrap());
	}
}
