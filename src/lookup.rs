// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The bit-to-string translation engine: turns a raw integer (meter
//! status byte, error flags, ...) into a human-readable token string.
//!
//! Grounded in `translatebits.h`/`translatebits.cc` (`Translate::Rule`/
//! `Map`/`Lookup`, `handleBitToString`/`handleIndexToString`/
//! `handleDecimalsToString`), ported from C++ mutable-string
//! accumulation into a small Rust value-returning equivalent.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestBit {
	Set,
	NotSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
	BitToString,
	IndexToString,
	DecimalsToString,
}

#[derive(Debug, Clone)]
pub struct Map {
	pub from: u64,
	pub to: &'static str,
	pub test: TestBit,
}

impl Map {
	pub const fn set(from: u64, to: &'static str) -> Self {
		Map {
			from,
			to,
			test: TestBit::Set,
		}
	}

	pub const fn not_set(from: u64, to: &'static str) -> Self {
		Map {
			from,
			to,
			test: TestBit::NotSet,
		}
	}
}

#[derive(Debug, Clone)]
pub struct Rule {
	pub name: &'static str,
	pub rule_type: RuleType,
	pub mask: u64,
	pub no_bits_message: &'static str,
	pub map: Vec<Map>,
}

impl Rule {
	pub fn new(name: &'static str, rule_type: RuleType, mask: u64) -> Self {
		Rule {
			name,
			rule_type,
			mask,
			no_bits_message: "",
			map: Vec::new(),
		}
	}

	pub fn with_default(mut self, msg: &'static str) -> Self {
		self.no_bits_message = msg;
		self
	}

	pub fn add(mut self, m: Map) -> Self {
		self.map.push(m);
		self
	}

	fn handle_bit_to_string(&self, bits: u64) -> String {
		let mut bits = bits & self.mask;
		let mut tokens = Vec::new();
		for m in &self.map {
			let from = m.from & self.mask;
			match m.test {
				TestBit::Set => {
					if bits & from != 0 {
						tokens.push(m.to.to_string());
						bits &= !m.from;
					}
				}
				TestBit::NotSet => {
					if bits & from == 0 {
						tokens.push(m.to.to_string());
					} else {
						bits &= !m.from;
					}
				}
			}
		}
		if bits != 0 {
			tokens.push(format!("{}_{:X}", self.name, bits));
		}
		if tokens.is_empty() && !self.no_bits_message.is_empty() {
			tokens.push(self.no_bits_message.to_string());
		}
		tokens.join(" ")
	}

	fn handle_index_to_string(&self, bits: u64) -> String {
		let bits = bits & self.mask;
		for m in &self.map {
			if bits == (m.from & self.mask) {
				return m.to.to_string();
			}
		}
		format!("{}_{:X}", self.name, bits)
	}

	fn handle_decimals_to_string(&self, bits: u64) -> String {
		let mut number = if self.mask != 0 { bits % self.mask } else { bits };
		let mut tokens = Vec::new();
		if number == 0 && !self.no_bits_message.is_empty() {
			tokens.push(self.no_bits_message.to_string());
		}
		for m in &self.map {
			let num = if self.mask != 0 { m.from % self.mask } else { m.from };
			if number >= num {
				tokens.push(m.to.to_string());
				number -= num;
			}
		}
		if number > 0 {
			tokens.push(format!("{}_{}", self.name, number));
		}
		tokens.join(" ")
	}

	fn handle(&self, bits: u64) -> String {
		match self.rule_type {
			RuleType::BitToString => self.handle_bit_to_string(bits),
			RuleType::IndexToString => self.handle_index_to_string(bits),
			RuleType::DecimalsToString => self.handle_decimals_to_string(bits),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Lookup {
	pub rules: Vec<Rule>,
}

impl Lookup {
	pub fn new() -> Self {
		Lookup::default()
	}

	pub fn add(mut self, rule: Rule) -> Self {
		self.rules.push(rule);
		self
	}

	pub fn has_lookups(&self) -> bool {
		!self.rules.is_empty()
	}

	pub fn translate(&self, bits: u64) -> String {
		let parts: Vec<String> = self.rules.iter().map(|r| r.handle(bits)).filter(|s| !s.is_empty()).collect();
		parts.join(" ").trim_end().to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bit_to_string_emits_tokens_and_clears_handled_bits() {
		let rule = Rule::new("STATUS", RuleType::BitToString, 0xFF)
			.with_default("OK")
			.add(Map::set(0x01, "DRY"))
			.add(Map::set(0x02, "REVERSE"));
		let lookup = Lookup::new().add(rule);
		assert_eq!(lookup.translate(0x01), "DRY");
		assert_eq!(lookup.translate(0x03), "DRY REVERSE");
		assert_eq!(lookup.translate(0x00), "OK");
	}

	#[test]
	fn bit_to_string_reports_unhandled_bits() {
		let rule = Rule::new("STATUS", RuleType::BitToString, 0xFF).add(Map::set(0x01, "DRY"));
		let lookup = Lookup::new().add(rule);
		assert_eq!(lookup.translate(0x05), "DRY STATUS_4");
	}

	#[test]
	fn index_to_string_matches_exact_value() {
		let rule = Rule::new("TYPE", RuleType::IndexToString, 0x0F)
			.add(Map::set(0x01, "WATER"))
			.add(Map::set(0x02, "HEAT"));
		let lookup = Lookup::new().add(rule);
		assert_eq!(lookup.translate(0x02), "HEAT");
		assert_eq!(lookup.translate(0x09), "TYPE_9");
	}

	#[test]
	fn decimals_to_string_subtracts_greedily() {
		let rule = Rule::new("ERR", RuleType::DecimalsToString, 100)
			.add(Map::set(10, "TEN"))
			.add(Map::set(1, "ONE"));
		let lookup = Lookup::new().add(rule);
		assert_eq!(lookup.translate(11), "TEN ONE");
	}
}
