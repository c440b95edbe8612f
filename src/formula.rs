// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The calculator/formula expression language: a small recursive-descent
//! grammar over field references and literal `number unit` pairs, used
//! for driver-declared calculated fields.
//!
//! Grammar: `expr := term (('+'|'-') term)*; term := factor (('*'|'/')
//! factor)*; factor := number unit | ident | '(' expr ')'`. Parsed with
//! `winnow` combinators, applied here to plain `&str` input instead of
//! the DV parser's `&Bytes`.

use std::collections::HashMap;

use winnow::ascii::{alpha1, alphanumeric1, digit1, multispace0};
use winnow::combinator::{alt, delimited, opt, repeat};
use winnow::error::{ContextError, StrContext};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::error::WmbusError;
use crate::units::{convert, Unit};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(f64, Unit),
	Ident(String),
	Add(Box<Expr>, Box<Expr>),
	Sub(Box<Expr>, Box<Expr>),
	Mul(Box<Expr>, Box<Expr>),
	Div(Box<Expr>, Box<Expr>),
}

fn ws<'a, O>(inner: impl Parser<&'a str, O, ContextError>) -> impl Parser<&'a str, O, ContextError> {
	delimited(multispace0, inner, multispace0)
}

fn number(input: &mut &str) -> PResult<f64> {
	(
		opt(one_of(['-', '+'])),
		digit1,
		opt((one_of('.'), digit1)),
	)
		.recognize()
		.try_map(str::parse::<f64>)
		.context(StrContext::Label("number"))
		.parse_next(input)
}

fn unit_suffix(input: &mut &str) -> PResult<Unit> {
	alpha1
		.verify_map(|s: &str| {
			Some(match s.to_ascii_lowercase().as_str() {
				"kwh" => Unit::KWh,
				"mwh" => Unit::MWh,
				"gj" => Unit::GJ,
				"mj" => Unit::MJ,
				"kw" => Unit::KW,
				"w" => Unit::W,
				"m3" => Unit::M3,
				"l" => Unit::L,
				"m3h" => Unit::M3h,
				"lh" => Unit::Lh,
				"kg" => Unit::Kg,
				"t" => Unit::Tonne,
				"kgh" => Unit::KgH,
				"c" => Unit::C,
				"k" => Unit::K,
				"h" => Unit::Hour,
				"min" => Unit::Minute,
				"s" => Unit::Second,
				"d" => Unit::Day,
				"y" => Unit::Year,
				"hca" => Unit::Hca,
				"v" => Unit::Volt,
				"a" => Unit::Ampere,
				"rh" => Unit::Rh,
				_ => return None,
			})
		})
		.context(StrContext::Label("unit"))
		.parse_next(input)
}

fn ident(input: &mut &str) -> PResult<String> {
	(alpha1, repeat::<_, _, (), _, _>(0.., alt((alphanumeric1, "_"))))
		.recognize()
		.map(String::from)
		.context(StrContext::Label("identifier"))
		.parse_next(input)
}

fn factor(input: &mut &str) -> PResult<Expr> {
	ws(alt((
		(number, opt(unit_suffix)).map(|(n, u)| Expr::Literal(n, u.unwrap_or(Unit::None))),
		ident.map(Expr::Ident),
		delimited(ws('('), expr, ws(')')),
	)))
	.parse_next(input)
}

fn term(input: &mut &str) -> PResult<Expr> {
	let mut acc = factor.parse_next(input)?;
	let rest: Vec<(char, Expr)> = repeat(0.., (ws(one_of(['*', '/'])), factor)).parse_next(input)?;
	for (op, rhs) in rest {
		acc = match op {
			'*' => Expr::Mul(Box::new(acc), Box::new(rhs)),
			'/' => Expr::Div(Box::new(acc), Box::new(rhs)),
			_ => unreachable!(),
		};
	}
	Ok(acc)
}

pub fn expr(input: &mut &str) -> PResult<Expr> {
	let mut acc = term.parse_next(input)?;
	let rest: Vec<(char, Expr)> = repeat(0.., (ws(one_of(['+', '-'])), term)).parse_next(input)?;
	for (op, rhs) in rest {
		acc = match op {
			'+' => Expr::Add(Box::new(acc), Box::new(rhs)),
			'-' => Expr::Sub(Box::new(acc), Box::new(rhs)),
			_ => unreachable!(),
		};
	}
	Ok(acc)
}

pub fn parse_formula(input: &str) -> Result<Expr, WmbusError> {
	let mut s = input;
	expr(&mut s)
		.map_err(|e| WmbusError::Parse {
			offset: 0,
			message: format!("bad formula: {e}"),
		})
		.and_then(|e| {
			if s.trim().is_empty() {
				Ok(e)
			} else {
				Err(WmbusError::Parse {
					offset: input.len() - s.len(),
					message: format!("unexpected trailing input: {s:?}"),
				})
			}
		})
}

/// Evaluate `expr` against a context mapping field names (including unit
/// suffix, e.g. `total_energy_consumption_kwh`) to their already-extracted
/// `(value, unit)` pair.
pub fn eval(expr: &Expr, ctx: &HashMap<String, (f64, Unit)>) -> Result<(f64, Unit), WmbusError> {
	match expr {
		Expr::Literal(v, u) => Ok((*v, *u)),
		Expr::Ident(name) => ctx
			.get(name)
			.copied()
			.ok_or_else(|| WmbusError::Field(name.clone())),
		Expr::Add(l, r) => {
			let (lv, lu) = eval(l, ctx)?;
			let (rv, ru) = eval(r, ctx)?;
			let rv_in_lu = convert(rv, ru, lu)?;
			Ok((lv + rv_in_lu, lu))
		}
		Expr::Sub(l, r) => {
			let (lv, lu) = eval(l, ctx)?;
			let (rv, ru) = eval(r, ctx)?;
			let rv_in_lu = convert(rv, ru, lu)?;
			Ok((lv - rv_in_lu, lu))
		}
		Expr::Mul(l, r) => {
			let (lv, lu) = eval(l, ctx)?;
			let (rv, ru) = eval(r, ctx)?;
			// Only scalar-times-measurement is supported: one side must be
			// dimensionless.
			match (lu, ru) {
				(Unit::None, _) => Ok((lv * rv, ru)),
				(_, Unit::None) => Ok((lv * rv, lu)),
				_ => Err(WmbusError::Unit {
					from: format!("{lu:?}"),
					to: format!("{ru:?}"),
				}),
			}
		}
		Expr::Div(l, r) => {
			let (lv, lu) = eval(l, ctx)?;
			let (rv, ru) = eval(r, ctx)?;
			match ru {
				Unit::None => Ok((lv / rv, lu)),
				_ if ru == lu => Ok((lv / rv, Unit::None)),
				_ => Err(WmbusError::Unit {
					from: format!("{lu:?}"),
					to: format!("{ru:?}"),
				}),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_simple_addition() {
		let expr = parse_formula("1 kwh + 2 kwh").unwrap();
		let (v, u) = eval(&expr, &HashMap::new()).unwrap();
		assert_eq!(v, 3.0);
		assert_eq!(u, Unit::KWh);
	}

	#[test]
	fn resolves_identifiers_from_context() {
		let mut ctx = HashMap::new();
		ctx.insert("total_energy_consumption_kwh".to_string(), (10.0, Unit::KWh));
		let expr = parse_formula("total_energy_consumption_kwh * 2").unwrap();
		let (v, u) = eval(&expr, &ctx).unwrap();
		assert_eq!(v, 20.0);
		assert_eq!(u, Unit::KWh);
	}

	#[test]
	fn precedence_multiplies_before_adding() {
		let expr = parse_formula("1 + 2 * 3").unwrap();
		let (v, _) = eval(&expr, &HashMap::new()).unwrap();
		assert_eq!(v, 7.0);
	}

	#[test]
	fn mismatched_quantities_fail_on_addition() {
		let expr = parse_formula("1 kwh + 2 m3").unwrap();
		assert!(eval(&expr, &HashMap::new()).is_err());
	}

	#[test]
	fn missing_identifier_propagates_field_error() {
		let expr = parse_formula("missing_field + 1").unwrap();
		assert!(eval(&expr, &HashMap::new()).is_err());
	}
}
