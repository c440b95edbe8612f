// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Error taxonomy for the decoding pipeline.
//!
//! Internal parsing stages (link layer, TPL/ELL, DV parser) raise
//! [`MBusError`] through `winnow`'s `ErrMode`; [`WmbusError`] is the
//! public error surface returned across the crate boundary and mirrors
//! the taxonomy a caller needs to react to (bad framing vs. bad crypto
//! vs. a malformed data record, etc).

use winnow::error::{AddContext, ContextError, ErrorKind, FromExternalError, ParserError, StrContext};
use winnow::stream::Stream;

/// Parse-time error accumulated while walking a telegram with `winnow`.
///
/// This is a thin wrapper around [`ContextError`] so that `.context(...)`
/// labels attached throughout the link/TPL/DV parsers survive into
/// diagnostics, while still being convertible into a [`WmbusError`] at the
/// crate boundary.
#[derive(Debug, Clone, Default)]
pub struct MBusError(ContextError);

impl<I: Stream> ParserError<I> for MBusError {
	type Inner = Self;

	fn from_input(input: &I) -> Self {
		MBusError(ContextError::from_input(input))
	}

	fn into_inner(self) -> Result<Self::Inner, Self> {
		Ok(self)
	}
}

impl<I: Stream, C: Into<StrContext>> AddContext<I, C> for MBusError {
	fn add_context(mut self, input: &I, checkpoint: &<I as Stream>::Checkpoint, context: C) -> Self {
		self.0 = self.0.add_context(input, checkpoint, context);
		self
	}
}

impl<I: Stream, E: std::fmt::Display> FromExternalError<I, E> for MBusError {
	fn from_external_error(input: &I, e: E) -> Self {
		let mut err = ContextError::from_input(input);
		err = err.add_context(
			input,
			&input.checkpoint(),
			StrContext::Label(Box::leak(e.to_string().into_boxed_str())),
		);
		MBusError(err)
	}
}

impl MBusError {
	/// Build an assertion-style failure carrying a fixed message, used for
	/// invariants the wire format is not supposed to be able to violate
	/// (e.g. more than ten DIFE bytes in a row).
	pub fn assert<I: Stream>(input: &I, msg: &'static str) -> winnow::error::ErrMode<Self> {
		let mut err = ContextError::from_input(input);
		err = err.add_context(input, &input.checkpoint(), StrContext::Label(msg));
		winnow::error::ErrMode::Cut(MBusError(err))
	}

	pub fn kind<I: Stream>(input: &I, kind: ErrorKind) -> Self {
		MBusError(ContextError::from_error_kind(input, kind))
	}
}

impl std::fmt::Display for MBusError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl std::error::Error for MBusError {}

pub type MBResult<T> = winnow::PResult<T, MBusError>;

/// The public error taxonomy, matching the categories a caller of the
/// decoding pipeline is expected to branch on.
#[derive(Debug, thiserror::Error)]
pub enum WmbusError {
	/// Bad length, bad CRC, or a truncated frame.
	#[error("framing error: {0}")]
	Framing(String),

	/// Decryption failed: bad key, missing key, or a magic-byte mismatch.
	#[error("authentication/decryption error: {0}")]
	Auth(String),

	/// The DIF/VIF data-record stream was inconsistent.
	#[error("parse error at offset {offset}: {message}")]
	Parse { offset: usize, message: String },

	/// No driver matched the telegram's (manufacturer, media, version).
	#[error("no driver matches manufacturer={mfct:04X} media={media:02X} version={version:02X}")]
	Dispatch { mfct: u16, media: u8, version: u8 },

	/// A non-optional field's matcher found no corresponding data record.
	#[error("required field \"{0}\" not present in telegram")]
	Field(String),

	/// Incompatible quantities were combined in a formula or unit
	/// conversion. This one is a programmer error, not a data error.
	#[error("incompatible quantities: cannot convert {from:?} to {to:?}")]
	Unit { from: String, to: String },

	/// Invalid meter configuration (bad key length, bad id pattern, ...).
	#[error("invalid meter configuration: {0}")]
	Config(String),
}

impl From<winnow::error::ErrMode<MBusError>> for WmbusError {
	fn from(e: winnow::error::ErrMode<MBusError>) -> Self {
		WmbusError::Parse {
			offset: 0,
			message: e.to_string(),
		}
	}
}

pub type Result<T> = std::result::Result<T, WmbusError>;
