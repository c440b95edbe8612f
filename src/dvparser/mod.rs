// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! The DIF/VIF data-record parser: walks a telegram's application-layer
//! payload into a flat list of [`entry::DvEntry`] the driver's field
//! matchers can query.

pub mod dib;
pub mod entry;
pub mod frame;
pub mod record;
pub mod vib;

pub use entry::{DvEntry, MeasurementType};
pub use frame::Frame;
