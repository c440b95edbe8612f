// Copyright 2024 Lexi Robinson
// Licensed under the EUPL-1.2

//! Transport layer: the CI field and the TPL (Transport Layer) / ELL
//! (Extended Link Layer) header it introduces.

pub mod control_info;
pub mod ell;
pub mod header;

pub use control_info::CICode;
pub use ell::EllHeader;
pub use header::{ApplicationError, DeviceType, MeterStatus, SecurityMode, TPLHeader};
