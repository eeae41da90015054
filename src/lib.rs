//
// Copyright 2016 The IHEX Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// All files in the project carrying such notice may not be copied, modified, or
// distributed except according to those terms.
//

//! # The IHEX Library
//!
//! A Rust library for reading, writing and manipulating Intel HEX (IHEX)
//! object files across the I8HEX, I16HEX and I32HEX address variants. This
//! format is commonly used for representing compiled program code and data
//! to be loaded into a microcontroller, flash memory or ROM.
//!
//! Five layers, leaves first: [`address`] converts between relative and
//! absolute addresses; [`record`] parses and emits single wire-format
//! lines; [`section`] provides byte-addressable access over one
//! address-mode context; [`group`] routes absolute-address operations
//! across an ordered collection of sections; [`file`] loads and saves a
//! whole group from and to a byte stream.

/// The unified error taxonomy shared by every layer of the crate.
pub mod error;

/// Function for computing the IHEX checksum.
pub mod checksum;

/// Conversions between relative record addresses and the absolute
/// address spaces of the three variants.
pub mod address;

/// An Intel HEX record type.
pub mod record;

/// An ordered, non-overlapping collection of records sharing one
/// address-mode context.
pub mod section;

/// An ordered collection of sections sharing one address variant.
pub mod group;

/// The load/save adapter over a byte stream.
pub mod file;

pub use address::{Address, AddressVariant};
pub use error::{Error, Result};
pub use file::{load_from_bytes, save_to_bytes, LoadOptions};
pub use group::Group;
pub use record::{Record, RecordKind};
pub use section::{Section, SectionKind};
