//
// Copyright 2016 The IHEX Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// All files in the project carrying such notice may not be copied, modified, or
// distributed except according to those terms.
//

//! The unified error taxonomy shared by every layer of the crate.

use thiserror::Error;

/// Every fallible operation in the crate returns one of these variants.
///
/// Record- and section-level errors propagate to the immediate caller.
/// The file facade additionally downgrades [`Error::Malformed`] and
/// [`Error::ChecksumMismatch`] to a skipped line when the corresponding
/// tolerance flag in [`crate::file::LoadOptions`] is `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A textual record could not be decoded: bad hex digits, a length
    /// mismatch, or an unrecognized record type.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// The record parsed structurally, but its stored checksum does not
    /// match the checksum computed over its header and data bytes.
    #[error("checksum mismatch: expected {expected:#04X}, found {found:#04X}")]
    ChecksumMismatch { expected: u8, found: u8 },

    /// An absolute address (or address range) falls outside the current
    /// variant's or section's window, or a size argument was zero where
    /// a non-zero size is required.
    #[error("address out of range: {0:#010X}")]
    OutOfRange(u32),

    /// A typed accessor was invoked on a record or section of the wrong
    /// kind (e.g. asking a `Data` record for its segment base).
    #[error("wrong record or section kind: {0}")]
    WrongKind(&'static str),

    /// The operation requires a variant that does not apply to the
    /// receiver, e.g. asking an `I32HEX` group for CS:IP.
    #[error("unsupported for this address variant: {0}")]
    Unsupported(&'static str),

    /// A pushed section or record would overlap an address already
    /// covered by an existing one.
    #[error("intersects existing data at {0:#010X}")]
    Intersect(u32),

    /// The required `I16HEX` segment base would need to wrap past the
    /// 20-bit address space in a way the section cannot represent.
    #[error("segment base {0:#06X} cannot be aligned without wrapping")]
    Runtime(u16),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
