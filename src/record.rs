//
// Copyright 2016 The IHEX Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// All files in the project carrying such notice may not be copied, modified, or
// distributed except according to those terms.
//

//! One line of the Intel HEX wire format: a typed, size-bounded byte
//! payload with a 16-bit relative address and an 8-bit checksum.

use hex_simd::AsciiCase;

use crate::checksum::checksum;
use crate::error::{Error, Result};

/// Pads newly-grown record data, matching the source's
/// `DEFAULT_HEX_RECORD_DATA_VALUE`.
pub const DEFAULT_HEX_RECORD_DATA_VALUE: u8 = 0xFF;

/// Default payload size new `Data` records are built with when a caller
/// does not specify one (used by higher layers, not by [`Record`] itself).
pub const DEFAULT_HEX_RECORD_DATA_SIZE: usize = 0x10;

pub mod types {
    /// Type specifier for a Data record.
    pub const DATA: u8 = 0x00;
    /// Type specifier for an End-Of-File record.
    pub const END_OF_FILE: u8 = 0x01;
    /// Type specifier for an Extended Segment Address record.
    pub const EXTENDED_SEGMENT_ADDRESS: u8 = 0x02;
    /// Type specifier for a Start Segment Address record.
    pub const START_SEGMENT_ADDRESS: u8 = 0x03;
    /// Type specifier for an Extended Linear Address record.
    pub const EXTENDED_LINEAR_ADDRESS: u8 = 0x04;
    /// Type specifier for a Start Linear Address record.
    pub const START_LINEAR_ADDRESS: u8 = 0x05;
}

/// The tag discriminating the six legal record shapes.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum RecordKind {
    Data,
    EndOfFile,
    ExtendedSegmentAddress,
    StartSegmentAddress,
    ExtendedLinearAddress,
    StartLinearAddress,
}

impl RecordKind {
    /// The wire-format type specifier for this kind.
    pub fn type_specifier(self) -> u8 {
        match self {
            RecordKind::Data => types::DATA,
            RecordKind::EndOfFile => types::END_OF_FILE,
            RecordKind::ExtendedSegmentAddress => types::EXTENDED_SEGMENT_ADDRESS,
            RecordKind::StartSegmentAddress => types::START_SEGMENT_ADDRESS,
            RecordKind::ExtendedLinearAddress => types::EXTENDED_LINEAR_ADDRESS,
            RecordKind::StartLinearAddress => types::START_LINEAR_ADDRESS,
        }
    }

    fn from_type_specifier(specifier: u8) -> Option<Self> {
        match specifier {
            types::DATA => Some(RecordKind::Data),
            types::END_OF_FILE => Some(RecordKind::EndOfFile),
            types::EXTENDED_SEGMENT_ADDRESS => Some(RecordKind::ExtendedSegmentAddress),
            types::START_SEGMENT_ADDRESS => Some(RecordKind::StartSegmentAddress),
            types::EXTENDED_LINEAR_ADDRESS => Some(RecordKind::ExtendedLinearAddress),
            types::START_LINEAR_ADDRESS => Some(RecordKind::StartLinearAddress),
            _ => None,
        }
    }
}

/// One Intel HEX record: `{ address, kind, data, checksum }`.
///
/// Construct with the `Record::data`/`Record::end_of_file`/... factories,
/// which always recompute the checksum, or with the `prepare_*` family for
/// constructing deliberately invalid records (checksum `0` means
/// "recalculate"; any other value is stored verbatim — useful for
/// round-trip testing of malformed input).
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Record {
    address: u16,
    kind: RecordKind,
    data: Vec<u8>,
    checksum: u8,
}

impl Record {
    /// The relative (16-bit) address field.
    pub fn address(&self) -> u16 {
        self.address
    }

    /// The record's kind tag.
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// The raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the payload for callers (the section layer) that
    /// maintain the checksum invariant themselves afterward.
    pub(crate) fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    /// The last relative address covered by a `Data` record's payload.
    /// Only meaningful for `RecordKind::Data`.
    pub(crate) fn last_address(&self) -> u16 {
        let len = self.data.len() as u32;
        (self.address as u32 + len.saturating_sub(1)) as u16
    }

    /// The stored checksum byte.
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    fn checksum_for(address: u16, kind: RecordKind, data: &[u8]) -> u8 {
        let mut region = Vec::with_capacity(4 + data.len());
        region.push(data.len() as u8);
        region.push((address >> 8) as u8);
        region.push((address & 0xFF) as u8);
        region.push(kind.type_specifier());
        region.extend_from_slice(data);
        checksum(&region)
    }

    /// The checksum that [`Record::update_checksum`] would store: the
    /// two's-complement sum over the current header and data, regardless
    /// of what [`Record::checksum`] currently holds.
    pub fn computed_checksum(&self) -> u8 {
        Self::checksum_for(self.address, self.kind, &self.data)
    }

    /// Recomputes and stores the checksum for the current header and data.
    pub fn update_checksum(&mut self) {
        self.checksum = self.computed_checksum();
    }

    /// Does the stored checksum match the one computed from the current
    /// header and data?
    pub fn is_checksum_valid(&self) -> bool {
        self.checksum == self.computed_checksum()
    }

    /// Checks the `(kind, |data|, address)` triple against the structural
    /// invariants of §3: it does not inspect the checksum (see
    /// [`Record::is_checksum_valid`]).
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            RecordKind::Data => {
                if self.data.is_empty() || self.data.len() > 255 {
                    return Err(Error::Malformed(format!(
                        "data record payload length {} out of range 1..=255",
                        self.data.len()
                    )));
                }
                if (self.address as u32) + (self.data.len() as u32) - 1 > 0xFFFF {
                    return Err(Error::Malformed(format!(
                        "data record at {:#06X} with length {} wraps past 0xFFFF",
                        self.address,
                        self.data.len()
                    )));
                }
            }
            RecordKind::EndOfFile => {
                if !self.data.is_empty() || self.address != 0 {
                    return Err(Error::Malformed(
                        "end-of-file record must have no data and address 0".into(),
                    ));
                }
            }
            RecordKind::ExtendedSegmentAddress | RecordKind::ExtendedLinearAddress => {
                if self.data.len() != 2 {
                    return Err(Error::Malformed(format!(
                        "extended address record must have 2 data bytes, found {}",
                        self.data.len()
                    )));
                }
            }
            RecordKind::StartSegmentAddress | RecordKind::StartLinearAddress => {
                if self.data.len() != 4 || self.address != 0 {
                    return Err(Error::Malformed(
                        "start address record must have 4 data bytes and address 0".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn new_validated(
        address: u16,
        kind: RecordKind,
        data: Vec<u8>,
        checksum: u8,
    ) -> Result<Self> {
        let mut record = Record { address, kind, data, checksum };
        record.validate()?;
        if checksum == 0 {
            record.update_checksum();
        }
        Ok(record)
    }

    /// Constructs a record with an explicit checksum: `0` recalculates,
    /// any other value is stored verbatim. Intended for constructing
    /// deliberately invalid records for round-trip testing; production
    /// code should use the `Record::data`/... factories instead.
    pub fn prepare(address: u16, kind: RecordKind, data: Vec<u8>, checksum: u8) -> Result<Self> {
        Self::new_validated(address, kind, data, checksum)
    }

    /// Builds a `Data` record, always recomputing the checksum.
    pub fn data(address: u16, bytes: &[u8]) -> Result<Self> {
        Self::new_validated(address, RecordKind::Data, bytes.to_vec(), 0)
    }

    /// Builds the singleton `EndOfFile` record.
    pub fn end_of_file() -> Self {
        Self::new_validated(0, RecordKind::EndOfFile, Vec::new(), 0)
            .expect("end-of-file record is always valid")
    }

    /// Builds an `ExtendedSegmentAddress` record for the given base.
    pub fn extended_segment_address(base: u16) -> Self {
        let data = vec![(base >> 8) as u8, (base & 0xFF) as u8];
        Self::new_validated(0, RecordKind::ExtendedSegmentAddress, data, 0)
            .expect("extended segment address record is always valid")
    }

    /// Builds a `StartSegmentAddress` record from CS:IP.
    pub fn start_segment_address(cs: u16, ip: u16) -> Self {
        let data = vec![
            (cs >> 8) as u8,
            (cs & 0xFF) as u8,
            (ip >> 8) as u8,
            (ip & 0xFF) as u8,
        ];
        Self::new_validated(0, RecordKind::StartSegmentAddress, data, 0)
            .expect("start segment address record is always valid")
    }

    /// Builds an `ExtendedLinearAddress` record for the given base.
    pub fn extended_linear_address(base: u16) -> Self {
        let data = vec![(base >> 8) as u8, (base & 0xFF) as u8];
        Self::new_validated(0, RecordKind::ExtendedLinearAddress, data, 0)
            .expect("extended linear address record is always valid")
    }

    /// Builds a `StartLinearAddress` record from EIP.
    pub fn start_linear_address(eip: u32) -> Self {
        let data = vec![
            (eip >> 24) as u8,
            (eip >> 16) as u8,
            (eip >> 8) as u8,
            eip as u8,
        ];
        Self::new_validated(0, RecordKind::StartLinearAddress, data, 0)
            .expect("start linear address record is always valid")
    }

    fn require_kind(&self, kind: RecordKind, what: &'static str) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(Error::WrongKind(what))
        }
    }

    /// The 16-bit segment base carried by an `ExtendedSegmentAddress` record.
    pub fn extended_segment_address_base(&self) -> Result<u16> {
        self.require_kind(RecordKind::ExtendedSegmentAddress, "ExtendedSegmentAddress")?;
        Ok(((self.data[0] as u16) << 8) | self.data[1] as u16)
    }

    /// Sets the 16-bit segment base and recomputes the checksum.
    pub fn set_extended_segment_address_base(&mut self, base: u16) -> Result<()> {
        self.require_kind(RecordKind::ExtendedSegmentAddress, "ExtendedSegmentAddress")?;
        self.data[0] = (base >> 8) as u8;
        self.data[1] = (base & 0xFF) as u8;
        self.update_checksum();
        Ok(())
    }

    /// The code segment (CS) carried by a `StartSegmentAddress` record.
    pub fn start_segment_address_code_segment(&self) -> Result<u16> {
        self.require_kind(RecordKind::StartSegmentAddress, "StartSegmentAddress")?;
        Ok(((self.data[0] as u16) << 8) | self.data[1] as u16)
    }

    /// The instruction pointer (IP) carried by a `StartSegmentAddress` record.
    pub fn instruction_pointer(&self) -> Result<u16> {
        self.require_kind(RecordKind::StartSegmentAddress, "StartSegmentAddress")?;
        Ok(((self.data[2] as u16) << 8) | self.data[3] as u16)
    }

    /// Sets CS:IP and recomputes the checksum.
    pub fn set_start_segment_address(&mut self, cs: u16, ip: u16) -> Result<()> {
        self.require_kind(RecordKind::StartSegmentAddress, "StartSegmentAddress")?;
        self.data[0] = (cs >> 8) as u8;
        self.data[1] = (cs & 0xFF) as u8;
        self.data[2] = (ip >> 8) as u8;
        self.data[3] = (ip & 0xFF) as u8;
        self.update_checksum();
        Ok(())
    }

    /// The 16-bit linear base carried by an `ExtendedLinearAddress` record.
    pub fn extended_linear_address_base(&self) -> Result<u16> {
        self.require_kind(RecordKind::ExtendedLinearAddress, "ExtendedLinearAddress")?;
        Ok(((self.data[0] as u16) << 8) | self.data[1] as u16)
    }

    /// Sets the 16-bit linear base and recomputes the checksum.
    pub fn set_extended_linear_address_base(&mut self, base: u16) -> Result<()> {
        self.require_kind(RecordKind::ExtendedLinearAddress, "ExtendedLinearAddress")?;
        self.data[0] = (base >> 8) as u8;
        self.data[1] = (base & 0xFF) as u8;
        self.update_checksum();
        Ok(())
    }

    /// The extended instruction pointer (EIP) carried by a
    /// `StartLinearAddress` record.
    pub fn extended_instruction_pointer(&self) -> Result<u32> {
        self.require_kind(RecordKind::StartLinearAddress, "StartLinearAddress")?;
        Ok(((self.data[0] as u32) << 24)
            | ((self.data[1] as u32) << 16)
            | ((self.data[2] as u32) << 8)
            | self.data[3] as u32)
    }

    /// Sets EIP and recomputes the checksum.
    pub fn set_extended_instruction_pointer(&mut self, eip: u32) -> Result<()> {
        self.require_kind(RecordKind::StartLinearAddress, "StartLinearAddress")?;
        self.data[0] = (eip >> 24) as u8;
        self.data[1] = (eip >> 16) as u8;
        self.data[2] = (eip >> 8) as u8;
        self.data[3] = eip as u8;
        self.update_checksum();
        Ok(())
    }

    /// Grows or shrinks a `Data` record's payload in place. Growing pads
    /// with [`DEFAULT_HEX_RECORD_DATA_VALUE`]; shrinking truncates. The
    /// checksum is recomputed afterward.
    pub fn set_data_size(&mut self, new_len: usize) -> Result<()> {
        self.require_kind(RecordKind::Data, "Data")?;
        if new_len == 0 || new_len > 255 {
            return Err(Error::OutOfRange(new_len as u32));
        }
        if (self.address as u32) + (new_len as u32) - 1 > 0xFFFF {
            return Err(Error::OutOfRange(self.address as u32 + new_len as u32 - 1));
        }
        self.data.resize(new_len, DEFAULT_HEX_RECORD_DATA_VALUE);
        self.update_checksum();
        Ok(())
    }

    /// Parses a single line of text (without its trailing newline) into a
    /// `Record`. Both `\n`- and `\r\n`-terminated input are accepted by
    /// the caller stripping the `\r` before calling this; this function
    /// itself expects a bare line starting with `':'`.
    ///
    /// Parsing does not itself reject a bad checksum; inspect
    /// [`Record::is_checksum_valid`] for that, or rely on
    /// [`crate::file::load_from_bytes`] to enforce it per
    /// [`crate::file::LoadOptions`].
    pub fn from_text(line: &str) -> Result<Self> {
        let rest = line
            .strip_prefix(':')
            .ok_or_else(|| Error::Malformed("record does not start with ':'".into()))?;

        let bytes = hex_simd::decode_to_vec(rest.as_bytes())
            .map_err(|e| Error::Malformed(format!("invalid hex digits: {}", e)))?;

        if bytes.len() < 5 {
            return Err(Error::Malformed(format!(
                "record too short: {} bytes, need at least 5",
                bytes.len()
            )));
        }

        let length = bytes[0];
        let address = ((bytes[1] as u16) << 8) | bytes[2] as u16;
        let kind_specifier = bytes[3];
        let payload = &bytes[4..bytes.len() - 1];
        let stored_checksum = bytes[bytes.len() - 1];

        if payload.len() != length as usize {
            return Err(Error::Malformed(format!(
                "declared length {} does not match payload of {} bytes",
                length,
                payload.len()
            )));
        }

        let kind = RecordKind::from_type_specifier(kind_specifier)
            .ok_or_else(|| Error::Malformed(format!("unrecognized record type {:#04X}", kind_specifier)))?;

        Record::prepare(address, kind, payload.to_vec(), stored_checksum)
            .map_err(|_| Error::Malformed(format!(
                "record of kind {:?} has an invalid (address, length) combination",
                kind
            )))
    }

    /// Emits the canonical textual representation: `:` followed by
    /// uppercase hex, fixed field widths, no separators.
    pub fn to_text(&self) -> String {
        let mut region = Vec::with_capacity(4 + self.data.len() + 1);
        region.push(self.data.len() as u8);
        region.push((self.address >> 8) as u8);
        region.push((self.address & 0xFF) as u8);
        region.push(self.kind.type_specifier());
        region.extend_from_slice(&self.data);
        region.push(self.checksum);

        let mut text = String::with_capacity(1 + region.len() * 2);
        text.push(':');
        text.push_str(&hex_simd::encode_to_string(&region, AsciiCase::Upper));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_type_specifier() {
        assert_eq!(RecordKind::Data.type_specifier(), 0x00);
        assert_eq!(RecordKind::EndOfFile.type_specifier(), 0x01);
        assert_eq!(RecordKind::ExtendedSegmentAddress.type_specifier(), 0x02);
        assert_eq!(RecordKind::StartSegmentAddress.type_specifier(), 0x03);
        assert_eq!(RecordKind::ExtendedLinearAddress.type_specifier(), 0x04);
        assert_eq!(RecordKind::StartLinearAddress.type_specifier(), 0x05);
    }

    #[test]
    fn test_parse_canonical_data_record() {
        let record =
            Record::from_text(":10010000214601360121470136007EFE09D2190140").unwrap();
        assert_eq!(record.kind(), RecordKind::Data);
        assert_eq!(record.address(), 0x0100);
        assert_eq!(record.data().len(), 16);
        assert!(record.is_checksum_valid());
    }

    #[test]
    fn test_checksum_mismatch_parses_structurally() {
        let record =
            Record::from_text(":10010000214601360121470136007EFE09D2190141").unwrap();
        assert!(!record.is_checksum_valid());
        assert_eq!(record.computed_checksum(), 0x40);
        assert_eq!(record.checksum(), 0x41);
    }

    #[test]
    fn test_start_segment_address_accessors() {
        let record = Record::from_text(":0400000300001234C3").unwrap();
        assert_eq!(record.start_segment_address_code_segment().unwrap(), 0x0000);
        assert_eq!(record.instruction_pointer().unwrap(), 0x1234);
    }

    #[test]
    fn test_wrong_kind_accessor_fails() {
        let record = Record::data(0, &[1, 2, 3]).unwrap();
        assert_eq!(
            record.extended_segment_address_base(),
            Err(Error::WrongKind("ExtendedSegmentAddress"))
        );
    }

    #[test]
    fn test_to_text_round_trip() {
        let record = Record::data(0x0010, b"address gap").unwrap();
        let text = record.to_text();
        let parsed = Record::from_text(&text).unwrap();
        assert_eq!(record, parsed);
    }

    #[test]
    fn test_set_data_size_pads_with_default_value() {
        let mut record = Record::data(0x000F, &[1, 2, 3]).unwrap();
        record.set_data_size(5).unwrap();
        assert_eq!(record.data(), &[1, 2, 3, 0xFF, 0xFF]);
        assert!(record.is_checksum_valid());
    }

    #[test]
    fn test_set_data_size_truncates() {
        let mut record = Record::data(0x0000, &[1, 2, 3, 4, 5]).unwrap();
        record.set_data_size(2).unwrap();
        assert_eq!(record.data(), &[1, 2]);
    }

    #[test]
    fn test_data_record_wrap_rejected() {
        assert!(Record::data(0xFFFF, &[1, 2]).is_err());
    }

    #[test]
    fn test_prepare_zero_checksum_recomputes() {
        let record = Record::prepare(0, RecordKind::EndOfFile, Vec::new(), 0).unwrap();
        assert!(record.is_checksum_valid());
        assert_eq!(record.checksum(), 0xFF);
    }

    #[test]
    fn test_prepare_nonzero_checksum_stored_verbatim() {
        let record = Record::prepare(0, RecordKind::EndOfFile, Vec::new(), 0x42).unwrap();
        assert_eq!(record.checksum(), 0x42);
        assert!(!record.is_checksum_valid());
    }
}
