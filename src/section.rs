//
// Copyright 2016 The IHEX Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// All files in the project carrying such notice may not be copied, modified, or
// distributed except according to those terms.
//

//! An ordered, non-overlapping collection of records sharing one
//! address-mode context, presenting a byte-addressable interface over its
//! 64-KiB window.

use log::trace;

use crate::address::{self, AddressMap, AddressVariant};
use crate::error::{Error, Result};
use crate::record::{Record, RecordKind};

/// Which of the six section shapes a [`Section`] is.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum SectionKind {
    /// Data records with no extension record. Valid only under `I8HEX`.
    DataOnly,
    /// The singleton End-Of-File section.
    EndOfFile,
    /// An `ExtendedSegmentAddress` base plus 0..N data records.
    ExtendedSegmentAddress,
    /// An `ExtendedLinearAddress` base plus 0..N data records.
    ExtendedLinearAddress,
    /// The singleton Start-Segment-Address section (CS:IP).
    StartSegmentAddress,
    /// The singleton Start-Linear-Address section (EIP).
    StartLinearAddress,
}

impl SectionKind {
    fn is_data_bearing(self) -> bool {
        matches!(
            self,
            SectionKind::DataOnly
                | SectionKind::ExtendedSegmentAddress
                | SectionKind::ExtendedLinearAddress
        )
    }

    fn is_singleton(self) -> bool {
        matches!(
            self,
            SectionKind::EndOfFile | SectionKind::StartSegmentAddress | SectionKind::StartLinearAddress
        )
    }
}

/// A contiguous single-base grouping of records sharing one address-mode
/// context. See §3/§4.3 for the full invariant list.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Section {
    kind: SectionKind,
    base: u16,
    singleton: Option<Record>,
    data: Vec<Record>,
}

impl Section {
    /// Builds an empty `DataOnly` section (valid only under `I8HEX`).
    pub fn data_only() -> Self {
        Section { kind: SectionKind::DataOnly, base: 0, singleton: None, data: Vec::new() }
    }

    /// Builds the singleton `EndOfFile` section.
    pub fn end_of_file() -> Self {
        Section {
            kind: SectionKind::EndOfFile,
            base: 0,
            singleton: Some(Record::end_of_file()),
            data: Vec::new(),
        }
    }

    /// Builds an empty `ExtendedSegmentAddress` section with the given base.
    pub fn extended_segment_address(base: u16) -> Self {
        Section { kind: SectionKind::ExtendedSegmentAddress, base, singleton: None, data: Vec::new() }
    }

    /// Builds an empty `ExtendedLinearAddress` section with the given base.
    pub fn extended_linear_address(base: u16) -> Self {
        Section { kind: SectionKind::ExtendedLinearAddress, base, singleton: None, data: Vec::new() }
    }

    /// Builds the singleton `StartSegmentAddress` section from CS:IP.
    pub fn start_segment_address(cs: u16, ip: u16) -> Self {
        Section {
            kind: SectionKind::StartSegmentAddress,
            base: 0,
            singleton: Some(Record::start_segment_address(cs, ip)),
            data: Vec::new(),
        }
    }

    /// Builds the singleton `StartLinearAddress` section from EIP.
    pub fn start_linear_address(eip: u32) -> Self {
        Section {
            kind: SectionKind::StartLinearAddress,
            base: 0,
            singleton: Some(Record::start_linear_address(eip)),
            data: Vec::new(),
        }
    }

    /// Builds a fresh section whose kind and base register (if any)
    /// mirror the given record's kind. A `Data` record produces a
    /// `DataOnly` section containing just that record; an extension
    /// record produces the corresponding base section with no data yet
    /// pushed; a singleton record produces its singleton section.
    pub fn from_record(record: Record) -> Result<Self> {
        match record.kind() {
            RecordKind::Data => {
                let mut section = Section::data_only();
                section.push_record(record)?;
                Ok(section)
            }
            RecordKind::EndOfFile => Ok(Section::end_of_file()),
            RecordKind::ExtendedSegmentAddress => {
                Ok(Section::extended_segment_address(record.extended_segment_address_base()?))
            }
            RecordKind::ExtendedLinearAddress => {
                Ok(Section::extended_linear_address(record.extended_linear_address_base()?))
            }
            RecordKind::StartSegmentAddress => Ok(Section {
                kind: SectionKind::StartSegmentAddress,
                base: 0,
                singleton: Some(record),
                data: Vec::new(),
            }),
            RecordKind::StartLinearAddress => Ok(Section {
                kind: SectionKind::StartLinearAddress,
                base: 0,
                singleton: Some(record),
                data: Vec::new(),
            }),
        }
    }

    /// This section's kind tag.
    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// The base register, meaningful only for `ExtendedSegmentAddress`
    /// and `ExtendedLinearAddress` sections.
    pub fn base(&self) -> u16 {
        self.base
    }

    fn variant(&self) -> Option<AddressVariant> {
        match self.kind {
            SectionKind::DataOnly => Some(AddressVariant::I8HEX),
            SectionKind::ExtendedSegmentAddress | SectionKind::StartSegmentAddress => {
                Some(AddressVariant::I16HEX)
            }
            SectionKind::ExtendedLinearAddress | SectionKind::StartLinearAddress => {
                Some(AddressVariant::I32HEX)
            }
            SectionKind::EndOfFile => None,
        }
    }

    /// The absolute-address window this section reserves, per §4.1. Empty
    /// for the singleton `Start*`/`EndOfFile` kinds.
    pub fn window(&self) -> AddressMap {
        match self.kind {
            SectionKind::DataOnly => address::window(AddressVariant::I8HEX, 0, 0),
            SectionKind::ExtendedSegmentAddress => address::window(AddressVariant::I16HEX, self.base, 0),
            SectionKind::ExtendedLinearAddress => address::window(AddressVariant::I32HEX, 0, self.base),
            SectionKind::EndOfFile | SectionKind::StartSegmentAddress | SectionKind::StartLinearAddress => {
                Vec::new()
            }
        }
    }

    fn to_absolute(&self, relative: u16) -> u32 {
        match self.kind {
            SectionKind::DataOnly => address::absolute_data_record(relative),
            SectionKind::ExtendedSegmentAddress => address::absolute_extended_segment(relative, self.base),
            SectionKind::ExtendedLinearAddress => address::absolute_extended_linear(relative, self.base),
            _ => relative as u32,
        }
    }

    fn to_relative(&self, absolute: u32) -> Result<u16> {
        match self.kind {
            SectionKind::DataOnly => address::relative_data_record(absolute),
            SectionKind::ExtendedSegmentAddress => address::relative_extended_segment(absolute, self.base),
            SectionKind::ExtendedLinearAddress => address::relative_extended_linear(absolute, self.base),
            _ => Err(Error::OutOfRange(absolute)),
        }
    }

    /// Index of the `Data` record covering `abs`, if any.
    pub fn find_address(&self, abs: u32) -> Option<usize> {
        let relative = self.to_relative(abs).ok()?;
        self.data
            .iter()
            .position(|r| relative >= r.address() && relative <= r.last_address())
    }

    /// Index of the nearest `Data` record strictly before `abs`.
    pub fn find_previous_record(&self, abs: u32) -> Option<usize> {
        let relative = self.to_relative(abs).ok()?;
        self.data.iter().rposition(|r| r.last_address() < relative)
    }

    /// Index of the nearest `Data` record strictly after `abs`.
    pub fn find_next_record(&self, abs: u32) -> Option<usize> {
        let relative = self.to_relative(abs).ok()?;
        self.data.iter().position(|r| r.address() > relative)
    }

    /// Does the predicate for [`Section::push_record`] hold without
    /// mutating the section?
    pub fn can_push_record(&self, record: &Record) -> bool {
        if !self.kind.is_data_bearing() || record.kind() != RecordKind::Data {
            return false;
        }
        match self.data.last() {
            None => true,
            Some(last) => record.address() > last.last_address(),
        }
    }

    /// Appends `record` if it is a `Data` record whose interval lies
    /// strictly after the current last record and this section is
    /// data-bearing.
    pub fn push_record(&mut self, record: Record) -> Result<()> {
        if !self.can_push_record(&record) {
            return Err(Error::Intersect(self.to_absolute(record.address())));
        }
        trace!("pushing data record at relative {:#06X}", record.address());
        self.data.push(record);
        Ok(())
    }

    /// Reads the byte at `abs`, or `unused_fill` if the address lies in
    /// the window but is not covered by any record.
    pub fn get(&self, abs: u32, unused_fill: u8) -> Result<u8> {
        let relative = self.to_relative(abs)?;
        match self.find_address(abs) {
            Some(idx) => {
                let record = &self.data[idx];
                Ok(record.data()[(relative - record.address()) as usize])
            }
            None => Ok(unused_fill),
        }
    }

    /// Writes a single byte at `abs`, mutating, extending or creating a
    /// `Data` record as needed (see §4.3).
    pub fn set(&mut self, abs: u32, byte: u8) -> Result<()> {
        self.set_range(abs, &[byte])
    }

    /// Writes `bytes` starting at `abs`. The entire range must fit in
    /// this section's window; splitting across sections is the `Group`'s
    /// responsibility.
    pub fn set_range(&mut self, abs: u32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let start = self.to_relative(abs)?;
        let end_abs = abs as u64 + bytes.len() as u64 - 1;
        let end = self
            .to_relative(end_abs as u32)
            .map_err(|_| Error::OutOfRange(end_abs as u32))?;
        if (end as u32 + 1).wrapping_sub(start as u32) != bytes.len() as u32 {
            // The relative range wraps or is discontiguous: the write
            // does not fit in this section's window without crossing it.
            return Err(Error::OutOfRange(end_abs as u32));
        }

        self.remove_relative_range(start, bytes.len() as u32);

        for chunk_start in (0..bytes.len()).step_by(255) {
            let chunk = &bytes[chunk_start..(chunk_start + 255).min(bytes.len())];
            let record = Record::data(start + chunk_start as u16, chunk)
                .map_err(|_| Error::OutOfRange(abs))?;
            let pos = self
                .data
                .iter()
                .position(|r| r.address() > record.address())
                .unwrap_or(self.data.len());
            self.data.insert(pos, record);
        }

        self.compact();
        Ok(())
    }

    /// Fills `count` bytes starting at `abs` with `byte`.
    pub fn fill(&mut self, abs: u32, count: u32, byte: u8) -> Result<()> {
        if count == 0 {
            return Err(Error::OutOfRange(abs));
        }
        self.set_range(abs, &vec![byte; count as usize])
    }

    /// Removes a single byte at `abs`, splitting, shrinking or deleting
    /// records as needed. Returns the number of bytes actually removed
    /// (0 or 1).
    pub fn clear_one(&mut self, abs: u32) -> Result<u32> {
        self.clear(abs, 1)
    }

    /// Removes `count` bytes starting at `abs`. Returns the number of
    /// bytes that were actually covered by existing records (and thus
    /// removed).
    pub fn clear(&mut self, abs: u32, count: u32) -> Result<u32> {
        if count == 0 {
            return Err(Error::OutOfRange(abs));
        }
        let start = self.to_relative(abs)?;
        let end_abs = abs as u64 + count as u64 - 1;
        let end = self
            .to_relative(end_abs as u32)
            .map_err(|_| Error::OutOfRange(end_abs as u32))?;
        if (end as u32 + 1).wrapping_sub(start as u32) != count {
            return Err(Error::OutOfRange(end_abs as u32));
        }
        Ok(self.remove_relative_range(start, count))
    }

    /// Removes the portion of every record intersecting
    /// `[start, start + len - 1]`, splitting or shrinking as required.
    /// Returns the number of bytes actually removed.
    fn remove_relative_range(&mut self, start: u16, len: u32) -> u32 {
        let end = start as u32 + len - 1;
        let mut removed = 0u32;
        let mut idx = 0;
        while idx < self.data.len() {
            let rec_start = self.data[idx].address() as u32;
            let rec_end = self.data[idx].last_address() as u32;

            if rec_end < start as u32 || rec_start > end {
                idx += 1;
                continue;
            }

            let overlap_start = rec_start.max(start as u32);
            let overlap_end = rec_end.min(end);
            removed += overlap_end - overlap_start + 1;

            if overlap_start <= rec_start && overlap_end >= rec_end {
                // Entire record covered: drop it.
                self.data.remove(idx);
                continue;
            } else if overlap_start <= rec_start {
                // Covered from the start: keep the tail.
                let keep_from = (overlap_end - rec_start + 1) as usize;
                let record = &mut self.data[idx];
                record.data_mut().drain(0..keep_from);
                let new_address = overlap_end as u16 + 1;
                *record = Record::data(new_address, record.data()).expect("shrunk record stays valid");
                idx += 1;
            } else if overlap_end >= rec_end {
                // Covered to the end: keep the head.
                let keep_to = (overlap_start - rec_start) as usize;
                let record = &mut self.data[idx];
                let head = record.data()[..keep_to].to_vec();
                *record = Record::data(rec_start as u16, &head).expect("shrunk record stays valid");
                idx += 1;
            } else {
                // Covered in the middle: split into two records.
                let head = self.data[idx].data()[..(overlap_start - rec_start) as usize].to_vec();
                let tail = self.data[idx].data()[(overlap_end - rec_start + 1) as usize..].to_vec();
                let tail_address = overlap_end as u16 + 1;
                self.data[idx] = Record::data(rec_start as u16, &head).expect("head stays valid");
                let tail_record = Record::data(tail_address, &tail).expect("tail stays valid");
                self.data.insert(idx + 1, tail_record);
                idx += 2;
            }
        }
        removed
    }

    /// Merges every pair of adjacent records where
    /// `a.last_address() + 1 == b.address()` and the combined payload
    /// does not exceed 255 bytes.
    pub fn compact(&mut self) {
        self.data.sort_by_key(|r| r.address());
        let mut idx = 0;
        while idx + 1 < self.data.len() {
            let combined_len = self.data[idx].data().len() + self.data[idx + 1].data().len();
            if self.data[idx].last_address() as u32 + 1 == self.data[idx + 1].address() as u32
                && combined_len <= 255
            {
                let mut merged = self.data[idx].data().to_vec();
                merged.extend_from_slice(self.data[idx + 1].data());
                let address = self.data[idx].address();
                self.data[idx] = Record::data(address, &merged).expect("merged record stays valid");
                self.data.remove(idx + 1);
            } else {
                idx += 1;
            }
        }
    }

    /// The raw, possibly non-merged union of every `Data` record's
    /// absolute `[address, last_address]` span. Empty for non-data-bearing
    /// sections.
    pub fn address_map(&self) -> AddressMap {
        self.data
            .iter()
            .map(|r| (self.to_absolute(r.address()), r.data().len() as u32))
            .collect()
    }

    /// [`Section::address_map`], with adjacent ranges merged.
    pub fn data_map(&self) -> AddressMap {
        let mut map = self.address_map();
        address::compact(&mut map);
        map
    }

    /// The ordered `Data` records (empty for non-data-bearing sections).
    pub fn data_records(&self) -> &[Record] {
        &self.data
    }

    /// The singleton record, for `EndOfFile`/`StartSegmentAddress`/
    /// `StartLinearAddress` sections.
    pub fn singleton(&self) -> Option<&Record> {
        self.singleton.as_ref()
    }

    fn require_kind(&self, kind: SectionKind, what: &'static str) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(Error::WrongKind(what))
        }
    }

    /// CS:IP accessors for a `StartSegmentAddress` section.
    pub fn code_segment(&self) -> Result<u16> {
        self.require_kind(SectionKind::StartSegmentAddress, "StartSegmentAddress")?;
        self.singleton.as_ref().unwrap().start_segment_address_code_segment()
    }

    pub fn instruction_pointer(&self) -> Result<u16> {
        self.require_kind(SectionKind::StartSegmentAddress, "StartSegmentAddress")?;
        self.singleton.as_ref().unwrap().instruction_pointer()
    }

    pub fn set_code_segment_and_instruction_pointer(&mut self, cs: u16, ip: u16) -> Result<()> {
        self.require_kind(SectionKind::StartSegmentAddress, "StartSegmentAddress")?;
        self.singleton.as_mut().unwrap().set_start_segment_address(cs, ip)
    }

    /// EIP accessor for a `StartLinearAddress` section.
    pub fn extended_instruction_pointer(&self) -> Result<u32> {
        self.require_kind(SectionKind::StartLinearAddress, "StartLinearAddress")?;
        self.singleton.as_ref().unwrap().extended_instruction_pointer()
    }

    pub fn set_extended_instruction_pointer(&mut self, eip: u32) -> Result<()> {
        self.require_kind(SectionKind::StartLinearAddress, "StartLinearAddress")?;
        self.singleton.as_mut().unwrap().set_extended_instruction_pointer(eip)
    }

    /// Reshapes the section into the given kind, discarding any data or
    /// singleton content incompatible with the new shape.
    pub fn convert_to(&self, kind: SectionKind) -> Section {
        match kind {
            SectionKind::DataOnly => Section { kind, base: 0, singleton: None, data: self.data.clone() },
            SectionKind::ExtendedSegmentAddress => {
                Section { kind, base: self.base, singleton: None, data: self.data.clone() }
            }
            SectionKind::ExtendedLinearAddress => {
                Section { kind, base: self.base, singleton: None, data: self.data.clone() }
            }
            SectionKind::EndOfFile => Section::end_of_file(),
            SectionKind::StartSegmentAddress => Section::start_segment_address(0, 0),
            SectionKind::StartLinearAddress => Section::start_linear_address(0),
        }
    }

    /// Convenience wrapper for [`Section::convert_to`] targeting
    /// `DataOnly`.
    pub fn convert_to_data_only(&self) -> Section {
        self.convert_to(SectionKind::DataOnly)
    }

    /// Convenience wrapper for [`Section::convert_to`] targeting
    /// `ExtendedSegmentAddress` with the given base.
    pub fn convert_to_extended_segment_address(&self, base: u16) -> Section {
        let mut section = self.convert_to(SectionKind::ExtendedSegmentAddress);
        section.base = base;
        section
    }

    /// Convenience wrapper for [`Section::convert_to`] targeting
    /// `ExtendedLinearAddress` with the given base.
    pub fn convert_to_extended_linear_address(&self, base: u16) -> Section {
        let mut section = self.convert_to(SectionKind::ExtendedLinearAddress);
        section.base = base;
        section
    }

    /// Convenience wrapper for [`Section::convert_to`] targeting
    /// `StartSegmentAddress`.
    pub fn convert_to_start_segment_address(&self, cs: u16, ip: u16) -> Section {
        Section::start_segment_address(cs, ip)
    }

    /// Convenience wrapper for [`Section::convert_to`] targeting
    /// `StartLinearAddress`.
    pub fn convert_to_start_linear_address(&self, eip: u32) -> Section {
        Section::start_linear_address(eip)
    }

    /// Emits this section's records in canonical order: the extension
    /// record first (if this section carries a base register), then all
    /// data records in address order; or the singleton record alone.
    pub fn to_records(&self) -> Vec<Record> {
        match self.kind {
            SectionKind::DataOnly => self.data.clone(),
            SectionKind::ExtendedSegmentAddress => {
                let mut records = vec![Record::extended_segment_address(self.base)];
                records.extend(self.data.iter().cloned());
                records
            }
            SectionKind::ExtendedLinearAddress => {
                let mut records = vec![Record::extended_linear_address(self.base)];
                records.extend(self.data.iter().cloned());
                records
            }
            SectionKind::EndOfFile | SectionKind::StartSegmentAddress | SectionKind::StartLinearAddress => {
                vec![self.singleton.clone().expect("singleton section always carries its record")]
            }
        }
    }

    /// The natural ordering key used when a group inserts this section:
    /// its absolute base address, or `0` for the singleton kinds (whose
    /// relative order among themselves is insertion order).
    pub fn ordering_key(&self) -> u32 {
        match self.kind {
            SectionKind::DataOnly => 0,
            SectionKind::ExtendedSegmentAddress => address::base_segment_address(self.base),
            SectionKind::ExtendedLinearAddress => address::base_linear_address(self.base),
            SectionKind::EndOfFile | SectionKind::StartSegmentAddress | SectionKind::StartLinearAddress => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_round_trip() {
        let mut section = Section::data_only();
        section.set(0x000F, 0x12).unwrap();
        assert_eq!(section.get(0x000F, 0xFF).unwrap(), 0x12);
        assert_eq!(section.get(0x0010, 0xFF).unwrap(), 0xFF);
    }

    #[test]
    fn test_set_range_creates_single_merged_record() {
        let mut section = Section::data_only();
        let bytes: Vec<u8> = (0..17).collect();
        section.set_range(0x000F, &bytes).unwrap();
        assert_eq!(section.data_records().len(), 1);
        assert_eq!(section.data_records()[0].data().len(), 17);
    }

    #[test]
    fn test_fill_then_clear_restores_data_map() {
        let mut section = Section::data_only();
        let before = section.data_map();
        section.fill(0x0010, 8, 0xAB).unwrap();
        section.clear(0x0010, 8).unwrap();
        assert_eq!(section.data_map(), before);
    }

    #[test]
    fn test_clear_splits_record() {
        let mut section = Section::data_only();
        section.set_range(0, &[1, 2, 3, 4, 5]).unwrap();
        let removed = section.clear(2, 1).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(section.data_records().len(), 2);
        assert_eq!(section.get(0, 0).unwrap(), 1);
        assert_eq!(section.get(1, 0).unwrap(), 2);
        assert_eq!(section.get(3, 0).unwrap(), 4);
        assert_eq!(section.get(4, 0).unwrap(), 5);
    }

    #[test]
    fn test_segment_wraparound_byte_access() {
        let mut section = Section::extended_segment_address(0xFFFF);
        section.set(0x00005, 0x12).unwrap();
        assert_eq!(section.get(0x00005, 0xFF).unwrap(), 0x12);
        assert_eq!(section.get(0xFFFFF, 0xFF).unwrap(), 0xFF);
    }

    #[test]
    fn test_push_record_rejects_overlap() {
        let mut section = Section::data_only();
        section.push_record(Record::data(0, &[1, 2]).unwrap()).unwrap();
        assert!(section.push_record(Record::data(1, &[3]).unwrap()).is_err());
        assert!(section.push_record(Record::data(2, &[3]).unwrap()).is_ok());
    }

    #[test]
    fn test_to_records_emits_base_first() {
        let mut section = Section::extended_linear_address(0x0001);
        section.push_record(Record::data(0, &[0xAA, 0xBB]).unwrap()).unwrap();
        let records = section.to_records();
        assert_eq!(records[0].kind(), RecordKind::ExtendedLinearAddress);
        assert_eq!(records[1].kind(), RecordKind::Data);
    }
}
