//
// Copyright 2016 The IHEX Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// All files in the project carrying such notice may not be copied, modified, or
// distributed except according to those terms.
//

//! An ordered collection of sections sharing one address variant, routing
//! absolute-address operations to the right section and creating sections
//! on demand.

use log::debug;

use crate::address::{self, AddressMap, AddressVariant};
use crate::error::{Error, Result};
use crate::record::DEFAULT_HEX_RECORD_DATA_VALUE;
use crate::section::{Section, SectionKind};

/// An ordered collection of [`Section`]s forming one logical Intel HEX
/// file image. See §3/§4.4.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Group {
    variant: AddressVariant,
    sections: Vec<Section>,
    unused_fill: u8,
}

impl Group {
    /// Builds an empty group of the given variant, with the default
    /// unused-data fill value (`0xFF`).
    pub fn new(variant: AddressVariant) -> Self {
        Group { variant, sections: Vec::new(), unused_fill: DEFAULT_HEX_RECORD_DATA_VALUE }
    }

    /// This group's address variant.
    pub fn variant(&self) -> AddressVariant {
        self.variant
    }

    /// The byte value returned by [`Group::get`] for addresses not
    /// covered by any record.
    pub fn unused_fill(&self) -> u8 {
        self.unused_fill
    }

    /// Sets the unused-data fill value.
    pub fn set_unused_fill(&mut self, fill: u8) {
        self.unused_fill = fill;
    }

    /// The number of sections in the group.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Borrows the section at `index`.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// Mutably borrows the section at `index`. Changing a section's kind
    /// or base through this reference can break the group's invariants;
    /// prefer the dedicated group operations where available.
    pub fn section_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_mut(index)
    }

    /// All sections, in order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    fn is_section_kind_compatible(&self, kind: SectionKind) -> bool {
        match self.variant {
            AddressVariant::I8HEX => matches!(kind, SectionKind::DataOnly | SectionKind::EndOfFile),
            AddressVariant::I16HEX => matches!(
                kind,
                SectionKind::ExtendedSegmentAddress
                    | SectionKind::StartSegmentAddress
                    | SectionKind::EndOfFile
            ),
            AddressVariant::I32HEX => matches!(
                kind,
                SectionKind::ExtendedLinearAddress
                    | SectionKind::StartLinearAddress
                    | SectionKind::EndOfFile
            ),
        }
    }

    /// Index of the section covering absolute address `abs`.
    pub fn find_section(&self, abs: u32) -> Option<usize> {
        self.sections.iter().position(|s| address::ranges_intersect(&s.window(), &[(abs, 1)]))
    }

    /// Index of the section immediately before the one covering `abs`,
    /// by section order.
    pub fn find_previous_section(&self, abs: u32) -> Option<usize> {
        let idx = self.find_section(abs)?;
        idx.checked_sub(1)
    }

    /// Index of the section immediately after the one covering `abs`, by
    /// section order.
    pub fn find_next_section(&self, abs: u32) -> Option<usize> {
        let idx = self.find_section(abs)?;
        if idx + 1 < self.sections.len() {
            Some(idx + 1)
        } else {
            None
        }
    }

    /// Index of the first existing section whose window intersects
    /// `section`'s window, if any.
    pub fn check_intersect(&self, section: &Section) -> Option<usize> {
        let window = section.window();
        self.sections.iter().position(|s| address::ranges_intersect(&s.window(), &window))
    }

    fn count_of_kind(&self, kind: SectionKind) -> usize {
        self.sections.iter().filter(|s| s.kind() == kind).count()
    }

    /// Is pushing `section` legal, and if so at what index?
    pub fn can_push_section(&self, section: &Section) -> Option<usize> {
        if !self.is_section_kind_compatible(section.kind()) {
            return None;
        }
        if section.kind() == SectionKind::EndOfFile && self.count_of_kind(SectionKind::EndOfFile) > 0 {
            return None;
        }
        if matches!(section.kind(), SectionKind::StartSegmentAddress | SectionKind::StartLinearAddress)
            && self.count_of_kind(section.kind()) > 0
        {
            return None;
        }
        if self.variant == AddressVariant::I8HEX
            && section.kind() == SectionKind::DataOnly
            && self.count_of_kind(SectionKind::DataOnly) > 0
        {
            return None;
        }
        if self.check_intersect(section).is_some() {
            return None;
        }
        Some(self.default_push_index(section))
    }

    fn default_push_index(&self, section: &Section) -> usize {
        // Start*/EndOfFile sections have no natural ordering key; idiomatic
        // Intel HEX files place Start* just before EndOfFile and EndOfFile
        // last. Data-bearing sections sort by their absolute base.
        match section.kind() {
            SectionKind::EndOfFile => self.sections.len(),
            SectionKind::StartSegmentAddress | SectionKind::StartLinearAddress => {
                match self.sections.iter().position(|s| s.kind() == SectionKind::EndOfFile) {
                    Some(eof_idx) => eof_idx,
                    None => self.sections.len(),
                }
            }
            _ => {
                let key = section.ordering_key();
                self.sections
                    .iter()
                    .position(|s| {
                        !matches!(
                            s.kind(),
                            SectionKind::EndOfFile
                                | SectionKind::StartSegmentAddress
                                | SectionKind::StartLinearAddress
                        ) && s.ordering_key() > key
                    })
                    .unwrap_or_else(|| {
                        self.sections
                            .iter()
                            .position(|s| {
                                matches!(
                                    s.kind(),
                                    SectionKind::EndOfFile
                                        | SectionKind::StartSegmentAddress
                                        | SectionKind::StartLinearAddress
                                )
                            })
                            .unwrap_or(self.sections.len())
                    }),
            }
        }
    }

    /// Pushes `section` into the group at its natural ordering position.
    /// Returns the inserted index.
    pub fn push_section(&mut self, section: Section) -> Result<usize> {
        let index = self
            .can_push_section(&section)
            .ok_or_else(|| Error::Intersect(section.window().first().map(|&(s, _)| s).unwrap_or(0)))?;
        debug!("pushing {:?} section at index {}", section.kind(), index);
        self.sections.insert(index, section);
        Ok(index)
    }

    /// Removes the section at `index`.
    pub fn remove_section(&mut self, index: usize) -> Result<Section> {
        if index >= self.sections.len() {
            return Err(Error::OutOfRange(index as u32));
        }
        Ok(self.sections.remove(index))
    }

    /// Removes every section.
    pub fn clear_sections(&mut self) {
        self.sections.clear();
    }

    /// Locates or creates the section covering `abs`, extending to cover
    /// at least `[abs, abs + size - 1]`. Returns the index of the
    /// section that now covers `abs`.
    pub fn create_section(&mut self, abs: u32, size: u32) -> Result<usize> {
        if size == 0 {
            return Err(Error::OutOfRange(abs));
        }
        if let Some(idx) = self.find_section(abs) {
            return Ok(idx);
        }

        let snapshot = self.sections.clone();
        match self.create_section_inner(abs, size) {
            Ok(idx) => Ok(idx),
            Err(e) => {
                self.sections = snapshot;
                Err(e)
            }
        }
    }

    fn create_section_inner(&mut self, abs: u32, size: u32) -> Result<usize> {
        match self.variant {
            AddressVariant::I8HEX => {
                if (abs as u64) + (size as u64) - 1 > 0xFFFF {
                    return Err(Error::OutOfRange(abs));
                }
                if let Some(idx) = self.sections.iter().position(|s| s.kind() == SectionKind::DataOnly) {
                    return Ok(idx);
                }
                self.push_section(Section::data_only())
            }
            AddressVariant::I16HEX => {
                let last = abs as u64 + size as u64 - 1;
                if last > address::MAX_SEG_ABS as u64 {
                    return Err(Error::OutOfRange(abs));
                }
                let base = address::find_base_extended_segment(abs)?;
                let relative_start = abs - address::base_segment_address(base);
                if relative_start as u64 + size as u64 - 1 > 0xFFFF {
                    // `create_section` only ever builds one section; this
                    // request straddles into the next 0x1000-stepped base,
                    // so no single section can be aligned to start exactly
                    // at `abs` and still cover the whole range.
                    return Err(Error::Runtime(base));
                }
                match self.sections.iter().position(|s| s.kind() == SectionKind::ExtendedSegmentAddress && s.base() == base) {
                    Some(idx) => Ok(idx),
                    None => self.push_section(Section::extended_segment_address(base)),
                }
            }
            AddressVariant::I32HEX => {
                let last = abs as u64 + size as u64 - 1;
                if last > 0xFFFF_FFFF {
                    return Err(Error::OutOfRange(abs));
                }
                let base = address::find_base_extended_linear(abs);
                match self.sections.iter().position(|s| s.kind() == SectionKind::ExtendedLinearAddress && s.base() == base) {
                    Some(idx) => Ok(idx),
                    None => self.push_section(Section::extended_linear_address(base)),
                }
            }
        }
    }

    /// Reads the byte at `abs`.
    pub fn get(&self, abs: u32) -> Result<u8> {
        let idx = self.find_section(abs).ok_or(Error::OutOfRange(abs))?;
        self.sections[idx].get(abs, self.unused_fill)
    }

    /// Writes a single byte at `abs`, creating a section if necessary.
    pub fn set(&mut self, abs: u32, byte: u8) -> Result<()> {
        self.set_range(abs, &[byte])
    }

    /// Writes `bytes` starting at `abs`, splitting across section
    /// boundaries and creating sections as necessary.
    pub fn set_range(&mut self, abs: u32, bytes: &[u8]) -> Result<()> {
        let snapshot = self.sections.clone();
        match self.set_range_inner(abs, bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.sections = snapshot;
                Err(e)
            }
        }
    }

    fn set_range_inner(&mut self, abs: u32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let page = match self.variant {
            AddressVariant::I8HEX => 0x1_0000u64,
            AddressVariant::I16HEX => 0x1_0000u64,
            AddressVariant::I32HEX => 0x1_0000u64,
        };

        let mut offset = 0usize;
        while offset < bytes.len() {
            let current = abs as u64 + offset as u64;
            let page_base = (current / page) * page;
            let remaining_in_page = (page_base + page - current) as usize;
            let chunk_len = remaining_in_page.min(bytes.len() - offset);
            let chunk = &bytes[offset..offset + chunk_len];

            let idx = self.create_section(current as u32, chunk_len as u32)?;
            self.sections[idx].set_range(current as u32, chunk)?;
            offset += chunk_len;
        }
        Ok(())
    }

    /// Fills `count` bytes starting at `abs` with `byte`.
    pub fn fill(&mut self, abs: u32, count: u32, byte: u8) -> Result<()> {
        self.set_range(abs, &vec![byte; count as usize])
    }

    /// Removes a single byte at `abs`.
    pub fn clear_one(&mut self, abs: u32) -> Result<u32> {
        self.clear(abs, 1)
    }

    /// Removes `count` bytes starting at `abs`, across as many sections
    /// as the range spans. Returns the number of bytes actually removed.
    pub fn clear(&mut self, abs: u32, count: u32) -> Result<u32> {
        if count == 0 {
            return Err(Error::OutOfRange(abs));
        }
        let mut removed = 0u32;
        let mut offset = 0u32;
        while offset < count {
            let current = abs + offset;
            let remaining = count - offset;
            match self.find_section(current) {
                Some(idx) => {
                    let window_end = self.sections[idx]
                        .window()
                        .iter()
                        .find(|&&(start, len)| start <= current && current < start + len)
                        .map(|&(start, len)| start + len - 1)
                        .unwrap_or(current);
                    let chunk_len = (window_end - current + 1).min(remaining);
                    removed += self.sections[idx].clear(current, chunk_len)?;
                    offset += chunk_len;
                }
                None => {
                    offset += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Clears every data-bearing section's records without removing the
    /// sections themselves.
    pub fn clear_data(&mut self) {
        for section in &mut self.sections {
            for (start, len) in section.window() {
                let _ = section.clear(start, len);
            }
        }
    }

    /// The union of every section's window, compacted.
    pub fn address_map(&self) -> AddressMap {
        let mut map: AddressMap = self.sections.iter().flat_map(|s| s.window()).collect();
        address::compact(&mut map);
        map
    }

    /// The union of every section's used-data map, compacted.
    pub fn data_map(&self) -> AddressMap {
        let mut map: AddressMap = self.sections.iter().flat_map(|s| s.data_map()).collect();
        address::compact(&mut map);
        map
    }

    fn find_singleton(&self, kind: SectionKind) -> Option<usize> {
        self.sections.iter().position(|s| s.kind() == kind)
    }

    fn require_variant(&self, variant: AddressVariant, what: &'static str) -> Result<()> {
        if self.variant == variant {
            Ok(())
        } else {
            Err(Error::Unsupported(what))
        }
    }

    /// Does this group support a `StartSegmentAddress` section?
    pub fn supports_start_segment_address(&self) -> bool {
        self.variant == AddressVariant::I16HEX
    }

    /// Is a `StartSegmentAddress` section present?
    pub fn has_start_segment_address(&self) -> bool {
        self.find_singleton(SectionKind::StartSegmentAddress).is_some()
    }

    /// The code segment (CS) of the `StartSegmentAddress` section.
    pub fn code_segment(&self) -> Result<u16> {
        self.require_variant(AddressVariant::I16HEX, "code segment requires I16HEX")?;
        let idx = self
            .find_singleton(SectionKind::StartSegmentAddress)
            .ok_or(Error::Unsupported("no StartSegmentAddress section present"))?;
        self.sections[idx].code_segment()
    }

    /// The instruction pointer (IP) of the `StartSegmentAddress` section.
    pub fn instruction_pointer(&self) -> Result<u16> {
        self.require_variant(AddressVariant::I16HEX, "instruction pointer requires I16HEX")?;
        let idx = self
            .find_singleton(SectionKind::StartSegmentAddress)
            .ok_or(Error::Unsupported("no StartSegmentAddress section present"))?;
        self.sections[idx].instruction_pointer()
    }

    /// Sets CS:IP, creating the `StartSegmentAddress` section if needed.
    pub fn set_code_segment_and_instruction_pointer(&mut self, cs: u16, ip: u16) -> Result<()> {
        self.require_variant(AddressVariant::I16HEX, "code segment requires I16HEX")?;
        match self.find_singleton(SectionKind::StartSegmentAddress) {
            Some(idx) => self.sections[idx].set_code_segment_and_instruction_pointer(cs, ip),
            None => {
                self.push_section(Section::start_segment_address(cs, ip))?;
                Ok(())
            }
        }
    }

    /// Does this group support a `StartLinearAddress` section?
    pub fn supports_start_linear_address(&self) -> bool {
        self.variant == AddressVariant::I32HEX
    }

    /// Is a `StartLinearAddress` section present?
    pub fn has_start_linear_address(&self) -> bool {
        self.find_singleton(SectionKind::StartLinearAddress).is_some()
    }

    /// The extended instruction pointer (EIP) of the
    /// `StartLinearAddress` section.
    pub fn extended_instruction_pointer(&self) -> Result<u32> {
        self.require_variant(AddressVariant::I32HEX, "extended instruction pointer requires I32HEX")?;
        let idx = self
            .find_singleton(SectionKind::StartLinearAddress)
            .ok_or(Error::Unsupported("no StartLinearAddress section present"))?;
        self.sections[idx].extended_instruction_pointer()
    }

    /// Sets EIP, creating the `StartLinearAddress` section if needed.
    pub fn set_extended_instruction_pointer(&mut self, eip: u32) -> Result<()> {
        self.require_variant(AddressVariant::I32HEX, "extended instruction pointer requires I32HEX")?;
        match self.find_singleton(SectionKind::StartLinearAddress) {
            Some(idx) => self.sections[idx].set_extended_instruction_pointer(eip),
            None => {
                self.push_section(Section::start_linear_address(eip))?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_i8hex() {
        let mut group = Group::new(AddressVariant::I8HEX);
        group.set(0xFFFF, 0x42).unwrap();
        assert_eq!(group.get(0xFFFF).unwrap(), 0x42);
        assert!(group.set(0x10000, 0x00).is_err());
    }

    #[test]
    fn test_create_section_reuses_existing() {
        let mut group = Group::new(AddressVariant::I32HEX);
        group.set(0x0001_0000, 0xAA).unwrap();
        let idx1 = group.find_section(0x0001_0005).unwrap();
        group.set(0x0001_0010, 0xBB).unwrap();
        let idx2 = group.find_section(0x0001_0010).unwrap();
        assert_eq!(idx1, idx2);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_split_across_64kib_pages() {
        let mut group = Group::new(AddressVariant::I32HEX);
        let bytes = vec![0x5Au8; 100];
        group.set_range(0x0000_FFC0, &bytes).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.sections()[0].base(), 0x0000);
        assert_eq!(group.sections()[1].base(), 0x0001);
        assert_eq!(group.sections()[0].data_records().len(), 1);
        assert_eq!(group.sections()[1].data_records().len(), 1);
    }

    #[test]
    fn test_create_section_straddling_boundary_is_runtime_error() {
        let mut group = Group::new(AddressVariant::I16HEX);
        // [0xFFF8, 0x10007] straddles segment bases 0x0000 and 0x1000; a
        // single section cannot be aligned to start at 0xFFF8 and still
        // cover the whole 16-byte span.
        assert_eq!(group.create_section(0x0000_FFF8, 16), Err(Error::Runtime(0x0000)));
        // The snapshot-and-restore wrapper leaves no partial section behind.
        assert_eq!(group.len(), 0);
    }

    #[test]
    fn test_start_segment_address_helpers() {
        let mut group = Group::new(AddressVariant::I16HEX);
        assert!(group.code_segment().is_err());
        group.set_code_segment_and_instruction_pointer(0x1234, 0x5678).unwrap();
        assert_eq!(group.code_segment().unwrap(), 0x1234);
        assert_eq!(group.instruction_pointer().unwrap(), 0x5678);
    }

    #[test]
    fn test_wrong_variant_start_address_is_unsupported() {
        let group = Group::new(AddressVariant::I32HEX);
        assert_eq!(
            group.code_segment(),
            Err(Error::Unsupported("code segment requires I16HEX"))
        );
    }

    #[test]
    fn test_at_most_one_eof_section() {
        let mut group = Group::new(AddressVariant::I8HEX);
        group.push_section(Section::end_of_file()).unwrap();
        assert!(group.push_section(Section::end_of_file()).is_err());
    }

    #[test]
    fn test_fill_then_clear_restores_data_map() {
        let mut group = Group::new(AddressVariant::I8HEX);
        let before = group.data_map();
        group.fill(0x10, 8, 0xAB).unwrap();
        group.clear(0x10, 8).unwrap();
        assert_eq!(group.data_map(), before);
    }

    #[test]
    fn test_clear_data_empties_every_section_but_keeps_them() {
        let mut group = Group::new(AddressVariant::I32HEX);
        group.set(0x0000_0010, 0xAB).unwrap();
        group.set(0x0001_0020, 0xCD).unwrap();
        assert_eq!(group.len(), 2);
        group.clear_data();
        assert!(group.data_map().is_empty());
        assert_eq!(group.len(), 2);
    }
}
