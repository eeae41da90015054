//
// Copyright 2016 The IHEX Developers. See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the MIT license <LICENSE-MIT or http://opensource.org/licenses/MIT>.
// All files in the project carrying such notice may not be copied, modified, or
// distributed except according to those terms.
//

//! The load/save adapter over a byte stream: tokenizes to lines, feeds
//! the record parser, and appends to the trailing section or opens a
//! new one.

use log::warn;

use crate::address::AddressVariant;
use crate::error::{Error, Result};
use crate::group::Group;
use crate::record::{Record, RecordKind};
use crate::section::{Section, SectionKind};

/// Tolerance flags controlling [`load_from_bytes`]'s behavior on a
/// malformed line or a checksum mismatch. Both default to `true`
/// (throw), matching §6's documented defaults.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct LoadOptions {
    /// When `false`, a line that fails to parse structurally is skipped
    /// instead of raising [`Error::Malformed`].
    pub throw_on_invalid_record: bool,
    /// When `false`, a line whose checksum disagrees with the computed
    /// one is skipped instead of raising [`Error::ChecksumMismatch`].
    pub throw_on_checksum_mismatch: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions { throw_on_invalid_record: true, throw_on_checksum_mismatch: true }
    }
}

impl LoadOptions {
    /// Equivalent to the conceptual `set_throw_on_invalid_record` setter
    /// from §6, as a builder method.
    pub fn with_throw_on_invalid_record(mut self, value: bool) -> Self {
        self.throw_on_invalid_record = value;
        self
    }

    /// Equivalent to the conceptual `set_throw_on_checksum_mismatch`
    /// setter from §6, as a builder method.
    pub fn with_throw_on_checksum_mismatch(mut self, value: bool) -> Self {
        self.throw_on_checksum_mismatch = value;
        self
    }
}

fn variant_for_extension_kind(kind: RecordKind) -> Option<AddressVariant> {
    match kind {
        RecordKind::ExtendedSegmentAddress | RecordKind::StartSegmentAddress => Some(AddressVariant::I16HEX),
        RecordKind::ExtendedLinearAddress | RecordKind::StartLinearAddress => Some(AddressVariant::I32HEX),
        RecordKind::Data | RecordKind::EndOfFile => None,
    }
}

fn section_for_record(record: Record) -> Result<Section> {
    Section::from_record(record)
}

/// Parses a byte stream into a [`Group`]. Lines are split on `\n`, with a
/// trailing `\r` stripped so both LF and CRLF input are accepted; empty
/// lines are skipped. The group's variant is inferred lazily from the
/// first non-`Data` extension record seen, defaulting to `I8HEX` if none
/// appears.
///
/// Returns `Ok((group, true))` on a fully clean parse. Returns
/// `Ok((group, false))` if at least one line was tolerated (skipped per
/// `options`) rather than raising. Any error not downgraded by `options`
/// surfaces as `Err` and no partial group is returned.
pub fn load_from_bytes(bytes: &[u8], options: &LoadOptions) -> Result<(Group, bool)> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Malformed(format!("input is not valid UTF-8: {}", e)))?;

    let mut variant: Option<AddressVariant> = None;
    let mut sections: Vec<Section> = Vec::new();
    let mut clean = true;

    for raw_line in text.split('\n') {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
        if line.is_empty() {
            continue;
        }

        let record = match Record::from_text(line) {
            Ok(record) => record,
            Err(e) => {
                if options.throw_on_invalid_record {
                    return Err(e);
                }
                warn!("skipping unparseable line: {}", e);
                clean = false;
                continue;
            }
        };

        if !record.is_checksum_valid() {
            if options.throw_on_checksum_mismatch {
                return Err(Error::ChecksumMismatch {
                    expected: record.computed_checksum(),
                    found: record.checksum(),
                });
            }
            warn!("skipping line with checksum mismatch at relative {:#06X}", record.address());
            clean = false;
            continue;
        }

        if variant.is_none() {
            if let Some(inferred) = variant_for_extension_kind(record.kind()) {
                variant = Some(inferred);
            }
        }

        match sections.last_mut() {
            Some(section) if section.can_push_record(&record) => {
                section.push_record(record)?;
            }
            _ => {
                sections.push(section_for_record(record)?);
            }
        }
    }

    let variant = variant.unwrap_or(AddressVariant::I8HEX);
    let mut group = Group::new(variant);
    for section in sections {
        group.push_section(section)?;
    }

    Ok((group, clean))
}

/// Serializes `group` to its canonical textual form: every section's
/// records, in section order then record order, each followed by a
/// single `'\n'` (never `\r\n`).
pub fn save_to_bytes(group: &Group) -> Vec<u8> {
    let mut out = String::new();
    for section in group.sections() {
        for record in section.to_records() {
            out.push_str(&record.to_text());
            out.push('\n');
        }
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    #[test]
    fn test_load_canonical_data_record() {
        let (group, clean) =
            load_from_bytes(b":10010000214601360121470136007EFE09D2190140\n:00000001FF\n", &LoadOptions::default())
                .unwrap();
        assert!(clean);
        assert_eq!(group.variant(), AddressVariant::I8HEX);
        assert_eq!(group.get(0x0100).unwrap(), 0x21);
    }

    #[test]
    fn test_checksum_mismatch_throws_by_default() {
        let result = load_from_bytes(b":10010000214601360121470136007EFE09D2190141\n", &LoadOptions::default());
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_checksum_mismatch_reports_expected_and_found() {
        let result = load_from_bytes(b":10010000214601360121470136007EFE09D2190141\n", &LoadOptions::default());
        assert_eq!(result, Err(Error::ChecksumMismatch { expected: 0x40, found: 0x41 }));
    }

    #[test]
    fn test_checksum_mismatch_tolerated_when_disabled() {
        let options = LoadOptions::default().with_throw_on_checksum_mismatch(false);
        let (group, clean) =
            load_from_bytes(b":10010000214601360121470136007EFE09D2190141\n:00000001FF\n", &options).unwrap();
        assert!(!clean);
        assert!(group.data_map().is_empty());
    }

    #[test]
    fn test_full_i32hex_round_trip() {
        let mut group = Group::new(AddressVariant::I32HEX);
        group.set_range(0x0001_0000, &[0xAA, 0xBB]).unwrap();
        group.push_section(Section::end_of_file()).unwrap();

        let bytes = save_to_bytes(&group);
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            ":020000040001F9\n:02000000AABB99\n:00000001FF\n"
        );

        let (loaded, clean) = load_from_bytes(&bytes, &LoadOptions::default()).unwrap();
        assert!(clean);
        assert_eq!(loaded.data_map(), group.data_map());
    }

    #[test]
    fn test_crlf_accepted() {
        let (group, clean) = load_from_bytes(b":00000001FF\r\n", &LoadOptions::default()).unwrap();
        assert!(clean);
        assert!(group.sections().iter().any(|s| s.kind() == SectionKind::EndOfFile));
    }

    #[test]
    fn test_start_segment_record_parses_through_load() {
        let (group, clean) = load_from_bytes(b":0400000300001234C3\n", &LoadOptions::default()).unwrap();
        assert!(clean);
        assert_eq!(group.variant(), AddressVariant::I16HEX);
        assert_eq!(group.code_segment().unwrap(), 0x0000);
        assert_eq!(group.instruction_pointer().unwrap(), 0x1234);
        assert_eq!(
            group.sections()[0].to_records()[0].kind(),
            RecordKind::StartSegmentAddress
        );
    }

    #[test]
    fn test_empty_lines_skipped() {
        let (group, clean) = load_from_bytes(b"\n\n:00000001FF\n\n", &LoadOptions::default()).unwrap();
        assert!(clean);
        assert_eq!(group.sections().len(), 1);
    }
}
