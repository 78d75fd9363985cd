//! Types related to the _Service Description Table_, and its per-channel rewriter.
//!
//! The generated SDT lists only the channel's own service, and keeps only those of the service's
//! descriptors which a receiver needs in order to present it.

use crate::channel::Channel;
use crate::descriptor::{self, tag, DescriptorIter, DvbDescriptors, RawDescriptor};
use crate::error::{RewriteError, SdtError};
use crate::packet::Pid;
use crate::psi::{CurrentNext, Rewritten, Section, SectionCollector, SectionWriter, TableState};
use fixedbitset::FixedBitSet;
use log::{debug, trace, warn};
use std::fmt;

/// The table_id of the SDT describing the actual transport stream
pub const TABLE_ID: u8 = 0x42;

/// Descriptors copied into a generated SDT; any other tag is dropped.
pub const SDT_ALLOWED_TAGS: [u8; 7] = [
    tag::BOUQUET_NAME,
    tag::SERVICE,
    tag::COMPONENT,
    tag::MOSAIC,
    tag::CA_IDENTIFIER,
    tag::MULTILINGUAL_SERVICE_NAME,
    tag::ANNOUNCEMENT_SUPPORT,
];

/// The payload of a Service Description Section, following the 8 byte section header.
pub struct SdtSection<'buf> {
    data: &'buf [u8],
}

impl<'buf> SdtSection<'buf> {
    /// `original_network_id` plus a reserved byte, which with the section header make up the
    /// 11 byte SDT header
    pub const HEADER_SIZE: usize = 3;

    pub fn from_bytes(data: &'buf [u8]) -> Result<SdtSection<'buf>, RewriteError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(RewriteError::Malformed("SDT too short for header"));
        }
        Ok(SdtSection { data })
    }

    pub fn original_network_id(&self) -> u16 {
        u16::from(self.data[0]) << 8 | u16::from(self.data[1])
    }

    /// Iterates over the services listed.  Iteration stops, with a warning, at an entry whose
    /// `descriptors_loop_length` overruns the section.
    pub fn services(&self) -> impl Iterator<Item = ServiceEntry<'buf>> {
        ServiceIter {
            buf: &self.data[Self::HEADER_SIZE..],
        }
    }
}

impl<'buf> fmt::Debug for SdtSection<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("SdtSection")
            .field("original_network_id", &self.original_network_id())
            .field("services", &self.services().collect::<Vec<_>>())
            .finish()
    }
}

struct ServiceIter<'buf> {
    buf: &'buf [u8],
}

impl<'buf> Iterator for ServiceIter<'buf> {
    type Item = ServiceEntry<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        match ServiceEntry::from_bytes(self.buf) {
            Some((entry, len)) => {
                self.buf = &self.buf[len..];
                Some(entry)
            }
            None => {
                self.buf = &self.buf[0..0];
                None
            }
        }
    }
}

/// One service listed in the SDT.
pub struct ServiceEntry<'buf> {
    data: &'buf [u8],
}

impl<'buf> ServiceEntry<'buf> {
    pub const HEADER_SIZE: usize = 5;

    fn from_bytes(data: &'buf [u8]) -> Option<(ServiceEntry<'buf>, usize)> {
        if data.len() < Self::HEADER_SIZE {
            warn!(
                "only {} bytes remaining for SDT service entry, at least {} required",
                data.len(),
                Self::HEADER_SIZE
            );
            return None;
        }
        let loop_length = (u16::from(data[3] & 0b0000_1111) << 8 | u16::from(data[4])) as usize;
        let end = Self::HEADER_SIZE + loop_length;
        if end > data.len() {
            warn!(
                "SDT service entry needs {} bytes, but only {} remain",
                end,
                data.len()
            );
            return None;
        }
        Some((ServiceEntry { data: &data[..end] }, end))
    }

    pub fn service_id(&self) -> u16 {
        u16::from(self.data[0]) << 8 | u16::from(self.data[1])
    }
    pub fn eit_schedule_flag(&self) -> bool {
        self.data[2] & 0b10 != 0
    }
    pub fn eit_present_following_flag(&self) -> bool {
        self.data[2] & 0b01 != 0
    }
    pub fn running_status(&self) -> u8 {
        self.data[3] >> 5
    }
    pub fn free_ca_mode(&self) -> bool {
        self.data[3] & 0b0001_0000 != 0
    }
    /// The descriptor loop, undecoded
    pub fn descriptor_bytes(&self) -> &'buf [u8] {
        &self.data[Self::HEADER_SIZE..]
    }
    pub fn descriptors<Desc: descriptor::Descriptor<'buf> + 'buf>(
        &self,
    ) -> impl Iterator<Item = Result<Desc, descriptor::DescriptorError>> + 'buf {
        DescriptorIter::new(self.descriptor_bytes())
    }
    /// The name given by the first _service_descriptor_, if any
    pub fn service_name(&self) -> Option<String> {
        self.descriptors::<DvbDescriptors<'buf>>()
            .find_map(|d| match d {
                Ok(DvbDescriptors::Service(s)) => Some(s),
                _ => None,
            })
            .map(|s| String::from_utf8_lossy(s.service_name()).into_owned())
    }
}

impl<'buf> fmt::Debug for ServiceEntry<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("ServiceEntry")
            .field("service_id", &self.service_id())
            .field("running_status", &self.running_status())
            .field("free_ca_mode", &self.free_ca_mode())
            .field("service_name", &self.service_name())
            .finish()
    }
}

/// Looks for the given service in one SDT section, and if it is present generates an SDT
/// listing that service alone.
///
/// Only descriptors with tags in [`SDT_ALLOWED_TAGS`] are copied.  `Ok(None)` means the service
/// is not in this section.
pub fn rewrite_service(section: &Section, service_id: u16) -> Result<Option<Rewritten>, SdtError> {
    if section.table_id() != TABLE_ID {
        return Err(RewriteError::WrongTableId {
            expected: TABLE_ID,
            actual: section.table_id(),
        });
    }
    if section.current_next_indicator() == CurrentNext::Next {
        debug!("{}: ignoring SDT with current_next_indicator=0", section.pid());
        return Err(RewriteError::NotApplicable);
    }
    let sdt = SdtSection::from_bytes(section.payload())?;
    let service = match sdt.services().find(|s| s.service_id() == service_id) {
        Some(service) => service,
        None => return Ok(None),
    };
    debug!(
        "{}: found service {:#06x} {:?} in SDT section {}",
        section.pid(),
        service_id,
        service.service_name(),
        section.section_number()
    );

    let mut writer = SectionWriter::new(Pid::SDT);
    let entry = service.data;
    if !writer.push(&section.normalised_header())
        || !writer.push(&section.payload()[..SdtSection::HEADER_SIZE])
        || !writer.push(&entry[..3])
    {
        return Err(RewriteError::Malformed("SDT header"));
    }
    let mut descriptors = Vec::with_capacity(writer.remaining());
    let room = writer.remaining() - 2;
    let mut dropped = 0;
    for desc in service.descriptors::<RawDescriptor<'_>>() {
        let desc = match desc {
            Ok(desc) => desc,
            Err(e) => {
                warn!("{}: service {:#06x}: {}", section.pid(), service_id, e);
                break;
            }
        };
        if !SDT_ALLOWED_TAGS.contains(&desc.tag()) {
            trace!(
                "{}: service {:#06x}: dropping descriptor {:#04x}",
                section.pid(),
                service_id,
                desc.tag()
            );
            continue;
        }
        if descriptors.len() + desc.bytes().len() > room {
            dropped += 1;
            continue;
        }
        trace!(
            "{}: service {:#06x}: copying descriptor {:#04x}",
            section.pid(),
            service_id,
            desc.tag()
        );
        descriptors.extend_from_slice(desc.bytes());
    }
    if dropped > 0 {
        warn!(
            "{}: service {:#06x}: {} SDT descriptors dropped, as the table would not fit in one packet",
            section.pid(),
            service_id,
            dropped
        );
    }
    let loop_length = u16::from(entry[3] & 0b1111_0000) << 8 | descriptors.len() as u16;
    if !writer.push(&loop_length.to_be_bytes()) || !writer.push(&descriptors) {
        return Err(RewriteError::Malformed("SDT descriptors"));
    }
    Ok(Some(Rewritten {
        packet: writer.finish(),
        version: section.version(),
        dropped,
    }))
}

/// Follows the sections of the SDT on behalf of one channel, until the channel's service is
/// found.
///
/// Rewriting is disabled for good when the channel has no service id, or when every section of
/// an SDT version has been examined without finding the service.
#[derive(Debug, Default)]
pub struct SdtTracker {
    state: TableState,
    disabled: bool,
}

impl SdtTracker {
    pub fn new() -> SdtTracker {
        SdtTracker::default()
    }

    pub fn state(&self) -> &TableState {
        &self.state
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Examine an SDT section for the given channel.
    ///
    /// Returns `Ok(Some(_))` when a new SDT has been generated, and `Ok(None)` when either the
    /// current version has already been generated or the service may yet appear in a section
    /// not seen so far.
    pub fn observe(
        &mut self,
        section: &Section,
        channel: &Channel,
    ) -> Result<Option<Rewritten>, SdtError> {
        if self.disabled {
            return Err(RewriteError::Disabled);
        }
        let service_id = match channel.service_id() {
            Some(id) => id,
            None => {
                warn!(
                    "{}: SDT rewriting disabled, no service_id configured",
                    channel.name()
                );
                self.disabled = true;
                return Err(RewriteError::NoServiceId);
            }
        };
        let version = section.version();
        if self.state.is_ready_for(version) {
            return Ok(None);
        }
        if let Some(rewritten) = rewrite_service(section, service_id)? {
            debug!(
                "{}: generated SDT version {} for service {:#06x}",
                channel.name(),
                version,
                service_id
            );
            self.state = TableState::Ready { version };
            return Ok(Some(rewritten));
        }

        let in_progress = matches!(
            self.state,
            TableState::AwaitingMoreSections { version: v, .. } if v == version
        );
        if !in_progress {
            self.state = TableState::AwaitingMoreSections {
                version,
                seen: FixedBitSet::with_capacity(SectionCollector::MAX_SECTIONS),
            };
        }
        let all_seen = match self.state {
            TableState::AwaitingMoreSections { ref mut seen, .. } => {
                seen.insert(usize::from(section.section_number()));
                (0..=usize::from(section.last_section_number())).all(|n| seen.contains(n))
            }
            _ => false,
        };
        if all_seen {
            warn!(
                "{}: SDT rewriting disabled, service {:#06x} not found in SDT version {}",
                channel.name(),
                service_id,
                version
            );
            self.disabled = true;
            return Err(RewriteError::ServiceNotFound { service_id });
        }
        trace!(
            "{}: service {:#06x} not in SDT section {}, waiting for more",
            channel.name(),
            service_id,
            section.section_number()
        );
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::test_channel;
    use crate::psi::test::{SDT_PART_1, SDT_PART_2};
    use crate::psi::{build_section, SectionAssembler, SectionOutcome};
    use assert_matches::assert_matches;
    use hex_literal::*;

    fn captured_sdt() -> Section {
        let mut data = SDT_PART_1.to_vec();
        data.extend_from_slice(&SDT_PART_2);
        Section::from_vec(Pid::SDT, data).unwrap()
    }

    fn reparse(rewritten: &Rewritten) -> Section {
        let mut asm = SectionAssembler::new();
        assert_matches!(
            asm.feed(&rewritten.packet.as_packet()),
            SectionOutcome::Complete(s) => s
        )
    }

    fn sdt_section(number: u8, last: u8, services: &[(u16, &[u8])]) -> Section {
        let mut body = vec![0x23, 0x3a, 0xff];
        for &(service_id, descriptors) in services {
            body.extend_from_slice(&service_id.to_be_bytes());
            body.push(0xfd);
            body.extend_from_slice(&(0x8000 | descriptors.len() as u16).to_be_bytes());
            body.extend_from_slice(descriptors);
        }
        Section::from_vec(Pid::SDT, build_section(TABLE_ID, 0x4084, 1, true, number, last, &body))
            .unwrap()
    }

    #[test]
    fn parse_captured() {
        let section = captured_sdt();
        let sdt = SdtSection::from_bytes(section.payload()).unwrap();
        assert_eq!(sdt.original_network_id(), 0x233a);
        let ids: Vec<u16> = sdt.services().map(|s| s.service_id()).collect();
        assert_eq!(
            ids,
            vec![0x4440, 0x44c4, 0x4500, 0x4484, 0x46c0, 0x4f80, 0x4540]
        );
        let first = sdt.services().next().unwrap();
        assert_eq!(first.running_status(), 4);
        assert!(!first.free_ca_mode());
        assert_eq!(first.service_name().as_deref(), Some("BBC TWO HD"));
    }

    #[test]
    fn single_service_with_allowed_descriptors() {
        let section = captured_sdt();
        let out = rewrite_service(&section, 0x4440).unwrap().unwrap();
        assert_eq!(out.version, 20);
        assert_eq!(out.dropped, 0);
        let result = reparse(&out);
        assert_eq!(result.len(), 35);
        assert_eq!(result.common_header().section_length, 32);
        assert_eq!(result.table_id(), TABLE_ID);
        assert_eq!(result.id(), 0x4084);
        let sdt = SdtSection::from_bytes(result.payload()).unwrap();
        assert_eq!(sdt.original_network_id(), 0x233a);
        let services: Vec<_> = sdt.services().collect();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].service_id(), 0x4440);
        assert_eq!(services[0].running_status(), 4);
        assert_eq!(
            services[0].descriptor_bytes(),
            &hex!("480d19000a4242432054574f204844")[..]
        );
    }

    #[test]
    fn service_absent() {
        assert_matches!(rewrite_service(&captured_sdt(), 0x1234), Ok(None));
    }

    #[test]
    fn other_sdt_rejected() {
        let other = Section::from_vec(
            Pid::SDT,
            build_section(0x46, 1, 0, true, 0, 0, &[0, 1, 0xff]),
        )
        .unwrap();
        assert_matches!(
            rewrite_service(&other, 1),
            Err(RewriteError::WrongTableId {
                expected: 0x42,
                actual: 0x46
            })
        );
    }

    #[test]
    fn every_allowed_tag_kept() {
        let mut descriptors = vec![];
        for &tag in &[0x47, 0x48, 0x49, 0x50, 0x51, 0x53, 0x5d, 0x5f, 0x6e, 0x73, 0x7e] {
            descriptors.extend_from_slice(&[tag, 1, 0]);
        }
        let section = sdt_section(0, 0, &[(7, &descriptors[..])]);
        let result = reparse(&rewrite_service(&section, 7).unwrap().unwrap());
        let sdt = SdtSection::from_bytes(result.payload()).unwrap();
        let service = sdt.services().next().unwrap();
        let tags: Vec<u8> = service
            .descriptors::<RawDescriptor<'_>>()
            .map(|d| d.unwrap().tag())
            .collect();
        assert_eq!(tags, vec![0x47, 0x48, 0x50, 0x51, 0x53, 0x5d, 0x6e]);
        // eit flags byte copied
        assert!(service.eit_present_following_flag());
        assert!(!service.eit_schedule_flag());
    }

    #[test]
    fn tracker_follows_sections() {
        let ch = test_channel(Some(0x22), &[0x100]);
        let mut tracker = SdtTracker::new();
        let s0 = sdt_section(0, 1, &[(0x11, &[0x48, 1, 0][..])]);
        let s1 = sdt_section(1, 1, &[(0x22, &[0x48, 1, 0][..])]);
        assert_matches!(tracker.observe(&s0, &ch), Ok(None));
        assert_matches!(
            tracker.state(),
            TableState::AwaitingMoreSections { version: 1, .. }
        );
        let out = assert_matches!(tracker.observe(&s1, &ch), Ok(Some(out)) => out);
        assert_eq!(out.version, 1);
        assert!(tracker.state().is_ready_for(1));
        // the same version is not generated twice
        assert_matches!(tracker.observe(&s1, &ch), Ok(None));
        assert_matches!(tracker.observe(&s0, &ch), Ok(None));
        assert!(!tracker.is_disabled());
    }

    #[test]
    fn tracker_gives_up_when_service_missing() {
        let ch = test_channel(Some(0x33), &[0x100]);
        let mut tracker = SdtTracker::new();
        let s0 = sdt_section(0, 1, &[(0x11, &[][..])]);
        let s1 = sdt_section(1, 1, &[(0x22, &[][..])]);
        assert_matches!(tracker.observe(&s0, &ch), Ok(None));
        assert_matches!(tracker.observe(&s0, &ch), Ok(None));
        assert_matches!(
            tracker.observe(&s1, &ch),
            Err(RewriteError::ServiceNotFound { service_id: 0x33 })
        );
        assert!(tracker.is_disabled());
        assert_matches!(tracker.observe(&s1, &ch), Err(RewriteError::Disabled));
    }

    #[test]
    fn tracker_without_service_id() {
        let ch = test_channel(None, &[0x100]);
        let mut tracker = SdtTracker::new();
        assert_matches!(
            tracker.observe(&captured_sdt(), &ch),
            Err(RewriteError::NoServiceId)
        );
        assert_matches!(
            tracker.observe(&captured_sdt(), &ch),
            Err(RewriteError::Disabled)
        );
    }

    #[test]
    fn oversized_descriptors_dropped() {
        let mut descriptors = vec![];
        for _ in 0..3 {
            descriptors.extend_from_slice(&[0x48, 60]);
            descriptors.extend_from_slice(&[b'x'; 60]);
        }
        let section = sdt_section(0, 0, &[(9, &descriptors[..])]);
        let out = rewrite_service(&section, 9).unwrap().unwrap();
        // 183 - 11 - 5 - 4 leaves room for two 62 byte descriptors
        assert_eq!(out.dropped, 1);
        let result = reparse(&out);
        let sdt = SdtSection::from_bytes(result.payload()).unwrap();
        assert_eq!(
            sdt.services().next().unwrap().descriptor_bytes().len(),
            124
        );
    }
}
