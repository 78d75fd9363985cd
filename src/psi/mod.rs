//! Types for reassembling and regenerating tables of *Program Specific Information* and DVB
//! *Service Information* in a transport stream.
//!
//! # Concepts
//!
//! * A PSI/SI *Table* can be split into *Sections*
//! * A Section can be split across a small number of individual transport stream *Packets*
//! * All the tables handled here use the common 'section syntax', so every section carries a
//!   [`TableSyntaxHeader`](struct.TableSyntaxHeader.html) and ends with a CRC
//!
//! # Core types
//!
//! * [`SectionAssembler`](struct.SectionAssembler.html) converts *Packets* into *Sections*
//! * [`SectionCollector`](struct.SectionCollector.html) gathers the *Sections* of one table
//!   version
//! * [`SectionWriter`](struct.SectionWriter.html) builds a new single-packet section, as used by
//!   the table rewriters
//!
//! The specific types of table, such as the Program Association Table, are defined in
//! sub-modules with only the generic functionality in this module.

pub mod eit;
pub mod pat;
pub mod pmt;
pub mod sdt;

use crate::error::DiscardReason;
use crate::mpegts_crc;
use crate::packet::{ContinuityCounter, Packet, PacketBuf, Pid};
use fixedbitset::FixedBitSet;
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::fmt;

/// Value of the `current_next_indicator` field
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CurrentNext {
    /// the section applies now
    Current,
    /// the section describes the next version of the table, not yet applicable
    Next,
}

impl CurrentNext {
    fn from(v: u8) -> CurrentNext {
        match v & 1 {
            0 => CurrentNext::Next,
            _ => CurrentNext::Current,
        }
    }
}

/// Represents the fields that appear within table sections that use the common 'section syntax'.
#[derive(Debug)]
pub struct TableSyntaxHeader<'buf> {
    buf: &'buf [u8],
}

impl<'buf> TableSyntaxHeader<'buf> {
    /// The size of the header; 5 bytes
    pub const SIZE: usize = 5;

    /// Panics if fewer than 5 bytes are supplied
    pub fn new(buf: &'buf [u8]) -> TableSyntaxHeader<'buf> {
        assert!(buf.len() >= Self::SIZE);
        TableSyntaxHeader { buf }
    }
    /// The initial 16-bit field within a 'section syntax' table (which immediately follows the
    /// `section_length` field).  Refered to as,
    ///  - `transport_stream_id` when it appears within a Program Association Section
    ///  - `program_number` when it appears within a Program Map Section
    ///  - `transport_stream_id` when it appears within a Service Description Section
    ///  - `service_id` when it appears within an Event Information Section
    pub fn id(&self) -> u16 {
        u16::from(self.buf[0]) << 8 | u16::from(self.buf[1])
    }
    /// A 5-bit value that can be used to quickly check if this table has changed since the last
    /// time it was periodically inserted within the transport stream being read.
    pub fn version(&self) -> u8 {
        (self.buf[2] >> 1) & 0b0001_1111
    }
    /// Is this table applicable now, or will it become applicable at some future time.
    pub fn current_next_indicator(&self) -> CurrentNext {
        CurrentNext::from(self.buf[2] & 1)
    }
    /// The number of this section, within a potentially multi-section table.
    ///
    /// It is common for only one section to appear within PAT, PMT and SDT tables, in which case
    /// this value will always be `0` within a given stream.  EIT schedule tables on the other
    /// hand commonly use many sections.
    pub fn section_number(&self) -> u8 {
        self.buf[3]
    }
    /// Indicates the value of `section_number()` that will appear within the last section within
    /// a table.
    pub fn last_section_number(&self) -> u8 {
        self.buf[4]
    }
}

/// The three bytes which start every section, whatever its syntax.
#[derive(Debug)]
pub struct SectionCommonHeader {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub private_indicator: bool,
    /// Number of bytes following the `section_length` field, up to and including the CRC
    pub section_length: usize,
}

impl SectionCommonHeader {
    pub const SIZE: usize = 3;

    /// Panics if the buffer is not exactly 3 bytes long
    pub fn new(buf: &[u8]) -> SectionCommonHeader {
        assert_eq!(buf.len(), Self::SIZE);
        SectionCommonHeader {
            table_id: buf[0],
            section_syntax_indicator: buf[1] & 0b1000_0000 != 0,
            private_indicator: buf[1] & 0b0100_0000 != 0,
            section_length: ((u16::from(buf[1] & 0b0000_1111) << 8) | u16::from(buf[2])) as usize,
        }
    }

    /// The total size of the section, common header included.
    pub fn total_size(&self) -> usize {
        self.section_length + Self::SIZE
    }
}

/// A complete section, reassembled from one or more packets, whose CRC has been checked.
#[derive(Clone, PartialEq, Eq)]
pub struct Section {
    pid: Pid,
    data: Vec<u8>,
}

impl Section {
    /// Size of the common header plus the table syntax header
    pub const HEADER_SIZE: usize = SectionCommonHeader::SIZE + TableSyntaxHeader::SIZE;

    /// Smallest possible section: the headers plus a CRC, with an empty body
    pub const MIN_SIZE: usize = Self::HEADER_SIZE + mpegts_crc::CRC_SIZE;

    /// Validates the section found at the start of `data`, which was carried on the given PID.
    ///
    /// Any bytes beyond the declared `section_length` are discarded.
    pub fn from_vec(pid: Pid, mut data: Vec<u8>) -> Result<Section, DiscardReason> {
        if data.len() < SectionCommonHeader::SIZE {
            return Err(DiscardReason::SectionTooShort { length: data.len() });
        }
        let header = SectionCommonHeader::new(&data[..SectionCommonHeader::SIZE]);
        let total = header.total_size();
        if total < Self::MIN_SIZE {
            return Err(DiscardReason::SectionTooShort { length: total });
        }
        if data.len() < total {
            return Err(DiscardReason::SectionTooShort { length: data.len() });
        }
        data.truncate(total);
        // don't apply CRC checks when fuzzing, to give more chances of test data triggering
        // parser bugs,
        if !cfg!(fuzzing) && !mpegts_crc::is_valid(&data) {
            return Err(DiscardReason::BadCrc {
                table_id: header.table_id,
            });
        }
        Ok(Section { pid, data })
    }

    /// The PID on which this section was received
    pub fn pid(&self) -> Pid {
        self.pid
    }
    pub fn table_id(&self) -> u8 {
        self.data[0]
    }
    pub fn common_header(&self) -> SectionCommonHeader {
        SectionCommonHeader::new(&self.data[..SectionCommonHeader::SIZE])
    }
    pub fn syntax_header(&self) -> TableSyntaxHeader<'_> {
        TableSyntaxHeader::new(&self.data[SectionCommonHeader::SIZE..Self::HEADER_SIZE])
    }
    /// Shorthand for `syntax_header().id()`
    pub fn id(&self) -> u16 {
        self.syntax_header().id()
    }
    pub fn version(&self) -> u8 {
        self.syntax_header().version()
    }
    pub fn current_next_indicator(&self) -> CurrentNext {
        self.syntax_header().current_next_indicator()
    }
    pub fn section_number(&self) -> u8 {
        self.syntax_header().section_number()
    }
    pub fn last_section_number(&self) -> u8 {
        self.syntax_header().last_section_number()
    }
    /// The table-specific data between the table syntax header and the CRC
    pub fn payload(&self) -> &[u8] {
        &self.data[Self::HEADER_SIZE..self.data.len() - mpegts_crc::CRC_SIZE]
    }
    /// The whole section, from `table_id` to the end of the CRC
    pub fn bytes(&self) -> &[u8] {
        &self.data[..]
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    /// Always `false`; a section holds at least its headers and CRC
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy of the 8 header bytes for use in a generated section, with `current_next_indicator`
    /// forced to `1`, and `section_number` and `last_section_number` forced to `0`.
    ///
    /// `section_length` is left as-is, to be overwritten by
    /// [`SectionWriter::finish()`](struct.SectionWriter.html#method.finish).
    pub fn normalised_header(&self) -> [u8; Section::HEADER_SIZE] {
        let d = &self.data;
        [d[0], d[1], d[2], d[3], d[4], d[5] | 0b1, 0, 0]
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Section")
            .field("pid", &self.pid)
            .field("table_id", &self.table_id())
            .field("id", &self.id())
            .field("version", &self.version())
            .field("section_number", &self.section_number())
            .field("last_section_number", &self.last_section_number())
            .field("len", &self.len())
            .finish()
    }
}

/// The result of passing one packet to
/// [`SectionAssembler::feed()`](struct.SectionAssembler.html#method.feed).
#[derive(Debug)]
pub enum SectionOutcome {
    /// Nothing to report yet; more packets are needed.
    Incomplete,
    /// A section was completed and passed its CRC check.  If the packet completed more than one
    /// section, the others are available from `pop_ready()`.
    Complete(Section),
    /// The packet, or the section being assembled, was dropped.
    Discarded(DiscardReason),
}

/// Rebuilds sections which may be split across several packets of a single PID.
///
/// The assembler tracks the continuity counter of the packets it is given.  A missing packet
/// causes the section in progress to be thrown away, and assembly restarts at the next packet
/// with `payload_unit_start_indicator` set.  An immediately repeated counter value marks a
/// duplicate packet, which is ignored.
///
/// A single packet may complete one section and then start (or entirely contain) further
/// sections.  The first section completed is returned from `feed()`, and the rest are queued,
/// to be drained with `pop_ready()`.
#[derive(Default)]
pub struct SectionAssembler {
    pid: Option<Pid>,
    last_cc: Option<ContinuityCounter>,
    buf: Vec<u8>,
    in_progress: bool,
    ready: VecDeque<Section>,
}

impl SectionAssembler {
    /// The largest section that will be assembled; anything longer is discarded.
    pub const MAX_SECTION_SIZE: usize = 4096;

    const STUFFING_BYTE: u8 = 0xff;
    const PES_START_CODE: [u8; 3] = [0, 0, 1];

    pub fn new() -> SectionAssembler {
        SectionAssembler::default()
    }

    /// The PID of the packets most recently fed in
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    /// `true` if part of a section has been received and the rest is awaited
    pub fn is_assembling(&self) -> bool {
        self.in_progress
    }

    /// Take the next of any extra sections completed by earlier calls to `feed()`.
    pub fn pop_ready(&mut self) -> Option<Section> {
        self.ready.pop_front()
    }

    /// Forget all state, including the continuity counter of the last packet.
    pub fn reset(&mut self) {
        self.abandon();
        self.pid = None;
        self.last_cc = None;
        self.ready.clear();
    }

    /// Process the next packet.
    pub fn feed(&mut self, pk: &Packet<'_>) -> SectionOutcome {
        let pid = pk.pid();
        if pk.transport_error_indicator() {
            debug!("{}: dropping packet with transport_error_indicator set", pid);
            return SectionOutcome::Discarded(DiscardReason::TransportError);
        }
        let payload = match pk.payload() {
            Some(payload) => payload,
            None => {
                trace!("{}: no payload in section packet", pid);
                return SectionOutcome::Discarded(DiscardReason::NoPayload);
            }
        };
        let cc = pk.continuity_counter();
        if self.pid == Some(pid) && self.last_cc == Some(cc) {
            trace!("{}: duplicate packet, continuity_counter={}", pid, cc.count());
            return SectionOutcome::Discarded(DiscardReason::DuplicatePacket);
        }

        let mut outcome = SectionOutcome::Incomplete;
        if pk.payload_unit_start_indicator() {
            self.start_unit(pid, cc, payload, &mut outcome);
        } else {
            self.continue_unit(pid, cc, payload, &mut outcome);
        }
        self.pid = Some(pid);
        self.last_cc = Some(cc);

        if !matches!(outcome, SectionOutcome::Complete(_)) {
            if let Some(section) = self.ready.pop_front() {
                outcome = SectionOutcome::Complete(section);
            }
        }
        outcome
    }

    fn expected_cc(&self, pid: Pid) -> Option<ContinuityCounter> {
        if self.pid == Some(pid) {
            self.last_cc.map(ContinuityCounter::next)
        } else {
            None
        }
    }

    fn start_unit(
        &mut self,
        pid: Pid,
        cc: ContinuityCounter,
        payload: &[u8],
        outcome: &mut SectionOutcome,
    ) {
        if payload.starts_with(&Self::PES_START_CODE) {
            self.abandon();
            self.report(pid, outcome, Err(DiscardReason::PesStartCode));
            return;
        }
        let pointer = payload[0] as usize;
        let data = &payload[1..];
        if pointer >= data.len() {
            self.abandon();
            self.report(pid, outcome, Err(DiscardReason::PointerOutOfRange { pointer }));
            return;
        }
        if self.in_progress {
            if pointer > 0 {
                // the bytes ahead of the pointer target finish the section already in progress
                self.continue_unit(pid, cc, &data[..pointer], outcome);
            }
            if self.in_progress {
                debug!("{}: section truncated by start of next section", pid);
                self.abandon();
            }
        }

        let mut rest = &data[pointer..];
        while let Some(&first) = rest.first() {
            if first == Self::STUFFING_BYTE {
                break;
            }
            self.abandon();
            self.in_progress = true;
            let (used, done) = self.append(pid, rest);
            rest = &rest[used..];
            match done {
                None => break,
                Some(Ok(section)) => self.report(pid, outcome, Ok(section)),
                Some(Err(reason)) => {
                    // after a bad length field we can't know where any following section begins
                    let resumable = matches!(reason, DiscardReason::BadCrc { .. });
                    self.report(pid, outcome, Err(reason));
                    if !resumable {
                        break;
                    }
                }
            }
        }
    }

    fn continue_unit(
        &mut self,
        pid: Pid,
        cc: ContinuityCounter,
        data: &[u8],
        outcome: &mut SectionOutcome,
    ) {
        if !self.in_progress {
            self.report(pid, outcome, Err(DiscardReason::NoSectionInProgress));
            return;
        }
        match self.pid {
            Some(expected) if expected != pid => {
                self.abandon();
                self.report(
                    pid,
                    outcome,
                    Err(DiscardReason::PidMismatch {
                        expected,
                        actual: pid,
                    }),
                );
                return;
            }
            _ => (),
        }
        match self.expected_cc(pid) {
            Some(expected) if expected == cc => (),
            expected => {
                self.abandon();
                self.report(
                    pid,
                    outcome,
                    Err(DiscardReason::ContinuityGap {
                        expected: expected.map(ContinuityCounter::count).unwrap_or(0),
                        actual: cc.count(),
                    }),
                );
                return;
            }
        }
        if let (_, Some(result)) = self.append(pid, data) {
            self.report(pid, outcome, result);
        }
    }

    /// Adds bytes to the section in progress, returning the number of bytes consumed and, if the
    /// section is now complete (or found to be unusable), the result.
    fn append(
        &mut self,
        pid: Pid,
        data: &[u8],
    ) -> (usize, Option<Result<Section, DiscardReason>>) {
        let mut used = 0;
        if self.buf.len() < SectionCommonHeader::SIZE {
            used = (SectionCommonHeader::SIZE - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..used]);
            if self.buf.len() < SectionCommonHeader::SIZE {
                return (used, None);
            }
        }
        let total = SectionCommonHeader::new(&self.buf[..SectionCommonHeader::SIZE]).total_size();
        if total > Self::MAX_SECTION_SIZE {
            self.abandon();
            return (used, Some(Err(DiscardReason::SectionTooLong { length: total })));
        }
        if total < Section::MIN_SIZE {
            self.abandon();
            return (used, Some(Err(DiscardReason::SectionTooShort { length: total })));
        }
        let take = (total - self.buf.len()).min(data.len() - used);
        self.buf.extend_from_slice(&data[used..used + take]);
        used += take;
        if self.buf.len() < total {
            return (used, None);
        }
        self.in_progress = false;
        let data = std::mem::take(&mut self.buf);
        (used, Some(Section::from_vec(pid, data)))
    }

    fn abandon(&mut self) {
        self.buf.clear();
        self.in_progress = false;
    }

    fn report(
        &mut self,
        pid: Pid,
        outcome: &mut SectionOutcome,
        result: Result<Section, DiscardReason>,
    ) {
        match result {
            Ok(section) => {
                if matches!(outcome, SectionOutcome::Complete(_)) || !self.ready.is_empty() {
                    self.ready.push_back(section);
                } else {
                    *outcome = SectionOutcome::Complete(section);
                }
            }
            Err(reason) => {
                match reason {
                    DiscardReason::BadCrc { .. } => warn!("{}: {}", pid, reason),
                    _ => debug!("{}: {}", pid, reason),
                }
                if !matches!(outcome, SectionOutcome::Complete(_)) {
                    *outcome = SectionOutcome::Discarded(reason);
                }
            }
        }
    }
}

/// Progress of a generated table towards being available for output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TableState {
    /// No usable section of the source table has been seen yet.
    #[default]
    AwaitingFirstSection,
    /// Some sections of a multi-section source table have been examined, but the table can't be
    /// generated until more arrive.
    AwaitingMoreSections {
        version: u8,
        /// Section numbers examined so far
        seen: FixedBitSet,
    },
    /// The table has been generated from the given version of the source table.
    Ready { version: u8 },
}

impl TableState {
    /// `true` if a table generated from the given source version is already available
    pub fn is_ready_for(&self, version: u8) -> bool {
        matches!(*self, TableState::Ready { version: v } if v == version)
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self, TableState::Ready { .. })
    }

    /// The source table version this state relates to, if any.
    pub fn version(&self) -> Option<u8> {
        match *self {
            TableState::AwaitingFirstSection => None,
            TableState::AwaitingMoreSections { version, .. } => Some(version),
            TableState::Ready { version } => Some(version),
        }
    }
}

/// What [`SectionCollector::insert()`](struct.SectionCollector.html#method.insert) did with a
/// section.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Collected {
    /// the section filled a slot which was previously empty
    Stored,
    /// a section with this number was already held, and has been replaced
    Repeated,
    /// the section's version differs from the sections previously held, which were all dropped
    NewVersion,
}

/// Gathers up the sections of one version of a table, indexed by `section_number`.
///
/// Any change of `version_number` discards all sections held so far.  Nothing is ever expired
/// otherwise.
#[derive(Debug)]
pub struct SectionCollector {
    version: Option<u8>,
    last_section_number: u8,
    seen: FixedBitSet,
    sections: Vec<Option<Section>>,
}

impl Default for SectionCollector {
    fn default() -> SectionCollector {
        SectionCollector {
            version: None,
            last_section_number: 0,
            seen: FixedBitSet::with_capacity(Self::MAX_SECTIONS),
            sections: Vec::new(),
        }
    }
}

impl SectionCollector {
    /// `section_number` is an 8-bit field
    pub const MAX_SECTIONS: usize = 256;

    pub fn new() -> SectionCollector {
        SectionCollector::default()
    }

    pub fn insert(&mut self, section: Section) -> Collected {
        let version = section.version();
        let mut result = Collected::Stored;
        if self.version != Some(version) {
            if self.version.is_some() {
                result = Collected::NewVersion;
            }
            self.clear();
            self.version = Some(version);
        }
        let number = usize::from(section.section_number());
        if self.seen.contains(number) {
            result = Collected::Repeated;
        }
        self.last_section_number = section.last_section_number();
        let needed = number.max(usize::from(self.last_section_number)) + 1;
        if self.sections.len() < needed {
            self.sections.resize_with(needed, || None);
        }
        self.seen.insert(number);
        self.sections[number] = Some(section);
        result
    }

    /// Drop all sections, and forget the version.
    pub fn clear(&mut self) {
        self.version = None;
        self.last_section_number = 0;
        self.seen.clear();
        self.sections.clear();
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn last_section_number(&self) -> u8 {
        self.last_section_number
    }

    /// The section numbers held
    pub fn seen(&self) -> &FixedBitSet {
        &self.seen
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_clear()
    }

    /// `true` once every section from `0` to `last_section_number` has been received
    pub fn is_complete(&self) -> bool {
        self.version.is_some()
            && (0..=usize::from(self.last_section_number)).all(|n| self.seen.contains(n))
    }

    pub fn section(&self, section_number: u8) -> Option<&Section> {
        self.sections
            .get(usize::from(section_number))
            .and_then(Option::as_ref)
    }

    /// The sections held, in `section_number` order
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter_map(Option::as_ref)
    }
}

/// A table generated by one of the rewriters.
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// A single packet holding the new section, with continuity counter `0`.
    pub packet: PacketBuf,
    /// The version of the source table.
    pub version: u8,
    /// The number of entries that matched, but had to be left out because the new section would
    /// not fit in one packet.
    pub dropped: usize,
}

/// Builds a new section in the payload of a single packet.
///
/// The packet payload starts with a zero `pointer_field`, so a section of at most 183 bytes
/// (CRC included) can be written.  Every push is checked against the space remaining, with room
/// always kept for the CRC.
pub struct SectionWriter {
    packet: PacketBuf,
    len: usize,
}

impl SectionWriter {
    /// Largest section that fits after the pointer_field of one packet
    pub const CAPACITY: usize = Packet::MAX_PAYLOAD_SIZE - 1;

    const SECTION_OFFSET: usize = 1;

    pub fn new(pid: Pid) -> SectionWriter {
        let mut packet = PacketBuf::new(pid, true);
        packet.payload_mut()[0] = 0; // pointer_field
        SectionWriter { packet, len: 0 }
    }

    /// Bytes written so far, excluding the CRC still to be added
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Space left for section content, after allowing for the CRC
    pub fn remaining(&self) -> usize {
        Self::CAPACITY - mpegts_crc::CRC_SIZE - self.len
    }

    /// Appends the given bytes, unless they would not fit, in which case nothing is written and
    /// `false` is returned.
    #[must_use]
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining() {
            return false;
        }
        let start = Self::SECTION_OFFSET + self.len;
        self.packet.payload_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        true
    }

    /// The section content written so far
    pub fn written(&self) -> &[u8] {
        let start = Self::SECTION_OFFSET;
        &self.packet.payload()[start..start + self.len]
    }

    /// Fill in `section_length` to match the bytes written, append the CRC, and return the
    /// packet.  Unused payload bytes remain `0xff`.
    pub fn finish(mut self) -> PacketBuf {
        debug_assert!(self.len >= SectionCommonHeader::SIZE);
        let section_length = self.len - SectionCommonHeader::SIZE + mpegts_crc::CRC_SIZE;
        let start = Self::SECTION_OFFSET;
        let end = start + self.len;
        let payload = self.packet.payload_mut();
        payload[start + 1] = (payload[start + 1] & 0b1111_0000) | (section_length >> 8) as u8;
        payload[start + 2] = section_length as u8;
        let crc = mpegts_crc::sum32(&payload[start..end]);
        payload[end..end + mpegts_crc::CRC_SIZE].copy_from_slice(&crc.to_be_bytes());
        self.packet
    }
}

/// Builds a CRC-protected section from the given header field values and body, for use in tests.
#[cfg(test)]
pub(crate) fn build_section(
    table_id: u8,
    id: u16,
    version: u8,
    current: bool,
    section_number: u8,
    last_section_number: u8,
    body: &[u8],
) -> Vec<u8> {
    let section_length = TableSyntaxHeader::SIZE + body.len() + mpegts_crc::CRC_SIZE;
    let mut data = vec![
        table_id,
        0b1011_0000 | (section_length >> 8) as u8,
        section_length as u8,
        (id >> 8) as u8,
        id as u8,
        0b1100_0000 | (version << 1) | u8::from(current),
        section_number,
        last_section_number,
    ];
    data.extend_from_slice(body);
    let crc = mpegts_crc::sum32(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    data
}
