//! Types related to the _Program Map Table_, and its per-channel rewriter.

use crate::channel::Channel;
use crate::descriptor;
use crate::error::RewriteError;
use crate::packet::Pid;
use crate::psi::{CurrentNext, Rewritten, Section, SectionWriter};
use log::{debug, trace, warn};
use std::fmt;

/// The table_id of every Program Map Section
pub const TABLE_ID: u8 = 0x02;

/// Sections of the _Program Map Table_ give details of the streams within a particular program
pub struct PmtSection<'buf> {
    data: &'buf [u8],
}
impl<'buf> fmt::Debug for PmtSection<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("PmtSection")
            .field("pcr_pid", &self.pcr_pid())
            .field("descriptors", &DescriptorsDebug(self))
            .field("streams", &StreamsDebug(self))
            .finish()
    }
}
struct StreamsDebug<'buf>(&'buf PmtSection<'buf>);
impl<'buf> fmt::Debug for StreamsDebug<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.0.streams()).finish()
    }
}
struct DescriptorsDebug<'buf>(&'buf PmtSection<'buf>);
impl<'buf> fmt::Debug for DescriptorsDebug<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list()
            .entries(self.0.descriptors::<descriptor::RawDescriptor<'buf>>())
            .finish()
    }
}

impl<'buf> PmtSection<'buf> {
    /// Size of `PCR_PID` and `program_info_length`, which together with the 8 byte section
    /// header make up the 12 byte PMT header
    pub const HEADER_SIZE: usize = 4;

    /// Wraps the payload of a PMT section, checking that the `program_info` descriptors fit
    /// within it.
    pub fn from_bytes(data: &'buf [u8]) -> Result<PmtSection<'buf>, RewriteError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(RewriteError::Malformed("PMT too short for header"));
        }
        let pmt = PmtSection { data };
        if pmt.descriptor_end() > data.len() {
            return Err(RewriteError::Malformed(
                "program_info_length extends beyond end of PMT section",
            ));
        }
        Ok(pmt)
    }

    /// Returns the Pid of packets that will contain the Program Clock Reference for this program
    pub fn pcr_pid(&self) -> Pid {
        Pid::new(u16::from(self.data[0] & 0b0001_1111) << 8 | u16::from(self.data[1]))
    }
    fn program_info_length(&self) -> usize {
        (u16::from(self.data[2] & 0b0000_1111) << 8 | u16::from(self.data[3])) as usize
    }
    fn descriptor_end(&self) -> usize {
        Self::HEADER_SIZE + self.program_info_length()
    }
    /// The `program_info` descriptor loop, undecoded
    pub fn descriptor_bytes(&self) -> &'buf [u8] {
        &self.data[Self::HEADER_SIZE..self.descriptor_end()]
    }
    /// Returns an iterator over the descriptors attached to this PMT section.
    pub fn descriptors<Desc: descriptor::Descriptor<'buf> + 'buf>(
        &self,
    ) -> impl Iterator<Item = Result<Desc, descriptor::DescriptorError>> + 'buf {
        descriptor::DescriptorIter::new(self.descriptor_bytes())
    }
    /// Returns an iterator over the streams of which this program is composed.
    ///
    /// Iteration stops early, with a warning, at an entry whose `ES_info_length` overruns the
    /// section.
    pub fn streams(&self) -> impl Iterator<Item = StreamInfo<'buf>> {
        StreamInfoIter::new(&self.data[self.descriptor_end()..])
    }
}
/// Iterator over the `StreamInfo` entries in a `PmtSection`.
struct StreamInfoIter<'buf> {
    buf: &'buf [u8],
}
impl<'buf> StreamInfoIter<'buf> {
    fn new(buf: &'buf [u8]) -> StreamInfoIter<'buf> {
        StreamInfoIter { buf }
    }
}
impl<'buf> Iterator for StreamInfoIter<'buf> {
    type Item = StreamInfo<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        if let Some((stream_info, info_len)) = StreamInfo::from_bytes(self.buf) {
            self.buf = &self.buf[info_len..];
            Some(stream_info)
        } else {
            self.buf = &self.buf[0..0];
            None
        }
    }
}

/// Details of a particular elementary stream within a program.
///
///  - `stream_type` gives an indication of the kind of content carried within the stream
///  - The `elementry_pid` property allows us to find Transport Stream packets that belong to the
///    elementry stream
///  - `descriptors` _may_ provide extra metadata describing some of the
///     stream's properties (for example, the streams 'language' might be given in a descriptor; or
///     it might not)
pub struct StreamInfo<'buf> {
    data: &'buf [u8],
}

impl<'buf> StreamInfo<'buf> {
    const HEADER_SIZE: usize = 5;

    fn from_bytes(data: &'buf [u8]) -> Option<(StreamInfo<'buf>, usize)> {
        if data.len() < Self::HEADER_SIZE {
            warn!(
                "only {} bytes remaining for stream info, at least {} required {:?}",
                data.len(),
                Self::HEADER_SIZE,
                data
            );
            return None;
        }
        let es_info_length = u16::from(data[3] & 0b0000_1111) << 8 | u16::from(data[4]);
        let end = Self::HEADER_SIZE + es_info_length as usize;
        if end > data.len() {
            warn!(
                "PMT section of size {} is not large enough to contain es_info_length of {}",
                data.len(),
                es_info_length
            );
            return None;
        }
        Some((StreamInfo { data: &data[..end] }, end))
    }

    /// The `stream_type` code, for example `0x1b` for H.264 video
    pub fn stream_type(&self) -> u8 {
        self.data[0]
    }
    /// The Pid that will be used for TS packets containing the data of this stream
    pub fn elementary_pid(&self) -> Pid {
        Pid::new(u16::from(self.data[1] & 0b0001_1111) << 8 | u16::from(self.data[2]))
    }
    /// The whole entry: the 5 byte header, then the descriptors
    pub fn bytes(&self) -> &'buf [u8] {
        self.data
    }

    /// Returns an iterator over the descriptors attached to this stream
    pub fn descriptors<Desc: descriptor::Descriptor<'buf> + 'buf>(
        &self,
    ) -> impl Iterator<Item = Result<Desc, descriptor::DescriptorError>> + 'buf {
        descriptor::DescriptorIter::new(&self.data[Self::HEADER_SIZE..])
    }
}
impl<'buf> fmt::Debug for StreamInfo<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("StreamInfo")
            .field("stream_type", &self.stream_type())
            .field("elementary_pid", &self.elementary_pid())
            .field("descriptors", &StreamInfoDescriptorsDebug(self))
            .finish()
    }
}
struct StreamInfoDescriptorsDebug<'buf>(&'buf StreamInfo<'buf>);
impl<'buf> fmt::Debug for StreamInfoDescriptorsDebug<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list()
            .entries(self.0.descriptors::<descriptor::RawDescriptor<'buf>>())
            .finish()
    }
}

/// Generates a PMT for the given channel, listing only the elementary streams the channel
/// carries.
///
/// `WrongTableId` and `ProgramNumberMismatch` mean this section is not the one wanted, and the
/// caller should wait for another.
pub fn rewrite(section: &Section, channel: &Channel) -> Result<Rewritten, RewriteError> {
    if section.table_id() != TABLE_ID {
        debug!(
            "{}: {}: table_id {:#04x} on PMT PID",
            channel.name(),
            section.pid(),
            section.table_id()
        );
        return Err(RewriteError::WrongTableId {
            expected: TABLE_ID,
            actual: section.table_id(),
        });
    }
    if section.current_next_indicator() == CurrentNext::Next {
        debug!(
            "{}: {}: ignoring PMT with current_next_indicator=0",
            channel.name(),
            section.pid()
        );
        return Err(RewriteError::NotApplicable);
    }
    let program_number = section.id();
    if let Some(service_id) = channel.service_id() {
        if service_id != program_number {
            trace!(
                "{}: {}: skipping PMT for program {}",
                channel.name(),
                section.pid(),
                program_number
            );
            return Err(RewriteError::ProgramNumberMismatch {
                expected: service_id,
                actual: program_number,
            });
        }
    }
    let pmt = PmtSection::from_bytes(section.payload()).map_err(|e| {
        warn!("{}: {}: {}", channel.name(), section.pid(), e);
        e
    })?;

    let mut writer = SectionWriter::new(section.pid());
    let header = section.normalised_header();
    let pcr_pid = u16::from(pmt.pcr_pid()) | 0xe000;
    if !writer.push(&header) || !writer.push(&pcr_pid.to_be_bytes()) {
        return Err(RewriteError::Malformed("PMT header"));
    }
    let info = pmt.descriptor_bytes();
    // leave room for at least one stream entry after the program_info descriptors
    let info = if info.len() + 2 + StreamInfo::HEADER_SIZE <= writer.remaining() {
        info
    } else {
        warn!(
            "{}: {}: {} bytes of program_info descriptors dropped, too large for one packet",
            channel.name(),
            section.pid(),
            info.len()
        );
        &info[..0]
    };
    let info_length = 0xf000 | info.len() as u16;
    if !writer.push(&info_length.to_be_bytes()) || !writer.push(info) {
        return Err(RewriteError::Malformed("PMT program_info"));
    }

    let mut kept = 0;
    let mut dropped = 0;
    for stream in pmt.streams() {
        let pid = stream.elementary_pid();
        if !channel.carries(pid) {
            trace!(
                "{}: {}: dropping stream {} from PMT",
                channel.name(),
                section.pid(),
                pid
            );
            continue;
        }
        if writer.push(stream.bytes()) {
            kept += 1;
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(
            "{}: {}: {} PMT streams dropped, as the table would not fit in one packet",
            channel.name(),
            section.pid(),
            dropped
        );
    }
    debug!(
        "{}: {}: generated PMT version {} for program {} with {} streams",
        channel.name(),
        section.pid(),
        section.version(),
        program_number,
        kept
    );
    Ok(Rewritten {
        packet: writer.finish(),
        version: section.version(),
        dropped,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::test_channel;
    use crate::descriptor::RawDescriptor;
    use crate::mpegts_crc;
    use crate::psi::{build_section, SectionAssembler, SectionOutcome};
    use assert_matches::assert_matches;
    use bitstream_io::{BitWrite, BitWriter, BE};
    use std::io;

    fn make_section<F>(builder: F) -> Vec<u8>
    where
        F: Fn(&mut BitWriter<&mut Vec<u8>, BE>) -> Result<(), io::Error>,
    {
        let mut data: Vec<u8> = Vec::new();
        builder(&mut BitWriter::<_, BE>::new(&mut data)).unwrap();
        data
    }

    /// PMT body with the given `(stream_type, elementary_pid, es_info)` entries
    fn pmt_body(pcr_pid: u16, program_info: &[u8], streams: &[(u8, u16, &[u8])]) -> Vec<u8> {
        make_section(|w| {
            w.write(3, 0b111u8)?; // reserved
            w.write(13, pcr_pid)?;
            w.write(4, 0b1111u8)?; // reserved
            w.write(12, program_info.len() as u16)?;
            w.write_bytes(program_info)?;
            for &(stream_type, pid, info) in streams {
                w.write(8, stream_type)?;
                w.write(3, 0b111u8)?; // reserved
                w.write(13, pid)?;
                w.write(4, 0b1111u8)?; // reserved
                w.write(12, info.len() as u16)?; // es_info_length
                w.write_bytes(info)?;
            }
            Ok(())
        })
    }

    fn make_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> [u8; 188] {
        let mut buf = [0xffu8; 188];
        buf[0] = 0x47;
        buf[1] = (pid >> 8) as u8 | if pusi { 0x40 } else { 0 };
        buf[2] = pid as u8;
        buf[3] = 0x10 | cc;
        buf[4..4 + payload.len()].copy_from_slice(payload);
        buf
    }

    fn reparse(rewritten: &Rewritten) -> Section {
        let mut asm = SectionAssembler::new();
        assert_matches!(
            asm.feed(&rewritten.packet.as_packet()),
            SectionOutcome::Complete(s) => s
        )
    }

    const ISO_639: &[u8] = &[0x0a, 0x04, b'e', b'n', b'g', 0x00];

    #[test]
    fn two_packet_pmt() {
        // long enough descriptors to push the section into a second packet
        let padding = [0x00u8; 100];
        let mut long_info = ISO_639.to_vec();
        long_info.extend_from_slice(&[0x80, padding.len() as u8]);
        long_info.extend_from_slice(&padding);
        let body = pmt_body(
            301,
            &[],
            &[
                (0x1b, 301, &[0x52, 0x01, 0x01][..]),
                (0x03, 302, &long_info[..]),
                (0x03, 303, &long_info[..]),
            ],
        );
        let data = build_section(TABLE_ID, 7, 9, true, 0, 0, &body);
        assert!(data.len() > 183);

        let mut first = vec![0];
        first.extend_from_slice(&data[..183]);
        let p1 = make_packet(0x100, true, 3, &first);
        let p2 = make_packet(0x100, false, 4, &data[183..]);
        let mut asm = SectionAssembler::new();
        assert_matches!(
            asm.feed(&crate::packet::Packet::new(&p1[..])),
            SectionOutcome::Incomplete
        );
        let section = assert_matches!(
            asm.feed(&crate::packet::Packet::new(&p2[..])),
            SectionOutcome::Complete(s) => s
        );

        let ch = test_channel(None, &[0x100, 301, 302]);
        let out = rewrite(&section, &ch).unwrap();
        assert_eq!(out.version, 9);
        assert_eq!(out.dropped, 0);
        let pk = out.packet.as_packet();
        assert_eq!(pk.pid(), Pid::new(0x100));
        assert!(mpegts_crc::is_valid(&pk.payload().unwrap()[1..1 + reparse(&out).len()]));

        let result = reparse(&out);
        assert_eq!(result.id(), 7);
        let pmt = PmtSection::from_bytes(result.payload()).unwrap();
        assert_eq!(pmt.pcr_pid(), Pid::new(301));
        let streams: Vec<_> = pmt
            .streams()
            .map(|s| (s.stream_type(), u16::from(s.elementary_pid())))
            .collect();
        assert_eq!(streams, vec![(0x1b, 301), (0x03, 302)]);
        // nested descriptors copied unmodified
        let audio = pmt.streams().nth(1).unwrap();
        assert_eq!(&audio.bytes()[5..], &long_info[..]);
        let tags: Vec<u8> = audio
            .descriptors::<RawDescriptor<'_>>()
            .map(|d| d.unwrap().tag())
            .collect();
        assert_eq!(tags, vec![0x0a, 0x80]);
    }

    #[test]
    fn program_info_copied() {
        let ca = [0x09, 0x04, 0x01, 0x00, 0xe0, 0x20];
        let body = pmt_body(0x1fff, &ca, &[(0x02, 0x101, &[][..])]);
        let section = Section::from_vec(
            Pid::new(0x100),
            build_section(TABLE_ID, 1, 0, true, 3, 4, &body),
        )
        .unwrap();
        let ch = test_channel(Some(1), &[0x100, 0x101]);
        let result = reparse(&rewrite(&section, &ch).unwrap());
        assert_eq!(result.section_number(), 0);
        assert_eq!(result.last_section_number(), 0);
        let pmt = PmtSection::from_bytes(result.payload()).unwrap();
        assert_eq!(pmt.descriptor_bytes(), &ca[..]);
        assert_eq!(pmt.pcr_pid(), Pid::STUFFING);
        assert_eq!(pmt.streams().count(), 1);
        assert!(format!("{:?}", pmt).contains("StreamInfo"));
    }

    #[test]
    fn program_number_mismatch() {
        let body = pmt_body(0x101, &[], &[(0x02, 0x101, &[][..])]);
        let section = Section::from_vec(
            Pid::new(0x100),
            build_section(TABLE_ID, 2, 0, true, 0, 0, &body),
        )
        .unwrap();
        let ch = test_channel(Some(1), &[0x100, 0x101]);
        assert_matches!(
            rewrite(&section, &ch),
            Err(RewriteError::ProgramNumberMismatch {
                expected: 1,
                actual: 2
            })
        );
        // without a service id, any program is accepted
        let ch = test_channel(None, &[0x100, 0x101]);
        assert!(rewrite(&section, &ch).is_ok());
    }

    #[test]
    fn wrong_table_and_not_applicable() {
        let body = pmt_body(0x101, &[], &[]);
        let ch = test_channel(None, &[0x100]);
        let sdt = Section::from_vec(
            Pid::new(0x100),
            build_section(0x42, 1, 0, true, 0, 0, &body),
        )
        .unwrap();
        assert_matches!(
            rewrite(&sdt, &ch),
            Err(RewriteError::WrongTableId {
                expected: 2,
                actual: 0x42
            })
        );
        let next = Section::from_vec(
            Pid::new(0x100),
            build_section(TABLE_ID, 1, 0, false, 0, 0, &body),
        )
        .unwrap();
        assert_matches!(rewrite(&next, &ch), Err(RewriteError::NotApplicable));
    }

    #[test]
    fn malformed_lengths() {
        let ch = test_channel(None, &[0x100, 0x101]);
        // program_info_length of 0x20 with no descriptor bytes following
        let body = [0xe1, 0x01, 0xf0, 0x20, 0x02, 0xe1, 0x01, 0xf0, 0x00];
        let section = Section::from_vec(
            Pid::new(0x100),
            build_section(TABLE_ID, 1, 0, true, 0, 0, &body),
        )
        .unwrap();
        assert_matches!(rewrite(&section, &ch), Err(RewriteError::Malformed(_)));

        // es_info_length overruns; the broken entry and anything after it is skipped
        let body = [
            0xe1, 0x01, 0xf0, 0x00, // header
            0x02, 0xe1, 0x01, 0xf0, 0x00, // good entry
            0x03, 0xe1, 0x01, 0xf0, 0x40, 0x0a, // es_info_length too large
        ];
        let section = Section::from_vec(
            Pid::new(0x100),
            build_section(TABLE_ID, 1, 0, true, 0, 0, &body),
        )
        .unwrap();
        let result = reparse(&rewrite(&section, &ch).unwrap());
        let pmt = PmtSection::from_bytes(result.payload()).unwrap();
        assert_eq!(pmt.streams().count(), 1);
        assert_matches!(
            PmtSection::from_bytes(&[0xe1, 0x01]),
            Err(RewriteError::Malformed(_))
        );
    }

    #[test]
    fn overflow() {
        let mut info = vec![0x52u8, 32];
        info.resize(34, 0);
        let streams: Vec<(u8, u16, &[u8])> =
            (0..8).map(|i| (0x06, 0x200 + i, &info[..])).collect();
        let body = pmt_body(0x200, &[], &streams);
        let section = Section::from_vec(
            Pid::new(0x100),
            build_section(TABLE_ID, 1, 0, true, 0, 0, &body),
        )
        .unwrap();
        let pids: Vec<u16> = std::iter::once(0x100).chain(0x200..0x208).collect();
        let ch = test_channel(None, &pids);
        let out = rewrite(&section, &ch).unwrap();
        // each entry takes 39 bytes, and 183 - 12 - 4 leaves room for 4
        assert_eq!(out.dropped, 4);
        let result = reparse(&out);
        assert_eq!(
            PmtSection::from_bytes(result.payload())
                .unwrap()
                .streams()
                .count(),
            4
        );
    }
}
