//! Types related to the _Program Association Table_, and its per-channel rewriter.

use crate::channel::Channel;
use crate::error::RewriteError;
use crate::packet::Pid;
use crate::psi::{Collected, CurrentNext, Rewritten, Section, SectionCollector, SectionWriter};
use log::{debug, trace, warn};

/// The table_id of every Program Association Section
pub const TABLE_ID: u8 = 0x00;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramDescriptor {
    /// `program_number` zero; the PID carries the _Network Information Table_
    Network { pid: Pid },
    /// The PID carries the _Program Map Table_ for the given program
    Program { program_number: u16, pid: Pid },
}

impl ProgramDescriptor {
    pub const SIZE: usize = 4;

    /// panics if fewer than 4 bytes are provided
    pub fn from_bytes(data: &[u8]) -> ProgramDescriptor {
        let program_number = (u16::from(data[0]) << 8) | u16::from(data[1]);
        let pid = Pid::new((u16::from(data[2]) & 0b0001_1111) << 8 | u16::from(data[3]));
        if program_number == 0 {
            ProgramDescriptor::Network { pid }
        } else {
            ProgramDescriptor::Program {
                program_number,
                pid,
            }
        }
    }

    pub fn pid(&self) -> Pid {
        match *self {
            ProgramDescriptor::Network { pid } => pid,
            ProgramDescriptor::Program { pid, .. } => pid,
        }
    }

    pub fn program_number(&self) -> u16 {
        match *self {
            ProgramDescriptor::Network { .. } => 0,
            ProgramDescriptor::Program { program_number, .. } => program_number,
        }
    }
}

/// Sections of the _Program Association Table_ give details of the programs within a transport
/// stream.  There may be only one program, or in the case of a broadcast multiplex, there may
/// be many.
#[derive(Clone, Debug)]
pub struct PatSection<'buf> {
    data: &'buf [u8],
}
impl<'buf> PatSection<'buf> {
    /// Wraps the payload of a PAT section, as returned by
    /// [`Section::payload()`](../struct.Section.html#method.payload).
    pub fn new(data: &'buf [u8]) -> PatSection<'buf> {
        PatSection { data }
    }

    /// Any trailing bytes too few to hold a whole entry are ignored.
    pub fn programs(&self) -> impl Iterator<Item = ProgramDescriptor> + 'buf {
        self.entries().map(ProgramDescriptor::from_bytes)
    }

    /// The raw 4 byte program entries
    fn entries(&self) -> std::slice::ChunksExact<'buf, u8> {
        self.data.chunks_exact(ProgramDescriptor::SIZE)
    }
}

/// Holds the sections of the most recent PAT version seen on PID `0x0000`.
#[derive(Debug, Default)]
pub struct PatTracker {
    collector: SectionCollector,
}

impl PatTracker {
    pub fn new() -> PatTracker {
        PatTracker::default()
    }

    /// Store a received PAT section, returning the table version once every section of that
    /// version is held.
    pub fn observe(&mut self, section: Section) -> Result<Option<u8>, RewriteError> {
        check_header(&section)?;
        let version = section.version();
        let previous = self.collector.version();
        match self.collector.insert(section) {
            Collected::NewVersion => warn!(
                "{}: PAT version changed from {:?} to {}",
                Pid::PAT,
                previous,
                version
            ),
            Collected::Stored => trace!("{}: new PAT section, version {}", Pid::PAT, version),
            Collected::Repeated => (),
        }
        if self.collector.is_complete() {
            Ok(Some(version))
        } else {
            Ok(None)
        }
    }

    pub fn version(&self) -> Option<u8> {
        self.collector.version()
    }

    pub fn is_complete(&self) -> bool {
        self.collector.is_complete()
    }

    /// The sections of the current version, in order
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.collector.sections()
    }
}

fn check_header(section: &Section) -> Result<(), RewriteError> {
    if section.table_id() != TABLE_ID {
        return Err(RewriteError::WrongTableId {
            expected: TABLE_ID,
            actual: section.table_id(),
        });
    }
    if section.current_next_indicator() == CurrentNext::Next {
        debug!("{}: ignoring PAT with current_next_indicator=0", section.pid());
        return Err(RewriteError::NotApplicable);
    }
    Ok(())
}

/// Generates a single-section PAT for the given channel from all sections of a source PAT.
///
/// The network entry (`program_number` 0) is always kept.  Other entries are kept when the
/// channel carries the PMT PID they reference and, if `filter_by_service_id` is set, when the
/// `program_number` is also the channel's service id.  Entries that don't fit in one packet are
/// left out and counted in `Rewritten::dropped`.
pub fn rewrite<'a, I>(
    sections: I,
    channel: &Channel,
    filter_by_service_id: bool,
) -> Result<Rewritten, RewriteError>
where
    I: IntoIterator<Item = &'a Section>,
{
    let mut sections = sections.into_iter().peekable();
    let first = sections
        .peek()
        .ok_or(RewriteError::Malformed("PAT has no sections"))?;
    check_header(first)?;
    let version = first.version();

    let mut writer = SectionWriter::new(Pid::PAT);
    if !writer.push(&first.normalised_header()) {
        return Err(RewriteError::Malformed("PAT header"));
    }
    let mut kept = 0;
    let mut dropped = 0;
    for section in sections {
        check_header(section)?;
        for entry in PatSection::new(section.payload()).entries() {
            let program = ProgramDescriptor::from_bytes(entry);
            let keep = match program {
                ProgramDescriptor::Network { .. } => true,
                ProgramDescriptor::Program {
                    program_number,
                    pid,
                } => {
                    channel.carries(pid)
                        && (!filter_by_service_id || channel.service_id() == Some(program_number))
                }
            };
            if !keep {
                continue;
            }
            if writer.push(entry) {
                kept += 1;
            } else {
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        warn!(
            "{}: {} PAT entries dropped, as the table would not fit in one packet",
            channel.name(),
            dropped
        );
    }
    debug!(
        "{}: generated PAT version {} with {} entries",
        channel.name(),
        version,
        kept
    );
    Ok(Rewritten {
        packet: writer.finish(),
        version,
        dropped,
    })
}
