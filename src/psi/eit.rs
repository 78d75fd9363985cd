//! Types related to the _Event Information Table_.
//!
//! Unlike the other tables, the EIT is not rewritten.  Sections are stored per service and
//! table_id as they arrive, and each channel is sent the stored sections for its own service in
//! rotation, using an [`EitCursor`](struct.EitCursor.html).

use crate::error::RewriteError;
use crate::psi::{Collected, CurrentNext, Section, SectionCollector};
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;

/// table_id of the present/following EIT for the actual transport stream
pub const PRESENT_FOLLOWING: u8 = 0x4e;
/// table_id of the first EIT schedule table for the actual transport stream
pub const SCHEDULE_FIRST: u8 = 0x50;
/// table_id of the last EIT schedule table for the actual transport stream
pub const SCHEDULE_LAST: u8 = 0x5f;

/// The present/following table plus 16 schedule tables
const TABLE_ID_COUNT: usize = 1 + (SCHEDULE_LAST - SCHEDULE_FIRST) as usize + 1;

/// `true` for the table_ids of EIT sections describing the actual transport stream.
pub fn is_eit_table_id(table_id: u8) -> bool {
    table_id == PRESENT_FOLLOWING || (SCHEDULE_FIRST..=SCHEDULE_LAST).contains(&table_id)
}

/// The table_id to send after the given one: `0x4e`, then `0x50` to `0x5f`, then back to
/// `0x4e`.
///
/// ```
/// # use dvb_si_rewrite::psi::eit::next_table_id;
/// assert_eq!(next_table_id(0x4e), 0x50);
/// assert_eq!(next_table_id(0x55), 0x56);
/// assert_eq!(next_table_id(0x5f), 0x4e);
/// ```
pub fn next_table_id(table_id: u8) -> u8 {
    match table_id {
        PRESENT_FOLLOWING => SCHEDULE_FIRST,
        SCHEDULE_FIRST..=0x5e => table_id + 1,
        _ => PRESENT_FOLLOWING,
    }
}

/// The payload of an Event Information Section, following the 8 byte section header.
pub struct EitSection<'buf> {
    data: &'buf [u8],
}

impl<'buf> EitSection<'buf> {
    pub const HEADER_SIZE: usize = 6;

    pub fn from_bytes(data: &'buf [u8]) -> Result<EitSection<'buf>, RewriteError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(RewriteError::Malformed("EIT too short for header"));
        }
        Ok(EitSection { data })
    }

    pub fn transport_stream_id(&self) -> u16 {
        u16::from(self.data[0]) << 8 | u16::from(self.data[1])
    }
    pub fn original_network_id(&self) -> u16 {
        u16::from(self.data[2]) << 8 | u16::from(self.data[3])
    }
    /// The last section_number of the segment this section belongs to
    pub fn segment_last_section_number(&self) -> u8 {
        self.data[4]
    }
    pub fn last_table_id(&self) -> u8 {
        self.data[5]
    }
    pub fn events(&self) -> impl Iterator<Item = EventEntry<'buf>> {
        EventIter {
            buf: &self.data[Self::HEADER_SIZE..],
        }
    }
}

impl<'buf> fmt::Debug for EitSection<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("EitSection")
            .field("transport_stream_id", &self.transport_stream_id())
            .field("original_network_id", &self.original_network_id())
            .field(
                "segment_last_section_number",
                &self.segment_last_section_number(),
            )
            .field("last_table_id", &self.last_table_id())
            .field("events", &self.events().collect::<Vec<_>>())
            .finish()
    }
}

struct EventIter<'buf> {
    buf: &'buf [u8],
}

impl<'buf> Iterator for EventIter<'buf> {
    type Item = EventEntry<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.len() < EventEntry::HEADER_SIZE {
            return None;
        }
        let loop_length =
            (u16::from(self.buf[10] & 0b0000_1111) << 8 | u16::from(self.buf[11])) as usize;
        let end = EventEntry::HEADER_SIZE + loop_length;
        if end > self.buf.len() {
            self.buf = &self.buf[0..0];
            return None;
        }
        let (data, rest) = self.buf.split_at(end);
        self.buf = rest;
        Some(EventEntry { data })
    }
}

/// One event listed in an EIT section.
pub struct EventEntry<'buf> {
    data: &'buf [u8],
}

impl<'buf> EventEntry<'buf> {
    pub const HEADER_SIZE: usize = 12;

    pub fn event_id(&self) -> u16 {
        u16::from(self.data[0]) << 8 | u16::from(self.data[1])
    }
    /// Modified Julian Date followed by 6 BCD digits of UTC time
    pub fn start_time(&self) -> &'buf [u8] {
        &self.data[2..7]
    }
    /// 6 BCD digits, hours minutes and seconds
    pub fn duration(&self) -> &'buf [u8] {
        &self.data[7..10]
    }
    pub fn running_status(&self) -> u8 {
        self.data[10] >> 5
    }
    pub fn free_ca_mode(&self) -> bool {
        self.data[10] & 0b0001_0000 != 0
    }
    pub fn descriptor_bytes(&self) -> &'buf [u8] {
        &self.data[Self::HEADER_SIZE..]
    }
}

impl<'buf> fmt::Debug for EventEntry<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("EventEntry")
            .field("event_id", &self.event_id())
            .field("start_time", &format!("{:02x?}", self.start_time()))
            .field("duration", &format!("{:02x?}", self.duration()))
            .field("running_status", &self.running_status())
            .finish()
    }
}

/// The stored sections of one EIT sub-table, that is, one table_id for one service.
///
/// Sections are kept until the version changes; nothing expires.
#[derive(Debug, Default)]
pub struct EitRecord {
    sections: SectionCollector,
}

impl EitRecord {
    pub fn version(&self) -> Option<u8> {
        self.sections.version()
    }
    pub fn last_section_number(&self) -> u8 {
        self.sections.last_section_number()
    }
    pub fn section(&self, section_number: u8) -> Option<&Section> {
        self.sections.section(section_number)
    }
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
    /// Number of sections held
    pub fn len(&self) -> usize {
        self.sections.seen().count_ones(..)
    }
}

/// Every EIT sub-table seen so far, keyed by `(service_id, table_id)`.
#[derive(Debug, Default)]
pub struct EitStore {
    records: HashMap<(u16, u8), EitRecord>,
}

impl EitStore {
    pub fn new() -> EitStore {
        EitStore::default()
    }

    /// Store an EIT section, replacing the record's contents if its version has changed.
    pub fn observe(&mut self, section: Section) -> Result<Collected, RewriteError> {
        let table_id = section.table_id();
        if !is_eit_table_id(table_id) {
            return Err(RewriteError::WrongTableId {
                expected: PRESENT_FOLLOWING,
                actual: table_id,
            });
        }
        if section.current_next_indicator() == CurrentNext::Next {
            debug!(
                "{}: ignoring EIT with current_next_indicator=0",
                section.pid()
            );
            return Err(RewriteError::NotApplicable);
        }
        let service_id = section.id();
        let version = section.version();
        let record = self.records.entry((service_id, table_id)).or_default();
        let collected = record.sections.insert(section);
        if collected == Collected::NewVersion {
            debug!(
                "EIT for service {:#06x} table_id {:#04x} now version {}",
                service_id, table_id, version
            );
        }
        Ok(collected)
    }

    pub fn record(&self, service_id: u16, table_id: u8) -> Option<&EitRecord> {
        self.records.get(&(service_id, table_id))
    }

    /// Number of `(service_id, table_id)` records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A channel's position in its rotation through the stored EIT sections of its service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EitCursor {
    table_id: u8,
    section_index: usize,
}

impl Default for EitCursor {
    fn default() -> EitCursor {
        EitCursor {
            table_id: PRESENT_FOLLOWING,
            section_index: 0,
        }
    }
}

impl EitCursor {
    pub fn new() -> EitCursor {
        EitCursor::default()
    }

    pub fn table_id(&self) -> u8 {
        self.table_id
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    /// Find the next stored section for the given service, and move the cursor past it.
    ///
    /// Missing sections and missing tables are skipped.  The search covers one full cycle of
    /// table_ids; if nothing is found, the cursor is left where it was and `None` is returned.
    pub fn next_section<'s>(&mut self, store: &'s EitStore, service_id: u16) -> Option<&'s Section> {
        let start = self.clone();
        for visit in 0..=TABLE_ID_COUNT {
            let wrapped = visit == TABLE_ID_COUNT;
            if let Some(record) = store.record(service_id, self.table_id) {
                let last = usize::from(record.last_section_number());
                // back at the starting table, only the sections ahead of the start remain
                let end = if wrapped {
                    start.section_index.min(last + 1)
                } else {
                    last + 1
                };
                while self.section_index < end {
                    let number = self.section_index as u8;
                    self.section_index += 1;
                    if let Some(section) = record.section(number) {
                        if self.section_index > last {
                            self.next_table();
                        }
                        return Some(section);
                    }
                }
            }
            if wrapped {
                break;
            }
            self.next_table();
        }
        *self = start;
        None
    }

    fn next_table(&mut self) {
        self.table_id = next_table_id(self.table_id);
        self.section_index = 0;
        trace!("EIT cursor moved to table_id {:#04x}", self.table_id);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::packet::Pid;
    use crate::psi::build_section;
    use assert_matches::assert_matches;
    use hex_literal::*;

    // one event: id 0x1234, 2024-01-01 20:00:00 UTC (MJD 0xed2d), 1h30m, running
    const EVENT: [u8; 12] = hex!("1234 ed2d200000 013000 8000");

    fn eit(table_id: u8, service_id: u16, version: u8, number: u8, last: u8) -> Section {
        let mut body = hex!("4084 233a 00").to_vec();
        body.push(table_id);
        body.extend_from_slice(&EVENT);
        Section::from_vec(
            Pid::EIT,
            build_section(table_id, service_id, version, true, number, last, &body),
        )
        .unwrap()
    }

    #[test]
    fn table_id_cycle() {
        let mut id = PRESENT_FOLLOWING;
        let mut visited = vec![];
        for _ in 0..TABLE_ID_COUNT {
            visited.push(id);
            id = next_table_id(id);
        }
        assert_eq!(id, PRESENT_FOLLOWING);
        assert_eq!(visited.len(), 17);
        assert!(visited.iter().all(|&id| is_eit_table_id(id)));
        assert!(!is_eit_table_id(0x4f));
        assert!(!is_eit_table_id(0x60));
        assert_eq!(next_table_id(0x42), PRESENT_FOLLOWING);
    }

    #[test]
    fn parse_section() {
        let section = eit(0x4e, 0x4440, 0, 0, 1);
        let e = EitSection::from_bytes(section.payload()).unwrap();
        assert_eq!(e.transport_stream_id(), 0x4084);
        assert_eq!(e.original_network_id(), 0x233a);
        assert_eq!(e.last_table_id(), 0x4e);
        let events: Vec<_> = e.events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id(), 0x1234);
        assert_eq!(events[0].duration(), &[0x01, 0x30, 0x00]);
        assert_eq!(events[0].running_status(), 4);
        assert!(events[0].descriptor_bytes().is_empty());
    }

    #[test]
    fn store_versions() {
        let mut store = EitStore::new();
        assert_matches!(store.observe(eit(0x4e, 1, 3, 0, 1)), Ok(Collected::Stored));
        assert_matches!(store.observe(eit(0x4e, 1, 3, 1, 1)), Ok(Collected::Stored));
        assert_matches!(store.observe(eit(0x4e, 1, 3, 1, 1)), Ok(Collected::Repeated));
        assert_matches!(store.observe(eit(0x50, 1, 7, 0, 0)), Ok(Collected::Stored));
        assert_matches!(store.observe(eit(0x4e, 2, 3, 0, 0)), Ok(Collected::Stored));
        assert_eq!(store.len(), 3);
        assert_eq!(store.record(1, 0x4e).unwrap().len(), 2);

        // a new version clears the record, but keeps it
        assert_matches!(store.observe(eit(0x4e, 1, 4, 1, 1)), Ok(Collected::NewVersion));
        let record = store.record(1, 0x4e).unwrap();
        assert_eq!(record.version(), Some(4));
        assert_eq!(record.len(), 1);
        assert!(record.section(0).is_none());
        assert!(record.section(1).is_some());
        // other records untouched
        assert_eq!(store.record(1, 0x50).unwrap().version(), Some(7));
    }

    #[test]
    fn store_rejects() {
        let mut store = EitStore::new();
        let sdt = Section::from_vec(Pid::EIT, build_section(0x42, 1, 0, true, 0, 0, &[0; 3]))
            .unwrap();
        assert_matches!(
            store.observe(sdt),
            Err(RewriteError::WrongTableId { actual: 0x42, .. })
        );
        let next = Section::from_vec(
            Pid::EIT,
            build_section(0x4e, 1, 0, false, 0, 0, &[0; 6]),
        )
        .unwrap();
        assert_matches!(store.observe(next), Err(RewriteError::NotApplicable));
        assert!(store.is_empty());
    }

    fn position(section: &Section) -> (u8, u8) {
        (section.table_id(), section.section_number())
    }

    #[test]
    fn cursor_rotation() {
        let mut store = EitStore::new();
        store.observe(eit(0x4e, 1, 0, 0, 1)).unwrap();
        store.observe(eit(0x4e, 1, 0, 1, 1)).unwrap();
        // schedule table with a hole at section 1
        store.observe(eit(0x50, 1, 0, 0, 2)).unwrap();
        store.observe(eit(0x50, 1, 0, 2, 2)).unwrap();
        store.observe(eit(0x5f, 1, 0, 0, 0)).unwrap();
        // another service's tables are never sent
        store.observe(eit(0x51, 2, 0, 0, 0)).unwrap();

        let mut cursor = EitCursor::new();
        let sent: Vec<_> = (0..12)
            .map(|_| position(cursor.next_section(&store, 1).unwrap()))
            .collect();
        assert_eq!(
            sent,
            vec![
                (0x4e, 0),
                (0x4e, 1),
                (0x50, 0),
                (0x50, 2),
                (0x5f, 0),
                (0x4e, 0),
                (0x4e, 1),
                (0x50, 0),
                (0x50, 2),
                (0x5f, 0),
                (0x4e, 0),
                (0x4e, 1),
            ]
        );
    }

    #[test]
    fn cursor_gives_up_when_empty() {
        let mut store = EitStore::new();
        let mut cursor = EitCursor::new();
        assert!(cursor.next_section(&store, 1).is_none());
        store.observe(eit(0x51, 2, 0, 0, 0)).unwrap();
        assert!(cursor.next_section(&store, 1).is_none());
        assert_eq!(cursor, EitCursor::new());
    }

    #[test]
    fn fruitless_search_leaves_cursor_in_place() {
        let mut store = EitStore::new();
        store.observe(eit(0x4e, 1, 0, 0, 1)).unwrap();
        store.observe(eit(0x4e, 1, 0, 1, 1)).unwrap();
        store.observe(eit(0x52, 1, 0, 0, 0)).unwrap();
        let mut cursor = EitCursor::new();
        assert_eq!(position(cursor.next_section(&store, 1).unwrap()), (0x4e, 0));
        let before = cursor.clone();
        for _ in 0..3 {
            assert!(cursor.next_section(&store, 7).is_none());
        }
        assert_eq!(cursor, before);
        assert_eq!(cursor.table_id(), 0x4e);
        assert_eq!(cursor.section_index(), 1);
        // the rotation carries on from where it was
        assert_eq!(position(cursor.next_section(&store, 1).unwrap()), (0x4e, 1));
        assert_eq!(position(cursor.next_section(&store, 1).unwrap()), (0x52, 0));
        assert_eq!(position(cursor.next_section(&store, 1).unwrap()), (0x4e, 0));
    }

    #[test]
    fn cursor_single_section() {
        let mut store = EitStore::new();
        store.observe(eit(0x55, 9, 0, 0, 0)).unwrap();
        let mut cursor = EitCursor::new();
        for _ in 0..3 {
            assert_eq!(position(cursor.next_section(&store, 9).unwrap()), (0x55, 0));
        }
    }

    #[test]
    fn cursor_revisits_earlier_sections_of_start_table() {
        let mut store = EitStore::new();
        store.observe(eit(0x4e, 1, 0, 0, 3)).unwrap();
        let mut cursor = EitCursor::new();
        assert_eq!(position(cursor.next_section(&store, 1).unwrap()), (0x4e, 0));
        // sections 1 to 3 are missing, so the cursor wraps all the way round to section 0
        assert_eq!(position(cursor.next_section(&store, 1).unwrap()), (0x4e, 0));
    }
}
