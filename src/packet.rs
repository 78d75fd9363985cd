//! A [`Packet`](./struct.Packet.html) struct and associated infrastructure to read an MPEG Transport
//! Stream packet, plus the owned [`PacketBuf`](./struct.PacketBuf.html) used for packets that
//! this crate generates.

use log::warn;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;

/// the different values indicating whether a `Packet`'s `payload()` method will return `Some` or
/// `None`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AdaptationControl {
    /// This value is used if the transport stream packet `adaptation_control` field uses the value
    /// `0b00`, which ISO/IEC 13818-1 reserves.
    Reserved,
    /// indicates that this packet contains a payload, but not an adaptation field
    PayloadOnly,
    /// indicates that this packet contains an adaptation field, but not a payload
    AdaptationFieldOnly,
    /// indicates that this packet contains both an adaptation field and a payload
    AdaptationFieldAndPayload,
}

impl AdaptationControl {
    #[inline(always)]
    fn from(val: u8) -> AdaptationControl {
        match val & 0b11 {
            0 => AdaptationControl::Reserved,
            1 => AdaptationControl::PayloadOnly,
            2 => AdaptationControl::AdaptationFieldOnly,
            _ => AdaptationControl::AdaptationFieldAndPayload,
        }
    }

    /// True if this AdaptationControl variant indicates that the packet will have a payload
    #[inline(always)]
    pub fn has_payload(self) -> bool {
        match self {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => false,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => true,
        }
    }
}

/// A counter value used within a transport stream to detect discontinuities in a sequence of packets.
/// The continuity counter should increase by one for each packet with a given PID for which
/// `adaptation_control` indicates that a payload should be present.
///
/// See [`Packet.continuity_counter()`](struct.Packet.html#method.continuity_counter)
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct ContinuityCounter {
    val: u8,
}

impl From<u8> for ContinuityCounter {
    /// Only the low 4 bits of the given value are used.
    #[inline]
    fn from(count: u8) -> ContinuityCounter {
        ContinuityCounter {
            val: count & 0b1111,
        }
    }
}

impl ContinuityCounter {
    /// Panics if the given value is greater than 15.
    #[inline]
    pub fn new(count: u8) -> ContinuityCounter {
        assert!(count < 0b10000);
        ContinuityCounter { val: count }
    }

    /// Returns this counter's value, which will be between 0 and 15 inclusive.
    #[inline]
    pub fn count(self) -> u8 {
        self.val
    }

    /// true iff the given `ContinuityCounter` value follows this one.  Note that the maximum counter
    /// value is 15, and the counter 'wraps around':
    ///
    /// ```rust
    /// # use dvb_si_rewrite::packet::ContinuityCounter;
    /// let a = ContinuityCounter::new(0);
    /// let b = ContinuityCounter::new(15);
    /// assert!(a.follows(b));  // after 15, counter wraps around to 0
    /// ```
    #[inline]
    pub fn follows(self, other: ContinuityCounter) -> bool {
        (other.val + 1) & 0b1111 == self.val
    }

    /// The counter value which should appear on the next packet of the same PID.
    #[inline]
    pub fn next(self) -> ContinuityCounter {
        ContinuityCounter {
            val: (self.val + 1) & 0b1111,
        }
    }
}

/// A Packet Identifier value, between `0x0000` and `0x1fff`.
///
/// PID values identify a particular sub-stream within the overall Transport Stream.
///
/// As returned by the [`Packet::pid`](struct.Packet.html#method.pid) method for example.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);
impl Pid {
    /// The largest possible PID value, `0x1fff`.
    pub const MAX_VALUE: u16 = 0x1fff;

    /// The total number of distinct PID values, `0x2000` (equal to `MAX_VALUE` + 1)
    pub const PID_COUNT: usize = (Self::MAX_VALUE + 1) as usize;

    /// The Program Association Table is always carried on PID `0x0000`
    pub const PAT: Pid = Pid::new(0);
    /// DVB Service Description Table (and Bouquet Association Table) PID
    pub const SDT: Pid = Pid::new(0x11);
    /// DVB Event Information Table PID
    pub const EIT: Pid = Pid::new(0x12);
    /// Packets on this PID carry no data and are used only to pad the stream
    pub const STUFFING: Pid = Pid::new(0x1fff);

    /// Panics if the given value is greater than `Pid::MAX_VALUE`.
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= 0x1fff);
        Pid(pid)
    }
}
impl TryFrom<u16> for Pid {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Pid::MAX_VALUE {
            Ok(Pid(value))
        } else {
            Err(())
        }
    }
}
impl From<Pid> for u16 {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0
    }
}
impl From<Pid> for usize {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0 as usize
    }
}
impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Pid({:04x})", self.0)
    }
}
impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:#06x}", self.0)
    }
}

/// A transport stream `Packet` is a wrapper around a byte slice which allows the bytes to be
/// interpreted as a packet structure per _ISO/IEC 13818-1, Section 2.4.3.3_.
pub struct Packet<'buf> {
    buf: &'buf [u8],
}

const FIXED_HEADER_SIZE: usize = 4;
// when AF present, a 1-byte 'length' field precedes the content,
const ADAPTATION_FIELD_OFFSET: usize = FIXED_HEADER_SIZE + 1;

impl<'buf> Packet<'buf> {
    /// The value `0x47`, which must appear in the first byte of every transport stream packet.
    pub const SYNC_BYTE: u8 = 0x47;

    /// The fixed 188 byte size of a transport stream packet.
    pub const SIZE: usize = 188;

    /// The largest payload a packet can carry, when no adaptation field is present.
    pub const MAX_PAYLOAD_SIZE: usize = Self::SIZE - FIXED_HEADER_SIZE;

    /// returns `true` if the given value is a valid synchronisation byte, the value `Packet::SYNC_BYTE` (0x47), which
    /// must appear at the start of every transport stream packet.
    #[inline(always)]
    pub fn is_sync_byte(b: u8) -> bool {
        b == Self::SYNC_BYTE
    }

    /// Panics if the buffer size is not exactly `Packet::SIZE` (188) bytes, or if the first
    /// byte value is not equal to `Packet::SYNC_BYTE` (0x47).  Calling code is expected to have
    /// already checked those conditions.
    #[inline(always)]
    pub fn new(buf: &'buf [u8]) -> Packet<'buf> {
        assert_eq!(buf.len(), Self::SIZE);
        assert!(Packet::is_sync_byte(buf[0]));
        Packet { buf }
    }

    /// Like `new()`, but returns `None` if the buffer is not exactly 188 bytes long or the
    /// sync-byte has incorrect value.
    #[inline(always)]
    pub fn try_new(buf: &'buf [u8]) -> Option<Packet<'buf>> {
        if buf.len() == Self::SIZE && Packet::is_sync_byte(buf[0]) {
            Some(Packet { buf })
        } else {
            None
        }
    }

    /// *May* have been set if some previous processing of this TS data detected at least
    /// 1 uncorrectable bit error in this TS packet.
    #[inline]
    pub fn transport_error_indicator(&self) -> bool {
        self.buf[1] & 0b1000_0000 != 0
    }

    /// a structure larger than a single packet payload needs to be split across multiple packets,
    /// `payload_unit_start()` indicates if this packet payload contains the start of the
    /// structure.  If `false`, this packets payload is a continuation of a structure which began
    /// in an earlier packet within the transport stream.
    #[inline]
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.buf[1] & 0b0100_0000 != 0
    }

    /// The sub-stream to which a particular packet belongs is indicated by this Packet Identifier
    /// value.
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid(u16::from(self.buf[1] & 0b0001_1111) << 8 | u16::from(self.buf[2]))
    }

    /// The returned enum value indicates if `payload()` will return something.
    #[inline]
    pub fn adaptation_control(&self) -> AdaptationControl {
        AdaptationControl::from(self.buf[3] >> 4 & 0b11)
    }

    /// Each packet with a given `pid()` value within a transport stream should have a continuity
    /// counter value which increases by 1 from the last counter value seen.  Unexpected continuity
    /// counter values allow the receiver of the transport stream to detect discontinuities in the
    /// stream (e.g. due to data loss during transmission).
    #[inline]
    pub fn continuity_counter(&self) -> ContinuityCounter {
        ContinuityCounter::from(self.buf[3] & 0b0000_1111)
    }

    fn adaptation_field_length(&self) -> usize {
        self.buf[4] as usize
    }

    /// The data contained within the packet, not including the packet headers.
    /// Not all packets have a payload, and `None` is returned if `adaptation_control()` indicates
    /// that no payload is present.  None may also be returned if the packet is malformed.
    /// If `Some` payload is returned, it is guaranteed not to be an empty slice.
    #[inline(always)]
    pub fn payload(&self) -> Option<&'buf [u8]> {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => None,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => {
                self.mk_payload()
            }
        }
    }

    #[inline]
    fn mk_payload(&self) -> Option<&'buf [u8]> {
        let offset = self.content_offset();
        let len = self.buf.len();
        match offset.cmp(&len) {
            Ordering::Equal => {
                warn!("{}: no payload data present", self.pid());
                None
            }
            Ordering::Greater => {
                warn!(
                    "{}: adaptation_field_length {} too large",
                    self.pid(),
                    self.adaptation_field_length()
                );
                None
            }
            Ordering::Less => Some(&self.buf[offset..]),
        }
    }

    /// borrow a reference to the underlying buffer of this packet
    pub fn buffer(&self) -> &'buf [u8] {
        self.buf
    }

    #[inline]
    fn content_offset(&self) -> usize {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::PayloadOnly => FIXED_HEADER_SIZE,
            AdaptationControl::AdaptationFieldOnly
            | AdaptationControl::AdaptationFieldAndPayload => {
                ADAPTATION_FIELD_OFFSET + self.adaptation_field_length()
            }
        }
    }
}

/// An owned transport stream packet, as produced when generating tables.
///
/// The packet always has a payload and no adaptation field; unused payload bytes hold `0xff`.
#[derive(Clone, PartialEq, Eq)]
pub struct PacketBuf {
    buf: [u8; Packet::SIZE],
}

impl PacketBuf {
    /// Create a payload-only packet for the given PID, with continuity counter `0` and a payload
    /// filled with `0xff` stuffing.
    pub fn new(pid: Pid, payload_unit_start: bool) -> PacketBuf {
        let mut buf = [0xff; Packet::SIZE];
        let pid = u16::from(pid);
        buf[0] = Packet::SYNC_BYTE;
        buf[1] = (pid >> 8) as u8 & 0b0001_1111;
        if payload_unit_start {
            buf[1] |= 0b0100_0000;
        }
        buf[2] = pid as u8;
        buf[3] = 0b0001_0000; // PayloadOnly, counter 0
        PacketBuf { buf }
    }

    /// The 184 bytes following the fixed packet header.
    pub fn payload(&self) -> &[u8] {
        &self.buf[FIXED_HEADER_SIZE..]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[FIXED_HEADER_SIZE..]
    }

    /// Overwrite the 4-bit continuity counter field.
    pub fn set_continuity_counter(&mut self, cc: ContinuityCounter) {
        self.buf[3] = (self.buf[3] & 0b1111_0000) | cc.count();
    }

    /// View this buffer through the same accessors used for received packets
    pub fn as_packet(&self) -> Packet<'_> {
        Packet { buf: &self.buf[..] }
    }

    pub fn as_bytes(&self) -> &[u8; Packet::SIZE] {
        &self.buf
    }
}

impl fmt::Debug for PacketBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let pk = self.as_packet();
        f.debug_struct("PacketBuf")
            .field("pid", &pk.pid())
            .field(
                "payload_unit_start_indicator",
                &pk.payload_unit_start_indicator(),
            )
            .field("continuity_counter", &pk.continuity_counter().count())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::packet::*;

    #[test]
    fn pid() {
        assert!(Pid::try_from(0x2000).is_err());
        assert_eq!(Pid::try_from(0x1fff), Ok(Pid::STUFFING));
        assert_eq!(format!("{}", Pid::SDT), "0x0011");
    }

    #[test]
    #[should_panic]
    fn zero_len() {
        let buf = [0u8; 0];
        Packet::new(&buf[..]);
    }

    #[test]
    fn try_new_rejects_bad_input() {
        assert!(Packet::try_new(&[0x47u8; 187][..]).is_none());
        let mut buf = [0u8; Packet::SIZE];
        assert!(Packet::try_new(&buf[..]).is_none());
        buf[0] = Packet::SYNC_BYTE;
        assert!(Packet::try_new(&buf[..]).is_some());
    }

    #[test]
    fn test_xmas_tree() {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[4] = 28; // adaptation_field_length
        let pk = Packet::new(&buf[..]);
        assert_eq!(u16::from(pk.pid()), 0b1111111111111u16);
        assert!(pk.transport_error_indicator());
        assert!(pk.payload_unit_start_indicator());
        assert_eq!(
            pk.adaptation_control(),
            AdaptationControl::AdaptationFieldAndPayload
        );
        assert_eq!(pk.continuity_counter().count(), 0b1111);
        assert_eq!(pk.payload().map(|p| p.len()), Some(Packet::SIZE - 5 - 28));
    }

    #[test]
    fn reserved_and_af_only_have_no_payload() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0000_0000; // Reserved
        assert!(Packet::new(&buf[..]).payload().is_none());
        buf[3] = 0b0010_0000; // AdaptationFieldOnly
        buf[4] = 183;
        assert!(Packet::new(&buf[..]).payload().is_none());
    }

    #[test]
    fn oversized_adaptation_field() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0011_0000; // AdaptationFieldAndPayload
        buf[4] = 183; // leaves no room for payload
        assert!(Packet::new(&buf[..]).payload().is_none());
        buf[4] = 200;
        assert!(Packet::new(&buf[..]).payload().is_none());
    }

    #[test]
    fn counter_wraps() {
        let cc = ContinuityCounter::new(15);
        assert_eq!(cc.next().count(), 0);
        assert!(cc.next().follows(cc));
        assert!(!cc.follows(cc));
        assert_eq!(ContinuityCounter::from(0x1f).count(), 0xf);
    }

    #[test]
    fn packet_buf() {
        let mut pk = PacketBuf::new(Pid::new(0x1234 & 0x1fff), true);
        pk.set_continuity_counter(ContinuityCounter::new(9));
        pk.payload_mut()[0] = 0;
        let view = pk.as_packet();
        assert_eq!(view.pid(), Pid::new(0x1234 & 0x1fff));
        assert!(view.payload_unit_start_indicator());
        assert!(!view.transport_error_indicator());
        assert_eq!(view.adaptation_control(), AdaptationControl::PayloadOnly);
        assert_eq!(view.continuity_counter().count(), 9);
        let payload = view.payload().unwrap();
        assert_eq!(payload.len(), Packet::MAX_PAYLOAD_SIZE);
        assert_eq!(payload[0], 0);
        assert!(payload[1..].iter().all(|&b| b == 0xff));
    }
}
