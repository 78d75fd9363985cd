//! Splits a section into transport stream packets for sending.

use crate::packet::{ContinuityCounter, Packet, PacketBuf, Pid};

/// Payload bytes available for section data in the first packet, after the pointer_field
const FIRST_CAPACITY: usize = Packet::MAX_PAYLOAD_SIZE - 1;

/// Packs the given section into as many packets as it needs.
///
/// The first packet has `payload_unit_start_indicator` set and a zero pointer_field; the rest
/// carry the remaining bytes straight after their header.  Unused bytes at the end of the last
/// packet are filled with `0xff`.  Each packet takes the next value of `cc`.
pub fn packetise(pid: Pid, section: &[u8], cc: &mut ContinuityCounter) -> Vec<PacketBuf> {
    let split = FIRST_CAPACITY.min(section.len());
    let (first, rest) = section.split_at(split);
    let mut packets = Vec::with_capacity(1 + rest.len().div_ceil(Packet::MAX_PAYLOAD_SIZE));

    let mut pk = PacketBuf::new(pid, true);
    let payload = pk.payload_mut();
    payload[0] = 0; // pointer_field
    payload[1..1 + first.len()].copy_from_slice(first);
    packets.push(pk);

    for chunk in rest.chunks(Packet::MAX_PAYLOAD_SIZE) {
        let mut pk = PacketBuf::new(pid, false);
        pk.payload_mut()[..chunk.len()].copy_from_slice(chunk);
        packets.push(pk);
    }
    for pk in packets.iter_mut() {
        pk.set_continuity_counter(*cc);
        *cc = cc.next();
    }
    packets
}
