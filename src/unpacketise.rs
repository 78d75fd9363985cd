//! Splits a stream of bytes into transport stream packets.

use crate::packet::Packet;
use log::warn;

/// Finds 188 byte packets in buffers of arbitrary size.
///
/// A packet split across the end of one buffer is held until the following call to `push()`
/// completes it.  Bytes which don't start with the sync byte are skipped until the next sync
/// byte is found.
#[derive(Default)]
pub struct Unpacketise {
    remainder: Vec<u8>,
}

impl Unpacketise {
    pub fn new() -> Unpacketise {
        Unpacketise {
            remainder: Vec::with_capacity(Packet::SIZE),
        }
    }

    /// Number of bytes of an incomplete packet held over from the last call to `push()`
    pub fn pending(&self) -> usize {
        self.remainder.len()
    }

    /// Calls `f` for each complete packet found.
    pub fn push<F>(&mut self, mut buf: &[u8], mut f: F)
    where
        F: FnMut(Packet<'_>),
    {
        if !self.remainder.is_empty() {
            let take = (Packet::SIZE - self.remainder.len()).min(buf.len());
            self.remainder.extend_from_slice(&buf[..take]);
            buf = &buf[take..];
            if self.remainder.len() < Packet::SIZE {
                return;
            }
            f(Packet::new(&self.remainder[..]));
            self.remainder.clear();
        }
        let mut skipped = 0;
        while !buf.is_empty() {
            if !Packet::is_sync_byte(buf[0]) {
                let skip = buf
                    .iter()
                    .position(|&b| Packet::is_sync_byte(b))
                    .unwrap_or(buf.len());
                skipped += skip;
                buf = &buf[skip..];
                continue;
            }
            if buf.len() < Packet::SIZE {
                self.remainder.extend_from_slice(buf);
                break;
            }
            let (pk, rest) = buf.split_at(Packet::SIZE);
            f(Packet::new(pk));
            buf = rest;
        }
        if skipped > 0 {
            warn!("skipped {} bytes looking for a sync byte", skipped);
        }
    }
}
