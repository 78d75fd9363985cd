//! Main types implementing the demultiplexing of a transport stream into per-channel outputs.
//!
//! For each incoming packet, and each configured channel, [`Demultiplex`](struct.Demultiplex.html)
//! decides whether the packet should be
//!
//!  - passed to the channel as-is, because the channel carries its PID,
//!  - replaced by one of the tables generated for the channel, or
//!  - left out.
//!
//! Packets for a channel are handed to an implementation of
//! [`ChannelSink`](trait.ChannelSink.html), which is responsible for actually sending them.

use crate::channel::Channel;
use crate::packet::{Packet, PacketBuf, Pid};
use crate::psi::{SectionAssembler, SectionOutcome};
use crate::tables::SiTables;
use crate::unpacketise::Unpacketise;
use log::trace;
use std::sync::Arc;

/// Receives the packets to be sent to each channel.
pub trait ChannelSink {
    /// Called once for every packet the given channel should receive, in order.
    fn packet(&mut self, channel: &Channel, data: &[u8]);
}

/// A per-PID arena of section assemblers, created on first use.
struct Assemblers {
    by_pid: Vec<Option<SectionAssembler>>,
}
impl Default for Assemblers {
    fn default() -> Assemblers {
        Assemblers { by_pid: vec![] }
    }
}
impl Assemblers {
    fn get(&mut self, pid: Pid) -> &mut SectionAssembler {
        let index = usize::from(pid);
        if index >= self.by_pid.len() {
            self.by_pid.resize_with(index + 1, || None);
        }
        self.by_pid[index].get_or_insert_with(SectionAssembler::new)
    }

    fn pids(&self) -> Vec<Pid> {
        self.by_pid
            .iter()
            .enumerate()
            .filter(|(_, a)| a.is_some())
            .filter_map(|(i, _)| Pid::try_from(i as u16).ok())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generated {
    Pat,
    Pmt,
    Sdt,
    Eit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Drop,
    Pass,
    Replace(Generated),
}

/// Feeds sections from the incoming stream into [`SiTables`](../tables/struct.SiTables.html),
/// and routes every packet to the channels which should receive it.
///
/// Generated tables are sent in place of the packets which start a section on the source PID,
/// so they go out at the same rate as the source tables.  Other packets of a replaced PID are
/// swallowed.  A channel is sent nothing on a replaced PID until its table has been generated.
pub struct Demultiplex {
    tables: Arc<SiTables>,
    assemblers: Assemblers,
    unpacketise: Unpacketise,
}

impl Demultiplex {
    pub fn new(tables: Arc<SiTables>) -> Demultiplex {
        Demultiplex {
            tables,
            assemblers: Assemblers::default(),
            unpacketise: Unpacketise::new(),
        }
    }

    pub fn tables(&self) -> &Arc<SiTables> {
        &self.tables
    }

    /// PIDs on which sections have been assembled so far
    pub fn section_pids(&self) -> Vec<Pid> {
        self.assemblers.pids()
    }

    /// Process the packets in the given buffer, which need not hold a whole number of packets.
    pub fn push<S: ChannelSink>(&mut self, sink: &mut S, buf: &[u8]) {
        let mut unpacketise = std::mem::take(&mut self.unpacketise);
        unpacketise.push(buf, |pk| self.consume(sink, &pk));
        self.unpacketise = unpacketise;
    }

    /// Process one packet.
    pub fn consume<S: ChannelSink>(&mut self, sink: &mut S, pk: &Packet<'_>) {
        let pid = pk.pid();
        if self.tables.wants_sections(pid) {
            let assembler = self.assemblers.get(pid);
            if let SectionOutcome::Complete(section) = assembler.feed(pk) {
                self.tables.handle_section(section);
                while let Some(section) = assembler.pop_ready() {
                    self.tables.handle_section(section);
                }
            }
        }

        for channel in self.tables.channels() {
            match self.route(channel, pid) {
                Route::Drop => (),
                Route::Pass => sink.packet(channel, pk.buffer()),
                Route::Replace(table) => {
                    if pk.payload_unit_start_indicator() {
                        self.send_generated(sink, channel, table);
                    }
                }
            }
        }
    }

    fn route(&self, channel: &Channel, pid: Pid) -> Route {
        let config = self.tables.rewrite_config();
        let replace_if = |enabled: bool, table| {
            if enabled {
                Route::Replace(table)
            } else {
                Route::Pass
            }
        };
        match pid {
            Pid::PAT => replace_if(config.rewrite_pat, Generated::Pat),
            Pid::SDT => replace_if(
                config.rewrite_sdt && !self.tables.sdt_disabled(channel),
                Generated::Sdt,
            ),
            // without a service id there is nothing to select the channel's events by
            Pid::EIT => replace_if(
                config.rewrite_eit && channel.service_id().is_some(),
                Generated::Eit,
            ),
            pid if channel.is_pmt_pid(pid) => replace_if(config.rewrite_pmt, Generated::Pmt),
            pid if channel.carries(pid) => Route::Pass,
            _ => Route::Drop,
        }
    }

    fn send_generated<S: ChannelSink>(&self, sink: &mut S, channel: &Channel, table: Generated) {
        let send = |sink: &mut S, pk: PacketBuf| sink.packet(channel, &pk.as_bytes()[..]);
        match table {
            Generated::Pat => self.tables.pat_packet(channel).map(|pk| send(sink, pk)),
            Generated::Pmt => self.tables.pmt_packet(channel).map(|pk| send(sink, pk)),
            Generated::Sdt => self.tables.sdt_packet(channel).map(|pk| send(sink, pk)),
            Generated::Eit => {
                for pk in self.tables.eit_packets(channel) {
                    send(sink, pk);
                }
                Some(())
            }
        }
        .unwrap_or_else(|| trace!("{}: no {:?} ready yet", channel.name(), table));
    }
}
