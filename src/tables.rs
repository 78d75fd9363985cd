//! The shared state which ties the table rewriters to the configured channels.
//!
//! [`SiTables`](struct.SiTables.html) is fed complete sections by the ingestion path (usually
//! via [`Demultiplex`](../demultiplex/struct.Demultiplex.html)), and regenerates each channel's
//! tables when the source tables change.  The same instance can be shared through an `Arc` with
//! a thread which sends the generated tables out.
//!
//! Locks are always taken in the same order: a shared tracker or store first, then a channel's
//! tables.

use crate::channel::Channel;
use crate::config::{RewriteConfig, SiConfig};
use crate::error::{ConfigError, RewriteError};
use crate::packet::{PacketBuf, Pid};
use crate::packetise::packetise;
use crate::psi::eit::EitStore;
use crate::psi::pat::PatTracker;
use crate::psi::{pat, pmt, sdt, Section};
use log::{debug, trace};
use parking_lot::Mutex;

/// Source table trackers plus the channels, with the tables generated for each.
pub struct SiTables {
    config: RewriteConfig,
    channels: Vec<Channel>,
    pat: Mutex<PatTracker>,
    eit: Mutex<EitStore>,
}

impl SiTables {
    pub fn new(config: SiConfig) -> Result<SiTables, ConfigError> {
        config.validate()?;
        let channels = config
            .channels
            .into_iter()
            .map(Channel::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SiTables {
            config: config.rewrite,
            channels,
            pat: Mutex::new(PatTracker::new()),
            eit: Mutex::new(EitStore::new()),
        })
    }

    pub fn rewrite_config(&self) -> &RewriteConfig {
        &self.config
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name() == name)
    }

    /// `true` if sections arriving on this PID are used to generate some table
    pub fn wants_sections(&self, pid: Pid) -> bool {
        match pid {
            Pid::PAT => self.config.rewrite_pat,
            Pid::SDT => self.config.rewrite_sdt,
            Pid::EIT => self.config.rewrite_eit,
            _ => self.config.rewrite_pmt && self.channels.iter().any(|c| c.is_pmt_pid(pid)),
        }
    }

    /// Use a newly received section to update the generated tables of every channel it affects.
    pub fn handle_section(&self, section: Section) {
        match section.pid() {
            Pid::PAT => {
                if self.config.rewrite_pat {
                    self.handle_pat(section);
                }
            }
            Pid::SDT => {
                // table_id 0x46 describes other transport streams, and is of no interest
                if self.config.rewrite_sdt && section.table_id() == sdt::TABLE_ID {
                    self.handle_sdt(&section);
                }
            }
            Pid::EIT => {
                if self.config.rewrite_eit {
                    self.handle_eit(section);
                }
            }
            pid => {
                if self.config.rewrite_pmt {
                    for channel in self.channels.iter().filter(|c| c.is_pmt_pid(pid)) {
                        self.handle_pmt(channel, &section);
                    }
                }
            }
        }
    }

    fn handle_pat(&self, section: Section) {
        let mut tracker = self.pat.lock();
        let version = match tracker.observe(section) {
            Ok(Some(version)) => version,
            Ok(None) => return,
            Err(e) => {
                debug!("{}: PAT not used: {}", Pid::PAT, e);
                return;
            }
        };
        for channel in &self.channels {
            let mut tables = channel.tables();
            if !tables.pat.needs_update(version) {
                continue;
            }
            match pat::rewrite(
                tracker.sections(),
                channel,
                self.config.pat_filter_by_service_id,
            ) {
                Ok(rewritten) => tables.pat.publish(rewritten),
                Err(e) => debug!("{}: PAT not generated: {}", channel.name(), e),
            }
        }
    }

    fn handle_pmt(&self, channel: &Channel, section: &Section) {
        let mut tables = channel.tables();
        if !tables.pmt.needs_update(section.version()) {
            return;
        }
        match pmt::rewrite(section, channel) {
            Ok(rewritten) => tables.pmt.publish(rewritten),
            Err(RewriteError::ProgramNumberMismatch { .. }) => (),
            Err(e) => debug!("{}: PMT not generated: {}", channel.name(), e),
        }
    }

    fn handle_sdt(&self, section: &Section) {
        for channel in &self.channels {
            let mut tables = channel.tables();
            match tables.sdt_tracker.observe(section, channel) {
                Ok(Some(rewritten)) => tables.sdt.publish(rewritten),
                Ok(None) | Err(RewriteError::Disabled) => (),
                Err(e) => debug!("{}: SDT not generated: {}", channel.name(), e),
            }
        }
    }

    fn handle_eit(&self, section: Section) {
        if let Err(e) = self.eit.lock().observe(section) {
            trace!("{}: EIT section not stored: {}", Pid::EIT, e);
        }
    }

    /// The channel's generated PAT, with the next continuity counter value, if one is available
    pub fn pat_packet(&self, channel: &Channel) -> Option<PacketBuf> {
        channel.tables().pat.emit()
    }

    /// The channel's generated PMT, with the next continuity counter value, if one is available
    pub fn pmt_packet(&self, channel: &Channel) -> Option<PacketBuf> {
        channel.tables().pmt.emit()
    }

    /// The channel's generated SDT, with the next continuity counter value, if one is available
    pub fn sdt_packet(&self, channel: &Channel) -> Option<PacketBuf> {
        channel.tables().sdt.emit()
    }

    /// `true` once SDT rewriting has been given up for the channel, in which case the source SDT
    /// should be passed through instead
    pub fn sdt_disabled(&self, channel: &Channel) -> bool {
        channel.tables().sdt_tracker.is_disabled()
    }

    /// Packets holding the next stored EIT section for the channel's service, or nothing if
    /// none are stored or the channel has no service id.
    pub fn eit_packets(&self, channel: &Channel) -> Vec<PacketBuf> {
        let service_id = match channel.service_id() {
            Some(id) => id,
            None => return vec![],
        };
        let store = self.eit.lock();
        let mut guard = channel.tables();
        let tables = &mut *guard;
        match tables.eit_cursor.next_section(&store, service_id) {
            Some(section) => packetise(Pid::EIT, section.bytes(), &mut tables.eit_cc),
            None => vec![],
        }
    }
}
