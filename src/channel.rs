//! Output channels, and the cache of tables generated for each of them.
//!
//! A channel is a subset of the PIDs of the incoming multiplex, usually one service, which is
//! delivered somewhere on its own.  The receiver at the other end should only be told about what
//! the channel actually carries, so the PAT, PMT, SDT and EIT are regenerated per channel.

use crate::error::ConfigError;
use crate::packet::{ContinuityCounter, PacketBuf, Pid};
use crate::psi::eit::EitCursor;
use crate::psi::sdt::SdtTracker;
use crate::psi::{Rewritten, TableState};
use fixedbitset::FixedBitSet;
use log::debug;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a configured PID carries.
///
/// Only [`PidRole::Pmt`] changes behaviour: packets on such a PID are replaced by the channel's
/// generated PMT.  The other roles are informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PidRole {
    Pmt,
    Pcr,
    Video,
    Audio,
    Subtitle,
    Teletext,
    Data,
    #[default]
    Other,
}

/// A PID to be delivered to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPid {
    pub pid: u16,
    #[serde(default)]
    pub role: PidRole,
}

/// Configuration of one output channel.
///
/// ```
/// # use dvb_si_rewrite::channel::{ChannelConfig, PidRole};
/// let config = ChannelConfig::new("BBC TWO HD")
///     .with_service_id(0x4440)
///     .with_pid(0x100, PidRole::Pmt)
///     .with_pid(0x101, PidRole::Video);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    /// Needed for SDT and EIT rewriting, and for PAT filtering by service id
    #[serde(default)]
    pub service_id: Option<u16>,
    pub pids: Vec<ChannelPid>,
}

impl ChannelConfig {
    pub fn new<S: Into<String>>(name: S) -> ChannelConfig {
        ChannelConfig {
            name: name.into(),
            service_id: None,
            pids: vec![],
        }
    }

    pub fn with_service_id(mut self, service_id: u16) -> ChannelConfig {
        self.service_id = Some(service_id);
        self
    }

    pub fn with_pid(mut self, pid: u16, role: PidRole) -> ChannelConfig {
        self.pids.push(ChannelPid { pid, role });
        self
    }

    /// Checks that there is at least one PID, and that every PID value fits in 13 bits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pids.is_empty() {
            return Err(ConfigError::NoPids(self.name.clone()));
        }
        for p in &self.pids {
            if Pid::try_from(p.pid).is_err() {
                return Err(ConfigError::InvalidPid {
                    channel: self.name.clone(),
                    pid: p.pid,
                });
            }
        }
        Ok(())
    }
}

/// One generated table, ready to be sent, plus the continuity counter for its output PID.
///
/// The counter belongs to the channel, and advances on every emission independently of the
/// counter of the source stream.
#[derive(Debug, Default)]
pub struct TableOutput {
    state: TableState,
    packet: Option<PacketBuf>,
    dropped: usize,
    cc: ContinuityCounter,
}

impl TableOutput {
    pub fn state(&self) -> &TableState {
        &self.state
    }

    /// `true` unless a table has already been generated from the given source version
    pub fn needs_update(&self, version: u8) -> bool {
        !self.state.is_ready_for(version)
    }

    pub fn is_ready(&self) -> bool {
        self.packet.is_some()
    }

    /// Entries left out of the current table for lack of space
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Replace the cached table with a newly generated one.
    pub fn publish(&mut self, rewritten: Rewritten) {
        self.state = TableState::Ready {
            version: rewritten.version,
        };
        self.dropped = rewritten.dropped;
        self.packet = Some(rewritten.packet);
    }

    /// Forget the cached table, so that nothing is sent until the next `publish()`.
    pub fn invalidate(&mut self) {
        self.state = TableState::AwaitingFirstSection;
        self.packet = None;
        self.dropped = 0;
    }

    /// A copy of the cached packet, stamped with the next continuity counter value, or `None`
    /// if no table has been generated yet.
    pub fn emit(&mut self) -> Option<PacketBuf> {
        let mut packet = self.packet.clone()?;
        packet.set_continuity_counter(self.cc);
        self.cc = self.cc.next();
        Some(packet)
    }
}

/// Everything generated for a channel, protected as a unit by the channel's mutex.
#[derive(Debug, Default)]
pub struct ChannelTables {
    pub pat: TableOutput,
    pub pmt: TableOutput,
    pub sdt: TableOutput,
    pub sdt_tracker: SdtTracker,
    pub eit_cursor: EitCursor,
    pub eit_cc: ContinuityCounter,
}

/// An output channel: its configuration, plus the tables generated for it so far.
///
/// `Channel` is `Sync`; the generated tables are behind a mutex so that the thread feeding in
/// packets and a thread sending out tables can share it.
pub struct Channel {
    config: ChannelConfig,
    pids: FixedBitSet,
    pmt_pids: FixedBitSet,
    tables: Mutex<ChannelTables>,
}

impl Channel {
    pub fn new(config: ChannelConfig) -> Result<Channel, ConfigError> {
        config.validate()?;
        let mut pids = FixedBitSet::with_capacity(Pid::PID_COUNT);
        let mut pmt_pids = FixedBitSet::with_capacity(Pid::PID_COUNT);
        for p in &config.pids {
            pids.insert(usize::from(p.pid));
            if p.role == PidRole::Pmt {
                pmt_pids.insert(usize::from(p.pid));
            }
        }
        debug!(
            "{}: channel with {} PIDs, service_id {:?}",
            config.name,
            pids.count_ones(..),
            config.service_id
        );
        Ok(Channel {
            config,
            pids,
            pmt_pids,
            tables: Mutex::new(ChannelTables::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn service_id(&self) -> Option<u16> {
        self.config.service_id
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// `true` if the given PID is in the channel's configuration, whatever its role
    pub fn carries(&self, pid: Pid) -> bool {
        self.pids.contains(usize::from(pid))
    }

    /// `true` if the given PID is configured with the role [`PidRole::Pmt`]
    pub fn is_pmt_pid(&self, pid: Pid) -> bool {
        self.pmt_pids.contains(usize::from(pid))
    }

    /// Lock the channel's generated tables.
    pub fn tables(&self) -> MutexGuard<'_, ChannelTables> {
        self.tables.lock()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Channel")
            .field("name", &self.config.name)
            .field("service_id", &self.config.service_id)
            .field("pids", &self.pids.ones().collect::<Vec<_>>())
            .finish()
    }
}

/// Channel with the given PIDs, the first of which is its PMT PID, for use in tests.
#[cfg(test)]
pub(crate) fn test_channel(service_id: Option<u16>, pids: &[u16]) -> Channel {
    let mut config = ChannelConfig::new("test");
    config.service_id = service_id;
    for (i, &pid) in pids.iter().enumerate() {
        let role = if i == 0 { PidRole::Pmt } else { PidRole::Other };
        config = config.with_pid(pid, role);
    }
    Channel::new(config).unwrap()
}
