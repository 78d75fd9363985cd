//! Error types.
//!
//! None of these are fatal: each one describes why a single packet, section or generated table
//! was dropped, and processing carries on with the next packet.

use crate::packet::Pid;
use thiserror::Error;

/// Why the [`SectionAssembler`](../psi/struct.SectionAssembler.html) dropped a packet or the
/// section it was building.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The packet's `transport_error_indicator` was set.
    #[error("transport_error_indicator set")]
    TransportError,

    /// The packet's adaptation_field_control value gives it no payload.
    #[error("packet carries no payload")]
    NoPayload,

    /// A packet starting a payload unit contained a PES header rather than section data.
    #[error("payload begins with a PES start code")]
    PesStartCode,

    /// A continuation packet belongs to a different PID than the section being built.
    #[error("continuation packet on PID {actual} while assembling a section from PID {expected}")]
    PidMismatch {
        /// PID of the section in progress.
        expected: Pid,
        /// PID of the offending packet.
        actual: Pid,
    },

    /// Continuity counter skipped one or more values, so data has been lost.
    #[error("continuity counter jumped: expected {expected}, got {actual}")]
    ContinuityGap {
        /// The counter value which should have followed the previous packet.
        expected: u8,
        /// The counter value actually found.
        actual: u8,
    },

    /// Continuity counter repeated; the packet is a retransmission of the one before it.
    #[error("duplicate packet")]
    DuplicatePacket,

    /// A continuation packet arrived, but no section is being assembled.
    #[error("continuation packet with no section in progress")]
    NoSectionInProgress,

    /// The `pointer_field` points past the end of the packet payload.
    #[error("pointer_field {pointer} beyond end of payload")]
    PointerOutOfRange {
        /// Value of the pointer_field.
        pointer: usize,
    },

    /// Declared section size exceeds the assembler's buffer limit.
    #[error("section of {length} bytes exceeds the assembly buffer")]
    SectionTooLong {
        /// Declared size, including the 3 byte common header.
        length: usize,
    },

    /// Declared section size is too small to hold the section syntax fields and a CRC.
    #[error("section of {length} bytes is too short to be valid")]
    SectionTooShort {
        /// Declared size, including the 3 byte common header.
        length: usize,
    },

    /// CRC check over the complete section failed.
    #[error("CRC check failed for table_id {table_id:#04x}")]
    BadCrc {
        /// The table_id of the failed section.
        table_id: u8,
    },
}

/// Why a table rewriter produced no output for a section.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// The section is not the kind of table expected; the caller should keep looking.
    #[error("expected table_id {expected:#04x}, got {actual:#04x}")]
    WrongTableId {
        /// The table_id handled by the rewriter.
        expected: u8,
        /// The table_id of the section.
        actual: u8,
    },

    /// `current_next_indicator` is `0`; the section describes a future version of the table.
    #[error("section is not yet applicable (current_next_indicator=0)")]
    NotApplicable,

    /// A PMT for some other program shares the PID.
    #[error("PMT for program {actual}, but channel has service_id {expected}")]
    ProgramNumberMismatch {
        /// The channel's service id.
        expected: u16,
        /// The program_number found in the PMT.
        actual: u16,
    },

    /// A length field points beyond the end of the section.
    #[error("malformed section: {0}")]
    Malformed(&'static str),

    /// SDT rewriting needs a service id, but the channel has none configured.
    #[error("channel has no service_id")]
    NoServiceId,

    /// Every section of the SDT has been examined, and the channel's service is not listed.
    #[error("service {service_id:#06x} not found in any SDT section")]
    ServiceNotFound {
        /// The channel's service id.
        service_id: u16,
    },

    /// Rewriting was already disabled for this channel by an earlier `NoServiceId` or
    /// `ServiceNotFound`.
    #[error("rewriting disabled for this channel")]
    Disabled,
}

/// The subset of [`RewriteError`] produced by the SDT rewriter.
pub type SdtError = RewriteError;

/// Problems found when validating channel configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A configured PID value does not fit in 13 bits.
    #[error("channel {channel:?}: PID {pid:#x} is out of range")]
    InvalidPid {
        /// Name of the channel.
        channel: String,
        /// The bad value.
        pid: u16,
    },

    /// Two channels share a name.
    #[error("channel {0:?} is defined more than once")]
    DuplicateChannel(String),

    /// A channel has no PIDs at all.
    #[error("channel {0:?} has no PIDs")]
    NoPids(String),
}
