//! Reassembly of DVB Service Information tables from an MPEG2 Transport Stream, and regeneration
//! of those tables for each of several channels carved out of the same multiplex.
//!
//! A multiplex carries many services, and its PAT, SDT and EIT describe all of them.  When one
//! service is sent on to a receiver by itself, those tables need cutting down to describe just
//! that service, and the PMT to list just the elementary streams which are actually forwarded.
//!
//! # Design principals
//!
//!  * *Push, don't pull*.  The caller hands over buffers of transport stream data as they
//!    arrive, via [`Demultiplex::push()`](demultiplex/struct.Demultiplex.html#method.push), and
//!    is handed back the packets for each channel through a
//!    [`ChannelSink`](demultiplex/trait.ChannelSink.html).
//!  * *Nothing is fatal*.  Corrupt packets, bad CRCs and malformed tables are logged and dropped,
//!    and a channel simply goes without a table until a usable one arrives.
//!  * *Shareable*.  The generated tables live in [`SiTables`](tables/struct.SiTables.html),
//!    which may be shared between the thread ingesting the stream and threads sending output.
//!  * *Transport Neutral*.  There is no code here for reading from files or the network.  The
//!    APIs accept `&[u8]`, and the caller handles providing the data from wherever.
//!
//! # Example
//!
//! ```
//! # use dvb_si_rewrite::channel::{Channel, ChannelConfig, PidRole};
//! # use dvb_si_rewrite::config::{RewriteConfig, SiConfig};
//! # use dvb_si_rewrite::demultiplex::{ChannelSink, Demultiplex};
//! # use dvb_si_rewrite::tables::SiTables;
//! # use std::sync::Arc;
//! struct Count(usize);
//! impl ChannelSink for Count {
//!     fn packet(&mut self, _channel: &Channel, _data: &[u8]) {
//!         self.0 += 1;
//!     }
//! }
//!
//! let config = SiConfig {
//!     rewrite: RewriteConfig::default(),
//!     channels: vec![ChannelConfig::new("bbc one")
//!         .with_service_id(0x1044)
//!         .with_pid(0x1100, PidRole::Pmt)
//!         .with_pid(0x1101, PidRole::Video)],
//! };
//! let tables = Arc::new(SiTables::new(config).unwrap());
//! let mut demux = Demultiplex::new(tables);
//! let mut sink = Count(0);
//! demux.push(&mut sink, &[0x47, 0x11, 0x01, 0x10]);
//! assert_eq!(sink.0, 0);
//! ```

#![forbid(unsafe_code)]

pub mod channel;
pub mod config;
pub mod demultiplex;
pub mod descriptor;
pub mod error;
pub mod mpegts_crc;
pub mod packet;
pub mod packetise;
pub mod psi;
pub mod tables;
pub mod unpacketise;
