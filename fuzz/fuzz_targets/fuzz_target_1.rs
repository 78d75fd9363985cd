#![no_main]

use dvb_si_rewrite::channel::{Channel, ChannelConfig, PidRole};
use dvb_si_rewrite::config::{RewriteConfig, SiConfig};
use dvb_si_rewrite::demultiplex::{ChannelSink, Demultiplex};
use dvb_si_rewrite::tables::SiTables;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

pub struct FuzzSink;
impl ChannelSink for FuzzSink {
    fn packet(&mut self, _channel: &Channel, _data: &[u8]) {}
}

fn si_config() -> SiConfig {
    SiConfig {
        rewrite: RewriteConfig::default(),
        channels: vec![
            ChannelConfig::new("one")
                .with_service_id(1)
                .with_pid(0x100, PidRole::Pmt)
                .with_pid(0x101, PidRole::Video),
            ChannelConfig::new("two")
                .with_pid(0x200, PidRole::Pmt)
                .with_pid(0x201, PidRole::Audio),
        ],
    }
}

fuzz_target!(|data: &[u8]| {
    let tables = Arc::new(SiTables::new(si_config()).unwrap());
    let mut demux = Demultiplex::new(tables);
    demux.push(&mut FuzzSink, data);
});
