use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use dvb_si_rewrite::channel::{Channel, ChannelConfig, PidRole};
use dvb_si_rewrite::config::{RewriteConfig, SiConfig};
use dvb_si_rewrite::demultiplex::{ChannelSink, Demultiplex};
use dvb_si_rewrite::mpegts_crc;
use dvb_si_rewrite::packet::{ContinuityCounter, PacketBuf, Pid};
use dvb_si_rewrite::packetise::packetise;
use dvb_si_rewrite::psi::{SectionAssembler, SectionOutcome};
use dvb_si_rewrite::tables::SiTables;
use std::sync::Arc;

struct NullSink;
impl ChannelSink for NullSink {
    fn packet(&mut self, _channel: &Channel, _data: &[u8]) {}
}

fn section(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut data = vec![
        table_id,
        0b1011_0000 | (section_length >> 8) as u8,
        section_length as u8,
        (id >> 8) as u8,
        id as u8,
        0b1100_0001,
        0,
        0,
    ];
    data.extend_from_slice(body);
    let crc = mpegts_crc::sum32(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    data
}

fn add(out: &mut Vec<u8>, pid: u16, section: &[u8], cc: &mut ContinuityCounter) {
    for pk in packetise(Pid::new(pid), section, cc) {
        out.extend_from_slice(&pk.as_bytes()[..]);
    }
}

/// A multiplex of 20 services; each pass of the loop carries one of each table, then a run of
/// media packets
fn synthetic_stream() -> Vec<u8> {
    let mut out = vec![];
    let mut pat_body = vec![0, 0, 0xe0, 0x10];
    for service in 1..=20u16 {
        let pmt_pid = 0x100 * service;
        pat_body.extend_from_slice(&service.to_be_bytes());
        pat_body.extend_from_slice(&(0xe000 | pmt_pid).to_be_bytes());
    }
    let pat = section(0x00, 0x4084, &pat_body);
    let mut sdt_body = vec![0x23, 0x3a, 0xff];
    for service in 1..=20u16 {
        sdt_body.extend_from_slice(&service.to_be_bytes());
        sdt_body.extend_from_slice(&[0xfc, 0x80, 0x08, 0x48, 0x06, 0x01, 0x00, 0x03]);
        sdt_body.extend_from_slice(b"TV ");
    }
    let sdt = section(0x42, 0x4084, &sdt_body);
    let mut eit_body = vec![0x40, 0x84, 0x23, 0x3a, 0x00, 0x4e];
    eit_body.resize(600, 0x20);
    let eit = section(0x4e, 1, &eit_body);

    let mut ccs = vec![ContinuityCounter::default(); Pid::PID_COUNT];
    for _ in 0..100 {
        add(&mut out, 0, &pat, &mut ccs[0]);
        for service in 1..=20u16 {
            let pmt_pid = 0x100 * service;
            let mut body = (0xe000 | (pmt_pid + 1)).to_be_bytes().to_vec();
            body.extend_from_slice(&[0xf0, 0x00]);
            for es in 1..=3u16 {
                body.push(0x1b);
                body.extend_from_slice(&(0xe000 | (pmt_pid + es)).to_be_bytes());
                body.extend_from_slice(&[0xf0, 0x00]);
            }
            let pmt = section(0x02, service, &body);
            add(&mut out, pmt_pid, &pmt, &mut ccs[usize::from(pmt_pid)]);
        }
        add(&mut out, 0x11, &sdt, &mut ccs[0x11]);
        add(&mut out, 0x12, &eit, &mut ccs[0x12]);
        for i in 0..200u16 {
            let pid = 0x100 * (1 + i % 20) + 1;
            let cc = &mut ccs[usize::from(pid)];
            let mut pk = PacketBuf::new(Pid::new(pid), false);
            pk.set_continuity_counter(*cc);
            *cc = cc.next();
            out.extend_from_slice(&pk.as_bytes()[..]);
        }
    }
    out
}

fn si_config() -> SiConfig {
    SiConfig {
        rewrite: RewriteConfig::default(),
        channels: (1..=4u16)
            .map(|service| {
                let pmt_pid = 0x100 * service;
                ChannelConfig::new(format!("channel {}", service))
                    .with_service_id(service)
                    .with_pid(pmt_pid, PidRole::Pmt)
                    .with_pid(pmt_pid + 1, PidRole::Video)
                    .with_pid(pmt_pid + 2, PidRole::Audio)
            })
            .collect(),
    }
}

fn assemble(c: &mut Criterion) {
    let buf = synthetic_stream();
    let mut group = c.benchmark_group("section");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("assemble", |b| {
        b.iter(|| {
            let mut assemblers: Vec<SectionAssembler> =
                (0..Pid::PID_COUNT).map(|_| SectionAssembler::new()).collect();
            let mut count = 0;
            for pk in buf.chunks_exact(188) {
                let pk = dvb_si_rewrite::packet::Packet::new(pk);
                if let SectionOutcome::Complete(_) = assemblers[usize::from(pk.pid())].feed(&pk) {
                    count += 1;
                }
            }
            count
        })
    });
    group.finish();
}

fn demultiplex(c: &mut Criterion) {
    let buf = synthetic_stream();
    let tables = Arc::new(SiTables::new(si_config()).unwrap());
    let mut demux = Demultiplex::new(tables);
    let mut group = c.benchmark_group("demultiplex");
    group.throughput(Throughput::Bytes(buf.len() as u64));
    group.bench_function("push", |b| {
        b.iter(|| demux.push(&mut NullSink, &buf[..]))
    });
    group.finish();
}

criterion_group!(benches, assemble, demultiplex);
criterion_main!(benches);
