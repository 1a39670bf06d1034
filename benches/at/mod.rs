use criterion::{Criterion, Throughput};

use crate::replay;

pub fn bench_send_command(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_command");
    group.bench_function("send_command", |b| {
        let mut at = replay::client(b"AT+CWMODE=1\r\r\n\r\nOK\r\n");
        b.iter(|| at.send_command("+CWMODE", "=1").expect("Failed to send"))
    });
    group.finish();
}

pub fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    group.bench_function("query", |b| {
        let mut at =
            replay::client(b"AT+CIPSNTPTIME?\r\r\n+CIPSNTPTIME:Tue Oct 19 17:47:56 2021\r\nOK\r\n");
        b.iter(|| {
            let time = at.query("+CIPSNTPTIME", "?").expect("Failed to query");
            assert_eq!(time.len(), 24);
        })
    });
    group.finish();
}

pub fn bench_read_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_binary");
    let mut reply = b"+SYSFLASH:1024,".to_vec();
    reply.extend((0..1024u32).map(|i| (i % 251) as u8));
    reply.extend_from_slice(b"\r\nOK\r\n");
    group.throughput(Throughput::Bytes(1024));

    group.bench_function("read_binary", |b| {
        let mut at = replay::client(&reply);
        let mut dest = [0u8; 1024];
        b.iter(|| {
            at.read_binary(
                "+SYSFLASH",
                "=2,\"mqtt_ca\",0,1024",
                "+SYSFLASH:",
                &mut dest,
                1000,
            )
            .expect("Failed to read")
        })
    });
    group.finish();
}
