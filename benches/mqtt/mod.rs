use criterion::{Criterion, Throughput};
use libespat::mqtt::{ConnectStatus, DEFAULT_LINK_ID, MqttClient, QoS, Urc};

use crate::replay::{self, ReplaySerial, TickClock};

const OK: &[u8] = b"\r\nOK\r\n";

fn setup_client() -> MqttClient<ReplaySerial, TickClock> {
    let at = replay::client(b"+MQTTCONNECTED:0,1,\"broker\",\"1883\",\"\",0\r\n\r\nOK\r\n");
    let mut mqtt = MqttClient::new(at, ());
    let status = mqtt
        .connect(DEFAULT_LINK_ID, "broker", 1883, false, 1000)
        .expect("Failed to connect");
    assert_eq!(status, ConnectStatus::Connected);

    mqtt.at().transport_mut().serial_mut().set_reply(OK);
    mqtt.subscribe(DEFAULT_LINK_ID, "libespat/bench", QoS::AtMostOnce)
        .expect("Failed to subscribe");
    mqtt
}

pub fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = "hello from publish";
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("publish", |b| {
        let mut mqtt = setup_client();
        b.iter(|| {
            mqtt.publish(
                DEFAULT_LINK_ID,
                "libespat/bench",
                payload,
                QoS::AtMostOnce,
                false,
            )
            .expect("Failed to publish")
        })
    });
    group.finish();
}

pub fn bench_process_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_message");
    let payload = [0x5Au8; 512];
    let mut urc = b"+MQTTSUBRECV:0,\"libespat/bench\",512,".to_vec();
    urc.extend_from_slice(&payload);
    group.throughput(Throughput::Bytes(payload.len() as u64 * 20));

    group.bench_function("process_message", |b| {
        b.iter_batched_ref(
            || {
                let mut mqtt = setup_client();
                let serial = mqtt.at().transport_mut().serial_mut();
                for _ in 0..20 {
                    serial.push(&urc);
                }
                mqtt
            },
            |mqtt| {
                for _ in 0..20 {
                    let urc = mqtt.process().expect("Failed to process");
                    assert!(matches!(urc, Some(Urc::Message { .. })));
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}
